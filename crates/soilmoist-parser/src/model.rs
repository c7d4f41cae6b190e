use std::fmt;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::ParserError;

/// Cover-crop planting cohort encoded in a raw file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlantingTime {
    Early,
    Late,
}

impl PlantingTime {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlantingTime::Early => "early",
            PlantingTime::Late => "late",
        }
    }
}

impl fmt::Display for PlantingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for PlantingTime {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "early" => Ok(PlantingTime::Early),
            "late" => Ok(PlantingTime::Late),
            other => Err(format!("unknown planting time '{other}'")),
        }
    }
}

/// Logger table interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFrequency {
    Daily,
    Hourly,
}

impl DataFrequency {
    pub const ALL: [DataFrequency; 2] = [DataFrequency::Daily, DataFrequency::Hourly];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataFrequency::Daily => "daily",
            DataFrequency::Hourly => "hourly",
        }
    }
}

impl fmt::Display for DataFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DataFrequency {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(DataFrequency::Daily),
            "hourly" => Ok(DataFrequency::Hourly),
            other => Err(format!("unknown data frequency '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRule<T> {
    pub token: String,
    pub value: T,
}

impl<T> TokenRule<T> {
    pub fn new(token: impl Into<String>, value: T) -> Self {
        Self {
            token: token.into(),
            value,
        }
    }
}

/// Filename substrings that carry experiment metadata absent from the row data.
///
/// Tokens are matched case-insensitively; the first rule whose token occurs in the
/// file name wins. With `strict` set (the default), a file that matches no rule for
/// a field is rejected when the batch is read. Otherwise the field is null and the
/// file's rows are dropped once the wide table is checked for missing values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilenameTokens {
    pub cc_plant_time: Vec<TokenRule<PlantingTime>>,
    pub data_freq: Vec<TokenRule<DataFrequency>>,
    pub strict: bool,
}

impl Default for FilenameTokens {
    fn default() -> Self {
        Self {
            cc_plant_time: vec![
                TokenRule::new("early", PlantingTime::Early),
                TokenRule::new("late", PlantingTime::Late),
            ],
            data_freq: vec![
                TokenRule::new("daily", DataFrequency::Daily),
                TokenRule::new("hourly", DataFrequency::Hourly),
            ],
            strict: true,
        }
    }
}

impl FilenameTokens {
    pub fn resolve(&self, file_name: &str) -> FilenameMetadata {
        let lower = file_name.to_ascii_lowercase();
        FilenameMetadata {
            cc_plant_time: first_match(&self.cc_plant_time, &lower),
            data_freq: first_match(&self.data_freq, &lower),
        }
    }

    /// Resolves `file_name`, failing when `strict` is set and a field has no match.
    pub fn resolve_checked(&self, file_name: &str) -> Result<FilenameMetadata, ParserError> {
        let metadata = self.resolve(file_name);
        if self.strict {
            if metadata.cc_plant_time.is_none() {
                return Err(ParserError::UnrecognizedFilename {
                    file: file_name.to_string(),
                    field: "cc_plant_time",
                });
            }
            if metadata.data_freq.is_none() {
                return Err(ParserError::UnrecognizedFilename {
                    file: file_name.to_string(),
                    field: "data_freq",
                });
            }
        }
        Ok(metadata)
    }
}

fn first_match<T: Copy>(rules: &[TokenRule<T>], lower_name: &str) -> Option<T> {
    rules
        .iter()
        .find(|rule| lower_name.contains(&rule.token.to_ascii_lowercase()))
        .map(|rule| rule.value)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilenameMetadata {
    pub cc_plant_time: Option<PlantingTime>,
    pub data_freq: Option<DataFrequency>,
}

/// One logger export after the preamble line has been consumed.
///
/// `rows` still contains the units row and the sentinel row that follow the header.
#[derive(Debug, Clone)]
pub struct LoggerFile {
    pub source_file: String,
    pub preamble: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl LoggerFile {
    pub fn units(&self) -> Option<&[Option<String>]> {
        self.rows.first().map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RawFileSummary {
    pub source_file: String,
    pub row_count: usize,
    pub metadata: FilenameMetadata,
}

/// Row-wise union of every raw file for a site, all columns as strings plus
/// `source_file`.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub df: DataFrame,
    pub files: Vec<RawFileSummary>,
}

/// Raw column name to unit string, taken from the first row of a merged site batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitsHeader {
    units: Vec<(String, String)>,
}

impl UnitsHeader {
    pub fn from_first_row(df: &DataFrame) -> Result<Self, ParserError> {
        if df.height() == 0 {
            return Err(ParserError::MissingHeader {
                file: "merged batch".to_string(),
                row: "units",
            });
        }

        let mut units = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let unit = column.str()?.get(0).unwrap_or_default().trim().to_string();
            units.push((column.name().to_string(), unit));
        }
        Ok(Self { units })
    }

    pub fn unit(&self, column: &str) -> Option<&str> {
        self.units
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, unit)| unit.as_str())
    }
}
