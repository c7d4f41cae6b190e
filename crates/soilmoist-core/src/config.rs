use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use soilmoist_parser::values::{DEFAULT_MISSING_TOKENS, DEFAULT_TIMESTAMP_FORMATS};
use soilmoist_parser::{FilenameTokens, ReadOptions};

use crate::column_grammar::ColumnGrammar;
use crate::deployment_window::DeploymentWindow;
use crate::error::{PipelineError, Result};
use crate::quality_filters::ValidityRule;

// Evaluated at compile time: an invalid date fails the build.
const MIDVILLE_DEPLOYMENT_END: NaiveDateTime = end_of_day(2024, 10, 11);
const WATKINSVILLE_DEPLOYMENT_END: NaiveDateTime = end_of_day(2024, 11, 11);

const fn end_of_day(year: i32, month: u32, day: u32) -> NaiveDateTime {
    let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
        panic!("invalid deployment end date");
    };
    let Some(end) = date.and_hms_opt(23, 59, 59) else {
        panic!("invalid deployment end time");
    };
    end
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    /// Substring identifying this site's files, matched case-insensitively.
    pub file_token: String,
    /// Readings after this instant were taken once sensors were pulled.
    pub deployment_end: NaiveDateTime,
    #[serde(default)]
    pub deployment_start: Option<NaiveDateTime>,
    #[serde(default)]
    pub expected_column_count: Option<usize>,
}

impl SiteConfig {
    pub fn new(name: impl Into<String>, deployment_end: NaiveDateTime) -> Self {
        let name = name.into();
        Self {
            file_token: name.clone(),
            name,
            deployment_end,
            deployment_start: None,
            expected_column_count: None,
        }
    }

    pub fn deployment_window(&self) -> DeploymentWindow {
        DeploymentWindow {
            start: self.deployment_start,
            end: self.deployment_end,
        }
    }

    pub fn matches_file(&self, file_name: &str) -> bool {
        file_name
            .to_ascii_lowercase()
            .contains(&self.file_token.to_ascii_lowercase())
    }
}

/// Logger housekeeping column removed before decomposition, identified by its
/// raw name and unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentColumn {
    pub name: String,
    pub unit: String,
}

impl InstrumentColumn {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
        }
    }

    /// The fused `name_(unit)` label this column carries after unit recovery.
    pub fn label(&self) -> String {
        format!("{}_({})", self.name, self.unit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sites: Vec<SiteConfig>,
    pub instrumentation_columns: Vec<InstrumentColumn>,
    /// Raw timestamp column after header normalization.
    pub timestamp_column: String,
    pub timestamp_formats: Vec<String>,
    pub missing_tokens: Vec<String>,
    pub grammar: ColumnGrammar,
    pub filename_tokens: FilenameTokens,
    pub validity_rules: Vec<ValidityRule>,
    pub pivot_artifact_columns: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sites: vec![
                SiteConfig::new("Midville", MIDVILLE_DEPLOYMENT_END),
                SiteConfig::new("Watkinsville", WATKINSVILLE_DEPLOYMENT_END),
            ],
            instrumentation_columns: vec![
                InstrumentColumn::new("RECORD", "RN"),
                InstrumentColumn::new("BattV_Min", "Volts"),
                InstrumentColumn::new("PTemp_C_Avg", "Deg C"),
                InstrumentColumn::new("BattV_Avg", "Volts"),
            ],
            timestamp_column: "timestamp_(ts)".to_string(),
            timestamp_formats: DEFAULT_TIMESTAMP_FORMATS
                .iter()
                .map(|fmt| fmt.to_string())
                .collect(),
            missing_tokens: DEFAULT_MISSING_TOKENS
                .iter()
                .map(|token| token.to_string())
                .collect(),
            grammar: ColumnGrammar::default(),
            filename_tokens: FilenameTokens::default(),
            validity_rules: vec![
                ValidityRule::greater_than("vwc_(m^3/m^3)", 0.0),
                ValidityRule::at_least("ec_(ds/m)", 0.0),
            ],
            pivot_artifact_columns: vec!["timestamp_NA".to_string()],
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|err| PipelineError::Config(format!("failed to parse TOML: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sites.is_empty() {
            return Err(PipelineError::Config("no sites configured".to_string()));
        }

        let mut names = HashSet::new();
        for site in &self.sites {
            if !names.insert(site.name.to_ascii_lowercase()) {
                return Err(PipelineError::Config(format!(
                    "site '{}' is configured more than once",
                    site.name
                )));
            }
            if let Some(start) = site.deployment_start {
                if start > site.deployment_end {
                    return Err(PipelineError::Config(format!(
                        "site '{}' deployment starts after it ends",
                        site.name
                    )));
                }
            }
        }

        if self.grammar.field_count != ColumnGrammar::FIELD_COUNT {
            return Err(PipelineError::Config(format!(
                "column grammar must have exactly {} fields, got {}",
                ColumnGrammar::FIELD_COUNT,
                self.grammar.field_count
            )));
        }

        if self.timestamp_formats.is_empty() {
            return Err(PipelineError::Config(
                "at least one timestamp format is required".to_string(),
            ));
        }

        Ok(())
    }

    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites
            .iter()
            .find(|site| site.name.eq_ignore_ascii_case(name))
    }

    pub fn read_options(&self, site: &SiteConfig) -> ReadOptions {
        ReadOptions {
            expected_column_count: site.expected_column_count,
            filename_tokens: self.filename_tokens.clone(),
        }
    }
}
