use std::fmt;

use serde::{Deserialize, Serialize};

pub use soilmoist_parser::{DataFrequency, PlantingTime};

/// Aggregation a logger applied over each interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Avg,
    Min,
    Max,
}

impl Statistic {
    pub const ALL: [Statistic; 3] = [Statistic::Avg, Statistic::Min, Statistic::Max];

    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Avg => "avg",
            Statistic::Min => "min",
            Statistic::Max => "max",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Statistic {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "avg" => Ok(Statistic::Avg),
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            other => Err(format!("unknown statistic '{other}'")),
        }
    }
}

/// Long-format column names.
pub mod long {
    pub const TIMESTAMP: &str = "timestamp";
    pub const TREATMENT: &str = "treatment";
    pub const DEPTH: &str = "depth";
    pub const STAT: &str = "stat";
    pub const CC_PLANT_TIME: &str = "cc_plant_time";
    pub const DATA_FREQ: &str = "data_freq";
    pub const MEASURE_UNITS: &str = "measure_units";
    pub const VALUE: &str = "value";

    /// Factor columns of the wide-table key, in output order.
    pub const FACTORS: [&str; 5] = [TREATMENT, DEPTH, STAT, CC_PLANT_TIME, DATA_FREQ];
}
