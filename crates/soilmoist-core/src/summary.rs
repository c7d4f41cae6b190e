use serde::Serialize;
use soilmoist_parser::RawFileSummary;

use crate::partitions::PartitionKey;

#[derive(Debug, Clone, Serialize)]
pub struct PartitionCount {
    pub key: PartitionKey,
    pub rows: usize,
}

/// Row counts after each stage of one site's run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningSummary {
    pub site: String,
    pub files: Vec<RawFileSummary>,
    pub raw_rows: usize,
    pub normalized_rows: usize,
    pub validated_rows: usize,
    pub windowed_rows: usize,
    pub long_rows: usize,
    pub wide_rows: usize,
    pub valid_rows: usize,
    pub partitions: Vec<PartitionCount>,
}

impl CleaningSummary {
    pub fn stage_counts(&self) -> [(&'static str, usize); 7] {
        [
            ("raw", self.raw_rows),
            ("normalized", self.normalized_rows),
            ("validated", self.validated_rows),
            ("in deployment window", self.windowed_rows),
            ("long observations", self.long_rows),
            ("wide rows", self.wide_rows),
            ("valid wide rows", self.valid_rows),
        ]
    }
}
