use std::collections::BTreeMap;
use std::fmt;

use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::types::{long, DataFrequency, Statistic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PartitionKey {
    pub statistic: Statistic,
    pub data_freq: DataFrequency,
}

impl PartitionKey {
    pub fn new(statistic: Statistic, data_freq: DataFrequency) -> Self {
        Self {
            statistic,
            data_freq,
        }
    }

    /// The six `(statistic, data_freq)` combinations, statistic-major.
    pub fn all() -> impl Iterator<Item = PartitionKey> {
        Statistic::ALL.into_iter().flat_map(|statistic| {
            DataFrequency::ALL
                .into_iter()
                .map(move |data_freq| PartitionKey::new(statistic, data_freq))
        })
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.statistic, self.data_freq)
    }
}

/// Rows of `df` whose `stat` and `data_freq` match `key`. Applying it to its own
/// output returns the same rows.
pub fn partition(df: &DataFrame, key: PartitionKey) -> Result<DataFrame> {
    let stat = df.column(long::STAT)?.cast(&DataType::String)?;
    let freq = df.column(long::DATA_FREQ)?.cast(&DataType::String)?;
    let stat = stat.str()?;
    let freq = freq.str()?;

    let keep: Vec<bool> = (0..df.height())
        .map(|idx| {
            stat.get(idx) == Some(key.statistic.as_str())
                && freq.get(idx) == Some(key.data_freq.as_str())
        })
        .collect();

    Ok(df.filter(&BooleanChunked::from_slice("keep".into(), &keep))?)
}

/// Always returns all six partitions; combinations without data are empty tables
/// with the full schema.
pub fn partition_table(df: &DataFrame) -> Result<BTreeMap<PartitionKey, DataFrame>> {
    PartitionKey::all()
        .map(|key| -> Result<(PartitionKey, DataFrame)> { Ok((key, partition(df, key)?)) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide_frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new(long::STAT.into(), ["avg", "max", "avg", "avg"]).into(),
            Series::new(long::DATA_FREQ.into(), ["daily", "daily", "hourly", "daily"]).into(),
            Series::new("vwc_(m^3/m^3)".into(), [0.2, 0.3, 0.25, 0.21]).into(),
        ])
        .unwrap()
    }

    #[test]
    fn returns_all_six_partitions() {
        let partitions = partition_table(&wide_frame()).unwrap();
        assert_eq!(partitions.len(), 6);

        let rows = |statistic, data_freq| partitions[&PartitionKey::new(statistic, data_freq)].height();
        assert_eq!(rows(Statistic::Avg, DataFrequency::Daily), 2);
        assert_eq!(rows(Statistic::Avg, DataFrequency::Hourly), 1);
        assert_eq!(rows(Statistic::Max, DataFrequency::Daily), 1);
        assert_eq!(rows(Statistic::Max, DataFrequency::Hourly), 0);
        assert_eq!(rows(Statistic::Min, DataFrequency::Daily), 0);
    }

    #[test]
    fn empty_partitions_keep_the_schema() {
        let df = wide_frame();
        let empty = partition(&df, PartitionKey::new(Statistic::Min, DataFrequency::Hourly)).unwrap();
        assert_eq!(empty.height(), 0);
        assert_eq!(empty.get_column_names(), df.get_column_names());
    }

    #[test]
    fn partitioning_twice_changes_nothing() {
        let key = PartitionKey::new(Statistic::Avg, DataFrequency::Daily);
        let once = partition(&wide_frame(), key).unwrap();
        let twice = partition(&once, key).unwrap();
        assert!(once.equals(&twice));
    }

    #[test]
    fn keys_display_as_stat_and_frequency() {
        let keys: Vec<String> = PartitionKey::all().map(|key| key.to_string()).collect();
        assert_eq!(keys[0], "avg/daily");
        assert_eq!(keys[5], "max/hourly");
    }
}
