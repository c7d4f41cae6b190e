use std::collections::HashSet;

use polars::prelude::*;
use soilmoist_parser::values::{is_missing, parse_timestamp};
use tracing::warn;

use crate::error::Result;

pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Drops rows with any missing cell, then exact duplicates, then rows whose
/// timestamp does not parse. The raw timestamp column is replaced by a parsed
/// `timestamp` column placed first.
pub fn validate_records<S: AsRef<str>, F: AsRef<str>>(
    df: &DataFrame,
    raw_timestamp_column: &str,
    missing_tokens: &[S],
    timestamp_formats: &[F],
) -> Result<DataFrame> {
    let raw_timestamps = df.column(raw_timestamp_column)?.str()?;
    let columns = df
        .get_columns()
        .iter()
        .map(|column| column.str())
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut seen: HashSet<Vec<Option<&str>>> = HashSet::with_capacity(df.height());
    let mut keep = Vec::with_capacity(df.height());
    let mut parsed = Vec::with_capacity(df.height());
    let mut missing_rows = 0usize;
    let mut duplicate_rows = 0usize;
    let mut bad_timestamps = 0usize;

    for idx in 0..df.height() {
        let row: Vec<Option<&str>> = columns.iter().map(|column| column.get(idx)).collect();

        if row.iter().any(|value| is_missing(*value, missing_tokens)) {
            missing_rows += 1;
            keep.push(false);
            continue;
        }

        if !seen.insert(row) {
            duplicate_rows += 1;
            keep.push(false);
            continue;
        }

        let timestamp = raw_timestamps
            .get(idx)
            .and_then(|value| parse_timestamp(value, timestamp_formats));
        match timestamp {
            Some(value) => {
                keep.push(true);
                parsed.push(value.and_utc().timestamp_micros());
            }
            None => {
                bad_timestamps += 1;
                keep.push(false);
            }
        }
    }

    if missing_rows + duplicate_rows + bad_timestamps > 0 {
        warn!(
            missing_rows,
            duplicate_rows,
            bad_timestamps,
            "Dropped invalid raw rows"
        );
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let filtered = df.filter(&mask)?.drop(raw_timestamp_column)?;

    let timestamp = Series::new(TIMESTAMP_COLUMN.into(), parsed)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;

    let mut output: Vec<Column> = Vec::with_capacity(filtered.width() + 1);
    output.push(timestamp.into());
    output.extend(filtered.get_columns().iter().cloned());

    Ok(DataFrame::new(output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use soilmoist_parser::values::{DEFAULT_MISSING_TOKENS, DEFAULT_TIMESTAMP_FORMATS};

    #[test]
    fn drops_missing_duplicate_and_unparseable_rows() -> PolarsResult<()> {
        let df = df!(
            "timestamp_(ts)" => [
                Some("2024-10-01 00:00:00"),
                Some("2024-10-01 00:00:00"),
                Some("TS"),
                Some("2024-10-02 00:00:00"),
                None,
                Some("2024-10-03 00:00:00"),
            ],
            "vwc_ctrl_5cm_avg_(m^3/m^3)" => [
                Some("0.2"),
                Some("0.2"),
                Some("m^3/m^3"),
                Some("NAN"),
                Some("0.3"),
                Some("0.4"),
            ],
            "source_file" => ["a.dat", "a.dat", "a.dat", "a.dat", "a.dat", "a.dat"]
        )?;

        let cleaned = validate_records(
            &df,
            "timestamp_(ts)",
            DEFAULT_MISSING_TOKENS,
            DEFAULT_TIMESTAMP_FORMATS,
        )
        .unwrap();

        assert_eq!(cleaned.height(), 2);
        assert_eq!(cleaned.get_columns()[0].name().as_str(), TIMESTAMP_COLUMN);
        assert!(cleaned.column("timestamp_(ts)").is_err());

        let values = cleaned.column("vwc_ctrl_5cm_avg_(m^3/m^3)")?.str()?;
        assert_eq!(values.get(0), Some("0.2"));
        assert_eq!(values.get(1), Some("0.4"));

        let timestamps = cleaned.column(TIMESTAMP_COLUMN)?.datetime()?;
        assert_eq!(timestamps.null_count(), 0);
        Ok(())
    }

    #[test]
    fn rows_from_different_files_are_not_duplicates() -> PolarsResult<()> {
        let df = df!(
            "timestamp_(ts)" => ["2024-10-01 00:00:00", "2024-10-01 00:00:00"],
            "source_file" => ["a.dat", "b.dat"]
        )?;
        let cleaned = validate_records(
            &df,
            "timestamp_(ts)",
            DEFAULT_MISSING_TOKENS,
            DEFAULT_TIMESTAMP_FORMATS,
        )
        .unwrap();
        assert_eq!(cleaned.height(), 2);
        Ok(())
    }
}
