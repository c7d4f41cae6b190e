use std::collections::HashMap;

use polars::prelude::*;
use soilmoist_parser::values::parse_optional_f64;
use soilmoist_parser::{FilenameMetadata, FilenameTokens, SOURCE_FILE_COLUMN};
use tracing::debug;

use crate::column_grammar::{ColumnGrammar, ColumnName};
use crate::error::Result;
use crate::types::long;
use crate::validation::TIMESTAMP_COLUMN;

/// Melts a cleaned wide-raw table into one observation per (row, measurement
/// column).
///
/// Every non-identifier column is parsed with `grammar` before any row is
/// touched, so a malformed name fails the whole table. `cc_plant_time` and
/// `data_freq` come from each row's `source_file`; unmatched tokens stay null.
/// Values that are not numeric become null.
pub fn decompose_columns(
    df: &DataFrame,
    grammar: &ColumnGrammar,
    tokens: &FilenameTokens,
) -> Result<DataFrame> {
    let measurements: Vec<(ColumnName, &StringChunked)> = df
        .get_columns()
        .iter()
        .filter(|column| !grammar.is_identifier(column.name().as_str()))
        .map(|column| -> Result<(ColumnName, &StringChunked)> {
            let parsed = grammar.parse(column.name().as_str())?;
            Ok((parsed, column.str()?))
        })
        .collect::<Result<_>>()?;

    for (name, _) in &measurements {
        debug!(
            column = %name.column,
            measure_units = %name.measure_units,
            treatment = %name.treatment,
            depth = %name.depth,
            stat = %name.stat,
            "Decomposed column"
        );
    }

    let timestamps = df.column(TIMESTAMP_COLUMN)?.datetime()?;
    let sources = df.column(SOURCE_FILE_COLUMN)?.str()?;

    let capacity = df.height() * measurements.len();
    let mut out_ts: Vec<Option<i64>> = Vec::with_capacity(capacity);
    let mut treatment: Vec<&str> = Vec::with_capacity(capacity);
    let mut depth: Vec<&str> = Vec::with_capacity(capacity);
    let mut stat: Vec<&str> = Vec::with_capacity(capacity);
    let mut cc_plant_time: Vec<Option<&'static str>> = Vec::with_capacity(capacity);
    let mut data_freq: Vec<Option<&'static str>> = Vec::with_capacity(capacity);
    let mut measure_units: Vec<&str> = Vec::with_capacity(capacity);
    let mut values: Vec<Option<f64>> = Vec::with_capacity(capacity);

    let mut file_metadata: HashMap<&str, FilenameMetadata> = HashMap::new();

    for idx in 0..df.height() {
        let metadata = match sources.get(idx) {
            Some(source) => *file_metadata
                .entry(source)
                .or_insert_with(|| tokens.resolve(source)),
            None => FilenameMetadata::default(),
        };
        let ts = timestamps.get(idx);

        for (name, column) in &measurements {
            out_ts.push(ts);
            treatment.push(&name.treatment);
            depth.push(&name.depth);
            stat.push(&name.stat);
            cc_plant_time.push(metadata.cc_plant_time.map(|value| value.as_str()));
            data_freq.push(metadata.data_freq.map(|value| value.as_str()));
            measure_units.push(&name.measure_units);
            values.push(parse_optional_f64(column.get(idx)));
        }
    }

    let timestamp = Series::new(long::TIMESTAMP.into(), out_ts)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;

    let long_df = DataFrame::new(vec![
        timestamp.into(),
        Series::new(long::TREATMENT.into(), treatment).into(),
        Series::new(long::DEPTH.into(), depth).into(),
        Series::new(long::STAT.into(), stat).into(),
        Series::new(long::CC_PLANT_TIME.into(), cc_plant_time).into(),
        Series::new(long::DATA_FREQ.into(), data_freq).into(),
        Series::new(long::MEASURE_UNITS.into(), measure_units).into(),
        Series::new(long::VALUE.into(), values).into(),
    ])?;

    Ok(long_df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn cleaned(columns: Vec<Column>) -> DataFrame {
        let ts = Series::new(TIMESTAMP_COLUMN.into(), vec![1_728_000_000_000_000i64; 2])
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
            .unwrap();
        let mut all = vec![ts.into()];
        all.extend(columns);
        all.push(
            Series::new(
                SOURCE_FILE_COLUMN.into(),
                ["Midville_EARLY_daily.dat", "Midville_Weekly.dat"],
            )
            .into(),
        );
        DataFrame::new(all).unwrap()
    }

    #[test]
    fn emits_one_row_per_reading() -> PolarsResult<()> {
        let df = cleaned(vec![
            Series::new("vwc_ctrl_5cm_avg_(m^3/m^3)".into(), ["0.21", "x"]).into(),
            Series::new("ec_rye_20cm_max_(ds/m)".into(), ["0.08", "0.09"]).into(),
        ]);

        let long_df =
            decompose_columns(&df, &ColumnGrammar::default(), &FilenameTokens::default()).unwrap();
        assert_eq!(long_df.height(), 4);

        let units = long_df.column(long::MEASURE_UNITS)?.str()?;
        assert_eq!(units.get(0), Some("vwc_(m^3/m^3)"));
        assert_eq!(units.get(1), Some("ec_(ds/m)"));

        let treatment = long_df.column(long::TREATMENT)?.str()?;
        assert_eq!(treatment.get(1), Some("rye"));

        let cc = long_df.column(long::CC_PLANT_TIME)?.str()?;
        assert_eq!(cc.get(0), Some("early"));
        assert_eq!(cc.get(2), None);

        let freq = long_df.column(long::DATA_FREQ)?.str()?;
        assert_eq!(freq.get(0), Some("daily"));
        assert_eq!(freq.get(3), None);

        let values = long_df.column(long::VALUE)?.f64()?;
        assert_eq!(values.get(0), Some(0.21));
        assert_eq!(values.get(2), None);
        Ok(())
    }

    #[test]
    fn malformed_column_name_fails_the_table() {
        let df = cleaned(vec![Series::new("foo_bar_baz".into(), ["1", "2"]).into()]);
        let err = decompose_columns(&df, &ColumnGrammar::default(), &FilenameTokens::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::GrammarViolation { .. }));
    }
}
