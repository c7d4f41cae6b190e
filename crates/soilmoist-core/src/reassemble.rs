use std::collections::HashMap;

use polars::prelude::*;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::types::long;

type WideKey<'a> = (
    Option<i64>,
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Vacant,
    Filled(Option<f64>),
}

/// Pivots long observations to one row per
/// `(timestamp, treatment, depth, stat, cc_plant_time, data_freq)` with one `f64`
/// column per `measure_units` value, in order of first appearance.
///
/// Two observations for the same key and quantity must agree; a conflicting
/// value is a [`PipelineError::PivotCollision`]. Observations without a
/// `measure_units` value are skipped, and any column named in
/// `artifact_columns` is removed from the result. The five key columns other than
/// `timestamp` are categorical.
pub fn reassemble_wide<S: AsRef<str>>(
    long_df: &DataFrame,
    artifact_columns: &[S],
) -> Result<DataFrame> {
    let timestamps = long_df.column(long::TIMESTAMP)?.datetime()?;
    let factors = long::FACTORS
        .iter()
        .map(|name| long_df.column(name).and_then(|column| column.str()))
        .collect::<PolarsResult<Vec<_>>>()?;
    let measure_units = long_df.column(long::MEASURE_UNITS)?.str()?;
    let values = long_df.column(long::VALUE)?.f64()?;

    let mut keys: Vec<WideKey<'_>> = Vec::new();
    let mut key_index: HashMap<WideKey<'_>, usize> = HashMap::new();
    let mut column_names: Vec<&str> = Vec::new();
    let mut column_index: HashMap<&str, usize> = HashMap::new();
    let mut cells: Vec<Vec<Slot>> = Vec::new();
    let mut skipped = 0usize;

    for idx in 0..long_df.height() {
        let Some(quantity) = measure_units.get(idx) else {
            skipped += 1;
            continue;
        };

        let key: WideKey<'_> = (
            timestamps.get(idx),
            factors[0].get(idx),
            factors[1].get(idx),
            factors[2].get(idx),
            factors[3].get(idx),
            factors[4].get(idx),
        );

        let row = *key_index.entry(key).or_insert_with(|| {
            keys.push(key);
            for column in cells.iter_mut() {
                column.push(Slot::Vacant);
            }
            keys.len() - 1
        });

        let col = *column_index.entry(quantity).or_insert_with(|| {
            column_names.push(quantity);
            cells.push(vec![Slot::Vacant; keys.len()]);
            column_names.len() - 1
        });

        let value = values.get(idx);
        let slot = cells[col][row];
        match slot {
            Slot::Vacant => cells[col][row] = Slot::Filled(value),
            Slot::Filled(existing) if existing == value => {}
            Slot::Filled(_) => {
                return Err(PipelineError::PivotCollision {
                    key: format_key(&key),
                    column: quantity.to_string(),
                });
            }
        }
    }

    if skipped > 0 {
        debug!(skipped, "Skipped observations without a quantity");
    }

    let timestamp = Series::new(
        long::TIMESTAMP.into(),
        keys.iter().map(|key| key.0).collect::<Vec<_>>(),
    )
    .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;

    let mut columns: Vec<Column> = Vec::with_capacity(1 + long::FACTORS.len() + cells.len());
    columns.push(timestamp.into());

    let factor_values: [Vec<Option<&str>>; 5] = [
        keys.iter().map(|key| key.1).collect(),
        keys.iter().map(|key| key.2).collect(),
        keys.iter().map(|key| key.3).collect(),
        keys.iter().map(|key| key.4).collect(),
        keys.iter().map(|key| key.5).collect(),
    ];
    for (name, data) in long::FACTORS.iter().zip(factor_values) {
        let series = Series::new((*name).into(), data)
            .cast(&DataType::Categorical(None, CategoricalOrdering::Physical))?;
        columns.push(series.into());
    }

    let artifacts: Vec<&str> = artifact_columns.iter().map(|name| name.as_ref()).collect();
    for (name, slots) in column_names.iter().zip(cells) {
        if artifacts.contains(name) {
            debug!(column = %name, "Dropping reshape artifact column");
            continue;
        }
        let data: Vec<Option<f64>> = slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Vacant => None,
                Slot::Filled(value) => value,
            })
            .collect();
        columns.push(Series::new((*name).into(), data).into());
    }

    Ok(DataFrame::new(columns)?)
}

fn format_key(key: &WideKey<'_>) -> String {
    let field = |value: Option<&str>| value.unwrap_or("NA").to_string();
    format!(
        "(timestamp={}, treatment={}, depth={}, stat={}, cc_plant_time={}, data_freq={})",
        key.0
            .map(|micros| micros.to_string())
            .unwrap_or_else(|| "NA".to_string()),
        field(key.1),
        field(key.2),
        field(key.3),
        field(key.4),
        field(key.5),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_frame(rows: &[(i64, &str, &str, Option<f64>)]) -> DataFrame {
        let n = rows.len();
        let ts = Series::new(
            long::TIMESTAMP.into(),
            rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        )
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
        .unwrap();
        DataFrame::new(vec![
            ts.into(),
            Series::new(
                long::TREATMENT.into(),
                rows.iter().map(|r| r.1).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(long::DEPTH.into(), vec!["5cm"; n]).into(),
            Series::new(long::STAT.into(), vec!["avg"; n]).into(),
            Series::new(long::CC_PLANT_TIME.into(), vec!["early"; n]).into(),
            Series::new(long::DATA_FREQ.into(), vec!["daily"; n]).into(),
            Series::new(
                long::MEASURE_UNITS.into(),
                rows.iter().map(|r| r.2).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                long::VALUE.into(),
                rows.iter().map(|r| r.3).collect::<Vec<_>>(),
            )
            .into(),
        ])
        .unwrap()
    }

    #[test]
    fn pivots_quantities_into_columns() -> PolarsResult<()> {
        let long_df = long_frame(&[
            (0, "ctrl", "vwc_(m^3/m^3)", Some(0.2)),
            (0, "ctrl", "ec_(ds/m)", Some(0.05)),
            (0, "rye", "vwc_(m^3/m^3)", Some(0.3)),
            (1, "ctrl", "vwc_(m^3/m^3)", Some(0.25)),
        ]);
        let wide = reassemble_wide(&long_df, &["timestamp_NA"]).unwrap();

        assert_eq!(wide.height(), 3);
        assert_eq!(wide.width(), 8);
        let ec = wide.column("ec_(ds/m)")?.f64()?;
        assert_eq!(ec.get(0), Some(0.05));
        assert_eq!(ec.get(1), None);
        assert!(matches!(
            wide.column(long::TREATMENT)?.dtype(),
            DataType::Categorical(_, _)
        ));
        Ok(())
    }

    #[test]
    fn conflicting_values_for_a_key_are_rejected() {
        let long_df = long_frame(&[
            (0, "ctrl", "vwc_(m^3/m^3)", Some(0.2)),
            (0, "ctrl", "vwc_(m^3/m^3)", Some(0.4)),
        ]);
        let err = reassemble_wide(&long_df, &["timestamp_NA"]).unwrap_err();
        match err {
            PipelineError::PivotCollision { column, key } => {
                assert_eq!(column, "vwc_(m^3/m^3)");
                assert!(key.contains("treatment=ctrl"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn identical_repeats_collapse() {
        let long_df = long_frame(&[
            (0, "ctrl", "vwc_(m^3/m^3)", Some(0.2)),
            (0, "ctrl", "vwc_(m^3/m^3)", Some(0.2)),
        ]);
        let wide = reassemble_wide(&long_df, &["timestamp_NA"]).unwrap();
        assert_eq!(wide.height(), 1);
    }

    #[test]
    fn artifact_columns_are_dropped() {
        let long_df = long_frame(&[
            (0, "ctrl", "vwc_(m^3/m^3)", Some(0.2)),
            (0, "ctrl", "timestamp_NA", None),
        ]);
        let wide = reassemble_wide(&long_df, &["timestamp_NA"]).unwrap();
        assert!(wide.column("timestamp_NA").is_err());
        assert!(wide.column("vwc_(m^3/m^3)").is_ok());
    }
}
