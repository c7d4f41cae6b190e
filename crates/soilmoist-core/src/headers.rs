use std::collections::HashSet;

use polars::prelude::*;
use soilmoist_parser::{UnitsHeader, SOURCE_FILE_COLUMN};
use tracing::debug;

use crate::config::InstrumentColumn;
use crate::error::{PipelineError, Result};

/// Rows at the top of a merged batch that are not readings: the units row and
/// the sentinel row beneath it.
const HEADER_ROWS: usize = 2;

#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub df: DataFrame,
    pub units: UnitsHeader,
}

/// Fuses each raw column name with its unit, drops logger housekeeping columns and
/// snake-cases the result.
///
/// The first row of `raw` supplies the units; it and the sentinel row after it are
/// removed. `source_file` carries no unit and keeps its name.
pub fn normalize_headers(
    raw: &DataFrame,
    instrumentation: &[InstrumentColumn],
) -> Result<NormalizedTable> {
    let units = UnitsHeader::from_first_row(raw).map_err(|_| PipelineError::MissingUnits)?;

    let labels: Vec<String> = raw
        .get_columns()
        .iter()
        .map(|column| {
            let name = column.name().as_str();
            if name == SOURCE_FILE_COLUMN {
                "source file".to_string()
            } else {
                format!("{name}_({})", units.unit(name).unwrap_or_default())
            }
        })
        .collect();

    let drop_labels: Vec<String> = instrumentation.iter().map(InstrumentColumn::label).collect();
    let missing: Vec<String> = drop_labels
        .iter()
        .filter(|label| !labels.contains(label))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::UnknownColumnLayout { missing });
    }

    let body = raw.slice(HEADER_ROWS as i64, raw.height().saturating_sub(HEADER_ROWS));

    let mut seen = HashSet::new();
    let mut columns: Vec<Column> = Vec::with_capacity(labels.len());
    for (column, label) in body.get_columns().iter().zip(&labels) {
        if drop_labels.contains(label) {
            debug!(column = %label, "Dropping instrumentation column");
            continue;
        }

        let normalized = normalize_name(label);
        if !seen.insert(normalized.clone()) {
            return Err(PipelineError::ColumnCollision { column: normalized });
        }

        let mut series = column.as_materialized_series().clone();
        series.rename(normalized.into());
        columns.push(series.into());
    }

    let df = DataFrame::new(columns)?;
    Ok(NormalizedTable { df, units })
}

/// Lowercases and replaces whitespace with underscores.
pub fn normalize_name(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c.to_ascii_lowercase() })
        .collect()
}
