use std::collections::HashSet;
use std::fs;
use std::path::Path;

use csv::{StringRecord, StringRecordsIter};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::errors::ParserError;
use crate::model::{FilenameTokens, LoggerFile, RawFileSummary, RawTable};

pub const SOURCE_FILE_COLUMN: &str = "source_file";

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Raw column count every file of the batch must carry, when known.
    pub expected_column_count: Option<usize>,
    pub filename_tokens: FilenameTokens,
}

/// Reads and merges every raw file for one site.
pub fn read_site_files<P: AsRef<Path>>(
    paths: &[P],
    options: &ReadOptions,
) -> Result<RawTable, ParserError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(read_logger_file(path.as_ref())?);
    }
    merge_logger_files(files, options)
}

pub fn read_logger_file(path: &Path) -> Result<LoggerFile, ParserError> {
    let content = fs::read_to_string(path).map_err(|source| ParserError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let source_file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_logger_file(&source_file, &content)
}

/// Parses one logger export: a preamble line, the column header, then every
/// remaining line (units row and sentinel row included) as a data row. A file
/// that ends before its units or sentinel row is rejected.
pub fn parse_logger_file(source_file: &str, content: &str) -> Result<LoggerFile, ParserError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut records = reader.records();

    let preamble = next_record(&mut records, source_file, "preamble")?;
    let header = next_record(&mut records, source_file, "column header")?;

    let columns: Vec<String> = header.iter().map(|c| c.trim().to_string()).collect();
    let mut seen = HashSet::with_capacity(columns.len());
    for column in &columns {
        if !seen.insert(column.as_str()) {
            return Err(ParserError::DuplicateColumn {
                file: source_file.to_string(),
                column: column.clone(),
            });
        }
    }

    let mut rows = Vec::new();
    for (row_idx, record) in records.enumerate() {
        let record = record.map_err(|source| ParserError::Csv {
            file: source_file.to_string(),
            source,
        })?;
        // 1-indexed, after the preamble and header lines
        let line_index = row_idx + 3;
        if record.len() > columns.len() {
            return Err(ParserError::DataRow {
                file: source_file.to_string(),
                line_index,
                message: format!(
                    "expected at most {} columns but found {}",
                    columns.len(),
                    record.len()
                ),
            });
        }
        let mut row: Vec<Option<String>> = record.iter().map(|v| Some(v.to_string())).collect();
        row.resize(columns.len(), None);
        rows.push(row);
    }

    for (position, row) in [(0, "units"), (1, "sentinel")] {
        if rows.len() <= position {
            return Err(ParserError::MissingHeader {
                file: source_file.to_string(),
                row,
            });
        }
    }

    debug!(file = source_file, rows = rows.len(), "Parsed logger file");

    Ok(LoggerFile {
        source_file: source_file.to_string(),
        preamble: preamble.iter().map(str::to_string).collect(),
        columns,
        rows,
    })
}

fn next_record(
    records: &mut StringRecordsIter<'_, &[u8]>,
    source_file: &str,
    row: &'static str,
) -> Result<StringRecord, ParserError> {
    records
        .next()
        .ok_or_else(|| ParserError::MissingHeader {
            file: source_file.to_string(),
            row,
        })?
        .map_err(|source| ParserError::Csv {
            file: source_file.to_string(),
            source,
        })
}

/// Row-wise union of a site's files, aligned on the first file's column order.
///
/// Every file must carry the same column set and the same units row; a
/// difference is a schema mismatch rather than a gap to fill.
pub fn merge_logger_files(
    files: Vec<LoggerFile>,
    options: &ReadOptions,
) -> Result<RawTable, ParserError> {
    let Some(reference) = files.first() else {
        return Err(ParserError::EmptyBatch);
    };
    let reference_name = reference.source_file.clone();
    let reference_columns = reference.columns.clone();
    let reference_units: Vec<Option<String>> = reference
        .units()
        .map(|units| units.to_vec())
        .unwrap_or_default();

    let total_rows: usize = files.iter().map(|file| file.rows.len()).sum();
    let mut values: Vec<Vec<Option<String>>> = reference_columns
        .iter()
        .map(|_| Vec::with_capacity(total_rows))
        .collect();
    let mut source_files: Vec<String> = Vec::with_capacity(total_rows);
    let mut summaries = Vec::with_capacity(files.len());

    for file in &files {
        if let Some(expected) = options.expected_column_count {
            if file.columns.len() != expected {
                return Err(ParserError::ColumnCount {
                    file: file.source_file.clone(),
                    expected,
                    found: file.columns.len(),
                });
            }
        }

        let positions = align_columns(&reference_name, &reference_columns, file)?;

        if let Some(units) = file.units() {
            for (ref_idx, &file_idx) in positions.iter().enumerate() {
                let found = normalize_unit(units[file_idx].as_deref());
                let expected = normalize_unit(reference_units.get(ref_idx).and_then(Option::as_deref));
                if found != expected {
                    return Err(ParserError::SchemaMismatch {
                        file: file.source_file.clone(),
                        reference: reference_name.clone(),
                        message: format!(
                            "unit for column '{}' is '{found}', expected '{expected}'",
                            reference_columns[ref_idx]
                        ),
                    });
                }
            }
        }

        let metadata = options
            .filename_tokens
            .resolve_checked(&file.source_file)?;
        if metadata.cc_plant_time.is_none() || metadata.data_freq.is_none() {
            warn!(
                file = %file.source_file,
                "File name is missing a planting-time or frequency token; its rows will be dropped"
            );
        }

        for row in &file.rows {
            for (ref_idx, &file_idx) in positions.iter().enumerate() {
                values[ref_idx].push(row[file_idx].clone());
            }
            source_files.push(file.source_file.clone());
        }

        summaries.push(RawFileSummary {
            source_file: file.source_file.clone(),
            row_count: file.rows.len(),
            metadata,
        });
    }

    let mut columns: Vec<Column> = Vec::with_capacity(reference_columns.len() + 1);
    for (name, data) in reference_columns.iter().zip(values) {
        columns.push(Series::new(name.as_str().into(), data).into());
    }
    columns.push(Series::new(SOURCE_FILE_COLUMN.into(), source_files).into());

    let df = DataFrame::new(columns)?;
    info!(files = summaries.len(), rows = df.height(), "Merged raw files");

    Ok(RawTable {
        df,
        files: summaries,
    })
}

/// For each reference column, its position in `file`.
fn align_columns(
    reference_name: &str,
    reference_columns: &[String],
    file: &LoggerFile,
) -> Result<Vec<usize>, ParserError> {
    let missing: Vec<&str> = reference_columns
        .iter()
        .filter(|column| !file.columns.contains(column))
        .map(String::as_str)
        .collect();
    let unexpected: Vec<&str> = file
        .columns
        .iter()
        .filter(|column| !reference_columns.contains(column))
        .map(String::as_str)
        .collect();

    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(ParserError::SchemaMismatch {
            file: file.source_file.clone(),
            reference: reference_name.to_string(),
            message: format!("missing columns {missing:?}, unexpected columns {unexpected:?}"),
        });
    }

    Ok(reference_columns
        .iter()
        .filter_map(|column| file.columns.iter().position(|c| c == column))
        .collect())
}

fn normalize_unit(unit: Option<&str>) -> &str {
    unit.map(str::trim).unwrap_or_default()
}
