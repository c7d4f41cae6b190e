use std::collections::BTreeMap;
use std::path::Path;

use polars::prelude::DataFrame;
use soilmoist_parser::{read_site_files, RawTable};
use tracing::{info, instrument};

use crate::{
    column_grammar::ColumnName,
    config::{PipelineConfig, SiteConfig},
    decompose::decompose_columns,
    deployment_window::apply_deployment_window,
    error::Result,
    headers::normalize_headers,
    ingestion::discover_site_files,
    partitions::{partition_table, PartitionKey},
    quality_filters::apply_validity_filters,
    reassemble::reassemble_wide,
    summary::{CleaningSummary, PartitionCount},
    types::{DataFrequency, Statistic},
    validation::validate_records,
};

/// Cleaned wide table for one site and its six `(statistic, data_freq)` slices.
#[derive(Debug, Clone)]
pub struct SiteDataset {
    pub site: String,
    pub table: DataFrame,
    pub partitions: BTreeMap<PartitionKey, DataFrame>,
    pub summary: CleaningSummary,
}

impl SiteDataset {
    pub fn partition(&self, statistic: Statistic, data_freq: DataFrequency) -> Option<&DataFrame> {
        self.partitions
            .get(&PartitionKey::new(statistic, data_freq))
    }
}

pub fn run_site_from_dir(
    site: &SiteConfig,
    config: &PipelineConfig,
    dir: &Path,
) -> Result<SiteDataset> {
    let files = discover_site_files(dir, site)?;
    run_site(site, config, &files)
}

#[instrument(skip_all, fields(site = %site.name))]
pub fn run_site<P: AsRef<Path>>(
    site: &SiteConfig,
    config: &PipelineConfig,
    files: &[P],
) -> Result<SiteDataset> {
    let raw = read_site_files(files, &config.read_options(site))?;
    clean_site(site, config, raw)
}

/// Runs every stage after the raw read. Each stage consumes the previous table
/// by reference and produces a new one.
pub fn clean_site(site: &SiteConfig, config: &PipelineConfig, raw: RawTable) -> Result<SiteDataset> {
    let mut summary = CleaningSummary {
        site: site.name.clone(),
        raw_rows: raw.df.height(),
        files: raw.files,
        ..CleaningSummary::default()
    };

    let normalized = normalize_headers(&raw.df, &config.instrumentation_columns)?;
    summary.normalized_rows = normalized.df.height();

    let validated = validate_records(
        &normalized.df,
        &config.timestamp_column,
        &config.missing_tokens,
        &config.timestamp_formats,
    )?;
    summary.validated_rows = validated.height();

    let windowed = apply_deployment_window(&validated, &site.deployment_window())?;
    summary.windowed_rows = windowed.height();

    let long_df = decompose_columns(&windowed, &config.grammar, &config.filename_tokens)?;
    summary.long_rows = long_df.height();

    let wide = reassemble_wide(&long_df, &config.pivot_artifact_columns)?;
    summary.wide_rows = wide.height();

    let table = apply_validity_filters(&wide, &config.validity_rules)?;
    summary.valid_rows = table.height();

    let partitions = partition_table(&table)?;
    summary.partitions = partitions
        .iter()
        .map(|(key, df)| PartitionCount {
            key: *key,
            rows: df.height(),
        })
        .collect();

    info!(
        raw_rows = summary.raw_rows,
        validated_rows = summary.validated_rows,
        windowed_rows = summary.windowed_rows,
        wide_rows = summary.wide_rows,
        valid_rows = summary.valid_rows,
        "Site cleaned"
    );

    Ok(SiteDataset {
        site: site.name.clone(),
        table,
        partitions,
        summary,
    })
}

/// Decomposes a site's measurement columns without processing any rows.
pub fn describe_site_columns<P: AsRef<Path>>(
    site: &SiteConfig,
    config: &PipelineConfig,
    files: &[P],
) -> Result<Vec<ColumnName>> {
    let raw = read_site_files(files, &config.read_options(site))?;
    let normalized = normalize_headers(&raw.df, &config.instrumentation_columns)?;
    let measurements = normalized.df.drop(&config.timestamp_column)?;
    config.grammar.describe_columns(&measurements)
}
