use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;
use soilmoist_core::{
    column_grammar::ColumnName, describe_site_columns, ingestion::discover_site_files,
    run_site_from_dir, CleaningSummary, PipelineConfig, SiteConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Soil moisture logger cleaning pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean every configured (or selected) site and print per-stage row counts
    Clean(CleanArgs),
    /// Print the facets decoded from a site's measurement column names
    Columns(ColumnsArgs),
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Directory holding the raw `.dat` logger files
    #[arg(long)]
    data_dir: PathBuf,
    /// Pipeline configuration (TOML); falls back to SOILMOIST_CONFIG, then built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Restrict the run to these sites (repeatable)
    #[arg(long = "site")]
    sites: Vec<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct ColumnsArgs {
    #[arg(long)]
    data_dir: PathBuf,
    #[arg(long)]
    site: String,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Serialize)]
struct CleanReport<'a> {
    sites: Vec<&'a CleaningSummary>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Clean(args) => handle_clean(args),
        Command::Columns(args) => handle_columns(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| env::var_os("SOILMOIST_CONFIG").map(PathBuf::from));

    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading pipeline configuration");
            PipelineConfig::from_path(&path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn select_sites<'a>(config: &'a PipelineConfig, names: &[String]) -> Result<Vec<&'a SiteConfig>> {
    if names.is_empty() {
        return Ok(config.sites.iter().collect());
    }

    names
        .iter()
        .map(|name| {
            config
                .site(name)
                .with_context(|| format!("site '{name}' is not configured"))
        })
        .collect()
}

fn handle_clean(args: CleanArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let sites = select_sites(&config, &args.sites)?;

    let mut datasets = Vec::with_capacity(sites.len());
    for site in sites {
        let dataset = run_site_from_dir(site, &config, &args.data_dir)
            .with_context(|| format!("failed to clean site '{}'", site.name))?;
        datasets.push(dataset);
    }

    match args.format {
        OutputFormat::Json => {
            let report = CleanReport {
                sites: datasets.iter().map(|dataset| &dataset.summary).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            for dataset in &datasets {
                print_summary(&dataset.summary);
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &CleaningSummary) {
    println!("Site: {} ({} files)", summary.site, summary.files.len());

    let mut stages = Table::new();
    stages.load_preset(UTF8_FULL).set_header(vec!["Stage", "Rows"]);
    for (stage, rows) in summary.stage_counts() {
        stages.add_row(vec![stage.to_string(), rows.to_string()]);
    }
    println!("{stages}");

    let mut partitions = Table::new();
    partitions
        .load_preset(UTF8_FULL)
        .set_header(vec!["Statistic", "Frequency", "Rows"]);
    for count in &summary.partitions {
        partitions.add_row(vec![
            count.key.statistic.to_string(),
            count.key.data_freq.to_string(),
            count.rows.to_string(),
        ]);
    }
    println!("{partitions}");
}

fn handle_columns(args: ColumnsArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let site = config
        .site(&args.site)
        .with_context(|| format!("site '{}' is not configured", args.site))?;

    let files = discover_site_files(&args.data_dir, site)?;
    if files.is_empty() {
        bail!(
            "no .dat files for site '{}' in {}",
            site.name,
            args.data_dir.display()
        );
    }

    let columns = describe_site_columns(site, &config, &files)?;
    print_columns(&columns);
    Ok(())
}

fn print_columns(columns: &[ColumnName]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Column",
        "Measure",
        "Treatment",
        "Depth",
        "Stat",
        "Units",
        "Quantity",
    ]);
    for column in columns {
        table.add_row(vec![
            column.column.as_str(),
            column.measure.as_str(),
            column.treatment.as_str(),
            column.depth.as_str(),
            column.stat.as_str(),
            column.units.as_str(),
            column.measure_units.as_str(),
        ]);
    }
    println!("{table}");
}
