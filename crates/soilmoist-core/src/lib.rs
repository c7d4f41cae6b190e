pub mod column_grammar;
pub mod config;
pub mod decompose;
pub mod deployment_window;
pub mod error;
pub mod headers;
pub mod ingestion;
pub mod partitions;
pub mod pipelines;
pub mod quality_filters;
pub mod reassemble;
pub mod summary;
pub mod types;
pub mod validation;

pub use config::{InstrumentColumn, PipelineConfig, SiteConfig};
pub use error::{PipelineError, Result};
pub use partitions::PartitionKey;
pub use pipelines::{clean_site, describe_site_columns, run_site, run_site_from_dir, SiteDataset};
pub use summary::CleaningSummary;
