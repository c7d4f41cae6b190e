use std::path::{Path, PathBuf};

use glob::MatchOptions;
use tracing::debug;

use crate::config::SiteConfig;
use crate::error::{PipelineError, Result};

/// Sorted `*.dat` files in `dir` whose names carry the site's token.
pub fn discover_site_files(dir: &Path, site: &SiteConfig) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("*.dat").to_string_lossy().into_owned();
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::default()
    };

    let entries = glob::glob_with(&pattern, options).map_err(|err| PipelineError::Discovery {
        pattern: pattern.clone(),
        message: err.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| PipelineError::Discovery {
            pattern: pattern.clone(),
            message: err.to_string(),
        })?;
        let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
            continue;
        };
        if site.matches_file(&name) {
            files.push(path);
        }
    }
    files.sort();

    debug!(site = %site.name, files = files.len(), "Discovered raw files");
    Ok(files)
}
