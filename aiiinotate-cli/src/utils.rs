//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::exit_codes::{PARSE_FAILURE, READ_FAILURE};

/// Expand list files into the JSON paths they name.
///
/// Each list file holds one path per line. Blank lines and lines starting
/// with `#` are skipped; relative paths are taken from the list file's
/// directory.
pub fn expand_list_files(list_files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for list in list_files {
        let content = std::fs::read_to_string(list)
            .with_context(|| format!("{READ_FAILURE}: {}", list.display()))?;
        let base = list.parent().unwrap_or_else(|| Path::new(""));

        let before = paths.len();
        paths.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(|line| base.join(line)),
        );
        debug!(list = %list.display(), entries = paths.len() - before, "Expanded list file");
    }
    Ok(paths)
}

/// Read and parse every file, failing on the first unreadable or non-JSON one.
///
/// Runs to completion before any import starts, so a bad path never leaves a
/// half-imported batch behind.
pub fn read_json_files(paths: &[PathBuf]) -> Result<Vec<(PathBuf, Value)>> {
    if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
        anyhow::bail!("{READ_FAILURE}: {} (not found)", missing.display());
    }

    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("{READ_FAILURE}: {}", path.display()))?;
            let value = serde_json::from_slice(&bytes)
                .with_context(|| format!("{PARSE_FAILURE}: {}", path.display()))?;
            Ok((path.clone(), value))
        })
        .collect()
}
