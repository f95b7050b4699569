//! Input discovery
//!
//! Each CLI input is a file, a directory or a glob pattern. Directories are
//! walked for `.ndjson` files. Expansion order is deterministic so the loaded
//! row order only depends on the arguments.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error_handling::{ReportError, ReportResult};

const NDJSON_EXTENSION: &str = "ndjson";

fn is_glob(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

fn walk_ndjson(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == NDJSON_EXTENSION))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn expand_glob(pattern: &str) -> ReportResult<Vec<PathBuf>> {
    let paths = glob::glob(pattern).map_err(|e| {
        ReportError::configuration_with_source(
            format!("Invalid input pattern {}", pattern),
            e.into(),
        )
    })?;
    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable match for {}: {}", pattern, e),
        }
    }
    if files.is_empty() {
        warn!("Pattern {} matched no files", pattern);
    }
    Ok(files)
}

/// Expand inputs into the ordered list of files to read.
///
/// Plain paths pass through untouched; a missing file surfaces later as an
/// IO error from the loader.
pub fn resolve_inputs<S: AsRef<str>>(inputs: &[S]) -> ReportResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        let path = Path::new(input);
        if path.is_dir() {
            let found = walk_ndjson(path);
            debug!("{} NDJSON files under {}", found.len(), path.display());
            files.extend(found);
        } else if is_glob(input) && !path.exists() {
            files.extend(expand_glob(input)?);
        } else {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(ReportError::configuration("No input files to read"));
    }
    Ok(files)
}
