use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "pdfbucket";

pub struct LibraryPaths {
    pub bookmarks_file: PathBuf,
}

/// Directory-safe name for a bucket, so bookmarks of different buckets never mix.
/// Anything outside `[A-Za-z0-9.-]` becomes `_`; an empty name maps to `default`.
pub fn bucket_slug(bucket: &str) -> String {
    let slug: String = bucket
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if slug.is_empty() {
        "default".to_string()
    } else {
        slug
    }
}

/// Compute XDG-compliant data paths for a bucket.
/// Creates the directories if they don't exist.
pub fn resolve_library_paths(bucket: &str) -> Result<LibraryPaths> {
    let data_root = dirs::data_dir().context("Could not determine data directory")?;
    resolve_library_paths_in(&data_root, bucket)
}

pub fn resolve_library_paths_in(data_root: &Path, bucket: &str) -> Result<LibraryPaths> {
    let data_dir = data_root
        .join(APP_NAME)
        .join("buckets")
        .join(bucket_slug(bucket));

    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {data_dir:?}"))?;

    Ok(LibraryPaths {
        bookmarks_file: data_dir.join("bookmarks.json"),
    })
}

/// Compute the XDG-compliant log file path (not per-bucket).
/// Uses `state_dir` on platforms that have it, falls back to `cache_dir`.
pub fn resolve_log_path() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine state or cache directory")?;

    let log_dir = base.join(APP_NAME);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {log_dir:?}"))?;

    Ok(log_dir.join("pdfbucket.log"))
}
