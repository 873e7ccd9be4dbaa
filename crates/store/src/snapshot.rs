//! JSON snapshot files for the two collections.
//!
//! Each file holds a single JSON array in the document store's camelCase
//! shape, as produced by a collection export.

use mediahub_core::types::{DailyAggregate, PerformanceEntry};
use mediahub_core::MediaHubResult;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

pub async fn load_entries(path: impl AsRef<Path>) -> MediaHubResult<Vec<PerformanceEntry>> {
    let entries: Vec<PerformanceEntry> = read_array(path.as_ref()).await?;
    info!(path = %path.as_ref().display(), count = entries.len(), "Loaded performance entries");
    Ok(entries)
}

/// Missing file means no aggregates have been computed yet.
pub async fn load_aggregates(path: impl AsRef<Path>) -> MediaHubResult<Vec<DailyAggregate>> {
    let path = path.as_ref();
    if !tokio::fs::try_exists(path).await? {
        info!(path = %path.display(), "No aggregate snapshot yet, starting empty");
        return Ok(Vec::new());
    }
    let rows: Vec<DailyAggregate> = read_array(path).await?;
    info!(path = %path.display(), count = rows.len(), "Loaded daily aggregates");
    Ok(rows)
}

/// Writes to a sibling temp file and renames it over `path`, so readers see
/// either the previous snapshot or the new one.
pub async fn save_aggregates(path: impl AsRef<Path>, rows: &[DailyAggregate]) -> MediaHubResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let json = serde_json::to_vec_pretty(rows)?;
    let tmp = temp_sibling(path);
    tokio::fs::write(&tmp, json).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    info!(path = %path.display(), count = rows.len(), "Saved daily aggregates");
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn read_array<T: DeserializeOwned>(path: &Path) -> MediaHubResult<Vec<T>> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
