#![forbid(unsafe_code)]

//! Repairs the sync store against what actually exists on Rutube.
//!
//! Matching is by exact title, since the sync uploads titles verbatim.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{info, warn};

use crate::discovery::ListedVideo;
use crate::rutube::RemoteVideo;
use crate::store::{Platform, SyncRecord, SyncRepository};

/// Rows that claim a Rutube upload the account does not have.
pub async fn find_missing(
    repo: &dyn SyncRepository,
    remote: &[RemoteVideo],
) -> Result<Vec<SyncRecord>> {
    let titles: HashSet<&str> = remote.iter().map(|video| video.title.as_str()).collect();
    let mut missing = Vec::new();
    for record in repo.list().await? {
        let Some(status) = record.rutube_status.as_deref() else {
            continue;
        };
        if status.starts_with("skipped:") {
            continue;
        }
        if record.title.trim().is_empty() {
            warn!("{} has no stored title, cannot verify it", record.external_id);
            continue;
        }
        if !titles.contains(record.title.as_str()) {
            missing.push(record);
        }
    }
    Ok(missing)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Rows removed outright.
    pub deleted: Vec<String>,
    /// Rows kept for their secondary statuses, with Rutube reset.
    pub reset: Vec<String>,
}

/// Makes missing uploads eligible again. A row that also records secondary
/// uploads only loses its Rutube status, so those uploads are not repeated.
pub async fn clean(repo: &dyn SyncRepository, remote: &[RemoteVideo]) -> Result<CleanReport> {
    let mut report = CleanReport::default();
    for record in find_missing(repo, remote).await? {
        let has_secondary = Platform::ALL
            .iter()
            .filter(|platform| !platform.is_primary())
            .any(|platform| record.status(*platform).is_some());
        if has_secondary {
            repo.clear_status(&record.external_id, Platform::Rutube)
                .await?;
            info!("reset Rutube status of \"{}\" ({})", record.title, record.external_id);
            report.reset.push(record.external_id);
        } else {
            repo.delete(&record.external_id).await?;
            info!("removed \"{}\" ({})", record.title, record.external_id);
            report.deleted.push(record.external_id);
        }
    }
    Ok(report)
}

/// Marks listed videos as synced to Rutube when an upload with the same
/// title already exists there. Returns the ids that were marked.
pub async fn import(
    repo: &dyn SyncRepository,
    listed: &[ListedVideo],
    remote: &[RemoteVideo],
) -> Result<Vec<String>> {
    let titles: HashSet<&str> = remote.iter().map(|video| video.title.as_str()).collect();
    let mut imported = Vec::new();
    for video in listed {
        if repo.is_synced(&video.id, Platform::Rutube).await? {
            continue;
        }
        if titles.contains(video.title.as_str()) {
            repo.mark_synced(&video.id, &video.title, Platform::Rutube, None)
                .await?;
            info!("matched \"{}\", marking {} as synced", video.title, video.id);
            imported.push(video.id.clone());
        }
    }
    Ok(imported)
}
