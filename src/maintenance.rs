//! Periodic cleanup, exposed as plain functions for the scheduler to call.
//!
//! Two jobs: hard-delete expired flyer records (removing their PDF file as
//! a best-effort side effect), and sweep stale merged artifacts out of the
//! output directory. Both report what they did instead of failing halfway:
//! a file that cannot be removed is counted, logged and left behind.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use globset::Glob;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::MergeError;
use crate::store::FlyerStore;

/// Result of an expired-flyer purge.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Records hard-deleted from the store.
    pub records_deleted: usize,

    /// Underlying PDF files removed.
    pub files_deleted: usize,

    /// PDF files that could not be removed.
    pub files_failed: usize,
}

/// Result of a merged-artifact sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Artifacts removed.
    pub files_deleted: usize,

    /// Artifacts that could not be removed.
    pub files_failed: usize,

    /// Bytes reclaimed.
    pub bytes_reclaimed: u64,
}

/// Hard-delete every flyer whose validity window ended before `cutoff`.
///
/// The record is removed first; the PDF file removal is best-effort and
/// only counted in the report.
///
/// # Errors
///
/// Returns [`MergeError::Store`] on storage faults; file-level failures
/// never propagate.
pub async fn purge_expired_flyers(
    store: &Arc<dyn FlyerStore>,
    cutoff: DateTime<Utc>,
) -> Result<CleanupReport, MergeError> {
    let expired = store.find_expired(cutoff).await?;
    let mut report = CleanupReport::default();

    for flyer in expired {
        if store.delete_by_id(&flyer.id).await?.is_none() {
            continue;
        }
        report.records_deleted += 1;

        if let Some(path) = &flyer.pdf_path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => report.files_deleted += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(
                        flyer_id = %flyer.id,
                        path = %path.display(),
                        error = %err,
                        "could not remove expired flyer file"
                    );
                    report.files_failed += 1;
                }
            }
        }
    }

    info!(
        records = report.records_deleted,
        files = report.files_deleted,
        failed = report.files_failed,
        "expired flyer purge complete"
    );
    Ok(report)
}

/// Delete merged artifacts older than `max_age` from the output directory.
///
/// Only files matching the `volantino-mix-*.pdf` convention are touched.
///
/// # Errors
///
/// Returns [`MergeError::Assembly`] only if the glob itself fails to
/// compile; an unreadable directory yields an empty report.
pub fn sweep_merged_artifacts(dir: &Path, max_age: Duration) -> Result<SweepReport, MergeError> {
    let matcher = Glob::new("volantino-mix-*.pdf")
        .map_err(|err| MergeError::assembly(format!("bad sweep pattern: {err}")))?
        .compile_matcher();

    let now = SystemTime::now();
    let mut report = SweepReport::default();

    for entry in WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        if !entry.file_type().is_file() || !matcher.is_match(entry.file_name()) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let stale = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > max_age);
        if !stale {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                report.files_deleted += 1;
                report.bytes_reclaimed += metadata.len();
            }
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "could not sweep artifact");
                report.files_failed += 1;
            }
        }
    }

    info!(
        deleted = report.files_deleted,
        reclaimed = report.bytes_reclaimed,
        "artifact sweep complete"
    );
    Ok(report)
}
