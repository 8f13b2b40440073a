//! The ingestion gate.
//!
//! Every flyer enters the system through [`FlyerIngestor::ingest`]: field
//! validation first, then the duplicate check, then, depending on the
//! verdict, create, skip, or replace. Scrapers and the upload endpoint
//! both sit on top of this; neither talks to the store directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::dedup::{
    DuplicateCandidate, DuplicateChecker, DuplicateCheckOptions, DuplicateVerdict,
    RecommendedAction,
};
use crate::error::MergeError;
use crate::model::Flyer;
use crate::output::upload_filename;
use crate::store::FlyerStore;
use crate::utils::{content_hash, format_file_size, generate_id};

/// What happened to an ingestion candidate.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum IngestOutcome {
    /// No duplicate found; the record was created.
    Created {
        /// The stored record.
        flyer: Flyer,
    },

    /// A duplicate was found and the candidate was dropped.
    Skipped {
        /// The verdict that caused the skip.
        verdict: DuplicateVerdict,
    },

    /// Matched records were removed and the candidate stored in their
    /// place.
    Replaced {
        /// Ids of the removed records.
        removed: Vec<String>,
        /// The stored record.
        flyer: Flyer,
    },
}

/// An uploaded PDF staged on disk, ready to be attached to a candidate
/// record.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    /// Bare filename, following the upload naming convention.
    pub filename: String,

    /// Full path of the staged file.
    pub path: PathBuf,

    /// Hex SHA-256 of the uploaded bytes.
    pub file_hash: String,

    /// Human-formatted size of the upload.
    pub file_size: String,
}

/// Boundary between the outside world and the flyer store.
pub struct FlyerIngestor {
    store: Arc<dyn FlyerStore>,
    checker: DuplicateChecker,
}

impl FlyerIngestor {
    /// Create an ingestor over the given store.
    pub fn new(store: Arc<dyn FlyerStore>) -> Self {
        let checker = DuplicateChecker::new(Arc::clone(&store));
        Self { store, checker }
    }

    /// Stage uploaded PDF bytes into `uploads_dir` under the
    /// `volantino-<unixmillis>-<random>.pdf` convention.
    ///
    /// The caller attaches the returned path and hash to the candidate
    /// before calling [`ingest`](Self::ingest); the precomputed hash lets
    /// the duplicate check compare digests without re-reading the file.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Io`] when the directory cannot be created or
    /// the file cannot be written.
    pub async fn stage_upload(
        &self,
        uploads_dir: &Path,
        bytes: &[u8],
    ) -> Result<StagedUpload, MergeError> {
        tokio::fs::create_dir_all(uploads_dir).await?;

        let filename = upload_filename();
        let path = uploads_dir.join(&filename);
        tokio::fs::write(&path, bytes).await?;

        info!(filename = %filename, size = bytes.len(), "upload staged");
        Ok(StagedUpload {
            filename,
            path,
            file_hash: content_hash(bytes),
            file_size: format_file_size(bytes.len() as u64),
        })
    }

    /// Validate, duplicate-check and store a candidate flyer.
    ///
    /// A blank id is assigned a generated one. Duplicate handling follows
    /// the verdict's recommended action.
    ///
    /// # Errors
    ///
    /// - [`MergeError::InvalidInput`] when field validation fails.
    /// - [`MergeError::Store`] on storage faults.
    pub async fn ingest(
        &self,
        mut flyer: Flyer,
        options: &DuplicateCheckOptions,
    ) -> Result<IngestOutcome, MergeError> {
        if flyer.id.trim().is_empty() {
            flyer.id = generate_id();
        }

        if let Err(field_errors) = flyer.validate() {
            let summary: Vec<String> = field_errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(MergeError::invalid_input(summary.join("; ")));
        }

        let candidate = DuplicateCandidate::from(&flyer);
        let verdict = self.checker.check(&candidate, options).await?;

        match verdict.action {
            RecommendedAction::Proceed => {
                let stored = self.store.create(flyer).await?;
                info!(flyer_id = %stored.id, store = %stored.store, "flyer ingested");
                Ok(IngestOutcome::Created { flyer: stored })
            }
            RecommendedAction::Skip => {
                info!(
                    store = %flyer.store,
                    duplicates = verdict.duplicates_found,
                    "flyer skipped as duplicate"
                );
                Ok(IngestOutcome::Skipped { verdict })
            }
            RecommendedAction::Replace => {
                let mut removed = Vec::with_capacity(verdict.duplicates_found);
                for duplicate in &verdict.duplicates {
                    if self.store.delete_by_id(&duplicate.flyer.id).await?.is_some() {
                        removed.push(duplicate.flyer.id.clone());
                    }
                }
                let stored = self.store.create(flyer).await?;
                info!(
                    flyer_id = %stored.id,
                    replaced = removed.len(),
                    "flyer replaced existing duplicates"
                );
                Ok(IngestOutcome::Replaced {
                    removed,
                    flyer: stored,
                })
            }
        }
    }
}
