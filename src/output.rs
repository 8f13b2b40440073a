//! Artifact persistence and naming.
//!
//! Filename conventions are part of the public contract and must not
//! change:
//!
//! - merged documents: `volantino-mix-<8hexchars>-<unixmillis>.pdf`
//! - uploaded single flyers: `volantino-<unixmillis>-<random>.pdf`
//!
//! The merge id embedded in the merged filename is a short hash over the
//! sorted input ids plus the request timestamp. It is a tracing handle, not
//! a content hash: repeated identical requests intentionally produce fresh
//! files.
//!
//! Writes are atomic (temp file, then rename) and optionally mirrored to a
//! secondary directory; mirroring failures are logged and never propagate,
//! the primary write already succeeded.

use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use lopdf::Document;
use tokio::task;
use tracing::{info, warn};

use crate::config::OutputConfig;
use crate::error::MergeError;
use crate::utils::{format_file_size, random_suffix, short_hash};

/// Derive the merge id for a request: 8 hex characters over the sorted
/// input ids and the request timestamp.
pub fn merge_id(flyer_ids: &[String], timestamp_millis: i64) -> String {
    let mut sorted: Vec<&str> = flyer_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    short_hash(&format!("{}|{timestamp_millis}", sorted.join(",")), 8)
}

/// Filename for a merged document.
pub fn merged_filename(merge_id: &str, timestamp_millis: i64) -> String {
    format!("volantino-mix-{merge_id}-{timestamp_millis}.pdf")
}

/// Filename for an uploaded single flyer.
pub fn upload_filename() -> String {
    format!(
        "volantino-{}-{}.pdf",
        Utc::now().timestamp_millis(),
        random_suffix(9)
    )
}

/// A persisted merged document.
#[derive(Debug, Clone)]
pub struct MergedArtifact {
    /// Bare filename.
    pub filename: String,

    /// Full path of the primary copy.
    pub path: PathBuf,

    /// Size of the written file.
    pub byte_size: u64,
}

impl MergedArtifact {
    /// Human-formatted file size.
    pub fn format_size(&self) -> String {
        format_file_size(self.byte_size)
    }
}

/// Writes merged documents to the configured output location.
pub struct ArtifactWriter {
    config: OutputConfig,
}

impl ArtifactWriter {
    /// Create a writer for the given output configuration.
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Download reference for a persisted artifact.
    pub fn download_url(&self, filename: &str) -> String {
        format!("{}/{filename}", self.config.download_base)
    }

    /// Preview reference for a persisted artifact.
    pub fn preview_url(&self, filename: &str) -> String {
        format!("{}/{filename}", self.config.preview_base)
    }

    /// Persist a document under the given filename.
    ///
    /// The document is serialized and written to a temp file which is then
    /// renamed into place, so clients can never observe a partial artifact.
    /// A configured mirror directory receives a best-effort copy.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::PersistenceFailure`] if the primary write
    /// fails at any step.
    pub async fn write(
        &self,
        document: Document,
        filename: &str,
    ) -> Result<MergedArtifact, MergeError> {
        let output_dir = self.config.output_dir.clone();
        let final_path = output_dir.join(filename);
        let temp_path = final_path.with_extension("pdf.tmp");

        let write_path = final_path.clone();
        let byte_size = task::spawn_blocking(move || {
            std::fs::create_dir_all(&output_dir).map_err(|source| {
                MergeError::PersistenceFailure {
                    path: output_dir.clone(),
                    source,
                }
            })?;

            let mut document = document;
            let file = std::fs::File::create(&temp_path).map_err(|source| {
                MergeError::PersistenceFailure {
                    path: temp_path.clone(),
                    source,
                }
            })?;

            let mut writer = std::io::BufWriter::new(file);
            document
                .save_to(&mut writer)
                .map_err(|err| MergeError::PersistenceFailure {
                    path: temp_path.clone(),
                    source: std::io::Error::other(err),
                })?;
            writer.flush().map_err(|source| MergeError::PersistenceFailure {
                path: temp_path.clone(),
                source,
            })?;

            std::fs::rename(&temp_path, &write_path).map_err(|source| {
                MergeError::PersistenceFailure {
                    path: write_path.clone(),
                    source,
                }
            })?;

            let byte_size = std::fs::metadata(&write_path).map(|m| m.len()).unwrap_or(0);
            Ok::<_, MergeError>(byte_size)
        })
        .await
        .map_err(|err| MergeError::assembly(format!("write task failed: {err}")))??;

        let result = MergedArtifact {
            filename: filename.to_string(),
            path: final_path,
            byte_size,
        };

        info!(
            filename = %result.filename,
            size = %result.format_size(),
            "merged document persisted"
        );

        self.mirror(&result).await;

        Ok(result)
    }

    /// Best-effort copy into the secondary durable location.
    async fn mirror(&self, artifact: &MergedArtifact) {
        let Some(mirror_dir) = &self.config.mirror_dir else {
            return;
        };

        if let Err(err) = tokio::fs::create_dir_all(mirror_dir).await {
            warn!(dir = %mirror_dir.display(), error = %err, "mirror directory unavailable");
            return;
        }

        let target = mirror_dir.join(&artifact.filename);
        if let Err(err) = tokio::fs::copy(&artifact.path, &target).await {
            warn!(
                filename = %artifact.filename,
                error = %err,
                "failed to mirror merged document"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn single_page_document() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        let pages = lopdf::dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, pages.into());
        let catalog_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_merge_id_ignores_input_order() {
        let a = merge_id(&["f1".to_string(), "f2".to_string()], 1700000000000);
        let b = merge_id(&["f2".to_string(), "f1".to_string()], 1700000000000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn test_merge_id_varies_with_timestamp() {
        let ids = vec!["f1".to_string()];
        assert_ne!(merge_id(&ids, 1), merge_id(&ids, 2));
    }

    #[test]
    fn test_filename_conventions() {
        let name = merged_filename("a1b2c3d4", 1700000000000);
        assert_eq!(name, "volantino-mix-a1b2c3d4-1700000000000.pdf");

        let upload = upload_filename();
        assert!(upload.starts_with("volantino-"));
        assert!(upload.ends_with(".pdf"));
        let parts: Vec<&str> = upload
            .trim_end_matches(".pdf")
            .splitn(3, '-')
            .collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 9);
    }

    #[tokio::test]
    async fn test_write_persists_and_reports_size() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(OutputConfig::new(dir.path().to_path_buf()));

        let artifact = writer
            .write(single_page_document(), "volantino-mix-test-1.pdf")
            .await
            .unwrap();

        assert!(artifact.path.exists());
        assert!(artifact.byte_size > 0);
        assert!(!artifact.path.with_extension("pdf.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_mirrors_when_configured() {
        let primary = TempDir::new().unwrap();
        let mirror = TempDir::new().unwrap();
        let config = OutputConfig::new(primary.path().to_path_buf())
            .with_mirror(mirror.path().to_path_buf());
        let writer = ArtifactWriter::new(config);

        writer
            .write(single_page_document(), "volantino-mix-test-2.pdf")
            .await
            .unwrap();

        assert!(mirror.path().join("volantino-mix-test-2.pdf").exists());
    }

    #[tokio::test]
    async fn test_mirror_failure_is_not_fatal() {
        let primary = TempDir::new().unwrap();
        let config = OutputConfig::new(primary.path().to_path_buf())
            .with_mirror(PathBuf::from("/proc/definitely/not/writable"));
        let writer = ArtifactWriter::new(config);

        let result = writer
            .write(single_page_document(), "volantino-mix-test-3.pdf")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unwritable_primary_is_persistence_failure() {
        let config = OutputConfig::new(PathBuf::from("/proc/definitely/not/writable"));
        let writer = ArtifactWriter::new(config);

        let err = writer
            .write(single_page_document(), "volantino-mix-test-4.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::PersistenceFailure { .. }));
    }

    #[test]
    fn test_url_bases() {
        let writer = ArtifactWriter::new(OutputConfig::new(PathBuf::from("/tmp/out")));
        assert_eq!(
            writer.download_url("a.pdf"),
            "/downloads/merged/a.pdf"
        );
        assert_eq!(writer.preview_url("a.pdf"), "/preview/merged/a.pdf");
    }
}
