//! Error types for the flyer merge engine.
//!
//! Two families live here:
//!
//! - [`SourceError`]: per-flyer PDF retrieval failures, carrying a
//!   [`SourceErrorKind`] classification. These are always absorbed by the
//!   merge orchestrator (placeholder page) and never abort a merge.
//! - [`MergeError`]: everything that can abort an operation, from invalid
//!   input and a fully unresolvable flyer set to storage faults and
//!   failures while persisting the final artifact.
//!
//! Duplicate detection deliberately has no error of its own: a detected
//! duplicate is a verdict, not a failure.

use std::io;
use std::path::PathBuf;

/// Result type alias for merge-engine operations.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Classification of a PDF retrieval failure.
///
/// The classification drives the message rendered on the placeholder page
/// that substitutes the missing flyer, so each kind maps to a stable
/// user-facing label via [`SourceErrorKind::reason_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceErrorKind {
    /// Remote URL answered HTTP 404.
    UrlNotFound,
    /// Local file missing (ENOENT, including exhausted directory probing).
    FileNotFound,
    /// Remote URL answered with a non-2xx status other than 404.
    HttpError,
    /// Bytes were retrieved but did not parse as a PDF with at least one page.
    CorruptDocument,
    /// Anything else: timeouts, connection failures, permission errors.
    Other,
}

impl SourceErrorKind {
    /// Human-readable reason printed on the placeholder page.
    pub fn reason_label(&self) -> &'static str {
        match self {
            Self::UrlNotFound => "no longer available",
            Self::FileNotFound => "file missing on server",
            Self::HttpError | Self::CorruptDocument | Self::Other => "loading error",
        }
    }
}

/// A per-flyer PDF retrieval failure.
///
/// Carries enough context (flyer id, attempted source, raw detail) to debug
/// a failed resolution from the logs without reproducing it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to resolve PDF for flyer {flyer_id} from {attempted}: {detail}")]
pub struct SourceError {
    /// Classified failure kind.
    pub kind: SourceErrorKind,

    /// Id of the flyer whose PDF could not be retrieved.
    pub flyer_id: String,

    /// The source that was attempted last (path or URL).
    pub attempted: String,

    /// Raw underlying error text.
    pub detail: String,
}

impl SourceError {
    /// Create a new source error.
    pub fn new(
        kind: SourceErrorKind,
        flyer_id: impl Into<String>,
        attempted: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            flyer_id: flyer_id.into(),
            attempted: attempted.into(),
            detail: detail.into(),
        }
    }
}

/// Storage adapter failure.
///
/// Implementations map their backend errors onto these variants; the engine
/// treats anything other than [`StoreError::NotFound`] as opaque.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// No record with the given id.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A record with the same id already exists.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// Backend-specific failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Main error type for merge-engine operations.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Malformed, empty or over-limit request. Rejected before any I/O.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What is wrong with the request.
        message: String,
    },

    /// Zero flyers out of the requested set could be resolved.
    ///
    /// The only fatal condition a merge can hit once input validation has
    /// passed and before persistence starts.
    #[error("no flyers available to merge: {requested} requested, {found} found")]
    TotalFailure {
        /// Number of flyer ids in the request.
        requested: usize,
        /// Number of active records the store returned.
        found: usize,
    },

    /// Writing the final artifact failed. Assembly work is discarded.
    #[error("failed to persist merged document at {}: {source}", path.display())]
    PersistenceFailure {
        /// Path the engine attempted to write.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Building the output document failed (page tree manipulation,
    /// content encoding).
    #[error("document assembly failed: {reason}")]
    Assembly {
        /// Description of what went wrong.
        reason: String,
    },

    /// Storage adapter fault.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A retrieval failure escalated outside the merge loop (e.g. an
    /// explicit single-flyer resolution requested by a caller).
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MergeError {
    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an Assembly error.
    pub fn assembly(reason: impl Into<String>) -> Self {
        Self::Assembly {
            reason: reason.into(),
        }
    }

    /// Check if this error is recoverable within a merge call.
    ///
    /// Recoverable errors are absorbed into placeholder pages or empty ad
    /// slots; everything else propagates to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Source(_) | Self::Store(_))
    }

    /// Check if this error must abort the merge call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::TotalFailure { .. }
                | Self::PersistenceFailure { .. }
                | Self::Assembly { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_labels() {
        assert_eq!(
            SourceErrorKind::UrlNotFound.reason_label(),
            "no longer available"
        );
        assert_eq!(
            SourceErrorKind::FileNotFound.reason_label(),
            "file missing on server"
        );
        assert_eq!(SourceErrorKind::HttpError.reason_label(), "loading error");
        assert_eq!(
            SourceErrorKind::CorruptDocument.reason_label(),
            "loading error"
        );
        assert_eq!(SourceErrorKind::Other.reason_label(), "loading error");
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::new(
            SourceErrorKind::UrlNotFound,
            "f1",
            "https://example.com/a.pdf",
            "HTTP 404",
        );
        let msg = format!("{err}");
        assert!(msg.contains("f1"));
        assert!(msg.contains("https://example.com/a.pdf"));
        assert!(msg.contains("HTTP 404"));
    }

    #[test]
    fn test_total_failure_display() {
        let err = MergeError::TotalFailure {
            requested: 3,
            found: 0,
        };
        let msg = format!("{err}");
        assert!(msg.contains("3 requested"));
        assert!(msg.contains("0 found"));
    }

    #[test]
    fn test_is_fatal() {
        assert!(MergeError::invalid_input("empty").is_fatal());
        assert!(
            MergeError::TotalFailure {
                requested: 2,
                found: 0
            }
            .is_fatal()
        );
        assert!(
            MergeError::PersistenceFailure {
                path: PathBuf::from("out.pdf"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            }
            .is_fatal()
        );

        let source = MergeError::Source(SourceError::new(
            SourceErrorKind::Other,
            "f1",
            "x",
            "boom",
        ));
        assert!(!source.is_fatal());
        assert!(source.is_recoverable());
    }
}
