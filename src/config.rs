//! Configuration value objects for the merge engine.
//!
//! Everything environment-dependent is made explicit here: the caller
//! constructs a [`DeploymentProfile`] and an [`OutputConfig`] and hands them
//! to the resolver and orchestrator. No component inspects environment
//! variables on its own.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MergeError;
use crate::model::AdPosition;

/// Maximum number of flyers a single merge request may name.
pub const MAX_MERGE_FLYERS: usize = 10;

/// How many PDF resolutions run concurrently during the fetch-ahead phase.
pub const FETCH_CONCURRENCY: usize = 4;

/// Options controlling a single merge call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOptions {
    /// Whether to interleave advertisement pages at all.
    pub include_ads: bool,

    /// Which slots to fill. Subset of cover / intermediate / final;
    /// sidebar positions are ignored by the merge engine.
    pub ad_positions: Vec<AdPosition>,

    /// Whether to prepend a table-of-contents page (only emitted when the
    /// document ends up with more than one entry).
    pub include_toc: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            include_ads: true,
            ad_positions: vec![AdPosition::Cover, AdPosition::Intermediate, AdPosition::Final],
            include_toc: true,
        }
    }
}

impl MergeOptions {
    /// The ad slots a merge will actually try to fill.
    ///
    /// Empty when ads are disabled; sidebar entries are dropped since they
    /// have no insertion slot inside a document.
    pub fn effective_positions(&self) -> Vec<AdPosition> {
        if !self.include_ads {
            return Vec::new();
        }
        self.ad_positions
            .iter()
            .copied()
            .filter(|p| *p != AdPosition::Sidebar)
            .collect()
    }
}

/// Which sources the PDF resolver trusts, and in what order.
///
/// Replaces the implicit production/development environment branching of a
/// typical deployment: the caller states the resolution strategy outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentProfile {
    /// Only `pdf_url` is trusted; local paths are assumed not to exist on
    /// this host. Relative URLs cannot be resolved.
    Production,

    /// Local paths are tried first, then relative URLs are probed against
    /// `upload_dir` followed by each `archive_dirs` entry in order, and
    /// finally absolute URLs go to the network.
    Local {
        /// Primary uploads directory.
        upload_dir: PathBuf,
        /// Per-chain archival directories, probed in order.
        archive_dirs: Vec<PathBuf>,
    },
}

impl DeploymentProfile {
    /// Whether this profile may touch the local filesystem.
    pub fn trusts_local_paths(&self) -> bool {
        matches!(self, Self::Local { .. })
    }
}

/// Resolver tuning knobs.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Source trust order.
    pub profile: DeploymentProfile,

    /// Deadline applied to every individual fetch (disk read or HTTP
    /// round-trip). Expiry is classified like any other resolution failure.
    pub fetch_timeout: Duration,
}

impl ResolverConfig {
    /// Config for a production host: URL-only resolution.
    pub fn production() -> Self {
        Self {
            profile: DeploymentProfile::Production,
            fetch_timeout: Duration::from_secs(20),
        }
    }

    /// Config for a local/dev host with the given probing directories.
    pub fn local(upload_dir: PathBuf, archive_dirs: Vec<PathBuf>) -> Self {
        Self {
            profile: DeploymentProfile::Local {
                upload_dir,
                archive_dirs,
            },
            fetch_timeout: Duration::from_secs(20),
        }
    }
}

/// Where merged artifacts are written and how they are served back.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Primary output directory. The one hard dependency of persistence.
    pub output_dir: PathBuf,

    /// Optional secondary durable location. Mirroring failures are logged
    /// and never fail the merge; the primary write already succeeded.
    pub mirror_dir: Option<PathBuf>,

    /// Base path for download references, e.g. "/downloads/merged".
    pub download_base: String,

    /// Base path for inline preview references.
    pub preview_base: String,
}

impl OutputConfig {
    /// Create an output config with the conventional URL bases.
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            mirror_dir: None,
            download_base: "/downloads/merged".to_string(),
            preview_base: "/preview/merged".to_string(),
        }
    }

    /// Attach a secondary mirror directory.
    pub fn with_mirror(mut self, mirror_dir: PathBuf) -> Self {
        self.mirror_dir = Some(mirror_dir);
        self
    }
}

/// Validate a merge request's flyer id list before any I/O happens.
///
/// # Errors
///
/// Returns [`MergeError::InvalidInput`] if the list is empty, exceeds
/// [`MAX_MERGE_FLYERS`], or contains a blank id.
pub fn validate_flyer_ids(flyer_ids: &[String]) -> Result<(), MergeError> {
    if flyer_ids.is_empty() {
        return Err(MergeError::invalid_input("no flyer ids given"));
    }

    if flyer_ids.len() > MAX_MERGE_FLYERS {
        return Err(MergeError::invalid_input(format!(
            "too many flyers: {} requested, limit is {MAX_MERGE_FLYERS}",
            flyer_ids.len()
        )));
    }

    if flyer_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(MergeError::invalid_input("flyer ids must not be blank"));
    }

    Ok(())
}
