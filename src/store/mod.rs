//! Storage adapter seams.
//!
//! The engine never talks to a database directly; it consumes the
//! [`FlyerStore`] and [`AdStore`] traits and receives implementations
//! through constructor injection. [`memory`] holds the in-memory reference
//! implementation used by tests and the CLI.
//!
//! Querying is filter-based: the duplicate detector builds several
//! [`FlyerFilter`]s (one per match criterion) and ORs them by unioning the
//! result sets, which lets a real backend push each filter down as an
//! indexed query.

pub mod memory;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{Advertisement, Flyer, FlyerCategory};

pub use memory::{InMemoryAdStore, InMemoryFlyerStore};

/// A single storage-level match query over flyer records.
///
/// All set fields must hold for a record to match (the fields AND
/// together); independent criteria are expressed as separate filters.
#[derive(Debug, Clone, Default)]
pub struct FlyerFilter {
    /// Case-insensitive substring match on the store name.
    pub store_contains: Option<String>,

    /// Exact category match.
    pub category: Option<FlyerCategory>,

    /// Exact PDF URL match.
    pub pdf_url: Option<String>,

    /// Exact local path match.
    pub pdf_path: Option<PathBuf>,

    /// Exact content hash match.
    pub file_hash: Option<String>,

    /// Validity-window intersection: matches records whose
    /// `[valid_from, valid_to]` interval intersects the given interval
    /// (touching endpoints count as overlapping).
    pub overlaps: Option<(DateTime<Utc>, DateTime<Utc>)>,

    /// Restrict to active (not soft-deleted) records.
    pub active_only: bool,
}

impl FlyerFilter {
    /// Evaluate this filter against a single record.
    ///
    /// Reference semantics shared by every adapter; backends are free to
    /// translate the filter into native queries as long as they match this.
    pub fn matches(&self, flyer: &Flyer) -> bool {
        if self.active_only && !flyer.is_active {
            return false;
        }

        if let Some(fragment) = &self.store_contains
            && !flyer
                .store
                .to_lowercase()
                .contains(&fragment.to_lowercase())
        {
            return false;
        }

        if let Some(category) = self.category
            && flyer.category != category
        {
            return false;
        }

        if let Some(url) = &self.pdf_url
            && flyer.pdf_url != *url
        {
            return false;
        }

        if let Some(path) = &self.pdf_path
            && flyer.pdf_path.as_deref() != Some(path.as_path())
        {
            return false;
        }

        if let Some(hash) = &self.file_hash
            && flyer.file_hash.as_deref() != Some(hash.as_str())
        {
            return false;
        }

        if let Some((from, to)) = self.overlaps
            && !(flyer.valid_from <= to && from <= flyer.valid_to)
        {
            return false;
        }

        true
    }
}

/// Typed read/write access to flyer records.
#[async_trait]
pub trait FlyerStore: Send + Sync {
    /// Fetch the records matching the given ids.
    ///
    /// Returns whatever subset exists; order is unspecified. With
    /// `active_only`, soft-deleted records are omitted.
    async fn find_by_ids(&self, ids: &[String], active_only: bool)
    -> Result<Vec<Flyer>, StoreError>;

    /// Fetch all records matching a filter.
    async fn find(&self, filter: &FlyerFilter) -> Result<Vec<Flyer>, StoreError>;

    /// Persist a new record.
    async fn create(&self, flyer: Flyer) -> Result<Flyer, StoreError>;

    /// Replace an existing record.
    async fn update(&self, flyer: Flyer) -> Result<Flyer, StoreError>;

    /// Soft-delete: clear the active flag, keep the record.
    async fn soft_delete(&self, id: &str) -> Result<(), StoreError>;

    /// Hard-delete a record, returning it if it existed.
    async fn delete_by_id(&self, id: &str) -> Result<Option<Flyer>, StoreError>;

    /// Records whose validity window ended before `cutoff`.
    async fn find_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Flyer>, StoreError>;

    /// Bump the view counter. Best-effort analytics; losing an increment
    /// under a race is acceptable.
    async fn increment_view_count(&self, id: &str) -> Result<(), StoreError>;

    /// Bump the download counter.
    async fn increment_download_count(&self, id: &str) -> Result<(), StoreError>;
}

/// Typed read/write access to advertisement records.
#[async_trait]
pub trait AdStore: Send + Sync {
    /// All ads that are active and inside their validity window at `now`.
    /// Geo targeting is not applied here; the selector owns that.
    async fn eligible_ads(&self, now: DateTime<Utc>) -> Result<Vec<Advertisement>, StoreError>;

    /// Persist a new ad.
    async fn create(&self, ad: Advertisement) -> Result<Advertisement, StoreError>;

    /// Count an impression. Deactivates the ad once its impression budget
    /// is exhausted.
    async fn record_impression(&self, id: &str) -> Result<(), StoreError>;

    /// Count a click-through.
    async fn record_click(&self, id: &str) -> Result<(), StoreError>;
}
