//! In-memory store implementations.
//!
//! Reference adapters backed by `RwLock<HashMap>`; used by the test suite
//! and the CLI's catalog-snapshot mode. They implement the exact filter
//! and counter semantics a production backend must reproduce.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{Advertisement, Flyer};
use crate::store::{AdStore, FlyerFilter, FlyerStore};

/// In-memory flyer store.
#[derive(Default)]
pub struct InMemoryFlyerStore {
    records: RwLock<HashMap<String, Flyer>>,
}

impl InMemoryFlyerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with the given records.
    pub fn with_flyers(flyers: impl IntoIterator<Item = Flyer>) -> Self {
        let records = flyers.into_iter().map(|f| (f.id.clone(), f)).collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.read().expect("store lock poisoned").len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_record<T>(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut Flyer) -> T,
    ) -> Result<T, StoreError> {
        let mut records = self.records.write().expect("store lock poisoned");
        records
            .get_mut(id)
            .map(mutate)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl FlyerStore for InMemoryFlyerStore {
    async fn find_by_ids(
        &self,
        ids: &[String],
        active_only: bool,
    ) -> Result<Vec<Flyer>, StoreError> {
        let records = self.records.read().expect("store lock poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id))
            .filter(|flyer| !active_only || flyer.is_active)
            .cloned()
            .collect())
    }

    async fn find(&self, filter: &FlyerFilter) -> Result<Vec<Flyer>, StoreError> {
        let records = self.records.read().expect("store lock poisoned");
        Ok(records
            .values()
            .filter(|flyer| filter.matches(flyer))
            .cloned()
            .collect())
    }

    async fn create(&self, flyer: Flyer) -> Result<Flyer, StoreError> {
        let mut records = self.records.write().expect("store lock poisoned");
        if records.contains_key(&flyer.id) {
            return Err(StoreError::AlreadyExists(flyer.id));
        }
        records.insert(flyer.id.clone(), flyer.clone());
        Ok(flyer)
    }

    async fn update(&self, flyer: Flyer) -> Result<Flyer, StoreError> {
        let mut records = self.records.write().expect("store lock poisoned");
        if !records.contains_key(&flyer.id) {
            return Err(StoreError::NotFound(flyer.id));
        }
        records.insert(flyer.id.clone(), flyer.clone());
        Ok(flyer)
    }

    async fn soft_delete(&self, id: &str) -> Result<(), StoreError> {
        self.with_record(id, |flyer| flyer.is_active = false)
    }

    async fn delete_by_id(&self, id: &str) -> Result<Option<Flyer>, StoreError> {
        let mut records = self.records.write().expect("store lock poisoned");
        Ok(records.remove(id))
    }

    async fn find_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Flyer>, StoreError> {
        let records = self.records.read().expect("store lock poisoned");
        Ok(records
            .values()
            .filter(|flyer| flyer.valid_to < cutoff)
            .cloned()
            .collect())
    }

    async fn increment_view_count(&self, id: &str) -> Result<(), StoreError> {
        self.with_record(id, |flyer| flyer.view_count += 1)
    }

    async fn increment_download_count(&self, id: &str) -> Result<(), StoreError> {
        self.with_record(id, |flyer| flyer.download_count += 1)
    }
}

/// In-memory advertisement store.
#[derive(Default)]
pub struct InMemoryAdStore {
    records: RwLock<HashMap<String, Advertisement>>,
}

impl InMemoryAdStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with the given ads.
    pub fn with_ads(ads: impl IntoIterator<Item = Advertisement>) -> Self {
        let records = ads.into_iter().map(|a| (a.id.clone(), a)).collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Fetch a single ad by id (test/admin convenience).
    pub fn get(&self, id: &str) -> Option<Advertisement> {
        self.records
            .read()
            .expect("store lock poisoned")
            .get(id)
            .cloned()
    }
}

#[async_trait]
impl AdStore for InMemoryAdStore {
    async fn eligible_ads(&self, now: DateTime<Utc>) -> Result<Vec<Advertisement>, StoreError> {
        let records = self.records.read().expect("store lock poisoned");
        Ok(records
            .values()
            .filter(|ad| {
                ad.is_active
                    && ad.start_date <= now
                    && ad.end_date.is_none_or(|end| now <= end)
            })
            .cloned()
            .collect())
    }

    async fn create(&self, ad: Advertisement) -> Result<Advertisement, StoreError> {
        let mut records = self.records.write().expect("store lock poisoned");
        if records.contains_key(&ad.id) {
            return Err(StoreError::AlreadyExists(ad.id));
        }
        records.insert(ad.id.clone(), ad.clone());
        Ok(ad)
    }

    async fn record_impression(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().expect("store lock poisoned");
        let ad = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        ad.metrics.impressions += 1;
        if ad.budget_exhausted() {
            ad.is_active = false;
        }
        Ok(())
    }

    async fn record_click(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().expect("store lock poisoned");
        let ad = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        ad.metrics.clicks += 1;
        Ok(())
    }
}
