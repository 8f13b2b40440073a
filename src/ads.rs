//! Advertisement selection.
//!
//! The merge orchestrator consumes the [`AdSelector`] trait and relies on
//! two guarantees: returned ads are already eligible (active, inside their
//! validity window, geo targeting satisfied) and already ranked, highest
//! priority first with click-through rate breaking ties. The orchestrator never
//! re-validates, it only consumes order.
//!
//! Selecting an ad counts an impression. That write is fired and forgotten
//! on a spawned task: a metrics failure must never delay or abort a merge.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::error::StoreError;
use crate::model::{AdPosition, Advertisement, Flyer, UserLocation};
use crate::store::AdStore;

/// Selection seam consumed by the merge orchestrator.
#[async_trait]
pub trait AdSelector: Send + Sync {
    /// Pick the ads to interleave into a merge of `flyers`.
    ///
    /// Returns only ads whose position is in `positions`, pre-filtered for
    /// eligibility against `location`, ranked best-first.
    async fn select(
        &self,
        flyers: &[Flyer],
        location: Option<&UserLocation>,
        positions: &[AdPosition],
    ) -> Result<Vec<Advertisement>, StoreError>;
}

/// Store-backed selector: eligibility filter, priority/CTR ranking and
/// fire-and-forget impression accounting.
pub struct StoreAdSelector {
    store: Arc<dyn AdStore>,
}

impl StoreAdSelector {
    /// Create a selector over the given ad store.
    pub fn new(store: Arc<dyn AdStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AdSelector for StoreAdSelector {
    async fn select(
        &self,
        _flyers: &[Flyer],
        location: Option<&UserLocation>,
        positions: &[AdPosition],
    ) -> Result<Vec<Advertisement>, StoreError> {
        if positions.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut ads: Vec<Advertisement> = self
            .store
            .eligible_ads(now)
            .await?
            .into_iter()
            .filter(|ad| positions.contains(&ad.position))
            .filter(|ad| ad.is_eligible(now, location))
            .collect();

        ads.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| {
                    b.metrics
                        .ctr()
                        .partial_cmp(&a.metrics.ctr())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.id.cmp(&b.id))
        });

        for ad in &ads {
            let store = Arc::clone(&self.store);
            let ad_id = ad.id.clone();
            tokio::spawn(async move {
                if let Err(err) = store.record_impression(&ad_id).await {
                    warn!(ad_id = %ad_id, error = %err, "failed to record ad impression");
                }
            });
        }

        Ok(ads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ad::tests::sample_ad;
    use crate::store::InMemoryAdStore;
    use chrono::{Duration, Utc};

    fn selector_with(ads: Vec<Advertisement>) -> (StoreAdSelector, Arc<InMemoryAdStore>) {
        let store = Arc::new(InMemoryAdStore::with_ads(ads));
        (StoreAdSelector::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_filters_by_requested_positions() {
        let (selector, _) = selector_with(vec![
            sample_ad("cover", AdPosition::Cover),
            sample_ad("final", AdPosition::Final),
            sample_ad("side", AdPosition::Sidebar),
        ]);

        let ads = selector
            .select(&[], None, &[AdPosition::Cover, AdPosition::Final])
            .await
            .unwrap();

        let ids: Vec<&str> = ads.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"cover"));
        assert!(ids.contains(&"final"));
    }

    #[tokio::test]
    async fn test_ranking_priority_then_ctr() {
        let mut low = sample_ad("low", AdPosition::Cover);
        low.priority = 2;

        let mut high = sample_ad("high", AdPosition::Cover);
        high.priority = 9;

        let mut clicked = sample_ad("clicked", AdPosition::Cover);
        clicked.priority = 9;
        clicked.metrics.impressions = 100;
        clicked.metrics.clicks = 40;

        let (selector, _) = selector_with(vec![low, high, clicked]);

        let ads = selector
            .select(&[], None, &[AdPosition::Cover])
            .await
            .unwrap();

        let ids: Vec<&str> = ads.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["clicked", "high", "low"]);
    }

    #[tokio::test]
    async fn test_expired_ad_never_selected() {
        let mut expired = sample_ad("expired", AdPosition::Cover);
        expired.priority = 10;
        expired.end_date = Some(Utc::now() - Duration::days(1));

        let (selector, _) = selector_with(vec![expired]);

        let ads = selector
            .select(&[], None, &[AdPosition::Cover])
            .await
            .unwrap();
        assert!(ads.is_empty());
    }

    #[tokio::test]
    async fn test_selection_counts_impressions() {
        let (selector, store) = selector_with(vec![sample_ad("a1", AdPosition::Cover)]);

        selector
            .select(&[], None, &[AdPosition::Cover])
            .await
            .unwrap();

        // The increment runs on a spawned task; give it a moment.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(store.get("a1").unwrap().metrics.impressions, 1);
    }

    #[tokio::test]
    async fn test_empty_positions_select_nothing() {
        let (selector, store) = selector_with(vec![sample_ad("a1", AdPosition::Cover)]);

        let ads = selector.select(&[], None, &[]).await.unwrap();
        assert!(ads.is_empty());
        assert_eq!(store.get("a1").unwrap().metrics.impressions, 0);
    }
}
