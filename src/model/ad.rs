//! Advertisement records and their insertion slots.
//!
//! Eligibility is a pure predicate on the record plus the current time and
//! the caller's location; ranking and impression accounting live in
//! [`crate::ads`] and the ad store respectively.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MergeError;
use crate::model::flyer::UserLocation;

/// Slot an advertisement page is inserted into during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdPosition {
    /// Before the first flyer.
    Cover,
    /// Between two consecutive flyers.
    Intermediate,
    /// After the last flyer.
    Final,
    /// Listing sidebars only; never merged into a document.
    Sidebar,
}

impl FromStr for AdPosition {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cover" => Ok(Self::Cover),
            "intermediate" => Ok(Self::Intermediate),
            "final" => Ok(Self::Final),
            "sidebar" => Ok(Self::Sidebar),
            _ => Err(MergeError::invalid_input(format!(
                "unknown ad position: {s}. Must be one of: cover, intermediate, final, sidebar"
            ))),
        }
    }
}

/// Engagement counters for an advertisement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdMetrics {
    /// Times the ad was selected for a merge or a listing.
    pub impressions: u64,

    /// Explicit click-throughs.
    pub clicks: u64,
}

impl AdMetrics {
    /// Click-through rate in [0, 1]. Zero impressions yields 0.
    pub fn ctr(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.clicks as f64 / self.impressions as f64
        }
    }
}

/// A sponsor advertisement, rendered as a single page when merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advertisement {
    /// Opaque unique id.
    pub id: String,

    /// Sponsor / campaign title shown on the rendered page.
    pub title: String,

    /// Insertion slot.
    pub position: AdPosition,

    /// Free-form campaign category, e.g. "food", "electronics".
    pub category: String,

    /// Ranking priority, 1 (lowest) to 10 (highest).
    pub priority: u8,

    /// Cities or postal codes the ad targets. Empty means untargeted.
    #[serde(default)]
    pub targeting: Vec<String>,

    /// Engagement counters.
    #[serde(default)]
    pub metrics: AdMetrics,

    /// Whether the ad may be selected at all.
    pub is_active: bool,

    /// Start of the validity window.
    pub start_date: DateTime<Utc>,

    /// End of the validity window. `None` means no expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,

    /// Impression budget. When reached the store deactivates the ad.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_impressions: Option<u64>,
}

impl Advertisement {
    /// Whether this ad may be inserted right now for this caller.
    ///
    /// Requires the ad to be active, the current time to fall within
    /// `[start_date, end_date-or-infinity]`, and, when targeting is
    /// non-empty, the caller's city or postal code to match one of the
    /// targets (city comparison is case-insensitive).
    pub fn is_eligible(&self, now: DateTime<Utc>, location: Option<&UserLocation>) -> bool {
        if !self.is_active {
            return false;
        }

        if now < self.start_date {
            return false;
        }

        if let Some(end) = self.end_date
            && now > end
        {
            return false;
        }

        if self.targeting.is_empty() {
            return true;
        }

        let Some(location) = location else {
            // Targeted ad, but the caller gave no location hint.
            return false;
        };

        self.targeting.iter().any(|target| {
            let city_match = location
                .city
                .as_deref()
                .is_some_and(|city| city.eq_ignore_ascii_case(target));
            let postal_match = location
                .postal_code
                .as_deref()
                .is_some_and(|postal| postal == target);
            city_match || postal_match
        })
    }

    /// Whether the impression budget has been used up.
    pub fn budget_exhausted(&self) -> bool {
        self.max_impressions
            .is_some_and(|max| self.metrics.impressions >= max)
    }
}
