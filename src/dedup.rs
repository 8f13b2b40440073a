//! Duplicate detection for incoming flyers.
//!
//! Sits upstream of ingestion: before a scraped or uploaded flyer becomes a
//! record, [`DuplicateChecker::check`] decides whether an equivalent record
//! already exists and recommends an action. Four independent criteria are
//! checked (identical PDF URL, identical local path, identical content
//! hash, and an overlapping validity window for the same store and
//! category), and each matched record reports exactly which criteria it
//! matched.
//!
//! The checker is failure-tolerant by design: a hash that cannot be
//! computed degrades to "no hash available", and records with windows the
//! store mangled are dropped from overlap results rather than surfaced as
//! errors. A detected duplicate is a verdict, never an error.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::MergeError;
use crate::model::{Flyer, FlyerCategory};
use crate::store::{FlyerFilter, FlyerStore};
use crate::utils::content_hash;

/// Which criterion matched an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchReason {
    /// Identical `pdf_url` for the same store and category.
    SameUrl,
    /// Identical `pdf_path` for the same store and category.
    SamePath,
    /// Identical content hash.
    SameHash,
    /// Overlapping validity window for the same store and category.
    DateOverlap,
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::SameUrl => "same PDF URL",
            Self::SamePath => "same local file path",
            Self::SameHash => "same file hash",
            Self::DateOverlap => "overlapping validity window",
        };
        f.write_str(label)
    }
}

/// What the caller should do with the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    /// No duplicate found; ingest the candidate.
    Proceed,
    /// Drop the candidate, keep the existing record(s).
    Skip,
    /// Remove the matched record(s) and ingest the candidate.
    Replace,
}

/// Metadata of a flyer that has not been ingested yet.
#[derive(Debug, Clone)]
pub struct DuplicateCandidate {
    /// Retail chain name.
    pub store: String,

    /// Chain category.
    pub category: FlyerCategory,

    /// Remote or relative PDF reference, when known.
    pub pdf_url: Option<String>,

    /// Local PDF copy, when one exists.
    pub pdf_path: Option<PathBuf>,

    /// Start of the validity window, when known.
    pub valid_from: Option<DateTime<Utc>>,

    /// End of the validity window, when known.
    pub valid_to: Option<DateTime<Utc>>,

    /// Precomputed content hash, when known.
    pub file_hash: Option<String>,
}

impl From<&Flyer> for DuplicateCandidate {
    fn from(flyer: &Flyer) -> Self {
        Self {
            store: flyer.store.clone(),
            category: flyer.category,
            pdf_url: Some(flyer.pdf_url.clone()),
            pdf_path: flyer.pdf_path.clone(),
            valid_from: Some(flyer.valid_from),
            valid_to: Some(flyer.valid_to),
            file_hash: flyer.file_hash.clone(),
        }
    }
}

/// Options controlling a duplicate check.
#[derive(Debug, Clone)]
pub struct DuplicateCheckOptions {
    /// Reserved; accepted and threaded through but currently unused.
    pub strict_mode: bool,

    /// Compare content hashes, computing one from `pdf_path` if the
    /// candidate did not supply one.
    pub check_file_hash: bool,

    /// Compare validity windows for the same store and category.
    pub check_date_overlap: bool,

    /// Always recommend skipping when any duplicate is found.
    pub auto_skip: bool,

    /// Recommend replacing the matched records instead of skipping.
    /// `auto_skip` wins when both are set.
    pub auto_replace: bool,
}

impl Default for DuplicateCheckOptions {
    fn default() -> Self {
        Self {
            strict_mode: false,
            check_file_hash: false,
            check_date_overlap: true,
            auto_skip: false,
            auto_replace: false,
        }
    }
}

/// An existing record matched by the candidate, with the criteria it
/// matched on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateMatch {
    /// The existing record.
    pub flyer: Flyer,

    /// Every criterion this record matched.
    pub reasons: Vec<MatchReason>,
}

/// Outcome of a duplicate check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateVerdict {
    /// Whether at least one existing record matched.
    pub is_duplicate: bool,

    /// Number of matched records.
    pub duplicates_found: usize,

    /// The matched records with their match criteria.
    pub duplicates: Vec<DuplicateMatch>,

    /// Human-readable union of all match reasons.
    pub reasons: Vec<String>,

    /// What the caller should do with the candidate.
    pub action: RecommendedAction,
}

/// Decides whether a candidate flyer duplicates an existing record.
pub struct DuplicateChecker {
    store: Arc<dyn FlyerStore>,
}

impl DuplicateChecker {
    /// Create a checker over the given store.
    pub fn new(store: Arc<dyn FlyerStore>) -> Self {
        Self { store }
    }

    /// Run the duplicate check.
    ///
    /// Builds one storage query per applicable criterion, unions the
    /// results by id, then recomputes in-process which criteria each match
    /// actually satisfies, including a re-verification of window overlap
    /// as a defense against a backend with different date semantics.
    ///
    /// # Errors
    ///
    /// Only storage faults propagate; hash-computation failures degrade to
    /// "no hash available".
    pub async fn check(
        &self,
        candidate: &DuplicateCandidate,
        options: &DuplicateCheckOptions,
    ) -> Result<DuplicateVerdict, MergeError> {
        let file_hash = self.effective_hash(candidate, options).await;

        let mut matched: Vec<Flyer> = Vec::new();

        for filter in self.match_filters(candidate, file_hash.as_deref()) {
            let found = self.store.find(&filter).await?;
            merge_by_id(&mut matched, found);
        }

        if options.check_date_overlap
            && let (Some(from), Some(to)) = (candidate.valid_from, candidate.valid_to)
        {
            let filter = FlyerFilter {
                store_contains: Some(candidate.store.clone()),
                category: Some(candidate.category),
                overlaps: Some((from, to)),
                active_only: true,
                ..Default::default()
            };
            let found = self.store.find(&filter).await?;
            // Re-verify in-process; drop anything the store got wrong.
            let verified = found
                .into_iter()
                .filter(|existing| windows_overlap(existing, from, to))
                .collect();
            merge_by_id(&mut matched, verified);
        }

        let duplicates: Vec<DuplicateMatch> = matched
            .into_iter()
            .filter_map(|flyer| {
                let reasons = match_reasons(candidate, file_hash.as_deref(), &flyer, options);
                if reasons.is_empty() {
                    None
                } else {
                    Some(DuplicateMatch { flyer, reasons })
                }
            })
            .collect();

        let mut reasons: Vec<String> = Vec::new();
        for duplicate in &duplicates {
            for reason in &duplicate.reasons {
                let label = reason.to_string();
                if !reasons.contains(&label) {
                    reasons.push(label);
                }
            }
        }

        let is_duplicate = !duplicates.is_empty();
        let action = recommend_action(is_duplicate, options);

        debug!(
            store = %candidate.store,
            category = %candidate.category,
            duplicates = duplicates.len(),
            ?action,
            "duplicate check complete"
        );

        Ok(DuplicateVerdict {
            is_duplicate,
            duplicates_found: duplicates.len(),
            duplicates,
            reasons,
            action,
        })
    }

    /// Storage queries for the identity criteria (URL, path, hash), one
    /// filter per applicable criterion.
    fn match_filters(
        &self,
        candidate: &DuplicateCandidate,
        file_hash: Option<&str>,
    ) -> Vec<FlyerFilter> {
        let mut filters = Vec::new();

        if let Some(url) = &candidate.pdf_url {
            filters.push(FlyerFilter {
                store_contains: Some(candidate.store.clone()),
                category: Some(candidate.category),
                pdf_url: Some(url.clone()),
                active_only: true,
                ..Default::default()
            });
        }

        if let Some(path) = &candidate.pdf_path {
            filters.push(FlyerFilter {
                store_contains: Some(candidate.store.clone()),
                category: Some(candidate.category),
                pdf_path: Some(path.clone()),
                active_only: true,
                ..Default::default()
            });
        }

        if let Some(hash) = file_hash {
            filters.push(FlyerFilter {
                file_hash: Some(hash.to_string()),
                active_only: true,
                ..Default::default()
            });
        }

        filters
    }

    /// The hash to compare with: the supplied one, or a digest of the
    /// candidate's local file. Unreadable files degrade to `None`.
    async fn effective_hash(
        &self,
        candidate: &DuplicateCandidate,
        options: &DuplicateCheckOptions,
    ) -> Option<String> {
        if !options.check_file_hash {
            return None;
        }

        if let Some(hash) = &candidate.file_hash {
            return Some(hash.clone());
        }

        let path = candidate.pdf_path.as_ref()?;
        match tokio::fs::read(path).await {
            Ok(bytes) => Some(content_hash(&bytes)),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "could not hash candidate file, continuing without hash"
                );
                None
            }
        }
    }
}

/// Append records not already present (by id).
fn merge_by_id(into: &mut Vec<Flyer>, from: Vec<Flyer>) {
    for flyer in from {
        if !into.iter().any(|existing| existing.id == flyer.id) {
            into.push(flyer);
        }
    }
}

/// Half-open window intersection: touching endpoints count as overlapping.
fn windows_overlap(existing: &Flyer, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    existing.valid_from <= to && from <= existing.valid_to
}

/// Recompute which criteria a matched record actually satisfies.
fn match_reasons(
    candidate: &DuplicateCandidate,
    file_hash: Option<&str>,
    existing: &Flyer,
    options: &DuplicateCheckOptions,
) -> Vec<MatchReason> {
    let mut reasons = Vec::new();

    if candidate
        .pdf_url
        .as_deref()
        .is_some_and(|url| url == existing.pdf_url)
    {
        reasons.push(MatchReason::SameUrl);
    }

    if candidate.pdf_path.is_some() && candidate.pdf_path == existing.pdf_path {
        reasons.push(MatchReason::SamePath);
    }

    if file_hash.is_some() && file_hash == existing.file_hash.as_deref() {
        reasons.push(MatchReason::SameHash);
    }

    if options.check_date_overlap
        && let (Some(from), Some(to)) = (candidate.valid_from, candidate.valid_to)
        && windows_overlap(existing, from, to)
    {
        reasons.push(MatchReason::DateOverlap);
    }

    reasons
}

/// Action policy: explicit auto flags win; otherwise any duplicate means
/// skip. A missed duplicate costs more than re-checking a legitimate new
/// flyer manually, so ambiguity resolves to skip.
fn recommend_action(is_duplicate: bool, options: &DuplicateCheckOptions) -> RecommendedAction {
    if !is_duplicate {
        return RecommendedAction::Proceed;
    }
    if options.auto_skip {
        RecommendedAction::Skip
    } else if options.auto_replace {
        RecommendedAction::Replace
    } else {
        RecommendedAction::Skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::flyer::tests::sample_flyer;
    use crate::store::InMemoryFlyerStore;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).unwrap()
    }

    fn checker_with(flyers: Vec<Flyer>) -> DuplicateChecker {
        DuplicateChecker::new(Arc::new(InMemoryFlyerStore::with_flyers(flyers)))
    }

    fn candidate() -> DuplicateCandidate {
        DuplicateCandidate::from(&sample_flyer())
    }

    #[tokio::test]
    async fn test_same_url_is_duplicate() {
        let checker = checker_with(vec![sample_flyer()]);

        let verdict = checker
            .check(&candidate(), &DuplicateCheckOptions::default())
            .await
            .unwrap();

        assert!(verdict.is_duplicate);
        assert_eq!(verdict.duplicates_found, 1);
        assert!(verdict.reasons.iter().any(|r| r == "same PDF URL"));
        assert_eq!(verdict.action, RecommendedAction::Skip);
    }

    #[tokio::test]
    async fn test_empty_store_proceeds() {
        let checker = checker_with(Vec::new());

        let verdict = checker
            .check(&candidate(), &DuplicateCheckOptions::default())
            .await
            .unwrap();

        assert!(!verdict.is_duplicate);
        assert_eq!(verdict.action, RecommendedAction::Proceed);
        assert!(verdict.reasons.is_empty());
    }

    #[tokio::test]
    async fn test_date_overlap_detection() {
        // Existing record valid Jan 10 - Jan 20 (sample default).
        let mut existing = sample_flyer();
        existing.pdf_url = "https://example.com/other.pdf".to_string();
        let checker = checker_with(vec![existing]);

        let mut overlapping = candidate();
        overlapping.pdf_url = Some("https://example.com/new.pdf".to_string());
        overlapping.valid_from = Some(day(15));
        overlapping.valid_to = Some(day(25));

        let verdict = checker
            .check(&overlapping, &DuplicateCheckOptions::default())
            .await
            .unwrap();
        assert!(verdict.is_duplicate);
        assert!(
            verdict
                .reasons
                .iter()
                .any(|r| r == "overlapping validity window")
        );

        let mut disjoint = overlapping.clone();
        disjoint.valid_from = Some(day(1));
        disjoint.valid_to = Some(day(9));

        let verdict = checker
            .check(&disjoint, &DuplicateCheckOptions::default())
            .await
            .unwrap();
        assert!(!verdict.is_duplicate);
    }

    #[tokio::test]
    async fn test_overlap_check_can_be_disabled() {
        let mut existing = sample_flyer();
        existing.pdf_url = "https://example.com/other.pdf".to_string();
        let checker = checker_with(vec![existing]);

        let mut overlapping = candidate();
        overlapping.pdf_url = Some("https://example.com/new.pdf".to_string());

        let options = DuplicateCheckOptions {
            check_date_overlap: false,
            ..Default::default()
        };
        let verdict = checker.check(&overlapping, &options).await.unwrap();
        assert!(!verdict.is_duplicate);
    }

    #[tokio::test]
    async fn test_hash_match_ignores_store_name() {
        let mut existing = sample_flyer();
        existing.store = "Conad".to_string();
        existing.pdf_url = "https://example.com/other.pdf".to_string();
        existing.valid_from = day(1);
        existing.valid_to = day(5);
        existing.file_hash = Some("ab".repeat(32));
        let checker = checker_with(vec![existing]);

        let mut with_hash = candidate();
        with_hash.pdf_url = Some("https://example.com/new.pdf".to_string());
        with_hash.file_hash = Some("ab".repeat(32));

        let options = DuplicateCheckOptions {
            check_file_hash: true,
            ..Default::default()
        };
        let verdict = checker.check(&with_hash, &options).await.unwrap();
        assert!(verdict.is_duplicate);
        assert!(verdict.reasons.iter().any(|r| r == "same file hash"));
    }

    #[tokio::test]
    async fn test_unreadable_hash_source_is_not_fatal() {
        let checker = checker_with(Vec::new());

        let mut unreadable = candidate();
        unreadable.file_hash = None;
        unreadable.pdf_path = Some(PathBuf::from("/nonexistent/flyer.pdf"));

        let options = DuplicateCheckOptions {
            check_file_hash: true,
            ..Default::default()
        };
        let verdict = checker.check(&unreadable, &options).await.unwrap();
        assert!(!verdict.is_duplicate);
    }

    #[tokio::test]
    async fn test_matched_record_reports_all_criteria() {
        let checker = checker_with(vec![sample_flyer()]);

        // Same URL and overlapping window.
        let verdict = checker
            .check(&candidate(), &DuplicateCheckOptions::default())
            .await
            .unwrap();

        let match_ = &verdict.duplicates[0];
        assert!(match_.reasons.contains(&MatchReason::SameUrl));
        assert!(match_.reasons.contains(&MatchReason::DateOverlap));
    }

    #[tokio::test]
    async fn test_auto_flags_drive_action() {
        let checker = checker_with(vec![sample_flyer()]);

        let options = DuplicateCheckOptions {
            auto_replace: true,
            ..Default::default()
        };
        let verdict = checker.check(&candidate(), &options).await.unwrap();
        assert_eq!(verdict.action, RecommendedAction::Replace);

        // auto_skip wins over auto_replace.
        let options = DuplicateCheckOptions {
            auto_skip: true,
            auto_replace: true,
            ..Default::default()
        };
        let verdict = checker.check(&candidate(), &options).await.unwrap();
        assert_eq!(verdict.action, RecommendedAction::Skip);
    }

    #[tokio::test]
    async fn test_soft_deleted_records_do_not_match() {
        let mut deleted = sample_flyer();
        deleted.is_active = false;
        let checker = checker_with(vec![deleted]);

        let verdict = checker
            .check(&candidate(), &DuplicateCheckOptions::default())
            .await
            .unwrap();
        assert!(!verdict.is_duplicate);
    }
}
