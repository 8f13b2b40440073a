//! The merge state machine.
//!
//! A merge call runs strictly sequential stages: validate input, load the
//! requested records, restore the caller's ordering, select ads, assemble
//! the document, synthesize the table of contents, persist, report.
//!
//! PDF resolution is the one place that fans out: sources are fetched
//! concurrently (bounded by [`FETCH_CONCURRENCY`]) while the page-copy into
//! the output stays ordered, since page numbers feed straight into the TOC.
//!
//! Per-flyer failures never abort the call; they become placeholder pages
//! and `flyer_error` TOC entries. The fatal conditions are invalid input,
//! a fully unresolvable flyer set, and a failed artifact write.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::ads::AdSelector;
use crate::config::{validate_flyer_ids, MergeOptions, OutputConfig, FETCH_CONCURRENCY};
use crate::error::{MergeError, SourceError, SourceErrorKind};
use crate::merge::assembler::DocumentAssembler;
use crate::merge::pagegen;
use crate::merge::toc::{self, TocEntry, TocSummary, TOC_PAGES};
use crate::model::{AdPosition, Advertisement, Flyer, UserLocation};
use crate::output::{merge_id, merged_filename, ArtifactWriter};
use crate::resolve::{PdfSource, ResolvedPdf};
use crate::store::FlyerStore;

/// One absorbed per-flyer failure, reported alongside the result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlyerMergeFailure {
    /// Requested flyer id.
    pub flyer_id: String,

    /// Store name, when the record was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,

    /// Failure classification.
    pub kind: SourceErrorKind,

    /// Raw failure detail for debugging.
    pub detail: String,
}

/// Result descriptor returned to the caller of a successful merge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    /// Short tracing id embedded in the filename. Not a content hash.
    pub merge_id: String,

    /// Bare filename of the persisted artifact.
    pub filename: String,

    /// Human-formatted size of the artifact.
    pub file_size: String,

    /// Size of the artifact in bytes.
    pub file_size_bytes: u64,

    /// Total page count of the output document.
    pub total_pages: u32,

    /// Flyers merged in full.
    pub flyer_count: usize,

    /// Advertisement pages inserted.
    pub ad_count: usize,

    /// Flyers replaced by a placeholder page.
    pub flyers_unavailable: usize,

    /// The complete table of contents, in document order.
    pub table_of_contents: Vec<TocEntry>,

    /// Download reference for the artifact.
    pub download_url: String,

    /// Inline preview reference for the artifact.
    pub preview_url: String,

    /// Absorbed per-flyer failures.
    pub errors: Vec<FlyerMergeFailure>,
}

/// The central merge engine.
///
/// Holds no mutable state of its own; concurrent merge calls share only
/// the injected collaborators, so the engine is freely re-entrant.
pub struct MergeOrchestrator {
    store: Arc<dyn FlyerStore>,
    source: Arc<dyn PdfSource>,
    ads: Arc<dyn AdSelector>,
    writer: ArtifactWriter,
}

impl MergeOrchestrator {
    /// Create an orchestrator over the injected collaborators.
    pub fn new(
        store: Arc<dyn FlyerStore>,
        source: Arc<dyn PdfSource>,
        ads: Arc<dyn AdSelector>,
        output: OutputConfig,
    ) -> Self {
        Self {
            store,
            source,
            ads,
            writer: ArtifactWriter::new(output),
        }
    }

    /// Merge the given flyers, in the given order, into one document.
    ///
    /// # Errors
    ///
    /// - [`MergeError::InvalidInput`] for an empty, over-limit or blank id
    ///   list; rejected before any I/O.
    /// - [`MergeError::TotalFailure`] when not a single flyer could be
    ///   resolved.
    /// - [`MergeError::PersistenceFailure`] when writing the artifact
    ///   fails.
    pub async fn merge(
        &self,
        flyer_ids: &[String],
        options: &MergeOptions,
        location: Option<&UserLocation>,
    ) -> Result<MergeOutcome, MergeError> {
        // Stage 1: validate before any I/O.
        validate_flyer_ids(flyer_ids)?;

        let timestamp = Utc::now().timestamp_millis();
        let merge_id = merge_id(flyer_ids, timestamp);
        info!(merge_id = %merge_id, requested = flyer_ids.len(), "merge started");

        // Stage 2: load the active records.
        let records = self.store.find_by_ids(flyer_ids, true).await?;
        if records.is_empty() {
            return Err(MergeError::TotalFailure {
                requested: flyer_ids.len(),
                found: 0,
            });
        }

        let mut record_map: HashMap<String, Flyer> =
            records.into_iter().map(|f| (f.id.clone(), f)).collect();

        let missing: Vec<&String> = flyer_ids
            .iter()
            .filter(|id| !record_map.contains_key(*id))
            .collect();
        if !missing.is_empty() {
            warn!(merge_id = %merge_id, ?missing, "requested flyers missing or inactive");
        }

        // Stage 3/4: the caller's ordering is authoritative; select ads
        // once for the whole ordered set.
        let ordered: Vec<Flyer> = flyer_ids
            .iter()
            .filter_map(|id| record_map.get(id).cloned())
            .collect();

        let (mut cover_ads, mut intermediate_ads, mut final_ads) =
            self.select_ads(&ordered, location, options).await;

        // Stage 5 prelude: fetch ahead concurrently, assemble in order.
        let mut resolutions = self.fetch_all(&ordered).await;

        let found = record_map.len();
        let mut assembler = DocumentAssembler::new();
        let mut entries: Vec<TocEntry> = Vec::new();
        let mut errors: Vec<FlyerMergeFailure> = Vec::new();
        let mut flyers_merged = 0usize;
        let mut ad_pages = 0usize;

        for ad in cover_ads.drain(..) {
            append_ad_page(&mut assembler, &ad, &mut entries)?;
            ad_pages += 1;
        }

        for (slot, flyer_id) in flyer_ids.iter().enumerate() {
            match record_map.remove(flyer_id) {
                Some(flyer) => {
                    let resolution = resolutions
                        .remove(flyer_id)
                        .unwrap_or_else(|| missing_resolution(flyer_id));
                    match resolution {
                        Ok(resolved) => {
                            let start_page = assembler.page_count() as u32 + 1;
                            let pages = assembler.append_document(resolved.document)?;
                            entries.push(TocEntry::flyer(
                                flyer.display_title(),
                                start_page,
                                pages as u32,
                            ));
                            flyers_merged += 1;
                            self.count_view(&flyer.id);
                        }
                        Err(err) => {
                            warn!(
                                merge_id = %merge_id,
                                flyer_id = %flyer.id,
                                store = %flyer.store,
                                attempted = %err.attempted,
                                error = %err.detail,
                                "flyer unavailable, inserting placeholder"
                            );
                            let start_page = assembler.page_count() as u32 + 1;
                            assembler.append_text_page(&pagegen::placeholder_lines(&flyer, &err))?;
                            entries.push(TocEntry::flyer_error(
                                flyer.display_title(),
                                start_page,
                                err.kind.reason_label(),
                            ));
                            errors.push(FlyerMergeFailure {
                                flyer_id: flyer.id.clone(),
                                store: Some(flyer.store.clone()),
                                kind: err.kind,
                                detail: err.detail,
                            });
                        }
                    }
                }
                None => {
                    let start_page = assembler.page_count() as u32 + 1;
                    assembler.append_text_page(&pagegen::missing_record_lines(flyer_id))?;
                    entries.push(TocEntry::flyer_error(
                        flyer_id.clone(),
                        start_page,
                        "no longer available",
                    ));
                    errors.push(FlyerMergeFailure {
                        flyer_id: flyer_id.clone(),
                        store: None,
                        kind: SourceErrorKind::Other,
                        detail: "record missing or inactive".to_string(),
                    });
                }
            }

            // Stage 5c: one intermediate ad between consecutive flyers,
            // never after the last.
            if slot + 1 < flyer_ids.len()
                && let Some(ad) = intermediate_ads.pop_front()
            {
                append_ad_page(&mut assembler, &ad, &mut entries)?;
                ad_pages += 1;
            }
        }

        for ad in final_ads.drain(..) {
            append_ad_page(&mut assembler, &ad, &mut entries)?;
            ad_pages += 1;
        }

        if flyers_merged == 0 {
            return Err(MergeError::TotalFailure {
                requested: flyer_ids.len(),
                found,
            });
        }

        // Stage 6: table of contents, prepended so it is page one.
        let include_toc = options.include_toc && entries.len() > 1;
        if include_toc {
            for entry in &mut entries {
                entry.offset_pages(TOC_PAGES);
            }
            assembler.prepend_text_page(&toc::toc_lines(&entries))?;
        }

        let total_pages = assembler.page_count() as u32;
        verify_page_accounting(&entries, total_pages, include_toc)?;

        // Stage 7: persist.
        let filename = merged_filename(&merge_id, timestamp);
        let document = assembler.finalize()?;
        let artifact = self.writer.write(document, &filename).await?;

        let summary = TocSummary::from_entries(&entries);
        info!(
            merge_id = %merge_id,
            flyers = flyers_merged,
            ads = ad_pages,
            unavailable = summary.flyers_unavailable,
            pages = total_pages,
            "merge complete"
        );

        Ok(MergeOutcome {
            merge_id,
            download_url: self.writer.download_url(&artifact.filename),
            preview_url: self.writer.preview_url(&artifact.filename),
            file_size: artifact.format_size(),
            file_size_bytes: artifact.byte_size,
            filename: artifact.filename,
            total_pages,
            flyer_count: flyers_merged,
            ad_count: ad_pages,
            flyers_unavailable: summary.flyers_unavailable,
            table_of_contents: entries,
            errors,
        })
    }

    /// Select and partition ads by slot. Selection failure downgrades to
    /// "no ads" and never aborts the merge.
    async fn select_ads(
        &self,
        ordered: &[Flyer],
        location: Option<&UserLocation>,
        options: &MergeOptions,
    ) -> (
        Vec<Advertisement>,
        VecDeque<Advertisement>,
        Vec<Advertisement>,
    ) {
        let positions = options.effective_positions();
        if positions.is_empty() {
            return (Vec::new(), VecDeque::new(), Vec::new());
        }

        let ads = match self.ads.select(ordered, location, &positions).await {
            Ok(ads) => ads,
            Err(err) => {
                warn!(error = %err, "ad selection failed, merging without ads");
                Vec::new()
            }
        };

        let mut cover = Vec::new();
        let mut intermediate = VecDeque::new();
        let mut final_ = Vec::new();
        for ad in ads {
            match ad.position {
                AdPosition::Cover => cover.push(ad),
                AdPosition::Intermediate => intermediate.push_back(ad),
                AdPosition::Final => final_.push(ad),
                AdPosition::Sidebar => {}
            }
        }
        (cover, intermediate, final_)
    }

    /// Resolve every record concurrently, keyed by flyer id.
    async fn fetch_all(
        &self,
        ordered: &[Flyer],
    ) -> HashMap<String, Result<ResolvedPdf, SourceError>> {
        let fetches = ordered.iter().map(|flyer| {
            let source = Arc::clone(&self.source);
            let flyer = flyer.clone();
            async move {
                let result = source.load(&flyer).await;
                (flyer.id, result)
            }
        });

        stream::iter(fetches)
            .buffer_unordered(FETCH_CONCURRENCY)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }

    /// Fire-and-forget view counter bump.
    fn count_view(&self, flyer_id: &str) {
        let store = Arc::clone(&self.store);
        let flyer_id = flyer_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = store.increment_view_count(&flyer_id).await {
                warn!(flyer_id = %flyer_id, error = %err, "failed to count flyer view");
            }
        });
    }
}

fn append_ad_page(
    assembler: &mut DocumentAssembler,
    ad: &Advertisement,
    entries: &mut Vec<TocEntry>,
) -> Result<(), MergeError> {
    let start_page = assembler.page_count() as u32 + 1;
    assembler.append_text_page(&pagegen::ad_lines(ad))?;
    entries.push(TocEntry::ad(ad.title.clone(), start_page));
    Ok(())
}

/// A record present in the id map but absent from the resolution map can
/// only happen when the same id was requested twice; the second slot is
/// treated like an unresolvable source.
fn missing_resolution(flyer_id: &str) -> Result<ResolvedPdf, SourceError> {
    Err(SourceError::new(
        SourceErrorKind::Other,
        flyer_id,
        "<none>",
        "duplicate id in request",
    ))
}

/// The TOC is not allowed to drift from reality: entry spans plus the TOC
/// page must account for every page in the document.
fn verify_page_accounting(
    entries: &[TocEntry],
    total_pages: u32,
    include_toc: bool,
) -> Result<(), MergeError> {
    let spans: u32 = entries.iter().map(|e| e.page_count).sum();
    let expected = spans + if include_toc { TOC_PAGES } else { 0 };
    if expected != total_pages {
        return Err(MergeError::assembly(format!(
            "table of contents drifted from page count: entries span {spans} pages, document has {total_pages}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_accounting_guard() {
        let entries = vec![TocEntry::flyer("A", 2, 6), TocEntry::flyer_error("B", 8, "x")];
        assert!(verify_page_accounting(&entries, 8, true).is_ok());
        assert!(verify_page_accounting(&entries, 7, false).is_ok());
        assert!(verify_page_accounting(&entries, 9, false).is_err());
    }
}
