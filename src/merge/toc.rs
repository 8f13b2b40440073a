//! Table-of-contents model and page synthesis.
//!
//! Entries are recorded during assembly with page spans relative to the
//! document body; when the caller asked for a TOC and more than one entry
//! exists, every span is shifted by the TOC page and a contents page is
//! prepended. The accounting invariant: entry spans always sum to the
//! final page count minus the TOC page itself.

use serde::{Deserialize, Serialize};

use crate::merge::pagegen::TextLine;

/// Number of pages the synthesized contents page occupies. The 10-flyer
/// request cap keeps every possible entry list on a single page.
pub const TOC_PAGES: u32 = 1;

/// What a TOC entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TocEntryType {
    /// A flyer whose pages were merged in.
    Flyer,
    /// A flyer that could not be retrieved; its span is the placeholder
    /// page.
    FlyerError,
    /// A rendered advertisement page.
    Ad,
}

/// One table-of-contents entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    /// Display title ("<store> - <city>" for flyers, the ad title for ads).
    pub title: String,

    /// Entry kind.
    #[serde(rename = "type")]
    pub entry_type: TocEntryType,

    /// First page of the entry's span, 1-based in the final document.
    pub start_page: u32,

    /// Number of pages in the span. Ads and placeholders span exactly one.
    pub page_count: u32,

    /// Failure reason, present on `FlyerError` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TocEntry {
    /// A merged-flyer entry.
    pub fn flyer(title: impl Into<String>, start_page: u32, page_count: u32) -> Self {
        Self {
            title: title.into(),
            entry_type: TocEntryType::Flyer,
            start_page,
            page_count,
            reason: None,
        }
    }

    /// A placeholder entry for an unretrievable flyer.
    pub fn flyer_error(title: impl Into<String>, start_page: u32, reason: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            entry_type: TocEntryType::FlyerError,
            start_page,
            page_count: 1,
            reason: Some(reason.into()),
        }
    }

    /// An advertisement entry.
    pub fn ad(title: impl Into<String>, start_page: u32) -> Self {
        Self {
            title: title.into(),
            entry_type: TocEntryType::Ad,
            start_page,
            page_count: 1,
            reason: None,
        }
    }

    /// Page range label, e.g. "2-7" or "9" for a single page.
    pub fn page_label(&self) -> String {
        if self.page_count <= 1 {
            format!("{}", self.start_page)
        } else {
            format!("{}-{}", self.start_page, self.start_page + self.page_count - 1)
        }
    }

    /// Shift the span by the given number of pages (TOC prepending).
    pub fn offset_pages(&mut self, by: u32) {
        self.start_page += by;
    }
}

/// Aggregate counts shown at the bottom of the contents page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TocSummary {
    /// Flyers merged in full.
    pub flyers_included: usize,
    /// Advertisement pages inserted.
    pub ads_included: usize,
    /// Flyers replaced by a placeholder.
    pub flyers_unavailable: usize,
}

impl TocSummary {
    /// Tally the entry list.
    pub fn from_entries(entries: &[TocEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry.entry_type {
                TocEntryType::Flyer => summary.flyers_included += 1,
                TocEntryType::FlyerError => summary.flyers_unavailable += 1,
                TocEntryType::Ad => summary.ads_included += 1,
            }
        }
        summary
    }
}

/// Lines for the synthesized contents page.
///
/// Error entries show their reason in place of a page range.
pub fn toc_lines(entries: &[TocEntry]) -> Vec<TextLine> {
    let mut lines = vec![TextLine::heading("Table of Contents"), TextLine::blank()];

    for (index, entry) in entries.iter().enumerate() {
        let line = match entry.entry_type {
            TocEntryType::Flyer => {
                format!("{}. {}  -  page {}", index + 1, entry.title, entry.page_label())
            }
            TocEntryType::FlyerError => {
                let reason = entry.reason.as_deref().unwrap_or("unavailable");
                format!("{}. {}  -  {}", index + 1, entry.title, reason)
            }
            TocEntryType::Ad => {
                format!("{}. {} (ad)  -  page {}", index + 1, entry.title, entry.page_label())
            }
        };
        lines.push(TextLine::body(line));
    }

    let summary = TocSummary::from_entries(entries);
    lines.push(TextLine::blank());
    lines.push(TextLine::detail(format!(
        "{} flyers included, {} ads, {} unavailable",
        summary.flyers_included, summary.ads_included, summary.flyers_unavailable
    )));

    lines
}
