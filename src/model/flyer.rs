//! The flyer record: a single retailer's promotional PDF with its validity
//! window and retrieval metadata.
//!
//! Validation happens here, at the boundary, through [`Flyer::validate`]:
//! the storage adapters persist whatever they are given and never run
//! field checks of their own.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MergeError;

/// Upper bound on the page count a single flyer may claim.
pub const MAX_FLYER_PAGES: u32 = 500;

/// Category of the retail chain a flyer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlyerCategory {
    /// Full-range supermarket.
    Supermercato,
    /// Discount chain.
    Discount,
    /// Hypermarket.
    Ipermercato,
    /// Organic / specialty grocer.
    Biologico,
    /// Anything else.
    Altro,
}

impl FromStr for FlyerCategory {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "supermercato" => Ok(Self::Supermercato),
            "discount" => Ok(Self::Discount),
            "ipermercato" => Ok(Self::Ipermercato),
            "biologico" => Ok(Self::Biologico),
            "altro" => Ok(Self::Altro),
            _ => Err(MergeError::invalid_input(format!(
                "unknown category: {s}. Must be one of: supermercato, discount, ipermercato, biologico, altro"
            ))),
        }
    }
}

impl std::fmt::Display for FlyerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Supermercato => "Supermercato",
            Self::Discount => "Discount",
            Self::Ipermercato => "Ipermercato",
            Self::Biologico => "Biologico",
            Self::Altro => "Altro",
        };
        f.write_str(name)
    }
}

/// How a flyer record entered the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "chain")]
pub enum FlyerSource {
    /// Uploaded by an operator.
    Manual,
    /// Produced by a scraping run for the named chain.
    Scraped(String),
    /// Pushed through the ingestion API.
    Api,
}

/// Physical store location a flyer advertises for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreLocation {
    /// Street address.
    pub address: String,

    /// City name.
    pub city: String,

    /// 5-digit postal code.
    pub postal_code: String,

    /// Latitude, if geocoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,

    /// Longitude, if geocoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

/// Geolocation hint supplied by the caller of a merge, used for ad targeting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLocation {
    /// City name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    /// 5-digit postal code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    /// Latitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,

    /// Longitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

/// A single violated field constraint, produced by [`Flyer::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    /// Name of the offending field.
    pub field: String,

    /// What constraint it violated.
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// A retailer's promotional PDF document with validity window and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flyer {
    /// Opaque unique id.
    pub id: String,

    /// Retail chain name, e.g. "Eurospin".
    pub store: String,

    /// Chain category.
    pub category: FlyerCategory,

    /// Where the record came from.
    pub source: FlyerSource,

    /// Store location the flyer applies to.
    pub location: StoreLocation,

    /// Start of the validity window.
    pub valid_from: DateTime<Utc>,

    /// End of the validity window. Must be after `valid_from`.
    pub valid_to: DateTime<Utc>,

    /// Remote or relative reference to the source PDF. Required.
    pub pdf_url: String,

    /// Local filesystem copy of the source PDF, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<PathBuf>,

    /// Number of pages in the PDF.
    pub pages: u32,

    /// Pre-formatted file size, e.g. "3.20 MB".
    #[serde(default)]
    pub file_size: String,

    /// Times the flyer was downloaded.
    #[serde(default)]
    pub download_count: u64,

    /// Times the flyer was viewed (included in a merge or opened).
    #[serde(default)]
    pub view_count: u64,

    /// Hex SHA-256 of the PDF bytes, when known. Feeds duplicate detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,

    /// Soft-delete flag. Inactive flyers are invisible to merges.
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Flyer {
    /// Title used for this flyer in a table of contents.
    pub fn display_title(&self) -> String {
        format!("{} - {}", self.store, self.location.city)
    }

    /// Whether the validity window has passed as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_to < now
    }

    /// Validate all field constraints.
    ///
    /// Returns every violation at once so callers can report a complete
    /// error list rather than the first failure.
    ///
    /// # Errors
    ///
    /// Returns the list of violated constraints if any check fails.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.store.trim().is_empty() {
            errors.push(FieldError::new("store", "store name is required"));
        }

        if self.pdf_url.trim().is_empty() {
            errors.push(FieldError::new("pdfUrl", "pdfUrl is required"));
        }

        if self.valid_from >= self.valid_to {
            errors.push(FieldError::new(
                "validFrom",
                "validFrom must be before validTo",
            ));
        }

        if self.pages == 0 {
            errors.push(FieldError::new("pages", "page count must be positive"));
        } else if self.pages > MAX_FLYER_PAGES {
            errors.push(FieldError::new(
                "pages",
                format!("page count exceeds the {MAX_FLYER_PAGES}-page cap"),
            ));
        }

        if self.location.city.trim().is_empty() {
            errors.push(FieldError::new("location.city", "city is required"));
        }

        let postal = &self.location.postal_code;
        if postal.len() != 5 || !postal.chars().all(|c| c.is_ascii_digit()) {
            errors.push(FieldError::new(
                "location.postalCode",
                "postal code must be exactly 5 digits",
            ));
        }

        if let Some(hash) = &self.file_hash
            && (hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()))
        {
            errors.push(FieldError::new(
                "fileHash",
                "file hash must be a 64-character hex SHA-256 digest",
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
