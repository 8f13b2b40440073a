//! volantino - supermarket flyer aggregation core.
//!
//! This library implements the two non-trivial pieces of a retail-flyer
//! backend:
//!
//! - The **merge engine**: combine several flyers' PDFs into one document
//!   in caller order, interleave sponsor advertisement pages at cover /
//!   intermediate / final slots, prepend a table of contents, substitute a
//!   placeholder page for any flyer whose source cannot be retrieved, and
//!   persist the result under the `volantino-mix-*` naming convention.
//! - **Duplicate detection**: decide, before ingesting a new flyer,
//!   whether an equivalent record already exists (by URL, local path,
//!   content hash or overlapping validity window) and recommend an
//!   action.
//!
//! Storage, PDF resolution and ad selection are trait seams injected into
//! the orchestrator; in-memory adapters back the tests and the CLI.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use volantino::ads::StoreAdSelector;
//! use volantino::config::{MergeOptions, OutputConfig, ResolverConfig};
//! use volantino::merge::MergeOrchestrator;
//! use volantino::resolve::PdfSourceResolver;
//! use volantino::store::{InMemoryAdStore, InMemoryFlyerStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryFlyerStore::new());
//! let resolver = Arc::new(PdfSourceResolver::new(ResolverConfig::production()));
//! let ads = Arc::new(StoreAdSelector::new(Arc::new(InMemoryAdStore::new())));
//!
//! let orchestrator = MergeOrchestrator::new(
//!     store,
//!     resolver,
//!     ads,
//!     OutputConfig::new("./merged".into()),
//! );
//!
//! let outcome = orchestrator
//!     .merge(
//!         &["f1".to_string(), "f2".to_string()],
//!         &MergeOptions::default(),
//!         None,
//!     )
//!     .await?;
//! println!("wrote {} ({} pages)", outcome.filename, outcome.total_pages);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ads;
pub mod config;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod maintenance;
pub mod merge;
pub mod model;
pub mod output;
pub mod resolve;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use error::{MergeError, Result};
pub use merge::{MergeOrchestrator, MergeOutcome};
pub use model::{Advertisement, Flyer};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
