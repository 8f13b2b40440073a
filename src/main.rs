//! volantino - operational CLI for the flyer merge engine.
//!
//! Loads a JSON catalog snapshot into the in-memory stores and drives a
//! merge, a duplicate check, or an artifact sweep against it. Handy for
//! exercising the engine outside the backend process.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use volantino::ads::StoreAdSelector;
use volantino::config::{MergeOptions, OutputConfig, ResolverConfig};
use volantino::dedup::{DuplicateCandidate, DuplicateChecker, DuplicateCheckOptions};
use volantino::maintenance;
use volantino::merge::MergeOrchestrator;
use volantino::model::{AdPosition, Advertisement, Flyer, FlyerCategory, UserLocation};
use volantino::resolve::PdfSourceResolver;
use volantino::store::{InMemoryAdStore, InMemoryFlyerStore};

/// A catalog snapshot: flyer and ad records in one JSON file.
#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    flyers: Vec<Flyer>,
    #[serde(default)]
    ads: Vec<Advertisement>,
}

impl Catalog {
    fn load(path: &PathBuf) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse catalog {}", path.display()))
    }
}

#[derive(Parser)]
#[command(name = "volantino", version, about = "Flyer merge engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge flyers from a catalog snapshot into one PDF.
    Merge {
        /// Path to the JSON catalog snapshot.
        #[arg(long)]
        catalog: PathBuf,

        /// Comma-separated flyer ids, in merge order.
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,

        /// Output directory for the merged document.
        #[arg(long, default_value = "./merged")]
        output_dir: PathBuf,

        /// Uploads directory for relative-URL probing.
        #[arg(long, default_value = "./uploads")]
        uploads_dir: PathBuf,

        /// Additional archive directories, probed in order.
        #[arg(long)]
        archive_dir: Vec<PathBuf>,

        /// Skip advertisement pages.
        #[arg(long)]
        no_ads: bool,

        /// Skip the table-of-contents page.
        #[arg(long)]
        no_toc: bool,

        /// Ad positions to fill.
        #[arg(long, value_delimiter = ',', default_values = ["cover", "intermediate", "final"])]
        positions: Vec<String>,

        /// Caller city for ad targeting.
        #[arg(long)]
        city: Option<String>,

        /// Caller postal code for ad targeting.
        #[arg(long)]
        postal_code: Option<String>,
    },

    /// Check a candidate flyer against the catalog for duplicates.
    Check {
        /// Path to the JSON catalog snapshot.
        #[arg(long)]
        catalog: PathBuf,

        /// Store name of the candidate.
        #[arg(long)]
        store: String,

        /// Category of the candidate.
        #[arg(long)]
        category: String,

        /// Candidate PDF URL.
        #[arg(long)]
        pdf_url: Option<String>,

        /// Candidate local PDF path.
        #[arg(long)]
        pdf_path: Option<PathBuf>,

        /// Validity window start (RFC 3339).
        #[arg(long)]
        valid_from: Option<String>,

        /// Validity window end (RFC 3339).
        #[arg(long)]
        valid_to: Option<String>,

        /// Also compare content hashes.
        #[arg(long)]
        check_hash: bool,
    },

    /// Delete stale merged artifacts from an output directory.
    Sweep {
        /// Output directory to sweep.
        #[arg(long, default_value = "./merged")]
        output_dir: PathBuf,

        /// Age in days beyond which artifacts are deleted.
        #[arg(long, default_value_t = 7)]
        max_age_days: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Merge {
            catalog,
            ids,
            output_dir,
            uploads_dir,
            archive_dir,
            no_ads,
            no_toc,
            positions,
            city,
            postal_code,
        } => {
            let snapshot = Catalog::load(&catalog)?;
            let store = Arc::new(InMemoryFlyerStore::with_flyers(snapshot.flyers));
            let ad_store = Arc::new(InMemoryAdStore::with_ads(snapshot.ads));

            let resolver = Arc::new(PdfSourceResolver::new(ResolverConfig::local(
                uploads_dir,
                archive_dir,
            )));
            let selector = Arc::new(StoreAdSelector::new(ad_store));

            let ad_positions = positions
                .iter()
                .map(|p| AdPosition::from_str(p))
                .collect::<volantino::Result<Vec<_>>>()?;
            let options = MergeOptions {
                include_ads: !no_ads,
                ad_positions,
                include_toc: !no_toc,
            };

            let location = (city.is_some() || postal_code.is_some()).then(|| UserLocation {
                city,
                postal_code,
                ..Default::default()
            });

            let orchestrator =
                MergeOrchestrator::new(store, resolver, selector, OutputConfig::new(output_dir));
            let outcome = orchestrator.merge(&ids, &options, location.as_ref()).await?;

            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Command::Check {
            catalog,
            store,
            category,
            pdf_url,
            pdf_path,
            valid_from,
            valid_to,
            check_hash,
        } => {
            let snapshot = Catalog::load(&catalog)?;
            let flyer_store = Arc::new(InMemoryFlyerStore::with_flyers(snapshot.flyers));
            let checker = DuplicateChecker::new(flyer_store);

            let candidate = DuplicateCandidate {
                store,
                category: FlyerCategory::from_str(&category)?,
                pdf_url,
                pdf_path,
                valid_from: parse_instant(valid_from.as_deref())?,
                valid_to: parse_instant(valid_to.as_deref())?,
                file_hash: None,
            };
            let options = DuplicateCheckOptions {
                check_file_hash: check_hash,
                ..Default::default()
            };

            let verdict = checker.check(&candidate, &options).await?;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }

        Command::Sweep {
            output_dir,
            max_age_days,
        } => {
            let max_age = Duration::from_secs(max_age_days * 24 * 60 * 60);
            let report = maintenance::sweep_merged_artifacts(&output_dir, max_age)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn parse_instant(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("invalid RFC 3339 instant: {raw}"))
        })
        .transpose()
}
