//! Shared fixtures for the integration tests.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use lopdf::{Document, Object};

use volantino::ads::StoreAdSelector;
use volantino::config::{OutputConfig, ResolverConfig};
use volantino::merge::MergeOrchestrator;
use volantino::model::{
    AdMetrics, AdPosition, Advertisement, Flyer, FlyerCategory, FlyerSource, StoreLocation,
};
use volantino::resolve::PdfSourceResolver;
use volantino::store::{InMemoryAdStore, InMemoryFlyerStore};

/// Serialize a minimal valid PDF with the given number of pages.
pub fn pdf_with_pages(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let mut page_ids = Vec::new();
    for _ in 0..pages {
        let page_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        page_ids.push(page_id);
    }

    let pages_dict = lopdf::dictionary! {
        "Type" => "Pages",
        "Kids" => page_ids.iter().map(|&id| Object::Reference(id)).collect::<Vec<Object>>(),
        "Count" => pages as i64,
    };
    doc.objects.insert(pages_id, pages_dict.into());

    let catalog_id = doc.add_object(lopdf::dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture serialization");
    bytes
}

/// Write a PDF fixture with the given page count into `dir` and return its
/// path.
pub fn write_pdf_fixture(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, pdf_with_pages(pages)).expect("fixture write");
    path
}

/// A flyer whose PDF lives at `pdf_path`.
pub fn flyer_at(id: &str, store: &str, city: &str, pdf_path: PathBuf) -> Flyer {
    Flyer {
        id: id.to_string(),
        store: store.to_string(),
        category: FlyerCategory::Supermercato,
        source: FlyerSource::Scraped(store.to_lowercase()),
        location: StoreLocation {
            address: "Via Roma 1".to_string(),
            city: city.to_string(),
            postal_code: "20121".to_string(),
            lat: None,
            lng: None,
        },
        valid_from: Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap(),
        valid_to: Utc.with_ymd_and_hms(2025, 1, 20, 0, 0, 0).unwrap(),
        pdf_url: format!("{}/{id}.pdf", store.to_lowercase()),
        pdf_path: Some(pdf_path),
        pages: 1,
        file_size: "1.00 KB".to_string(),
        download_count: 0,
        view_count: 0,
        file_hash: None,
        is_active: true,
        created_at: Utc.with_ymd_and_hms(2025, 1, 9, 0, 0, 0).unwrap(),
    }
}

/// A flyer whose sources all dangle (missing path, unprobeable relative
/// URL), so resolution always fails.
pub fn unresolvable_flyer(id: &str, store: &str, city: &str) -> Flyer {
    let mut flyer = flyer_at(id, store, city, PathBuf::from("/nonexistent").join(id));
    flyer.pdf_url = format!("gone/{id}.pdf");
    flyer
}

/// An always-eligible untargeted ad.
pub fn ad(id: &str, position: AdPosition, priority: u8) -> Advertisement {
    Advertisement {
        id: id.to_string(),
        title: format!("Sponsor {id}"),
        position,
        category: "food".to_string(),
        priority,
        targeting: Vec::new(),
        metrics: AdMetrics::default(),
        is_active: true,
        start_date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        end_date: None,
        max_impressions: None,
    }
}

/// An orchestrator wired to in-memory stores and a local-profile resolver
/// probing `uploads_dir`.
pub fn orchestrator(
    flyer_store: Arc<InMemoryFlyerStore>,
    ad_store: Arc<InMemoryAdStore>,
    uploads_dir: &Path,
    output_dir: &Path,
) -> MergeOrchestrator {
    let resolver = Arc::new(PdfSourceResolver::new(ResolverConfig::local(
        uploads_dir.to_path_buf(),
        Vec::new(),
    )));
    let selector = Arc::new(StoreAdSelector::new(ad_store));
    MergeOrchestrator::new(
        flyer_store,
        resolver,
        selector,
        OutputConfig::new(output_dir.to_path_buf()),
    )
}
