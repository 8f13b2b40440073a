//! HTTP resolution tests against a wiremock server: the production
//! profile's happy path and its error classification.

mod common;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use volantino::config::ResolverConfig;
use volantino::error::SourceErrorKind;
use volantino::resolve::{PdfSource, PdfSourceResolver, SourceOrigin};

use common::{pdf_with_pages, unresolvable_flyer};

fn production_resolver() -> PdfSourceResolver {
    PdfSourceResolver::new(ResolverConfig::production())
}

#[tokio::test]
async fn fetches_and_parses_remote_pdf() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/eurospin/week3.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(pdf_with_pages(4)),
        )
        .mount(&server)
        .await;

    let mut flyer = unresolvable_flyer("f1", "Eurospin", "Milano");
    flyer.pdf_url = format!("{}/eurospin/week3.pdf", server.uri());

    let resolved = production_resolver().load(&flyer).await.unwrap();
    assert_eq!(resolved.page_count, 4);
    assert!(matches!(resolved.origin, SourceOrigin::Remote(_)));
    assert!(resolved.byte_size > 0);
}

#[tokio::test]
async fn http_404_classifies_as_url_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut flyer = unresolvable_flyer("f1", "Eurospin", "Milano");
    flyer.pdf_url = format!("{}/gone.pdf", server.uri());

    let err = production_resolver().load(&flyer).await.unwrap_err();
    assert_eq!(err.kind, SourceErrorKind::UrlNotFound);
}

#[tokio::test]
async fn http_5xx_classifies_as_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut flyer = unresolvable_flyer("f1", "Eurospin", "Milano");
    flyer.pdf_url = format!("{}/flaky.pdf", server.uri());

    let err = production_resolver().load(&flyer).await.unwrap_err();
    assert_eq!(err.kind, SourceErrorKind::HttpError);
    assert!(err.detail.contains("503"));
}

#[tokio::test]
async fn non_pdf_body_classifies_as_corrupt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a pdf</html>"))
        .mount(&server)
        .await;

    let mut flyer = unresolvable_flyer("f1", "Eurospin", "Milano");
    flyer.pdf_url = format!("{}/fake.pdf", server.uri());

    let err = production_resolver().load(&flyer).await.unwrap_err();
    assert_eq!(err.kind, SourceErrorKind::CorruptDocument);
}

#[tokio::test]
async fn unreachable_host_classifies_as_other() {
    // Reserved TEST-NET-1 address; connections fail fast.
    let mut flyer = unresolvable_flyer("f1", "Eurospin", "Milano");
    flyer.pdf_url = "http://192.0.2.1:9/unreachable.pdf".to_string();

    let resolver = PdfSourceResolver::new(ResolverConfig {
        fetch_timeout: std::time::Duration::from_millis(500),
        ..ResolverConfig::production()
    });
    let err = resolver.load(&flyer).await.unwrap_err();
    assert_eq!(err.kind, SourceErrorKind::Other);
}
