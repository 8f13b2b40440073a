//! PDF source resolution.
//!
//! Turns a flyer record into parsed PDF bytes, trying sources in the order
//! the configured [`DeploymentProfile`] dictates:
//!
//! - `Production`: only `pdf_url` is trusted, and it must be absolute.
//! - `Local`: `pdf_path` first, then relative URLs probed against the
//!   uploads directory and each archive directory in turn, then absolute
//!   URLs over the network.
//!
//! Every failure is classified into a [`SourceErrorKind`] so the merge
//! orchestrator can render a precise placeholder message without parsing
//! error strings. Each individual fetch runs under the configured
//! deadline; expiry is just another resolution failure.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lopdf::Document;
use tracing::debug;

use crate::config::{DeploymentProfile, ResolverConfig};
use crate::error::{SourceError, SourceErrorKind};
use crate::model::Flyer;

/// Where a resolved PDF ultimately came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    /// The flyer's own `pdf_path`.
    LocalPath(PathBuf),
    /// A probed uploads/archive directory.
    Probed(PathBuf),
    /// A network fetch of `pdf_url`.
    Remote(String),
}

impl std::fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalPath(path) => write!(f, "local path {}", path.display()),
            Self::Probed(path) => write!(f, "probed file {}", path.display()),
            Self::Remote(url) => write!(f, "remote URL {url}"),
        }
    }
}

/// A successfully resolved and parsed flyer PDF.
pub struct ResolvedPdf {
    /// The parsed document.
    pub document: Document,

    /// Number of pages (always ≥ 1).
    pub page_count: usize,

    /// Size of the raw byte stream.
    pub byte_size: u64,

    /// Which source produced the bytes.
    pub origin: SourceOrigin,
}

/// Seam the merge orchestrator consumes; [`PdfSourceResolver`] is the
/// production implementation.
#[async_trait]
pub trait PdfSource: Send + Sync {
    /// Resolve a flyer to a parsed PDF, or a classified failure.
    async fn load(&self, flyer: &Flyer) -> Result<ResolvedPdf, SourceError>;
}

/// Profile-driven PDF resolver.
pub struct PdfSourceResolver {
    http: reqwest::Client,
    config: ResolverConfig,
}

impl PdfSourceResolver {
    /// Create a resolver for the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be constructed, which only happens
    /// when the TLS backend is unavailable at startup.
    pub fn new(config: ResolverConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(std::time::Duration::from_secs(10))
            .user_agent(concat!("volantino/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to construct HTTP client");
        Self { http, config }
    }

    async fn read_local(&self, flyer: &Flyer, path: &Path) -> Result<Vec<u8>, SourceError> {
        let read = tokio::fs::read(path);
        let bytes = tokio::time::timeout(self.config.fetch_timeout, read)
            .await
            .map_err(|_| {
                SourceError::new(
                    SourceErrorKind::Other,
                    &flyer.id,
                    path.display().to_string(),
                    "read timed out",
                )
            })?
            .map_err(|err| {
                let kind = if err.kind() == std::io::ErrorKind::NotFound {
                    SourceErrorKind::FileNotFound
                } else {
                    SourceErrorKind::Other
                };
                SourceError::new(kind, &flyer.id, path.display().to_string(), err.to_string())
            })?;
        Ok(bytes)
    }

    async fn fetch_remote(&self, flyer: &Flyer, url: &str) -> Result<Vec<u8>, SourceError> {
        // The client carries the request deadline; classify its expiry
        // like any other failure.
        let response = self.http.get(url).send().await.map_err(|err| {
            let detail = if err.is_timeout() {
                "request timed out".to_string()
            } else {
                err.to_string()
            };
            SourceError::new(SourceErrorKind::Other, &flyer.id, url, detail)
        })?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(SourceError::new(
                SourceErrorKind::UrlNotFound,
                &flyer.id,
                url,
                "HTTP 404",
            ));
        }
        if !status.is_success() {
            return Err(SourceError::new(
                SourceErrorKind::HttpError,
                &flyer.id,
                url,
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let bytes = response.bytes().await.map_err(|err| {
            SourceError::new(SourceErrorKind::Other, &flyer.id, url, err.to_string())
        })?;
        Ok(bytes.to_vec())
    }

    fn parse(
        &self,
        flyer: &Flyer,
        origin: SourceOrigin,
        bytes: Vec<u8>,
    ) -> Result<ResolvedPdf, SourceError> {
        let byte_size = bytes.len() as u64;

        let document = Document::load_mem(&bytes).map_err(|err| {
            SourceError::new(
                SourceErrorKind::CorruptDocument,
                &flyer.id,
                origin.to_string(),
                err.to_string(),
            )
        })?;

        let page_count = document.get_pages().len();
        if page_count == 0 {
            return Err(SourceError::new(
                SourceErrorKind::CorruptDocument,
                &flyer.id,
                origin.to_string(),
                "PDF has no pages",
            ));
        }

        debug!(
            flyer_id = %flyer.id,
            origin = %origin,
            pages = page_count,
            bytes = byte_size,
            "resolved flyer PDF"
        );

        Ok(ResolvedPdf {
            document,
            page_count,
            byte_size,
            origin,
        })
    }

    async fn load_production(&self, flyer: &Flyer) -> Result<ResolvedPdf, SourceError> {
        if !is_absolute_url(&flyer.pdf_url) {
            return Err(SourceError::new(
                SourceErrorKind::Other,
                &flyer.id,
                &flyer.pdf_url,
                "relative URL cannot be fetched in the production profile",
            ));
        }
        let bytes = self.fetch_remote(flyer, &flyer.pdf_url).await?;
        self.parse(flyer, SourceOrigin::Remote(flyer.pdf_url.clone()), bytes)
    }

    async fn load_local(
        &self,
        flyer: &Flyer,
        upload_dir: &Path,
        archive_dirs: &[PathBuf],
    ) -> Result<ResolvedPdf, SourceError> {
        // 1. The record's own local copy.
        if let Some(path) = &flyer.pdf_path {
            match self.read_local(flyer, path).await {
                Ok(bytes) => {
                    return self.parse(flyer, SourceOrigin::LocalPath(path.clone()), bytes);
                }
                Err(err) => {
                    debug!(flyer_id = %flyer.id, error = %err, "pdf_path unavailable, falling back to URL");
                }
            }
        }

        // 2. Relative URLs never hit the network; probe the known
        //    directories in fixed order instead.
        if !is_absolute_url(&flyer.pdf_url) {
            let relative = flyer.pdf_url.trim_start_matches('/');
            let mut candidates = vec![upload_dir.join(relative)];
            candidates.extend(archive_dirs.iter().map(|dir| dir.join(relative)));

            for probe in candidates {
                match self.read_local(flyer, &probe).await {
                    Ok(bytes) => {
                        return self.parse(flyer, SourceOrigin::Probed(probe), bytes);
                    }
                    Err(err) if err.kind == SourceErrorKind::FileNotFound => continue,
                    Err(err) => return Err(err),
                }
            }

            return Err(SourceError::new(
                SourceErrorKind::FileNotFound,
                &flyer.id,
                &flyer.pdf_url,
                "not found in uploads or archive directories",
            ));
        }

        // 3. A real network fetch.
        let bytes = self.fetch_remote(flyer, &flyer.pdf_url).await?;
        self.parse(flyer, SourceOrigin::Remote(flyer.pdf_url.clone()), bytes)
    }
}

#[async_trait]
impl PdfSource for PdfSourceResolver {
    async fn load(&self, flyer: &Flyer) -> Result<ResolvedPdf, SourceError> {
        match &self.config.profile {
            DeploymentProfile::Production => self.load_production(flyer).await,
            DeploymentProfile::Local {
                upload_dir,
                archive_dirs,
            } => self.load_local(flyer, upload_dir, archive_dirs).await,
        }
    }
}

fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
