//! Crawl orchestration.

use super::detail::parse_detail;
use super::fetcher::PageSource;
use super::listing::extract_detail_urls_from;
use crate::repository::{LandmarkStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("failed to establish session: {0:#}")]
    Session(anyhow::Error),

    #[error("listing page {0} returned no content")]
    ListingUnavailable(String),

    #[error("failed to persist landmarks: {0}")]
    Persist(#[from] StoreError),
}

/// Outcome of a completed crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Detail URLs found on the listing page.
    pub discovered: usize,
    /// Detail pages that could not be fetched.
    pub fetch_failures: usize,
    pub saved: usize,
}

/// One-shot crawl: session, listing, every detail page, one bulk save.
pub struct Crawler {
    source: Arc<dyn PageSource>,
    store: Arc<dyn LandmarkStore>,
    base_url: String,
}

impl Crawler {
    pub fn new(
        source: Arc<dyn PageSource>,
        store: Arc<dyn LandmarkStore>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            base_url: base_url.into(),
        }
    }

    #[instrument(level = "info", skip_all, fields(base_url = %self.base_url))]
    pub async fn run(&self) -> Result<CrawlReport, CrawlError> {
        self.source
            .establish_session(&self.base_url)
            .await
            .map_err(CrawlError::Session)?;

        let listing = self
            .source
            .fetch(&self.base_url)
            .await
            .filter(|body| !body.trim().is_empty())
            .ok_or_else(|| CrawlError::ListingUnavailable(self.base_url.clone()))?;

        let base = Url::parse(&self.base_url).ok();
        let urls = extract_detail_urls_from(&listing, base.as_ref());
        let mut report = CrawlReport {
            discovered: urls.len(),
            ..Default::default()
        };
        if urls.is_empty() {
            warn!("Listing page has no detail links");
        }

        let mut landmarks = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().enumerate() {
            let Some(body) = self.source.fetch(url).await.filter(|b| !b.trim().is_empty()) else {
                // The fetcher has already logged the cause.
                debug!(%url, "Skipping detail page without content");
                report.fetch_failures += 1;
                continue;
            };

            let landmark = parse_detail(&body);
            info!(
                progress = %format!("{}/{}", index + 1, urls.len()),
                name = %landmark.name,
                "Parsed landmark"
            );
            landmarks.push(landmark);
        }

        if landmarks.is_empty() {
            warn!(failures = report.fetch_failures, "Nothing to save");
            return Ok(report);
        }

        report.saved = self.store.save_landmarks(&landmarks).await.map_err(|e| {
            error!(error = %e, count = landmarks.len(), "Failed to save landmarks");
            CrawlError::Persist(e)
        })?;

        info!(
            discovered = report.discovered,
            saved = report.saved,
            fetch_failures = report.fetch_failures,
            "Crawl finished"
        );
        Ok(report)
    }
}
