//! Landmark scraping pipeline.
//!
//! The crawl follows the same two-phase pattern for every run:
//!
//! 1. **Indexing**: fetch the listing page and collect detail-page URLs
//! 2. **Fetching**: download each detail page and parse it into a [`Landmark`]
//!
//! # Submodules
//!
//! | Module | Role |
//! |--------|------|
//! | [`fetcher`] | HTTP GET with a cookie jar filled once per run |
//! | [`listing`] | Detail-page URLs from the card grid and the fallback list |
//! | [`detail`] | Address, coordinates, name and history from a detail page |
//! | [`crawl`] | Sequential orchestration and the single bulk save |
//!
//! Pages are processed one at a time. A page that cannot be fetched is
//! logged and skipped; only a failure to open the session or to read the
//! listing aborts the crawl.
//!
//! [`Landmark`]: crate::models::Landmark

pub mod crawl;
pub mod detail;
pub mod fetcher;
pub mod listing;

pub use crawl::{CrawlError, CrawlReport, Crawler};
pub use fetcher::{HttpFetcher, PageSource};
