//! Persistence for landmarks and their forecasts.
//!
//! Two capability traits split the storage surface:
//! - [`LandmarkStore`]: landmark records, listing, search and the map query
//! - [`WeatherStore`]: forecast rows keyed by `(landmark_id, date)`
//!
//! Both are implemented by [`postgres::PgStore`] (PostGIS) and
//! [`json::JsonStore`] (a single JSON file). [`Repository::open`] picks one
//! from the configuration and hands out both capabilities over the same
//! backend instance.

pub mod json;
pub mod postgres;

use crate::config::{Config, StorageBackend};
use crate::models::{Bbox, Landmark, LocationError, WeatherForecast, WeatherResponse};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub use json::JsonStore;
pub use postgres::PgStore;

/// Number of landmarks on one page of [`LandmarkStore::get_landmarks`].
pub const PAGE_SIZE: u32 = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed store file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stored location is invalid: {0}")]
    Location(#[from] LocationError),
}

#[async_trait]
pub trait LandmarkStore: Send + Sync {
    /// Insert every landmark in one atomic batch. Returns the number saved.
    async fn save_landmarks(&self, landmarks: &[Landmark]) -> Result<usize, StoreError>;

    /// One page of landmarks ordered by id, or all of them when `page` is
    /// `None`. Pages start at 1. A non-empty `categories` keeps only
    /// landmarks whose category matches one of them, case-insensitively.
    async fn get_landmarks(
        &self,
        page: Option<u32>,
        categories: &[String],
    ) -> Result<Vec<Landmark>, StoreError>;

    async fn get_landmarks_by_ids(&self, ids: &[i64]) -> Result<Vec<Landmark>, StoreError>;

    /// Look a landmark up by its translated name.
    async fn get_landmark_by_name(&self, name: &str) -> Result<Option<Landmark>, StoreError>;

    /// Full-text search over names, then addresses. Each landmark appears once.
    async fn search(&self, query: &str) -> Result<Vec<Landmark>, StoreError>;

    /// Landmarks located inside `bbox`.
    async fn get_facilities(&self, bbox: Bbox) -> Result<Vec<Landmark>, StoreError>;

    /// Point the landmark identified by `place` at a new image file.
    ///
    /// Matches landmarks named `place`, and landmarks whose current image name
    /// lowercased equals `image_path`. Returns the number of landmarks updated.
    async fn update_image_path(&self, place: &str, image_path: &str) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait WeatherStore: Send + Sync {
    /// Upsert every interval of `forecast` for `landmark_id`.
    ///
    /// A row that fails to write is logged and skipped. Returns the number of
    /// rows written.
    async fn set_weather(
        &self,
        landmark_id: i64,
        forecast: &WeatherForecast,
    ) -> Result<usize, StoreError>;

    /// Forecast rows strictly in the future, earliest first.
    async fn get_weather_by_landmark_id(
        &self,
        landmark_id: i64,
    ) -> Result<Vec<WeatherResponse>, StoreError>;
}

/// Both storage capabilities over one backend.
#[derive(Clone)]
pub struct Repository {
    pub landmarks: Arc<dyn LandmarkStore>,
    pub weather: Arc<dyn WeatherStore>,
}

impl Repository {
    /// Connect to the backend selected by `config.storage.backend`.
    pub async fn open(config: &Config) -> Result<Self> {
        match config.storage.backend {
            StorageBackend::Postgres => {
                let store = Arc::new(PgStore::connect(&config.db).await?);
                info!(host = %config.db.host, dbname = %config.db.dbname, "Using PostgreSQL storage");
                Ok(Self::from_store(store))
            }
            StorageBackend::Json => {
                let store = Arc::new(JsonStore::open(&config.storage.json_path).await?);
                info!(path = %config.storage.json_path.display(), "Using JSON file storage");
                Ok(Self::from_store(store))
            }
        }
    }

    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: LandmarkStore + WeatherStore + 'static,
    {
        Self {
            landmarks: store.clone(),
            weather: store,
        }
    }
}

/// Zero-based row offset of a one-based page. Page 0 is treated as page 1.
pub(crate) fn page_offset(page: u32) -> u32 {
    page.saturating_sub(1).saturating_mul(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(0), 0);
        assert_eq!(page_offset(1), 0);
        assert_eq!(page_offset(2), 10);
        assert_eq!(page_offset(7), 60);
    }

    #[tokio::test]
    async fn test_repository_shares_one_backend() {
        let store = Arc::new(JsonStore::in_memory());
        let repo = Repository::from_store(store);

        repo.landmarks
            .save_landmarks(&[Landmark {
                name: "Воронцовский дворец".to_string(),
                ..Default::default()
            }])
            .await
            .unwrap();

        let all = repo.landmarks.get_landmarks(None, &[]).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(
            repo.weather
                .get_weather_by_landmark_id(all[0].id)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
