//! Landmark and weather services used by the HTTP handlers.

use crate::models::{Bbox, Landmark, WeatherResponse};
use crate::repository::{LandmarkStore, Repository, StoreError, WeatherStore};
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct Service {
    pub landmarks: LandmarkService,
    pub weather: WeatherService,
}

impl Service {
    pub fn new(repo: &Repository) -> Self {
        let weather = WeatherService::new(repo.weather.clone());
        Self {
            landmarks: LandmarkService::new(repo.landmarks.clone(), weather.clone()),
            weather,
        }
    }
}

#[derive(Clone)]
pub struct WeatherService {
    store: Arc<dyn WeatherStore>,
}

impl WeatherService {
    pub fn new(store: Arc<dyn WeatherStore>) -> Self {
        Self { store }
    }

    pub async fn get_by_landmark_id(
        &self,
        landmark_id: i64,
    ) -> Result<Vec<WeatherResponse>, StoreError> {
        self.store.get_weather_by_landmark_id(landmark_id).await
    }

    /// Attach upcoming forecasts to each landmark.
    ///
    /// A lookup failure leaves that landmark without weather.
    pub async fn attach(&self, landmarks: &mut [Landmark]) {
        for landmark in landmarks.iter_mut() {
            match self.get_by_landmark_id(landmark.id).await {
                Ok(rows) => landmark.weather = Some(rows),
                Err(e) => error!(id = landmark.id, error = %e, "Error finding weather"),
            }
        }
    }
}

#[derive(Clone)]
pub struct LandmarkService {
    store: Arc<dyn LandmarkStore>,
    weather: WeatherService,
}

impl LandmarkService {
    pub fn new(store: Arc<dyn LandmarkStore>, weather: WeatherService) -> Self {
        Self { store, weather }
    }

    pub async fn list(&self, page: u32, categories: &[String]) -> Result<Vec<Landmark>, StoreError> {
        let mut landmarks = self.store.get_landmarks(Some(page), categories).await?;
        self.weather.attach(&mut landmarks).await;
        Ok(landmarks)
    }

    pub async fn by_ids(&self, ids: &[i64]) -> Result<Vec<Landmark>, StoreError> {
        let mut landmarks = self.store.get_landmarks_by_ids(ids).await?;
        self.weather.attach(&mut landmarks).await;
        Ok(landmarks)
    }

    pub async fn by_name(&self, name: &str) -> Result<Option<Landmark>, StoreError> {
        let Some(mut landmark) = self.store.get_landmark_by_name(name).await? else {
            return Ok(None);
        };
        self.weather.attach(std::slice::from_mut(&mut landmark)).await;
        Ok(Some(landmark))
    }

    /// Search results come without weather.
    pub async fn search(&self, query: &str) -> Result<Vec<Landmark>, StoreError> {
        self.store.search(query).await
    }

    pub async fn facilities(&self, bbox: Bbox) -> Result<Vec<Landmark>, StoreError> {
        let mut landmarks = self.store.get_facilities(bbox).await?;
        self.weather.attach(&mut landmarks).await;
        Ok(landmarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Forecast, Location, Point, WeatherForecast};
    use crate::repository::JsonStore;
    use async_trait::async_trait;
    use chrono::Utc;

    struct BrokenWeather;

    #[async_trait]
    impl WeatherStore for BrokenWeather {
        async fn set_weather(&self, _: i64, _: &WeatherForecast) -> Result<usize, StoreError> {
            Ok(0)
        }

        async fn get_weather_by_landmark_id(
            &self,
            _: i64,
        ) -> Result<Vec<WeatherResponse>, StoreError> {
            Err(StoreError::Json(
                serde_json::from_str::<()>("{").unwrap_err(),
            ))
        }
    }

    async fn seeded() -> Arc<JsonStore> {
        let store = Arc::new(JsonStore::in_memory());
        let mut nest = Landmark {
            name: "Ласточкино гнездо".to_string(),
            location: Location { lat: 44.43, lng: 34.13 },
            ..Default::default()
        };
        nest.set_image_path("lastochkino_gnezdo.jpg");
        store.save_landmarks(&[nest]).await.unwrap();

        let forecast = WeatherForecast {
            list: vec![Forecast {
                dt: Utc::now().timestamp() + 3600,
                ..Default::default()
            }],
            ..Default::default()
        };
        store.set_weather(1, &forecast).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_weather_is_attached() {
        let service = Service::new(&Repository::from_store(seeded().await));

        let listed = service.landmarks.list(1, &[]).await.unwrap();
        assert_eq!(listed[0].weather.as_ref().map(Vec::len), Some(1));

        let found = service
            .landmarks
            .by_name("lastochkino_gnezdo")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.weather.map(|w| w.len()), Some(1));

        let bbox = Bbox {
            sw: Point { lng: 34.0, lat: 44.0 },
            ne: Point { lng: 35.0, lat: 45.0 },
        };
        let inside = service.landmarks.facilities(bbox).await.unwrap();
        assert!(inside[0].weather.is_some());

        let hits = service.landmarks.search("гнездо").await.unwrap();
        assert!(hits[0].weather.is_none());
    }

    #[tokio::test]
    async fn test_weather_failure_serves_landmark_without_weather() {
        let store = seeded().await;
        let weather = WeatherService::new(Arc::new(BrokenWeather));
        let landmarks = LandmarkService::new(store, weather);

        let found = landmarks.by_ids(&[1]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].weather.is_none());
    }
}
