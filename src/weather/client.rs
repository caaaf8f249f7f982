//! Forecast API client.

use crate::config::WeatherConfig;
use crate::models::{Location, WeatherForecast};
use crate::utils::truncate_for_log;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum WeatherApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("forecast API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed forecast body: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Where forecasts come from.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn forecast(&self, location: Location) -> Result<WeatherForecast, WeatherApiError>;
}

/// OpenWeatherMap 5-day / 3-hour forecast.
pub struct OpenWeatherClient {
    client: Client,
    url: String,
    language: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(config: &WeatherConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: config.url.clone(),
            language: config.language.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ForecastSource for OpenWeatherClient {
    #[instrument(level = "debug", skip_all, fields(lat = location.lat, lng = location.lng))]
    async fn forecast(&self, location: Location) -> Result<WeatherForecast, WeatherApiError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("lat", location.lat.to_string()),
                ("lon", location.lng.to_string()),
                ("units", "metric".to_string()),
                ("lang", self.language.clone()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(WeatherApiError::Status {
                status,
                body: truncate_for_log(&body, 200),
            });
        }

        let forecast: WeatherForecast = serde_json::from_str(&body)?;
        debug!(intervals = forecast.list.len(), city = %forecast.city.name, "Fetched forecast");
        Ok(forecast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Query;
    use axum::http::StatusCode as AxumStatus;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    async fn forecast_endpoint(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
        if params.get("appid").map(String::as_str) != Some("secret") {
            return (AxumStatus::UNAUTHORIZED, r#"{"cod":401}"#.to_string());
        }
        if params.get("units").map(String::as_str) != Some("metric") {
            return (AxumStatus::BAD_REQUEST, "units".to_string());
        }
        match params.get("lat").map(String::as_str) {
            Some("44.5") => (
                AxumStatus::OK,
                r#"{"list":[{"dt":1760000000,"main":{"temp":21.0},"weather":[{"description":"ясно","icon":"01d"}],"wind":{"speed":3.0,"deg":180}}],"city":{"name":"Yalta"}}"#.to_string(),
            ),
            Some("1") => (AxumStatus::OK, "not json".to_string()),
            _ => (AxumStatus::INTERNAL_SERVER_ERROR, "boom".to_string()),
        }
    }

    async fn client() -> OpenWeatherClient {
        let app = Router::new().route("/forecast", get(forecast_endpoint));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = WeatherConfig {
            url: format!("http://{}/forecast", addr),
            api_key: "secret".to_string(),
            ..Default::default()
        };
        OpenWeatherClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_forecast_success() {
        let client = client().await;
        let forecast = client
            .forecast(Location { lat: 44.5, lng: 34.1 })
            .await
            .unwrap();

        assert_eq!(forecast.list.len(), 1);
        assert_eq!(forecast.city.name, "Yalta");
        assert_eq!(forecast.list[0].weather[0].description, "ясно");
    }

    #[tokio::test]
    async fn test_non_200_is_an_error() {
        let client = client().await;
        let result = client.forecast(Location { lat: 45.0, lng: 34.1 }).await;

        match result {
            Err(WeatherApiError::Status { status, body }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_an_error() {
        let client = client().await;
        let result = client.forecast(Location { lat: 1.0, lng: 1.0 }).await;

        assert!(matches!(result, Err(WeatherApiError::Malformed(_))));
    }
}
