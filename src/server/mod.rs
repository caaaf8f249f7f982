//! Read-only landmark API.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /api/landmark` | [`handlers::list_landmarks`] |
//! | `GET /api/landmark/{name}` | [`handlers::get_landmark`] |
//! | `POST /api/getLandmarks` | [`handlers::landmarks_by_ids`] |
//! | `GET /api/search` | [`handlers::search`] |
//! | `POST /api/facilities` | [`handlers::facilities`] |
//! | `GET /api/weather/{landmark_id}` | [`handlers::landmark_weather`] |
//! | `GET /images/*` | static files from `server.images_dir` |
//!
//! Errors are returned as `{"error": "..."}` with a 400, 404 or 500 status.

pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::config::{Config, ServerConfig, SitemapConfig};
use crate::outputs::generate_sitemap;
use crate::repository::{LandmarkStore, Repository};
use crate::service::Service;
use anyhow::{Context, Result};
use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

pub fn router(service: Service, config: &ServerConfig) -> Router {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/landmark", get(handlers::list_landmarks))
        .route("/api/landmark/{name}", get(handlers::get_landmark))
        .route("/api/getLandmarks", post(handlers::landmarks_by_ids))
        .route("/api/search", get(handlers::search))
        .route("/api/facilities", post(handlers::facilities))
        .route("/api/weather/{landmark_id}", get(handlers::landmark_weather))
        .nest_service("/images", ServeDir::new(&config.images_dir))
        .layer(cors)
        .with_state(service)
}

/// Serve the API until Ctrl+C or SIGTERM.
pub async fn serve(config: &Config, repo: Repository) -> Result<()> {
    let app = router(Service::new(&repo), &config.server);

    let sitemap_task = config
        .sitemap
        .regenerate_interval_hours
        .filter(|hours| *hours > 0)
        .map(|hours| spawn_sitemap_task(repo.landmarks.clone(), config.sitemap.clone(), hours));

    let address = format!("0.0.0.0:{}", config.server.port);
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Server running on {address}");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    if let Some(task) = sitemap_task {
        task.abort();
    }
    info!("Server shut down");
    served
}

fn spawn_sitemap_task(
    store: Arc<dyn LandmarkStore>,
    config: SitemapConfig,
    hours: u64,
) -> JoinHandle<()> {
    info!(hours, "Scheduling sitemap regeneration");
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(hours * 3600));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = generate_sitemap(store.as_ref(), &config).await {
                error!(error = %format!("{e:#}"), "Sitemap regeneration failed");
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Forecast, Landmark, Location, WeatherForecast};
    use crate::repository::{JsonStore, WeatherStore};
    use chrono::Utc;
    use reqwest::StatusCode;
    use serde_json::Value;
    use std::path::PathBuf;

    struct TestServer {
        base: String,
        client: reqwest::Client,
        images_dir: PathBuf,
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.images_dir);
        }
    }

    async fn spawn(name: &str) -> TestServer {
        let store = Arc::new(JsonStore::in_memory());

        let mut nest = Landmark {
            name: "Ласточкино гнездо".to_string(),
            category: "Замок".to_string(),
            address: "Гаспра".to_string(),
            location: Location { lat: 44.43, lng: 34.13 },
            ..Default::default()
        };
        nest.set_image_path("lastochkino_gnezdo.jpg");
        let mut park = Landmark {
            name: "Никитский сад".to_string(),
            category: "Парк".to_string(),
            location: Location { lat: 44.51, lng: 34.23 },
            ..Default::default()
        };
        park.set_image_path("nikitskiy_sad.jpg");
        store.save_landmarks(&[nest, park]).await.unwrap();
        store
            .set_weather(
                1,
                &WeatherForecast {
                    list: vec![Forecast {
                        dt: Utc::now().timestamp() + 3600,
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let images_dir = std::env::temp_dir()
            .join(format!("trailblazer-server-{}-{}", std::process::id(), name));
        std::fs::create_dir_all(&images_dir).unwrap();
        std::fs::write(images_dir.join("lastochkino_gnezdo.jpg"), b"jpeg bytes").unwrap();

        let config = ServerConfig {
            cors_origins: vec!["http://localhost:5173".to_string()],
            images_dir: images_dir.clone(),
            ..Default::default()
        };
        let app = router(Service::new(&Repository::from_store(store)), &config);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
            images_dir,
        }
    }

    #[tokio::test]
    async fn test_list_with_category_and_bad_page() {
        let server = spawn("list").await;
        let response = server
            .client
            .get(format!("{}/api/landmark", server.base))
            .query(&[("page", "abc"), ("category", "замок")])
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["translated_name"], "lastochkino_gnezdo");
        assert_eq!(items[0]["weathers"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_landmark_by_name_and_not_found() {
        let server = spawn("name").await;

        let found: Value = server
            .client
            .get(format!("{}/api/landmark/nikitskiy_sad", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(found["name"], "Никитский сад");
        assert_eq!(found["weathers"], serde_json::json!([]));

        let missing = server
            .client
            .get(format!("{}/api/landmark/nowhere", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let body: Value = missing.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("nowhere"));
    }

    #[tokio::test]
    async fn test_by_ids_and_malformed_payload() {
        let server = spawn("ids").await;

        let found: Value = server
            .client
            .post(format!("{}/api/getLandmarks", server.base))
            .json(&[2, 99])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(found.as_array().unwrap().len(), 1);
        assert_eq!(found[0]["id"], 2);

        let bad = server
            .client
            .post(format!("{}/api/getLandmarks", server.base))
            .header("content-type", "application/json")
            .body(r#"{"ids": "nope"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        let body: Value = bad.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_facilities_and_search() {
        let server = spawn("facilities").await;

        let inside: Value = server
            .client
            .post(format!("{}/api/facilities", server.base))
            .json(&serde_json::json!({
                "sw": { "lng": 34.0, "lat": 44.0 },
                "ne": { "lng": 34.2, "lat": 45.0 }
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(inside.as_array().unwrap().len(), 1);
        assert_eq!(inside[0]["name"], "Ласточкино гнездо");

        let hits: Value = server
            .client
            .get(format!("{}/api/search", server.base))
            .query(&[("q", "сад")])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert!(hits[0].get("weathers").is_none());
    }

    #[tokio::test]
    async fn test_landmark_weather() {
        let server = spawn("weather").await;

        let rows: Value = server
            .client
            .get(format!("{}/api/weather/1", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 1);
        assert_eq!(rows[0]["landmark_id"], 1);

        let none: Value = server
            .client
            .get(format!("{}/api/weather/2", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(none, serde_json::json!([]));

        let bad = server
            .client
            .get(format!("{}/api/weather/abc", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            bad.headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
        let body: Value = bad.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("abc"));
    }

    #[tokio::test]
    async fn test_images_and_cors() {
        let server = spawn("images").await;

        let image = server
            .client
            .get(format!("{}/images/lastochkino_gnezdo.jpg", server.base))
            .header("origin", "http://localhost:5173")
            .send()
            .await
            .unwrap();
        assert_eq!(image.status(), StatusCode::OK);
        assert_eq!(
            image
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:5173")
        );
        assert_eq!(image.bytes().await.unwrap().as_ref(), b"jpeg bytes");

        let missing = server
            .client
            .get(format!("{}/images/nope.jpg", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
