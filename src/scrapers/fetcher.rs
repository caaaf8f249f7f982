//! HTML fetcher with a session cookie jar.
//!
//! The scraped site hands out its session cookies on the landing page and
//! expects them back on every later request. [`HttpFetcher::establish_session`]
//! performs that first GET; the shared [`Jar`] replays the cookies on every
//! [`PageSource::fetch`] to the same site.

use crate::config::ParserConfig;
use crate::utils::truncate_for_log;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::Jar;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Where the crawler gets its pages from.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Obtain session cookies from `base_url`. Failure is fatal for a crawl.
    async fn establish_session(&self, base_url: &str) -> Result<()>;

    /// Fetch a page body. Failures are logged and come back as `None`.
    async fn fetch(&self, url: &str) -> Option<String>;
}

/// [`PageSource`] over HTTP.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar)
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(%base_url))]
    async fn establish_session(&self, base_url: &str) -> Result<()> {
        let response = self
            .client
            .get(base_url)
            .send()
            .await
            .context("failed to get cookies")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("failed to get cookies: {} returned {}", base_url, status);
        }

        let cookies = response.cookies().count();
        info!(cookies, "Session established");
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, error = %e, "Fetch failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                %url,
                %status,
                body_preview = %truncate_for_log(&body, 200),
                "Fetch failed with non-success status"
            );
            return None;
        }

        match response.text().await {
            Ok(body) => {
                debug!(bytes = body.len(), "Fetched page");
                Some(body)
            }
            Err(e) => {
                warn!(%url, error = %e, "Fetch failed while reading body");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use tokio::net::TcpListener;

    async fn landing() -> impl IntoResponse {
        (
            [(header::SET_COOKIE, "session=abc123; Path=/")],
            "<html>landing</html>",
        )
    }

    async fn echo_cookie(headers: HeaderMap) -> String {
        headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("no cookie")
            .to_string()
    }

    async fn missing() -> impl IntoResponse {
        (StatusCode::NOT_FOUND, "gone")
    }

    async fn spawn_site() -> String {
        let app = Router::new()
            .route("/", get(landing))
            .route("/detail", get(echo_cookie))
            .route("/missing", get(missing));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_session_cookies_are_replayed() {
        let base = spawn_site().await;
        let fetcher = HttpFetcher::new(&ParserConfig::default()).unwrap();

        fetcher.establish_session(&format!("{}/", base)).await.unwrap();
        let body = fetcher.fetch(&format!("{}/detail", base)).await;

        assert_eq!(body.as_deref(), Some("session=abc123"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_no_body() {
        let base = spawn_site().await;
        let fetcher = HttpFetcher::new(&ParserConfig::default()).unwrap();

        assert_eq!(fetcher.fetch(&format!("{}/missing", base)).await, None);
    }

    #[tokio::test]
    async fn test_session_failure_is_an_error() {
        let base = spawn_site().await;
        let fetcher = HttpFetcher::new(&ParserConfig::default()).unwrap();

        assert!(
            fetcher
                .establish_session(&format!("{}/missing", base))
                .await
                .is_err()
        );
    }
}
