//! Periodic forecast refresh for every landmark.

use super::client::ForecastSource;
use crate::repository::{LandmarkStore, StoreError, WeatherStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, instrument, warn};

/// Counts from one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub landmarks: usize,
    /// Landmarks whose forecast was fetched and stored.
    pub refreshed: usize,
    /// Landmarks skipped after a fetch or store failure.
    pub failed: usize,
    /// Landmarks without coordinates, never sent to the forecast API.
    pub skipped: usize,
    pub rows_written: usize,
}

pub struct WeatherJob {
    source: Arc<dyn ForecastSource>,
    landmarks: Arc<dyn LandmarkStore>,
    weather: Arc<dyn WeatherStore>,
    interval: Duration,
}

impl WeatherJob {
    pub fn new(
        source: Arc<dyn ForecastSource>,
        landmarks: Arc<dyn LandmarkStore>,
        weather: Arc<dyn WeatherStore>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            landmarks,
            weather,
            interval,
        }
    }

    /// Fetch and upsert the forecast of every landmark once.
    ///
    /// Only a failure to load the landmark list is returned; per-landmark
    /// failures are logged and counted.
    #[instrument(level = "info", skip_all)]
    pub async fn refresh_once(&self) -> Result<RefreshReport, StoreError> {
        let landmarks = self.landmarks.get_landmarks(None, &[]).await?;
        let mut report = RefreshReport {
            landmarks: landmarks.len(),
            ..Default::default()
        };

        for landmark in &landmarks {
            if landmark.location.is_unset() {
                warn!(id = landmark.id, name = %landmark.name, "No coordinates; skipping forecast");
                report.skipped += 1;
                continue;
            }
            info!(id = landmark.id, name = %landmark.name, "Refreshing forecast");

            let forecast = match self.source.forecast(landmark.location).await {
                Ok(forecast) => forecast,
                Err(e) => {
                    warn!(id = landmark.id, error = %e, "Failed to get weather");
                    report.failed += 1;
                    continue;
                }
            };

            match self.weather.set_weather(landmark.id, &forecast).await {
                Ok(rows) => {
                    report.refreshed += 1;
                    report.rows_written += rows;
                }
                Err(e) => {
                    error!(id = landmark.id, error = %e, "Failed to save weather");
                    report.failed += 1;
                }
            }
        }

        info!(
            landmarks = report.landmarks,
            refreshed = report.refreshed,
            failed = report.failed,
            skipped = report.skipped,
            rows_written = report.rows_written,
            "Refresh cycle finished"
        );
        Ok(report)
    }

    /// Refresh immediately, then every interval, forever.
    ///
    /// Returns only when the landmark list cannot be loaded on the first
    /// cycle; later load failures skip that cycle.
    pub async fn run(&self) -> Result<(), StoreError> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "Weather job started");

        ticker.tick().await;
        self.refresh_once().await?;

        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh_once().await {
                error!(error = %e, "Failed to load landmarks; skipping cycle");
            }
        }
    }
}
