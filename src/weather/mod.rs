//! Forecast refresh.
//!
//! [`client`] talks to the forecast API; [`job`] polls it for every landmark
//! on a fixed interval and upserts the results.

pub mod client;
pub mod job;

pub use client::{ForecastSource, OpenWeatherClient, WeatherApiError};
pub use job::{RefreshReport, WeatherJob};
