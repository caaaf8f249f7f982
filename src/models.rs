//! Data models for landmarks and their weather forecasts.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Landmark`]: a point of interest with schedules, prices and a [`Location`]
//! - [`WeatherResponse`]: one stored forecast row for a landmark
//! - [`WeatherForecast`]: the wire shape returned by the forecast API
//! - [`Bbox`]: a map viewport used by the facilities query
//!
//! Field names follow the JSON served to the frontend (`snake_case`, with
//! `lat`/`lng` for coordinates).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point of interest as stored and served.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Storage identity. Zero until the landmark has been persisted.
    #[serde(default)]
    pub id: i64,
    /// Display name, usually in Russian.
    #[serde(default)]
    pub name: String,
    /// URL slug derived from the image file name, see [`translated_name_from_image`].
    #[serde(default)]
    pub translated_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub prices: Vec<Price>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub history: String,
    #[serde(default)]
    pub location: Location,
    /// File name of the landmark image inside the images directory.
    #[serde(default)]
    pub image_path: String,
    /// Upcoming forecasts, attached when the landmark is served.
    #[serde(default, rename = "weathers", skip_serializing_if = "Option::is_none")]
    pub weather: Option<Vec<WeatherResponse>>,
}

impl Landmark {
    /// Set the image path and re-derive the translated name from it.
    pub fn set_image_path(&mut self, image_path: impl Into<String>) {
        self.image_path = image_path.into();
        self.translated_name = translated_name_from_image(&self.image_path);
    }
}

/// An opening-hours entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

/// A ticket price entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub value: f64,
    pub currency: String,
    #[serde(default)]
    pub description: String,
}

/// Geographic coordinates in degrees (WGS 84).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Failure to read a [`Location`] out of well-known text.
#[derive(Debug, Error, PartialEq)]
pub enum LocationError {
    #[error("not a WKT point: {0:?}")]
    NotAPoint(String),
    #[error("expected two coordinates in {0:?}")]
    WrongArity(String),
    #[error("invalid coordinate {value:?}: {reason}")]
    InvalidNumber { value: String, reason: String },
}

impl Location {
    /// Parse PostGIS well-known text of the form `POINT(lon lat)`.
    ///
    /// The first token is the longitude and the second the latitude, which is
    /// the axis order PostGIS emits from `ST_AsText`.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let loc = Location::from_point("POINT(34.1 44.5)")?;
    /// assert_eq!(loc.lng, 34.1);
    /// assert_eq!(loc.lat, 44.5);
    /// ```
    pub fn from_point(wkt: &str) -> Result<Self, LocationError> {
        let inner = wkt
            .trim()
            .strip_prefix("POINT(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| LocationError::NotAPoint(wkt.to_string()))?;

        let tokens: Vec<&str> = inner.split_whitespace().collect();
        let [lng, lat] = tokens.as_slice() else {
            return Err(LocationError::WrongArity(wkt.to_string()));
        };

        Ok(Self {
            lng: parse_coordinate(lng)?,
            lat: parse_coordinate(lat)?,
        })
    }

    /// No coordinates were ever recorded; a NULL column reads back this way.
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the point lies inside `bbox`, edges included.
    pub fn within(&self, bbox: &Bbox) -> bool {
        self.lng >= bbox.sw.lng
            && self.lng <= bbox.ne.lng
            && self.lat >= bbox.sw.lat
            && self.lat <= bbox.ne.lat
    }
}

fn parse_coordinate(value: &str) -> Result<f64, LocationError> {
    value
        .parse::<f64>()
        .map_err(|e| LocationError::InvalidNumber {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Derive the URL slug of a landmark from its image file name.
///
/// Everything before the first `'.'` is kept, so `"lastochkino_gnezdo.jpg"`
/// becomes `"lastochkino_gnezdo"`. A name without a dot is returned whole.
pub fn translated_name_from_image(image_path: &str) -> String {
    image_path.split('.').next().unwrap_or_default().to_string()
}

/// A map viewport, south-west and north-east corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub sw: Point,
    pub ne: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lng: f64,
    pub lat: f64,
}

/// One stored forecast interval for a landmark.
///
/// Unique per `(landmark_id, date)`; writing the same pair again overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeatherResponse {
    pub landmark_id: i64,
    pub date: DateTime<Utc>,
    pub temperature: f64,
    pub description: String,
    pub icon: String,
    /// Precipitation over the interval, millimetres.
    pub rain: f64,
    pub wind_speed: f64,
    pub wind_degree: f64,
}

/// Response body of the forecast endpoint (3-hour steps over several days).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WeatherForecast {
    #[serde(default)]
    pub list: Vec<Forecast>,
    #[serde(default)]
    pub city: City,
}

impl WeatherForecast {
    /// Translate every interval into a storable row for `landmark_id`.
    ///
    /// Intervals whose timestamp is out of range are dropped.
    pub fn to_responses(&self, landmark_id: i64) -> Vec<WeatherResponse> {
        self.list
            .iter()
            .filter_map(|interval| interval.to_response(landmark_id))
            .collect()
    }
}

/// One forecast interval.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Forecast {
    /// Unix timestamp of the interval start.
    pub dt: i64,
    #[serde(default)]
    pub main: Main,
    #[serde(default)]
    pub weather: Vec<Conditions>,
    #[serde(default)]
    pub wind: Wind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain: Option<Rain>,
    #[serde(default)]
    pub dt_txt: String,
}

impl Forecast {
    pub fn to_response(&self, landmark_id: i64) -> Option<WeatherResponse> {
        let date = DateTime::from_timestamp(self.dt, 0)?;
        let (description, icon) = self
            .weather
            .first()
            .map(|c| (c.description.clone(), c.icon.clone()))
            .unwrap_or_default();

        Some(WeatherResponse {
            landmark_id,
            date,
            temperature: self.main.temp,
            description,
            icon,
            rain: self.rain.as_ref().map(|r| r.three_hour).unwrap_or(0.0),
            wind_speed: self.wind.speed,
            wind_degree: self.wind.deg,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Main {
    #[serde(default)]
    pub temp: f64,
    #[serde(default)]
    pub feels_like: f64,
    #[serde(default)]
    pub humidity: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Conditions {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Wind {
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub deg: f64,
    #[serde(default)]
    pub gust: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Rain {
    #[serde(rename = "3h", default)]
    pub three_hour: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct City {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub timezone: i64,
}
