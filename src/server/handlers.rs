//! Landmark API handlers.

use super::error::ApiError;
use crate::models::{Bbox, Landmark, WeatherResponse};
use crate::service::Service;
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::debug;

/// `page` defaults to 1; a value that is not a positive number counts as 1.
fn page_and_categories(params: &[(String, String)]) -> (u32, Vec<String>) {
    let page = params
        .iter()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.trim().parse::<u32>().ok())
        .filter(|page| *page > 0)
        .unwrap_or(1);

    let categories = params
        .iter()
        .filter(|(key, _)| key == "category")
        .map(|(_, value)| value.to_lowercase())
        .collect();

    (page, categories)
}

/// `GET /api/landmark?page=N&category=a&category=b`
pub async fn list_landmarks(
    State(service): State<Service>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Vec<Landmark>>, ApiError> {
    let Query(params) = query?;
    let (page, categories) = page_and_categories(&params);
    debug!(page, ?categories, "Listing landmarks");
    Ok(Json(service.landmarks.list(page, &categories).await?))
}

/// `GET /api/landmark/{name}`
pub async fn get_landmark(
    State(service): State<Service>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Landmark>, ApiError> {
    let Path(name) = path?;
    service
        .landmarks
        .by_name(&name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("landmark {:?}", name)))
}

/// `POST /api/getLandmarks` with a JSON array of ids.
pub async fn landmarks_by_ids(
    State(service): State<Service>,
    payload: Result<Json<Vec<i64>>, JsonRejection>,
) -> Result<Json<Vec<Landmark>>, ApiError> {
    let Json(ids) = payload?;
    Ok(Json(service.landmarks.by_ids(&ids).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
}

/// `GET /api/search?q=...`
pub async fn search(
    State(service): State<Service>,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<Landmark>>, ApiError> {
    let Query(params) = query?;
    let query = params.q.trim();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(service.landmarks.search(query).await?))
}

/// `POST /api/facilities` with `{ "sw": {..}, "ne": {..} }`.
pub async fn facilities(
    State(service): State<Service>,
    payload: Result<Json<Bbox>, JsonRejection>,
) -> Result<Json<Vec<Landmark>>, ApiError> {
    let Json(bbox) = payload?;
    Ok(Json(service.landmarks.facilities(bbox).await?))
}

/// `GET /api/weather/{landmark_id}`: upcoming forecasts, oldest first.
pub async fn landmark_weather(
    State(service): State<Service>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<WeatherResponse>>, ApiError> {
    let Path(landmark_id) = path?;
    Ok(Json(service.weather.get_by_landmark_id(landmark_id).await?))
}
