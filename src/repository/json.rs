//! Single-file JSON storage.
//!
//! The whole store is one document:
//!
//! ```json
//! { "landmarks": [ ... ], "weather": [ ... ] }
//! ```
//!
//! A file holding a bare landmark array is accepted on open and rewritten in
//! the full shape on the next write. Every write replaces the file through a
//! temporary sibling and a rename, so a crash never leaves half a document.

use super::{LandmarkStore, PAGE_SIZE, StoreError, WeatherStore, page_offset};
use crate::models::{Bbox, Landmark, WeatherForecast, WeatherResponse, translated_name_from_image};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

#[derive(Debug, Default, Serialize, Deserialize)]
struct JsonState {
    #[serde(default)]
    landmarks: Vec<Landmark>,
    #[serde(default)]
    weather: Vec<WeatherResponse>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDocument {
    Full(JsonState),
    Landmarks(Vec<Landmark>),
}

pub struct JsonStore {
    path: Option<PathBuf>,
    state: Mutex<JsonState>,
}

impl JsonStore {
    /// Open the store at `path`, creating an empty one if the file is missing.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let state = match fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => JsonState::default(),
            Ok(text) => match serde_json::from_str::<StoredDocument>(&text)? {
                StoredDocument::Full(state) => state,
                StoredDocument::Landmarks(landmarks) => JsonState {
                    landmarks,
                    weather: Vec::new(),
                },
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let state = JsonState::default();
                write_atomically(&path, &state).await?;
                info!("Created empty store file");
                state
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        info!(
            landmarks = state.landmarks.len(),
            weather_rows = state.weather.len(),
            "Opened JSON store"
        );
        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// A store that never touches the file system.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(JsonState::default()),
        }
    }

    async fn persist(&self, state: &JsonState) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => write_atomically(path, state).await,
            None => Ok(()),
        }
    }
}

async fn write_atomically(path: &Path, state: &JsonState) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let json = serde_json::to_vec_pretty(state)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json).await.map_err(io_err)?;
    fs::rename(&tmp, path).await.map_err(io_err)?;
    debug!(path = %path.display(), "Wrote store file");
    Ok(())
}

fn matches_query(field: &str, needle: &str) -> bool {
    !needle.is_empty() && field.to_lowercase().contains(needle)
}

#[async_trait]
impl LandmarkStore for JsonStore {
    async fn save_landmarks(&self, landmarks: &[Landmark]) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let mut next_id = state.landmarks.iter().map(|l| l.id).max().unwrap_or(0);

        let mut staged = Vec::with_capacity(landmarks.len());
        for landmark in landmarks {
            next_id += 1;
            let mut stored = landmark.clone();
            stored.id = next_id;
            stored.weather = None;
            stored.translated_name = translated_name_from_image(&stored.image_path);
            staged.push(stored);
        }

        let previous = state.landmarks.len();
        state.landmarks.extend(staged);
        if let Err(e) = self.persist(&state).await {
            state.landmarks.truncate(previous);
            return Err(e);
        }
        Ok(landmarks.len())
    }

    async fn get_landmarks(
        &self,
        page: Option<u32>,
        categories: &[String],
    ) -> Result<Vec<Landmark>, StoreError> {
        let state = self.state.lock().await;
        let wanted: Vec<String> = categories.iter().map(|c| c.to_lowercase()).collect();

        let mut landmarks: Vec<&Landmark> = state
            .landmarks
            .iter()
            .filter(|l| wanted.is_empty() || wanted.contains(&l.category.to_lowercase()))
            .collect();
        landmarks.sort_by_key(|l| l.id);

        let selected = match page {
            None => landmarks,
            Some(page) => landmarks
                .into_iter()
                .skip(page_offset(page) as usize)
                .take(PAGE_SIZE as usize)
                .collect(),
        };
        Ok(selected.into_iter().cloned().collect())
    }

    async fn get_landmarks_by_ids(&self, ids: &[i64]) -> Result<Vec<Landmark>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .landmarks
            .iter()
            .filter(|l| ids.contains(&l.id))
            .cloned()
            .collect())
    }

    async fn get_landmark_by_name(&self, name: &str) -> Result<Option<Landmark>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .landmarks
            .iter()
            .find(|l| !name.is_empty() && l.translated_name == name)
            .cloned())
    }

    async fn search(&self, query: &str) -> Result<Vec<Landmark>, StoreError> {
        let state = self.state.lock().await;
        let needle = query.trim().to_lowercase();

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let by_name = state.landmarks.iter().filter(|l| matches_query(&l.name, &needle));
        let by_address = state
            .landmarks
            .iter()
            .filter(|l| matches_query(&l.address, &needle));
        for landmark in by_name.chain(by_address) {
            if seen.insert(landmark.id) {
                found.push(landmark.clone());
            }
        }
        Ok(found)
    }

    async fn get_facilities(&self, bbox: Bbox) -> Result<Vec<Landmark>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .landmarks
            .iter()
            .filter(|l| l.location.within(&bbox))
            .cloned()
            .collect())
    }

    async fn update_image_path(&self, place: &str, image_path: &str) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let previous = state.landmarks.clone();
        let mut updated = 0u64;
        for landmark in state.landmarks.iter_mut() {
            if landmark.name == place || landmark.image_path.to_lowercase() == image_path {
                landmark.set_image_path(image_path);
                updated += 1;
            }
        }
        if updated > 0 {
            if let Err(e) = self.persist(&state).await {
                state.landmarks = previous;
                return Err(e);
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl WeatherStore for JsonStore {
    async fn set_weather(
        &self,
        landmark_id: i64,
        forecast: &WeatherForecast,
    ) -> Result<usize, StoreError> {
        let rows = forecast.to_responses(landmark_id);
        let mut state = self.state.lock().await;
        let previous = state.weather.clone();

        for row in &rows {
            match state
                .weather
                .iter()
                .position(|w| w.landmark_id == row.landmark_id && w.date == row.date)
            {
                Some(index) => state.weather[index] = row.clone(),
                None => state.weather.push(row.clone()),
            }
        }
        if let Err(e) = self.persist(&state).await {
            state.weather = previous;
            return Err(e);
        }
        Ok(rows.len())
    }

    async fn get_weather_by_landmark_id(
        &self,
        landmark_id: i64,
    ) -> Result<Vec<WeatherResponse>, StoreError> {
        let now = Utc::now();
        let state = self.state.lock().await;
        let mut rows: Vec<WeatherResponse> = state
            .weather
            .iter()
            .filter(|w| w.landmark_id == landmark_id && w.date > now)
            .cloned()
            .collect();
        rows.sort_by_key(|w| w.date);
        Ok(rows)
    }
}
