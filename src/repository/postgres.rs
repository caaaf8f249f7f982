//! PostgreSQL/PostGIS storage.
//!
//! Locations live in a `geography(Point, 4326)` column and come back through
//! `ST_AsText`, so every read goes through [`Location::from_point`]. The schema
//! is embedded from `migrations/` and applied on connect.

use super::{LandmarkStore, PAGE_SIZE, StoreError, WeatherStore, page_offset};
use crate::config::DatabaseConfig;
use crate::models::{
    Bbox, Landmark, Location, Price, Schedule, WeatherForecast, WeatherResponse,
    translated_name_from_image,
};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashSet;
use tracing::{error, info, instrument};

const LANDMARK_COLUMNS: &str = "id, name, address, category, description, history, \
     ST_AsText(location) AS loc, images_name, schedules, prices";

#[derive(Debug, FromRow)]
struct LandmarkRow {
    id: i64,
    name: String,
    address: String,
    category: String,
    description: String,
    history: String,
    loc: Option<String>,
    images_name: String,
    schedules: Json<Vec<Schedule>>,
    prices: Json<Vec<Price>>,
}

impl TryFrom<LandmarkRow> for Landmark {
    type Error = StoreError;

    fn try_from(row: LandmarkRow) -> Result<Self, Self::Error> {
        let location = match row.loc.as_deref() {
            Some(wkt) => Location::from_point(wkt)?,
            None => Location::default(),
        };

        Ok(Landmark {
            id: row.id,
            name: row.name,
            translated_name: translated_name_from_image(&row.images_name),
            address: row.address,
            category: row.category,
            schedules: row.schedules.0,
            prices: row.prices.0,
            description: row.description,
            history: row.history,
            location,
            image_path: row.images_name,
            weather: None,
        })
    }
}

fn into_landmarks(rows: Vec<LandmarkRow>) -> Result<Vec<Landmark>, StoreError> {
    rows.into_iter().map(Landmark::try_from).collect()
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[instrument(level = "info", skip_all, fields(host = %config.host, dbname = %config.dbname))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url())
            .await?;

        sqlx::migrate!().run(&pool).await?;
        info!("Connected to PostgreSQL and applied migrations");

        Ok(Self { pool })
    }

    async fn insert_landmark(
        tx: &mut Transaction<'_, Postgres>,
        landmark: &Landmark,
    ) -> Result<(), StoreError> {
        // Unparsed coordinates stay NULL rather than landing at (0, 0).
        let (lng, lat) = if landmark.location == Location::default() {
            (None, None)
        } else {
            (Some(landmark.location.lng), Some(landmark.location.lat))
        };

        sqlx::query(
            r#"
            INSERT INTO landmark (
                name, address, category, description, history,
                location, images_name, schedules, prices
            )
            VALUES (
                $1, $2, $3, $4, $5,
                ST_SetSRID(ST_MakePoint($6, $7), 4326)::geography,
                $8, $9, $10
            )
            "#,
        )
        .bind(&landmark.name)
        .bind(&landmark.address)
        .bind(&landmark.category)
        .bind(&landmark.description)
        .bind(&landmark.history)
        .bind(lng)
        .bind(lat)
        .bind(&landmark.image_path)
        .bind(Json(&landmark.schedules))
        .bind(Json(&landmark.prices))
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn search_column(&self, column: &str, query: &str) -> Result<Vec<Landmark>, StoreError> {
        let sql = format!(
            "SELECT {LANDMARK_COLUMNS} FROM landmark \
             WHERE to_tsvector('russian', {column}) @@ plainto_tsquery('russian', $1) \
             ORDER BY id"
        );
        let rows = sqlx::query_as::<_, LandmarkRow>(&sql)
            .bind(query)
            .fetch_all(&self.pool)
            .await?;
        into_landmarks(rows)
    }
}

#[async_trait]
impl LandmarkStore for PgStore {
    #[instrument(level = "info", skip_all, fields(count = landmarks.len()))]
    async fn save_landmarks(&self, landmarks: &[Landmark]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        for landmark in landmarks {
            Self::insert_landmark(&mut tx, landmark).await?;
        }
        tx.commit().await?;

        info!("Saved landmarks");
        Ok(landmarks.len())
    }

    async fn get_landmarks(
        &self,
        page: Option<u32>,
        categories: &[String],
    ) -> Result<Vec<Landmark>, StoreError> {
        let categories: Vec<String> = categories.iter().map(|c| c.to_lowercase()).collect();
        let (limit, offset) = match page {
            Some(page) => (Some(i64::from(PAGE_SIZE)), i64::from(page_offset(page))),
            None => (None, 0),
        };

        let sql = format!(
            "SELECT {LANDMARK_COLUMNS} FROM landmark \
             WHERE cardinality($1::text[]) = 0 OR lower(category) = ANY($1) \
             ORDER BY id LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, LandmarkRow>(&sql)
            .bind(&categories)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        into_landmarks(rows)
    }

    async fn get_landmarks_by_ids(&self, ids: &[i64]) -> Result<Vec<Landmark>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {LANDMARK_COLUMNS} FROM landmark WHERE id = ANY($1) ORDER BY id");
        let rows = sqlx::query_as::<_, LandmarkRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        into_landmarks(rows)
    }

    async fn get_landmark_by_name(&self, name: &str) -> Result<Option<Landmark>, StoreError> {
        let sql = format!(
            "SELECT {LANDMARK_COLUMNS} FROM landmark \
             WHERE images_name <> '' AND split_part(images_name, '.', 1) = $1 \
             ORDER BY id LIMIT 1"
        );
        let row = sqlx::query_as::<_, LandmarkRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Landmark::try_from).transpose()
    }

    async fn search(&self, query: &str) -> Result<Vec<Landmark>, StoreError> {
        let by_name = self.search_column("name", query).await?;
        let by_address = self.search_column("address", query).await?;

        let mut seen = HashSet::new();
        Ok(by_name
            .into_iter()
            .chain(by_address)
            .filter(|l| seen.insert(l.id))
            .collect())
    }

    async fn get_facilities(&self, bbox: Bbox) -> Result<Vec<Landmark>, StoreError> {
        let sql = format!(
            "SELECT {LANDMARK_COLUMNS} FROM landmark \
             WHERE location IS NOT NULL \
               AND ST_Intersects(ST_MakeEnvelope($1, $2, $3, $4, 4326), location::geometry) \
             ORDER BY id"
        );
        let rows = sqlx::query_as::<_, LandmarkRow>(&sql)
            .bind(bbox.sw.lng)
            .bind(bbox.sw.lat)
            .bind(bbox.ne.lng)
            .bind(bbox.ne.lat)
            .fetch_all(&self.pool)
            .await?;
        into_landmarks(rows)
    }

    async fn update_image_path(&self, place: &str, image_path: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE landmark SET images_name = $1 WHERE name = $2 OR lower(images_name) = $1",
        )
        .bind(image_path)
        .bind(place)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl WeatherStore for PgStore {
    #[instrument(level = "debug", skip_all, fields(landmark_id = landmark_id))]
    async fn set_weather(
        &self,
        landmark_id: i64,
        forecast: &WeatherForecast,
    ) -> Result<usize, StoreError> {
        let mut written = 0usize;
        for row in forecast.to_responses(landmark_id) {
            let result = sqlx::query(
                r#"
                INSERT INTO weather (
                    landmark_id, date, temperature, description,
                    icon, rain, wind_speed, wind_degree
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (landmark_id, date) DO UPDATE SET
                    temperature = EXCLUDED.temperature,
                    description = EXCLUDED.description,
                    icon = EXCLUDED.icon,
                    rain = EXCLUDED.rain,
                    wind_speed = EXCLUDED.wind_speed,
                    wind_degree = EXCLUDED.wind_degree
                "#,
            )
            .bind(row.landmark_id)
            .bind(row.date)
            .bind(row.temperature)
            .bind(&row.description)
            .bind(&row.icon)
            .bind(row.rain)
            .bind(row.wind_speed)
            .bind(row.wind_degree)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => written += 1,
                Err(e) => error!(landmark_id, date = %row.date, error = %e, "Failed to save weather row"),
            }
        }
        Ok(written)
    }

    async fn get_weather_by_landmark_id(
        &self,
        landmark_id: i64,
    ) -> Result<Vec<WeatherResponse>, StoreError> {
        let rows = sqlx::query_as::<_, WeatherResponse>(
            r#"
            SELECT landmark_id, date, temperature, description, icon, rain, wind_speed, wind_degree
            FROM weather
            WHERE landmark_id = $1 AND date > now()
            ORDER BY date
            "#,
        )
        .bind(landmark_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
