//! Application configuration.
//!
//! Settings are read from a YAML file whose path comes from the command line.
//! Secrets never live in that file: they are taken from the process
//! environment (a `.env` file is loaded first when present).
//!
//! | Variable | Used by |
//! |----------|---------|
//! | `DB_HOST` | every command using the Postgres backend |
//! | `DB_PASSWORD` | every command using the Postgres backend |
//! | `WEATHER_API_KEY` | `weather` |

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Top-level configuration, one section per concern.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DatabaseConfig,
    pub storage: StorageConfig,
    pub parser: ParserConfig,
    pub weather: WeatherConfig,
    pub sitemap: SitemapConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub images_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cors_origins: vec!["http://localhost:5173".to_string()],
            images_dir: PathBuf::from("images"),
        }
    }
}

/// Postgres connection settings. `host` and `password` are filled from the
/// environment by [`Config::load`].
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    #[serde(skip)]
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip)]
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 5432,
            username: "postgres".to_string(),
            password: String::new(),
            dbname: "trailblazer".to_string(),
            sslmode: "disable".to_string(),
            max_connections: 5,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("dbname", &self.dbname)
            .field("sslmode", &self.sslmode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl DatabaseConfig {
    /// libpq-style connection URL.
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            self.dbname,
            self.sslmode
        )
    }
}

/// Which repository backend a command talks to.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// File used by the JSON backend.
    pub json_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Postgres,
            json_path: PathBuf::from("landmarks.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Listing page the crawl starts from; also the page cookies are taken from.
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_secs: 30,
            user_agent: concat!("trailblazer/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ParserConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Forecast endpoint, e.g. `https://api.openweathermap.org/data/2.5/forecast`.
    pub url: String,
    pub language: String,
    pub refresh_interval_hours: u64,
    pub request_timeout_secs: u64,
    #[serde(skip)]
    pub api_key: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            url: "https://api.openweathermap.org/data/2.5/forecast".to_string(),
            language: "ru".to_string(),
            refresh_interval_hours: 8,
            request_timeout_secs: 30,
            api_key: String::new(),
        }
    }
}

impl std::fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("url", &self.url)
            .field("language", &self.language)
            .field("refresh_interval_hours", &self.refresh_interval_hours)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl WeatherConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_hours.max(1) * 60 * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    /// Public origin, without a trailing slash.
    pub domain: String,
    pub output_dir: PathBuf,
    /// When set, `serve` also regenerates the sitemap on this period.
    pub regenerate_interval_hours: Option<u64>,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            domain: "https://putevod-crimea.ru".to_string(),
            output_dir: PathBuf::from("assets"),
            regenerate_interval_hours: None,
        }
    }
}

/// A secret a command cannot start without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secret {
    Database,
    WeatherApiKey,
}

impl Config {
    /// Parse a YAML document. Missing sections and keys take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).context("malformed YAML config")?;
        Ok(config)
    }

    /// Read the YAML file at `path`, then fill secrets from the environment.
    ///
    /// Only the secrets listed in `required` must be present; the others are
    /// filled when available.
    pub fn load(path: impl AsRef<Path>, required: &[Secret]) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::from_yaml(&yaml)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        config.apply_env(|key| std::env::var(key).ok(), required)?;
        info!(path = %path.display(), backend = ?config.storage.backend, "Loaded configuration");
        debug!(?config, "Effective configuration");
        Ok(config)
    }

    /// Fill secrets through `lookup`, failing on any missing `required` one.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
        required: &[Secret],
    ) -> Result<()> {
        let needs_db =
            required.contains(&Secret::Database) && self.storage.backend == StorageBackend::Postgres;

        match (lookup("DB_HOST"), needs_db) {
            (Some(host), _) => self.db.host = host,
            (None, true) => anyhow::bail!("DB_HOST must be set"),
            (None, false) => {}
        }
        match (lookup("DB_PASSWORD"), needs_db) {
            (Some(password), _) => self.db.password = password,
            (None, true) => anyhow::bail!("DB_PASSWORD must be set"),
            (None, false) => {}
        }
        match lookup("WEATHER_API_KEY") {
            Some(key) if !key.is_empty() => self.weather.api_key = key,
            _ if required.contains(&Secret::WeatherApiKey) => {
                anyhow::bail!("WEATHER_API_KEY must be set")
            }
            _ => {}
        }
        Ok(())
    }
}
