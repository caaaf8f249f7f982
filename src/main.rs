//! # trailblazer
//!
//! Backend for a tourism guide: landmark records with schedules, prices,
//! locations and upcoming weather, plus the batch jobs that keep them filled.
//!
//! ## Commands
//!
//! - `serve`: read-only landmark API with static images
//! - `crawl`: scrape the landmark site once and store every detail page
//! - `weather`: refresh forecasts for every landmark on a fixed interval
//! - `sitemap`: write `sitemap.xml` for the public landmark pages
//! - `images`: rename landmark photos to ASCII slugs
//!
//! ## Usage
//!
//! ```sh
//! DB_HOST=localhost DB_PASSWORD=secret trailblazer serve -c configs/config.yml
//! WEATHER_API_KEY=... trailblazer weather --once
//! ```
//!
//! ## Architecture
//!
//! The crawl follows a pipeline:
//! 1. **Session**: pick up the site's cookies from the base URL
//! 2. **Indexing**: collect detail page URLs from the listing page
//! 3. **Fetching**: download and parse each detail page in turn
//! 4. **Output**: save every parsed landmark in one batch
//!
//! Everything reads and writes through the [`repository`] traits, backed by
//! PostgreSQL/PostGIS or a JSON file.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod images;
mod models;
mod outputs;
mod repository;
mod scrapers;
mod server;
mod service;
mod utils;
mod weather;

use cli::{Cli, Command};
use config::{Config, Secret};
use repository::Repository;
use scrapers::{Crawler, HttpFetcher};
use weather::{OpenWeatherClient, WeatherJob};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339());

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn required_secrets(command: &Command) -> &'static [Secret] {
    match command {
        Command::Weather { .. } => &[Secret::Database, Secret::WeatherApiKey],
        _ => &[Secret::Database],
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let args = Cli::parse();
    init_tracing(args.json_logs);

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to read .env; continuing with process environment"),
    }

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), command = ?args.command, "trailblazer starting up");

    match run(args.command).await {
        Ok(()) => {
            let elapsed = start_time.elapsed();
            info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    let config = Config::load(command.config_path(), required_secrets(&command))?;

    match command {
        Command::Serve { .. } => {
            let repo = Repository::open(&config).await?;
            server::serve(&config, repo).await
        }

        Command::Crawl { .. } => {
            if config.parser.base_url.trim().is_empty() {
                anyhow::bail!("parser.base_url must be set to crawl");
            }
            let repo = Repository::open(&config).await?;
            let fetcher = HttpFetcher::new(&config.parser)?;
            let crawler = Crawler::new(
                Arc::new(fetcher),
                repo.landmarks.clone(),
                config.parser.base_url.clone(),
            );
            let report = crawler.run().await.context("crawl failed")?;
            info!(
                discovered = report.discovered,
                saved = report.saved,
                fetch_failures = report.fetch_failures,
                "Crawl complete"
            );
            Ok(())
        }

        Command::Weather { once, .. } => {
            let repo = Repository::open(&config).await?;
            let client = OpenWeatherClient::new(&config.weather)?;
            let job = WeatherJob::new(
                Arc::new(client),
                repo.landmarks.clone(),
                repo.weather.clone(),
                config.weather.refresh_interval(),
            );

            if once {
                job.refresh_once().await.context("weather refresh failed")?;
                return Ok(());
            }
            tokio::select! {
                result = job.run() => result.context("weather job failed"),
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, stopping weather job");
                    Ok(())
                }
            }
        }

        Command::Sitemap { .. } => {
            let repo = Repository::open(&config).await?;
            outputs::generate_sitemap(repo.landmarks.as_ref(), &config.sitemap).await?;
            Ok(())
        }

        Command::Images { dir, .. } => {
            let repo = Repository::open(&config).await?;
            let dir = dir.unwrap_or_else(|| config.server.images_dir.clone());
            let report = images::normalize_images(&dir, repo.landmarks.as_ref()).await?;
            if report.failed > 0 {
                warn!(failed = report.failed, "Some images could not be normalized");
            }
            Ok(())
        }
    }
}
