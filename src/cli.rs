//! Command-line interface definitions for trailblazer.
//!
//! One binary, one subcommand per entry point. Every subcommand reads its own
//! YAML config file (`-c`); secrets come from the environment.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for trailblazer.
///
/// # Examples
///
/// ```sh
/// # Serve the API with the default config
/// trailblazer serve
///
/// # Crawl landmarks with a custom parser config
/// trailblazer crawl -c ./configs/parser.yml
///
/// # Refresh forecasts once and exit
/// trailblazer weather --once
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "TRAILBLAZER_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the landmark API
    Serve {
        /// Path to the configuration file
        #[arg(short, long, default_value = "configs/config.yml")]
        config: PathBuf,
    },

    /// Crawl the landmark site once and store what it lists
    Crawl {
        /// Path to the configuration file
        #[arg(short, long, default_value = "configs/parser.yml")]
        config: PathBuf,
    },

    /// Refresh weather forecasts on a fixed interval
    Weather {
        /// Path to the configuration file
        #[arg(short, long, default_value = "configs/weather.yml")]
        config: PathBuf,

        /// Run a single refresh cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Write sitemap.xml from the stored landmarks
    Sitemap {
        /// Path to the configuration file
        #[arg(short, long, default_value = "configs/config.yml")]
        config: PathBuf,
    },

    /// Rename landmark images to ASCII slugs and update their stored paths
    Images {
        /// Path to the configuration file
        #[arg(short, long, default_value = "configs/config.yml")]
        config: PathBuf,

        /// Images directory, overriding `server.images_dir`
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

impl Command {
    pub fn config_path(&self) -> &PathBuf {
        match self {
            Command::Serve { config }
            | Command::Crawl { config }
            | Command::Weather { config, .. }
            | Command::Sitemap { config }
            | Command::Images { config, .. } => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["trailblazer", "crawl"]);

        assert!(!cli.json_logs);
        assert!(matches!(cli.command, Command::Crawl { .. }));
        assert_eq!(cli.command.config_path(), &PathBuf::from("configs/parser.yml"));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "trailblazer",
            "weather",
            "-c",
            "/tmp/weather.yml",
            "--once",
            "--json-logs",
        ]);

        assert!(cli.json_logs);
        match cli.command {
            Command::Weather { config, once } => {
                assert_eq!(config, PathBuf::from("/tmp/weather.yml"));
                assert!(once);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_images_dir_override() {
        let cli = Cli::parse_from(["trailblazer", "images", "--dir", "./photos"]);
        match cli.command {
            Command::Images { config, dir } => {
                assert_eq!(config, PathBuf::from("configs/config.yml"));
                assert_eq!(dir, Some(PathBuf::from("./photos")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["trailblazer"]).is_err());
    }
}
