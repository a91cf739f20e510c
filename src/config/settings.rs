//! Application settings loaded from `config.toml`.
//!
//! Every section is optional; missing values fall back to the defaults below.
//! The database URL can additionally be overridden through `DATABASE_URL`
//! (see [`super::database::get_database_url`]).

use crate::core::bulk::BatchOptions;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database connection settings
    pub database: DatabaseSettings,
    /// Batch I/O tuning
    pub batch: BatchSettings,
    /// Overdue task sweep
    pub sweep: SweepSettings,
}

/// `[database]` section
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL, e.g. `sqlite://data/roof_offer.sqlite?mode=rwc`
    pub url: Option<String>,
}

/// `[batch]` section
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Rows per multi-row statement
    pub chunk_size: usize,
    /// Row count above which multi-row statements are used
    pub threshold: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        let defaults = BatchOptions::default();
        Self {
            chunk_size: defaults.chunk_size,
            threshold: defaults.threshold,
        }
    }
}

/// `[sweep]` section
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Seconds between two overdue-task sweeps
    pub interval_secs: u64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
        }
    }
}

impl AppConfig {
    /// Batch options validated for use by the bulk layer.
    ///
    /// # Errors
    /// Returns `Error::Config` when the chunk size is zero.
    pub fn batch_options(&self) -> Result<BatchOptions> {
        if self.batch.chunk_size == 0 {
            return Err(Error::Config {
                message: "batch.chunk_size must be greater than zero".to_string(),
            });
        }
        Ok(BatchOptions {
            chunk_size: self.batch.chunk_size,
            threshold: self.batch.threshold,
        })
    }
}

/// Loads the application configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Parses configuration from TOML text
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads `./config.toml`, or the defaults when the file does not exist.
pub fn load_default_config() -> Result<AppConfig> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!("No config.toml found, using default settings");
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [database]
            url = "sqlite::memory:"

            [batch]
            chunk_size = 500
            threshold = 10

            [sweep]
            interval_secs = 60
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.database.url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.batch.chunk_size, 500);
        assert_eq!(config.batch.threshold, 10);
        assert_eq!(config.sweep.interval_secs, 60);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.database.url.is_none());
        assert_eq!(config.batch.chunk_size, 1000);
        assert_eq!(config.sweep.interval_secs, 3600);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let config = parse_config("[batch]\nchunk_size = 0").unwrap();
        assert!(matches!(
            config.batch_options(),
            Err(Error::Config { message: _ })
        ));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_config("[batch\nchunk_size = ");
        assert!(matches!(result, Err(Error::Config { message: _ })));
    }
}
