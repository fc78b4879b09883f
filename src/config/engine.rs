//! Engine configuration loading from finance.toml
//!
//! This module loads the tunables of the reconciliation engine (recent-feed length,
//! fetch timeout, staleness threshold, display currency) and the canonical category
//! table with its per-source aliases. Every field has a default, so a missing file or
//! a partial file is valid.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Default location of the engine configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "finance.toml";

/// Configuration structure representing the entire finance.toml file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of rows in the recent-transaction feed
    pub recent_transaction_limit: usize,
    /// Seconds to wait for each store before treating it as unavailable
    pub fetch_timeout_secs: u64,
    /// Hours after which the last external sync is reported as stale
    pub stale_after_hours: i64,
    /// Symbol used when formatting amounts for display
    pub currency_symbol: String,
    /// Canonical categories; empty means the built-in list
    pub categories: Vec<CategoryConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recent_transaction_limit: 10,
            fetch_timeout_secs: 10,
            stale_after_hours: 24,
            currency_symbol: "£".to_string(),
            categories: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Per-store fetch timeout.
    #[must_use]
    pub const fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Age after which external data is flagged stale.
    #[must_use]
    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.stale_after_hours)
    }
}

/// One canonical category and the names each source uses for it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryConfig {
    /// Canonical name shown on the dashboard
    pub name: String,
    /// Names the local ledger uses for this category
    #[serde(default)]
    pub local_aliases: Vec<String>,
    /// Names or codes the external system uses for this category
    #[serde(default)]
    pub external_aliases: Vec<String>,
}

/// Loads engine configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the finance.toml file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A field has the wrong type
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    debug!("Loading engine configuration from {:?}", path.as_ref());
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file {:?}: {e}", path.as_ref()),
    })?;

    parse_config(&contents)
}

/// Parses engine configuration from TOML text
pub fn parse_config(contents: &str) -> Result<EngineConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse finance.toml: {e}"),
    })
}

/// Loads engine configuration from `path`, or the defaults when the file does not exist
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    if path.as_ref().exists() {
        load_config(path)
    } else {
        info!("No config at {:?}, using engine defaults", path.as_ref());
        Ok(EngineConfig::default())
    }
}

/// Loads engine configuration from the default location (./finance.toml)
pub fn load_default_config() -> Result<EngineConfig> {
    load_config_or_default(DEFAULT_CONFIG_PATH)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_engine_config() {
        let toml_str = r#"
            recent_transaction_limit = 5
            fetch_timeout_secs = 3
            stale_after_hours = 6
            currency_symbol = "€"

            [[categories]]
            name = "Service Charges"
            local_aliases = ["service charge"]
            external_aliases = ["SC01", "SERVICE_CHARGE"]

            [[categories]]
            name = "Insurance"
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.recent_transaction_limit, 5);
        assert_eq!(config.fetch_timeout(), std::time::Duration::from_secs(3));
        assert_eq!(config.stale_after(), chrono::Duration::hours(6));
        assert_eq!(config.currency_symbol, "€");
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.categories[0].external_aliases.len(), 2);
        assert!(config.categories[1].local_aliases.is_empty());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = parse_config("recent_transaction_limit = 3").unwrap();
        assert_eq!(config.recent_transaction_limit, 3);
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.currency_symbol, "£");
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let result = parse_config("recent_transaction_limit = \"ten\"");
        assert!(matches!(result, Err(Error::Config { message: _ })));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "stale_after_hours = 48").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.stale_after_hours, 48);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());

        assert!(load_config(dir.path().join("absent.toml")).is_err());
    }
}
