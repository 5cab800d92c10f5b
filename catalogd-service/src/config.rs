//! Layered configuration: a YAML file provides defaults, CLI flags and
//! environment variables override them (spec.md's ambient "Configuration"
//! concern, carried regardless of the distilled spec's Non-goals).
//!
//! Grounded on `tycho-indexer`'s `clap::Parser` + `#[arg(long, env = ...)]`
//! convention for its service binary, generalized with a `serde_yaml` file
//! layer underneath since this catalogue's deployment topology (multiple
//! tenants, one shared Postgres) benefits from a checked-in base config the
//! CLI/env layer only needs to override selectively.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FileConfig {
    pub database_url: Option<String>,
    pub bind_address: Option<String>,
    pub metrics_address: Option<String>,
    pub max_pool_size: Option<usize>,
    pub log_filter: Option<String>,
}

/// Command-line/environment configuration; values here override the
/// `--config` file's matching field, and a value supplied neither way falls
/// back to the default shown.
#[derive(Debug, Parser)]
#[command(name = "catalogd", about = "Metadata catalogue DAL/write/read/search service")]
pub struct Cli {
    /// Path to a YAML base-config file.
    #[arg(long, env = "CATALOGD_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "CATALOGD_DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "CATALOGD_BIND_ADDRESS", default_value = "0.0.0.0:8443")]
    pub bind_address: String,

    #[arg(long, env = "CATALOGD_METRICS_ADDRESS", default_value = "0.0.0.0:9464")]
    pub metrics_address: String,

    #[arg(long, env = "CATALOGD_MAX_POOL_SIZE", default_value_t = 10)]
    pub max_pool_size: usize,

    #[arg(long, env = "CATALOGD_LOG_FILTER", default_value = "info")]
    pub log_filter: String,
}

/// Fully resolved configuration the rest of the service is built from.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub metrics_address: String,
    pub max_pool_size: usize,
    pub log_filter: String,
}

impl Config {
    /// Parses CLI/env args, loads the optional `--config` file, and merges
    /// the two. `database_url` has no built-in default, so CLI/env wins
    /// whenever it's set and the file is only a fallback; every other field
    /// has a clap default, so the file (when present) overrides it — only
    /// an explicit CLI flag or env var can be told apart from clap's own
    /// default by setting `database_url`, so the other fields use the
    /// file-wins rule instead of trying to detect "was this explicitly
    /// passed".
    pub fn load() -> anyhow::Result<Config> {
        let cli = Cli::parse();
        Self::from_cli(cli)
    }

    fn from_cli(cli: Cli) -> anyhow::Result<Config> {
        let file = match &cli.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
                serde_yaml::from_str::<FileConfig>(&text)
                    .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?
            }
            None => FileConfig::default(),
        };

        let database_url = cli
            .database_url
            .or(file.database_url)
            .ok_or_else(|| anyhow::anyhow!("database_url must be set via --database-url, CATALOGD_DATABASE_URL, or the config file"))?;

        Ok(Config {
            database_url,
            bind_address: file.bind_address.unwrap_or(cli.bind_address),
            metrics_address: file.metrics_address.unwrap_or(cli.metrics_address),
            max_pool_size: file.max_pool_size.unwrap_or(cli.max_pool_size),
            log_filter: file.log_filter.unwrap_or(cli.log_filter),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_database_url_overrides_file() {
        let cli = Cli {
            config: None,
            database_url: Some("postgres://cli/db".into()),
            bind_address: "0.0.0.0:8443".into(),
            metrics_address: "0.0.0.0:9464".into(),
            max_pool_size: 10,
            log_filter: "info".into(),
        };
        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.database_url, "postgres://cli/db");
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let cli = Cli {
            config: None,
            database_url: None,
            bind_address: "0.0.0.0:8443".into(),
            metrics_address: "0.0.0.0:9464".into(),
            max_pool_size: 10,
            log_filter: "info".into(),
        };
        assert!(Config::from_cli(cli).is_err());
    }
}
