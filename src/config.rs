use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::SpiceError;
use crate::retry::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "spicebase.json";
pub const DEFAULT_BASE_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) SpicesDB/1.0";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub static_root: Option<String>,
    #[serde(default)]
    pub pubchem: PubchemSection,
    #[serde(default)]
    pub batch: BatchSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PubchemSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub backoff_ms: Option<u64>,
    #[serde(default)]
    pub courtesy_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BatchSection {
    #[serde(default)]
    pub commit_every: Option<usize>,
    #[serde(default)]
    pub item_delay_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PubchemSettings {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for PubchemSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(25),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichSettings {
    /// Pause after each successful enrichment call.
    pub courtesy_delay: Duration,
    /// Pause between items of a batch run.
    pub item_delay: Duration,
    /// Number of batch items between store checkpoints.
    pub commit_every: usize,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            courtesy_delay: Duration::from_millis(200),
            item_delay: Duration::from_millis(250),
            commit_every: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub database: Utf8PathBuf,
    pub static_root: Utf8PathBuf,
    pub pubchem: PubchemSettings,
    pub enrich: EnrichSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `spicebase.json` in the working directory when none is
    /// given. A missing default file resolves to built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SpiceError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SpiceError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SpiceError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, SpiceError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(SpiceError::ConfigParse(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let defaults = PubchemSettings::default();
        let base_url = config
            .pubchem
            .base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        let timeout = config
            .pubchem
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let retry = RetryPolicy::new(
            config
                .pubchem
                .max_attempts
                .unwrap_or(defaults.retry.max_attempts),
            config
                .pubchem
                .backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.backoff_base),
        );

        let enrich_defaults = EnrichSettings::default();
        let commit_every = config
            .batch
            .commit_every
            .unwrap_or(enrich_defaults.commit_every);
        if commit_every == 0 {
            return Err(SpiceError::ConfigParse(
                "batch.commit_every must be at least 1".to_string(),
            ));
        }
        let enrich = EnrichSettings {
            courtesy_delay: config
                .pubchem
                .courtesy_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(enrich_defaults.courtesy_delay),
            item_delay: config
                .batch
                .item_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(enrich_defaults.item_delay),
            commit_every,
        };

        Ok(ResolvedConfig {
            schema_version,
            database: Utf8PathBuf::from(config.database.unwrap_or_else(default_database)),
            static_root: Utf8PathBuf::from(config.static_root.unwrap_or_else(default_static_root)),
            pubchem: PubchemSettings {
                base_url,
                user_agent: config.pubchem.user_agent.unwrap_or(defaults.user_agent),
                timeout,
                retry,
            },
            enrich,
        })
    }
}

pub fn default_database() -> String {
    "data/spices.db".to_string()
}

pub fn default_static_root() -> String {
    "static".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.database.as_str(), "data/spices.db");
        assert_eq!(resolved.static_root.as_str(), "static");
        assert_eq!(resolved.pubchem.retry.max_attempts, 3);
        assert_eq!(resolved.pubchem.timeout, Duration::from_secs(25));
        assert_eq!(resolved.enrich.commit_every, 50);
    }
}
