//! Application configuration.
//!
//! App-level settings (database, run budget, global config defaults) are
//! loaded with figment from TOML plus `WHEELHOUSE_`-prefixed environment
//! variables. Strategy instance configuration is separate: it lives in the
//! database and is validated against the version schema at run time.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::schema::ConfigMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Time budget for a single evaluation; exceeding it fails the run.
    pub run_timeout_secs: u64,
    /// Trailing execution window included in the context.
    pub execution_lookback_days: i64,
    /// Lowest-priority config tier, overridden by schema defaults and
    /// instance overrides.
    #[serde(default)]
    pub global_defaults: ConfigMap,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/wheelhouse".to_string(),
                max_connections: 10,
            },
            engine: EngineSettings {
                run_timeout_secs: 30,
                execution_lookback_days: 7,
                global_defaults: ConfigMap::new(),
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration by merging a TOML file with environment
    /// variables (`WHEELHOUSE_DATABASE__URL`, etc.).
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self> {
        let config: Self = Figment::from(figment::providers::Serialized::defaults(
            Self::default(),
        ))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WHEELHOUSE_").split("__"))
        .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.engine.run_timeout_secs, 30);
        assert_eq!(config.engine.execution_lookback_days, 7);
        assert!(config.engine.global_defaults.is_empty());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load("config/DoesNotExist.toml").unwrap();
        assert_eq!(config.database.max_connections, 10);
    }
}
