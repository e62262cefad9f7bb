//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger behaviour knobs.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// How an entry date is checked against the period it falls in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePolicy {
    /// The date must fall inside an open (or reopened) month of an open,
    /// active fiscal year.
    #[default]
    Strict,
    /// A date outside the chosen month is accepted with a warning. If the
    /// date falls in another month that is closed, the entry is still
    /// rejected.
    Lenient,
}

/// Ledger behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Entry date policy.
    #[serde(default)]
    pub date_policy: DatePolicy,
    /// Whether entries dated after today are accepted.
    #[serde(default)]
    pub allow_future_dates: bool,
    /// Code of the equity account that receives the year's net result.
    #[serde(default = "default_result_account_code")]
    pub result_account_code: String,
}

fn default_result_account_code() -> String {
    "3.3".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            date_policy: DatePolicy::default(),
            allow_future_dates: false,
            result_account_code: default_result_account_code(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_filter() -> String {
    "info,sqlx=warn,sea_orm=warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// then `QUIRE__*` environment variables (for example
    /// `QUIRE__DATABASE__URL`). A `.env` file is read first if present.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("QUIRE").prefix_separator("__").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("QUIRE__DATABASE__URL", Some("postgres://localhost/quire")),
                ("QUIRE__LEDGER__DATE_POLICY", Some("lenient")),
                ("QUIRE__LEDGER__ALLOW_FUTURE_DATES", Some("true")),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/quire");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.ledger.date_policy, DatePolicy::Lenient);
                assert!(config.ledger.allow_future_dates);
                assert_eq!(config.ledger.result_account_code, "3.3");
                assert_eq!(config.logging.format, LogFormat::Pretty);
            },
        );
    }

    #[test]
    fn test_ledger_defaults() {
        let ledger = LedgerConfig::default();
        assert_eq!(ledger.date_policy, DatePolicy::Strict);
        assert!(!ledger.allow_future_dates);
    }
}
