//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use stockroom_observability::LogFormat;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not valid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            reason: reason.to_string(),
        }
    }
}

/// Runtime configuration of the API process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind: SocketAddr,
    /// Postgres URL; the in-memory store is used when absent.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// JSON role → permissions table; the built-in table is used when absent.
    pub policy_file: Option<PathBuf>,
    pub seed_demo: bool,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            policy_file: None,
            seed_demo: false,
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Reads `STOCKROOM_*` variables and `DATABASE_URL` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind = get("STOCKROOM_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("STOCKROOM_BIND", e))?;

        let db_max_connections = match get("STOCKROOM_DB_MAX_CONNECTIONS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(0) => return Err(ConfigError::invalid("STOCKROOM_DB_MAX_CONNECTIONS", "must be at least 1")),
                Ok(n) => n,
                Err(e) => return Err(ConfigError::invalid("STOCKROOM_DB_MAX_CONNECTIONS", e)),
            },
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };

        let seed_demo = match get("STOCKROOM_SEED_DEMO") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::invalid("STOCKROOM_SEED_DEMO", format!("expected a boolean, got {raw:?}"))
            })?,
            None => false,
        };

        let log_format = match get("STOCKROOM_LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::invalid("STOCKROOM_LOG_FORMAT", e))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind,
            database_url: get("DATABASE_URL"),
            db_max_connections,
            policy_file: get("STOCKROOM_POLICY_FILE").map(PathBuf::from),
            seed_demo,
            log_format,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(config_from(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = config_from(&[
            ("STOCKROOM_BIND", "127.0.0.1:9000"),
            ("DATABASE_URL", "postgres://localhost/stockroom"),
            ("STOCKROOM_DB_MAX_CONNECTIONS", "12"),
            ("STOCKROOM_POLICY_FILE", "/etc/stockroom/policy.json"),
            ("STOCKROOM_SEED_DEMO", "yes"),
            ("STOCKROOM_LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(config.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/stockroom"));
        assert_eq!(config.db_max_connections, 12);
        assert_eq!(config.policy_file, Some(PathBuf::from("/etc/stockroom/policy.json")));
        assert!(config.seed_demo);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let config = config_from(&[("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = config_from(&[("STOCKROOM_DB_MAX_CONNECTIONS", "0")]).unwrap_err();
        assert!(err.to_string().contains("STOCKROOM_DB_MAX_CONNECTIONS"));

        let err = config_from(&[("STOCKROOM_SEED_DEMO", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "STOCKROOM_SEED_DEMO", .. }));

        assert!(config_from(&[("STOCKROOM_BIND", "not-an-addr")]).is_err());
        assert!(config_from(&[("STOCKROOM_LOG_FORMAT", "xml")]).is_err());
    }
}
