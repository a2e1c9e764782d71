//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use club_schedule_core::SchedulePolicy;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// The club's offset from UTC, used to decide what "today" is.
    pub club_utc_offset: FixedOffset,
    pub policy: SchedulePolicy,
    /// `None` disables the in-process sweeper.
    pub sweep_interval: Option<Duration>,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address: SocketAddr = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000".parse().ok())?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let club_utc_offset: FixedOffset = parse_or(&lookup, "CLUB_UTC_OFFSET", "+00:00".parse().ok())?;

        // --- Club Rules ---
        let defaults = SchedulePolicy::default();
        let makeup_window_days =
            parse_or(&lookup, "MAKEUP_WINDOW_DAYS", Some(defaults.makeup_window_days))?;
        let max_makeups_per_month =
            parse_or(&lookup, "MAX_MAKEUPS_PER_MONTH", Some(defaults.max_makeups_per_month))?;
        let policy = SchedulePolicy {
            makeup_window_days,
            max_makeups_per_month,
            ..defaults
        };

        // --- Background Sweeper ---
        let sweep_secs: u64 = parse_or(&lookup, "SWEEP_INTERVAL_SECS", Some(3600))?;
        let sweep_interval = (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs));

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            club_utc_offset,
            policy,
            sweep_interval,
            cors_origin,
        })
    }
}

/// Parses `key` if it is set, otherwise falls back to `default`.
fn parse_or<T, F>(lookup: &F, key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_database_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/club")]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.club_utc_offset.local_minus_utc(), 0);
        assert_eq!(config.policy, SchedulePolicy::default());
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(var)) if var == "DATABASE_URL"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/club"),
            ("BIND_ADDRESS", "127.0.0.1:8080"),
            ("RUST_LOG", "debug"),
            ("CLUB_UTC_OFFSET", "+02:00"),
            ("MAKEUP_WINDOW_DAYS", "10"),
            ("MAX_MAKEUPS_PER_MONTH", "3"),
            ("SWEEP_INTERVAL_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.club_utc_offset.local_minus_utc(), 2 * 3600);
        assert_eq!(config.policy.makeup_window_days, 10);
        assert_eq!(config.policy.max_makeups_per_month, 3);
        assert_eq!(config.sweep_interval, None);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/club"),
            ("MAKEUP_WINDOW_DAYS", "a week"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "MAKEUP_WINDOW_DAYS"));

        let err = load(&[("DATABASE_URL", "x"), ("RUST_LOG", "loud")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "RUST_LOG"));
    }
}
