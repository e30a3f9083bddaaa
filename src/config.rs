//! Environment-variable configuration surface.
//!
//! All knobs are read once at startup. Only `DATABASE_URL` is required; every
//! monitoring parameter falls back to the reference defaults (5s period, 3
//! retries, 500MB memory threshold, 30min alert cooldown).

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("environment variable `{0}` must be set")]
    MissingVar(&'static str),
    #[error("environment variable `{name}` has invalid value `{value}`")]
    InvalidVar { name: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;

const DEFAULT_INTERVAL_SECS: u64 = 5;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_MEMORY_THRESHOLD_MB: u64 = 500;
const DEFAULT_ALERT_COOLDOWN_SECS: u64 = 30 * 60;
const DEFAULT_PROTECT_LABEL: &str = "sentinel.auto-heal";
const DEFAULT_PROTECT_LABEL_VALUE: &str = "true";
const DEFAULT_API_ADDR: &str = "0.0.0.0:3000";

/// Runtime configuration of the monitoring agent.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Period of the monitoring loop.
    pub interval: Duration,
    /// Maximum number of consecutive automatic restart attempts before a
    /// container is blocked.
    pub max_retries: u32,
    /// Memory usage (in MB) above which a proactive alert is raised.
    pub memory_threshold_mb: u64,
    /// Minimum time between two proactive alerts for the same container.
    pub alert_cooldown: Duration,
    /// Label key marking a container as eligible for automatic recovery.
    pub protect_label: String,
    /// Label value required under [`Config::protect_label`].
    pub protect_label_value: String,
    pub api_addr: String,
    /// Outbound alert webhook. When unset, alerts are only logged.
    pub webhook_url: Option<String>,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is unset or any numeric variable
    /// fails to parse.
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| Error::MissingVar("DATABASE_URL"))?;

        let interval_secs =
            parse_or("SENTINEL_MONITOR_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?;
        // A zero period is not a valid timer interval.
        if interval_secs == 0 {
            return Err(Error::InvalidVar {
                name: "SENTINEL_MONITOR_INTERVAL_SECS",
                value: "0".to_owned(),
            });
        }

        Ok(Self {
            database_url,
            interval: Duration::from_secs(interval_secs),
            max_retries: parse_or("SENTINEL_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            memory_threshold_mb: parse_or(
                "SENTINEL_MEMORY_THRESHOLD_MB",
                DEFAULT_MEMORY_THRESHOLD_MB,
            )?,
            alert_cooldown: Duration::from_secs(parse_or(
                "SENTINEL_ALERT_COOLDOWN_SECS",
                DEFAULT_ALERT_COOLDOWN_SECS,
            )?),
            protect_label: var_or("SENTINEL_PROTECT_LABEL", DEFAULT_PROTECT_LABEL),
            protect_label_value: var_or(
                "SENTINEL_PROTECT_LABEL_VALUE",
                DEFAULT_PROTECT_LABEL_VALUE,
            ),
            api_addr: var_or("SENTINEL_API_ADDR", DEFAULT_API_ADDR),
            webhook_url: std::env::var("SENTINEL_WEBHOOK_URL").ok(),
        })
    }
}

fn var_or(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_owned())
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|_| Error::InvalidVar { name, value }),
        Err(_) => Ok(default),
    }
}
