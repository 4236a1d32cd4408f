//! Daemon configuration, read from `BACKSTOP_*` environment variables
//!
//! | Variable                      | Default  |
//! |-------------------------------|----------|
//! | `BACKSTOP_LOG_FORMAT`         | `pretty` |
//! | `BACKSTOP_DRAIN_INTERVAL_MS`  | `1000`   |
//! | `BACKSTOP_MAX_RETRIES`        | `3`      |
//! | `BACKSTOP_RETRY_DELAY_MS`     | `1000`   |
//! | `BACKSTOP_JOB_TIMEOUT_MS`     | unset    |
//! | `BACKSTOP_SHUTDOWN_GRACE_MS`  | `5000`   |
//!
//! A value that is set but does not parse stops startup.

use anyhow::{anyhow, bail, Result};
use backstop_core::application::constants::DEFAULT_DRAIN_INTERVAL;
use backstop_core::domain::QueueConfig;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Development: pretty formatting with colors
    Pretty,
    /// Production: JSON structured logging
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub log_format: LogFormat,
    pub drain_interval: Duration,
    pub queue: QueueConfig,
    pub shutdown_grace: Duration,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_format = match lookup("BACKSTOP_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let mut queue = QueueConfig::default();
        if let Some(max_retries) = parse_var::<u32, _>(&lookup, "BACKSTOP_MAX_RETRIES")? {
            if max_retries == 0 {
                bail!("BACKSTOP_MAX_RETRIES must be at least 1");
            }
            queue.default_max_retries = max_retries;
        }
        if let Some(delay) = parse_var::<u64, _>(&lookup, "BACKSTOP_RETRY_DELAY_MS")? {
            queue.default_retry_delay_ms = delay;
        }
        if let Some(timeout) = parse_var::<u64, _>(&lookup, "BACKSTOP_JOB_TIMEOUT_MS")? {
            queue = queue.with_execution_timeout(Duration::from_millis(timeout));
        }

        let drain_interval = parse_var::<u64, _>(&lookup, "BACKSTOP_DRAIN_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DRAIN_INTERVAL);
        if drain_interval.is_zero() {
            bail!("BACKSTOP_DRAIN_INTERVAL_MS must be greater than 0");
        }

        let shutdown_grace = parse_var::<u64, _>(&lookup, "BACKSTOP_SHUTDOWN_GRACE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SHUTDOWN_GRACE);

        Ok(Self {
            log_format,
            drain_interval,
            queue,
            shutdown_grace,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("invalid {}={:?}: {}", key, raw, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<DaemonConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.drain_interval, Duration::from_secs(1));
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
        assert_eq!(config.queue, QueueConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("BACKSTOP_LOG_FORMAT", "json"),
            ("BACKSTOP_DRAIN_INTERVAL_MS", "250"),
            ("BACKSTOP_MAX_RETRIES", "5"),
            ("BACKSTOP_RETRY_DELAY_MS", " 200 "),
            ("BACKSTOP_JOB_TIMEOUT_MS", "3000"),
        ])
        .unwrap();

        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.drain_interval, Duration::from_millis(250));
        assert_eq!(config.queue.default_max_retries, 5);
        assert_eq!(config.queue.default_retry_delay_ms, 200);
        assert_eq!(config.queue.execution_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_unparseable_value_is_an_error() {
        let err = config_from(&[("BACKSTOP_MAX_RETRIES", "three")]).unwrap_err();
        assert!(err.to_string().contains("BACKSTOP_MAX_RETRIES"));

        assert!(config_from(&[("BACKSTOP_MAX_RETRIES", "0")]).is_err());
        assert!(config_from(&[("BACKSTOP_DRAIN_INTERVAL_MS", "0")]).is_err());
    }
}
