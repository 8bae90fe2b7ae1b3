// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_ERROR_BACKOFF_BASE_SECS: u64 = 5;
const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix substituted for a leading `_` in Container and Function images
    pub default_image_prefix: Option<String>,
    /// Restrict all watches to one namespace; `None` watches every namespace
    pub watch_namespace: Option<String>,
    /// How often a healthy (or misconfigured) resource is reconciled again
    pub resync_interval: Duration,
    pub error_backoff_base: Duration,
    pub error_backoff_max: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_image_prefix: None,
            watch_namespace: None,
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS),
            error_backoff_base: Duration::from_secs(DEFAULT_ERROR_BACKOFF_BASE_SECS),
            error_backoff_max: Duration::from_secs(DEFAULT_ERROR_BACKOFF_MAX_SECS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let default_image_prefix =
            non_empty("DEFAULT_IMAGE_PREFIX").map(|p| p.trim_end_matches('/').to_string());
        let watch_namespace = non_empty("WATCH_NAMESPACE");

        let seconds = |key: &str, default: u64| -> Result<Duration> {
            match non_empty(key) {
                Some(raw) => raw
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a number of seconds, got '{}'", key, raw)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let resync_interval = seconds("RESYNC_INTERVAL_SECS", DEFAULT_RESYNC_INTERVAL_SECS)?;
        let error_backoff_base =
            seconds("ERROR_BACKOFF_BASE_SECS", DEFAULT_ERROR_BACKOFF_BASE_SECS)?;
        let error_backoff_max = seconds("ERROR_BACKOFF_MAX_SECS", DEFAULT_ERROR_BACKOFF_MAX_SECS)?;

        Ok(Config {
            default_image_prefix,
            watch_namespace,
            resync_interval,
            error_backoff_base,
            error_backoff_max: error_backoff_max.max(error_backoff_base),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.default_image_prefix, None);
        assert_eq!(config.watch_namespace, None);
        assert_eq!(config.resync_interval, Duration::from_secs(300));
        assert_eq!(config.error_backoff_base, Duration::from_secs(5));
        assert_eq!(config.error_backoff_max, Duration::from_secs(300));
    }

    #[test]
    fn test_image_prefix_trailing_slash_trimmed() {
        let config = load(&[("DEFAULT_IMAGE_PREFIX", "registry.example.com/team/")]).unwrap();
        assert_eq!(
            config.default_image_prefix.as_deref(),
            Some("registry.example.com/team")
        );
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = load(&[("WATCH_NAMESPACE", "  "), ("RESYNC_INTERVAL_SECS", "")]).unwrap();
        assert_eq!(config.watch_namespace, None);
        assert_eq!(config.resync_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_interval_is_an_error() {
        let err = load(&[("RESYNC_INTERVAL_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("RESYNC_INTERVAL_SECS"));
    }

    #[test]
    fn test_backoff_max_never_below_base() {
        let config = load(&[
            ("ERROR_BACKOFF_BASE_SECS", "30"),
            ("ERROR_BACKOFF_MAX_SECS", "10"),
        ])
        .unwrap();
        assert_eq!(config.error_backoff_max, Duration::from_secs(30));
    }
}
