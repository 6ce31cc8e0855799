//! Engine configuration.
//!
//! Every field has a production default, so an empty JSON object or an empty
//! environment yields [`EngineConfig::default`].
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `EXCLUDE_KERNEL_QUERY_CACHE` | `query_cache.enabled` | `true` |
//! | `EXCLUDE_KERNEL_QUERY_CACHE_MAX_ENTRIES` | `query_cache.max_entries` | unbounded |
//! | `EXCLUDE_KERNEL_COMBINATOR_CACHE` | `combinator_cache` | `true` |
//! | `EXCLUDE_KERNEL_REGISTRY_CAPACITY` | `registry_capacity` | `1024` |

use serde::{Deserialize, Serialize};

use crate::query_cache::QueryCacheConfig;

/// Environment variable toggling the per-node query cache.
pub const ENV_QUERY_CACHE: &str = "EXCLUDE_KERNEL_QUERY_CACHE";
/// Environment variable bounding the per-node query cache.
pub const ENV_QUERY_CACHE_MAX_ENTRIES: &str = "EXCLUDE_KERNEL_QUERY_CACHE_MAX_ENTRIES";
/// Environment variable toggling the combinator cache.
pub const ENV_COMBINATOR_CACHE: &str = "EXCLUDE_KERNEL_COMBINATOR_CACHE";
/// Environment variable pre-sizing the registry.
pub const ENV_REGISTRY_CAPACITY: &str = "EXCLUDE_KERNEL_REGISTRY_CAPACITY";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A setting could not be parsed.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// Rejected value.
        value: String,
    },

    /// The JSON document is malformed.
    #[error("Invalid engine configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tuning knobs for an exclude session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-node memoization of module results.
    pub query_cache: QueryCacheConfig,
    /// Whether binary combinator results are memoized by operand.
    pub combinator_cache: bool,
    /// Initial registry capacity. Not a limit.
    pub registry_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_cache: QueryCacheConfig::default(),
            combinator_cache: true,
            registry_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source, using defaults for
    /// missing keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_QUERY_CACHE) {
            config.query_cache.enabled = parse_bool(ENV_QUERY_CACHE, &value)?;
        }
        if let Some(value) = lookup(ENV_QUERY_CACHE_MAX_ENTRIES) {
            config.query_cache.max_entries = match value.trim().to_ascii_lowercase().as_str() {
                "" | "none" | "unbounded" => None,
                _ => Some(parse_usize(ENV_QUERY_CACHE_MAX_ENTRIES, &value)?),
            };
        }
        if let Some(value) = lookup(ENV_COMBINATOR_CACHE) {
            config.combinator_cache = parse_bool(ENV_COMBINATOR_CACHE, &value)?;
        }
        if let Some(value) = lookup(ENV_REGISTRY_CAPACITY) {
            config.registry_capacity = parse_usize(ENV_REGISTRY_CAPACITY, &value)?;
        }

        Ok(config)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.query_cache.enabled);
        assert_eq!(config.query_cache.max_entries, None);
        assert!(config.combinator_cache);
        assert_eq!(config.registry_capacity, 1024);
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{"query_cache": {"max_entries": 64}}"#).unwrap();
        assert!(config.query_cache.enabled);
        assert_eq!(config.query_cache.max_entries, Some(64));
        assert!(config.combinator_cache);

        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(EngineConfig::from_json("{not json"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_from_lookup() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_QUERY_CACHE, "on"),
            (ENV_QUERY_CACHE_MAX_ENTRIES, "256"),
            (ENV_COMBINATOR_CACHE, "false"),
            (ENV_REGISTRY_CAPACITY, " 64 "),
        ]))
        .unwrap();

        assert_eq!(config.query_cache, QueryCacheConfig::bounded(256));
        assert!(!config.combinator_cache);
        assert_eq!(config.registry_capacity, 64);
    }

    #[test]
    fn test_from_lookup_unbounded_keyword() {
        let config = EngineConfig::from_lookup(lookup(&[(ENV_QUERY_CACHE_MAX_ENTRIES, "unbounded")])).unwrap();
        assert_eq!(config.query_cache.max_entries, None);
    }

    #[test]
    fn test_from_lookup_invalid_value() {
        let err = EngineConfig::from_lookup(lookup(&[(ENV_COMBINATOR_CACHE, "maybe")])).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value } => {
                assert_eq!(key, ENV_COMBINATOR_CACHE);
                assert_eq!(value, "maybe");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
