//! Link generation and pooling options
//!
//! Options can be constructed directly, deserialized with serde, or read from
//! `WAYPOINT_*` environment variables.

use super::defaults::RouterDefaults;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

const ENV_LOWERCASE_URLS: &str = "WAYPOINT_LOWERCASE_URLS";
const ENV_LOWERCASE_QUERY_STRINGS: &str = "WAYPOINT_LOWERCASE_QUERY_STRINGS";
const ENV_APPEND_TRAILING_SLASH: &str = "WAYPOINT_APPEND_TRAILING_SLASH";
const ENV_POOL_CAPACITY: &str = "WAYPOINT_POOL_CAPACITY";
const ENV_MAX_RETAINED_BUFFER: &str = "WAYPOINT_MAX_RETAINED_BUFFER";

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    EnvVar(String),
}

/// Router options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterOptions {
    /// Lower-case generated paths. Applied once to the finished URL.
    pub lowercase_urls: bool,
    /// Also lower-case the query string; only honoured with `lowercase_urls`
    pub lowercase_query_strings: bool,
    /// Append `/` to generated paths
    pub append_trailing_slash: bool,
    /// Maximum number of idle URL building contexts kept for reuse
    pub pool_capacity: usize,
    /// Contexts whose buffers grew past this many bytes are dropped on return
    pub max_retained_buffer: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            lowercase_urls: RouterDefaults::LOWERCASE_URLS,
            lowercase_query_strings: RouterDefaults::LOWERCASE_QUERY_STRINGS,
            append_trailing_slash: RouterDefaults::APPEND_TRAILING_SLASH,
            pool_capacity: RouterDefaults::POOL_CAPACITY,
            max_retained_buffer: RouterDefaults::MAX_RETAINED_BUFFER,
        }
    }
}

impl RouterOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_capacity == 0 {
            return Err(ConfigError::validation_failed(
                "pool_capacity",
                "must be greater than 0",
            ));
        }

        if self.max_retained_buffer == 0 {
            return Err(ConfigError::validation_failed(
                "max_retained_buffer",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Read options from the environment, falling back to defaults. The
    /// result is validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let options = RouterOptions {
            lowercase_urls: parse_env(
                ENV_LOWERCASE_URLS,
                "lowercase_urls",
                RouterDefaults::LOWERCASE_URLS,
                "true or false",
            )?,
            lowercase_query_strings: parse_env(
                ENV_LOWERCASE_QUERY_STRINGS,
                "lowercase_query_strings",
                RouterDefaults::LOWERCASE_QUERY_STRINGS,
                "true or false",
            )?,
            append_trailing_slash: parse_env(
                ENV_APPEND_TRAILING_SLASH,
                "append_trailing_slash",
                RouterDefaults::APPEND_TRAILING_SLASH,
                "true or false",
            )?,
            pool_capacity: parse_env(
                ENV_POOL_CAPACITY,
                "pool_capacity",
                RouterDefaults::POOL_CAPACITY,
                "a positive number of contexts",
            )?,
            max_retained_buffer: parse_env(
                ENV_MAX_RETAINED_BUFFER,
                "max_retained_buffer",
                RouterDefaults::MAX_RETAINED_BUFFER,
                "a positive number of bytes",
            )?,
        };

        options.validate()?;
        Ok(options)
    }

    /// Source of each field, judged by which environment variables are set
    pub fn config_sources(&self) -> HashMap<String, ConfigSource> {
        [
            ("lowercase_urls", ENV_LOWERCASE_URLS),
            ("lowercase_query_strings", ENV_LOWERCASE_QUERY_STRINGS),
            ("append_trailing_slash", ENV_APPEND_TRAILING_SLASH),
            ("pool_capacity", ENV_POOL_CAPACITY),
            ("max_retained_buffer", ENV_MAX_RETAINED_BUFFER),
        ]
        .into_iter()
        .map(|(field, key)| {
            let source = if env::var_os(key).is_some() {
                ConfigSource::EnvVar(key.to_string())
            } else {
                ConfigSource::Default
            };
            (field.to_string(), source)
        })
        .collect()
    }
}

fn parse_env<T: FromStr>(key: &str, field: &str, default: T, expected: &str) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.clone(),
            expected: expected.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
