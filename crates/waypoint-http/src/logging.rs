//! Structured logging setup

use serde::{Deserialize, Serialize};
use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when no filter is given, e.g. "info"
    pub level: String,
    pub json_format: bool,
    pub pretty_print: bool,
    /// Filter directives such as "waypoint_routing=trace,waypoint_http=info".
    /// `RUST_LOG` takes precedence when set.
    pub env_filter: Option<String>,
    pub service_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            pretty_print: true,
            env_filter: None,
            service_name: None,
        }
    }
}

impl LoggingConfig {
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            pretty_print: false,
            env_filter: Some("waypoint_routing=info,waypoint_http=info".to_string()),
            service_name: None,
        }
    }

    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            pretty_print: true,
            env_filter: Some("waypoint_routing=trace,waypoint_http=debug".to_string()),
            service_name: None,
        }
    }

    /// Errors only
    pub fn test() -> Self {
        Self {
            level: "error".to_string(),
            json_format: false,
            pretty_print: false,
            env_filter: Some("waypoint_routing=error,waypoint_http=error".to_string()),
            service_name: None,
        }
    }

    pub fn with_service(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directives in effect when `RUST_LOG` is unset
    pub fn filter_directives(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(&self.level)
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directives()))?;

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout).json())
            .try_init()?;
    } else if config.pretty_print {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout).pretty())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout))
            .try_init()?;
    }

    tracing::info!(
        target: "waypoint::logging",
        service = config.service_name.as_deref().unwrap_or("waypoint"),
        "Logging initialized (level: {}, format: {})",
        config.level,
        if config.json_format { "JSON" } else { "text" }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let production = LoggingConfig::production();
        assert!(production.json_format);
        assert!(!production.pretty_print);

        let development = LoggingConfig::development();
        assert_eq!(development.level, "debug");
        assert!(development.filter_directives().contains("waypoint_routing=trace"));

        let config = LoggingConfig::default();
        assert_eq!(config.filter_directives(), "info");
        let config = config.with_env_filter("waypoint_http=warn").with_service("api");
        assert_eq!(config.filter_directives(), "waypoint_http=warn");
        assert_eq!(config.service_name.as_deref(), Some("api"));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: LoggingConfig = serde_json::from_str(r#"{"json_format": true}"#).unwrap();
        assert!(config.json_format);
        assert_eq!(config.level, "info");
    }
}
