//! Pipeline configuration
//!
//! Mirrors the options the host passes when registering the pipeline.
//! Every field has a default, so partial documents load cleanly.

use crate::error::{PipelineError, Result};
use crate::filter::FilterScope;
use crate::provider::redis::RedisConfig;
use crate::settings::PolicyLoader;
use crate::sink::DEFAULT_MAX_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default depth of the pipeline's inbound queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Sink construction and policy registration parameters
///
/// The per-event naming function (`redisKey`) cannot be expressed in a
/// document; pass it as a `ListTarget` when building the pipeline. It
/// takes precedence over `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Store connection
    pub connection: RedisConfig,

    /// Static list name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Maximum entries kept per list
    pub max_size: usize,

    /// Broadcast channel; the channel sink is inert without one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Lookup path of the filter policy in host settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<String>,

    /// Lookup path of a log level name in host settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_settings_path: Option<String>,

    /// Which events policy rules apply to
    pub filter_scope: FilterScope,

    /// Inbound queue depth used by `LogPipeline::start`
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            connection: RedisConfig::default(),
            name: None,
            max_size: DEFAULT_MAX_SIZE,
            channel: None,
            settings_path: None,
            log_settings_path: None,
            filter_scope: FilterScope::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Parse from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PipelineError::Config(format!("Failed to parse pipeline config: {}", e)))
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), "Pipeline config loaded");
        Ok(config)
    }

    /// Check the parameters
    ///
    /// `has_redis_key` tells whether a derived list target will be supplied.
    pub fn validate(&self, has_redis_key: bool) -> Result<()> {
        if self.max_size == 0 {
            return Err(PipelineError::Config("maxSize must be >= 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::Config("queueCapacity must be >= 1".to_string()));
        }
        if matches!(&self.name, Some(n) if n.is_empty()) {
            return Err(PipelineError::Config("name cannot be empty".to_string()));
        }
        if matches!(&self.channel, Some(c) if c.is_empty()) {
            return Err(PipelineError::Config("channel cannot be empty".to_string()));
        }
        if !has_redis_key && self.name.is_none() && self.channel.is_none() {
            return Err(PipelineError::Config(
                "At least one of name, redisKey or channel is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Policy loader for the configured lookup paths
    pub fn policy_loader(&self) -> PolicyLoader {
        PolicyLoader::new(self.settings_path.clone(), self.log_settings_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_size, 1000);
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.filter_scope, FilterScope::ResponsesOnly);
        assert!(config.channel.is_none());
    }

    #[test]
    fn test_from_json() {
        let config = PipelineConfig::from_json(
            r#"{
                "connection": {"url": "redis://cache:6379/1"},
                "name": "logs",
                "maxSize": 50,
                "channel": "logs-live",
                "settingsPath": "plugins.logger.filter",
                "logSettingsPath": "plugins.logger.level",
                "filterScope": "allEvents"
            }"#,
        )
        .unwrap();

        assert_eq!(config.connection.url, "redis://cache:6379/1");
        assert_eq!(config.name.as_deref(), Some("logs"));
        assert_eq!(config.max_size, 50);
        assert_eq!(config.channel.as_deref(), Some("logs-live"));
        assert_eq!(config.filter_scope, FilterScope::AllEvents);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);

        let loader = config.policy_loader();
        assert_eq!(loader.settings_path(), Some("plugins.logger.filter"));
        assert_eq!(loader.log_settings_path(), Some("plugins.logger.level"));
    }

    #[test]
    fn test_from_json_invalid() {
        let err = PipelineConfig::from_json(r#"{"maxSize": "lots"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_validate() {
        let named = PipelineConfig {
            name: Some("logs".to_string()),
            ..Default::default()
        };
        assert!(named.validate(false).is_ok());

        assert!(PipelineConfig::default().validate(false).is_err());
        assert!(PipelineConfig::default().validate(true).is_ok());

        let zero = PipelineConfig {
            max_size: 0,
            ..named.clone()
        };
        assert!(zero.validate(false).is_err());

        let empty_channel = PipelineConfig {
            channel: Some(String::new()),
            ..named
        };
        assert!(empty_channel.validate(false).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = std::env::temp_dir().join(format!("a3s-log-pipeline-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pipeline.json");
        std::fs::write(&path, r#"{"name": "logs", "maxSize": 10}"#).unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.max_size, 10);

        std::fs::remove_dir_all(&dir).unwrap();
        assert!(PipelineConfig::from_file(&path).is_err());
    }
}
