//! Per-request policy loading from host settings
//!
//! The host framework owns its configuration; this module only reads it
//! through `SettingsSource` path lookups. `PolicyLoader` is invoked once
//! per unit of work (an inbound request) and produces a `RequestScope`
//! that stamps the merged policy onto every event from that request.

use crate::filter::{FilterPolicy, LogLevel, PolicyPatch};
use crate::types::LogEvent;
use serde_json::Value;

/// Read-only view of host configuration addressed by dotted paths
pub trait SettingsSource: Send + Sync {
    /// Look up the value at `path` (e.g., `"plugins.logger.filter"`)
    fn lookup(&self, path: &str) -> Option<Value>;
}

impl SettingsSource for Value {
    fn lookup(&self, path: &str) -> Option<Value> {
        reach(self, path).cloned()
    }
}

/// Walk a dotted path through nested objects and arrays
///
/// Numeric segments index into arrays. An empty path returns the root.
pub fn reach<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Resolves the filter policy for a unit of work
#[derive(Debug, Clone, Default)]
pub struct PolicyLoader {
    settings_path: Option<String>,
    log_settings_path: Option<String>,
}

impl PolicyLoader {
    pub fn new(settings_path: Option<String>, log_settings_path: Option<String>) -> Self {
        Self {
            settings_path,
            log_settings_path,
        }
    }

    pub fn settings_path(&self) -> Option<&str> {
        self.settings_path.as_deref()
    }

    pub fn log_settings_path(&self) -> Option<&str> {
        self.log_settings_path.as_deref()
    }

    /// Read and merge the policy from host settings
    ///
    /// Level-derived switches form the base and explicit switches override
    /// them. Returns `None` when no settings path is configured or nothing
    /// usable is found, leaving the filter engine to fail open.
    pub fn resolve(&self, settings: &dyn SettingsSource) -> Option<FilterPolicy> {
        let path = self.settings_path.as_deref()?;

        let explicit = settings
            .lookup(path)
            .and_then(|v| PolicyPatch::from_value(&v))
            .filter(|p| !p.is_empty());

        let level = self
            .log_settings_path
            .as_deref()
            .and_then(|p| settings.lookup(p))
            .and_then(|v| parse_level(&v));

        if explicit.is_none() && level.is_none() {
            return None;
        }

        let base = level.map(FilterPolicy::from_level).unwrap_or_default();
        let policy = base.apply(&explicit.unwrap_or_default());

        tracing::debug!(
            settings_path = path,
            level = ?level,
            policy = ?policy,
            "Filter policy resolved"
        );
        Some(policy)
    }

    /// Resolve once and return the scope for the unit of work
    pub fn begin(&self, settings: &dyn SettingsSource) -> RequestScope {
        RequestScope {
            policy: self.resolve(settings),
        }
    }
}

fn parse_level(value: &Value) -> Option<LogLevel> {
    let Value::String(s) = value else {
        tracing::debug!(value = %value, "Expected a string for log level");
        return None;
    };
    match s.parse() {
        Ok(level) => Some(level),
        Err(e) => {
            tracing::debug!("{}", e);
            None
        }
    }
}

/// Policy resolved for one unit of work
///
/// Never shared across units; each request gets its own scope.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    policy: Option<FilterPolicy>,
}

impl RequestScope {
    /// Scope that attaches no policy
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: FilterPolicy) -> Self {
        Self {
            policy: Some(policy),
        }
    }

    pub fn policy(&self) -> Option<&FilterPolicy> {
        self.policy.as_ref()
    }

    /// Attach the scope's policy to an event
    ///
    /// A policy the event already carries is kept.
    pub fn attach(&self, mut event: LogEvent) -> LogEvent {
        self.attach_in_place(&mut event);
        event
    }

    pub fn attach_in_place(&self, event: &mut LogEvent) {
        let Some(policy) = &self.policy else {
            return;
        };
        if event.filter_policy().is_some() {
            return;
        }
        event.set_filter_policy(policy.to_value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn host_settings() -> Value {
        json!({
            "plugins": {
                "logger": {
                    "filter": {"errors": false, "debug": true},
                    "level": "warn"
                },
                "empty": {},
                "broken": "not-an-object"
            },
            "routes": [{"filter": {"api": false}}]
        })
    }

    #[test]
    fn test_reach() {
        let settings = host_settings();
        assert_eq!(reach(&settings, "plugins.logger.level"), Some(&json!("warn")));
        assert_eq!(reach(&settings, "routes.0.filter.api"), Some(&json!(false)));
        assert_eq!(reach(&settings, "routes.x"), None);
        assert_eq!(reach(&settings, "plugins.missing.level"), None);
        assert_eq!(reach(&settings, "plugins.logger.level.deeper"), None);
        assert_eq!(reach(&settings, ""), Some(&settings));
    }

    #[test]
    fn test_no_settings_path() {
        let loader = PolicyLoader::new(None, Some("plugins.logger.level".to_string()));
        assert!(loader.resolve(&host_settings()).is_none());
    }

    #[test]
    fn test_explicit_only() {
        let loader = PolicyLoader::new(Some("plugins.logger.filter".to_string()), None);
        let policy = loader.resolve(&host_settings()).unwrap();
        assert!(!policy.errors);
        assert!(policy.debug);
        assert!(policy.trace);
    }

    #[test]
    fn test_level_merged_with_explicit() {
        let loader = PolicyLoader::new(
            Some("plugins.logger.filter".to_string()),
            Some("plugins.logger.level".to_string()),
        );
        let policy = loader.resolve(&host_settings()).unwrap();
        assert!(!policy.trace);
        assert!(policy.debug, "explicit switch overrides the level");
        assert!(!policy.info);
        assert!(policy.warn);
        assert!(policy.error);
        assert!(!policy.errors);
    }

    #[test]
    fn test_level_without_explicit() {
        let loader = PolicyLoader::new(
            Some("plugins.empty".to_string()),
            Some("plugins.logger.level".to_string()),
        );
        let policy = loader.resolve(&host_settings()).unwrap();
        assert_eq!(policy, FilterPolicy::from_level(LogLevel::Warn));
    }

    #[test]
    fn test_nothing_usable() {
        let loader = PolicyLoader::new(Some("plugins.broken".to_string()), Some("nope".to_string()));
        assert!(loader.resolve(&host_settings()).is_none());

        let loader = PolicyLoader::new(Some("plugins.empty".to_string()), None);
        assert!(loader.resolve(&host_settings()).is_none());
    }

    #[test]
    fn test_invalid_level_ignored() {
        let settings = json!({"filter": {"api": false}, "level": "loud"});
        let loader = PolicyLoader::new(Some("filter".to_string()), Some("level".to_string()));
        let policy = loader.resolve(&settings).unwrap();
        assert!(!policy.api);
        assert!(policy.trace);
    }

    #[test]
    fn test_scope_attach() {
        let loader = PolicyLoader::new(Some("plugins.logger.filter".to_string()), None);
        let scope = loader.begin(&host_settings());

        let event = scope.attach(LogEvent::response(503));
        let attached = event.filter_policy().unwrap();
        assert_eq!(attached["errors"], false);
        assert_eq!(attached["content"], true);
    }

    #[test]
    fn test_scope_keeps_event_policy() {
        let scope = RequestScope::with_policy(FilterPolicy::from_level(LogLevel::Error));
        let event = scope.attach(LogEvent::response(200).with_filter(json!({"api": false})));
        assert_eq!(event.filter_policy(), Some(&json!({"api": false})));
    }

    #[test]
    fn test_empty_scope_attaches_nothing() {
        let event = RequestScope::empty().attach(LogEvent::response(200));
        assert!(event.config().is_none());
    }
}
