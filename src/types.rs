//! Core log event types
//!
//! A `LogEvent` keeps the host's JSON object exactly as it arrived. The
//! fields this crate interprets (`tags`, `event`, `statusCode`, `config`)
//! are read through typed accessors, so a stored event decodes back to the
//! structure it was built from: empty arrays, explicit nulls and values of
//! unexpected types included.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminator carried by request/response log events
pub const RESPONSE_EVENT: &str = "response";

const TAGS: &str = "tags";
const EVENT: &str = "event";
const STATUS_CODE: &str = "statusCode";
const CONFIG: &str = "config";
const FILTER: &str = "requestResponseFilter";
const TENANT: &str = "tenant";

/// A structured log event produced by the host application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEvent {
    fields: Map<String, Value>,
}

impl LogEvent {
    /// Create a plain log event with the given tags
    pub fn log<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = tags.into_iter().map(|t| Value::String(t.into())).collect();
        Self::default().with_field(TAGS, Value::Array(tags))
    }

    /// Create a response event with a status code
    pub fn response(status_code: u16) -> Self {
        Self::default()
            .with_field(EVENT, Value::from(RESPONSE_EVENT))
            .with_field(STATUS_CODE, Value::from(status_code))
    }

    /// Add a tag
    ///
    /// A missing or non-array `tags` field is replaced by a one-element array.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = Value::String(tag.into());
        match self.fields.get_mut(TAGS) {
            Some(Value::Array(tags)) => tags.push(tag),
            _ => {
                self.fields.insert(TAGS.to_string(), Value::Array(vec![tag]));
            }
        }
        self
    }

    /// Attach a raw filter policy under `config.requestResponseFilter`
    pub fn with_filter(mut self, policy: Value) -> Self {
        self.set_filter_policy(policy);
        self
    }

    /// Set the tenant under `config.tenant`
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.set_config(TENANT, Value::String(tenant.into()));
        self
    }

    /// Set a top-level field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Replace `config.requestResponseFilter`, keeping the rest of `config`
    pub fn set_filter_policy(&mut self, policy: Value) {
        self.set_config(FILTER, policy);
    }

    fn set_config(&mut self, key: &str, value: Value) {
        match self.fields.get_mut(CONFIG) {
            Some(Value::Object(config)) => {
                config.insert(key.to_string(), value);
            }
            _ => {
                let mut config = Map::new();
                config.insert(key.to_string(), value);
                self.fields.insert(CONFIG.to_string(), Value::Object(config));
            }
        }
    }

    /// String tags; non-string elements are skipped
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.fields
            .get(TAGS)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    /// Whether the event carries the given tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().any(|t| t == tag)
    }

    /// Event discriminator (e.g., "response", "log")
    pub fn event(&self) -> Option<&str> {
        self.fields.get(EVENT)?.as_str()
    }

    /// Whether this is a response-shaped event
    pub fn is_response(&self) -> bool {
        self.event() == Some(RESPONSE_EVENT)
    }

    /// HTTP status code, if present and in range
    pub fn status_code(&self) -> Option<u16> {
        let code = self.fields.get(STATUS_CODE)?.as_u64()?;
        u16::try_from(code).ok()
    }

    /// Per-event settings object
    pub fn config(&self) -> Option<&Map<String, Value>> {
        self.fields.get(CONFIG)?.as_object()
    }

    /// Raw filter policy, if one is attached and not null
    pub fn filter_policy(&self) -> Option<&Value> {
        self.config()?.get(FILTER).filter(|v| !v.is_null())
    }

    /// Tenant identifier, if one is attached
    pub fn tenant(&self) -> Option<&str> {
        self.config()?.get(TENANT)?.as_str()
    }

    /// Any top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for LogEvent {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// What a sink receives: opaque text or a structured event
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    /// Pre-serialized line, stored verbatim
    Text(String),
    /// Structured event, stored as compact JSON
    Event(LogEvent),
}

impl LogEntry {
    /// Serialize for storage
    ///
    /// Text passes through unchanged; events are JSON-encoded.
    pub fn encode(&self) -> Result<String> {
        match self {
            LogEntry::Text(s) => Ok(s.clone()),
            LogEntry::Event(event) => Ok(serde_json::to_string(event)?),
        }
    }

    /// The structured event, if this entry has one
    pub fn as_event(&self) -> Option<&LogEvent> {
        match self {
            LogEntry::Event(event) => Some(event),
            LogEntry::Text(_) => None,
        }
    }

    /// Tenant of the underlying event
    pub fn tenant(&self) -> Option<&str> {
        self.as_event().and_then(LogEvent::tenant)
    }
}

impl From<LogEvent> for LogEntry {
    fn from(event: LogEvent) -> Self {
        LogEntry::Event(event)
    }
}

impl From<String> for LogEntry {
    fn from(text: String) -> Self {
        LogEntry::Text(text)
    }
}

impl From<&str> for LogEntry {
    fn from(text: &str) -> Self {
        LogEntry::Text(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reencode(host: &Value) -> Value {
        let event: LogEvent = serde_json::from_value(host.clone()).unwrap();
        let encoded = LogEntry::from(event).encode().unwrap();
        serde_json::from_str(&encoded).unwrap()
    }

    #[test]
    fn test_response_event() {
        let event = LogEvent::response(204).with_tag("api");
        assert!(event.is_response());
        assert_eq!(event.status_code(), Some(204));
        assert!(event.has_tag("api"));
        assert!(!event.has_tag("content"));
    }

    #[test]
    fn test_log_event_is_not_response() {
        let event = LogEvent::log(["info", "viz"]);
        assert!(!event.is_response());
        assert!(event.has_tag("viz"));
        assert!(event.status_code().is_none());
    }

    #[test]
    fn test_config_accessors() {
        let event = LogEvent::response(200)
            .with_tenant("acme")
            .with_filter(json!({"errors": false}));
        assert_eq!(event.tenant(), Some("acme"));
        assert_eq!(event.filter_policy(), Some(&json!({"errors": false})));

        let bare = LogEvent::response(200);
        assert!(bare.tenant().is_none());
        assert!(bare.filter_policy().is_none());
        assert!(bare.config().is_none());
    }

    #[test]
    fn test_set_filter_keeps_other_config() {
        let host = json!({"config": {"route": "orders", "requestResponseFilter": null}});
        let mut event: LogEvent = serde_json::from_value(host).unwrap();
        assert!(event.filter_policy().is_none());

        event.set_filter_policy(json!({"api": false}));
        assert_eq!(event.config().unwrap()["route"], "orders");
        assert_eq!(event.filter_policy(), Some(&json!({"api": false})));
    }

    #[test]
    fn test_deserialize_host_event() {
        let json = r#"{
            "event": "response",
            "statusCode": 503,
            "tags": ["api", "error"],
            "path": "/v1/orders",
            "config": {"tenant": "acme", "requestResponseFilter": {"errors": false}, "route": "orders"}
        }"#;

        let event: LogEvent = serde_json::from_str(json).unwrap();
        assert!(event.is_response());
        assert_eq!(event.status_code(), Some(503));
        assert_eq!(event.get("path"), Some(&json!("/v1/orders")));
        assert_eq!(event.tenant(), Some("acme"));
        assert_eq!(event.config().unwrap()["route"], "orders");
    }

    #[test]
    fn test_encode_keeps_empty_tags() {
        let host = json!({"event": "response", "statusCode": 200, "tags": []});
        assert_eq!(reencode(&host), host);
    }

    #[test]
    fn test_encode_keeps_explicit_nulls() {
        let host = json!({
            "event": null,
            "statusCode": null,
            "tags": null,
            "config": {"tenant": null, "requestResponseFilter": null}
        });
        assert_eq!(reencode(&host), host);

        let event: LogEvent = serde_json::from_value(host).unwrap();
        assert_eq!(event.tags().count(), 0);
        assert!(event.status_code().is_none());
        assert!(event.tenant().is_none());
    }

    #[test]
    fn test_encode_keeps_unexpected_types() {
        let host = json!({
            "statusCode": "200",
            "tags": ["api", 7, {"nested": true}],
            "config": "inline"
        });
        assert_eq!(reencode(&host), host);

        let event: LogEvent = serde_json::from_value(host).unwrap();
        assert!(event.status_code().is_none());
        assert_eq!(event.tags().collect::<Vec<_>>(), vec!["api"]);
        assert!(event.config().is_none());
    }

    #[test]
    fn test_encode_preserves_unknown_fields() {
        let host = json!({
            "event": "response",
            "statusCode": 200,
            "tags": ["api"],
            "timestamp": 1700000000000u64,
            "source": {"remoteAddress": "10.0.0.1"}
        });
        assert_eq!(reencode(&host), host);
    }

    #[test]
    fn test_out_of_range_status_code() {
        let event: LogEvent = serde_json::from_value(json!({"statusCode": 70000})).unwrap();
        assert!(event.status_code().is_none());
    }

    #[test]
    fn test_with_tag_replaces_non_array() {
        let event: LogEvent = serde_json::from_value(json!({"tags": null})).unwrap();
        let event = event.with_tag("content");
        assert_eq!(event.get("tags"), Some(&json!(["content"])));
    }

    #[test]
    fn test_encode_text_passthrough() {
        let entry = LogEntry::from("already serialized {\"a\":1}");
        assert_eq!(entry.encode().unwrap(), "already serialized {\"a\":1}");
        assert!(entry.as_event().is_none());
        assert!(entry.tenant().is_none());
    }
}
