//! Filter engine: decides which log events are worth persisting
//!
//! A policy is a set of named switches, each allowing (default) or
//! suppressing one class of events. Compiling a policy yields one
//! exclusion predicate per suppressed switch; an event is dropped as
//! soon as any predicate matches it.
//!
//! Evaluation is total: malformed or missing policy never raises an
//! error, it simply means "no policy" and the event fails open (except
//! for bare `content` events, which are noise without an explicit opt-in).

use crate::types::LogEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Tag that marks static/content-only events
pub const CONTENT_TAG: &str = "content";

/// One named policy switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Switch {
    Content,
    Viz,
    Api,
    Successes,
    Warnings,
    Errors,
    Trace,
    Warn,
    Error,
    Debug,
    Info,
}

impl Switch {
    /// Every switch, in policy-key order
    pub const ALL: [Switch; 11] = [
        Switch::Content,
        Switch::Viz,
        Switch::Api,
        Switch::Successes,
        Switch::Warnings,
        Switch::Errors,
        Switch::Trace,
        Switch::Warn,
        Switch::Error,
        Switch::Debug,
        Switch::Info,
    ];

    /// Policy key for this switch
    pub fn key(self) -> &'static str {
        match self {
            Switch::Content => "content",
            Switch::Viz => "viz",
            Switch::Api => "api",
            Switch::Successes => "successes",
            Switch::Warnings => "warnings",
            Switch::Errors => "errors",
            Switch::Trace => "trace",
            Switch::Warn => "warn",
            Switch::Error => "error",
            Switch::Debug => "debug",
            Switch::Info => "info",
        }
    }

    /// Look up a switch by policy key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }

    /// The predicate this switch contributes when set to suppress
    pub fn exclusion(self) -> Exclusion {
        match self {
            Switch::Successes => Exclusion::Status(200..=399),
            Switch::Warnings => Exclusion::Status(400..=499),
            Switch::Errors => Exclusion::Status(500..=999),
            tag => Exclusion::Tag(tag.key()),
        }
    }
}

/// Log level name used to derive the level switches
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Designates very serious errors.
    Error,
    /// Designates hazardous situations.
    Warn,
    /// Designates useful information.
    Info,
    /// Designates lower priority information.
    Debug,
    /// Designates very low priority, often extremely verbose, information.
    Trace,
}

impl LogLevel {
    /// Level switches, least verbose first
    const LADDER: [(LogLevel, Switch); 5] = [
        (LogLevel::Error, Switch::Error),
        (LogLevel::Warn, Switch::Warn),
        (LogLevel::Info, Switch::Info),
        (LogLevel::Debug, Switch::Debug),
        (LogLevel::Trace, Switch::Trace),
    ];

    /// Whether a threshold of `self` lets `other` through
    pub fn enables(self, other: LogLevel) -> bool {
        other <= self
    }
}

impl AsRef<str> for LogLevel {
    fn as_ref(&self) -> &str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "Invalid log level: '{s}'. Valid levels are: error, warn, info, debug, trace",
            )),
        }
    }
}

/// Fully-populated filter policy; every switch defaults to allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterPolicy {
    pub content: bool,
    pub viz: bool,
    pub api: bool,
    pub successes: bool,
    pub warnings: bool,
    pub errors: bool,
    pub trace: bool,
    pub warn: bool,
    pub error: bool,
    pub debug: bool,
    pub info: bool,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl FilterPolicy {
    /// Policy that suppresses nothing
    pub fn allow_all() -> Self {
        Self {
            content: true,
            viz: true,
            api: true,
            successes: true,
            warnings: true,
            errors: true,
            trace: true,
            warn: true,
            error: true,
            debug: true,
            info: true,
        }
    }

    /// Expand a log level into its switches
    ///
    /// A level allows itself and every less verbose level, and
    /// suppresses every more verbose one. Non-level switches stay allowed.
    pub fn from_level(level: LogLevel) -> Self {
        let mut policy = Self::allow_all();
        for (rung, switch) in LogLevel::LADDER {
            policy.set(switch, level.enables(rung));
        }
        policy
    }

    pub fn get(&self, switch: Switch) -> bool {
        match switch {
            Switch::Content => self.content,
            Switch::Viz => self.viz,
            Switch::Api => self.api,
            Switch::Successes => self.successes,
            Switch::Warnings => self.warnings,
            Switch::Errors => self.errors,
            Switch::Trace => self.trace,
            Switch::Warn => self.warn,
            Switch::Error => self.error,
            Switch::Debug => self.debug,
            Switch::Info => self.info,
        }
    }

    pub fn set(&mut self, switch: Switch, allow: bool) {
        let slot = match switch {
            Switch::Content => &mut self.content,
            Switch::Viz => &mut self.viz,
            Switch::Api => &mut self.api,
            Switch::Successes => &mut self.successes,
            Switch::Warnings => &mut self.warnings,
            Switch::Errors => &mut self.errors,
            Switch::Trace => &mut self.trace,
            Switch::Warn => &mut self.warn,
            Switch::Error => &mut self.error,
            Switch::Debug => &mut self.debug,
            Switch::Info => &mut self.info,
        };
        *slot = allow;
    }

    /// Override switches with the explicit entries of a patch
    pub fn apply(mut self, patch: &PolicyPatch) -> Self {
        for (switch, allow) in patch.iter() {
            self.set(switch, allow);
        }
        self
    }

    /// Compile into exclusion predicates, one per suppressed switch
    pub fn compile(&self) -> CompiledFilter {
        let exclusions = Switch::ALL
            .into_iter()
            .filter(|s| !self.get(*s))
            .map(Switch::exclusion)
            .collect();
        CompiledFilter { exclusions }
    }

    /// JSON form, as attached to events under `config.requestResponseFilter`
    pub fn to_value(&self) -> Value {
        let map = Switch::ALL
            .into_iter()
            .map(|s| (s.key().to_string(), Value::Bool(self.get(s))))
            .collect();
        Value::Object(map)
    }
}

/// Sparse policy: only the switches the host set explicitly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyPatch {
    switches: BTreeMap<Switch, bool>,
}

impl PolicyPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one switch
    pub fn with(mut self, switch: Switch, allow: bool) -> Self {
        self.switches.insert(switch, allow);
        self
    }

    /// Parse a raw policy leniently
    ///
    /// Returns `None` for anything that is not a JSON object. Unknown keys
    /// and non-boolean values are ignored, so they stay at "allow".
    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::Object(map) = value else {
            tracing::debug!(policy = %value, "Ignoring non-object filter policy");
            return None;
        };

        let mut patch = Self::new();
        for (key, raw) in map {
            match (Switch::from_key(key), raw) {
                (Some(switch), Value::Bool(allow)) => {
                    patch.switches.insert(switch, *allow);
                }
                (Some(_), other) => {
                    tracing::debug!(key = %key, value = %other, "Ignoring non-boolean filter switch");
                }
                (None, _) => {}
            }
        }
        Some(patch)
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    pub fn get(&self, switch: Switch) -> Option<bool> {
        self.switches.get(&switch).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Switch, bool)> + '_ {
        self.switches.iter().map(|(s, a)| (*s, *a))
    }
}

/// A single exclusion predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Matches events carrying the tag
    Tag(&'static str),
    /// Matches events whose status code falls in the range
    Status(RangeInclusive<u16>),
}

impl Exclusion {
    pub fn matches(&self, event: &LogEvent) -> bool {
        match self {
            Exclusion::Tag(tag) => event.has_tag(tag),
            Exclusion::Status(range) => event.status_code().is_some_and(|c| range.contains(&c)),
        }
    }
}

/// Exclusion predicates compiled from one policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledFilter {
    exclusions: Vec<Exclusion>,
}

impl CompiledFilter {
    /// True if any predicate matches
    pub fn excludes(&self, event: &LogEvent) -> bool {
        self.exclusions.iter().any(|e| e.matches(event))
    }

    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }

    pub fn is_empty(&self) -> bool {
        self.exclusions.is_empty()
    }
}

/// Which events the policy rules apply to once a policy is attached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterScope {
    /// Only events whose discriminator is `"response"`
    #[default]
    ResponsesOnly,
    /// Every event
    AllEvents,
}

/// Outcome of evaluating one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Drop,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        self == Verdict::Pass
    }
}

/// Evaluates events against the policy they carry
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterEngine {
    scope: FilterScope,
}

impl FilterEngine {
    pub fn new(scope: FilterScope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> FilterScope {
        self.scope
    }

    /// Decide whether an event passes through to the sinks
    pub fn evaluate(&self, event: &LogEvent) -> Verdict {
        let patch = match event.filter_policy().and_then(PolicyPatch::from_value) {
            Some(patch) if !patch.is_empty() => patch,
            _ => {
                if event.has_tag(CONTENT_TAG) {
                    tracing::debug!("Dropping content event without filter policy");
                    return Verdict::Drop;
                }
                return Verdict::Pass;
            }
        };

        if self.scope == FilterScope::ResponsesOnly && !event.is_response() {
            return Verdict::Pass;
        }

        let compiled = FilterPolicy::default().apply(&patch).compile();
        if compiled.excludes(event) {
            tracing::debug!(
                status_code = ?event.status_code(),
                tags = ?event.get("tags"),
                "Event suppressed by filter policy"
            );
            Verdict::Drop
        } else {
            Verdict::Pass
        }
    }
}
