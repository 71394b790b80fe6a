//! Binding options: the per-key configuration surface.
//!
//! Every field of [`BindingOptions`] is optional so that provider-level
//! defaults and call-site options can be merged field by field. The merged
//! result is turned into [`ResolvedOptions`], which carries concrete values
//! and is what a binding actually runs with.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// The two ambient storage areas a binding can persist into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistEngine {
    /// Survives process restarts; shared by every context of an origin.
    Durable,
    /// Cleared when the session ends; private to one context.
    Ephemeral,
}

impl PersistEngine {
    /// The engine that is not `self`.
    pub fn other(self) -> Self {
        match self {
            PersistEngine::Durable => PersistEngine::Ephemeral,
            PersistEngine::Ephemeral => PersistEngine::Durable,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PersistEngine::Durable => "durable",
            PersistEngine::Ephemeral => "ephemeral",
        }
    }
}

/// Which audiences hear about a binding's value changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotifyMode {
    SameProcess,
    CrossContext,
    Both,
}

impl NotifyMode {
    /// True for modes that fan out through the provider's publish store.
    pub fn same_process(self) -> bool {
        matches!(self, NotifyMode::SameProcess | NotifyMode::Both)
    }

    /// True for modes that signal other execution contexts.
    pub fn cross_context(self) -> bool {
        matches!(self, NotifyMode::CrossContext | NotifyMode::Both)
    }
}

/// Where the scope segment of a storage key comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScopeSource {
    #[default]
    None,
    /// A named parameter of the current location's query string.
    QueryParam(String),
    /// A pattern with `$1, $2, …` placeholders over the current path segments.
    PathPattern(String),
}

/// Per-key configuration as written at a call site or in provider defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingOptions {
    /// Value used when neither the publish store nor storage has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<Value>,
    /// Debounce window for side-effecting syncs, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist: Option<PersistEngine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<NotifyMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_by_query_param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_by_path_pattern: Option<String>,
}

impl BindingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the initial value.
    pub fn with_initial(mut self, initial: impl Into<Value>) -> Self {
        self.initial = Some(initial.into());
        self
    }

    /// Builder method: set the debounce window in milliseconds.
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce = Some(ms);
        self
    }

    pub fn with_persist(mut self, engine: PersistEngine) -> Self {
        self.persist = Some(engine);
        self
    }

    pub fn with_notify(mut self, mode: NotifyMode) -> Self {
        self.notify = Some(mode);
        self
    }

    pub fn with_scope_by_query_param(mut self, name: impl Into<String>) -> Self {
        self.scope_by_query_param = Some(name.into());
        self
    }

    pub fn with_scope_by_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.scope_by_path_pattern = Some(pattern.into());
        self
    }

    /// Merge `self` (call site) over `defaults` (provider). Each field set at
    /// the call site wins; unset fields fall back to the default.
    pub fn merged_over(self, defaults: &BindingOptions) -> BindingOptions {
        BindingOptions {
            initial: self.initial.or_else(|| defaults.initial.clone()),
            debounce: self.debounce.or(defaults.debounce),
            persist: self.persist.or(defaults.persist),
            notify: self.notify.or(defaults.notify),
            scope_by_query_param: self
                .scope_by_query_param
                .or_else(|| defaults.scope_by_query_param.clone()),
            scope_by_path_pattern: self
                .scope_by_path_pattern
                .or_else(|| defaults.scope_by_path_pattern.clone()),
        }
    }

    /// Turn optional fields into concrete values.
    ///
    /// When both scope sources are configured the query parameter wins and a
    /// diagnostic is emitted.
    pub fn resolve(&self, key: &str) -> ResolvedOptions {
        let scope = match (&self.scope_by_query_param, &self.scope_by_path_pattern) {
            (Some(name), Some(pattern)) => {
                warn!(
                    %key,
                    query_param = %name,
                    path_pattern = %pattern,
                    "both scope sources configured; using query parameter"
                );
                ScopeSource::QueryParam(name.clone())
            }
            (Some(name), None) => ScopeSource::QueryParam(name.clone()),
            (None, Some(pattern)) => ScopeSource::PathPattern(pattern.clone()),
            (None, None) => ScopeSource::None,
        };

        ResolvedOptions {
            initial: self.initial.clone(),
            debounce: Duration::from_millis(self.debounce.unwrap_or(0)),
            persist: self.persist,
            notify: self.notify,
            scope,
        }
    }
}

/// Options after merging and defaulting.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub initial: Option<Value>,
    pub debounce: Duration,
    pub persist: Option<PersistEngine>,
    pub notify: Option<NotifyMode>,
    pub scope: ScopeSource,
}

impl ResolvedOptions {
    /// The caller-supplied initial value, or JSON null when none was given.
    pub fn initial_value(&self) -> Value {
        self.initial.clone().unwrap_or(Value::Null)
    }

    pub fn shares_same_process(&self) -> bool {
        self.notify.is_some_and(NotifyMode::same_process)
    }

    pub fn crosses_context(&self) -> bool {
        self.notify.is_some_and(NotifyMode::cross_context)
    }
}
