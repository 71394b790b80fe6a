//! Scope key resolution.
//!
//! A scoped key has the shape `prefix:scope:key`, with the scope segment
//! omitted when empty. The scope comes from the current [`Location`]: either
//! a query parameter or a path pattern with ordinal placeholders.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::warn;

use crate::location::Location;
use crate::options::ScopeSource;

/// Default storage key prefix.
pub const DEFAULT_PREFIX: &str = "advState";

/// Substituted for a `$N` placeholder whose segment does not exist.
pub const MISSING_SEGMENT: &str = "default";

/// Scope used when a path pattern contains no placeholders.
pub const PATH_SCOPE_FALLBACK: &str = "default-path-scope";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("placeholder regex"));

/// Derive the scope segment for `source` at `location`.
pub fn resolve_scope(source: &ScopeSource, location: &Location) -> String {
    match source {
        ScopeSource::None => String::new(),
        ScopeSource::QueryParam(name) => location
            .query_param(name)
            .unwrap_or_else(|| format!("default-{name}")),
        ScopeSource::PathPattern(pattern) => expand_path_pattern(pattern, &location.path_segments()),
    }
}

/// Substitute `$1, $2, …` (1-indexed) with path segments.
fn expand_path_pattern(pattern: &str, segments: &[String]) -> String {
    if !PLACEHOLDER.is_match(pattern) {
        warn!(%pattern, "path pattern has no placeholders; using fallback scope");
        return PATH_SCOPE_FALLBACK.to_string();
    }

    PLACEHOLDER
        .replace_all(pattern, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|idx| segments.get(idx))
                .map(String::as_str)
                .unwrap_or(MISSING_SEGMENT)
                .to_string()
        })
        .into_owned()
}

/// Compose `prefix:scope:key`, dropping an empty scope segment.
pub fn scoped_key(prefix: &str, scope: &str, key: &str) -> String {
    if scope.is_empty() {
        format!("{prefix}:{key}")
    } else {
        format!("{prefix}:{scope}:{key}")
    }
}

/// Resolve the storage-qualified key for `key`.
pub fn resolve(prefix: &str, source: &ScopeSource, key: &str, location: &Location) -> String {
    scoped_key(prefix, &resolve_scope(source, location), key)
}
