//! JSON storage adapter.
//!
//! Wraps an optional [`StorageEnvironment`] behind read/write/remove with
//! JSON encoding. Nothing here fails from the caller's point of view:
//! malformed records and engine errors are logged and read as absent, and
//! without an environment every operation is a no-op.

use std::sync::Arc;

use advstate_core::PersistEngine;
use serde_json::Value;
use tracing::warn;

use crate::error::{StorageError, StorageResult};
use crate::origin::StorageEnvironment;

#[derive(Clone, Default)]
pub struct StorageAdapter {
    env: Option<Arc<dyn StorageEnvironment>>,
}

impl StorageAdapter {
    pub fn new(env: Arc<dyn StorageEnvironment>) -> Self {
        Self { env: Some(env) }
    }

    /// Adapter for an execution context without storage.
    pub fn unavailable() -> Self {
        Self { env: None }
    }

    pub fn from_option(env: Option<Arc<dyn StorageEnvironment>>) -> Self {
        Self { env }
    }

    pub fn is_available(&self) -> bool {
        self.env.is_some()
    }

    pub fn environment(&self) -> Option<&Arc<dyn StorageEnvironment>> {
        self.env.as_ref()
    }

    /// Read and decode the record at `key`.
    pub fn read(&self, engine: PersistEngine, key: &str) -> Option<Value> {
        let env = self.env.as_ref()?;
        match env.get(engine, key) {
            Ok(Some(text)) => decode(engine, key, &text),
            Ok(None) => None,
            Err(e) => {
                warn!(%key, engine = engine.as_str(), error = %e, "storage read failed");
                None
            }
        }
    }

    /// Encode and store `value` at `key`.
    pub fn write(&self, engine: PersistEngine, key: &str, value: &Value) {
        let Some(env) = self.env.as_ref() else {
            return;
        };
        let result = encode(value).and_then(|text| env.set(engine, key, &text));
        if let Err(e) = result {
            warn!(%key, engine = engine.as_str(), error = %e, "storage write failed");
        }
    }

    pub fn remove(&self, engine: PersistEngine, key: &str) {
        let Some(env) = self.env.as_ref() else {
            return;
        };
        if let Err(e) = env.remove(engine, key) {
            warn!(%key, engine = engine.as_str(), error = %e, "storage remove failed");
        }
    }
}

pub fn encode(value: &Value) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialize(e.to_string()))
}

pub fn parse(text: &str) -> StorageResult<Value> {
    serde_json::from_str(text).map_err(|e| StorageError::Deserialize(e.to_string()))
}

/// Decode record text; malformed JSON is logged and treated as absent.
pub fn decode(engine: PersistEngine, key: &str, text: &str) -> Option<Value> {
    match parse(text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(%key, engine = engine.as_str(), error = %e, "malformed record; treating as absent");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::Origin;
    use serde_json::json;

    fn adapter() -> (StorageAdapter, Origin) {
        let origin = Origin::in_memory().unwrap();
        let ctx = origin.open_context().unwrap();
        (StorageAdapter::new(ctx), origin)
    }

    #[test]
    fn write_then_read_returns_equal_value() {
        let (adapter, _origin) = adapter();
        let values = [
            json!(null),
            json!(true),
            json!(42),
            json!(-1.5),
            json!("text with \"quotes\""),
            json!([1, "two", {"three": 3}]),
            json!({"nested": {"list": [], "empty": {}}}),
        ];
        for (i, value) in values.iter().enumerate() {
            let key = format!("app:k{i}");
            adapter.write(PersistEngine::Durable, &key, value);
            assert_eq!(adapter.read(PersistEngine::Durable, &key).as_ref(), Some(value));
        }
    }

    #[test]
    fn record_is_plain_json_without_envelope() {
        let (adapter, origin) = adapter();
        adapter.write(PersistEngine::Durable, "app:theme", &json!("dark"));
        assert_eq!(
            origin.durable().get("app:theme").unwrap().as_deref(),
            Some("\"dark\"")
        );
    }

    #[test]
    fn stored_null_is_distinct_from_absent() {
        let (adapter, _origin) = adapter();
        assert_eq!(adapter.read(PersistEngine::Durable, "k"), None);
        adapter.write(PersistEngine::Durable, "k", &Value::Null);
        assert_eq!(adapter.read(PersistEngine::Durable, "k"), Some(Value::Null));
    }

    #[test]
    fn malformed_record_reads_as_absent() {
        let (adapter, origin) = adapter();
        origin.durable().set("app:broken", "{not json").unwrap();
        assert_eq!(adapter.read(PersistEngine::Durable, "app:broken"), None);
    }

    #[test]
    fn parse_failure_is_a_deserialize_error() {
        assert!(matches!(parse("{oops"), Err(StorageError::Deserialize(_))));
        assert_eq!(parse("[1]").unwrap(), json!([1]));
        assert_eq!(encode(&json!({"a": 1})).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn remove_clears_record() {
        let (adapter, _origin) = adapter();
        adapter.write(PersistEngine::Ephemeral, "k", &json!(1));
        adapter.remove(PersistEngine::Ephemeral, "k");
        assert_eq!(adapter.read(PersistEngine::Ephemeral, "k"), None);
    }

    #[test]
    fn unavailable_storage_is_a_no_op() {
        let adapter = StorageAdapter::unavailable();
        assert!(!adapter.is_available());
        adapter.write(PersistEngine::Durable, "k", &json!(1));
        adapter.remove(PersistEngine::Durable, "k");
        assert_eq!(adapter.read(PersistEngine::Durable, "k"), None);
    }
}
