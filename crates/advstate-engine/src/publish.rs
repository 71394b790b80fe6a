//! Publish store: same-process fan-out of keyed values.
//!
//! One store exists per provider. It remembers the last published value for
//! each scoped key and invokes that key's subscribers, synchronously and in
//! registration order, whenever the value changes.
//!
//! # Equality
//!
//! `set` is a no-op when the new value is deep-equal to the current one:
//! nothing is stored and nobody is notified. A binding that re-publishes a
//! value it just received therefore never echoes back to its peers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use advstate_core::Subscription;
use serde_json::Value;
use tracing::debug;

pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct StoreInner {
    values: HashMap<String, Value>,
    /// key → subscribers in registration order.
    subscribers: HashMap<String, Vec<(u64, Listener)>>,
    next_id: u64,
}

/// Provider-owned map of key → value plus per-key subscribers.
#[derive(Clone, Default)]
pub struct PublishStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl PublishStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().expect("store lock").values.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().expect("store lock").values.contains_key(key)
    }

    /// Store `value` and notify subscribers of `key`.
    ///
    /// Returns false (and notifies nobody) when `value` equals the current value.
    pub fn set(&self, key: &str, value: Value) -> bool {
        let listeners: Vec<Listener> = {
            let mut inner = self.inner.lock().expect("store lock");
            if inner.values.get(key) == Some(&value) {
                return false;
            }
            inner.values.insert(key.to_string(), value.clone());
            inner
                .subscribers
                .get(key)
                .map(|subs| subs.iter().map(|(_, l)| l.clone()).collect())
                .unwrap_or_default()
        };
        debug!(%key, subscribers = listeners.len(), "publishing value");
        for listener in listeners {
            listener(&value);
        }
        true
    }

    /// Set `key` only if it has no value yet. Never notifies.
    pub fn init_state(&self, key: &str, value: Value) -> bool {
        let mut inner = self.inner.lock().expect("store lock");
        if inner.values.contains_key(key) {
            return false;
        }
        inner.values.insert(key.to_string(), value);
        true
    }

    pub fn subscribe(
        &self,
        key: &str,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        let listener: Listener = Arc::new(listener);
        let id = {
            let mut inner = self.inner.lock().expect("store lock");
            let id = inner.next_id;
            inner.next_id += 1;
            inner
                .subscribers
                .entry(key.to_string())
                .or_default()
                .push((id, listener));
            id
        };

        let weak = Arc::downgrade(&self.inner);
        let key = key.to_string();
        Subscription::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut inner = inner.lock().expect("store lock");
            if let Some(subs) = inner.subscribers.get_mut(&key) {
                subs.retain(|(sub_id, _)| *sub_id != id);
                if subs.is_empty() {
                    inner.subscribers.remove(&key);
                }
            }
        })
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .expect("store lock")
            .subscribers
            .get(key)
            .map_or(0, Vec::len)
    }

    /// Non-owning handle for bindings.
    pub fn downgrade(&self) -> StoreHandle {
        StoreHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Weak reference to a provider's store. Goes dead when the provider drops.
#[derive(Clone, Default)]
pub struct StoreHandle {
    inner: Weak<Mutex<StoreInner>>,
}

impl StoreHandle {
    pub fn upgrade(&self) -> Option<PublishStore> {
        self.inner.upgrade().map(|inner| PublishStore { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recording(
        store: &PublishStore,
        key: &str,
        log: &Arc<Mutex<Vec<String>>>,
        tag: &str,
    ) -> Subscription {
        let log = log.clone();
        let tag = tag.to_string();
        store.subscribe(key, move |v| log.lock().unwrap().push(format!("{tag}:{v}")))
    }

    #[test]
    fn set_notifies_in_registration_order() {
        let store = PublishStore::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recording(&store, "k", &log, "a");
        let _b = recording(&store, "k", &log, "b");

        assert!(store.set("k", json!(1)));
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);
        assert_eq!(store.get("k"), Some(json!(1)));
    }

    #[test]
    fn set_only_notifies_matching_key() {
        let store = PublishStore::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recording(&store, "k", &log, "a");

        store.set("other", json!(1));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn equal_value_is_not_republished() {
        let store = PublishStore::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recording(&store, "k", &log, "a");

        assert!(store.set("k", json!({"x": [1, 2]})));
        assert!(!store.set("k", json!({"x": [1, 2]})));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn init_state_sets_only_if_absent() {
        let store = PublishStore::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recording(&store, "k", &log, "a");

        assert!(store.init_state("k", json!("first")));
        assert!(!store.init_state("k", json!("second")));
        assert_eq!(store.get("k"), Some(json!("first")));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let store = PublishStore::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sub = recording(&store, "k", &log, "a");
        assert_eq!(store.subscriber_count("k"), 1);

        drop(sub);
        assert_eq!(store.subscriber_count("k"), 0);
        store.set("k", json!(1));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn subscriber_may_reenter_store() {
        let store = PublishStore::new();
        let mirror = store.clone();
        let _sub = store.subscribe("src", move |v| {
            mirror.set("dst", v.clone());
        });

        store.set("src", json!(5));
        assert_eq!(store.get("dst"), Some(json!(5)));
    }

    #[test]
    fn handle_dies_with_store() {
        let store = PublishStore::new();
        let handle = store.downgrade();
        assert!(handle.upgrade().is_some());
        drop(store);
        assert!(handle.upgrade().is_none());
    }

    #[test]
    fn subscription_outliving_store_is_harmless() {
        let store = PublishStore::new();
        let sub = store.subscribe("k", |_| {});
        drop(store);
        drop(sub);
    }
}
