//! State bindings: the unit a consumer acquires for one key.
//!
//! A binding moves through three phases:
//!
//! ```text
//! Initializing -> Live -> TornDown
//! ```
//!
//! Acquisition resolves the scoped key and the initial value (publish store,
//! then storage, then the caller's `initial`), primes the store, and wires
//! up listeners. While live, `set` updates the visible value at once and
//! hands the side-effecting sync (storage write, cross-context signal,
//! same-process publish) to the debounce coordinator. Teardown drops the
//! listeners and cancels any pending sync.

use std::sync::{Arc, Mutex, Weak};

use advstate_core::scope::{self, DEFAULT_PREFIX};
use advstate_core::{
    BindingOptions, Location, NotifyMode, PersistEngine, ResolvedOptions, ScopeSource,
    SignalStrategy, Subscription,
};
use advstate_storage::{CrossTabSignal, StorageAdapter, StorageEnvironment};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::debounce::DebounceCoordinator;
use crate::publish::{PublishStore, StoreHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingPhase {
    Initializing,
    Live,
    TornDown,
}

/// Everything a binding needs from its surroundings.
pub(crate) struct Wiring {
    pub prefix: String,
    pub location: Location,
    pub store: StoreHandle,
    /// Set only for standalone bindings, which own a private store.
    pub owned_store: Option<PublishStore>,
    pub adapter: StorageAdapter,
    pub strategy: SignalStrategy,
}

/// State reachable from listener callbacks.
struct Shared {
    scoped_key: String,
    value: Mutex<Value>,
    phase: Mutex<BindingPhase>,
}

impl Shared {
    fn phase(&self) -> BindingPhase {
        *self.phase.lock().expect("phase lock")
    }

    fn set_phase(&self, phase: BindingPhase) {
        *self.phase.lock().expect("phase lock") = phase;
    }

    /// Apply a value that arrived from elsewhere. Returns true if it changed.
    fn apply_external(&self, value: &Value) -> bool {
        if self.phase() != BindingPhase::Live {
            return false;
        }
        let mut current = self.value.lock().expect("value lock");
        if *current == *value {
            return false;
        }
        *current = value.clone();
        debug!(key = %self.scoped_key, "binding updated from peer");
        true
    }
}

/// The side effects one debounced sync performs, in order.
struct SyncPlan {
    scoped_key: String,
    persist: Option<PersistEngine>,
    /// Engine to pulse a signal through, when the persist write alone does not
    /// reach other contexts.
    emit: Option<PersistEngine>,
    publish: bool,
    adapter: StorageAdapter,
    signal: CrossTabSignal,
    store: StoreHandle,
}

impl SyncPlan {
    fn run(&self, value: Value) {
        if let Some(engine) = self.persist {
            self.adapter.write(engine, &self.scoped_key, &value);
        }
        if let Some(engine) = self.emit {
            self.signal.emit(engine, &self.scoped_key, &value);
        }
        if self.publish {
            if let Some(store) = self.store.upgrade() {
                store.set(&self.scoped_key, value);
            }
        }
        debug!(key = %self.scoped_key, "binding synced");
    }
}

pub struct StateBinding {
    key: String,
    options: ResolvedOptions,
    shared: Arc<Shared>,
    plan: Arc<SyncPlan>,
    debounce: DebounceCoordinator,
    store_sub: Option<Subscription>,
    signal_sub: Option<Subscription>,
    _owned_store: Option<PublishStore>,
}

impl StateBinding {
    /// Acquire a binding with no enclosing provider.
    ///
    /// The binding gets a private publish store, so same-process sharing
    /// cannot reach any other binding.
    pub fn standalone(
        key: &str,
        options: BindingOptions,
        location: &Location,
        storage: Option<Arc<dyn StorageEnvironment>>,
    ) -> Self {
        if options.notify.is_some_and(NotifyMode::same_process) {
            warn!(%key, "same-process notify without a provider; value will not be shared");
        }
        let store = PublishStore::new();
        Self::acquire(
            key,
            &options,
            Wiring {
                prefix: DEFAULT_PREFIX.to_string(),
                location: location.clone(),
                store: store.downgrade(),
                owned_store: Some(store),
                adapter: StorageAdapter::from_option(storage),
                strategy: SignalStrategy::Direct,
            },
        )
    }

    pub(crate) fn acquire(key: &str, options: &BindingOptions, wiring: Wiring) -> Self {
        let resolved = options.resolve(key);
        let scoped_key = scope::resolve(&wiring.prefix, &resolved.scope, key, &wiring.location);
        let signal = CrossTabSignal::new(wiring.adapter.clone(), wiring.strategy);

        if resolved.persist.is_none() && resolved.scope != ScopeSource::None {
            debug!(key = %scoped_key, "scope without persistence only affects key identity");
        }

        let emit = match (resolved.crosses_context(), resolved.persist) {
            (false, _) => None,
            (true, None) => {
                warn!(key = %scoped_key, "cross-context notify requires persist; not signaling");
                None
            }
            (true, Some(engine)) if !signal.reaches_other_contexts(engine) => {
                warn!(
                    key = %scoped_key,
                    engine = engine.as_str(),
                    "cross-context notify cannot reach other contexts from this engine"
                );
                None
            }
            // The persist write itself reaches the other contexts.
            (true, Some(engine)) if signal.carried_by_write(engine) => None,
            (true, Some(engine)) => Some(engine),
        };

        let store = wiring.store.upgrade();
        let initial = Self::resolve_initial(&resolved, &scoped_key, store.as_ref(), &wiring.adapter);
        if let Some(store) = &store {
            store.init_state(&scoped_key, initial.clone());
        }

        let shared = Arc::new(Shared {
            scoped_key: scoped_key.clone(),
            value: Mutex::new(initial),
            phase: Mutex::new(BindingPhase::Initializing),
        });

        let plan = Arc::new(SyncPlan {
            scoped_key: scoped_key.clone(),
            persist: resolved.persist,
            emit,
            publish: resolved.shares_same_process(),
            adapter: wiring.adapter.clone(),
            signal: signal.clone(),
            store: wiring.store.clone(),
        });
        let debounce = {
            let plan = plan.clone();
            DebounceCoordinator::new(move |value| plan.run(value))
        };

        let store_sub = match (&store, resolved.shares_same_process()) {
            (Some(store), true) => {
                let weak = Arc::downgrade(&shared);
                Some(store.subscribe(&scoped_key, move |value| {
                    if let Some(shared) = weak.upgrade() {
                        shared.apply_external(value);
                    }
                }))
            }
            _ => None,
        };

        let signal_sub = match (resolved.crosses_context(), resolved.persist) {
            (true, Some(engine)) => Some(Self::watch_other_contexts(
                &signal,
                engine,
                &shared,
                &resolved,
                wiring.store.clone(),
            )),
            _ => None,
        };

        shared.set_phase(BindingPhase::Live);
        debug!(
            key = %scoped_key,
            persist = ?resolved.persist,
            notify = ?resolved.notify,
            "binding acquired"
        );

        Self {
            key: key.to_string(),
            options: resolved,
            shared,
            plan,
            debounce,
            store_sub,
            signal_sub,
            _owned_store: wiring.owned_store,
        }
    }

    /// Publish store, then storage, then the caller's `initial`.
    fn resolve_initial(
        options: &ResolvedOptions,
        scoped_key: &str,
        store: Option<&PublishStore>,
        adapter: &StorageAdapter,
    ) -> Value {
        if options.shares_same_process() {
            if let Some(value) = store.and_then(|s| s.get(scoped_key)) {
                debug!(key = %scoped_key, "initial value from publish store");
                return value;
            }
        }
        if let Some(engine) = options.persist {
            if let Some(value) = adapter.read(engine, scoped_key) {
                debug!(key = %scoped_key, engine = engine.as_str(), "initial value from storage");
                return value;
            }
        }
        options.initial_value()
    }

    fn watch_other_contexts(
        signal: &CrossTabSignal,
        engine: PersistEngine,
        shared: &Arc<Shared>,
        options: &ResolvedOptions,
        store: StoreHandle,
    ) -> Subscription {
        let weak: Weak<Shared> = Arc::downgrade(shared);
        let initial = options.initial_value();
        let republish = options.notify == Some(NotifyMode::Both);
        signal.watch(engine, &shared.scoped_key, move |incoming| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            // Removal elsewhere means "not set": fall back to `initial`.
            let value = incoming.unwrap_or_else(|| initial.clone());
            if !shared.apply_external(&value) {
                return;
            }
            if republish {
                if let Some(store) = store.upgrade() {
                    store.set(&shared.scoped_key, value);
                }
            }
        })
    }

    /// The base key this binding was acquired with.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The storage-qualified key (`prefix:scope:key`).
    pub fn scoped_key(&self) -> &str {
        &self.shared.scoped_key
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    pub fn phase(&self) -> BindingPhase {
        self.shared.phase()
    }

    /// Current visible value.
    pub fn value(&self) -> Value {
        self.shared.value.lock().expect("value lock").clone()
    }

    /// Current value deserialized as `T`, or `None` if it does not fit.
    pub fn value_as<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.value()).ok()
    }

    /// Replace the value.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        self.update(move |_| value);
    }

    /// Compute the new value from the latest one.
    pub fn update(&self, f: impl FnOnce(&Value) -> Value) {
        if self.phase() != BindingPhase::Live {
            debug!(key = %self.shared.scoped_key, "set on torn-down binding ignored");
            return;
        }
        let next = f(&self.value());
        *self.shared.value.lock().expect("value lock") = next.clone();
        self.debounce.schedule(self.options.debounce, next);
    }

    /// Run a pending sync now instead of waiting for the debounce window.
    pub fn flush(&self) -> bool {
        self.debounce.flush()
    }

    pub fn has_pending_sync(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Restore `initial`, drop the stored record, and tell same-process peers.
    pub fn reset(&self) {
        if self.phase() != BindingPhase::Live {
            return;
        }
        self.debounce.cancel();
        let initial = self.options.initial_value();
        *self.shared.value.lock().expect("value lock") = initial.clone();

        if let Some(engine) = self.plan.persist {
            self.plan.adapter.remove(engine, &self.plan.scoped_key);
        }
        if self.plan.publish {
            if let Some(store) = self.plan.store.upgrade() {
                store.set(&self.plan.scoped_key, initial);
            }
        }
        debug!(key = %self.plan.scoped_key, "binding reset");
    }

    /// Unsubscribe everything and cancel any pending sync. Idempotent.
    pub fn teardown(&mut self) {
        if self.phase() == BindingPhase::TornDown {
            return;
        }
        self.shared.set_phase(BindingPhase::TornDown);
        if let Some(sub) = self.store_sub.take() {
            sub.cancel();
        }
        if let Some(sub) = self.signal_sub.take() {
            sub.cancel();
        }
        if self.debounce.cancel() {
            debug!(key = %self.shared.scoped_key, "pending sync dropped on teardown");
        }
        debug!(key = %self.shared.scoped_key, "binding torn down");
    }
}

impl Drop for StateBinding {
    fn drop(&mut self) {
        self.teardown();
    }
}
