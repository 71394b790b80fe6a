//! Cross-context signaling over storage change events.
//!
//! A write is only observable by other contexts through the change events
//! of a shared engine. Under [`SignalStrategy::Direct`] the binding's own
//! persist engine carries the signal; since only the durable engine is
//! shared, ephemeral bindings stay local. Under
//! [`SignalStrategy::SignalChannel`] an ephemeral binding pulses its value
//! through the durable engine (write, then remove) so other contexts still
//! hear about it without a residual record.

use std::sync::Arc;

use advstate_core::{PersistEngine, SignalStrategy, Subscription};
use serde_json::Value;
use tracing::debug;

use crate::adapter::{StorageAdapter, decode};
use crate::origin::{ChangeListener, StorageEvent};

#[derive(Clone)]
pub struct CrossTabSignal {
    adapter: StorageAdapter,
    strategy: SignalStrategy,
}

impl CrossTabSignal {
    pub fn new(adapter: StorageAdapter, strategy: SignalStrategy) -> Self {
        Self { adapter, strategy }
    }

    pub fn strategy(&self) -> SignalStrategy {
        self.strategy
    }

    /// Whether a binding persisting to `engine` can reach other contexts.
    pub fn reaches_other_contexts(&self, engine: PersistEngine) -> bool {
        self.adapter.is_available()
            && (engine == PersistEngine::Durable || self.strategy == SignalStrategy::SignalChannel)
    }

    /// Whether persisting to `engine` already signals other contexts, so a
    /// separate `emit` would only repeat the write.
    pub fn carried_by_write(&self, engine: PersistEngine) -> bool {
        !(self.strategy == SignalStrategy::SignalChannel && engine == PersistEngine::Ephemeral)
    }

    /// Make the value stored at `key` in `engine` observable elsewhere.
    pub fn emit(&self, engine: PersistEngine, key: &str, value: &Value) {
        match (self.strategy, engine) {
            (SignalStrategy::SignalChannel, PersistEngine::Ephemeral) => {
                let channel = engine.other();
                self.adapter.write(channel, key, value);
                self.adapter.remove(channel, key);
                debug!(%key, "signal pulsed through durable engine");
            }
            _ => self.adapter.write(engine, key, value),
        }
    }

    /// Raw feed: every decodable change made by another context.
    ///
    /// The callback receives `(engine, key, new value or absent)`. Records
    /// that fail to decode are skipped.
    pub fn on_change(
        &self,
        callback: impl Fn(PersistEngine, &str, Option<Value>) + Send + Sync + 'static,
    ) -> Subscription {
        let Some(env) = self.adapter.environment() else {
            return Subscription::noop();
        };
        let listener: ChangeListener = Arc::new(move |event: &StorageEvent| {
            match &event.new_value {
                None => callback(event.engine, &event.key, None),
                Some(text) => {
                    if let Some(value) = decode(event.engine, &event.key, text) {
                        callback(event.engine, &event.key, Some(value));
                    }
                }
            }
        });
        env.subscribe(listener)
    }

    /// Changes to `key` relevant to a binding persisting to `engine`.
    ///
    /// Direct: events from the same engine, absent values included.
    /// Signal channel: durable events carrying a value; the removal half
    /// of a pulse is ignored.
    pub fn watch(
        &self,
        engine: PersistEngine,
        key: &str,
        callback: impl Fn(Option<Value>) + Send + Sync + 'static,
    ) -> Subscription {
        let key = key.to_string();
        let strategy = self.strategy;
        self.on_change(move |event_engine, event_key, value| {
            if event_key != key {
                return;
            }
            match strategy {
                SignalStrategy::Direct if event_engine == engine => callback(value),
                SignalStrategy::SignalChannel if event_engine == PersistEngine::Durable => {
                    if value.is_some() {
                        callback(value);
                    }
                }
                _ => {}
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::Origin;
    use serde_json::json;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<Option<Value>>>>;

    fn signal_for(origin: &Origin, strategy: SignalStrategy) -> CrossTabSignal {
        let ctx = origin.open_context().unwrap();
        CrossTabSignal::new(StorageAdapter::new(ctx), strategy)
    }

    fn watcher(signal: &CrossTabSignal, engine: PersistEngine, key: &str) -> (Subscription, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = signal.watch(engine, key, move |value| sink.lock().unwrap().push(value));
        (sub, seen)
    }

    #[test]
    fn direct_emit_reaches_other_context_only() {
        let origin = Origin::in_memory().unwrap();
        let a = signal_for(&origin, SignalStrategy::Direct);
        let b = signal_for(&origin, SignalStrategy::Direct);
        let (_sa, seen_a) = watcher(&a, PersistEngine::Durable, "app:theme");
        let (_sb, seen_b) = watcher(&b, PersistEngine::Durable, "app:theme");

        a.emit(PersistEngine::Durable, "app:theme", &json!("dark"));

        assert!(seen_a.lock().unwrap().is_empty());
        assert_eq!(*seen_b.lock().unwrap(), vec![Some(json!("dark"))]);
    }

    #[test]
    fn only_ephemeral_pulse_needs_a_separate_emit() {
        let origin = Origin::in_memory().unwrap();
        let direct = signal_for(&origin, SignalStrategy::Direct);
        let channel = signal_for(&origin, SignalStrategy::SignalChannel);

        assert!(direct.carried_by_write(PersistEngine::Durable));
        assert!(direct.carried_by_write(PersistEngine::Ephemeral));
        assert!(channel.carried_by_write(PersistEngine::Durable));
        assert!(!channel.carried_by_write(PersistEngine::Ephemeral));
    }

    #[test]
    fn watch_filters_other_keys() {
        let origin = Origin::in_memory().unwrap();
        let a = signal_for(&origin, SignalStrategy::Direct);
        let b = signal_for(&origin, SignalStrategy::Direct);
        let (_sb, seen_b) = watcher(&b, PersistEngine::Durable, "app:x1:name");

        a.emit(PersistEngine::Durable, "app:x2:name", &json!("other scope"));
        assert!(seen_b.lock().unwrap().is_empty());
    }

    #[test]
    fn direct_ephemeral_stays_local() {
        let origin = Origin::in_memory().unwrap();
        let a = signal_for(&origin, SignalStrategy::Direct);
        let b = signal_for(&origin, SignalStrategy::Direct);
        let (_sb, seen_b) = watcher(&b, PersistEngine::Ephemeral, "k");

        assert!(!a.reaches_other_contexts(PersistEngine::Ephemeral));
        a.emit(PersistEngine::Ephemeral, "k", &json!(1));
        assert!(seen_b.lock().unwrap().is_empty());
    }

    #[test]
    fn signal_channel_pulses_without_residue() {
        let origin = Origin::in_memory().unwrap();
        let a = signal_for(&origin, SignalStrategy::SignalChannel);
        let b = signal_for(&origin, SignalStrategy::SignalChannel);
        let (_sb, seen_b) = watcher(&b, PersistEngine::Ephemeral, "k");

        assert!(a.reaches_other_contexts(PersistEngine::Ephemeral));
        a.emit(PersistEngine::Ephemeral, "k", &json!({"v": 2}));

        assert_eq!(*seen_b.lock().unwrap(), vec![Some(json!({"v": 2}))]);
        assert!(origin.durable().get("k").unwrap().is_none());
    }

    #[test]
    fn direct_watch_reports_removal_as_absent() {
        let origin = Origin::in_memory().unwrap();
        let a_ctx = origin.open_context().unwrap();
        let a = CrossTabSignal::new(StorageAdapter::new(a_ctx.clone()), SignalStrategy::Direct);
        let b = signal_for(&origin, SignalStrategy::Direct);
        let (_sb, seen_b) = watcher(&b, PersistEngine::Durable, "k");

        a.emit(PersistEngine::Durable, "k", &json!(1));
        StorageAdapter::new(a_ctx).remove(PersistEngine::Durable, "k");

        assert_eq!(*seen_b.lock().unwrap(), vec![Some(json!(1)), None]);
    }

    #[test]
    fn malformed_event_is_skipped() {
        let origin = Origin::in_memory().unwrap();
        let a_ctx = origin.open_context().unwrap();
        let b = signal_for(&origin, SignalStrategy::Direct);
        let (_sb, seen_b) = watcher(&b, PersistEngine::Durable, "k");

        use crate::origin::StorageEnvironment;
        a_ctx.set(PersistEngine::Durable, "k", "{oops").unwrap();
        assert!(seen_b.lock().unwrap().is_empty());
    }

    #[test]
    fn without_storage_watch_is_inert() {
        let signal = CrossTabSignal::new(StorageAdapter::unavailable(), SignalStrategy::Direct);
        assert!(!signal.reaches_other_contexts(PersistEngine::Durable));
        let _sub = signal.watch(PersistEngine::Durable, "k", |_| panic!("no events expected"));
        signal.emit(PersistEngine::Durable, "k", &json!(1));
    }
}
