//! Origins and execution contexts.
//!
//! An [`Origin`] owns the durable storage area shared by every context
//! (tab, window) opened on it, plus the list of change listeners. Each
//! [`Context`] gets its own ephemeral area. Durable writes that change a
//! record are dispatched as [`StorageEvent`]s to listeners of *other*
//! contexts; the writer never hears its own writes.
//!
//! Dispatch is synchronous: listeners run on the writer's call stack, after
//! the record has been committed and with no internal lock held.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use advstate_core::{PersistEngine, Subscription};
use tracing::debug;

use crate::area::{RedbArea, StorageArea};
use crate::error::StorageResult;

/// Identity of one execution context within an origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// A change observed in a storage engine by another context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub engine: PersistEngine,
    pub key: String,
    /// New record text, or `None` when the record was removed.
    pub new_value: Option<String>,
    /// Context that performed the write.
    pub source: ContextId,
}

pub type ChangeListener = Arc<dyn Fn(&StorageEvent) + Send + Sync>;

/// The storage environment a binding runs in: two engines plus a change feed.
///
/// Bindings only ever see this trait, so tests and embedders can supply
/// their own environment.
pub trait StorageEnvironment: Send + Sync {
    fn get(&self, engine: PersistEngine, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, engine: PersistEngine, key: &str, value: &str) -> StorageResult<()>;

    fn remove(&self, engine: PersistEngine, key: &str) -> StorageResult<()>;

    /// Receive changes made by other contexts until the subscription drops.
    fn subscribe(&self, listener: ChangeListener) -> Subscription;
}

struct ListenerSlot {
    id: u64,
    context: ContextId,
    callback: ChangeListener,
}

struct OriginInner {
    durable: Arc<dyn StorageArea>,
    listeners: Mutex<Vec<ListenerSlot>>,
    next_listener: AtomicU64,
    next_context: AtomicU64,
}

/// Shared durable storage plus the change-event bus for its contexts.
#[derive(Clone)]
pub struct Origin {
    inner: Arc<OriginInner>,
}

impl Origin {
    pub fn new(durable: impl StorageArea + 'static) -> Self {
        Self {
            inner: Arc::new(OriginInner {
                durable: Arc::new(durable),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                next_context: AtomicU64::new(0),
            }),
        }
    }

    /// Origin whose durable area lives on disk at `path`.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self::new(RedbArea::open(path)?))
    }

    /// Origin whose durable area lives in memory (tests, headless runs).
    pub fn in_memory() -> StorageResult<Self> {
        Ok(Self::new(RedbArea::open_in_memory()?))
    }

    /// Open a new execution context with a fresh ephemeral area.
    pub fn open_context(&self) -> StorageResult<Arc<Context>> {
        let id = ContextId(self.inner.next_context.fetch_add(1, Ordering::Relaxed));
        let ephemeral = RedbArea::open_in_memory()?;
        debug!(context = %id, "context opened");
        Ok(Arc::new(Context {
            id,
            origin: self.clone(),
            ephemeral: Arc::new(ephemeral),
        }))
    }

    pub fn durable(&self) -> &dyn StorageArea {
        self.inner.durable.as_ref()
    }

    /// Number of registered listeners across all contexts.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().expect("listeners lock").len()
    }

    fn register(&self, context: ContextId, callback: ChangeListener) -> Subscription {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .expect("listeners lock")
            .push(ListenerSlot {
                id,
                context,
                callback,
            });

        let weak: Weak<OriginInner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .listeners
                    .lock()
                    .expect("listeners lock")
                    .retain(|slot| slot.id != id);
            }
        })
    }

    fn dispatch(&self, event: StorageEvent) {
        let targets: Vec<ChangeListener> = {
            let listeners = self.inner.listeners.lock().expect("listeners lock");
            listeners
                .iter()
                .filter(|slot| slot.context != event.source)
                .map(|slot| slot.callback.clone())
                .collect()
        };
        debug!(
            key = %event.key,
            source = %event.source,
            listeners = targets.len(),
            "dispatching storage event"
        );
        for callback in targets {
            callback(&event);
        }
    }
}

/// One execution context (tab/window) of an origin.
pub struct Context {
    id: ContextId,
    origin: Origin,
    ephemeral: Arc<dyn StorageArea>,
}

impl Context {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    fn area(&self, engine: PersistEngine) -> &dyn StorageArea {
        match engine {
            PersistEngine::Durable => self.origin.durable(),
            PersistEngine::Ephemeral => self.ephemeral.as_ref(),
        }
    }
}

impl StorageEnvironment for Context {
    fn get(&self, engine: PersistEngine, key: &str) -> StorageResult<Option<String>> {
        self.area(engine).get(key)
    }

    fn set(&self, engine: PersistEngine, key: &str, value: &str) -> StorageResult<()> {
        let area = self.area(engine);
        if engine == PersistEngine::Ephemeral {
            return area.set(key, value);
        }

        let previous = area.get(key)?;
        area.set(key, value)?;
        if previous.as_deref() != Some(value) {
            self.origin.dispatch(StorageEvent {
                engine,
                key: key.to_string(),
                new_value: Some(value.to_string()),
                source: self.id,
            });
        }
        Ok(())
    }

    fn remove(&self, engine: PersistEngine, key: &str) -> StorageResult<()> {
        let existed = self.area(engine).remove(key)?;
        if existed && engine == PersistEngine::Durable {
            self.origin.dispatch(StorageEvent {
                engine,
                key: key.to_string(),
                new_value: None,
                source: self.id,
            });
        }
        Ok(())
    }

    fn subscribe(&self, listener: ChangeListener) -> Subscription {
        self.origin.register(self.id, listener)
    }
}
