//! Debounce coordinator: trailing-edge coalescing of side-effecting syncs.
//!
//! Each binding owns one coordinator. `schedule` with a zero delay syncs
//! immediately; otherwise it replaces any pending timer with a new one
//! carrying the newest payload, so exactly one sync fires `delay` after the
//! last call of a burst. Timers are tokio tasks when a runtime is around;
//! the handle lives in the coordinator and is aborted on cancel, reschedule
//! and drop. Outside a runtime a timer thread sleeps out the window instead.
//! Either way only the latest generation may claim the payload, so a
//! superseded or cancelled timer wakes up to find nothing to do.

use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

pub type SyncFn = Arc<dyn Fn(Value) + Send + Sync>;

enum Timer {
    Task(JoinHandle<()>),
    Thread,
}

impl Timer {
    fn stop(self) {
        if let Timer::Task(handle) = self {
            handle.abort();
        }
    }
}

/// The one outstanding sync, if any.
struct Pending {
    generation: u64,
    payload: Value,
    timer: Timer,
}

#[derive(Default)]
struct Slot {
    pending: Option<Pending>,
    generation: u64,
}

pub struct DebounceCoordinator {
    sync: SyncFn,
    slot: Arc<Mutex<Slot>>,
}

impl DebounceCoordinator {
    pub fn new(sync: impl Fn(Value) + Send + Sync + 'static) -> Self {
        Self {
            sync: Arc::new(sync),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Sync `payload` after `delay` of quiet, or right now if `delay` is zero.
    pub fn schedule(&self, delay: Duration, payload: Value) {
        if delay.is_zero() {
            self.cancel();
            (self.sync)(payload);
            return;
        }

        let mut slot = self.slot.lock().expect("debounce lock");
        slot.generation += 1;
        let generation = slot.generation;
        if let Some(previous) = slot.pending.take() {
            previous.timer.stop();
        }

        let weak = Arc::downgrade(&self.slot);
        let sync = self.sync.clone();
        let timer = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Timer::Task(runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                fire(&weak, generation, &sync);
            })),
            Err(_) => {
                debug!(?delay, "no async runtime; debouncing on a timer thread");
                thread::spawn(move || {
                    thread::sleep(delay);
                    fire(&weak, generation, &sync);
                });
                Timer::Thread
            }
        };

        slot.pending = Some(Pending {
            generation,
            payload,
            timer,
        });
    }

    /// Drop the pending sync, if any. Returns true if one was pending.
    pub fn cancel(&self) -> bool {
        let pending = self.slot.lock().expect("debounce lock").pending.take();
        match pending {
            Some(pending) => {
                pending.timer.stop();
                true
            }
            None => false,
        }
    }

    /// Fire the pending sync now. Returns true if one was pending.
    pub fn flush(&self) -> bool {
        let pending = self.slot.lock().expect("debounce lock").pending.take();
        match pending {
            Some(pending) => {
                pending.timer.stop();
                (self.sync)(pending.payload);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().expect("debounce lock").pending.is_some()
    }

    /// The payload the pending sync would carry.
    pub fn pending_payload(&self) -> Option<Value> {
        self.slot
            .lock()
            .expect("debounce lock")
            .pending
            .as_ref()
            .map(|p| p.payload.clone())
    }
}

/// Run the sync for `generation` if it is still the pending one.
fn fire(slot: &Weak<Mutex<Slot>>, generation: u64, sync: &SyncFn) {
    let Some(slot) = slot.upgrade() else {
        return;
    };
    // A newer schedule may have raced this wake-up.
    let payload = {
        let mut slot = slot.lock().expect("debounce lock");
        match slot.pending.take_if(|p| p.generation == generation) {
            Some(pending) => pending.payload,
            None => return,
        }
    };
    debug!(generation, "debounce window elapsed");
    sync(payload);
}

impl Drop for DebounceCoordinator {
    fn drop(&mut self) {
        self.cancel();
    }
}
