//! Per-key state synchronization.
//!
//! A [`Provider`] owns a [`PublishStore`] and hands out [`StateBinding`]s.
//! Each binding exposes a value that updates synchronously on `set`, while
//! the side effects of a change (storage write, cross-context signal,
//! same-process publish) are coalesced by a [`DebounceCoordinator`].
//!
//! # Concurrency
//!
//! The engine is written for a single-threaded cooperative scheduler, but
//! every shared piece is `Send + Sync` so it also runs on tokio's
//! multi-threaded runtime. Debounce timers are tokio tasks, or a timer
//! thread when no runtime is running. No lock is held while a
//! listener runs, so listeners may freely call back into bindings and
//! stores.

pub mod binding;
pub mod debounce;
pub mod provider;
pub mod publish;

pub use binding::{BindingPhase, StateBinding};
pub use debounce::DebounceCoordinator;
pub use provider::Provider;
pub use publish::{PublishStore, StoreHandle};
