//! Storage engines and cross-context signaling.
//!
//! Backed by [redb](https://docs.rs/redb). The durable engine is an on-disk
//! (or in-memory, for tests) database shared by every context of an
//! [`Origin`]; the ephemeral engine is a per-context in-memory database.
//!
//! # Layers
//!
//! - [`StorageArea`]: raw text key/value engine.
//! - [`StorageEnvironment`]: two engines plus a change feed that only
//!   reports writes made by other contexts. [`Context`] implements it.
//! - [`StorageAdapter`]: JSON encode/decode with error containment.
//! - [`CrossTabSignal`]: turns a local write into an event other contexts
//!   observe.

pub mod adapter;
pub mod area;
pub mod error;
pub mod origin;
pub mod signal;
pub mod tables;

pub use adapter::StorageAdapter;
pub use area::{RedbArea, StorageArea};
pub use error::{StorageError, StorageResult};
pub use origin::{ChangeListener, Context, ContextId, Origin, StorageEnvironment, StorageEvent};
pub use signal::CrossTabSignal;
