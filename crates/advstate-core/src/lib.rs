//! Configuration and key identity for the advstate engine.
//!
//! Holds everything that is pure: the binding option surface and its merge
//! rules, provider configuration, the read-only [`Location`] view, and the
//! scope key resolver that maps `(prefix, scope source, key)` to the string
//! addressing a storage slot and a publish store entry.

pub mod config;
pub mod location;
pub mod options;
pub mod scope;
pub mod subscription;

pub use config::{KeyDefaults, ProviderConfig, SignalStrategy};
pub use location::Location;
pub use options::{BindingOptions, NotifyMode, PersistEngine, ResolvedOptions, ScopeSource};
pub use subscription::Subscription;
