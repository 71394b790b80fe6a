//! Provider: owns the publish store and hands out bindings.
//!
//! Every binding acquired through one provider shares its store, its key
//! prefix, its registered per-key defaults, and its storage environment.
//! Dropping the provider drops the store; bindings still alive after that
//! keep working as local state.

use std::sync::Arc;

use advstate_core::{BindingOptions, Location, ProviderConfig};
use advstate_storage::{StorageAdapter, StorageEnvironment};
use tracing::debug;

use crate::binding::{StateBinding, Wiring};
use crate::publish::PublishStore;

pub struct Provider {
    config: ProviderConfig,
    store: PublishStore,
    location: Location,
    storage: StorageAdapter,
}

impl Provider {
    /// Provider without storage (non-interactive contexts, tests).
    pub fn new(config: ProviderConfig) -> Self {
        debug!(prefix = %config.prefix, defaults = config.defaults.len(), "provider created");
        Self {
            config,
            store: PublishStore::new(),
            location: Location::default(),
            storage: StorageAdapter::unavailable(),
        }
    }

    /// Builder method: attach a storage environment.
    pub fn with_storage(mut self, env: Arc<dyn StorageEnvironment>) -> Self {
        self.storage = StorageAdapter::new(env);
        self
    }

    /// Builder method: set the location scopes are resolved against.
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Navigate. Only bindings acquired afterwards see the new location.
    pub fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn store(&self) -> &PublishStore {
        &self.store
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Acquire a binding for `key`. Call-site `options` win field by field
    /// over the defaults registered for `key`.
    pub fn bind(&self, key: &str, options: BindingOptions) -> StateBinding {
        let options = self.config.options_for(key, options);
        StateBinding::acquire(
            key,
            &options,
            Wiring {
                prefix: self.config.prefix.clone(),
                location: self.location.clone(),
                store: self.store.downgrade(),
                owned_store: None,
                adapter: self.storage.clone(),
                strategy: self.config.signal,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advstate_core::{KeyDefaults, NotifyMode, PersistEngine};
    use serde_json::json;

    #[test]
    fn bindings_use_provider_prefix() {
        let provider = Provider::new(ProviderConfig {
            prefix: "app".into(),
            ..ProviderConfig::default()
        });
        let binding = provider.bind("theme", BindingOptions::new());
        assert_eq!(binding.scoped_key(), "app:theme");
    }

    #[test]
    fn registered_defaults_apply() {
        let provider = Provider::new(ProviderConfig {
            defaults: vec![KeyDefaults::new(
                "theme",
                BindingOptions::new()
                    .with_initial("light")
                    .with_notify(NotifyMode::SameProcess),
            )],
            ..ProviderConfig::default()
        });
        let binding = provider.bind("theme", BindingOptions::new());
        assert_eq!(binding.value(), json!("light"));
        assert_eq!(binding.options().notify, Some(NotifyMode::SameProcess));
    }

    #[test]
    fn acquisition_primes_store() {
        let provider = Provider::new(ProviderConfig::default());
        let _binding = provider.bind("k", BindingOptions::new().with_initial(7));
        assert_eq!(provider.store().get("advState:k"), Some(json!(7)));
    }

    #[test]
    fn same_process_fan_out() {
        let provider = Provider::new(ProviderConfig::default());
        let opts = BindingOptions::new()
            .with_initial(0)
            .with_notify(NotifyMode::SameProcess);
        let a = provider.bind("count", opts.clone());
        let b = provider.bind("count", opts);

        a.set(5);
        assert_eq!(b.value(), json!(5));
        b.set(6);
        assert_eq!(a.value(), json!(6));
    }

    #[test]
    fn store_value_beats_initial_for_later_bindings() {
        let provider = Provider::new(ProviderConfig::default());
        let a = provider.bind(
            "k",
            BindingOptions::new()
                .with_initial("a")
                .with_notify(NotifyMode::SameProcess),
        );
        a.set("live");
        let b = provider.bind(
            "k",
            BindingOptions::new()
                .with_initial("b")
                .with_notify(NotifyMode::SameProcess),
        );
        assert_eq!(b.value(), json!("live"));
    }

    #[test]
    fn bindings_without_same_process_notify_stay_independent() {
        let provider = Provider::new(ProviderConfig::default());
        let a = provider.bind("k", BindingOptions::new().with_initial(1));
        let b = provider.bind("k", BindingOptions::new().with_initial(1));
        a.set(2);
        assert_eq!(b.value(), json!(1));
    }

    #[test]
    fn dropped_provider_degrades_to_local_state() {
        let provider = Provider::new(ProviderConfig::default());
        let binding = provider.bind(
            "k",
            BindingOptions::new()
                .with_initial(1)
                .with_notify(NotifyMode::SameProcess),
        );
        drop(provider);
        binding.set(2);
        assert_eq!(binding.value(), json!(2));
    }

    #[test]
    fn location_change_affects_later_bindings() {
        let mut provider = Provider::new(ProviderConfig::default())
            .with_location(Location::parse("/?appId=x1").unwrap());
        let opts = BindingOptions::new()
            .with_scope_by_query_param("appId")
            .with_persist(PersistEngine::Durable);
        let first = provider.bind("name", opts.clone());
        provider.set_location(Location::parse("/?appId=x2").unwrap());
        let second = provider.bind("name", opts);

        assert_eq!(first.scoped_key(), "advState:x1:name");
        assert_eq!(second.scoped_key(), "advState:x2:name");
    }
}
