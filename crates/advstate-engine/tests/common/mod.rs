//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use advstate_core::{Location, ProviderConfig, SignalStrategy};
use advstate_engine::Provider;
use advstate_storage::{Context, Origin, RedbArea, StorageArea, StorageResult};

/// Durable area that records every write it receives.
#[derive(Clone)]
pub struct CountingArea {
    inner: RedbArea,
    pub writes: Arc<Mutex<Vec<(String, String)>>>,
}

impl CountingArea {
    pub fn new() -> Self {
        Self {
            inner: RedbArea::open_in_memory().unwrap(),
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn writes_to(&self, key: &str) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl StorageArea for CountingArea {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        self.inner.remove(key)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.inner.keys()
    }
}

pub fn counting_origin() -> (Origin, CountingArea) {
    let area = CountingArea::new();
    (Origin::new(area.clone()), area)
}

pub fn config(prefix: &str) -> ProviderConfig {
    ProviderConfig {
        prefix: prefix.to_string(),
        ..ProviderConfig::default()
    }
}

pub fn provider_in(ctx: &Arc<Context>, config: ProviderConfig, location: &str) -> Provider {
    Provider::new(config)
        .with_storage(ctx.clone())
        .with_location(Location::parse(location).unwrap())
}

pub fn signal_channel(prefix: &str) -> ProviderConfig {
    ProviderConfig {
        prefix: prefix.to_string(),
        signal: SignalStrategy::SignalChannel,
        ..ProviderConfig::default()
    }
}
