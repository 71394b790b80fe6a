//! Provider configuration, loadable from TOML.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::options::BindingOptions;
use crate::scope::DEFAULT_PREFIX;

/// How cross-context change notifications are relayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalStrategy {
    /// Relay through the binding's own persist engine.
    #[default]
    Direct,
    /// Pulse the value through the durable engine (write, then remove)
    /// when the binding persists ephemerally.
    SignalChannel,
}

/// Options pre-registered with a provider for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDefaults {
    pub key: String,
    #[serde(flatten)]
    pub options: BindingOptions,
}

impl KeyDefaults {
    pub fn new(key: impl Into<String>, options: BindingOptions) -> Self {
        Self {
            key: key.into(),
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub defaults: Vec<KeyDefaults>,
    #[serde(default)]
    pub signal: SignalStrategy,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            defaults: Vec::new(),
            signal: SignalStrategy::default(),
        }
    }
}

impl ProviderConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// First registered defaults for `key`, in declaration order.
    pub fn defaults_for(&self, key: &str) -> Option<&BindingOptions> {
        self.defaults
            .iter()
            .find(|d| d.key == key)
            .map(|d| &d.options)
    }

    /// Merge call-site `options` over the registered defaults for `key`.
    pub fn options_for(&self, key: &str, options: BindingOptions) -> BindingOptions {
        match self.defaults_for(key) {
            Some(defaults) => options.merged_over(defaults),
            None => options,
        }
    }
}
