//! Name-to-constructor table for backends.

use super::{BridgeBackend, MemoryBackend, MidiBackend};
use crate::{Error, Result};
use sequin_core::SequencerConfig;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type BackendFactory =
    Box<dyn Fn(&SequencerConfig) -> Result<Arc<dyn MidiBackend>> + Send + Sync>;

/// Backends selectable by the `backend` config key.
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl BackendRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// `memory`, `bridge`, and `midir` when built with `midi-io`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("memory", |_| Ok(Arc::new(MemoryBackend::new())));
        registry.register("bridge", |_| Ok(Arc::new(BridgeBackend::new())));
        #[cfg(feature = "midi-io")]
        registry.register("midir", |config| {
            Ok(Arc::new(super::MidirBackend::new(config.client_name.clone())))
        });
        registry
    }

    /// Adds or replaces the constructor for `name`.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&SequencerConfig) -> Result<Arc<dyn MidiBackend>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn create(&self, name: &str, config: &SequencerConfig) -> Result<Arc<dyn MidiBackend>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::UnknownBackend(name.to_string()))?;
        let backend = factory(config)?;
        tracing::debug!("Created MIDI backend '{}'", name);
        Ok(backend)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
