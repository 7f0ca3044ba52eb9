//! Builder for configuring and constructing a `MidiEngine`.

use crate::{MidiEngine, Result};
use sequin_core::{RecordMode, SequencerConfig};
use sequin_midi_io::{BackendRegistry, InputPoller, MidiBackend, PortRouter};
use std::sync::Arc;

/// Default capacity of the channel carrying events that were not recorded.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// The backend is chosen by name from a [`BackendRegistry`] unless one is
/// handed over directly with [`backend`](Self::backend).
///
/// # Example
///
/// ```ignore
/// use sequin::prelude::*;
///
/// let engine = MidiEngine::builder()
///     .backend_name("memory")
///     .ppqn(192)
///     .bpm(120.0)
///     .build()?;
///
/// engine.router().start();
/// ```
pub struct MidiEngineBuilder {
    config: SequencerConfig,
    registry: BackendRegistry,
    backend: Option<Arc<dyn MidiBackend>>,
    event_capacity: usize,
    input_thread: bool,
}

impl Default for MidiEngineBuilder {
    fn default() -> Self {
        Self {
            config: SequencerConfig::default(),
            registry: BackendRegistry::with_defaults(),
            backend: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            input_thread: true,
        }
    }
}

impl MidiEngineBuilder {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: SequencerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn backend_name(mut self, name: impl Into<String>) -> Self {
        self.config.backend = name.into();
        self
    }

    /// Uses `backend` as is; the `backend` config key is ignored.
    pub fn backend(mut self, backend: Arc<dyn MidiBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Makes another backend selectable by name.
    pub fn register_backend<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&SequencerConfig) -> sequin_midi_io::Result<Arc<dyn MidiBackend>>
            + Send
            + Sync
            + 'static,
    {
        self.registry.register(name, factory);
        self
    }

    /// Default: 192
    pub fn ppqn(mut self, ppqn: u32) -> Self {
        self.config.ppqn = ppqn;
        self
    }

    /// Default: 120.0
    pub fn bpm(mut self, bpm: f64) -> Self {
        self.config.bpm = bpm;
        self
    }

    pub fn record_mode(mut self, mode: RecordMode) -> Self {
        self.config.record_mode = mode;
        self
    }

    pub fn virtual_ports(mut self, outputs: usize, inputs: usize) -> Self {
        self.config.virtual_outputs = outputs;
        self.config.virtual_inputs = inputs;
        self
    }

    /// Default: 1024
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Skip the dedicated input thread; the caller polls the router itself.
    pub fn without_input_thread(mut self) -> Self {
        self.input_thread = false;
        self
    }

    pub fn build(self) -> Result<MidiEngine> {
        #[allow(unused_mut)]
        let mut config = self.config;
        config.validate()?;

        let backend = match self.backend {
            Some(backend) => backend,
            None => {
                #[cfg(not(feature = "midi-io"))]
                if config.backend == "midir" {
                    tracing::warn!("Built without midi-io; using the memory backend");
                    config.backend = "memory".to_string();
                }
                self.registry.create(&config.backend, &config)?
            }
        };

        let router = Arc::new(PortRouter::new(&config, backend.as_ref())?);
        let (tx, rx) = crossbeam_channel::bounded(self.event_capacity);
        let poller = self
            .input_thread
            .then(|| InputPoller::spawn(Arc::clone(&router), &config, tx));

        tracing::info!(
            "MIDI engine ready on '{}' ({} outputs, {} inputs)",
            backend.name(),
            router.output_count(),
            router.input_count()
        );

        Ok(MidiEngine::new(config, backend, router, rx, poller))
    }
}
