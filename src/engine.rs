//! MidiEngine that owns the backend, the port router and the input thread.

use crate::MidiEngineBuilder;
use crossbeam_channel::Receiver;
use sequin_core::{Pulse, SequencerConfig};
use sequin_midi_io::{
    InboundEvent, InputPoller, MidiBackend, PortRouter, RecordTarget, RtCallback,
    TimelineRecorder,
};
use std::sync::Arc;

/// Running MIDI transport.
///
/// Playback and clock go through [`router`](Self::router). Received events
/// that no armed recorder took arrive on [`events`](Self::events).
///
/// # Example
///
/// ```ignore
/// use sequin::prelude::*;
///
/// let engine = MidiEngine::builder().backend_name("memory").build()?;
/// let recorder = engine.recorder(768);
/// engine.arm(recorder.clone());
///
/// engine.router().init_clock(0);
/// engine.router().emit_clock(96);
///
/// for inbound in engine.events().try_iter() {
///     println!("bus {}: {:?}", inbound.bus, inbound.event);
/// }
/// ```
pub struct MidiEngine {
    config: SequencerConfig,
    backend: Arc<dyn MidiBackend>,
    router: Arc<PortRouter>,
    events: Receiver<InboundEvent>,
    poller: Option<InputPoller>,
    shut_down: bool,
}

impl MidiEngine {
    pub fn builder() -> MidiEngineBuilder {
        MidiEngineBuilder::default()
    }

    pub(crate) fn new(
        config: SequencerConfig,
        backend: Arc<dyn MidiBackend>,
        router: Arc<PortRouter>,
        events: Receiver<InboundEvent>,
        poller: Option<InputPoller>,
    ) -> Self {
        Self {
            config,
            backend,
            router,
            events,
            poller,
            shut_down: false,
        }
    }

    pub fn router(&self) -> &Arc<PortRouter> {
        &self.router
    }

    pub fn events(&self) -> &Receiver<InboundEvent> {
        &self.events
    }

    pub fn backend(&self) -> &Arc<dyn MidiBackend> {
        &self.backend
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Real-time halves of the ports opened so far, for the host's process
    /// callback to drive. `None` unless the backend runs one, as `bridge` does.
    pub fn take_rt_callback(&self) -> Option<RtCallback> {
        self.backend.take_rt_callback()
    }

    /// True while the input thread is alive.
    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(InputPoller::is_running)
    }

    /// Recorder for a pattern of `length` pulses, linking notes the way the
    /// engine's configuration asks.
    pub fn recorder(&self, length: Pulse) -> Arc<TimelineRecorder> {
        Arc::new(TimelineRecorder::from_config(length, &self.config))
    }

    /// Arms `target` for recording. See [`PortRouter::set_sequence_input`].
    pub fn arm(&self, target: Arc<dyn RecordTarget>) -> bool {
        self.router.set_sequence_input(true, Some(target))
    }

    pub fn disarm(&self, target: Arc<dyn RecordTarget>) -> bool {
        self.router.set_sequence_input(false, Some(target))
    }

    /// Stops the clock, joins the input thread and closes every port.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.router.stop();
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
        self.router.close_all();
        tracing::debug!("MIDI engine shut down");
    }
}

impl Drop for MidiEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MidiEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiEngine")
            .field("backend", &self.backend.name())
            .field("router", &self.router)
            .field("polling", &self.is_polling())
            .finish()
    }
}
