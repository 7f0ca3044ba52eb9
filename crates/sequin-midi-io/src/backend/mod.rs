//! Backend capability interface.
//!
//! A [`MidiBackend`] discovers endpoints and opens them; each opened
//! endpoint is a [`PortIo`] owned by exactly one [`Port`](crate::Port).
//! Backends are chosen at startup by name through a [`BackendRegistry`].

mod bridge;
mod memory;
#[cfg(feature = "midi-io")]
mod midir;
mod registry;

pub use self::bridge::{BridgeBackend, RtCallback};
pub use self::memory::MemoryBackend;
#[cfg(feature = "midi-io")]
pub use self::midir::MidirBackend;
pub use self::registry::{BackendFactory, BackendRegistry};

use crate::bridge::{BridgeStatsSnapshot, InputFrame};
use crate::port::{PortDescriptor, PortDirection};
use crate::Result;
use sequin_core::{ClockMode, SequencerConfig};

/// One opened endpoint.
///
/// Called only from control threads, under the owning port's lock.
pub trait PortIo: Send {
    /// Hands one encoded message to the backend.
    fn send(&mut self, bytes: &[u8]) -> bool;

    fn flush(&mut self) -> bool {
        true
    }

    /// Next received frame, if this is an input endpoint.
    fn poll_input(&mut self) -> Option<InputFrame> {
        None
    }

    fn pending_input(&self) -> usize {
        0
    }

    fn set_clock_mode(&mut self, _mode: ClockMode) {}

    /// Real-time bridge counters, for backends that have one.
    fn stats(&self) -> Option<BridgeStatsSnapshot> {
        None
    }

    fn close(&mut self) {}
}

pub trait MidiBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Endpoints currently offered by the backend.
    fn enumerate(&self) -> Result<Vec<PortDescriptor>>;

    fn open(&self, port: &PortDescriptor, config: &SequencerConfig) -> Result<Box<dyn PortIo>>;

    /// Creates an application-owned endpoint other clients can connect to.
    fn create_virtual(
        &self,
        name: &str,
        direction: PortDirection,
        config: &SequencerConfig,
    ) -> Result<(PortDescriptor, Box<dyn PortIo>)>;

    /// Real-time halves a host's process callback must drive, for backends
    /// that run one. Each call hands over what was opened since the last.
    fn take_rt_callback(&self) -> Option<RtCallback> {
        None
    }
}
