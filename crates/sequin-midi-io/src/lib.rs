//! MIDI transport for the sequin sequencer.
//!
//! Provides ports with MIDI clock generation, the port router with recording
//! fan-out, the lock-free bridge to real-time callbacks, and the backends
//! that reach actual devices.
//!
//! Feature gates: `midi-io` (hardware I/O through midir).

pub mod error;
pub use error::{Error, Result};

pub mod bridge;
pub use bridge::{
    frame_ring, input_queue, BridgeStats, BridgeStatsSnapshot, EventSink, FrameReader,
    FrameWriter, InputFrame, InputOutcome, InputQueue, PeriodBuffer, RtInput,
};

pub mod backend;
pub use backend::{
    BackendFactory, BackendRegistry, BridgeBackend, MemoryBackend, MidiBackend, PortIo,
    RtCallback,
};
#[cfg(feature = "midi-io")]
pub use backend::MidirBackend;

pub mod port;
pub use port::{Port, PortDescriptor, PortDirection, PortId, PortInfo, PortKind};

pub mod status;
pub use status::{ClockList, InputList, PortStatus, StatusList};

mod router;
pub use router::{InboundEvent, PortNaming, PortRouter, RecordTarget, RouterSnapshot, MAX_BUSES};

mod recorder;
pub use recorder::TimelineRecorder;

mod poller;
pub use poller::InputPoller;

pub use sequin_core::{ClockMode, RecordMode, SequencerConfig};
pub use sequin_midi::{TimedEvent, WireBytes};
