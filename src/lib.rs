//! # Sequin - Real-time MIDI Sequencer Transport
//!
//! The transport core of a MIDI sequencer: events and pattern timelines,
//! ports that generate MIDI clock, a router that broadcasts transport and
//! fans recorded input out to patterns, and a lock-free bridge to
//! real-time audio callbacks.
//!
//! ## Architecture
//!
//! Sequin is an umbrella crate that coordinates:
//! - **sequin-core** - Configuration context, timing utilities, lock-free counters
//! - **sequin-midi** - Timed events and linked event timelines
//! - **sequin-midi-io** - Ports, clock, router, real-time bridge and backends
//!
//! ## Quick Start
//!
//! ```ignore
//! use sequin::prelude::*;
//!
//! let engine = MidiEngine::builder()
//!     .backend_name("midir")
//!     .ppqn(192)
//!     .build()?;
//!
//! let router = engine.router();
//! router.set_clock(0, ClockMode::Pos);
//! router.init_clock(0);
//! router.play(0, &TimedEvent::note_on(0, 0, 60, 100), 0);
//! router.emit_clock(48);
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Hardware MIDI through midir
//! - `midi-io` - Hardware MIDI through midir

/// Re-export of sequin-core for direct access
pub use sequin_core as core;

/// Re-export of sequin-midi for direct access
pub use sequin_midi as midi;

/// Re-export of sequin-midi-io for direct access
pub use sequin_midi_io as io;

pub use sequin_core::{timing, ClockMode, Pulse, RecordMode, SequencerConfig};

pub use sequin_midi::{status, EventRef, EventTimeline, LinkReport, TimedEvent};

pub use sequin_midi_io::{
    BackendRegistry, BridgeBackend, ClockList, InboundEvent, InputList, MemoryBackend,
    MidiBackend, PortInfo, PortRouter, RecordTarget, RouterSnapshot, RtCallback,
    TimelineRecorder,
};

#[cfg(feature = "midi-io")]
pub use sequin_midi_io::MidirBackend;

mod error;
pub use error::{Error, Result};

mod builder;
mod engine;

pub use builder::{MidiEngineBuilder, DEFAULT_EVENT_CAPACITY};
pub use engine::MidiEngine;

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{MidiEngine, MidiEngineBuilder};

    pub use crate::{ClockMode, EventTimeline, Pulse, RecordMode, SequencerConfig, TimedEvent};

    pub use crate::{InboundEvent, PortRouter, RecordTarget, TimelineRecorder};

    pub use crate::{BridgeBackend, MemoryBackend, MidiBackend};

    pub use std::sync::Arc;
}
