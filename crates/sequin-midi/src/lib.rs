//! MIDI data model for the sequin sequencer.
//!
//! - [`TimedEvent`]: one MIDI message stamped with a pulse timestamp
//! - [`EventTimeline`]: the sorted event list of a pattern, with Note-On/Note-Off linking
//! - [`status`]: wire-level status bytes and meta sub-types
//!
//! # Example
//!
//! ```ignore
//! use sequin_midi::{EventTimeline, TimedEvent};
//!
//! let mut timeline = EventTimeline::with_length(768);
//! timeline.append(TimedEvent::note_on(0, 0, 60, 100));
//! timeline.append(TimedEvent::note_off(96, 0, 60, 0));
//! let report = timeline.verify_and_link(768);
//! assert_eq!(report.linked, 1);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod status;

mod event;
pub use event::{
    bpm_from_tempo_us, read_vlq, tempo_us_from_bpm, write_vlq, ByteContext, TimeSignature,
    TimedEvent, WireBytes, MAX_EX_DATA_LEN,
};

mod timeline;
pub use timeline::{EventRef, EventTimeline, LinkReport, DEFAULT_ZERO_LEN_CORRECTION};

pub use sequin_core::Pulse;

// Structured message types for callers using the midi-msg interop.
pub use midi_msg::{Channel, ChannelVoiceMsg, MidiMsg, SystemRealTimeMsg};
