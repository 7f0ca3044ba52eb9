//! Shared kernel for the sequin MIDI sequencer.
//!
//! # Primary API
//!
//! - [`SequencerConfig`]: Explicit configuration context handed to the port router
//! - [`ClockMode`] / [`RecordMode`]: Per-port clocking policy and recording fan-out mode
//! - [`timing`]: Monotonic clock reads, micro/millisecond sleeps, real-time priority
//! - [`AtomicFlag`] / [`AtomicCounter`]: Lock-free primitives safe to touch from a real-time callback
//!
//! # Example
//!
//! ```ignore
//! use sequin_core::{SequencerConfig, timing};
//!
//! let config = SequencerConfig::default().with_ppqn(192).with_bpm(120.0);
//! config.validate()?;
//!
//! let start = timing::microtime();
//! timing::microsleep(500);
//! assert!(timing::microtime() >= start);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{
    ClockMode, RecordMode, SequencerConfig, DEFAULT_BPM, DEFAULT_CLOCK_MOD, DEFAULT_PPQN,
};

pub mod timing;

pub(crate) mod lockfree;
pub use lockfree::{AtomicCounter, AtomicFlag};

/// Logical MIDI time in pulses (ticks). Signed so that "before start" is `-1`.
pub type Pulse = i64;
