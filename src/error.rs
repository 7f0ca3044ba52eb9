//! Centralized error type for the sequin umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] sequin_core::Error),

    #[error("MIDI: {0}")]
    Midi(#[from] sequin_midi::Error),

    #[error("Transport: {0}")]
    Transport(#[from] sequin_midi_io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
