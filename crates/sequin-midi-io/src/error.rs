//! Error types for the MIDI transport layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown MIDI backend: {0}")]
    UnknownBackend(String),

    #[error("MIDI backend error: {0}")]
    Backend(String),

    #[error("MIDI port error: {0}")]
    MidiPort(String),

    #[error("MIDI device error: {0}")]
    MidiDevice(String),

    #[error("Port limit reached: at most {0} buses")]
    PortLimit(usize),

    #[error(transparent)]
    Core(#[from] sequin_core::Error),

    #[error(transparent)]
    Midi(#[from] sequin_midi::Error),
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::MidiDevice(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiOutput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
