//! Error types for the MIDI data model.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid status byte: 0x{0:02X}")]
    InvalidStatus(u8),

    #[error("Truncated message: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("Payload of {len} bytes exceeds the {limit}-byte limit")]
    PayloadTooLarge { len: usize, limit: usize },

    #[error("MIDI parse error: {0}")]
    Parse(String),
}

impl From<midi_msg::ParseError> for Error {
    fn from(e: midi_msg::ParseError) -> Self {
        Error::Parse(format!("{:?}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
