//! Error types for sequin-core.

use thiserror::Error;

/// Error type for sequin-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid tempo: {0}. Must be between 2.0 and 600.0 BPM")]
    InvalidTempo(f64),

    #[error("Invalid PPQN: {0}. Must be between 32 and 19200")]
    InvalidPpqn(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
