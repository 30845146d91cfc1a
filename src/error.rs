//! Error types for the voice tutoring client

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio device errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device access denied: {0}")]
    AccessDenied(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),
}

/// Codec errors
///
/// `MalformedChunk` is the only non-fatal error in the system: a chunk
/// that fails to decode is dropped and the session carries on.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed chunk: {len} bytes does not divide into 16-bit frames for {channels} channel(s)")]
    MalformedChunk { len: usize, channels: u16 },

    #[error("Invalid transport encoding: {0}")]
    InvalidEncoding(String),
}

/// Remote channel errors
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Channel is not ready")]
    NotReady,

    #[error("Channel is closed")]
    Closed,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
