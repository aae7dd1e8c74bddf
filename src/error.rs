//! # Error Types
//!
//! Custom error types for the CI-V engine using `thiserror`.

use thiserror::Error;

/// Classification of a frame that could not be decoded.
///
/// Each kind is counted separately by the engine statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameErrorKind {
    /// Length, preamble or terminator check failed
    StructuralInvalid,
    /// Embedded preamble inside the frame body
    Corrupted,
    /// Decoder buffer filled up before a terminator arrived
    Overflow,
}

/// Decode and validation failures for a single candidate frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer bytes than the smallest legal frame
    #[error("frame too short: {len} bytes (minimum 6)")]
    TooShort { len: usize },

    /// More bytes than the decoder or hex boundary accepts
    #[error("frame too long: {len} bytes (maximum {max})")]
    TooLong { len: usize, max: usize },

    /// First two bytes are not `FE FE`
    #[error("invalid preamble: {0:02X} {1:02X}")]
    BadPreamble(u8, u8),

    /// Last byte is not `FD`
    #[error("invalid terminator: expected FD, got {0:02X}")]
    MissingTerminator(u8),

    /// A second `FE FE` pair inside the body
    #[error("embedded preamble at offset {offset}")]
    Corrupted { offset: usize },

    /// No terminator before the buffer filled up
    #[error("no terminator within {capacity} bytes")]
    Overflow { capacity: usize },
}

impl FrameError {
    /// Map the error onto the counter it belongs to
    pub fn kind(&self) -> FrameErrorKind {
        match self {
            FrameError::Corrupted { .. } => FrameErrorKind::Corrupted,
            FrameError::Overflow { .. } => FrameErrorKind::Overflow,
            FrameError::TooShort { .. }
            | FrameError::TooLong { .. }
            | FrameError::BadPreamble(..)
            | FrameError::MissingTerminator(_) => FrameErrorKind::StructuralInvalid,
        }
    }
}

/// Main error type for the CI-V engine
#[derive(Debug, Error)]
pub enum CivError {
    /// Frame decode/validation errors
    #[error("CI-V frame error: {0}")]
    Frame(#[from] FrameError),

    /// Hex text received on the network transport could not be decoded
    #[error("Invalid hex text: {0}")]
    HexText(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Device identity cannot be used on the bus
    #[error("Invalid device identity: {0}")]
    InvalidIdentity(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the configured serial devices could be opened
    #[error("No serial port could be opened (tried: {0})")]
    SerialPortNotFound(String),

    /// Host persistence callback failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A reply was produced but there is nothing to send it on
    #[error("No transport available to send on")]
    NoTransport,
}

/// Result type alias for the CI-V engine
pub type Result<T> = std::result::Result<T, CivError>;
