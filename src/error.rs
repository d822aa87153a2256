//! Error handling for Funzl
//!
//! Every fallible operation in the crate returns [`Result`]. Malformed song
//! files are the one failure that is usually recovered locally; see
//! [`crate::serialization::load`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Funzl operations
pub type Result<T> = std::result::Result<T, FunzlError>;

/// Main error type for Funzl operations
#[derive(Error, Debug)]
pub enum FunzlError {
    // File Errors
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Failed to read file: {}: {source}", path.display())]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {}: {source}", path.display())]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Input Errors
    #[error("Malformed song data: {reason}")]
    MalformedInput { reason: String },

    #[error("Invalid MIDI file: {0}")]
    Midi(#[from] midly::Error),

    #[error("Unsupported MIDI timing: {reason}")]
    UnsupportedTiming { reason: String },

    // Model Errors
    #[error("Invalid note {field}: {value} (expected 0..=127)")]
    InvalidNote { field: &'static str, value: u32 },

    #[error("Track not found: {index}")]
    TrackNotFound { index: usize },

    #[error("Note not found: track {track}, note {index}")]
    NoteNotFound { track: usize, index: usize },

    // Export Errors
    #[error("{field} {value} does not fit the device format")]
    ValueOutOfRange { field: &'static str, value: u64 },

    // Device Errors
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Transfer failed after {sent} of {total} bytes: {source}")]
    Transfer {
        sent: usize,
        total: usize,
        #[source]
        source: std::io::Error,
    },

    // Configuration Errors
    #[error("Invalid configuration {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FunzlError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            FunzlError::FileNotFound { .. } => "FILE_NOT_FOUND",
            FunzlError::FileReadError { .. } => "FILE_READ_ERROR",
            FunzlError::FileWriteError { .. } => "FILE_WRITE_ERROR",
            FunzlError::MalformedInput { .. } => "MALFORMED_INPUT",
            FunzlError::Midi(_) => "INVALID_MIDI",
            FunzlError::UnsupportedTiming { .. } => "UNSUPPORTED_TIMING",
            FunzlError::InvalidNote { .. } => "INVALID_NOTE",
            FunzlError::TrackNotFound { .. } => "TRACK_NOT_FOUND",
            FunzlError::NoteNotFound { .. } => "NOTE_NOT_FOUND",
            FunzlError::ValueOutOfRange { .. } => "VALUE_OUT_OF_RANGE",
            FunzlError::Serial(_) => "SERIAL_ERROR",
            FunzlError::Transfer { .. } => "TRANSFER_FAILURE",
            FunzlError::Config { .. } => "CONFIG_ERROR",
            FunzlError::Io(_) => "IO_ERROR",
            FunzlError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Returns a user-facing recovery suggestion, if there is one.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            FunzlError::FileNotFound { .. } => Some("Check the file path and try again."),
            FunzlError::UnsupportedTiming { .. } => {
                Some("Re-export the MIDI file with metrical (ticks per beat) timing.")
            }
            FunzlError::ValueOutOfRange { .. } => {
                Some("The device stores times as 32-bit microseconds; shorten the song.")
            }
            FunzlError::Serial(_) | FunzlError::Transfer { .. } => {
                Some("Reconnect the board and send again.")
            }
            _ => None,
        }
    }
}
