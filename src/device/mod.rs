//! Device Transport
//!
//! Uploads payloads to the buzzer board over a USB serial port:
//! - Discovery picks the first port matching the configured patterns
//! - Bytes are written one at a time with a pacing delay
//! - Progress is reported at a bounded rate
//! - A [`StopSignal`] aborts a transfer from another thread
//!
//! The port is opened for a single transfer and closed on every exit path.

mod connector;
mod uploader;

pub use connector::{SerialConnector, SerialPortConnector};
pub use uploader::{send_notes, send_song, send_stop, spawn_send, SendHandle, Uploader};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Outcome of a transfer that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendStatus {
    /// Every byte was written.
    Sent { port: String },
    /// No candidate port was found; nothing was opened.
    NoDevice,
    /// The payload was empty.
    NothingToSend,
    /// The stop signal was raised mid-transfer.
    Stopped {
        port: String,
        sent: usize,
        total: usize,
    },
}

impl SendStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendStatus::Sent { .. })
    }
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendStatus::Sent { port } => write!(f, "Sent to {}.", port),
            SendStatus::NoDevice => write!(f, "No serial USB device found."),
            SendStatus::NothingToSend => write!(f, "Nothing to send."),
            SendStatus::Stopped { port, sent, total } => {
                write!(f, "Stopped after {} of {} bytes on {}.", sent, total, port)
            }
        }
    }
}

/// Transfer progress passed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub sent: usize,
    pub total: usize,
}

impl TransferProgress {
    /// Fraction of bytes written, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.sent as f64 / self.total as f64
        }
    }
}

impl fmt::Display for TransferProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sending {:.2} %", self.fraction() * 100.0)
    }
}

/// Shared flag asking a running transfer to stop.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}
