//! Paced byte-by-byte transfers.

use std::io::{self, Write};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, info, warn};

use crate::config::DeviceSettings;
use crate::device::{SendStatus, SerialConnector, SerialPortConnector, StopSignal, TransferProgress};
use crate::error::{FunzlError, Result};
use crate::serialization::{encode_notes_text, encode_song, STOP_COMMAND};
use crate::song::{Note, Song};

/// Callback receiving transfer progress.
pub type ProgressCallback<'a> = &'a mut dyn FnMut(TransferProgress);

/// Sends payloads through a [`SerialConnector`].
#[derive(Debug, Clone)]
pub struct Uploader<C> {
    connector: C,
    settings: DeviceSettings,
}

impl Uploader<SerialPortConnector> {
    /// Uploader for the operating system's serial ports.
    pub fn serial(settings: DeviceSettings) -> Self {
        Self::new(SerialPortConnector::new(settings.clone()), settings)
    }
}

impl<C: SerialConnector> Uploader<C> {
    pub fn new(connector: C, settings: DeviceSettings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    /// Upload the song's channel assignments as a binary payload.
    pub fn send_song(
        &self,
        song: &Song,
        progress: Option<ProgressCallback<'_>>,
        stop: Option<&StopSignal>,
    ) -> Result<SendStatus> {
        let payload = encode_song(song)?;
        info!("Sending song '{}' ({} bytes)", song.name(), payload.len());
        self.send_payload(&payload, progress, stop)
    }

    /// Upload a subset of notes in the text protocol, timed from `start_us`
    /// (the earliest note start when `None`).
    pub fn send_notes(
        &self,
        notes: &[Note],
        start_us: Option<u64>,
        progress: Option<ProgressCallback<'_>>,
        stop: Option<&StopSignal>,
    ) -> Result<SendStatus> {
        match encode_notes_text(notes, start_us) {
            Some(text) => {
                debug!("Notes payload: {:?}", text);
                self.send_payload(text.as_bytes(), progress, stop)
            }
            None => Ok(SendStatus::NothingToSend),
        }
    }

    /// Silence the board.
    pub fn send_stop(&self) -> Result<SendStatus> {
        self.send_payload(&STOP_COMMAND, None, None)
    }

    /// Write `payload` to the first candidate port.
    pub fn send_payload(
        &self,
        payload: &[u8],
        mut progress: Option<ProgressCallback<'_>>,
        stop: Option<&StopSignal>,
    ) -> Result<SendStatus> {
        if payload.is_empty() {
            return Ok(SendStatus::NothingToSend);
        }
        let Some(port) = self.connector.candidates()?.into_iter().next() else {
            warn!("No serial USB device found");
            return Ok(SendStatus::NoDevice);
        };

        let mut sink = self.connector.open(&port)?;
        info!("Sending {} bytes to {}", payload.len(), port);

        let total = payload.len();
        let poll_every = self.settings.stop_poll_bytes.max(1);
        let interval = self.settings.progress_interval();
        let delay = self.settings.byte_delay();
        let mut last_report: Option<Instant> = None;

        for (sent, byte) in payload.iter().enumerate() {
            if sent % poll_every == 0 && stop.is_some_and(StopSignal::is_raised) {
                info!("Transfer to {} stopped after {} of {} bytes", port, sent, total);
                return Ok(SendStatus::Stopped { port, sent, total });
            }
            if let Some(report) = progress.as_mut() {
                if last_report.map_or(true, |at| at.elapsed() >= interval) {
                    report(TransferProgress { sent, total });
                    last_report = Some(Instant::now());
                }
            }
            sink.write_all(std::slice::from_ref(byte))
                .map_err(|source| FunzlError::Transfer {
                    sent,
                    total,
                    source,
                })?;
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
        sink.flush().map_err(|source| FunzlError::Transfer {
            sent: total,
            total,
            source,
        })?;

        info!("Sent {} bytes to {}", total, port);
        Ok(SendStatus::Sent { port })
    }
}

/// Upload a song to the first board found.
pub fn send_song(
    song: &Song,
    settings: &DeviceSettings,
    progress: Option<ProgressCallback<'_>>,
) -> Result<SendStatus> {
    Uploader::serial(settings.clone()).send_song(song, progress, None)
}

/// Upload notes in the text protocol to the first board found.
pub fn send_notes(
    notes: &[Note],
    start_us: Option<u64>,
    settings: &DeviceSettings,
    progress: Option<ProgressCallback<'_>>,
) -> Result<SendStatus> {
    Uploader::serial(settings.clone()).send_notes(notes, start_us, progress, None)
}

/// Silence the first board found.
pub fn send_stop(settings: &DeviceSettings) -> Result<SendStatus> {
    Uploader::serial(settings.clone()).send_stop()
}

/// A transfer running on a worker thread.
#[derive(Debug)]
pub struct SendHandle {
    thread: JoinHandle<Result<SendStatus>>,
    stop: StopSignal,
}

impl SendHandle {
    /// Ask the transfer to stop at its next poll.
    pub fn stop(&self) {
        self.stop.raise();
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the transfer to finish.
    pub fn join(self) -> Result<SendStatus> {
        self.thread.join().unwrap_or_else(|_| {
            Err(FunzlError::Io(io::Error::new(
                io::ErrorKind::Other,
                "send thread panicked",
            )))
        })
    }
}

/// Run a transfer on a worker thread.
pub fn spawn_send<C>(
    uploader: Uploader<C>,
    payload: Vec<u8>,
    progress: Option<Box<dyn FnMut(TransferProgress) + Send>>,
) -> SendHandle
where
    C: SerialConnector + Send + 'static,
{
    let stop = StopSignal::new();
    let signal = stop.clone();
    let thread = thread::spawn(move || {
        let mut progress = progress;
        let mut report = |p: TransferProgress| {
            if let Some(callback) = progress.as_mut() {
                callback(p);
            }
        };
        uploader.send_payload(&payload, Some(&mut report), Some(&signal))
    });
    SendHandle { thread, stop }
}
