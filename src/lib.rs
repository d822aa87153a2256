//! Funzl - Buzzer Song Toolkit
//!
//! Songs for the Funzl board are played on three piezo buzzers. This crate
//! provides the pipeline from a MIDI file to the board:
//! 1. Import - Standard MIDI Files become a [`Song`] of tracks and notes
//! 2. Scheduling - notes are spread over the three buzzers without overlaps
//! 3. Export - JSON documents, serial payloads and firmware source tables
//! 4. Transport - paced uploads to the board over USB serial
//!
//! # Architecture
//!
//! The [`Song`] owns its tracks and notes. Edits go through the song, which
//! keeps its cached aggregates and change listeners consistent. Everything
//! else operates on a song by reference.

pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod midi;
pub mod scheduler;
pub mod serialization;
pub mod song;

pub use error::{FunzlError, Result};
pub use song::{Buzzer, Note, NoteId, Song, Track};
