//! MIDI Import
//!
//! Reads Standard MIDI Files into a [`Song`](crate::song::Song), converting
//! ticks to microseconds through the tempo map of the first track.

mod import;
mod tempo;

pub use import::{import_bytes, import_file, import_smf, UNNAMED_SONG};
pub use tempo::{TempoChange, TempoMap, DEFAULT_US_PER_BEAT};
