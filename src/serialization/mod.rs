//! Song Serialization
//!
//! Three output formats:
//! - [`interchange`]: JSON documents for saving and loading songs
//! - [`device`]: byte payloads for the board's serial protocol
//! - [`source`]: C++ constant tables compiled into the firmware

pub mod device;
pub mod interchange;
pub mod source;

pub use device::{
    encode_channels, encode_notes_text, encode_song, NOTE_RECORD_LEN, SONG_HEADER,
    SONG_TERMINATOR, STOP_COMMAND,
};
pub use interchange::{
    load, load_file, save, save_file, try_load, NoteRecord, SongRecord, TrackRecord,
};
pub use source::{
    export_source, export_source_with, SourceIdentifiers, DEFAULT_FALLBACK_IDENTIFIER,
};
