//! JSON interchange format.
//!
//! ```json
//! { "name": "...", "tracks": [ { "name": "...", "notes": [
//!     { "start_us": 0, "duration_us": 500000, "pitch": 60,
//!       "velocity": 100, "buzzer": "BUZZER_1" } ] } ] }
//! ```

use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{FunzlError, Result};
use crate::song::{Buzzer, Note, Song, Track};

/// Persisted form of a [`Song`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
}

/// Persisted form of a [`Track`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub name: String,
    #[serde(default)]
    pub notes: Vec<NoteRecord>,
}

/// Persisted form of a [`Note`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub start_us: u64,
    pub duration_us: u64,
    pub pitch: u8,
    pub velocity: u8,
    pub buzzer: Buzzer,
}

impl From<&Song> for SongRecord {
    fn from(song: &Song) -> Self {
        Self {
            name: song.name().to_string(),
            tracks: song
                .tracks()
                .iter()
                .map(|track| TrackRecord {
                    name: track.name().to_string(),
                    notes: track.notes().map(NoteRecord::from).collect(),
                })
                .collect(),
        }
    }
}

impl From<&Note> for NoteRecord {
    fn from(note: &Note) -> Self {
        Self {
            start_us: note.start_us,
            duration_us: note.duration_us,
            pitch: note.pitch,
            velocity: note.velocity,
            buzzer: note.buzzer,
        }
    }
}

impl TryFrom<SongRecord> for Song {
    type Error = FunzlError;

    fn try_from(record: SongRecord) -> Result<Self> {
        let mut tracks = Vec::with_capacity(record.tracks.len());
        for (t, track) in record.tracks.into_iter().enumerate() {
            let mut notes = Vec::with_capacity(track.notes.len());
            for (i, n) in track.notes.into_iter().enumerate() {
                let note = Note::new(n.start_us, n.duration_us, n.pitch, n.velocity, n.buzzer)
                    .map_err(|e| FunzlError::MalformedInput {
                        reason: format!("track {} note {}: {}", t, i, e),
                    })?;
                notes.push(note);
            }
            tracks.push(Track::new(track.name, notes));
        }
        Ok(Song::with_tracks(record.name, tracks))
    }
}

/// Serialize a song to pretty-printed JSON.
pub fn save(song: &Song) -> Result<String> {
    Ok(serde_json::to_string_pretty(&SongRecord::from(song))?)
}

/// Parse a song, reporting malformed input as [`FunzlError::MalformedInput`].
pub fn try_load(text: &str) -> Result<Song> {
    let record: SongRecord =
        serde_json::from_str(text).map_err(|e| FunzlError::MalformedInput {
            reason: e.to_string(),
        })?;
    Song::try_from(record)
}

/// Parse a song, substituting [`Song::placeholder`] for malformed input.
pub fn load(text: &str) -> Song {
    match try_load(text) {
        Ok(song) => song,
        Err(e) => {
            warn!("Error decoding song: {}", e);
            Song::placeholder()
        }
    }
}

/// Write a song file.
pub fn save_file(song: &Song, path: &Path) -> Result<()> {
    let content = save(song)?;
    fs::write(path, content).map_err(|e| FunzlError::FileWriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read a song file. I/O failures are errors; malformed content yields the
/// placeholder song like [`load`].
pub fn load_file(path: &Path) -> Result<Song> {
    if !path.exists() {
        return Err(FunzlError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path).map_err(|e| FunzlError::FileReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(load(&content))
}
