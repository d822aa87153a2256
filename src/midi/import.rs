//! Standard MIDI File import.

use std::fs;
use std::path::Path;

use log::{debug, info};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::error::{FunzlError, Result};
use crate::midi::TempoMap;
use crate::song::{Buzzer, Note, Song, Track};

/// Song name used when the file name gives none.
pub const UNNAMED_SONG: &str = "Unnamed";

/// Load a MIDI file. The song is named after the file stem.
pub fn import_file(path: &Path) -> Result<Song> {
    if !path.exists() {
        return Err(FunzlError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = fs::read(path).map_err(|e| FunzlError::FileReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| UNNAMED_SONG.to_string());

    info!("Importing MIDI file: {}", path.display());
    import_bytes(&name, &bytes)
}

/// Parse MIDI file contents into a song.
pub fn import_bytes(name: &str, bytes: &[u8]) -> Result<Song> {
    let smf = Smf::parse(bytes)?;
    import_smf(name, &smf)
}

/// Convert a parsed MIDI file into a song.
///
/// Tempo changes are read from the first track. Every track yielding at least
/// one note becomes a track of the song; all notes start unassigned.
pub fn import_smf(name: &str, smf: &Smf<'_>) -> Result<Song> {
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(ticks) if ticks.as_int() > 0 => ticks.as_int(),
        Timing::Metrical(_) => {
            return Err(FunzlError::UnsupportedTiming {
                reason: "zero ticks per beat".to_string(),
            })
        }
        Timing::Timecode(fps, subframe) => {
            return Err(FunzlError::UnsupportedTiming {
                reason: format!("SMPTE timecode ({} fps, {} subframes)", fps.as_int(), subframe),
            })
        }
    };

    let tempo = smf
        .tracks
        .first()
        .map(|events| TempoMap::from_track(events, ticks_per_beat))
        .unwrap_or_else(|| TempoMap::new(ticks_per_beat));
    debug!("Tempo map: {:?}", tempo.changes());

    let mut song = Song::new(name);
    for (index, events) in smf.tracks.iter().enumerate() {
        let (track_name, notes) = import_track(events, &tempo);
        if notes.is_empty() {
            debug!("Skipping track {} without notes", index + 1);
            continue;
        }
        let track_name = track_name.unwrap_or_else(|| format!("Track {}", index + 1));
        let track = Track::new(track_name, notes);
        info!(
            "Loaded track '{}' with {} notes, pitch range: {}-{}",
            track.name(),
            track.notes_count(),
            track.min_pitch(),
            track.max_pitch()
        );
        song.add_track(track);
    }
    Ok(song)
}

/// Pair note-ons with note-offs. Returns the track name, if any, and the
/// notes in the order they were closed.
fn import_track(events: &[TrackEvent<'_>], tempo: &TempoMap) -> (Option<String>, Vec<Note>) {
    // Open notes by pitch: (start, velocity).
    let mut pending: [Option<(u64, u8)>; 128] = [None; 128];
    let mut notes = Vec::new();
    let mut name = None;
    let mut tick = 0u64;

    for event in events {
        tick += u64::from(event.delta.as_int());
        match event.kind {
            TrackEventKind::Midi { message, .. } => {
                let (key, velocity, is_on) = match message {
                    MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int(), vel.as_int() > 0),
                    MidiMessage::NoteOff { key, vel } => (key.as_int(), vel.as_int(), false),
                    _ => continue,
                };
                let now_us = tempo.tick_to_us(tick);
                let slot = &mut pending[usize::from(key)];
                if is_on {
                    *slot = Some((now_us, velocity));
                } else if let Some((start_us, velocity)) = slot.take() {
                    notes.push(Note {
                        start_us,
                        duration_us: now_us - start_us,
                        pitch: key,
                        velocity,
                        buzzer: Buzzer::None,
                    });
                }
            }
            TrackEventKind::Meta(MetaMessage::TrackName(raw)) if name.is_none() => {
                name = Some(String::from_utf8_lossy(raw).trim().to_string())
                    .filter(|n| !n.is_empty());
            }
            _ => {}
        }
    }

    let dropped = pending.iter().filter(|slot| slot.is_some()).count();
    if dropped > 0 {
        debug!("Dropped {} notes still open at end of track", dropped);
    }
    (name, notes)
}
