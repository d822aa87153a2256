//! Payloads understood by the board's serial protocol.
//!
//! Binary song upload:
//!
//! ```text
//! '\n' 'S' <u32 count_1> <note>* <u32 count_2> <note>* <u32 count_3> <note>* 0x00
//! <note> = <u32 start_us> <u32 end_us> <u8 pitch>        (all little-endian)
//! ```
//!
//! Legacy text upload, one line per non-empty buzzer:
//!
//! ```text
//! 'S' ( 'X:' ( <delta_us> '|' <pitch> ':' <duration_us> '|X:' )* '0|' '\n' )+ '\n'
//! ```

use std::fmt::Write as _;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{FunzlError, Result};
use crate::song::{Buzzer, Note, Song, CHANNEL_COUNT};

/// Prefix of a binary song upload.
pub const SONG_HEADER: [u8; 2] = *b"\nS";

/// Last byte of a binary song upload.
pub const SONG_TERMINATOR: u8 = 0;

/// Silences every buzzer.
pub const STOP_COMMAND: [u8; 1] = *b"\n";

/// Size of one note record in the binary payload.
pub const NOTE_RECORD_LEN: usize = 9;

/// Encode the song's channel assignments as a binary upload.
pub fn encode_song(song: &Song) -> Result<Vec<u8>> {
    encode_channels(&song.buzzer_tracks())
}

/// Encode per-channel note lists, which must already be sorted by start.
pub fn encode_channels(channels: &[Vec<Note>; CHANNEL_COUNT]) -> Result<Vec<u8>> {
    let notes: usize = channels.iter().map(Vec::len).sum();
    let mut payload =
        Vec::with_capacity(SONG_HEADER.len() + 4 * CHANNEL_COUNT + NOTE_RECORD_LEN * notes + 1);
    payload.extend_from_slice(&SONG_HEADER);

    for channel in channels {
        let count = u32::try_from(channel.len()).map_err(|_| FunzlError::ValueOutOfRange {
            field: "note count",
            value: channel.len() as u64,
        })?;
        payload.write_u32::<LittleEndian>(count)?;
        for note in channel {
            payload.write_u32::<LittleEndian>(device_time("start_us", note.start_us)?)?;
            payload.write_u32::<LittleEndian>(device_time("end_us", note.end_us())?)?;
            payload.write_u8(note.pitch)?;
        }
    }

    payload.write_u8(SONG_TERMINATOR)?;
    Ok(payload)
}

fn device_time(field: &'static str, value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| FunzlError::ValueOutOfRange { field, value })
}

/// Encode a subset of notes in the legacy text protocol.
///
/// Times are relative: the first delta counts from `start_us` (the earliest
/// note start when `None`), later deltas from the end of the previous note.
/// Notes starting before `start_us` are skipped. Returns `None` when there
/// are no notes.
pub fn encode_notes_text(notes: &[Note], start_us: Option<u64>) -> Option<String> {
    let start_us = match start_us {
        Some(start) => start,
        None => notes.iter().map(|n| n.start_us).min()?,
    };

    let mut sorted: Vec<&Note> = notes.iter().collect();
    sorted.sort_by_key(|n| n.start_us);

    let mut text = String::from("S");
    for buzzer in Buzzer::CHANNELS {
        let mut channel = sorted.iter().filter(|n| n.buzzer == buzzer).peekable();
        if channel.peek().is_none() {
            continue;
        }

        text.push_str("X:");
        let mut last_event = start_us;
        for note in channel.filter(|n| n.start_us >= start_us) {
            // Overlapping notes would need a negative delta; play them back to back.
            let delta = note.start_us.saturating_sub(last_event);
            let _ = write!(text, "{}|{}:{}|X:", delta, note.pitch, note.duration_us);
            last_event = note.end_us();
        }
        text.push_str("0|\n");
    }
    text.push('\n');
    Some(text)
}
