//! A single timed note.

use std::fmt;

use crate::error::{FunzlError, Result};
use crate::song::Buzzer;

/// Highest valid MIDI pitch or velocity.
pub const MAX_MIDI_VALUE: u8 = 127;

/// A note on the song timeline, in microseconds.
///
/// Notes are plain values; they can only be changed through the owning
/// [`Song`](crate::song::Song) so that cached aggregates stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub start_us: u64,
    pub duration_us: u64,
    pub pitch: u8,
    pub velocity: u8,
    pub buzzer: Buzzer,
}

impl Note {
    /// Create a note, rejecting pitch or velocity above 127.
    pub fn new(
        start_us: u64,
        duration_us: u64,
        pitch: u8,
        velocity: u8,
        buzzer: Buzzer,
    ) -> Result<Self> {
        let note = Self {
            start_us,
            duration_us,
            pitch,
            velocity,
            buzzer,
        };
        note.validate()?;
        Ok(note)
    }

    pub fn end_us(&self) -> u64 {
        self.start_us.saturating_add(self.duration_us)
    }

    /// Equal-tempered frequency with A4 (pitch 69) at 440 Hz.
    pub fn frequency(&self) -> f64 {
        440.0 * 2f64.powf((f64::from(self.pitch) - 69.0) / 12.0)
    }

    /// Half-open interval overlap; touching endpoints do not overlap. A
    /// zero-length note overlaps the notes that strictly contain its instant.
    pub fn overlaps(&self, other: &Note) -> bool {
        self.start_us < other.end_us() && other.start_us < self.end_us()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_midi_value("pitch", self.pitch)?;
        check_midi_value("velocity", self.velocity)
    }
}

fn check_midi_value(field: &'static str, value: u8) -> Result<()> {
    if value > MAX_MIDI_VALUE {
        return Err(FunzlError::InvalidNote {
            field,
            value: u32::from(value),
        });
    }
    Ok(())
}

/// Address of a note: track index within the song, note index within the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId {
    pub track: usize,
    pub index: usize,
}

impl NoteId {
    pub fn new(track: usize, index: usize) -> Self {
        Self { track, index }
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.track, self.index)
    }
}

/// A single field change applied through [`Song::apply_edits`](crate::song::Song::apply_edits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEdit {
    Start(u64),
    Duration(u64),
    Pitch(u8),
    Velocity(u8),
    Buzzer(Buzzer),
}

impl NoteEdit {
    pub(crate) fn validate(&self) -> Result<()> {
        match *self {
            NoteEdit::Pitch(pitch) => check_midi_value("pitch", pitch),
            NoteEdit::Velocity(velocity) => check_midi_value("velocity", velocity),
            _ => Ok(()),
        }
    }

    pub(crate) fn apply(&self, note: &mut Note) {
        match *self {
            NoteEdit::Start(value) => note.start_us = value,
            NoteEdit::Duration(value) => note.duration_us = value,
            NoteEdit::Pitch(value) => note.pitch = value,
            NoteEdit::Velocity(value) => note.velocity = value,
            NoteEdit::Buzzer(value) => note.buzzer = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn note(start_us: u64, duration_us: u64) -> Note {
        Note::new(start_us, duration_us, 60, 100, Buzzer::Buzzer1).unwrap()
    }

    #[test]
    fn test_end_us() {
        assert_eq!(note(1000, 2000).end_us(), 3000);
        assert_eq!(note(5, 0).end_us(), 5);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let err = Note::new(0, 10, 128, 100, Buzzer::None).unwrap_err();
        assert!(matches!(err, FunzlError::InvalidNote { field: "pitch", .. }));

        let err = Note::new(0, 10, 60, 200, Buzzer::None).unwrap_err();
        assert!(matches!(
            err,
            FunzlError::InvalidNote {
                field: "velocity",
                value: 200
            }
        ));
    }

    #[test]
    fn test_overlap_is_half_open() {
        let a = note(0, 1000);
        assert!(a.overlaps(&note(500, 1000)));
        assert!(note(500, 1000).overlaps(&a));
        assert!(!a.overlaps(&note(1000, 10)));
        assert!(!a.overlaps(&note(1000, 0)));
        assert!(!a.overlaps(&note(0, 0)));
    }

    #[test]
    fn test_zero_length_note_overlaps_covering_note() {
        let a = note(0, 1000);
        let point = note(500, 0);
        assert!(point.overlaps(&a));
        assert!(a.overlaps(&point));
        assert!(!point.overlaps(&note(500, 0)));
    }

    #[test]
    fn test_frequency() {
        let mut a4 = note(0, 1);
        a4.pitch = 69;
        assert_relative_eq!(a4.frequency(), 440.0);
        a4.pitch = 81;
        assert_relative_eq!(a4.frequency(), 880.0, epsilon = 1e-9);
    }

    #[test]
    fn test_edit_validation() {
        assert!(NoteEdit::Pitch(127).validate().is_ok());
        assert!(NoteEdit::Velocity(128).validate().is_err());
        assert!(NoteEdit::Start(u64::MAX).validate().is_ok());

        let mut n = note(0, 10);
        NoteEdit::Buzzer(Buzzer::Buzzer3).apply(&mut n);
        NoteEdit::Duration(99).apply(&mut n);
        assert_eq!(n.buzzer, Buzzer::Buzzer3);
        assert_eq!(n.duration_us, 99);
    }
}
