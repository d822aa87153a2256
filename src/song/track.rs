//! A named, ordered sequence of notes with memoized aggregates.

use std::cell::OnceCell;

use crate::song::listeners::Listeners;
use crate::song::{BuzzerUsage, Note};

/// Aggregates over a track's notes, computed on first access after a change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackSummary {
    /// Latest note end, 0 for an empty track.
    pub duration_us: u64,
    pub min_pitch: u8,
    pub max_pitch: u8,
    pub min_velocity: u8,
    pub max_velocity: u8,
    pub usage: BuzzerUsage,
}

impl TrackSummary {
    fn compute<'a>(notes: impl Iterator<Item = &'a Note>) -> Self {
        let mut summary: Option<TrackSummary> = None;
        for note in notes {
            let s = summary.get_or_insert(TrackSummary {
                duration_us: 0,
                min_pitch: note.pitch,
                max_pitch: note.pitch,
                min_velocity: note.velocity,
                max_velocity: note.velocity,
                usage: BuzzerUsage::default(),
            });
            s.duration_us = s.duration_us.max(note.end_us());
            s.min_pitch = s.min_pitch.min(note.pitch);
            s.max_pitch = s.max_pitch.max(note.pitch);
            s.min_velocity = s.min_velocity.min(note.velocity);
            s.max_velocity = s.max_velocity.max(note.velocity);
            s.usage.record(note.buzzer);
        }
        summary.unwrap_or_default()
    }
}

#[derive(Debug)]
pub(crate) struct NoteEntry {
    pub note: Note,
    pub listeners: Listeners,
}

/// A track of notes owned by a [`Song`](crate::song::Song).
#[derive(Debug)]
pub struct Track {
    name: String,
    pub(crate) entries: Vec<NoteEntry>,
    pub(crate) listeners: Listeners,
    summary: OnceCell<TrackSummary>,
}

impl Track {
    pub fn new(name: impl Into<String>, notes: Vec<Note>) -> Self {
        Self {
            name: name.into(),
            entries: notes
                .into_iter()
                .map(|note| NoteEntry {
                    note,
                    listeners: Listeners::default(),
                })
                .collect(),
            listeners: Listeners::default(),
            summary: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn notes(&self) -> impl ExactSizeIterator<Item = &Note> + '_ {
        self.entries.iter().map(|entry| &entry.note)
    }

    pub fn note(&self, index: usize) -> Option<&Note> {
        self.entries.get(index).map(|entry| &entry.note)
    }

    pub fn notes_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Memoized aggregates; recomputed after the next change to this track.
    pub fn summary(&self) -> &TrackSummary {
        self.summary
            .get_or_init(|| TrackSummary::compute(self.notes()))
    }

    pub fn duration_us(&self) -> u64 {
        self.summary().duration_us
    }

    pub fn min_pitch(&self) -> u8 {
        self.summary().min_pitch
    }

    pub fn max_pitch(&self) -> u8 {
        self.summary().max_pitch
    }

    pub fn min_velocity(&self) -> u8 {
        self.summary().min_velocity
    }

    pub fn max_velocity(&self) -> u8 {
        self.summary().max_velocity
    }

    pub fn pitch_range(&self) -> u8 {
        self.max_pitch() - self.min_pitch()
    }

    pub fn velocity_range(&self) -> u8 {
        self.max_velocity() - self.min_velocity()
    }

    pub fn buzzer_usage(&self) -> BuzzerUsage {
        self.summary().usage
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn invalidate(&mut self) {
        self.summary = OnceCell::new();
    }

    #[cfg(test)]
    pub(crate) fn is_cached(&self) -> bool {
        self.summary.get().is_some()
    }
}
