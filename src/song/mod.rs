//! Music Data Model
//!
//! A [`Song`] owns its [`Track`]s, which own their [`Note`]s. There are no
//! back-references: notes are addressed by [`NoteId`] and every change goes
//! through the song, which invalidates the affected caches and then notifies
//! listeners, in that order.
//!
//! # Example
//! ```
//! use funzl::song::{Buzzer, Note, NoteEdit, NoteId, Song, Track};
//!
//! let mut song = Song::new("demo");
//! song.add_track(Track::new("lead", vec![
//!     Note::new(0, 1000, 60, 100, Buzzer::Buzzer1).unwrap(),
//!     Note::new(500, 1000, 62, 100, Buzzer::Buzzer1).unwrap(),
//! ]));
//! assert_eq!(song.error_notes().len(), 2);
//!
//! song.edit_note(NoteId::new(0, 1), NoteEdit::Buzzer(Buzzer::Buzzer2)).unwrap();
//! assert!(song.error_notes().is_empty());
//! ```

mod buzzer;
mod listeners;
mod note;
mod track;

pub use buzzer::{Buzzer, BuzzerFilter, BuzzerUsage, CHANNEL_COUNT};
pub use listeners::{Listener, Subscription};
pub use note::{Note, NoteEdit, NoteId, MAX_MIDI_VALUE};
pub use track::{Track, TrackSummary};

use std::cell::OnceCell;
use std::collections::BTreeSet;

use log::debug;

use crate::error::{FunzlError, Result};
use crate::scheduler;
use listeners::Listeners;
use track::NoteEntry;

/// Name given to the song substituted for an unreadable file.
pub const PLACEHOLDER_NAME: &str = "Invalid Song";

/// Song-wide aggregates, computed on first access after a change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SongSummary {
    pub duration_us: u64,
    /// (min, max) over all notes, (0, 0) when there are none.
    pub pitch_range: (u8, u8),
    pub velocity_range: (u8, u8),
    pub notes_count: usize,
    pub usage: BuzzerUsage,
}

/// A song: a name and an ordered list of tracks.
#[derive(Debug)]
pub struct Song {
    name: String,
    tracks: Vec<Track>,
    listeners: Listeners,
    next_listener_id: u64,
    summary: OnceCell<SongSummary>,
    error_notes: OnceCell<BTreeSet<NoteId>>,
}

impl Default for Song {
    fn default() -> Self {
        Self::new("")
    }
}

impl Song {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_tracks(name, Vec::new())
    }

    pub fn with_tracks(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            name: name.into(),
            tracks,
            listeners: Listeners::default(),
            next_listener_id: 0,
            summary: OnceCell::new(),
            error_notes: OnceCell::new(),
        }
    }

    /// The empty song returned in place of malformed input.
    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_NAME)
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.tracks.get(id.track)?.note(id.index)
    }

    /// Every note with its id, in track order then note order.
    pub fn notes(&self) -> impl Iterator<Item = (NoteId, &Note)> + '_ {
        self.tracks.iter().enumerate().flat_map(|(t, track)| {
            track
                .notes()
                .enumerate()
                .map(move |(i, note)| (NoteId::new(t, i), note))
        })
    }

    /// All notes ordered by (start, duration, pitch); ties keep track order.
    pub fn all_notes(&self) -> Vec<(NoteId, Note)> {
        let mut notes: Vec<(NoteId, Note)> = self.notes().map(|(id, n)| (id, *n)).collect();
        notes.sort_by_key(|(_, n)| (n.start_us, n.duration_us, n.pitch));
        notes
    }

    /// Notes assigned to each physical channel, ascending by start.
    pub fn buzzer_tracks(&self) -> [Vec<Note>; CHANNEL_COUNT] {
        let mut channels: [Vec<Note>; CHANNEL_COUNT] = Default::default();
        for (_, note) in self.all_notes() {
            if let Some(channel) = note.buzzer.channel_index() {
                channels[channel].push(note);
            }
        }
        channels
    }

    /// Memoized aggregates; recomputed after the next change to the song.
    pub fn summary(&self) -> &SongSummary {
        self.summary.get_or_init(|| {
            let mut summary = SongSummary::default();
            let mut ranges: Option<((u8, u8), (u8, u8))> = None;
            for track in &self.tracks {
                summary.duration_us = summary.duration_us.max(track.duration_us());
                summary.notes_count += track.notes_count();
                summary.usage += track.buzzer_usage();
                if track.is_empty() {
                    continue;
                }
                let t = track.summary();
                let (pitch, velocity) = ranges.get_or_insert((
                    (t.min_pitch, t.max_pitch),
                    (t.min_velocity, t.max_velocity),
                ));
                pitch.0 = pitch.0.min(t.min_pitch);
                pitch.1 = pitch.1.max(t.max_pitch);
                velocity.0 = velocity.0.min(t.min_velocity);
                velocity.1 = velocity.1.max(t.max_velocity);
            }
            if let Some((pitch, velocity)) = ranges {
                summary.pitch_range = pitch;
                summary.velocity_range = velocity;
            }
            summary
        })
    }

    pub fn duration_us(&self) -> u64 {
        self.summary().duration_us
    }

    pub fn pitch_range(&self) -> (u8, u8) {
        self.summary().pitch_range
    }

    pub fn velocity_range(&self) -> (u8, u8) {
        self.summary().velocity_range
    }

    pub fn notes_count(&self) -> usize {
        self.summary().notes_count
    }

    pub fn buzzer_usage(&self) -> BuzzerUsage {
        self.summary().usage
    }

    /// Notes overlapping another note on the same physical channel.
    pub fn error_notes(&self) -> &BTreeSet<NoteId> {
        self.error_notes
            .get_or_init(|| scheduler::detect_conflicts(self))
    }

    pub fn is_error_note(&self, id: NoteId) -> bool {
        self.error_notes().contains(&id)
    }

    pub fn track_error_notes(&self, track: usize) -> Vec<NoteId> {
        self.error_notes()
            .iter()
            .filter(|id| id.track == track)
            .copied()
            .collect()
    }

    pub fn track_error_notes_count(&self, track: usize) -> usize {
        self.error_notes().iter().filter(|id| id.track == track).count()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.invalidate();
        self.listeners.notify();
    }

    pub fn rename_track(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.track_mut(index)?.set_name(name.into());
        self.touch_tracks(&[index]);
        Ok(())
    }

    /// Append a track, returning its index.
    pub fn add_track(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        let index = self.tracks.len() - 1;
        self.invalidate();
        self.listeners.notify();
        index
    }

    /// Remove a track; later tracks shift down by one.
    pub fn remove_track(&mut self, index: usize) -> Result<Track> {
        if index >= self.tracks.len() {
            return Err(FunzlError::TrackNotFound { index });
        }
        let track = self.tracks.remove(index);
        self.invalidate();
        self.listeners.notify();
        Ok(track)
    }

    /// Append a note to a track, returning its id.
    pub fn add_note(&mut self, track: usize, note: Note) -> Result<NoteId> {
        note.validate()?;
        let entries = &mut self.track_mut(track)?.entries;
        entries.push(NoteEntry {
            note,
            listeners: Listeners::default(),
        });
        let id = NoteId::new(track, entries.len() - 1);
        self.touch_tracks(&[track]);
        Ok(id)
    }

    /// Remove a note; later notes of the same track shift down by one.
    pub fn remove_note(&mut self, id: NoteId) -> Result<Note> {
        self.check_note(id)?;
        let entry = self.tracks[id.track].entries.remove(id.index);
        self.touch_tracks(&[id.track]);
        Ok(entry.note)
    }

    pub fn edit_note(&mut self, id: NoteId, edit: NoteEdit) -> Result<()> {
        self.apply_edits([(id, edit)])
    }

    /// Apply a batch of edits atomically.
    ///
    /// Every edit is validated before any is applied. Afterwards the affected
    /// caches are invalidated, then listeners of each changed note, each
    /// affected track and the song are notified once.
    pub fn apply_edits(&mut self, edits: impl IntoIterator<Item = (NoteId, NoteEdit)>) -> Result<()> {
        let edits: Vec<(NoteId, NoteEdit)> = edits.into_iter().collect();
        for (id, edit) in &edits {
            self.check_note(*id)?;
            edit.validate()?;
        }
        if edits.is_empty() {
            return Ok(());
        }

        let mut touched = BTreeSet::new();
        for (id, edit) in &edits {
            edit.apply(&mut self.tracks[id.track].entries[id.index].note);
            touched.insert(*id);
        }
        debug!("Applied {} edits to {} notes", edits.len(), touched.len());

        let tracks: BTreeSet<usize> = touched.iter().map(|id| id.track).collect();
        for track in &tracks {
            self.tracks[*track].invalidate();
        }
        self.invalidate();

        for id in &touched {
            self.tracks[id.track].entries[id.index].listeners.notify();
        }
        for track in &tracks {
            self.tracks[*track].listeners.notify();
        }
        self.listeners.notify();
        Ok(())
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a listener called after any change to the song.
    pub fn subscribe<F>(&mut self, listener: F) -> Subscription
    where
        F: FnMut() + Send + 'static,
    {
        let id = self.allocate_listener_id();
        self.listeners.insert(id, Box::new(listener));
        Subscription(id)
    }

    /// Register a listener called after any change to one track or its notes.
    pub fn subscribe_track<F>(&mut self, index: usize, listener: F) -> Result<Subscription>
    where
        F: FnMut() + Send + 'static,
    {
        self.track_mut(index)?;
        let id = self.allocate_listener_id();
        self.tracks[index].listeners.insert(id, Box::new(listener));
        Ok(Subscription(id))
    }

    /// Register a listener called after any change to one note.
    pub fn subscribe_note<F>(&mut self, note: NoteId, listener: F) -> Result<Subscription>
    where
        F: FnMut() + Send + 'static,
    {
        self.check_note(note)?;
        let id = self.allocate_listener_id();
        self.tracks[note.track].entries[note.index]
            .listeners
            .insert(id, Box::new(listener));
        Ok(Subscription(id))
    }

    /// Remove a listener. Returns `false` if it was already removed or
    /// belonged to a note or track that no longer exists.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let id = subscription.0;
        if self.listeners.remove(id) {
            return true;
        }
        for track in &mut self.tracks {
            if track.listeners.remove(id) {
                return true;
            }
            if track.entries.iter_mut().any(|entry| entry.listeners.remove(id)) {
                return true;
            }
        }
        false
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn allocate_listener_id(&mut self) -> u64 {
        self.next_listener_id += 1;
        self.next_listener_id
    }

    fn track_mut(&mut self, index: usize) -> Result<&mut Track> {
        self.tracks
            .get_mut(index)
            .ok_or(FunzlError::TrackNotFound { index })
    }

    fn check_note(&self, id: NoteId) -> Result<()> {
        match self.note(id) {
            Some(_) => Ok(()),
            None => Err(FunzlError::NoteNotFound {
                track: id.track,
                index: id.index,
            }),
        }
    }

    /// Invalidate then notify the given tracks and the song.
    fn touch_tracks(&mut self, tracks: &[usize]) {
        for index in tracks {
            self.tracks[*index].invalidate();
        }
        self.invalidate();
        for index in tracks {
            self.tracks[*index].listeners.notify();
        }
        self.listeners.notify();
    }

    fn invalidate(&mut self) {
        self.summary = OnceCell::new();
        self.error_notes = OnceCell::new();
    }

    #[cfg(test)]
    fn is_cached(&self) -> bool {
        self.summary.get().is_some() || self.error_notes.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn note(start_us: u64, duration_us: u64, pitch: u8, buzzer: Buzzer) -> Note {
        Note::new(start_us, duration_us, pitch, 100, buzzer).unwrap()
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&calls);
        (calls, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn two_track_song() -> Song {
        Song::with_tracks(
            "demo",
            vec![
                Track::new(
                    "lead",
                    vec![
                        note(0, 1000, 60, Buzzer::Buzzer1),
                        note(500, 1000, 64, Buzzer::Buzzer1),
                    ],
                ),
                Track::new("bass", vec![note(200, 3000, 40, Buzzer::Buzzer2)]),
            ],
        )
    }

    #[test]
    fn test_empty_song_defaults() {
        let song = Song::new("empty");
        assert_eq!(song.duration_us(), 0);
        assert_eq!(song.pitch_range(), (0, 0));
        assert_eq!(song.velocity_range(), (0, 0));
        assert_eq!(song.notes_count(), 0);
        assert!(song.error_notes().is_empty());
        assert!(song.buzzer_tracks().iter().all(Vec::is_empty));
    }

    #[test]
    fn test_empty_tracks_do_not_widen_ranges() {
        let mut song = two_track_song();
        song.add_track(Track::new("silent", Vec::new()));
        assert_eq!(song.pitch_range(), (40, 64));
        assert_eq!(song.velocity_range(), (100, 100));
    }

    #[test]
    fn test_song_summary() {
        let song = two_track_song();
        assert_eq!(song.duration_us(), 3200);
        assert_eq!(song.notes_count(), 3);
        assert_eq!(song.buzzer_usage()[Buzzer::Buzzer1], 2);
        assert_eq!(song.buzzer_usage()[Buzzer::Buzzer2], 1);
    }

    #[test]
    fn test_error_notes() {
        let song = two_track_song();
        let expected: BTreeSet<NoteId> = [NoteId::new(0, 0), NoteId::new(0, 1)].into();
        assert_eq!(song.error_notes(), &expected);
        assert_eq!(song.track_error_notes_count(0), 2);
        assert_eq!(song.track_error_notes(1), Vec::<NoteId>::new());
        assert!(song.is_error_note(NoteId::new(0, 1)));
    }

    #[test]
    fn test_edit_invalidates_caches() {
        let mut song = two_track_song();
        assert_eq!(song.duration_us(), 3200);
        assert!(song.is_cached());
        assert!(song.tracks()[1].is_cached());

        song.edit_note(NoteId::new(1, 0), NoteEdit::Duration(5000))
            .unwrap();
        assert!(!song.is_cached());
        assert!(!song.tracks()[1].is_cached());
        assert_eq!(song.duration_us(), 5200);
        assert_eq!(song.tracks()[1].duration_us(), 5200);
    }

    #[test]
    fn test_edit_moves_note_out_of_conflict() {
        let mut song = two_track_song();
        assert_eq!(song.error_notes().len(), 2);
        song.edit_note(NoteId::new(0, 1), NoteEdit::Buzzer(Buzzer::None))
            .unwrap();
        assert!(song.error_notes().is_empty());
    }

    #[test]
    fn test_invalid_edit_changes_nothing() {
        let mut song = two_track_song();
        let (calls, listener) = counter();
        let _sub = song.subscribe(listener);

        let result = song.apply_edits([
            (NoteId::new(0, 0), NoteEdit::Pitch(70)),
            (NoteId::new(0, 1), NoteEdit::Velocity(200)),
        ]);
        assert!(matches!(result, Err(FunzlError::InvalidNote { .. })));
        assert_eq!(song.note(NoteId::new(0, 0)).unwrap().pitch, 60);

        let result = song.edit_note(NoteId::new(5, 0), NoteEdit::Pitch(1));
        assert!(matches!(result, Err(FunzlError::NoteNotFound { track: 5, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listeners_notified_after_mutation() {
        let mut song = two_track_song();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&seen);
        let _song_sub = song.subscribe(move || log.lock().unwrap().push("song"));
        let log = Arc::clone(&seen);
        let _track_sub = song
            .subscribe_track(0, move || log.lock().unwrap().push("track"))
            .unwrap();
        let log = Arc::clone(&seen);
        let _note_sub = song
            .subscribe_note(NoteId::new(0, 1), move || log.lock().unwrap().push("note"))
            .unwrap();

        song.edit_note(NoteId::new(0, 1), NoteEdit::Start(2000))
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["note", "track", "song"]);

        seen.lock().unwrap().clear();
        song.edit_note(NoteId::new(1, 0), NoteEdit::Pitch(41)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["song"]);
    }

    #[test]
    fn test_batch_notifies_once_per_entity() {
        let mut song = two_track_song();
        let (song_calls, listener) = counter();
        let _s = song.subscribe(listener);
        let (track_calls, listener) = counter();
        let _t = song.subscribe_track(0, listener).unwrap();

        song.apply_edits([
            (NoteId::new(0, 0), NoteEdit::Buzzer(Buzzer::Buzzer3)),
            (NoteId::new(0, 1), NoteEdit::Buzzer(Buzzer::Buzzer3)),
            (NoteId::new(0, 1), NoteEdit::Duration(10)),
        ])
        .unwrap();

        assert_eq!(song_calls.load(Ordering::SeqCst), 1);
        assert_eq!(track_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let mut song = two_track_song();
        let (calls, listener) = counter();
        let sub = song.subscribe_note(NoteId::new(1, 0), listener).unwrap();

        song.edit_note(NoteId::new(1, 0), NoteEdit::Velocity(1)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(song.unsubscribe(sub));
        assert!(!song.unsubscribe(sub));
        song.edit_note(NoteId::new(1, 0), NoteEdit::Velocity(2)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_note_listener_follows_note_after_removal() {
        let mut song = two_track_song();
        let (calls, listener) = counter();
        let sub = song.subscribe_note(NoteId::new(0, 1), listener).unwrap();

        song.remove_note(NoteId::new(0, 0)).unwrap();
        song.edit_note(NoteId::new(0, 0), NoteEdit::Pitch(61)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let removed = song.remove_note(NoteId::new(0, 0)).unwrap();
        assert_eq!(removed.pitch, 61);
        assert!(!song.unsubscribe(sub));
    }

    #[test]
    fn test_structural_edits() {
        let mut song = two_track_song();
        let (calls, listener) = counter();
        let _s = song.subscribe(listener);

        let index = song.add_track(Track::new("extra", Vec::new()));
        let id = song.add_note(index, note(9000, 1000, 80, Buzzer::Buzzer3)).unwrap();
        assert_eq!(id, NoteId::new(2, 0));
        assert_eq!(song.duration_us(), 10_000);

        song.rename_track(index, "renamed").unwrap();
        assert_eq!(song.tracks()[2].name(), "renamed");

        let removed = song.remove_track(0).unwrap();
        assert_eq!(removed.name(), "lead");
        assert_eq!(song.tracks().len(), 2);
        assert!(song.error_notes().is_empty());

        song.set_name("renamed song");
        assert_eq!(song.name(), "renamed song");
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        assert!(matches!(
            song.remove_track(9),
            Err(FunzlError::TrackNotFound { index: 9 })
        ));
        let bad = Note {
            pitch: 128,
            ..note(0, 1, 0, Buzzer::None)
        };
        assert!(song.add_note(0, bad).is_err());
    }

    #[test]
    fn test_all_notes_order_and_buzzer_tracks() {
        let song = Song::with_tracks(
            "order",
            vec![
                Track::new(
                    "a",
                    vec![
                        note(100, 50, 70, Buzzer::Buzzer2),
                        note(0, 20, 65, Buzzer::None),
                    ],
                ),
                Track::new(
                    "b",
                    vec![
                        note(100, 10, 60, Buzzer::Buzzer2),
                        note(50, 10, 61, Buzzer::Buzzer1),
                    ],
                ),
            ],
        );

        let ids: Vec<NoteId> = song.all_notes().into_iter().map(|(id, _)| id).collect();
        assert_eq!(
            ids,
            vec![
                NoteId::new(0, 1),
                NoteId::new(1, 1),
                NoteId::new(1, 0),
                NoteId::new(0, 0),
            ]
        );

        let channels = song.buzzer_tracks();
        assert_eq!(channels[0].len(), 1);
        assert_eq!(
            channels[1].iter().map(|n| n.pitch).collect::<Vec<_>>(),
            vec![60, 70]
        );
        assert!(channels[2].is_empty());
    }

    #[test]
    fn test_placeholder() {
        let song = Song::placeholder();
        assert_eq!(song.name(), PLACEHOLDER_NAME);
        assert!(song.tracks().is_empty());
    }
}
