//! Buzzer Scheduler
//!
//! Each physical buzzer plays one note at a time. Two notes on the same
//! buzzer conflict when their half-open intervals `[start, end)` overlap.
//! This module finds conflicts, assigns buzzers greedily, and repairs
//! overlaps by truncating the earlier note.

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::song::{Buzzer, Note, NoteEdit, NoteId, Song, CHANNEL_COUNT};

/// Notes grouped by physical channel, each group ascending by start.
///
/// The sort is stable, so notes with equal starts keep song order.
fn notes_by_channel(song: &Song) -> [Vec<(NoteId, Note)>; CHANNEL_COUNT] {
    let mut channels: [Vec<(NoteId, Note)>; CHANNEL_COUNT] = Default::default();
    for (id, note) in song.notes() {
        if let Some(channel) = note.buzzer.channel_index() {
            channels[channel].push((id, *note));
        }
    }
    for channel in channels.iter_mut() {
        channel.sort_by_key(|(_, note)| note.start_us);
    }
    channels
}

/// Find every note that overlaps another note on the same buzzer.
///
/// Notes on [`Buzzer::None`] are never reported. The result is symmetric:
/// both members of each overlapping pair are included.
pub fn detect_conflicts(song: &Song) -> BTreeSet<NoteId> {
    let mut conflicts = BTreeSet::new();

    for channel in notes_by_channel(song) {
        let mut active: Vec<(NoteId, Note)> = Vec::new();
        for (id, note) in channel {
            active.retain(|(_, a)| a.end_us() > note.start_us);
            for (active_id, active_note) in &active {
                if active_note.overlaps(&note) {
                    conflicts.insert(*active_id);
                    conflicts.insert(id);
                }
            }
            active.push((id, note));
        }
    }

    conflicts
}

/// Assign every note to a buzzer with the interval-partitioning greedy.
///
/// Notes are visited in [`Song::all_notes`] order (start, then duration,
/// then pitch) and each goes to the buzzer whose last
/// assigned note ends earliest (ties go to the lowest buzzer). This is
/// conflict-free whenever [`peak_concurrency`] is at most the number of
/// buzzers; otherwise some conflicts remain and are left for
/// [`detect_conflicts`] to report.
pub fn auto_assign_buzzers(song: &mut Song) {
    // Ordered by (start, duration, pitch): zero-length notes go before
    // longer notes starting at the same instant.
    let notes = song.all_notes();

    let mut channel_end = [0u64; CHANNEL_COUNT];
    let mut edits = Vec::new();
    for (id, note) in notes {
        let (channel, _) = channel_end
            .iter()
            .enumerate()
            .min_by_key(|(_, end)| **end)
            .unwrap_or((0, &0));
        channel_end[channel] = note.end_us();
        let buzzer = Buzzer::CHANNELS[channel];
        if note.buzzer != buzzer {
            edits.push((id, NoteEdit::Buzzer(buzzer)));
        }
    }

    debug!("Auto-assign changed the buzzer of {} notes", edits.len());
    // Ids come from the song and edits carry no pitch or velocity.
    if let Err(e) = song.apply_edits(edits) {
        warn!("Auto-assign could not apply its edits: {}", e);
    }
}

/// Truncate notes so that no two notes on the same buzzer overlap.
///
/// When a later note starts before an earlier note ends, the earlier note is
/// shortened to end where the later one starts. If the later note starts at
/// or before the earlier note's own start, the earlier note is clamped to
/// zero length. Returns the number of notes shortened.
pub fn fix_overlaps(song: &mut Song) -> usize {
    let mut edits: Vec<(NoteId, NoteEdit)> = Vec::new();

    for channel in notes_by_channel(song) {
        let mut active: Vec<(NoteId, Note)> = Vec::new();
        for (id, note) in channel {
            for (active_id, active_note) in active.iter_mut() {
                if !active_note.overlaps(&note) {
                    continue;
                }
                if note.start_us <= active_note.start_us {
                    warn!(
                        "Note {} starts no later than note {}; clamping to zero length",
                        id, active_id
                    );
                }
                active_note.duration_us = note.start_us.saturating_sub(active_note.start_us);
                edits.push((*active_id, NoteEdit::Duration(active_note.duration_us)));
            }
            active.retain(|(_, a)| a.end_us() > note.start_us);
            active.push((id, note));
        }
    }

    let shortened: BTreeSet<NoteId> = edits.iter().map(|(id, _)| *id).collect();
    debug!("Fixed overlaps by shortening {} notes", shortened.len());
    if let Err(e) = song.apply_edits(edits) {
        warn!("Overlap repair could not apply its edits: {}", e);
    }
    shortened.len()
}

/// Sweep events at one instant, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Event {
    End,
    Point,
    Start,
}

/// Maximum number of notes sounding at the same instant.
///
/// Intervals are half-open, so a note ending exactly when another starts
/// does not count towards the overlap. A zero-length note counts once at its
/// own instant, together with the notes that strictly contain it, which
/// matches [`Note::overlaps`].
pub fn peak_concurrency<'a>(notes: impl IntoIterator<Item = &'a Note>) -> usize {
    let mut events: Vec<(u64, Event)> = Vec::new();
    for note in notes {
        if note.duration_us == 0 {
            events.push((note.start_us, Event::Point));
        } else {
            events.push((note.start_us, Event::Start));
            events.push((note.end_us(), Event::End));
        }
    }
    events.sort_unstable();

    let mut current = 0usize;
    let mut peak = 0usize;
    for (_, event) in events {
        match event {
            Event::End => current -= 1,
            Event::Point => peak = peak.max(current + 1),
            Event::Start => {
                current += 1;
                peak = peak.max(current);
            }
        }
    }
    peak
}
