//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::Settings;
use crate::device::{SendStatus, TransferProgress, Uploader};
use crate::midi;
use crate::scheduler;
use crate::serialization;
use crate::song::{Buzzer, BuzzerFilter, Note, Song};

fn load_song(path: &Path) -> Result<Song> {
    serialization::load_file(path)
        .with_context(|| format!("Failed to load song: {}", path.display()))
}

fn save_song(song: &Song, path: &Path) -> Result<()> {
    serialization::save_file(song, path)
        .with_context(|| format!("Failed to save song: {}", path.display()))
}

fn format_us(us: u64) -> String {
    format!("{:.3} s", us as f64 / 1_000_000.0)
}

/// Import a MIDI file into a song document.
pub fn import(input: &Path, output: &Path, schedule: bool) -> Result<()> {
    info!("Importing MIDI file: {}", input.display());

    let mut song = midi::import_file(input)
        .with_context(|| format!("Failed to import MIDI file: {}", input.display()))?;
    if schedule {
        scheduler::auto_assign_buzzers(&mut song);
        let fixed = scheduler::fix_overlaps(&mut song);
        info!("Shortened {} overlapping notes", fixed);
    }
    save_song(&song, output)?;

    println!(
        "Imported '{}': {} tracks, {} notes",
        song.name(),
        song.tracks().len(),
        song.notes_count()
    );
    println!("Saved to: {}", output.display());
    Ok(())
}

/// Print song statistics, optionally listing the notes on one buzzer.
pub fn show_info(path: &Path, filter: Option<BuzzerFilter>) -> Result<()> {
    let song = load_song(path)?;

    println!("Song: {}", song.name());
    println!("{:-<60}", "");
    println!("Duration:   {}", format_us(song.duration_us()));
    println!("Notes:      {}", song.notes_count());
    let (low, high) = song.pitch_range();
    println!("Pitch:      {}-{}", low, high);
    let (low, high) = song.velocity_range();
    println!("Velocity:   {}-{}", low, high);
    let peak = scheduler::peak_concurrency(song.notes().map(|(_, note)| note));
    println!("Peak:       {} simultaneous notes", peak);
    println!("Conflicts:  {}", song.error_notes().len());

    println!("{:-<60}", "");
    for (buzzer, count) in song.buzzer_usage().iter() {
        println!("{:<10}  {}", buzzer.name(), count);
    }

    println!("{:-<60}", "");
    for (index, track) in song.tracks().iter().enumerate() {
        println!(
            "[{}] {} - {} notes, pitch {}-{}, {} conflicts",
            index,
            track.name(),
            track.notes_count(),
            track.min_pitch(),
            track.max_pitch(),
            song.track_error_notes_count(index)
        );
    }

    if let Some(filter) = filter {
        println!("{:-<60}", "");
        for (id, note) in song.all_notes() {
            if !filter.matches(note.buzzer) {
                continue;
            }
            let marker = if song.is_error_note(id) { "!" } else { " " };
            println!(
                "{} {:>7}  {:>12} +{:<10} pitch {:>3} vel {:>3} {}",
                marker,
                id,
                note.start_us,
                note.duration_us,
                note.pitch,
                note.velocity,
                note.buzzer.name()
            );
        }
    }
    Ok(())
}

/// List conflicting notes.
pub fn show_conflicts(path: &Path) -> Result<()> {
    let song = load_song(path)?;
    let errors = song.error_notes();

    if errors.is_empty() {
        println!("No conflicts.");
        return Ok(());
    }

    println!("{} conflicting notes:", errors.len());
    for id in errors {
        if let Some(note) = song.note(*id) {
            println!(
                "  {:>7}  {} [{}, {}) pitch {}",
                id,
                note.buzzer.name(),
                note.start_us,
                note.end_us(),
                note.pitch
            );
        }
    }
    Ok(())
}

/// Repair overlaps in place.
pub fn fix_overlaps(path: &Path) -> Result<()> {
    let mut song = load_song(path)?;
    let fixed = scheduler::fix_overlaps(&mut song);
    save_song(&song, path)?;
    println!("Shortened {} notes.", fixed);
    Ok(())
}

/// Assign buzzers in place.
pub fn auto_assign(path: &Path) -> Result<()> {
    let mut song = load_song(path)?;
    scheduler::auto_assign_buzzers(&mut song);
    save_song(&song, path)?;

    let remaining = song.error_notes().len();
    if remaining > 0 {
        warn!(
            "{} notes still overlap; the song needs more than {} buzzers at once",
            remaining,
            Buzzer::CHANNELS.len()
        );
    }
    println!("Assigned {} notes, {} conflicts left.", song.notes_count(), remaining);
    Ok(())
}

/// Export a firmware source table.
pub fn export(path: &Path, output: Option<&Path>, settings: &Settings) -> Result<()> {
    let song = load_song(path)?;
    let source =
        serialization::export_source_with(&song, &settings.export.fallback_identifier)
            .context("Failed to export song")?;

    match output {
        Some(output) => {
            fs::write(output, source)
                .with_context(|| format!("Failed to write: {}", output.display()))?;
            println!("Exported to: {}", output.display());
        }
        None => print!("{}", source),
    }
    Ok(())
}

/// Upload a song, or a subset of its notes, to the board.
pub fn send(
    path: &Path,
    filter: Option<BuzzerFilter>,
    start_us: Option<u64>,
    settings: &Settings,
) -> Result<()> {
    let song = load_song(path)?;
    let uploader = Uploader::serial(settings.device.clone());
    let mut report = |progress: TransferProgress| println!("{}", progress);

    let result = if filter.is_some() || start_us.is_some() {
        let filter = filter.unwrap_or_default();
        let notes: Vec<Note> = song
            .all_notes()
            .into_iter()
            .map(|(_, note)| note)
            .filter(|note| filter.matches(note.buzzer))
            .collect();
        uploader.send_notes(&notes, start_us, Some(&mut report), None)
    } else {
        uploader.send_song(&song, Some(&mut report), None)
    };
    let status = result.context("Upload failed")?;

    print_status(&status);
    Ok(())
}

/// Silence the board.
pub fn stop(settings: &Settings) -> Result<()> {
    let status = Uploader::serial(settings.device.clone())
        .send_stop()
        .context("Failed to stop playback")?;
    print_status(&status);
    Ok(())
}

fn print_status(status: &SendStatus) {
    if !status.is_sent() {
        warn!("Upload did not complete: {:?}", status);
    }
    println!("{}", status);
}
