//! Integration Tests
//!
//! End-to-end tests for the Funzl pipeline: MIDI import, buzzer scheduling,
//! serialization and upload.

use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use pretty_assertions::assert_eq;

use funzl::config::DeviceSettings;
use funzl::device::{SendStatus, SerialConnector, Uploader};
use funzl::scheduler::{auto_assign_buzzers, detect_conflicts, fix_overlaps, peak_concurrency};
use funzl::serialization::{encode_song, export_source, load, load_file, save, save_file};
use funzl::song::{Buzzer, NoteEdit, NoteId};
use funzl::{Result, Song};

fn note_event(delta: u32, key: u8, on: bool) -> TrackEvent<'static> {
    let message = if on {
        MidiMessage::NoteOn {
            key: u7::new(key),
            vel: u7::new(100),
        }
    } else {
        MidiMessage::NoteOff {
            key: u7::new(key),
            vel: u7::new(0),
        }
    };
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(0),
            message,
        },
    }
}

fn meta_event(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Meta(message),
    }
}

/// Four notes, at most three sounding together, at 120 bpm with 480 ticks
/// per beat.
fn write_midi_file(path: &Path) {
    let conductor = vec![
        meta_event(0, MetaMessage::Tempo(u24::new(500_000))),
        meta_event(0, MetaMessage::EndOfTrack),
    ];
    let chords = vec![
        meta_event(0, MetaMessage::TrackName(b"Chords")),
        note_event(0, 60, true),   // 0 - 1000 ms
        note_event(0, 64, true),   // 0 - 500 ms
        note_event(240, 67, true), // 250 - 750 ms
        note_event(240, 64, false),
        note_event(0, 72, true), // 500 - 1000 ms
        note_event(240, 67, false),
        note_event(240, 60, false),
        note_event(0, 72, false),
        meta_event(0, MetaMessage::EndOfTrack),
    ];
    let smf = Smf {
        header: Header::new(Format::Parallel, Timing::Metrical(u15::new(480))),
        tracks: vec![conductor, chords],
    };
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).unwrap();
    std::fs::write(path, bytes).unwrap();
}

fn imported_song(dir: &Path) -> Song {
    let path = dir.join("integration demo.mid");
    write_midi_file(&path);
    funzl::midi::import_file(&path).unwrap()
}

fn note_tuples(song: &Song) -> Vec<(NoteId, u64, u64, u8, u8, Buzzer)> {
    song.notes()
        .map(|(id, n)| (id, n.start_us, n.duration_us, n.pitch, n.velocity, n.buzzer))
        .collect()
}

// === Import and Scheduling ===

#[test]
fn test_import_produces_unassigned_notes() {
    let dir = tempfile::tempdir().unwrap();
    let song = imported_song(dir.path());

    assert_eq!(song.name(), "integration demo");
    assert_eq!(song.tracks().len(), 1);
    assert_eq!(song.tracks()[0].name(), "Chords");
    assert_eq!(song.notes_count(), 4);
    assert_eq!(song.duration_us(), 1_000_000);
    assert_eq!(song.pitch_range(), (60, 72));
    assert_eq!(song.buzzer_usage()[Buzzer::None], 4);
    assert!(song.error_notes().is_empty());
    assert_eq!(peak_concurrency(song.notes().map(|(_, n)| n)), 3);
}

#[test]
fn test_auto_assign_then_fix_leaves_no_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let mut song = imported_song(dir.path());

    let changes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&changes);
    let _subscription = song.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    auto_assign_buzzers(&mut song);
    assert_eq!(changes.load(Ordering::SeqCst), 1);
    assert!(song.error_notes().is_empty());
    assert!(detect_conflicts(&song).is_empty());
    assert_eq!(song.buzzer_usage()[Buzzer::None], 0);
    assert_eq!(song.buzzer_usage().total(), 4);

    // Force a clash and repair it.
    let ids: Vec<NoteId> = song.notes().map(|(id, _)| id).collect();
    for id in &ids {
        song.edit_note(*id, NoteEdit::Buzzer(Buzzer::Buzzer1)).unwrap();
    }
    assert!(!song.error_notes().is_empty());

    let shortened = fix_overlaps(&mut song);
    assert!(shortened > 0);
    assert!(song.error_notes().is_empty());
    assert!(song.notes().all(|(_, n)| n.end_us() >= n.start_us));
}

// === Serialization ===

#[test]
fn test_document_round_trip_after_scheduling() {
    let dir = tempfile::tempdir().unwrap();
    let mut song = imported_song(dir.path());
    auto_assign_buzzers(&mut song);

    let restored = load(&save(&song).unwrap());
    assert_eq!(restored.name(), song.name());
    assert_eq!(note_tuples(&restored), note_tuples(&song));

    let path = dir.path().join("song.json");
    save_file(&song, &path).unwrap();
    let from_file = load_file(&path).unwrap();
    assert_eq!(note_tuples(&from_file), note_tuples(&song));
    assert!(from_file.error_notes().is_empty());
}

#[test]
fn test_malformed_document_yields_empty_placeholder() {
    let song = load("{\"name\": 5}");
    assert_eq!(song.name(), "Invalid Song");
    assert!(song.tracks().is_empty());
}

#[test]
fn test_exports_cover_every_assigned_note() {
    let dir = tempfile::tempdir().unwrap();
    let mut song = imported_song(dir.path());
    auto_assign_buzzers(&mut song);

    let payload = encode_song(&song).unwrap();
    assert_eq!(payload.len(), 2 + 3 * 4 + 4 * 9 + 1);
    assert_eq!(&payload[..2], b"\nS");

    let source = export_source(&song).unwrap();
    assert!(source.starts_with("#pragma once\n"));
    assert!(source.contains("namespace IntegrationDemo {"));
    assert!(source.contains("inline constexpr Song integrationDemo = {{{"));
    assert!(!source.contains("nullptr"));
}

// === Upload ===

#[derive(Clone, Default)]
struct RecordingConnector {
    written: Arc<Mutex<Vec<u8>>>,
}

struct RecordingSink(Arc<Mutex<Vec<u8>>>);

impl Write for RecordingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialConnector for RecordingConnector {
    fn candidates(&self) -> Result<Vec<String>> {
        Ok(vec!["/dev/ttyACM0".to_string()])
    }

    fn open(&self, _port: &str) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(RecordingSink(Arc::clone(&self.written))))
    }
}

#[test]
fn test_upload_writes_encoded_song() {
    let dir = tempfile::tempdir().unwrap();
    let mut song = imported_song(dir.path());
    auto_assign_buzzers(&mut song);

    let connector = RecordingConnector::default();
    let settings = DeviceSettings {
        byte_delay_ms: 0,
        ..DeviceSettings::default()
    };
    let uploader = Uploader::new(connector.clone(), settings);

    let mut last_fraction = 0.0;
    let mut report = |p: funzl::device::TransferProgress| last_fraction = p.fraction();
    let status = uploader.send_song(&song, Some(&mut report), None).unwrap();

    assert_eq!(
        status,
        SendStatus::Sent {
            port: "/dev/ttyACM0".to_string()
        }
    );
    assert_eq!(*connector.written.lock().unwrap(), encode_song(&song).unwrap());
    assert!(last_fraction < 1.0);
}
