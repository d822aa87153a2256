//! Export a song as a constant table for the board firmware.
//!
//! The generated header matches the firmware's `music/song.h` declarations:
//! `Note { uint32_t startUs; uint32_t endUs; uint8_t pitch; }`,
//! `Track { const Note* notes; size_t length; }` and
//! `Song { std::array<Track, 3> tracks; bool loop; }`.

use convert_case::{Case, Casing};

use crate::error::{FunzlError, Result};
use crate::song::{Note, Song};

/// Identifier base used when the song name has no usable characters.
pub const DEFAULT_FALLBACK_IDENTIFIER: &str = "Untitled";

/// Prefix for names that would otherwise start with a digit.
const DIGIT_PREFIX: &str = "Song";

/// C++ identifiers derived from a song name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentifiers {
    /// PascalCase namespace holding the note arrays.
    pub namespace: String,
    /// camelCase name of the `Song` constant.
    pub constant: String,
}

impl SourceIdentifiers {
    /// Keep ASCII letters and digits, treating everything else as a word
    /// break. Falls back to `fallback` when nothing is left and escapes a
    /// leading digit with a prefix.
    pub fn from_name(name: &str, fallback: &str) -> Self {
        let mut words = word_breaks(name);
        if words.trim().is_empty() {
            words = word_breaks(fallback);
        }
        if words.trim().is_empty() {
            words = DEFAULT_FALLBACK_IDENTIFIER.to_string();
        }

        let mut namespace = words.to_case(Case::Pascal);
        let mut constant = words.to_case(Case::Camel);
        if namespace.starts_with(|c: char| c.is_ascii_digit()) {
            namespace.insert_str(0, DIGIT_PREFIX);
            constant.insert_str(0, &DIGIT_PREFIX.to_ascii_lowercase());
        }
        Self {
            namespace,
            constant,
        }
    }
}

fn word_breaks(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect()
}

/// Render the song's channel assignments as a firmware header.
pub fn export_source(song: &Song) -> Result<String> {
    export_source_with(song, DEFAULT_FALLBACK_IDENTIFIER)
}

/// Like [`export_source`] with a custom fallback identifier.
pub fn export_source_with(song: &Song, fallback: &str) -> Result<String> {
    let ids = SourceIdentifiers::from_name(song.name(), fallback);
    let channels = song.buzzer_tracks();

    let mut out = String::new();
    out.push_str("#pragma once\n\n#include \"music/song.h\"\n\nnamespace Songs {\n");
    out.push_str(&format!("  namespace {} {{\n", ids.namespace));
    for (i, notes) in channels.iter().enumerate() {
        if notes.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "    inline constexpr Note track{}[{}] = {{\n",
            i + 1,
            notes.len()
        ));
        for note in notes {
            out.push_str(&format!("      {},\n", note_literal(note)?));
        }
        out.push_str("    };\n");
    }
    out.push_str("  }\n\n");

    out.push_str(&format!("  inline constexpr Song {} = {{{{{{\n", ids.constant));
    let entries: Vec<String> = channels
        .iter()
        .enumerate()
        .map(|(i, notes)| match notes.len() {
            0 => "      {nullptr, 0}".to_string(),
            len => format!("      {{{}::track{}, {}}}", ids.namespace, i + 1, len),
        })
        .collect();
    out.push_str(&entries.join(",\n"));
    out.push_str("\n    }},\n    false\n  };\n}\n");
    Ok(out)
}

fn note_literal(note: &Note) -> Result<String> {
    let end_us = note.end_us();
    let start = u32::try_from(note.start_us).map_err(|_| FunzlError::ValueOutOfRange {
        field: "start_us",
        value: note.start_us,
    })?;
    let end = u32::try_from(end_us).map_err(|_| FunzlError::ValueOutOfRange {
        field: "end_us",
        value: end_us,
    })?;
    Ok(format!("{{{}, {}, {}}}", start, end, note.pitch))
}
