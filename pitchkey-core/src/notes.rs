//! # Note Mapping Module
//!
//! This module provides the musical reference tables for the detector:
//! note name conversions, MIDI/frequency calculations, and the
//! frequency-range lookup used by the monophonic detector.
//!
//! ## Features
//! - Equal temperament frequency calculations with A4 = 440 Hz
//! - Frequency to MIDI note conversion with range validation
//! - Pitch class extraction from note names (octave and flats aware)
//! - Frequency-range table for MIDI notes 24 (C1) to 96 (C7)

use once_cell::sync::Lazy;

/// The twelve pitch-class names, C through B, using sharps.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Lowest MIDI note covered by the frequency-range table (C1, ~33 Hz).
pub const RANGE_TABLE_LOW: i32 = 24;
/// Highest MIDI note covered by the frequency-range table (C7).
pub const RANGE_TABLE_HIGH: i32 = 96;

/// Converts a MIDI note number to its equal temperament frequency.
///
/// The formula is f = 440 * 2^((midi - 69) / 12), anchoring A4 at 440 Hz.
pub fn midi_to_frequency(midi_note: i32) -> f32 {
    440.0 * 2.0_f32.powf((midi_note - 69) as f32 / 12.0)
}

/// Converts a frequency in Hz to the nearest MIDI note number.
///
/// Returns `None` for non-positive frequencies or results outside the
/// 0-127 MIDI range.
pub fn frequency_to_midi(frequency: f32) -> Option<i32> {
    if frequency <= 0.0 {
        return None;
    }
    let midi_note = (69.0 + 12.0 * (frequency / 440.0).log2()).round() as i32;
    if (0..=127).contains(&midi_note) {
        Some(midi_note)
    } else {
        None
    }
}

/// Returns the bare pitch-class name for a MIDI note (e.g. 61 -> "C#").
pub fn midi_note_name(midi_note: i32) -> &'static str {
    NOTE_NAMES[midi_note.rem_euclid(12) as usize]
}

/// Returns the note name with its octave (e.g. 61 -> "C#4").
///
/// Octave numbering follows the MIDI convention where middle C (60) is C4.
pub fn midi_note_name_with_octave(midi_note: i32) -> String {
    let octave = midi_note.div_euclid(12) - 1;
    format!("{}{}", midi_note_name(midi_note), octave)
}

/// Extracts the pitch class (0-11, C = 0) from a note name.
///
/// Trailing octave digits are ignored, so "C#4" and "C#" both map to 1.
/// Flat spellings are accepted alongside sharps. Unknown names yield `None`.
pub fn note_to_pitch_class(name: &str) -> Option<usize> {
    let bare = name.trim_end_matches(|c: char| c.is_ascii_digit());
    match bare {
        "C" => Some(0),
        "C#" | "Db" => Some(1),
        "D" => Some(2),
        "D#" | "Eb" => Some(3),
        "E" => Some(4),
        "F" => Some(5),
        "F#" | "Gb" => Some(6),
        "G" => Some(7),
        "G#" | "Ab" => Some(8),
        "A" => Some(9),
        "A#" | "Bb" => Some(10),
        "B" => Some(11),
        _ => None,
    }
}

/// One entry of the frequency-to-note lookup table.
#[derive(Debug, Clone)]
pub struct NoteRange {
    /// MIDI note number this range maps to.
    pub midi_note: i32,
    /// Bare pitch-class name (no octave).
    pub name: &'static str,
    /// Equal temperament center frequency in Hz.
    pub center_frequency: f32,
    /// Lower boundary (inclusive) in Hz.
    pub min_frequency: f32,
    /// Upper boundary (exclusive) in Hz.
    pub max_frequency: f32,
}

/// Frequency ranges for MIDI notes 24 (C1, ~33 Hz) to 96 (C7), covering bass
/// instruments through the top of a piano's useful detection range.
///
/// Each boundary sits at the geometric mean with the neighbouring semitone,
/// so the ranges tile the spectrum contiguously without overlap. Built once
/// at first use and immutable thereafter.
pub static NOTE_RANGES: Lazy<Vec<NoteRange>> = Lazy::new(|| {
    (RANGE_TABLE_LOW..=RANGE_TABLE_HIGH)
        .map(|midi_note| {
            let center = midi_to_frequency(midi_note);
            let lower = midi_to_frequency(midi_note - 1);
            let upper = midi_to_frequency(midi_note + 1);
            NoteRange {
                midi_note,
                name: midi_note_name(midi_note),
                center_frequency: center,
                min_frequency: (lower * center).sqrt(),
                max_frequency: (center * upper).sqrt(),
            }
        })
        .collect()
});

/// Looks up the note whose range contains `frequency`.
///
/// Returns `None` for frequencies outside the table.
pub fn find_note_for_frequency(frequency: f32) -> Option<&'static NoteRange> {
    NOTE_RANGES
        .iter()
        .find(|range| frequency >= range.min_frequency && frequency < range.max_frequency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_440() {
        assert!((midi_to_frequency(69) - 440.0).abs() < 1e-3);
        assert_eq!(frequency_to_midi(440.0), Some(69));
    }

    #[test]
    fn frequency_to_midi_rejects_out_of_range() {
        assert_eq!(frequency_to_midi(0.0), None);
        assert_eq!(frequency_to_midi(-10.0), None);
        assert_eq!(frequency_to_midi(1.0), None); // far below MIDI 0
        assert_eq!(frequency_to_midi(30000.0), None); // above MIDI 127
    }

    #[test]
    fn note_names_with_octave() {
        assert_eq!(midi_note_name_with_octave(60), "C4");
        assert_eq!(midi_note_name_with_octave(69), "A4");
        assert_eq!(midi_note_name_with_octave(61), "C#4");
    }

    #[test]
    fn pitch_class_strips_octave_and_accepts_flats() {
        assert_eq!(note_to_pitch_class("C"), Some(0));
        assert_eq!(note_to_pitch_class("C#4"), Some(1));
        assert_eq!(note_to_pitch_class("Db"), Some(1));
        assert_eq!(note_to_pitch_class("Bb3"), Some(10));
        assert_eq!(note_to_pitch_class("H"), None);
        assert_eq!(note_to_pitch_class(""), None);
    }

    #[test]
    fn range_table_round_trips_every_note() {
        for midi_note in RANGE_TABLE_LOW..=RANGE_TABLE_HIGH {
            let freq = midi_to_frequency(midi_note);
            let range = find_note_for_frequency(freq)
                .unwrap_or_else(|| panic!("no range for MIDI {midi_note}"));
            assert_eq!(range.midi_note, midi_note);
        }
    }

    #[test]
    fn range_table_is_contiguous() {
        for pair in NOTE_RANGES.windows(2) {
            let diff = (pair[0].max_frequency - pair[1].min_frequency).abs();
            assert!(diff < 1e-3, "gap between MIDI {} and {}", pair[0].midi_note, pair[1].midi_note);
        }
    }

    #[test]
    fn out_of_table_frequencies_map_to_none() {
        assert!(find_note_for_frequency(10.0).is_none());
        assert!(find_note_for_frequency(5000.0).is_none());
    }
}
