//! # Key Estimation Module
//!
//! Infers the most likely musical key from a recorded sequence of note
//! names. The sequence is collapsed to a 12-bucket pitch-class histogram,
//! and every major and natural minor scale is scored against it: in-scale
//! occurrences count +2, out-of-scale occurrences count -1.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::notes::{note_to_pitch_class, NOTE_NAMES};

/// Semitone offsets of the major scale from its root.
pub const MAJOR_SCALE: [usize; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Semitone offsets of the natural minor scale from its root.
pub const MINOR_SCALE: [usize; 7] = [0, 2, 3, 5, 7, 8, 10];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

/// Best-scoring key for a recorded note sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEstimate {
    /// Root pitch class, 0-11 with C = 0.
    pub root: usize,
    pub mode: Mode,
    /// Raw scale-match score.
    pub score: i32,
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "Major",
            Mode::Minor => "Minor",
        };
        write!(f, "{} {}", NOTE_NAMES[self.root % 12], mode)
    }
}

fn scale_score(counts: &[u32; 12], root: usize, scale: &[usize; 7]) -> i32 {
    let mut score = 0i32;
    for pitch_class in 0..12 {
        let in_scale = scale
            .iter()
            .any(|&interval| (root + interval) % 12 == pitch_class);
        let count = counts[pitch_class] as i32;
        score += if in_scale { 2 * count } else { -count };
    }
    score
}

/// Scores all 24 candidate keys against the note sequence and returns the
/// winner.
///
/// Octave digits are stripped from the note names; unrecognized names are
/// skipped. Candidates are evaluated root-ascending with major before minor
/// at each root, and only a strictly higher score displaces the incumbent,
/// so ties keep the earliest candidate. Empty input yields `None`.
pub fn estimate_key<S: AsRef<str>>(notes: &[S]) -> Option<KeyEstimate> {
    if notes.is_empty() {
        return None;
    }

    let mut counts = [0u32; 12];
    for note in notes {
        if let Some(pitch_class) = note_to_pitch_class(note.as_ref()) {
            counts[pitch_class] += 1;
        }
    }

    let mut best: Option<KeyEstimate> = None;
    for root in 0..12 {
        for (mode, scale) in [(Mode::Major, &MAJOR_SCALE), (Mode::Minor, &MINOR_SCALE)] {
            let score = scale_score(&counts, root, scale);
            if best.is_none_or(|current| score > current.score) {
                best = Some(KeyEstimate { root, mode, score });
            }
        }
    }

    log::debug!(
        "key estimate over {} notes: {:?}",
        notes.len(),
        best.map(|k| k.to_string())
    );
    best
}
