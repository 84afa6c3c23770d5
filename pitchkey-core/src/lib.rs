// pitchkey-core/src/lib.rs

//! The core logic for the real-time note and key detector.
//! This crate is responsible for audio capture, spectral analysis,
//! note resolution, stability filtering, and key estimation. It is
//! completely headless and contains no GUI code.

pub mod audio;
pub mod detector;
pub mod fifo;
pub mod key;
pub mod monophonic;
pub mod notes;
pub mod polyphonic;
pub mod session;
pub mod spectrum;

/// A single note resolved from the current analysis frame.
///
/// Rebuilt wholesale every frame; never mutated after construction. When a
/// detector publishes a list, it is sorted strictly descending by magnitude.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedNote {
    /// Note name: with octave for the polyphonic variant (e.g. "C#4"),
    /// bare pitch class for the monophonic one (e.g. "C#").
    pub name: String,
    /// Frequency in Hz after sub-bin refinement.
    pub frequency: f32,
    /// Normalized spectral magnitude.
    pub magnitude: f32,
    /// MIDI note number (0-127), or -1 when the frequency maps to no note.
    pub midi_note: i32,
}
