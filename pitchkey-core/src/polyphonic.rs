//! # Polyphonic Detector Module
//!
//! Multi-peak note detection for chords and intervals. Finds local maxima in
//! the magnitude spectrum, discards harmonics of lower fundamentals, refines
//! the survivors to sub-bin accuracy, and gates out weak spectral leakage
//! relative to the strongest note.

use crate::detector::{block_rms, AnalysisFrontEnd, DetectorConfig, NoteDetector, OutputHandle};
use crate::notes::{frequency_to_midi, midi_note_name_with_octave};
use crate::spectrum::{bin_to_frequency, refine_peak_index};
use crate::DetectedNote;

/// Analysis window length for the polyphonic variant.
pub const POLY_FFT_SIZE: usize = 2048;

/// First bin considered during peak search. Bins below this carry DC and
/// rectification artifacts.
const PEAK_SEARCH_START: usize = 4;

/// Harmonic multiples checked against accepted fundamentals.
const HARMONIC_MULTIPLES: [f32; 3] = [2.0, 3.0, 4.0];

/// Resolves up to `max_polyphony` fundamentals from one magnitude spectrum.
///
/// Peaks are ranked by magnitude, filtered for harmonics in ascending
/// frequency order (so a fundamental is always accepted before its multiples
/// are considered), refined by parabolic interpolation, and finally gated
/// against the strongest survivor. The returned notes are sorted strongest
/// first.
pub fn resolve_polyphonic(
    magnitudes: &[f32],
    sample_rate: f32,
    config: &DetectorConfig,
) -> Vec<DetectedNote> {
    let fft_size = magnitudes.len() * 2;

    let mut peaks: Vec<usize> = Vec::new();
    for i in PEAK_SEARCH_START..magnitudes.len().saturating_sub(1) {
        if magnitudes[i] > config.magnitude_threshold
            && magnitudes[i] > magnitudes[i - 1]
            && magnitudes[i] > magnitudes[i + 1]
        {
            peaks.push(i);
        }
    }

    // Strongest candidates first, capped at the polyphony limit.
    peaks.sort_by(|&a, &b| {
        magnitudes[b]
            .partial_cmp(&magnitudes[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    peaks.truncate(config.max_polyphony);

    // Harmonic suppression walks the retained peaks in ascending frequency
    // order; a candidate near an integer multiple of an accepted lower peak
    // is a harmonic, not a played note.
    peaks.sort_unstable();
    let mut fundamentals: Vec<usize> = Vec::with_capacity(peaks.len());
    'candidates: for &bin in &peaks {
        let frequency = bin_to_frequency(bin as f32, sample_rate, fft_size);
        for &accepted in &fundamentals {
            let base = bin_to_frequency(accepted as f32, sample_rate, fft_size);
            for multiple in HARMONIC_MULTIPLES {
                let harmonic = base * multiple;
                if (frequency - harmonic).abs() <= harmonic * config.harmonic_tolerance {
                    continue 'candidates;
                }
            }
        }
        fundamentals.push(bin);
    }

    let mut notes: Vec<DetectedNote> = fundamentals
        .iter()
        .filter_map(|&bin| {
            let refined = refine_peak_index(magnitudes, bin);
            let frequency = bin_to_frequency(refined, sample_rate, fft_size);
            let midi_note = frequency_to_midi(frequency)?;
            Some(DetectedNote {
                name: midi_note_name_with_octave(midi_note),
                frequency,
                magnitude: magnitudes[bin],
                midi_note,
            })
        })
        .collect();

    notes.sort_by(|a, b| {
        b.magnitude
            .partial_cmp(&a.magnitude)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Leakage that survived harmonic filtering but sits far below the
    // strongest note is not a genuinely played note.
    if let Some(strongest) = notes.first().map(|note| note.magnitude) {
        let cutoff = strongest * config.relative_magnitude_cutoff;
        notes.retain(|note| note.magnitude >= cutoff);
    }

    notes
}

/// Real-time polyphonic note detector (up to four simultaneous notes).
pub struct PolyphonicDetector {
    front_end: AnalysisFrontEnd,
    config: DetectorConfig,
    sample_rate: f32,
    output: OutputHandle,
}

impl PolyphonicDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            front_end: AnalysisFrontEnd::new(POLY_FFT_SIZE),
            config,
            sample_rate: 44100.0,
            output: OutputHandle::default(),
        }
    }
}

impl Default for PolyphonicDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl NoteDetector for PolyphonicDetector {
    fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        log::debug!(
            "polyphonic detector prepared: sample_rate={} Hz, max_block={} samples, fft={}",
            sample_rate,
            max_block_size,
            self.front_end.fft_size()
        );
        self.sample_rate = sample_rate;
        self.reset();
    }

    fn process_block(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        if block_rms(samples) < self.config.noise_gate_threshold {
            self.output.set_active(false);
            self.output.clear();
            return;
        }
        self.output.set_active(true);

        if let Some(magnitudes) = self.front_end.push_block(samples) {
            let notes = resolve_polyphonic(magnitudes, self.sample_rate, &self.config);
            self.output.publish(&notes);
        }
    }

    fn detected_notes(&self) -> Vec<DetectedNote> {
        self.output.detected_notes()
    }

    fn is_active(&self) -> bool {
        self.output.is_active()
    }

    fn reset(&mut self) {
        self.front_end.reset();
        self.output.clear();
        self.output.set_active(false);
    }

    fn set_magnitude_threshold(&mut self, threshold: f32) {
        self.config.magnitude_threshold = threshold.clamp(0.0, 1.0);
    }

    fn set_noise_gate_threshold(&mut self, threshold: f32) {
        self.config.noise_gate_threshold = threshold.clamp(0.0, 1.0);
    }

    fn output_handle(&self) -> OutputHandle {
        self.output.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    /// Magnitude spectrum of `POLY_FFT_SIZE / 2` bins with isolated spikes.
    fn spectrum_with_peaks(peaks: &[(usize, f32)]) -> Vec<f32> {
        let mut magnitudes = vec![0.0; POLY_FFT_SIZE / 2];
        for &(bin, magnitude) in peaks {
            magnitudes[bin] = magnitude;
        }
        magnitudes
    }

    #[test]
    fn harmonics_collapse_to_the_fundamental() {
        // f, 2f, 3f at exact multiples: only the fundamental survives.
        let magnitudes = spectrum_with_peaks(&[(10, 0.5), (20, 0.3), (30, 0.2)]);
        let notes = resolve_polyphonic(&magnitudes, SAMPLE_RATE, &DetectorConfig::default());

        assert_eq!(notes.len(), 1);
        let expected = bin_to_frequency(10.0, SAMPLE_RATE, POLY_FFT_SIZE);
        assert!((notes[0].frequency - expected).abs() < 1.0);
    }

    #[test]
    fn near_multiples_within_tolerance_are_suppressed() {
        // Bin 21 is within 10% of 2x bin 10.
        let magnitudes = spectrum_with_peaks(&[(10, 0.5), (21, 0.4)]);
        let notes = resolve_polyphonic(&magnitudes, SAMPLE_RATE, &DetectorConfig::default());
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn unrelated_peaks_both_survive() {
        // Bin 17 is no 2x/3x/4x multiple of bin 10 within tolerance.
        let magnitudes = spectrum_with_peaks(&[(10, 0.5), (17, 0.4)]);
        let notes = resolve_polyphonic(&magnitudes, SAMPLE_RATE, &DetectorConfig::default());
        assert_eq!(notes.len(), 2);
        assert!(notes[0].magnitude >= notes[1].magnitude);
    }

    #[test]
    fn relative_gate_boundary() {
        let config = DetectorConfig::default();

        let just_below = spectrum_with_peaks(&[(10, 1.0), (17, 0.39)]);
        let notes = resolve_polyphonic(&just_below, SAMPLE_RATE, &config);
        assert_eq!(notes.len(), 1);

        let just_above = spectrum_with_peaks(&[(10, 1.0), (17, 0.41)]);
        let notes = resolve_polyphonic(&just_above, SAMPLE_RATE, &config);
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn polyphony_is_capped() {
        let magnitudes = spectrum_with_peaks(&[
            (10, 0.9),
            (17, 0.8),
            (26, 0.7),
            (37, 0.6),
            (53, 0.55),
            (71, 0.5),
        ]);
        let notes = resolve_polyphonic(&magnitudes, SAMPLE_RATE, &DetectorConfig::default());
        assert!(notes.len() <= 4);
    }

    #[test]
    fn sub_threshold_spectrum_yields_nothing() {
        let magnitudes = spectrum_with_peaks(&[(10, 0.01)]);
        let notes = resolve_polyphonic(&magnitudes, SAMPLE_RATE, &DetectorConfig::default());
        assert!(notes.is_empty());
    }

    #[test]
    fn low_bins_are_ignored() {
        // A spike inside the excluded DC region is not a peak.
        let magnitudes = spectrum_with_peaks(&[(2, 0.9)]);
        let notes = resolve_polyphonic(&magnitudes, SAMPLE_RATE, &DetectorConfig::default());
        assert!(notes.is_empty());
    }

    #[test]
    fn notes_carry_midi_numbers_and_octave_names() {
        // Bin 20 at 44.1 kHz / 2048 is 430.66 Hz, rounding to A4 (MIDI 69).
        let magnitudes = spectrum_with_peaks(&[(20, 0.5)]);
        let notes = resolve_polyphonic(&magnitudes, SAMPLE_RATE, &DetectorConfig::default());
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].midi_note, 69);
        assert_eq!(notes[0].name, "A4");
    }
}
