//! # Monophonic Detector Module
//!
//! Single-voice note detection with multi-frame confirmation. Each analysis
//! frame contributes at most one candidate (the strongest spectral peak,
//! mapped through the frequency-range table); a note only becomes visible
//! once it has persisted for a configurable number of consecutive frames,
//! which rejects single-frame transients and noise spikes at the cost of one
//! extra frame of latency.

use crate::detector::{block_rms, AnalysisFrontEnd, DetectorConfig, NoteDetector, OutputHandle};
use crate::notes::find_note_for_frequency;
use crate::spectrum::{bin_to_frequency, refine_peak_index};
use crate::DetectedNote;

/// Analysis window length for the monophonic variant. The longer window
/// buys the frequency resolution needed to separate low bass semitones.
pub const MONO_FFT_SIZE: usize = 4096;

/// First bin considered when searching for the strongest peak. Bin 2 at a
/// 4096-point transform and 44.1 kHz is ~21 Hz, keeping low E on a bass
/// (~41 Hz) in range while excluding DC.
const PEAK_SEARCH_START: usize = 2;

/// Resolves the single strongest peak of one magnitude spectrum into a note.
///
/// Returns `None` when no bin clears the magnitude threshold or when the
/// refined frequency falls outside the note range table.
pub fn resolve_monophonic(
    magnitudes: &[f32],
    sample_rate: f32,
    magnitude_threshold: f32,
) -> Option<DetectedNote> {
    if magnitudes.len() <= PEAK_SEARCH_START + 1 {
        return None;
    }
    let fft_size = magnitudes.len() * 2;

    let mut strongest_bin = PEAK_SEARCH_START;
    let mut strongest_magnitude = magnitudes[PEAK_SEARCH_START];
    for (i, &magnitude) in magnitudes.iter().enumerate().skip(PEAK_SEARCH_START + 1) {
        if magnitude > strongest_magnitude {
            strongest_magnitude = magnitude;
            strongest_bin = i;
        }
    }

    if strongest_magnitude <= magnitude_threshold {
        return None;
    }

    let refined = refine_peak_index(magnitudes, strongest_bin);
    let frequency = bin_to_frequency(refined, sample_rate, fft_size);

    let range = find_note_for_frequency(frequency)?;
    Some(DetectedNote {
        name: range.name.to_string(),
        frequency,
        magnitude: strongest_magnitude,
        midi_note: range.midi_note,
    })
}

#[derive(Debug)]
struct NoteHistory {
    midi_note: i32,
    consecutive_frames: usize,
    total_magnitude: f32,
}

/// Frame-to-frame persistence filter.
///
/// Tracks per-note consecutive-frame counts; a note disappearing from the
/// candidate set loses its history immediately, with no grace period.
#[derive(Debug)]
pub struct StabilityFilter {
    history: Vec<NoteHistory>,
    frames_required: usize,
}

impl StabilityFilter {
    pub fn new(frames_required: usize) -> Self {
        Self {
            history: Vec::new(),
            frames_required,
        }
    }

    /// Feeds one frame's candidates and returns the confirmed notes, sorted
    /// strongest first. Confirmed notes carry the current frame's magnitude,
    /// not the accumulated one.
    pub fn update(&mut self, candidates: &[DetectedNote]) -> Vec<DetectedNote> {
        for candidate in candidates {
            match self
                .history
                .iter_mut()
                .find(|entry| entry.midi_note == candidate.midi_note)
            {
                Some(entry) => {
                    entry.consecutive_frames += 1;
                    entry.total_magnitude += candidate.magnitude;
                }
                None => self.history.push(NoteHistory {
                    midi_note: candidate.midi_note,
                    consecutive_frames: 1,
                    total_magnitude: candidate.magnitude,
                }),
            }
        }

        // Absence is terminal.
        self.history
            .retain(|entry| candidates.iter().any(|c| c.midi_note == entry.midi_note));

        let mut confirmed: Vec<DetectedNote> = self
            .history
            .iter()
            .filter(|entry| entry.consecutive_frames >= self.frames_required)
            .filter_map(|entry| {
                candidates
                    .iter()
                    .find(|c| c.midi_note == entry.midi_note)
                    .cloned()
            })
            .collect();

        confirmed.sort_by(|a, b| {
            b.magnitude
                .partial_cmp(&a.magnitude)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        confirmed
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Real-time monophonic note detector (single dominant voice).
pub struct MonophonicDetector {
    front_end: AnalysisFrontEnd,
    config: DetectorConfig,
    sample_rate: f32,
    stability: StabilityFilter,
    output: OutputHandle,
}

impl MonophonicDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let stability = StabilityFilter::new(config.stability_frames);
        Self {
            front_end: AnalysisFrontEnd::new(MONO_FFT_SIZE),
            config,
            sample_rate: 44100.0,
            stability,
            output: OutputHandle::default(),
        }
    }
}

impl Default for MonophonicDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl NoteDetector for MonophonicDetector {
    fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        log::debug!(
            "monophonic detector prepared: sample_rate={} Hz, max_block={} samples, fft={}",
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
            let candidate =
                resolve_monophonic(magnitudes, self.sample_rate, self.config.magnitude_threshold);
            let confirmed = match &candidate {
                Some(note) => self.stability.update(std::slice::from_ref(note)),
                None => self.stability.update(&[]),
            };
            self.output.publish(&confirmed);
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
        self.stability.reset();
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
