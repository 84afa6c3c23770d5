//! # Detector Contract Module
//!
//! The shared contract and scaffolding for the two detector variants: the
//! tunable configuration, the [`NoteDetector`] trait both implement, the
//! cross-thread output handle, and the FIFO-plus-FFT front end that drains
//! full analysis frames out of the incoming block stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::fifo::SampleFifo;
use crate::spectrum::SpectrumAnalyzer;
use crate::DetectedNote;

/// Tunable parameters shared by both detector variants.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Minimum normalized magnitude a spectral peak must reach (default: 0.02)
    pub magnitude_threshold: f32,

    /// RMS level below which an incoming block counts as silence
    /// (default: 0.001)
    pub noise_gate_threshold: f32,

    /// Maximum simultaneous notes the polyphonic variant reports (default: 4)
    pub max_polyphony: usize,

    /// Relative tolerance when matching a peak against integer multiples of a
    /// lower fundamental (default: 0.10)
    pub harmonic_tolerance: f32,

    /// Notes weaker than this fraction of the strongest note's magnitude are
    /// dropped (default: 0.40)
    pub relative_magnitude_cutoff: f32,

    /// Consecutive frames a note must persist before the monophonic variant
    /// reports it (default: 2)
    pub stability_frames: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            magnitude_threshold: 0.02,
            noise_gate_threshold: 0.001,
            max_polyphony: 4,
            harmonic_tolerance: 0.10,
            relative_magnitude_cutoff: 0.40,
            stability_frames: 2,
        }
    }
}

/// Capability set shared by the polyphonic and monophonic detectors.
///
/// `process_block` runs on the audio thread and stays bounded and
/// allocation-light; the read-side methods only copy a small fixed-size
/// value list and are safe from any thread.
pub trait NoteDetector {
    /// (Re)configures the detector for a sample rate and the host's maximum
    /// block size, clearing all internal state.
    fn prepare(&mut self, sample_rate: f32, max_block_size: usize);

    /// Feeds one block of mono samples from the real-time callback.
    fn process_block(&mut self, samples: &[f32]);

    /// Snapshot of the stabilized detected notes, strongest first.
    fn detected_notes(&self) -> Vec<DetectedNote>;

    /// Noise-gate state of the most recently processed block.
    fn is_active(&self) -> bool;

    /// Clears buffers, history, and published output.
    fn reset(&mut self);

    /// Sets the minimum peak magnitude, clamped to [0.0, 1.0].
    fn set_magnitude_threshold(&mut self, threshold: f32);

    /// Sets the RMS silence threshold, clamped to [0.0, 1.0].
    fn set_noise_gate_threshold(&mut self, threshold: f32);

    /// Read handle other threads can poll without touching the detector.
    fn output_handle(&self) -> OutputHandle;
}

#[derive(Default)]
struct SharedOutput {
    notes: Mutex<Vec<DetectedNote>>,
    active: AtomicBool,
}

/// Cloneable read handle onto a detector's published output.
///
/// The detector publishes a fresh note list each analysis frame; readers
/// take a complete copy under a lock that is never held during spectral
/// work.
#[derive(Clone, Default)]
pub struct OutputHandle {
    shared: Arc<SharedOutput>,
}

impl OutputHandle {
    /// Copies the current magnitude-sorted note list.
    pub fn detected_notes(&self) -> Vec<DetectedNote> {
        self.shared
            .notes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Whether the most recent block cleared the noise gate.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Relaxed)
    }

    pub(crate) fn publish(&self, notes: &[DetectedNote]) {
        let mut guard = self
            .shared
            .notes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clear();
        guard.extend_from_slice(notes);
    }

    pub(crate) fn clear(&self) {
        self.shared
            .notes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.shared.active.store(active, Ordering::Relaxed);
    }
}

/// RMS level of one audio block: `sqrt(mean(sample²))`.
pub fn block_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// FIFO accumulation plus windowed FFT, shared by both detector variants.
pub(crate) struct AnalysisFrontEnd {
    fifo: SampleFifo,
    frame: Vec<f32>,
    analyzer: SpectrumAnalyzer,
}

impl AnalysisFrontEnd {
    pub(crate) fn new(fft_size: usize) -> Self {
        Self {
            fifo: SampleFifo::new(fft_size),
            frame: vec![0.0; fft_size],
            analyzer: SpectrumAnalyzer::new(fft_size),
        }
    }

    pub(crate) fn fft_size(&self) -> usize {
        self.frame.len()
    }

    /// Buffers one block; once a full analysis frame has accumulated, drains
    /// it and returns the magnitude spectrum.
    pub(crate) fn push_block(&mut self, samples: &[f32]) -> Option<&[f32]> {
        self.fifo.write(samples);
        if self.fifo.ready() >= self.frame.len() {
            self.fifo.read_into(&mut self.frame);
            Some(self.analyzer.analyze(&self.frame))
        } else {
            None
        }
    }

    pub(crate) fn reset(&mut self) {
        self.fifo.reset();
        self.frame.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(block_rms(&[]), 0.0);
        assert_eq!(block_rms(&[0.0; 64]), 0.0);
    }

    #[test]
    fn rms_of_constant_signal() {
        let rms = block_rms(&[0.5; 128]);
        assert!((rms - 0.5).abs() < 1e-6);
    }

    #[test]
    fn thresholds_default_to_host_values() {
        let config = DetectorConfig::default();
        assert_eq!(config.magnitude_threshold, 0.02);
        assert_eq!(config.noise_gate_threshold, 0.001);
        assert_eq!(config.max_polyphony, 4);
    }

    #[test]
    fn front_end_yields_frame_only_when_full() {
        let mut front_end = AnalysisFrontEnd::new(1024);
        assert!(front_end.push_block(&vec![0.1; 512]).is_none());
        assert!(front_end.push_block(&vec![0.1; 512]).is_some());
        // Drained: the next partial block does not produce another frame.
        assert!(front_end.push_block(&vec![0.1; 512]).is_none());
    }

    #[test]
    fn output_handle_starts_empty_and_inactive() {
        let handle = OutputHandle::default();
        assert!(handle.detected_notes().is_empty());
        assert!(!handle.is_active());
    }

    #[test]
    fn publish_replaces_previous_snapshot() {
        let handle = OutputHandle::default();
        let note = DetectedNote {
            name: "A4".to_string(),
            frequency: 440.0,
            magnitude: 0.5,
            midi_note: 69,
        };
        handle.publish(std::slice::from_ref(&note));
        assert_eq!(handle.detected_notes().len(), 1);

        handle.clear();
        assert!(handle.detected_notes().is_empty());
    }
}
