//! # Spectral Transform Module
//!
//! This module turns fixed-size frames of time-domain samples into magnitude
//! spectra for peak analysis.
//!
//! ## Features
//! - High-performance FFT using RustFFT, planned once at construction
//! - Hann windowing for reduced spectral leakage
//! - Normalized magnitude output (`sqrt(re² + im²) / N`)
//! - Reusable scratch buffers, so the per-frame path never allocates

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Windowed forward FFT with preallocated working storage.
///
/// The transform plan and window coefficients are created once; `analyze` is
/// a pure function of its input frame and carries no state between calls.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    size: usize,
}

impl SpectrumAnalyzer {
    /// Creates an analyzer for frames of `fft_size` samples.
    ///
    /// # Panics
    /// * If `fft_size` is not a power of two
    pub fn new(fft_size: usize) -> Self {
        if !fft_size.is_power_of_two() {
            panic!("FFT size must be a power of two");
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Symmetric Hann window: w(n) = 0.5 * (1 - cos(2π * n / (N-1)))
        let n_minus_1 = (fft_size - 1) as f32;
        let window = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
            .collect();

        let fft_scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];

        Self {
            scratch: vec![Complex::default(); fft_size],
            fft_scratch,
            magnitudes: vec![0.0; fft_size / 2],
            window,
            fft,
            size: fft_size,
        }
    }

    /// Frame length this analyzer was built for.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Windows the frame, runs the forward transform, and returns the
    /// magnitude spectrum (first N/2 bins, normalized by N).
    ///
    /// # Panics
    /// * If the frame length does not match the FFT size
    pub fn analyze(&mut self, frame: &[f32]) -> &[f32] {
        if frame.len() != self.size {
            panic!("Input frame size must be equal to the FFT size");
        }

        for ((slot, &sample), &coeff) in self.scratch.iter_mut().zip(frame).zip(&self.window) {
            *slot = Complex {
                re: sample * coeff,
                im: 0.0,
            };
        }

        self.fft
            .process_with_scratch(&mut self.scratch, &mut self.fft_scratch);

        let scale = self.size as f32;
        for (magnitude, bin) in self.magnitudes.iter_mut().zip(&self.scratch) {
            *magnitude = bin.norm() / scale;
        }

        &self.magnitudes
    }
}

/// Refines a spectral peak location with a three-point parabolic fit:
/// `delta = 0.5 * (left - right) / (left - 2*center + right)`.
///
/// Falls back to the integer bin when the curvature denominator is too close
/// to zero to trust, or when the bin has no neighbour on either side.
pub fn refine_peak_index(magnitudes: &[f32], bin: usize) -> f32 {
    if bin == 0 || bin + 1 >= magnitudes.len() {
        return bin as f32;
    }

    let left = magnitudes[bin - 1];
    let center = magnitudes[bin];
    let right = magnitudes[bin + 1];

    let denominator = left - 2.0 * center + right;
    if denominator.abs() > 1e-4 {
        bin as f32 + 0.5 * (left - right) / denominator
    } else {
        bin as f32
    }
}

/// Converts a (possibly fractional) bin index to a frequency in Hz.
pub fn bin_to_frequency(bin: f32, sample_rate: f32, fft_size: usize) -> f32 {
    bin * sample_rate / fft_size as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_frame(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let sample_rate = 44100.0;
        let size = 2048;
        let mut analyzer = SpectrumAnalyzer::new(size);

        // Exact bin 20 frequency, so all energy lands in one main lobe.
        let frequency = bin_to_frequency(20.0, sample_rate, size);
        let frame = sine_frame(frequency, sample_rate, size);
        let magnitudes = analyzer.analyze(&frame);

        let peak_bin = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, 20);
        assert!(magnitudes[20] > 0.1);
    }

    #[test]
    fn silence_has_no_energy() {
        let mut analyzer = SpectrumAnalyzer::new(1024);
        let magnitudes = analyzer.analyze(&vec![0.0; 1024]);
        assert!(magnitudes.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn refinement_is_symmetric_for_centered_peaks() {
        let magnitudes = [0.0, 0.5, 1.0, 0.5, 0.0];
        assert_eq!(refine_peak_index(&magnitudes, 2), 2.0);
    }

    #[test]
    fn refinement_shifts_toward_heavier_neighbour() {
        let magnitudes = [0.0, 0.4, 1.0, 0.8, 0.0];
        let refined = refine_peak_index(&magnitudes, 2);
        assert!(refined > 2.0 && refined < 3.0);
    }

    #[test]
    fn flat_top_falls_back_to_integer_bin() {
        let magnitudes = [0.0, 0.5, 0.5, 0.5, 0.0];
        assert_eq!(refine_peak_index(&magnitudes, 2), 2.0);
    }

    #[test]
    fn edge_bins_are_not_refined() {
        let magnitudes = [1.0, 0.5, 0.2];
        assert_eq!(refine_peak_index(&magnitudes, 0), 0.0);
        assert_eq!(refine_peak_index(&magnitudes, 2), 2.0);
    }
}
