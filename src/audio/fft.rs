use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::AudioFrame;
use crate::config::EnergyConfig;

/// Forward FFT of a fixed size, returning single-sided magnitude spectra.
pub struct SpectrumAnalyzer {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Option<Vec<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// Rectangular window: magnitudes match a plain unnormalized DFT.
    pub fn new(fft_size: usize) -> Self {
        Self::build(fft_size, None)
    }

    pub fn with_hann_window(fft_size: usize) -> Self {
        Self::build(fft_size, Some(hann_window(fft_size)))
    }

    fn build(fft_size: usize, window: Option<Vec<f32>>) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft_size,
            fft,
            window,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of bins written by [`magnitudes_into`](Self::magnitudes_into).
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Input shorter than the FFT size is zero-padded; longer input is truncated.
    pub fn magnitudes_into(&mut self, samples: &[f32], out: &mut Vec<f32>) {
        let len = self.fft_size.min(samples.len());
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < len { samples[i] } else { 0.0 };
            let weight = self.window.as_ref().map_or(1.0, |w| w[i]);
            *slot = Complex::new(sample * weight, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        out.clear();
        out.extend(self.buffer[..self.fft_size / 2].iter().map(|c| c.norm()));
    }

    pub fn magnitudes(&mut self, samples: &[f32]) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.bin_count());
        self.magnitudes_into(samples, &mut out);
        out
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Derives the per-tick pull factor from the low-frequency energy of one frame.
///
/// `pull = 1 + mean(|X[k]|, k in low bins) / divisor`, so silence maps to exactly 1.
pub struct EnergyExtractor {
    spectrum: SpectrumAnalyzer,
    low_bins: std::ops::Range<usize>,
    divisor: f32,
    magnitudes: Vec<f32>,
}

impl EnergyExtractor {
    pub const BASELINE: f32 = 1.0;

    pub fn new(block_size: usize, config: &EnergyConfig) -> Self {
        let spectrum = SpectrumAnalyzer::new(block_size);
        let magnitudes = Vec::with_capacity(spectrum.bin_count());
        Self {
            spectrum,
            low_bins: config.low_bin_start..config.low_bin_end,
            divisor: config.energy_divisor,
            magnitudes,
        }
    }

    pub fn low_energy(&mut self, frame: &AudioFrame) -> f32 {
        self.spectrum.magnitudes_into(frame.samples(), &mut self.magnitudes);
        let end = self.low_bins.end.min(self.magnitudes.len());
        let start = self.low_bins.start.min(end);
        let bins = &self.magnitudes[start..end];
        if bins.is_empty() {
            return 0.0;
        }
        let energy = bins.iter().sum::<f32>() / bins.len() as f32;
        if energy.is_finite() {
            energy
        } else {
            0.0
        }
    }

    pub fn pull_factor(&mut self, frame: &AudioFrame) -> f32 {
        Self::BASELINE + self.low_energy(frame) / self.divisor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq_bin: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq_bin * i as f32 / len as f32).sin()
            })
            .collect()
    }

    #[test]
    fn test_sine_peaks_in_its_bin() {
        let mut analyzer = SpectrumAnalyzer::new(256);
        let magnitudes = analyzer.magnitudes(&sine(8.0, 256, 1.0));
        assert_eq!(magnitudes.len(), 128);
        let peak = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 8);
        // Unnormalized DFT: a unit sine has magnitude N/2 in its bin.
        assert!((magnitudes[8] - 128.0).abs() < 0.5);
    }

    #[test]
    fn test_short_input_is_zero_padded() {
        let mut analyzer = SpectrumAnalyzer::with_hann_window(64);
        let magnitudes = analyzer.magnitudes(&[0.0; 10]);
        assert_eq!(magnitudes.len(), 32);
        assert!(magnitudes.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_hann_window_shape() {
        let window = hann_window(5);
        assert!(window[0].abs() < 1e-6);
        assert!((window[2] - 1.0).abs() < 1e-6);
        assert!(window[4].abs() < 1e-6);
    }

    #[test]
    fn test_silence_gives_baseline_pull() {
        let config = EnergyConfig::default();
        let mut extractor = EnergyExtractor::new(1024, &config);
        let frame = AudioFrame::silence(1024);
        assert_eq!(extractor.pull_factor(&frame), EnergyExtractor::BASELINE);
    }

    #[test]
    fn test_bass_raises_pull() {
        let config = EnergyConfig::default();
        let mut extractor = EnergyExtractor::new(1024, &config);
        let frame = AudioFrame::new(sine(2.0, 1024, 0.5));
        let pull = extractor.pull_factor(&frame);
        // Bin 2 carries 0.5 * 512 = 256, averaged over bins 1..5.
        assert!((pull - (1.0 + 64.0 / 500.0)).abs() < 1e-3, "pull = {}", pull);

        let treble = AudioFrame::new(sine(300.0, 1024, 0.5));
        assert!(extractor.pull_factor(&treble) < 1.001);
    }
}
