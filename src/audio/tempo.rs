use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use super::fft::SpectrumAnalyzer;
use crate::config::TempoConfig;

/// Width of the log2-Gaussian tempo prior, in octaves.
const PRIOR_OCTAVES: f32 = 1.0;

/// A validated tempo reading together with the audio window it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimate {
    pub bpm: f32,
    /// Absolute sample index one past the end of the analysed window.
    pub window_end: u64,
    pub window_len: usize,
}

impl TempoEstimate {
    /// Returns `None` for non-finite or non-positive readings.
    pub fn new(bpm: f32, window_end: u64, window_len: usize) -> Option<Self> {
        if bpm.is_finite() && bpm > 0.0 && window_len > 0 {
            Some(Self {
                bpm,
                window_end,
                window_len,
            })
        } else {
            None
        }
    }
}

/// Bounded history of valid estimates; the smoothed tempo is their mean.
#[derive(Debug, Clone)]
pub struct BpmHistory {
    entries: VecDeque<TempoEstimate>,
    max_len: usize,
}

impl BpmHistory {
    pub fn new(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            entries: VecDeque::with_capacity(max_len),
            max_len,
        }
    }

    pub fn push(&mut self, estimate: TempoEstimate) {
        if self.entries.len() == self.max_len {
            self.entries.pop_front();
        }
        self.entries.push_back(estimate);
    }

    /// Arithmetic mean of the stored estimates, or 0 when empty.
    pub fn smoothed(&self) -> f32 {
        if self.entries.is_empty() {
            return 0.0;
        }
        // f64 keeps the sum exact for up to 2^29 f32 entries of equal magnitude.
        let sum: f64 = self.entries.iter().map(|e| e.bpm as f64).sum();
        (sum / self.entries.len() as f64) as f32
    }

    pub fn latest(&self) -> Option<&TempoEstimate> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

/// Onset-strength + autocorrelation tempo analysis over one window of samples.
///
/// 1. Hann-windowed STFT; spectral flux of log-compressed magnitudes gives an
///    onset envelope at `sample_rate / hop_size` frames per second.
/// 2. The envelope is mean-removed and half-wave rectified.
/// 3. Its autocorrelation over lags covering `min_bpm..=max_bpm`, weighted by a
///    log-normal prior around `prior_bpm`, picks the beat period. Parabolic
///    interpolation around the peak refines it below one hop.
///
/// The prior is one octave wide around 120 BPM, so pulses well above it
/// (roughly 160 BPM and up) usually come out at half tempo even though
/// `max_bpm` admits them. Octave ambiguity is resolved towards the prior.
pub struct TempoAnalyzer {
    sample_rate: u32,
    hop_size: usize,
    min_bpm: f32,
    max_bpm: f32,
    prior_bpm: f32,
    spectrum: SpectrumAnalyzer,
}

impl TempoAnalyzer {
    pub fn new(sample_rate: u32, config: &TempoConfig) -> Self {
        Self {
            sample_rate,
            hop_size: config.hop_size.max(1),
            min_bpm: config.min_bpm,
            max_bpm: config.max_bpm,
            prior_bpm: config.prior_bpm,
            spectrum: SpectrumAnalyzer::with_hann_window(config.frame_size.max(2)),
        }
    }

    pub fn envelope_rate(&self) -> f32 {
        self.sample_rate as f32 / self.hop_size as f32
    }

    pub fn estimate(&mut self, samples: &[f32]) -> Option<f32> {
        let never = AtomicBool::new(false);
        self.estimate_cancellable(samples, &never)
    }

    /// Returns `None` when cancelled, when the window is too short for the
    /// slowest tempo, or when the signal has no periodic onsets.
    pub fn estimate_cancellable(&mut self, samples: &[f32], cancel: &AtomicBool) -> Option<f32> {
        let envelope = self.onset_envelope(samples, cancel)?;
        self.periodicity(&envelope)
    }

    fn onset_envelope(&mut self, samples: &[f32], cancel: &AtomicBool) -> Option<Vec<f32>> {
        let frame_size = self.spectrum.fft_size();
        if samples.len() < frame_size {
            return None;
        }
        let frames = 1 + (samples.len() - frame_size) / self.hop_size;

        let mut envelope = Vec::with_capacity(frames);
        let mut previous: Vec<f32> = Vec::new();
        let mut current = Vec::with_capacity(self.spectrum.bin_count());

        for index in 0..frames {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            let start = index * self.hop_size;
            self.spectrum
                .magnitudes_into(&samples[start..start + frame_size], &mut current);
            for magnitude in current.iter_mut() {
                *magnitude = magnitude.ln_1p();
            }

            let flux = if previous.is_empty() {
                0.0
            } else {
                current
                    .iter()
                    .zip(previous.iter())
                    .map(|(&now, &before)| (now - before).max(0.0))
                    .sum()
            };
            envelope.push(flux);
            std::mem::swap(&mut previous, &mut current);
        }

        let mean = envelope.iter().sum::<f32>() / envelope.len() as f32;
        for value in envelope.iter_mut() {
            *value = (*value - mean).max(0.0);
        }
        Some(smooth(&envelope))
    }

    fn periodicity(&self, envelope: &[f32]) -> Option<f32> {
        let rate = self.envelope_rate();
        let min_lag = ((60.0 * rate / self.max_bpm).floor() as usize).max(1);
        let max_lag = ((60.0 * rate / self.min_bpm).ceil() as usize).min(envelope.len().saturating_sub(1));
        if min_lag + 2 > max_lag {
            return None;
        }

        // Score one lag either side of the search range for interpolation.
        let first = min_lag - 1;
        let scores: Vec<f32> = (first..=max_lag + 1)
            .map(|lag| {
                if lag == 0 || lag >= envelope.len() {
                    return 0.0;
                }
                let correlation: f32 = envelope[..envelope.len() - lag]
                    .iter()
                    .zip(&envelope[lag..])
                    .map(|(a, b)| a * b)
                    .sum();
                correlation * self.prior_weight(60.0 * rate / lag as f32)
            })
            .collect();

        let (best_offset, &best_score) = scores[1..scores.len() - 1]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        if !(best_score > 0.0) {
            return None;
        }

        let index = best_offset + 1;
        let (left, right) = (scores[index - 1], scores[index + 1]);
        let curvature = left - 2.0 * best_score + right;
        let shift = if curvature < 0.0 {
            (0.5 * (left - right) / curvature).clamp(-0.5, 0.5)
        } else {
            0.0
        };

        let lag = (first + index) as f32 + shift;
        Some(60.0 * rate / lag)
    }

    fn prior_weight(&self, bpm: f32) -> f32 {
        let octaves = (bpm / self.prior_bpm).log2() / PRIOR_OCTAVES;
        (-0.5 * octaves * octaves).exp()
    }
}

/// [1 2 1]/4 kernel; spreads onsets that straddle a hop boundary so the beat
/// period shows up as one autocorrelation peak instead of two half peaks.
fn smooth(envelope: &[f32]) -> Vec<f32> {
    let last = envelope.len().saturating_sub(1);
    (0..envelope.len())
        .map(|i| {
            let before = envelope[i.saturating_sub(1)];
            let after = envelope[(i + 1).min(last)];
            0.25 * before + 0.5 * envelope[i] + 0.25 * after
        })
        .collect()
}
