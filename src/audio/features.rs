use serde::{Deserialize, Serialize};

use super::fft::SpectrumAnalyzer;

pub const BAND_COUNT: usize = 8;
const MEL_BANDS: usize = 64;
const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = 512;
const TARGET_RMS: f32 = 0.1;
/// Amplitude is reported on the 16-bit PCM scale.
const PCM_SCALE: f32 = 32768.0;

/// Summary of a block of audio, consumed by the prompt mapper.
///
/// Bands are ordered low to high: sub-bass, bass, low-mid, mid, high-mid,
/// presence, brilliance, air.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub amplitude: f32,
    /// Hz.
    pub spectral_centroid: f32,
    pub frequency_bands: [f32; BAND_COUNT],
}

impl FeatureRecord {
    pub fn low_average(&self) -> f32 {
        (self.frequency_bands[0] + self.frequency_bands[1]) / 2.0
    }

    pub fn mid_average(&self) -> f32 {
        (self.frequency_bands[2] + self.frequency_bands[3]) / 2.0
    }

    pub fn high_average(&self) -> f32 {
        self.frequency_bands[4..].iter().sum::<f32>() / 4.0
    }
}

/// Loudness-normalized amplitude, centroid and mel band energies.
pub struct FeatureExtractor {
    sample_rate: u32,
    spectrum: SpectrumAnalyzer,
    mel_filters: Vec<Vec<(usize, f32)>>,
}

impl FeatureExtractor {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            spectrum: SpectrumAnalyzer::with_hann_window(FFT_SIZE),
            mel_filters: mel_filterbank(sample_rate, FFT_SIZE, MEL_BANDS),
        }
    }

    pub fn extract(&mut self, samples: &[f32]) -> FeatureRecord {
        if samples.is_empty() {
            return FeatureRecord {
                amplitude: 0.0,
                spectral_centroid: 0.0,
                frequency_bands: [0.0; BAND_COUNT],
            };
        }

        // Level-independent features: scale the block to a fixed RMS first.
        let rms = (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt();
        let gain = TARGET_RMS / (rms + 1e-6);
        let normalized: Vec<f32> = samples.iter().map(|x| x * gain).collect();

        let amplitude =
            normalized.iter().map(|x| x.abs()).sum::<f32>() / normalized.len() as f32 * PCM_SCALE;

        let bin_hz = self.sample_rate as f32 / FFT_SIZE as f32;
        let frame_count = if normalized.len() <= FFT_SIZE {
            1
        } else {
            1 + (normalized.len() - FFT_SIZE) / HOP_SIZE
        };

        let mut mel_sum = [0.0f32; MEL_BANDS];
        let mut centroid_sum = 0.0f32;
        let mut centroid_frames = 0usize;
        let mut magnitudes = Vec::with_capacity(self.spectrum.bin_count());

        for index in 0..frame_count {
            let start = index * HOP_SIZE;
            let end = (start + FFT_SIZE).min(normalized.len());
            self.spectrum.magnitudes_into(&normalized[start..end], &mut magnitudes);

            let mut weighted = 0.0f32;
            let mut total = 0.0f32;
            for (bin, magnitude) in magnitudes.iter().enumerate() {
                let power = magnitude * magnitude;
                weighted += bin as f32 * bin_hz * power;
                total += power;
            }
            if total > 0.0 {
                centroid_sum += weighted / total;
                centroid_frames += 1;
            }

            for (band, filter) in self.mel_filters.iter().enumerate() {
                mel_sum[band] += filter
                    .iter()
                    .map(|&(bin, weight)| weight * magnitudes[bin] * magnitudes[bin])
                    .sum::<f32>();
            }
        }

        let per_group = MEL_BANDS / BAND_COUNT;
        let mut frequency_bands = [0.0f32; BAND_COUNT];
        for (group, band) in frequency_bands.iter_mut().enumerate() {
            let energies = &mel_sum[group * per_group..(group + 1) * per_group];
            *band = energies.iter().sum::<f32>() / (per_group * frame_count) as f32;
        }

        FeatureRecord {
            amplitude,
            spectral_centroid: if centroid_frames > 0 {
                centroid_sum / centroid_frames as f32
            } else {
                0.0
            },
            frequency_bands,
        }
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Sparse triangular filters, one per mel band, as `(bin, weight)` pairs.
fn mel_filterbank(sample_rate: u32, fft_size: usize, bands: usize) -> Vec<Vec<(usize, f32)>> {
    let bin_hz = sample_rate as f32 / fft_size as f32;
    let bins = fft_size / 2;
    let top = hz_to_mel(sample_rate as f32 / 2.0);
    let edges: Vec<f32> = (0..bands + 2)
        .map(|i| mel_to_hz(top * i as f32 / (bands + 1) as f32))
        .collect();

    (0..bands)
        .map(|band| {
            let (lower, centre, upper) = (edges[band], edges[band + 1], edges[band + 2]);
            (0..bins)
                .filter_map(|bin| {
                    let hz = bin as f32 * bin_hz;
                    let weight = if hz > lower && hz <= centre {
                        (hz - lower) / (centre - lower)
                    } else if hz > centre && hz < upper {
                        (upper - hz) / (upper - centre)
                    } else {
                        0.0
                    };
                    (weight > 0.0).then_some((bin, weight))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, sample_rate: u32, seconds: f32, amplitude: f32) -> Vec<f32> {
        let total = (seconds * sample_rate as f32) as usize;
        (0..total)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_silence_is_all_zero() {
        let mut extractor = FeatureExtractor::new(22050);
        let record = extractor.extract(&vec![0.0; 22050]);
        assert_eq!(record.amplitude, 0.0);
        assert_eq!(record.spectral_centroid, 0.0);
        assert!(record.frequency_bands.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_amplitude_is_level_independent() {
        let mut extractor = FeatureExtractor::new(22050);
        let quiet = extractor.extract(&tone(440.0, 22050, 1.0, 0.01));
        let loud = extractor.extract(&tone(440.0, 22050, 1.0, 0.8));
        assert!((quiet.amplitude - loud.amplitude).abs() / loud.amplitude < 0.01);
        // Mean |sin| = 2/pi of the peak; RMS 0.1 means peak 0.1 * sqrt(2).
        let expected = 0.1 * 2f32.sqrt() * 2.0 / std::f32::consts::PI * PCM_SCALE;
        assert!((loud.amplitude - expected).abs() / expected < 0.01);
    }

    #[test]
    fn test_centroid_follows_pitch() {
        let mut extractor = FeatureExtractor::new(22050);
        let low = extractor.extract(&tone(200.0, 22050, 1.0, 0.5));
        let high = extractor.extract(&tone(4000.0, 22050, 1.0, 0.5));
        assert!((low.spectral_centroid - 200.0).abs() < 50.0, "{}", low.spectral_centroid);
        assert!((high.spectral_centroid - 4000.0).abs() < 100.0, "{}", high.spectral_centroid);
    }

    #[test]
    fn test_bass_lands_in_low_bands() {
        let mut extractor = FeatureExtractor::new(22050);
        let record = extractor.extract(&tone(100.0, 22050, 1.0, 0.5));
        assert!(record.low_average() > record.mid_average());
        assert!(record.low_average() > record.high_average());

        let record = extractor.extract(&tone(8000.0, 22050, 1.0, 0.5));
        assert!(record.high_average() > record.low_average());
    }

    #[test]
    fn test_short_block_uses_one_padded_frame() {
        let mut extractor = FeatureExtractor::new(22050);
        let record = extractor.extract(&tone(1000.0, 22050, 0.02, 0.5));
        assert!(record.amplitude > 0.0);
        assert!(record.spectral_centroid > 500.0);
    }

    #[test]
    fn test_filterbank_covers_spectrum() {
        let filters = mel_filterbank(22050, FFT_SIZE, MEL_BANDS);
        assert_eq!(filters.len(), MEL_BANDS);
        assert!(filters.iter().all(|f| !f.is_empty()));
    }
}
