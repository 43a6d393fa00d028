use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete runtime configuration for the visualizer.
///
/// Every section falls back to its defaults when omitted from a JSON file, so a
/// config file only needs to mention the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub audio: AudioConfig,
    pub surface: SurfaceConfig,
    pub field: FieldConfig,
    pub energy: EnergyConfig,
    pub tempo: TempoConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Samples per [`AudioFrame`](crate::audio::AudioFrame).
    pub block_size: usize,
    /// Length of the trailing window kept for tempo analysis.
    pub buffer_seconds: f32,
    /// Case-insensitive substring of the input device name. `None` picks the host default.
    pub device: Option<String>,
    /// Capacity of the callback-to-main-thread frame queue.
    pub queue_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 1024,
            buffer_seconds: 10.0,
            device: None,
            queue_frames: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub title: String,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            target_fps: 60,
            title: "Pulse Field".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub particle_count: usize,
    pub attractor_count: usize,
    pub speed_multiplier: f32,
    pub damping: f32,
    pub dt: f32,
    /// Inset of the initial particle grid, as a fraction of each surface dimension.
    pub margin_fraction: f32,
    /// Floor applied to particle/attractor distances in the force law, in pixels.
    pub min_distance: f32,
    pub particle_radius: u32,
    pub attractor_radius: u32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            particle_count: 100,
            attractor_count: 10,
            speed_multiplier: 7.0,
            damping: 0.85,
            dt: 1.0,
            margin_fraction: 0.1,
            min_distance: 1.0,
            particle_radius: 2,
            attractor_radius: 5,
        }
    }
}

/// Mapping from the latest frame's spectrum to the per-tick pull factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    pub low_bin_start: usize,
    /// Exclusive.
    pub low_bin_end: usize,
    pub energy_divisor: f32,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            low_bin_start: 1,
            low_bin_end: 5,
            energy_divisor: 500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub window_seconds: f32,
    pub history_len: usize,
    /// Analysis runs at most once every this many ticks.
    pub interval_ticks: u64,
    /// Run analysis on a worker thread instead of inside the tick.
    pub background: bool,
    pub min_bpm: f32,
    pub max_bpm: f32,
    pub frame_size: usize,
    pub hop_size: usize,
    /// Centre of the log-normal tempo prior used to break octave ambiguity.
    pub prior_bpm: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            window_seconds: 10.0,
            history_len: 100,
            interval_ticks: 30,
            background: true,
            min_bpm: 60.0,
            max_bpm: 200.0,
            frame_size: 1024,
            hop_size: 512,
            prior_bpm: 120.0,
        }
    }
}

impl TempoConfig {
    pub fn window_samples(&self, sample_rate: u32) -> usize {
        (self.window_seconds * sample_rate as f32).round() as usize
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("damping must lie in (0, 1), got {0}")]
    Damping(f32),
    #[error("audio.buffer_seconds ({buffer}) is shorter than tempo.window_seconds ({window})")]
    BufferTooShort { buffer: f32, window: f32 },
    #[error("tempo.min_bpm ({min}) must be below tempo.max_bpm ({max})")]
    BpmRange { min: f32, max: f32 },
    #[error("energy bin range {start}..{end} is empty or exceeds half the block size ({half})")]
    EnergyBins { start: usize, end: usize, half: usize },
    #[error("tempo.hop_size ({hop}) must not exceed tempo.frame_size ({frame})")]
    Hop { hop: usize, frame: usize },
}

impl VisualizerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.surface.target_fps.max(1) as f64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero: [(&'static str, usize); 9] = [
            ("audio.sample_rate", self.audio.sample_rate as usize),
            ("audio.block_size", self.audio.block_size),
            ("audio.queue_frames", self.audio.queue_frames),
            ("surface.width", self.surface.width as usize),
            ("surface.height", self.surface.height as usize),
            ("surface.target_fps", self.surface.target_fps as usize),
            ("tempo.history_len", self.tempo.history_len),
            ("tempo.frame_size", self.tempo.frame_size),
            ("tempo.hop_size", self.tempo.hop_size),
        ];
        if let Some(&(field, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero { field });
        }
        if self.tempo.interval_ticks == 0 {
            return Err(ConfigError::Zero { field: "tempo.interval_ticks" });
        }
        if !(self.field.damping > 0.0 && self.field.damping < 1.0) {
            return Err(ConfigError::Damping(self.field.damping));
        }
        if self.audio.buffer_seconds < self.tempo.window_seconds {
            return Err(ConfigError::BufferTooShort {
                buffer: self.audio.buffer_seconds,
                window: self.tempo.window_seconds,
            });
        }
        if !(self.tempo.min_bpm > 0.0 && self.tempo.min_bpm < self.tempo.max_bpm) {
            return Err(ConfigError::BpmRange {
                min: self.tempo.min_bpm,
                max: self.tempo.max_bpm,
            });
        }
        let half = self.audio.block_size / 2;
        if self.energy.low_bin_start >= self.energy.low_bin_end || self.energy.low_bin_end > half {
            return Err(ConfigError::EnergyBins {
                start: self.energy.low_bin_start,
                end: self.energy.low_bin_end,
                half,
            });
        }
        if self.tempo.hop_size > self.tempo.frame_size {
            return Err(ConfigError::Hop {
                hop: self.tempo.hop_size,
                frame: self.tempo.frame_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = VisualizerConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.tempo.window_samples(44100), 441_000);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "field": { "particle_count": 64 }, "surface": { "width": 1024 } }"#;
        let config: VisualizerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.field.particle_count, 64);
        assert_eq!(config.field.attractor_count, 10);
        assert_eq!(config.surface.width, 1024);
        assert_eq!(config.surface.height, 600);
        assert_eq!(config.tempo, TempoConfig::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = VisualizerConfig::default();
        config.field.damping = 1.0;
        assert_eq!(config.validate(), Err(ConfigError::Damping(1.0)));

        let mut config = VisualizerConfig::default();
        config.audio.buffer_seconds = 5.0;
        assert!(matches!(config.validate(), Err(ConfigError::BufferTooShort { .. })));

        let mut config = VisualizerConfig::default();
        config.surface.width = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero { field: "surface.width" })
        );

        let mut config = VisualizerConfig::default();
        config.energy.low_bin_end = 1;
        assert!(matches!(config.validate(), Err(ConfigError::EnergyBins { .. })));
    }

    #[test]
    fn test_tick_interval() {
        let config = VisualizerConfig::default();
        let interval = config.tick_interval();
        assert!((interval.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }
}
