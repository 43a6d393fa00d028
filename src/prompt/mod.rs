//! Maps extracted audio features to text prompts for an external image generator.

mod phrases;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::audio::{FeatureExtractor, FeatureRecord};

/// Band averages closer than this are treated as balanced.
const BALANCE_TOLERANCE: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AestheticPath {
    Tribal,
    Natural,
    Industrial,
    MinimalAbstract,
    HybridOrganicIndustrial,
    DarkSurreal,
    PrimalWilderness,
    CosmicNatural,
    ApocalypticVision,
    BiomorphicAbstraction,
    MysticalEthereal,
}

impl AestheticPath {
    /// Scoring order; on a tie the earlier path wins.
    pub const ALL: [AestheticPath; 11] = [
        AestheticPath::Tribal,
        AestheticPath::Natural,
        AestheticPath::Industrial,
        AestheticPath::MinimalAbstract,
        AestheticPath::HybridOrganicIndustrial,
        AestheticPath::DarkSurreal,
        AestheticPath::PrimalWilderness,
        AestheticPath::CosmicNatural,
        AestheticPath::ApocalypticVision,
        AestheticPath::BiomorphicAbstraction,
        AestheticPath::MysticalEthereal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AestheticPath::Tribal => "tribal",
            AestheticPath::Natural => "natural",
            AestheticPath::Industrial => "industrial",
            AestheticPath::MinimalAbstract => "minimal_abstract",
            AestheticPath::HybridOrganicIndustrial => "hybrid_organic_industrial",
            AestheticPath::DarkSurreal => "dark_surreal",
            AestheticPath::PrimalWilderness => "primal_wilderness",
            AestheticPath::CosmicNatural => "cosmic_natural",
            AestheticPath::ApocalypticVision => "apocalyptic_vision",
            AestheticPath::BiomorphicAbstraction => "biomorphic_abstraction",
            AestheticPath::MysticalEthereal => "mystical_ethereal",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|&p| p == self).unwrap_or(0)
    }
}

impl fmt::Display for AestheticPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AestheticPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| format!("unknown aesthetic path '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dominant {
    Low,
    Mid,
    High,
    Mixed,
}

fn dominant_band(features: &FeatureRecord) -> Dominant {
    let (low, mid, high) = (features.low_average(), features.mid_average(), features.high_average());
    if low > mid && low > high {
        Dominant::Low
    } else if mid > low && mid > high {
        Dominant::Mid
    } else if high > low && high > mid {
        Dominant::High
    } else {
        Dominant::Mixed
    }
}

/// Scores every path from loudness and band balance and returns the best one.
pub fn select_path(features: &FeatureRecord) -> AestheticPath {
    use AestheticPath::*;

    let mut scores = [0u32; 11];
    let mut add = |path: AestheticPath, points: u32| scores[path.index()] += points;

    if features.amplitude < 600.0 {
        add(PrimalWilderness, 2);
        add(MysticalEthereal, 2);
        add(Natural, 1);
        add(Tribal, 1);
    } else if features.amplitude < 1200.0 {
        add(Natural, 2);
        add(BiomorphicAbstraction, 2);
        add(MinimalAbstract, 1);
    } else {
        add(Industrial, 2);
        add(DarkSurreal, 2);
        add(HybridOrganicIndustrial, 1);
    }

    match dominant_band(features) {
        Dominant::Low => {
            add(PrimalWilderness, 2);
            add(Tribal, 1);
        }
        Dominant::Mid => {
            add(Natural, 2);
            add(BiomorphicAbstraction, 1);
        }
        Dominant::High => {
            add(MysticalEthereal, 2);
            add(MinimalAbstract, 1);
        }
        Dominant::Mixed => {}
    }

    let (low, mid, high) = (features.low_average(), features.mid_average(), features.high_average());
    if (low - mid).abs() < BALANCE_TOLERANCE && (mid - high).abs() < BALANCE_TOLERANCE {
        add(HybridOrganicIndustrial, 1);
        add(DarkSurreal, 1);
    }

    // First maximum, so ties resolve to the earlier path.
    let mut best = 0;
    for (index, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = index;
        }
    }
    AestheticPath::ALL[best]
}

/// Stable across runs and platforms: FNV-1a over the raw float bits.
fn feature_seed(features: &FeatureRecord) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    std::iter::once(features.amplitude)
        .chain(std::iter::once(features.spectral_centroid))
        .chain(features.frequency_bands.iter().copied())
        .flat_map(|value| value.to_bits().to_le_bytes())
        .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}

/// Produces `count` prompts. Identical features always give identical prompts.
///
/// `image_index` 3 asks for a sparser palette; other values leave the style as is.
pub fn generate_prompts(
    features: &FeatureRecord,
    path: Option<AestheticPath>,
    image_index: u32,
    count: usize,
) -> Vec<String> {
    let path = path.unwrap_or_else(|| select_path(features));
    let table = phrases::table(path);
    let base_seed = feature_seed(features);

    let modifier = match dominant_band(features) {
        Dominant::Low => "imbued with a deep, resonant undertone",
        Dominant::Mid => "carrying an organic, earthy depth",
        Dominant::High => "touched by a delicate, fading light",
        Dominant::Mixed => "in a harmonious, subtle blend",
    };

    let intensity = if features.amplitude > 1500.0 {
        "pulsating with fierce energy"
    } else if features.amplitude < 800.0 {
        "quiet with a hint of somber introspection"
    } else {
        "modest yet evocative"
    };

    (0..count)
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(i as u64));
            let mood = table.moods.choose(&mut rng).copied().unwrap_or_default();
            let style = table.styles.choose(&mut rng).copied().unwrap_or_default();
            let palette = if image_index == 3 {
                " in a muted, sparse palette"
            } else {
                ""
            };
            format!(
                "A depiction of {}, {}, rendered through {}{}, {}.",
                mood, intensity, style, palette, modifier
            )
        })
        .collect()
}

/// What an image generator would be handed for one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub path: AestheticPath,
    pub prompt: String,
    pub inference_steps: u32,
    pub guidance_scale: f32,
}

impl GenerationRequest {
    pub const DEFAULT_INFERENCE_STEPS: u32 = 50;
    pub const DEFAULT_GUIDANCE_SCALE: f32 = 7.5;

    pub fn new(path: AestheticPath, prompt: String) -> Self {
        Self {
            path,
            prompt,
            inference_steps: Self::DEFAULT_INFERENCE_STEPS,
            guidance_scale: Self::DEFAULT_GUIDANCE_SCALE,
        }
    }
}

/// Prompts derived from one prefix of a recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentReport {
    pub seconds: f32,
    pub features: FeatureRecord,
    pub requests: Vec<GenerationRequest>,
}

/// Prefix lengths analysed for a recording: 5 s, 10 s and the whole take.
pub fn analysis_prefixes(total_seconds: f32) -> Vec<f32> {
    let mut prefixes: Vec<f32> = [5.0, 10.0]
        .into_iter()
        .filter(|&s| s < total_seconds)
        .collect();
    if total_seconds > 0.0 {
        prefixes.push(total_seconds);
    }
    prefixes
}

/// Extracts features from each prefix of `samples` and maps them to prompts.
pub fn describe_recording(
    samples: &[f32],
    sample_rate: u32,
    path: Option<AestheticPath>,
    image_index: u32,
    count: usize,
) -> Vec<SegmentReport> {
    let mut extractor = FeatureExtractor::new(sample_rate);
    let total_seconds = samples.len() as f32 / sample_rate as f32;

    analysis_prefixes(total_seconds)
        .into_iter()
        .map(|seconds| {
            let end = ((seconds * sample_rate as f32).round() as usize).min(samples.len());
            let features = extractor.extract(&samples[..end]);
            let chosen = path.unwrap_or_else(|| select_path(&features));
            let requests = generate_prompts(&features, Some(chosen), image_index, count)
                .into_iter()
                .map(|prompt| GenerationRequest::new(chosen, prompt))
                .collect();
            SegmentReport {
                seconds,
                features,
                requests,
            }
        })
        .collect()
}
