use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::time::{Duration, Instant};

use pulse_field::audio::{AudioIngestor, AudioSource};
use pulse_field::config::AudioConfig;
use pulse_field::prompt::{describe_recording, AestheticPath};

#[derive(Parser)]
#[command(name = "audio-prompt")]
#[command(about = "Record from the input device and turn the sound into image prompts")]
struct Args {
    /// Seconds of audio to record
    #[arg(long, short, default_value = "15")]
    seconds: f32,

    /// Use the first input device whose name contains this text
    #[arg(long, short)]
    device: Option<String>,

    /// Force an aesthetic path instead of choosing one from the audio
    #[arg(long)]
    path: Option<AestheticPath>,

    /// Prompt variations per segment
    #[arg(long, short = 'n', default_value = "1")]
    prompts: usize,

    /// Image slot the prompts are for; 3 asks for a muted palette
    #[arg(long, default_value = "1")]
    image_index: u32,

    /// Also write the results as JSON to this file
    #[arg(long, short)]
    output: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.seconds.is_nan() || args.seconds <= 0.0 {
        bail!("--seconds must be positive");
    }

    let config = AudioConfig {
        device: args.device.clone(),
        ..AudioConfig::default()
    };
    let mut ingestor = AudioIngestor::open(&config).context("Failed to start audio capture")?;
    let sample_rate = ingestor.sample_rate();

    info!("Recording {:.1}s from {}", args.seconds, ingestor.device_name());
    let samples = tokio::select! {
        recorded = record(&mut ingestor, args.seconds) => recorded?,
        _ = tokio::signal::ctrl_c() => bail!("Recording interrupted"),
    };
    ingestor.stop();
    info!("Recording complete ({} samples)", samples.len());

    let reports = describe_recording(&samples, sample_rate, args.path, args.image_index, args.prompts);
    for report in &reports {
        println!("=== First {:.1}s ===", report.seconds);
        println!(
            "amplitude {:.1}, centroid {:.1} Hz, bands {:?}",
            report.features.amplitude, report.features.spectral_centroid, report.features.frequency_bands
        );
        for request in &report.requests {
            println!(
                "[{}] {} ({} steps, guidance {:.1})",
                request.path, request.prompt, request.inference_steps, request.guidance_scale
            );
        }
        println!();
    }

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&reports)?;
        std::fs::write(output, json).with_context(|| format!("Failed to write {}", output))?;
        info!("Saved prompts to {}", output);
    }

    Ok(())
}

/// Collects mono samples until `seconds` worth have arrived.
async fn record(source: &mut AudioIngestor, seconds: f32) -> Result<Vec<f32>> {
    let target = (seconds * source.sample_rate() as f32).round() as usize;
    let mut samples = Vec::with_capacity(target);
    let mut last_progress = Instant::now();

    while samples.len() < target {
        source.maintain();
        let before = samples.len();
        while let Some(frame) = source.try_next_frame() {
            samples.extend_from_slice(frame.samples());
        }
        if samples.len() > before {
            last_progress = Instant::now();
        } else if last_progress.elapsed() > Duration::from_secs(5) {
            warn!("No audio received for 5 seconds");
            bail!("Audio input stalled after {} samples", samples.len());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    samples.truncate(target);
    Ok(samples)
}
