use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream,
    StreamConfig, StreamError, SupportedStreamConfigRange,
};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{info, warn};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{AudioFrame, AudioSource};
use crate::config::AudioConfig;

const RESTART_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no default audio input device is available")]
    NoDefaultDevice,
    #[error("no audio input device name contains '{name}'")]
    DeviceNotFound { name: String },
    #[error("failed to enumerate audio input devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),
    #[error("failed to query input configs of '{device}': {source}")]
    Configs {
        device: String,
        #[source]
        source: cpal::SupportedStreamConfigsError,
    },
    #[error("device '{device}' has no supported input config at {sample_rate} Hz")]
    UnsupportedConfig { device: String, sample_rate: u32 },
    #[error("failed to open input stream on '{device}' ({sample_rate} Hz, {channels} ch, {format:?}): {source}")]
    Build {
        device: String,
        sample_rate: u32,
        channels: u16,
        format: SampleFormat,
        #[source]
        source: cpal::BuildStreamError,
    },
    #[error("failed to start input stream on '{device}': {source}")]
    Play {
        device: String,
        #[source]
        source: cpal::PlayStreamError,
    },
    #[error("device '{device}' uses unsupported sample format {format:?}")]
    SampleFormat { device: String, format: SampleFormat },
}

/// Counters and flags shared between the audio callback and the main thread.
///
/// The backend threads only touch atomics here; everything they record is
/// logged later by [`AudioIngestor::maintain`] on the main thread.
#[derive(Default)]
struct CaptureShared {
    accepting: AtomicBool,
    device_lost: AtomicBool,
    dropped_frames: AtomicU64,
    callback_panics: AtomicU64,
    stream_errors: AtomicU64,
}

impl CaptureShared {
    fn record_stream_error(&self, err: &StreamError) {
        self.stream_errors.fetch_add(1, Ordering::Relaxed);
        if matches!(err, StreamError::DeviceNotAvailable) {
            self.device_lost.store(true, Ordering::Release);
        }
    }

    fn counters(&self) -> CaptureCounters {
        CaptureCounters {
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
            stream_errors: self.stream_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct CaptureCounters {
    dropped_frames: u64,
    callback_panics: u64,
    stream_errors: u64,
}

impl CaptureCounters {
    /// Moves to `now` and returns how much each counter grew since the last call.
    fn advance(&mut self, now: CaptureCounters) -> CaptureCounters {
        let grown = CaptureCounters {
            dropped_frames: now.dropped_frames.saturating_sub(self.dropped_frames),
            callback_panics: now.callback_panics.saturating_sub(self.callback_panics),
            stream_errors: now.stream_errors.saturating_sub(self.stream_errors),
        };
        *self = now;
        grown
    }
}

/// Owns the hardware input stream and hands out fixed-size mono frames.
///
/// The backend callback slices incoming audio into `block_size` frames and
/// offers each one to a bounded queue with `try_send`; when the main thread
/// falls behind, frames are dropped and counted instead of blocking the callback.
pub struct AudioIngestor {
    stream: Option<Stream>,
    device_name: String,
    config: AudioConfig,
    shared: Arc<CaptureShared>,
    sender: Sender<AudioFrame>,
    frames: Receiver<AudioFrame>,
    reported: CaptureCounters,
    last_restart: Option<Instant>,
    stopped: bool,
}

impl AudioIngestor {
    /// Acquires the configured device and starts capture. This is the only
    /// fatal failure point of the audio path.
    pub fn open(config: &AudioConfig) -> Result<Self, CaptureError> {
        let (sender, frames) = crossbeam_channel::bounded(config.queue_frames.max(1));
        let shared = Arc::new(CaptureShared::default());

        let device = select_device(config.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio input device: {}", device_name);

        let stream = build_stream(&device, &device_name, config, &sender, &shared)?;

        Ok(Self {
            stream: Some(stream),
            device_name,
            config: config.clone(),
            shared,
            sender,
            frames,
            reported: CaptureCounters::default(),
            last_restart: None,
            stopped: false,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn report_counters(&mut self) {
        let grown = self.reported.advance(self.shared.counters());
        if grown.dropped_frames > 0 {
            warn!(
                "Audio input overrun: dropped {} frame(s) while the main loop was busy",
                grown.dropped_frames
            );
        }
        if grown.callback_panics > 0 {
            warn!(
                "Audio callback panicked {} time(s); capture continues",
                grown.callback_panics
            );
        }
        if grown.stream_errors > 0 {
            warn!(
                "Audio stream on {} reported {} error(s)",
                self.device_name, grown.stream_errors
            );
        }
    }

    fn restart(&mut self) {
        if let Some(last) = self.last_restart {
            if last.elapsed() < RESTART_BACKOFF {
                return;
            }
        }
        self.last_restart = Some(Instant::now());

        info!("Audio device unavailable, attempting to reopen the input stream");
        self.close_stream();

        let reopened = select_device(self.config.device.as_deref()).and_then(|device| {
            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            let stream = build_stream(&device, &name, &self.config, &self.sender, &self.shared)?;
            Ok((name, stream))
        });

        match reopened {
            Ok((name, stream)) => {
                info!("Audio input stream reopened on {}", name);
                self.device_name = name;
                self.stream = Some(stream);
                self.shared.device_lost.store(false, Ordering::Release);
            }
            Err(e) => warn!("Failed to reopen audio input: {}", e),
        }
    }

    fn close_stream(&mut self) {
        self.shared.accepting.store(false, Ordering::Release);
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause audio stream: {}", e);
            }
        }
    }
}

impl AudioSource for AudioIngestor {
    fn try_next_frame(&mut self) -> Option<AudioFrame> {
        self.frames.try_recv().ok()
    }

    fn maintain(&mut self) {
        self.report_counters();
        if self.stopped {
            return;
        }
        if self.stream.is_some() && !self.shared.device_lost.load(Ordering::Acquire) {
            return;
        }
        self.restart();
    }

    fn stop(&mut self) {
        self.stopped = true;
        if self.stream.is_some() {
            self.close_stream();
            self.report_counters();
            info!("Audio input stream on {} closed", self.device_name);
        }
    }
}

impl Drop for AudioIngestor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Names of all input devices on the default host.
pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
    let host = cpal::default_host();
    let devices = host.input_devices()?;
    Ok(devices
        .map(|device| device.name().unwrap_or_else(|_| "Unknown".to_string()))
        .collect())
}

fn select_device(selector: Option<&str>) -> Result<Device, CaptureError> {
    let host = cpal::default_host();
    match selector {
        None => host.default_input_device().ok_or(CaptureError::NoDefaultDevice),
        Some(name) => {
            let wanted = name.to_lowercase();
            host.input_devices()?
                .find(|device| {
                    device
                        .name()
                        .map(|n| n.to_lowercase().contains(&wanted))
                        .unwrap_or(false)
                })
                .ok_or_else(|| CaptureError::DeviceNotFound {
                    name: name.to_string(),
                })
        }
    }
}

/// Preference order: fewest channels, then f32 samples.
fn rank_config(range: &SupportedStreamConfigRange) -> (u16, u8) {
    let format_rank = match range.sample_format() {
        SampleFormat::F32 => 0,
        SampleFormat::I16 => 1,
        SampleFormat::U16 => 2,
        _ => 3,
    };
    (range.channels(), format_rank)
}

fn build_stream(
    device: &Device,
    device_name: &str,
    config: &AudioConfig,
    sender: &Sender<AudioFrame>,
    shared: &Arc<CaptureShared>,
) -> Result<Stream, CaptureError> {
    let wanted_rate = SampleRate(config.sample_rate);
    let supported = device
        .supported_input_configs()
        .map_err(|source| CaptureError::Configs {
            device: device_name.to_string(),
            source,
        })?
        .filter(|range| range.min_sample_rate() <= wanted_rate && wanted_rate <= range.max_sample_rate())
        .min_by_key(rank_config)
        .ok_or_else(|| CaptureError::UnsupportedConfig {
            device: device_name.to_string(),
            sample_rate: config.sample_rate,
        })?
        .with_sample_rate(wanted_rate);

    let format = supported.sample_format();
    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: wanted_rate,
        buffer_size: BufferSize::Default,
    };
    info!(
        "Opening input stream: {} Hz, {} channel(s), {:?}, {} samples per frame",
        config.sample_rate, stream_config.channels, format, config.block_size
    );

    let assembler = FrameAssembler::new(
        config.block_size,
        stream_config.channels as usize,
        sender.clone(),
        Arc::clone(shared),
    );

    let stream = match format {
        SampleFormat::F32 => build_typed::<f32>(device, &stream_config, assembler, shared),
        SampleFormat::I16 => build_typed::<i16>(device, &stream_config, assembler, shared),
        SampleFormat::U16 => build_typed::<u16>(device, &stream_config, assembler, shared),
        other => {
            return Err(CaptureError::SampleFormat {
                device: device_name.to_string(),
                format: other,
            })
        }
    }
    .map_err(|source| CaptureError::Build {
        device: device_name.to_string(),
        sample_rate: config.sample_rate,
        channels: stream_config.channels,
        format,
        source,
    })?;

    shared.accepting.store(true, Ordering::Release);
    stream.play().map_err(|source| {
        shared.accepting.store(false, Ordering::Release);
        CaptureError::Play {
            device: device_name.to_string(),
            source,
        }
    })?;

    Ok(stream)
}

fn build_typed<T>(
    device: &Device,
    config: &StreamConfig,
    mut assembler: FrameAssembler,
    shared: &Arc<CaptureShared>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let error_flags = Arc::clone(shared);
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| assembler.on_input(data),
        move |err| error_flags.record_stream_error(&err),
        None,
    )
}

enum Offer {
    Accepted,
    Full,
    Closed,
}

/// Destination of assembled frames. The live stream feeds the bounded channel.
trait FrameSink: Send {
    fn offer(&mut self, frame: AudioFrame) -> Offer;
}

impl FrameSink for Sender<AudioFrame> {
    fn offer(&mut self, frame: AudioFrame) -> Offer {
        match self.try_send(frame) {
            Ok(()) => Offer::Accepted,
            Err(TrySendError::Full(_)) => Offer::Full,
            Err(TrySendError::Disconnected(_)) => Offer::Closed,
        }
    }
}

/// Callback-side state: re-blocks interleaved input into mono frames of a fixed size.
struct FrameAssembler<K: FrameSink = Sender<AudioFrame>> {
    block_size: usize,
    channels: usize,
    pending: Vec<f32>,
    sink: K,
    shared: Arc<CaptureShared>,
}

impl<K: FrameSink> FrameAssembler<K> {
    fn new(block_size: usize, channels: usize, sink: K, shared: Arc<CaptureShared>) -> Self {
        Self {
            block_size: block_size.max(1),
            channels: channels.max(1),
            pending: Vec::with_capacity(block_size.max(1)),
            sink,
            shared,
        }
    }

    /// Backend callback body. A panic while assembling discards the partial
    /// frame and is counted; the next callback starts from an empty block.
    fn on_input<T>(&mut self, data: &[T])
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| self.push(data)));
        if outcome.is_err() {
            self.reset();
            self.shared.callback_panics.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Keeps the first channel of each interleaved sample group.
    fn push<T>(&mut self, data: &[T])
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        if !self.shared.accepting.load(Ordering::Acquire) {
            return;
        }
        for group in data.chunks(self.channels) {
            self.pending.push(f32::from_sample(group[0]));
            if self.pending.len() == self.block_size {
                let full = std::mem::replace(&mut self.pending, Vec::with_capacity(self.block_size));
                self.emit(AudioFrame::new(full));
            }
        }
    }

    fn emit(&mut self, frame: AudioFrame) {
        match self.sink.offer(frame) {
            Offer::Accepted => {}
            Offer::Full => {
                self.shared.dropped_frames.fetch_add(1, Ordering::Relaxed);
            }
            // Receiver gone: the ingestor is shutting down.
            Offer::Closed => {
                self.shared.accepting.store(false, Ordering::Release);
            }
        }
    }

    fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler(block: usize, channels: usize, capacity: usize) -> (FrameAssembler, Receiver<AudioFrame>, Arc<CaptureShared>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let shared = Arc::new(CaptureShared::default());
        shared.accepting.store(true, Ordering::Release);
        (FrameAssembler::new(block, channels, sender, Arc::clone(&shared)), receiver, shared)
    }

    #[test]
    fn test_reblocks_into_fixed_frames() {
        let (mut assembler, frames, _) = assembler(4, 1, 8);
        assembler.push(&[0.0f32, 1.0, 2.0]);
        assert!(frames.try_recv().is_err());
        assembler.push(&[3.0f32, 4.0, 5.0, 6.0, 7.0, 8.0]);

        let first = frames.try_recv().unwrap();
        let second = frames.try_recv().unwrap();
        assert_eq!(first.samples(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(second.samples(), &[4.0, 5.0, 6.0, 7.0]);
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn test_extracts_first_channel() {
        let (mut assembler, frames, _) = assembler(3, 2, 8);
        assembler.push(&[0.1f32, -1.0, 0.2, -1.0, 0.3, -1.0]);
        let frame = frames.try_recv().unwrap();
        assert_eq!(frame.samples(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_converts_integer_samples() {
        let (mut assembler, frames, _) = assembler(2, 1, 8);
        assembler.push(&[i16::MAX, 0i16]);
        let frame = frames.try_recv().unwrap();
        assert!((frame.samples()[0] - 1.0).abs() < 1e-3);
        assert_eq!(frame.samples()[1], 0.0);
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let (mut assembler, frames, shared) = assembler(2, 1, 1);
        assembler.push(&[0.0f32; 8]);
        assert_eq!(frames.len(), 1);
        assert_eq!(shared.dropped_frames.load(Ordering::Relaxed), 3);
    }

    /// Panics on the first frame it is offered, then forwards to the channel.
    struct FailingOnceSink {
        failed: bool,
        inner: Sender<AudioFrame>,
    }

    impl FrameSink for FailingOnceSink {
        fn offer(&mut self, frame: AudioFrame) -> Offer {
            if !self.failed {
                self.failed = true;
                panic!("sink failure");
            }
            self.inner.offer(frame)
        }
    }

    #[test]
    fn test_callback_panic_is_counted_and_capture_continues() {
        let (sender, frames) = crossbeam_channel::bounded(8);
        let shared = Arc::new(CaptureShared::default());
        shared.accepting.store(true, Ordering::Release);
        let sink = FailingOnceSink {
            failed: false,
            inner: sender,
        };
        let mut assembler = FrameAssembler::new(2, 1, sink, Arc::clone(&shared));

        assembler.on_input(&[0.5f32]);
        assert_eq!(assembler.pending, vec![0.5]);
        assembler.on_input(&[1.0f32, 2.0, 3.0]);

        assert_eq!(shared.callback_panics.load(Ordering::Relaxed), 1);
        assert!(assembler.pending.is_empty());
        assert!(frames.is_empty());

        assembler.on_input(&[5.0f32, 6.0]);
        let frame = frames.try_recv().unwrap();
        assert_eq!(frame.samples(), &[5.0, 6.0]);
        assert_eq!(shared.callback_panics.load(Ordering::Relaxed), 1);

        let mut reported = CaptureCounters::default();
        assert_eq!(reported.advance(shared.counters()).callback_panics, 1);
    }

    #[test]
    fn test_stream_errors_are_recorded_for_the_main_thread() {
        let shared = CaptureShared::default();
        let mut reported = CaptureCounters::default();

        shared.record_stream_error(&StreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "xrun".to_string(),
            },
        });
        assert!(!shared.device_lost.load(Ordering::Acquire));
        assert_eq!(reported.advance(shared.counters()).stream_errors, 1);

        shared.record_stream_error(&StreamError::DeviceNotAvailable);
        assert!(shared.device_lost.load(Ordering::Acquire));
        let grown = reported.advance(shared.counters());
        assert_eq!(grown.stream_errors, 1);
        assert_eq!(grown.dropped_frames, 0);

        assert_eq!(reported.advance(shared.counters()), CaptureCounters::default());
    }

    #[test]
    fn test_stops_enqueuing_once_closed() {
        let (mut assembler, frames, shared) = assembler(2, 1, 8);
        shared.accepting.store(false, Ordering::Release);
        assembler.push(&[0.5f32; 8]);
        assert!(frames.is_empty());
    }
}
