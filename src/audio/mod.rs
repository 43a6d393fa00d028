pub mod buffer;
pub mod capture;
pub mod estimator;
pub mod features;
pub mod fft;
pub mod tempo;

pub use buffer::{AudioSnapshot, TrailingAudioBuffer};
pub use capture::{list_input_devices, AudioIngestor, CaptureError};
pub use estimator::TempoEstimator;
pub use features::{FeatureExtractor, FeatureRecord};
pub use fft::{EnergyExtractor, SpectrumAnalyzer};
pub use tempo::{BpmHistory, TempoAnalyzer, TempoEstimate};

use crossbeam_channel::Receiver;
use std::sync::Arc;

/// One block of mono samples in [-1, 1], in capture order.
///
/// Cloning is cheap: the samples are shared.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    samples: Arc<[f32]>,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples: samples.into(),
        }
    }

    pub fn silence(len: usize) -> Self {
        Self::new(vec![0.0; len])
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Anything the main loop can drain frames from without blocking.
pub trait AudioSource {
    /// Next queued frame, or `None` if nothing has arrived yet.
    fn try_next_frame(&mut self) -> Option<AudioFrame>;

    /// Housekeeping between ticks, such as reporting or reconnecting.
    fn maintain(&mut self) {}

    /// Stops producing frames. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Frames pushed by hand, used for tests and offline runs.
impl AudioSource for Receiver<AudioFrame> {
    fn try_next_frame(&mut self) -> Option<AudioFrame> {
        self.try_recv().ok()
    }

    fn stop(&mut self) {}
}
