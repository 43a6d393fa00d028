use std::collections::VecDeque;

use super::AudioFrame;

/// Bounded FIFO of the most recent mono samples.
///
/// Frames are appended whole and the oldest samples are evicted one by one, so
/// the buffer never holds more than `capacity` samples. Only the oldest frame
/// can end up partially evicted; newer frames keep their original boundaries
/// and nothing is re-sliced into blocks after trimming.
pub struct TrailingAudioBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
    sample_rate: u32,
    latest: Option<AudioFrame>,
    total_ingested: u64,
}

/// Owned copy of the newest `samples.len()` samples in a [`TrailingAudioBuffer`].
#[derive(Debug, Clone)]
pub struct AudioSnapshot {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Absolute index (in samples since capture start) one past the last sample.
    pub end_position: u64,
}

impl TrailingAudioBuffer {
    pub fn new(sample_rate: u32, duration_seconds: f32) -> Self {
        let capacity = (duration_seconds.max(0.0) * sample_rate as f32).round() as usize;
        Self::with_capacity(sample_rate, capacity)
    }

    pub fn with_capacity(sample_rate: u32, capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sample_rate,
            latest: None,
            total_ingested: 0,
        }
    }

    pub fn push_frame(&mut self, frame: AudioFrame) {
        let incoming = frame.samples();
        self.total_ingested += incoming.len() as u64;

        // A frame longer than the whole window only contributes its tail.
        let keep = &incoming[incoming.len().saturating_sub(self.capacity)..];
        let overflow = (self.samples.len() + keep.len()).saturating_sub(self.capacity);
        self.samples.drain(..overflow);
        self.samples.extend(keep.iter().copied());

        self.latest = Some(frame);
    }

    /// Most recently pushed frame, untrimmed.
    pub fn latest_frame(&self) -> Option<&AudioFrame> {
        self.latest.as_ref()
    }

    /// Copies the newest `count` samples, or returns `None` while fewer are buffered.
    pub fn snapshot_latest(&self, count: usize) -> Option<AudioSnapshot> {
        if count == 0 || self.samples.len() < count {
            return None;
        }
        let start = self.samples.len() - count;
        Some(AudioSnapshot {
            samples: self.samples.range(start..).copied().collect(),
            sample_rate: self.sample_rate,
            end_position: self.total_ingested,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn total_ingested(&self) -> u64 {
        self.total_ingested
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ramp(start: usize, len: usize) -> AudioFrame {
        AudioFrame::new((start..start + len).map(|i| i as f32).collect())
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut buffer = TrailingAudioBuffer::with_capacity(10, 10);
        buffer.push_frame(ramp(0, 4));
        buffer.push_frame(ramp(4, 4));
        buffer.push_frame(ramp(8, 4));

        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.total_ingested(), 12);
        let snapshot = buffer.snapshot_latest(10).unwrap();
        let expected: Vec<f32> = (2..12).map(|i| i as f32).collect();
        assert_eq!(snapshot.samples, expected);
        assert_eq!(snapshot.end_position, 12);
    }

    #[test]
    fn test_oversized_frame_keeps_tail() {
        let mut buffer = TrailingAudioBuffer::with_capacity(10, 5);
        buffer.push_frame(ramp(0, 8));
        let snapshot = buffer.snapshot_latest(5).unwrap();
        assert_eq!(snapshot.samples, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
        // The latest frame is kept whole for spectral analysis.
        assert_eq!(buffer.latest_frame().unwrap().len(), 8);
    }

    #[test]
    fn test_snapshot_requires_enough_samples() {
        let mut buffer = TrailingAudioBuffer::new(100, 1.0);
        assert!(buffer.snapshot_latest(100).is_none());
        buffer.push_frame(ramp(0, 60));
        assert!(buffer.snapshot_latest(100).is_none());
        buffer.push_frame(ramp(60, 60));
        let snapshot = buffer.snapshot_latest(100).unwrap();
        assert_eq!(snapshot.samples.len(), 100);
        assert_eq!(snapshot.samples[0], 20.0);
        assert_eq!(snapshot.sample_rate, 100);
    }

    #[test]
    fn test_duration_tracks_sample_count() {
        let mut buffer = TrailingAudioBuffer::new(1000, 2.0);
        assert_eq!(buffer.capacity(), 2000);
        buffer.push_frame(ramp(0, 500));
        assert!((buffer.duration_seconds() - 0.5).abs() < 1e-6);
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.latest_frame().is_none());
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_window(
            sample_rate in 8u32..2000,
            seconds in 0.01f32..2.0,
            frame_lengths in prop::collection::vec(0usize..3000, 0..64),
        ) {
            let mut buffer = TrailingAudioBuffer::new(sample_rate, seconds);
            let limit = (seconds * sample_rate as f32).round() as usize;
            let mut pushed = 0usize;
            for len in frame_lengths {
                buffer.push_frame(AudioFrame::new(vec![0.5; len]));
                pushed += len;
                prop_assert!(buffer.len() <= limit);
                prop_assert!(buffer.duration_seconds() <= seconds + 1.0 / sample_rate as f32);
                prop_assert_eq!(buffer.len(), pushed.min(limit));
            }
        }
    }
}
