use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::buffer::{AudioSnapshot, TrailingAudioBuffer};
use super::tempo::{BpmHistory, TempoAnalyzer, TempoEstimate};
use crate::config::TempoConfig;

/// Result of one analysis pass, published by whichever context ran it.
#[derive(Debug, Clone, Copy)]
struct AnalysisOutcome {
    bpm: Option<f32>,
    window_end: u64,
    window_len: usize,
}

/// Throttled tempo tracking over the trailing audio window.
///
/// The estimator owns the [`BpmHistory`]; analysis results only ever reach it
/// through [`update`](Self::update) on the main thread, so an abandoned or
/// cancelled analysis cannot leave the history half-written.
pub struct TempoEstimator {
    config: TempoConfig,
    sample_rate: u32,
    window_samples: usize,
    history: BpmHistory,
    ticks: u64,
    busy_skips: u64,
    mode: AnalysisMode,
}

enum AnalysisMode {
    Inline(TempoAnalyzer),
    Background(TempoWorker),
}

impl TempoEstimator {
    pub fn new(sample_rate: u32, config: &TempoConfig) -> Self {
        let mode = if config.background {
            match TempoWorker::spawn(sample_rate, config) {
                Ok(worker) => AnalysisMode::Background(worker),
                Err(e) => {
                    warn!("Failed to start tempo worker ({}), analysing inline", e);
                    AnalysisMode::Inline(TempoAnalyzer::new(sample_rate, config))
                }
            }
        } else {
            AnalysisMode::Inline(TempoAnalyzer::new(sample_rate, config))
        };

        Self {
            config: config.clone(),
            sample_rate,
            window_samples: config.window_samples(sample_rate),
            history: BpmHistory::new(config.history_len),
            ticks: 0,
            busy_skips: 0,
            mode,
        }
    }

    /// Called once per main-loop tick. Returns `true` if the history changed.
    ///
    /// Analysis is scheduled on the first tick and then every `interval_ticks`
    /// ticks, and only when the buffer holds a full window. In background mode
    /// a new job is only submitted once the previous one has reported back.
    pub fn update(&mut self, buffer: &TrailingAudioBuffer) -> bool {
        let mut changed = self.collect_published();

        let due = self.ticks % self.config.interval_ticks.max(1) == 0;
        self.ticks += 1;
        if !due {
            return changed;
        }
        if self.is_busy() {
            self.busy_skips += 1;
            debug!("Tempo analysis still running, skipping this window");
            return changed;
        }

        let Some(snapshot) = buffer.snapshot_latest(self.window_samples) else {
            debug!(
                "Tempo analysis skipped: {:.2}s buffered, {:.2}s needed",
                buffer.duration_seconds(),
                self.config.window_seconds
            );
            return changed;
        };

        let mut worker_lost = false;
        let outcome = match &mut self.mode {
            AnalysisMode::Inline(analyzer) => {
                let cancel = AtomicBool::new(false);
                Some(AnalysisOutcome {
                    bpm: analyzer.estimate_cancellable(&snapshot.samples, &cancel),
                    window_end: snapshot.end_position,
                    window_len: snapshot.samples.len(),
                })
            }
            AnalysisMode::Background(worker) => {
                worker_lost = !worker.submit(snapshot);
                None
            }
        };
        if let Some(outcome) = outcome {
            changed |= self.record(outcome);
        }
        if worker_lost {
            self.fall_back_to_inline();
        }
        changed
    }

    pub fn smoothed_bpm(&self) -> f32 {
        self.history.smoothed()
    }

    pub fn history(&self) -> &BpmHistory {
        &self.history
    }

    pub fn is_background(&self) -> bool {
        matches!(self.mode, AnalysisMode::Background(_))
    }

    /// Due analyses skipped because the previous background job was still running.
    pub fn busy_skips(&self) -> u64 {
        self.busy_skips
    }

    /// Whether a submitted background analysis has not reported back yet.
    pub fn is_busy(&self) -> bool {
        match &self.mode {
            AnalysisMode::Background(worker) => worker.in_flight,
            AnalysisMode::Inline(_) => false,
        }
    }

    /// Cancels any in-flight analysis and joins the worker. Idempotent.
    pub fn shutdown(&mut self) {
        if let AnalysisMode::Background(worker) = &mut self.mode {
            worker.shutdown();
        }
    }

    fn collect_published(&mut self) -> bool {
        let AnalysisMode::Background(worker) = &mut self.mode else {
            return false;
        };

        let mut outcomes = Vec::new();
        let mut worker_lost = false;
        loop {
            match worker.results.try_recv() {
                Ok(outcome) => {
                    worker.in_flight = false;
                    outcomes.push(outcome);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    worker_lost = !worker.is_shut_down();
                    break;
                }
            }
        }

        let mut changed = false;
        for outcome in outcomes {
            changed |= self.record(outcome);
        }
        if worker_lost {
            self.fall_back_to_inline();
        }
        changed
    }

    fn record(&mut self, outcome: AnalysisOutcome) -> bool {
        let estimate = outcome
            .bpm
            .and_then(|bpm| TempoEstimate::new(bpm, outcome.window_end, outcome.window_len));
        match estimate {
            Some(estimate) => {
                self.history.push(estimate);
                debug!(
                    "Tempo estimate {:.2} BPM, smoothed {:.2} BPM over {} readings",
                    estimate.bpm,
                    self.history.smoothed(),
                    self.history.len()
                );
                true
            }
            None => {
                debug!("Discarded tempo estimate {:?}", outcome.bpm);
                false
            }
        }
    }

    fn fall_back_to_inline(&mut self) {
        warn!("Tempo worker stopped unexpectedly, analysing inline from now on");
        if let AnalysisMode::Background(worker) = &mut self.mode {
            worker.shutdown();
        }
        self.mode = AnalysisMode::Inline(TempoAnalyzer::new(self.sample_rate, &self.config));
    }
}

impl Drop for TempoEstimator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Background thread that analyses snapshots and publishes outcomes.
struct TempoWorker {
    jobs: Option<Sender<AudioSnapshot>>,
    results: Receiver<AnalysisOutcome>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    in_flight: bool,
}

impl TempoWorker {
    fn spawn(sample_rate: u32, config: &TempoConfig) -> std::io::Result<Self> {
        let (job_sender, job_receiver) = crossbeam_channel::bounded::<AudioSnapshot>(1);
        let (result_sender, result_receiver) = crossbeam_channel::bounded::<AnalysisOutcome>(4);
        let cancel = Arc::new(AtomicBool::new(false));

        let mut analyzer = TempoAnalyzer::new(sample_rate, config);
        let worker_cancel = Arc::clone(&cancel);
        let handle = std::thread::Builder::new()
            .name("tempo-analysis".to_string())
            .spawn(move || {
                for snapshot in job_receiver.iter() {
                    if worker_cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let bpm = analyzer.estimate_cancellable(&snapshot.samples, &worker_cancel);
                    if worker_cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let outcome = AnalysisOutcome {
                        bpm,
                        window_end: snapshot.end_position,
                        window_len: snapshot.samples.len(),
                    };
                    if result_sender.send(outcome).is_err() {
                        break;
                    }
                }
            })?;

        info!("Tempo analysis running on a background thread");
        Ok(Self {
            jobs: Some(job_sender),
            results: result_receiver,
            cancel,
            handle: Some(handle),
            in_flight: false,
        })
    }

    /// Returns `false` only if the worker is gone.
    fn submit(&mut self, snapshot: AudioSnapshot) -> bool {
        let Some(jobs) = &self.jobs else {
            return true;
        };
        match jobs.try_send(snapshot) {
            Ok(()) => {
                self.in_flight = true;
                true
            }
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    fn is_shut_down(&self) -> bool {
        self.jobs.is_none()
    }

    fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.jobs = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Tempo worker panicked during shutdown");
            }
        }
        self.in_flight = false;
    }
}
