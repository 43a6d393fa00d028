use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::{AudioSource, EnergyExtractor, TempoEstimator, TrailingAudioBuffer};
use crate::config::VisualizerConfig;
use crate::graphics::{overlay_text, Renderer};
use crate::simulation::{ParticleField, SimulationState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// Shared stop request, settable from any thread or signal handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Windowless core of the visualizer: audio in, simulation state and shapes out.
///
/// The window event loop calls [`tick`](Self::tick) at the target rate and
/// paints what [`render`](Self::render) returns. Dropping the visualizer always
/// stops the audio source and the tempo worker.
pub struct Visualizer<S: AudioSource> {
    loop_state: LoopState,
    source: S,
    buffer: TrailingAudioBuffer,
    energy: EnergyExtractor,
    estimator: TempoEstimator,
    field: ParticleField,
    simulation: SimulationState,
    renderer: Renderer,
    shutdown: ShutdownSignal,
    ticks: u64,
    frames_ingested: u64,
}

impl<S: AudioSource> Visualizer<S> {
    pub fn new(
        config: &VisualizerConfig,
        sample_rate: u32,
        source: S,
        shutdown: ShutdownSignal,
    ) -> Self {
        let field = ParticleField::new(config.surface.width, config.surface.height, &config.field);
        let simulation = field.initial_state(&config.field);

        let mut visualizer = Self {
            loop_state: LoopState::Starting,
            source,
            buffer: TrailingAudioBuffer::new(sample_rate, config.audio.buffer_seconds),
            energy: EnergyExtractor::new(config.audio.block_size, &config.energy),
            estimator: TempoEstimator::new(sample_rate, &config.tempo),
            field,
            simulation,
            renderer: Renderer::new(config.surface.width, config.surface.height, &config.field),
            shutdown,
            ticks: 0,
            frames_ingested: 0,
        };

        info!(
            "Field ready: {} particles, {} attractors on {}x{}",
            visualizer.simulation.particles.len(),
            visualizer.simulation.centers.len(),
            config.surface.width,
            config.surface.height
        );
        visualizer.transition(LoopState::Running);
        visualizer
    }

    /// Runs one simulation step. Returns `false` once the loop has stopped.
    pub fn tick(&mut self) -> bool {
        if self.loop_state != LoopState::Running {
            return false;
        }
        if self.shutdown.is_requested() {
            self.shutdown();
            return false;
        }

        self.source.maintain();
        while let Some(frame) = self.source.try_next_frame() {
            self.buffer.push_frame(frame);
            self.frames_ingested += 1;
        }

        if self.estimator.update(&self.buffer) {
            self.simulation.smoothed_bpm = self.estimator.smoothed_bpm();
        }

        let pull_factor = match self.buffer.latest_frame() {
            Some(frame) => self.energy.pull_factor(frame),
            None => EnergyExtractor::BASELINE,
        };
        self.field.step(&mut self.simulation, pull_factor);

        self.ticks += 1;
        true
    }

    /// Shapes for the current state, laid out over `viewport`.
    pub fn render(&self, viewport: egui::Rect) -> Vec<egui::Shape> {
        self.renderer.render(&self.simulation, viewport)
    }

    pub fn overlay_text(&self) -> String {
        overlay_text(self.simulation.smoothed_bpm)
    }

    /// Simulation area, useful as a viewport that maps one to one.
    pub fn bounds(&self) -> egui::Rect {
        self.renderer.bounds()
    }

    pub fn simulation(&self) -> &SimulationState {
        &self.simulation
    }

    pub fn buffer(&self) -> &TrailingAudioBuffer {
        &self.buffer
    }

    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Stops audio and tempo analysis. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if matches!(self.loop_state, LoopState::ShuttingDown | LoopState::Stopped) {
            return;
        }
        self.shutdown.request();
        self.transition(LoopState::ShuttingDown);

        self.source.stop();
        self.estimator.shutdown();
        debug!(
            "Ran {} ticks over {} audio frames, {:.2}s buffered at exit",
            self.ticks,
            self.frames_ingested,
            self.buffer.duration_seconds()
        );

        self.transition(LoopState::Stopped);
    }

    fn transition(&mut self, next: LoopState) {
        info!("Visualizer {:?} -> {:?}", self.loop_state, next);
        self.loop_state = next;
    }
}

impl<S: AudioSource> Drop for Visualizer<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
