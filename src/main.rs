use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    event::{ElementState, Event, WindowEvent},
    event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use pulse_field::audio::{list_input_devices, AudioIngestor};
use pulse_field::graphics::GraphicsEngine;
use pulse_field::ui::Overlay;
use pulse_field::{ShutdownSignal, Visualizer, VisualizerConfig};

#[derive(Parser)]
#[command(name = "pulse-field")]
#[command(about = "Audio-reactive particle field driven by live input")]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Use the first input device whose name contains this text
    #[arg(long, short)]
    device: Option<String>,

    /// Print the available input devices and exit
    #[arg(long)]
    list_devices: bool,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Simulation ticks per second
    #[arg(long)]
    fps: Option<u32>,

    #[arg(long)]
    particles: Option<usize>,

    #[arg(long)]
    attractors: Option<usize>,

    #[arg(long)]
    speed: Option<f32>,

    /// Run tempo analysis on the main thread instead of a worker
    #[arg(long)]
    inline_tempo: bool,
}

impl Args {
    fn apply(&self, config: &mut VisualizerConfig) {
        if let Some(device) = &self.device {
            config.audio.device = Some(device.clone());
        }
        if let Some(width) = self.width {
            config.surface.width = width;
        }
        if let Some(height) = self.height {
            config.surface.height = height;
        }
        if let Some(fps) = self.fps {
            config.surface.target_fps = fps;
        }
        if let Some(particles) = self.particles {
            config.field.particle_count = particles;
        }
        if let Some(attractors) = self.attractors {
            config.field.attractor_count = attractors;
        }
        if let Some(speed) = self.speed {
            config.field.speed_multiplier = speed;
        }
        if self.inline_tempo {
            config.tempo.background = false;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum UserEvent {
    Interrupted,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_devices {
        for name in list_input_devices().context("Failed to list input devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => VisualizerConfig::load(path)?,
        None => VisualizerConfig::default(),
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!("Starting Pulse Field");

    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build()?;
    let shutdown = ShutdownSignal::new();
    spawn_interrupt_listener(shutdown.clone(), event_loop.create_proxy())?;

    let ingestor = AudioIngestor::open(&config.audio).context("Failed to start audio capture")?;
    let sample_rate = ingestor.sample_rate();
    let mut visualizer = Visualizer::new(&config, sample_rate, ingestor, shutdown);

    let (width, height) = (config.surface.width, config.surface.height);
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.surface.title.as_str())
            .with_inner_size(winit::dpi::LogicalSize::new(width, height))
            .build(&event_loop)?,
    );

    let mut graphics_engine = pollster::block_on(GraphicsEngine::new(Arc::clone(&window)))?;
    let mut overlay = Overlay::new(&window, &graphics_engine.device, graphics_engine.config.format);

    let tick_interval = config.tick_interval();
    let mut next_tick = Instant::now();

    info!("Visualizer initialized successfully");

    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent { event, .. } => {
                overlay.handle_event(&event, &window);
                match event {
                    WindowEvent::CloseRequested => {
                        info!("Close requested");
                        visualizer.shutdown();
                        elwt.exit();
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                            && event.state == ElementState::Pressed
                        {
                            info!("Escape pressed");
                            visualizer.shutdown();
                            elwt.exit();
                        }
                    }
                    WindowEvent::Resized(physical_size) => {
                        graphics_engine.resize(physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        let shapes = visualizer.render(overlay.viewport(&window));
                        let text = visualizer.overlay_text();
                        if let Err(e) = graphics_engine.render(&mut overlay, shapes, &text, &window) {
                            error!("Render error: {:#}", e);
                        }
                    }
                    _ => {}
                }
            }
            Event::UserEvent(UserEvent::Interrupted) => {
                visualizer.shutdown();
                elwt.exit();
            }
            Event::AboutToWait => {
                let now = Instant::now();
                if now >= next_tick {
                    if !visualizer.tick() {
                        elwt.exit();
                        return;
                    }
                    window.request_redraw();

                    next_tick += tick_interval;
                    if next_tick < now {
                        debug!("Tick overran by {:?}", now - next_tick);
                        next_tick = now + tick_interval;
                    }
                }
                elwt.set_control_flow(ControlFlow::WaitUntil(next_tick));
            }
            Event::LoopExiting => {
                visualizer.shutdown();
            }
            _ => {}
        }
    })?;

    info!("Pulse Field stopped");
    Ok(())
}

/// Ctrl-C sets the shutdown flag and wakes the event loop.
fn spawn_interrupt_listener(shutdown: ShutdownSignal, proxy: EventLoopProxy<UserEvent>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;

    std::thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Interrupt received, shutting down");
                        shutdown.request();
                        if proxy.send_event(UserEvent::Interrupted).is_err() {
                            debug!("Event loop already closed");
                        }
                    }
                    Err(e) => warn!("Failed to listen for interrupt: {}", e),
                }
            });
        })
        .context("Failed to spawn interrupt listener")?;

    Ok(())
}
