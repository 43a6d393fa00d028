pub mod engine;
pub mod renderer;

pub use engine::GraphicsEngine;
pub use renderer::{overlay_text, Renderer};
