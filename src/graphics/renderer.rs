use egui::emath::RectTransform;
use egui::{pos2, vec2, Color32, Pos2, Rect, Shape, Stroke};
use glam::Vec2;

use crate::config::FieldConfig;
use crate::simulation::SimulationState;

/// Turns a [`SimulationState`] into egui shapes. Never mutates the state.
///
/// Simulation coordinates span `bounds`; every call maps them onto the
/// viewport it is given, so a resized window stretches the field instead of
/// changing the simulation.
pub struct Renderer {
    bounds: Rect,
    particle_radius: f32,
    attractor_radius: f32,
    color: Color32,
    line: Stroke,
}

impl Renderer {
    pub fn new(width: u32, height: u32, config: &FieldConfig) -> Self {
        Self {
            bounds: Rect::from_min_size(Pos2::ZERO, vec2(width as f32, height as f32)),
            particle_radius: config.particle_radius as f32,
            attractor_radius: config.attractor_radius as f32,
            color: Color32::WHITE,
            line: Stroke::new(1.0, Color32::WHITE),
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Attractor discs first, then each particle's disc followed by its lines
    /// to every attractor.
    pub fn render(&self, state: &SimulationState, viewport: Rect) -> Vec<Shape> {
        let to_screen = RectTransform::from_to(self.bounds, viewport);
        let scale = to_screen.scale().min_elem();
        let place = |p: Vec2| to_screen.transform_pos(pos2(p.x, p.y));

        let centers: Vec<Pos2> = state.centers.iter().map(|c| place(c.position)).collect();
        let mut shapes =
            Vec::with_capacity(centers.len() + state.particles.len() * (1 + centers.len()));

        for &center in &centers {
            shapes.push(Shape::circle_filled(center, self.attractor_radius * scale, self.color));
        }
        for particle in &state.particles {
            let position = place(particle.position);
            shapes.push(Shape::circle_filled(position, self.particle_radius * scale, self.color));
            for &center in &centers {
                shapes.push(Shape::line_segment([position, center], self.line));
            }
        }

        shapes
    }
}

pub fn overlay_text(bpm: f32) -> String {
    format!("BPM: {:.2}", bpm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{GravityCenter, Particle};
    use egui::epaint::CircleShape;

    fn state() -> SimulationState {
        SimulationState {
            particles: vec![
                Particle::at_rest(Vec2::new(10.0, 10.0)),
                Particle::at_rest(Vec2::new(90.0, 70.0)),
            ],
            centers: vec![GravityCenter {
                position: Vec2::new(50.0, 40.0),
            }],
            pull_factor: 1.0,
            smoothed_bpm: 121.456,
        }
    }

    fn renderer() -> Renderer {
        Renderer::new(100, 80, &FieldConfig::default())
    }

    fn circle(shape: &Shape) -> CircleShape {
        match shape {
            Shape::Circle(circle) => *circle,
            other => panic!("expected a circle, got {:?}", other),
        }
    }

    fn segment(shape: &Shape) -> [Pos2; 2] {
        match shape {
            Shape::LineSegment { points, .. } => *points,
            other => panic!("expected a line segment, got {:?}", other),
        }
    }

    fn assert_near(actual: Pos2, expected: Pos2) {
        assert!(actual.distance(expected) < 1e-3, "{:?} != {:?}", actual, expected);
    }

    fn assert_segment(shape: &Shape, from: Pos2, to: Pos2) {
        let [a, b] = segment(shape);
        assert_near(a, from);
        assert_near(b, to);
    }

    #[test]
    fn test_overlay_shows_two_decimals() {
        assert_eq!(overlay_text(0.0), "BPM: 0.00");
        assert_eq!(overlay_text(121.456), "BPM: 121.46");
    }

    #[test]
    fn test_frame_contains_markers_and_lines() {
        let renderer = renderer();
        let shapes = renderer.render(&state(), renderer.bounds());

        // One attractor, then (disc + one line) per particle.
        assert_eq!(shapes.len(), 5);

        let attractor = circle(&shapes[0]);
        assert_near(attractor.center, pos2(50.0, 40.0));
        assert_eq!(attractor.radius, 5.0);
        assert_eq!(attractor.fill, Color32::WHITE);

        let particle = circle(&shapes[1]);
        assert_near(particle.center, pos2(10.0, 10.0));
        assert_eq!(particle.radius, 2.0);
        assert_segment(&shapes[2], pos2(10.0, 10.0), pos2(50.0, 40.0));

        assert_near(circle(&shapes[3]).center, pos2(90.0, 70.0));
        assert_segment(&shapes[4], pos2(90.0, 70.0), pos2(50.0, 40.0));
    }

    #[test]
    fn test_every_particle_connects_to_every_attractor() {
        let renderer = renderer();
        let mut state = state();
        state.centers.push(GravityCenter {
            position: Vec2::new(20.0, 60.0),
        });
        state.centers.push(GravityCenter {
            position: Vec2::new(80.0, 20.0),
        });

        let shapes = renderer.render(&state, renderer.bounds());
        let lines = shapes
            .iter()
            .filter(|s| matches!(s, Shape::LineSegment { .. }))
            .count();
        assert_eq!(lines, 2 * 3);
        assert_eq!(shapes.len(), 3 + 2 * (1 + 3));
    }

    #[test]
    fn test_empty_state_draws_nothing() {
        let renderer = renderer();
        let mut empty = state();
        empty.particles.clear();
        empty.centers.clear();
        assert!(renderer.render(&empty, renderer.bounds()).is_empty());
    }

    #[test]
    fn test_viewport_stretches_field() {
        let renderer = renderer();
        let viewport = Rect::from_min_size(Pos2::ZERO, vec2(200.0, 240.0));
        let shapes = renderer.render(&state(), viewport);

        let attractor = circle(&shapes[0]);
        assert_near(attractor.center, pos2(100.0, 120.0));
        // Radii follow the smaller of the two axis scales.
        assert!((attractor.radius - 10.0).abs() < 1e-4);
        assert_segment(&shapes[4], pos2(180.0, 210.0), pos2(100.0, 120.0));
    }

    #[test]
    fn test_render_leaves_state_untouched() {
        let renderer = renderer();
        let state = state();
        let before = state.particles.clone();
        let first = renderer.render(&state, renderer.bounds());
        let second = renderer.render(&state, renderer.bounds());
        assert_eq!(first, second);
        assert_eq!(state.particles, before);
    }
}
