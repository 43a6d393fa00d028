use glam::Vec2;

use crate::config::FieldConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Particle {
    pub fn at_rest(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
        }
    }
}

/// Fixed attractor. Never moves during a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityCenter {
    pub position: Vec2,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct SimulationState {
    pub particles: Vec<Particle>,
    pub centers: Vec<GravityCenter>,
    pub pull_factor: f32,
    pub smoothed_bpm: f32,
}

/// Integrates particles towards fixed attractors on a toroidal surface.
///
/// Each step applies `v += F·dt`, `v *= damping`, `p += v·dt` and wraps `p`
/// into `[0, width) × [0, height)`. The force from one attractor is
/// `pull · speed / d²` along the unit direction to it, with `d` floored at
/// `min_distance` so a particle sitting on an attractor stays finite.
#[derive(Debug, Clone)]
pub struct ParticleField {
    width: f32,
    height: f32,
    speed_multiplier: f32,
    damping: f32,
    dt: f32,
    min_distance: f32,
}

impl ParticleField {
    pub fn new(width: u32, height: u32, config: &FieldConfig) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
            speed_multiplier: config.speed_multiplier,
            damping: config.damping,
            dt: config.dt,
            min_distance: config.min_distance.max(f32::EPSILON),
        }
    }

    /// Initial state: particles on a near-square grid inset by the margin,
    /// attractors evenly spaced along the horizontal midline.
    pub fn initial_state(&self, config: &FieldConfig) -> SimulationState {
        SimulationState {
            particles: grid_layout(
                config.particle_count,
                self.width,
                self.height,
                config.margin_fraction,
            )
            .into_iter()
            .map(Particle::at_rest)
            .collect(),
            centers: center_layout(config.attractor_count, self.width, self.height),
            pull_factor: 1.0,
            smoothed_bpm: 0.0,
        }
    }

    /// Net force on a point from all attractors.
    pub fn force_at(&self, position: Vec2, centers: &[GravityCenter], pull_factor: f32) -> Vec2 {
        let strength = pull_factor * self.speed_multiplier;
        centers.iter().fold(Vec2::ZERO, |total, center| {
            let offset = center.position - position;
            let distance = offset.length().max(self.min_distance);
            total + offset.normalize_or_zero() * (strength / (distance * distance))
        })
    }

    /// Advances one particle by one time step under `force`.
    pub fn integrate(&self, particle: &mut Particle, force: Vec2) {
        particle.velocity += force * self.dt;
        particle.velocity *= self.damping;
        if !particle.velocity.is_finite() {
            particle.velocity = Vec2::ZERO;
        }
        particle.position = self.wrap(particle.position + particle.velocity * self.dt);
    }

    pub fn step(&self, state: &mut SimulationState, pull_factor: f32) {
        let pull_factor = if pull_factor.is_finite() { pull_factor } else { 1.0 };
        state.pull_factor = pull_factor;
        for particle in state.particles.iter_mut() {
            let force = self.force_at(particle.position, &state.centers, pull_factor);
            self.integrate(particle, force);
        }
    }

    pub fn wrap(&self, position: Vec2) -> Vec2 {
        Vec2::new(wrap_axis(position.x, self.width), wrap_axis(position.y, self.height))
    }
}

/// `rem_euclid` can round up to exactly `extent` for tiny negative inputs.
fn wrap_axis(value: f32, extent: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    let wrapped = value.rem_euclid(extent);
    if wrapped >= extent || wrapped < 0.0 {
        0.0
    } else {
        wrapped
    }
}

/// `count` points on a `cols × rows` grid with `cols = ceil(sqrt(count))`,
/// filled row by row inside the margin.
pub fn grid_layout(count: usize, width: f32, height: f32, margin_fraction: f32) -> Vec<Vec2> {
    if count == 0 {
        return Vec::new();
    }
    let cols = (count as f32).sqrt().ceil() as usize;
    let rows = count.div_ceil(cols);
    let margin = Vec2::new(width, height) * margin_fraction;
    let span = Vec2::new(width, height) - margin * 2.0;
    let spacing = Vec2::new(
        if cols > 1 { span.x / (cols - 1) as f32 } else { 0.0 },
        if rows > 1 { span.y / (rows - 1) as f32 } else { 0.0 },
    );

    (0..count)
        .map(|i| {
            let (col, row) = (i % cols, i / cols);
            margin + spacing * Vec2::new(col as f32, row as f32)
        })
        .collect()
}

pub fn center_layout(count: usize, width: f32, height: f32) -> Vec<GravityCenter> {
    (0..count)
        .map(|i| GravityCenter {
            position: Vec2::new(width * (i as f32 + 0.5) / count as f32, height / 2.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn field() -> (ParticleField, SimulationState) {
        let config = FieldConfig::default();
        let field = ParticleField::new(800, 600, &config);
        let state = field.initial_state(&config);
        (field, state)
    }

    fn assert_close(actual: Vec2, expected: Vec2) {
        assert!(actual.abs_diff_eq(expected, 1e-3), "{} != {}", actual, expected);
    }

    fn in_bounds(state: &SimulationState) -> bool {
        state.particles.iter().all(|p| {
            p.position.x >= 0.0 && p.position.x < 800.0 && p.position.y >= 0.0 && p.position.y < 600.0
        })
    }

    #[test]
    fn test_grid_layout_is_near_square() {
        let points = grid_layout(100, 800.0, 600.0, 0.1);
        assert_eq!(points.len(), 100);
        assert_close(points[0], Vec2::new(80.0, 60.0));
        assert_close(points[9], Vec2::new(720.0, 60.0));
        assert_close(points[99], Vec2::new(720.0, 540.0));

        // 10 points: 4 columns, 3 rows, last row partial.
        let points = grid_layout(10, 800.0, 600.0, 0.1);
        assert_eq!(points.len(), 10);
        assert_close(points[4], Vec2::new(80.0, 300.0));
        assert_close(points[9], Vec2::new(80.0 + 640.0 / 3.0, 540.0));

        let single = grid_layout(1, 800.0, 600.0, 0.1);
        assert_eq!(single.len(), 1);
        assert_close(single[0], Vec2::new(80.0, 60.0));
        assert!(grid_layout(0, 800.0, 600.0, 0.1).is_empty());
    }

    #[test]
    fn test_centers_on_midline() {
        let centers = center_layout(10, 800.0, 600.0);
        assert_eq!(centers.len(), 10);
        assert_eq!(centers[0].position, Vec2::new(40.0, 300.0));
        assert_eq!(centers[9].position, Vec2::new(760.0, 300.0));
    }

    #[test]
    fn test_particles_stay_in_bounds() {
        let (field, mut state) = field();
        for tick in 0..600 {
            let pull = 1.0 + (tick % 17) as f32 * 3.0;
            field.step(&mut state, pull);
            assert!(in_bounds(&state), "out of bounds after tick {}", tick);
        }
    }

    #[test]
    fn test_force_at_center_is_finite() {
        let (field, state) = field();
        let on_center = state.centers[3].position;
        for pull in [1e-6, 1.0, 2.5, 1e3, 1e6] {
            let force = field.force_at(on_center, &state.centers, pull);
            assert!(force.is_finite());
            // The coincident attractor contributes nothing; the rest are at
            // least 80 px away.
            let bound = pull * 7.0 * state.centers.len() as f32 / (80.0 * 80.0);
            assert!(force.length() <= bound * 1.0001, "pull {} force {}", pull, force);
        }
    }

    #[test]
    fn test_force_floor_near_center() {
        let config = FieldConfig::default();
        let field = ParticleField::new(800, 600, &config);
        let centers = [GravityCenter {
            position: Vec2::new(400.0, 300.0),
        }];
        let force = field.force_at(Vec2::new(400.5, 300.0), &centers, 1.0);
        // Distance 0.5 is floored to 1.0.
        assert!((force.x + 7.0).abs() < 1e-4);
        assert_eq!(force.y, 0.0);
    }

    #[test]
    fn test_velocity_is_damped() {
        let (field, _) = field();
        let mut particle = Particle {
            position: Vec2::new(100.0, 100.0),
            velocity: Vec2::new(10.0, -4.0),
        };
        field.integrate(&mut particle, Vec2::ZERO);
        assert_close(particle.velocity, Vec2::new(8.5, -3.4));
        assert_close(particle.position, Vec2::new(108.5, 96.6));
    }

    #[test]
    fn test_identical_particles_track_identically() {
        let (field, state) = field();
        let start = Particle {
            position: Vec2::new(123.0, 456.0),
            velocity: Vec2::new(0.3, -0.2),
        };
        let (mut a, mut b) = (start, start);
        for tick in 0..500 {
            let pull = 1.0 + (tick as f32 * 0.37).sin().abs() * 4.0;
            let force = field.force_at(a.position, &state.centers, pull);
            field.integrate(&mut a, force);
            let force = field.force_at(b.position, &state.centers, pull);
            field.integrate(&mut b, force);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_step_records_pull_factor() {
        let (field, mut state) = field();
        field.step(&mut state, 2.0);
        assert_eq!(state.pull_factor, 2.0);
        field.step(&mut state, f32::NAN);
        assert_eq!(state.pull_factor, 1.0);
        assert!(in_bounds(&state));
    }

    proptest! {
        #[test]
        fn prop_wrap_stays_on_surface(x in -1e7f32..1e7, y in -1e7f32..1e7) {
            let (field, _) = field();
            let wrapped = field.wrap(Vec2::new(x, y));
            prop_assert!(wrapped.x >= 0.0 && wrapped.x < 800.0);
            prop_assert!(wrapped.y >= 0.0 && wrapped.y < 600.0);
        }

        #[test]
        fn prop_wrap_tiny_negatives(eps in 0.0f32..1e-3) {
            let (field, _) = field();
            let wrapped = field.wrap(Vec2::new(-eps, -eps));
            prop_assert!(wrapped.x < 800.0 && wrapped.y < 600.0);
        }
    }
}
