//! layout - Strategies that map generic particle physics onto a physical LED arrangement
//!
//! Three concerns vary with the layout: where particles are born
//! ([`SpawnRegion`]), what happens at the edges ([`Boundary`]), and which axis
//! the forces act along ([`ForceAdapter`]). Each is a plain enum stored by
//! value inside the generator, chosen once in `begin` by [`PhysicsContext`].

use core::f32::consts::TAU;

use crate::config::LayoutKind;
use crate::force::{Drag, Force, Gravity, Wind};
use crate::generator::GeneratorKind;
use crate::particle::{Particle, ParticleFlags};
use crate::pool::Fate;
use crate::rng::Rng;

/// Restitution used by bouncing boundaries.
pub const BOUNCE_DAMPING: f32 = 0.8;
/// How far inside the far edge a bounced particle is placed.
const EDGE_INSET: f32 = 0.001;

/// Matrix layouts treat y as the primary (vertical) axis; strings use x.
pub fn is_primary_axis_vertical(layout: LayoutKind) -> bool {
    layout == LayoutKind::Matrix
}

/// A string of LEDs is assumed to close into a ring (hat brim).
pub fn wraps_by_default(layout: LayoutKind) -> bool {
    layout == LayoutKind::Linear
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SpawnRegion {
    /// Along one edge, launching particles away from it.
    Edge { edge: Edge, width: u16, height: u16 },
    /// Anywhere on the grid.
    Random { width: u16, height: u16 },
    /// Within `spread` (fraction of each dimension) of the middle.
    Center { width: u16, height: u16, spread: f32 },
}

impl SpawnRegion {
    pub fn spawn_position(&self, rng: &mut Rng) -> (f32, f32) {
        match *self {
            SpawnRegion::Edge {
                edge,
                width,
                height,
            } => {
                let w = width as f32;
                let h = height as f32;
                match edge {
                    Edge::Top => (rng.range_f32(0.0, w), 0.0),
                    Edge::Bottom => (rng.range_f32(0.0, w), h - 1.0),
                    Edge::Left => (0.0, rng.range_f32(0.0, h)),
                    Edge::Right => (w - 1.0, rng.range_f32(0.0, h)),
                }
            }
            SpawnRegion::Random { width, height } => (
                rng.range_f32(0.0, width as f32),
                rng.range_f32(0.0, height.max(1) as f32),
            ),
            SpawnRegion::Center {
                width,
                height,
                spread,
            } => {
                let (cx, cy) = self.center();
                let x = cx + rng.range_f32(-1.0, 1.0) * width as f32 * spread;
                let y = cy + rng.range_f32(-1.0, 1.0) * height as f32 * spread;
                (
                    x.clamp(0.0, (width.max(1) - 1) as f32),
                    y.clamp(0.0, (height.max(1) - 1) as f32),
                )
            }
        }
    }

    /// Launch velocity of magnitude `speed`, pointing the way this region emits.
    pub fn initial_velocity(&self, speed: f32, rng: &mut Rng) -> (f32, f32) {
        match *self {
            SpawnRegion::Edge { edge, .. } => match edge {
                Edge::Top => (0.0, speed),
                Edge::Bottom => (0.0, -speed),
                Edge::Left => (speed, 0.0),
                Edge::Right => (-speed, 0.0),
            },
            SpawnRegion::Random { height, .. } => {
                let angle = rng.range_f32(0.0, TAU);
                // mostly sideways; a single-row string has no vertical room at all
                let lift = if height <= 1 { 0.0 } else { 0.3 };
                (
                    libm::cosf(angle) * speed,
                    libm::sinf(angle) * speed * lift,
                )
            }
            SpawnRegion::Center { .. } => {
                let angle = rng.range_f32(0.0, TAU);
                (libm::cosf(angle) * speed, libm::sinf(angle) * speed)
            }
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        match *self {
            SpawnRegion::Edge {
                edge,
                width,
                height,
            } => match edge {
                Edge::Top => y < 1.0,
                Edge::Bottom => y >= height as f32 - 1.0,
                Edge::Left => x < 1.0,
                Edge::Right => x >= width as f32 - 1.0,
            },
            SpawnRegion::Random { width, height } => {
                x >= 0.0 && x < width as f32 && y >= 0.0 && y < height as f32
            }
            SpawnRegion::Center {
                width,
                height,
                spread,
            } => {
                let (cx, cy) = self.center();
                let dx = libm::fabsf(x - cx) / width.max(1) as f32;
                let dy = libm::fabsf(y - cy) / height.max(1) as f32;
                dx <= spread && dy <= spread
            }
        }
    }

    pub fn center(&self) -> (f32, f32) {
        match *self {
            SpawnRegion::Edge {
                edge,
                width,
                height,
            } => {
                let w = width as f32;
                let h = height as f32;
                match edge {
                    Edge::Top => (w / 2.0, 0.0),
                    Edge::Bottom => (w / 2.0, h - 1.0),
                    Edge::Left => (0.0, h / 2.0),
                    Edge::Right => (w - 1.0, h / 2.0),
                }
            }
            SpawnRegion::Random { width, height } | SpawnRegion::Center { width, height, .. } => {
                (width as f32 / 2.0, height as f32 / 2.0)
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BoundaryAction {
    None,
    Kill,
    Bounce,
    Wrap,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Boundary {
    /// Particles leaving the grid die.
    Kill,
    /// Reflect off every edge, keeping `damping` of the speed.
    Bounce { damping: f32 },
    /// Reappear on the opposite side of wrapped axes; die on the others.
    Wrap { x: bool, y: bool },
}

impl Boundary {
    pub fn check(&self, p: &Particle, width: u16, height: u16) -> BoundaryAction {
        if !p.x.is_finite() || !p.y.is_finite() {
            return BoundaryAction::Kill;
        }
        let out_x = p.x < 0.0 || p.x >= width as f32;
        let out_y = p.y < 0.0 || p.y >= height as f32;
        if !out_x && !out_y {
            return BoundaryAction::None;
        }
        match *self {
            Boundary::Kill => BoundaryAction::Kill,
            Boundary::Bounce { .. } => BoundaryAction::Bounce,
            Boundary::Wrap { x, y } => {
                if (out_x && !x) || (out_y && !y) {
                    BoundaryAction::Kill
                } else {
                    BoundaryAction::Wrap
                }
            }
        }
    }

    /// Bring an out-of-range particle back inside. No-op for `Kill`.
    pub fn correct(&self, p: &mut Particle, width: u16, height: u16) {
        let w = width as f32;
        let h = height as f32;
        match *self {
            Boundary::Kill => {}
            Boundary::Bounce { damping } => {
                if p.x < 0.0 {
                    p.x = 0.0;
                    p.vx = -p.vx * damping;
                } else if p.x >= w {
                    p.x = (w - EDGE_INSET).max(0.0);
                    p.vx = -p.vx * damping;
                }
                if p.y < 0.0 {
                    p.y = 0.0;
                    p.vy = -p.vy * damping;
                } else if p.y >= h {
                    p.y = (h - EDGE_INSET).max(0.0);
                    p.vy = -p.vy * damping;
                }
            }
            Boundary::Wrap { x, y } => {
                if x && width > 0 {
                    p.x = wrap(p.x, w);
                }
                if y && height > 0 {
                    p.y = wrap(p.y, h);
                }
            }
        }
    }

    /// Check and correct in one go, reporting whether the particle survives.
    pub fn resolve(&self, p: &mut Particle, width: u16, height: u16) -> Fate {
        match self.check(p, width, height) {
            BoundaryAction::Kill => Fate::Kill,
            BoundaryAction::Bounce | BoundaryAction::Wrap => {
                self.correct(p, width, height);
                Fate::Live
            }
            BoundaryAction::None => Fate::Live,
        }
    }
}

fn wrap(v: f32, size: f32) -> f32 {
    let r = libm::fmodf(v, size);
    let r = if r < 0.0 { r + size } else { r };
    // fmod of a tiny negative can round up to exactly `size`
    if r >= size {
        0.0
    } else {
        r
    }
}

/// Maps "gravity" and "wind" onto the axes that make sense for a layout.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ForceAdapter {
    /// Gravity along y, wind along x.
    Matrix { wind: Wind },
    /// Everything along the string (x); gravity becomes a lateral pull.
    Linear { wind: Wind },
}

impl ForceAdapter {
    pub fn for_layout(layout: LayoutKind) -> Self {
        match layout {
            LayoutKind::Linear => ForceAdapter::Linear {
                wind: Wind::new(0.0, 0.0),
            },
            LayoutKind::Matrix | LayoutKind::Random => ForceAdapter::Matrix {
                wind: Wind::new(0.0, 0.0),
            },
        }
    }

    fn wind_mut(&mut self) -> &mut Wind {
        match self {
            ForceAdapter::Matrix { wind } | ForceAdapter::Linear { wind } => wind,
        }
    }

    pub fn wind(&self) -> &Wind {
        match self {
            ForceAdapter::Matrix { wind } | ForceAdapter::Linear { wind } => wind,
        }
    }

    pub fn set_wind(&mut self, base: f32, variation: f32) {
        let wind = self.wind_mut();
        wind.base = base;
        wind.variation = variation;
    }

    /// Advance time-varying state. Once per frame.
    pub fn update(&mut self, dt: f32) {
        self.wind_mut().update(dt);
    }

    pub fn apply_gravity(&self, p: &mut Particle, dt: f32, g: f32) {
        match self {
            ForceAdapter::Matrix { .. } => Gravity::new(g).apply(p, dt),
            ForceAdapter::Linear { .. } => {
                if p.has_flag(ParticleFlags::GRAVITY) {
                    p.vx += (g / p.mass) * dt;
                }
            }
        }
    }

    pub fn apply_wind(&self, p: &mut Particle, dt: f32) {
        match self {
            ForceAdapter::Matrix { wind } => wind.apply(p, dt),
            ForceAdapter::Linear { wind } => {
                if p.has_flag(ParticleFlags::WIND) {
                    // ripple travels along the string instead of up it
                    p.vx += (wind.strength_at(p.x) / p.mass) * dt;
                }
            }
        }
    }

    pub fn apply_drag(&self, p: &mut Particle, dt: f32, coeff: f32) {
        Drag::new(coeff).apply(p, dt);
    }
}

/// The three layout strategies a particle generator runs with.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PhysicsContext {
    pub spawn: SpawnRegion,
    pub boundary: Boundary,
    pub forces: ForceAdapter,
}

impl PhysicsContext {
    /// Pick strategies for `kind` running on `layout`.
    pub fn for_layout(layout: LayoutKind, kind: GeneratorKind, width: u16, height: u16) -> Self {
        Self {
            spawn: Self::spawn_region(layout, kind, width, height),
            boundary: Self::boundary(layout, kind, wraps_by_default(layout)),
            forces: ForceAdapter::for_layout(layout),
        }
    }

    pub fn spawn_region(
        layout: LayoutKind,
        kind: GeneratorKind,
        width: u16,
        height: u16,
    ) -> SpawnRegion {
        let random = SpawnRegion::Random { width, height };
        match layout {
            LayoutKind::Linear => random,
            LayoutKind::Matrix | LayoutKind::Random => match kind {
                GeneratorKind::Fire | GeneratorKind::HeatFire => SpawnRegion::Edge {
                    edge: Edge::Bottom,
                    width,
                    height,
                },
                GeneratorKind::Water => SpawnRegion::Edge {
                    edge: Edge::Top,
                    width,
                    height,
                },
                GeneratorKind::Lightning => random,
            },
        }
    }

    pub fn boundary(layout: LayoutKind, kind: GeneratorKind, wrap: bool) -> Boundary {
        match layout {
            LayoutKind::Linear if wrap => Boundary::Wrap { x: true, y: false },
            LayoutKind::Linear => Boundary::Bounce {
                damping: BOUNCE_DAMPING,
            },
            LayoutKind::Matrix | LayoutKind::Random => match kind {
                GeneratorKind::Fire | GeneratorKind::HeatFire | GeneratorKind::Water => {
                    Boundary::Kill
                }
                GeneratorKind::Lightning => Boundary::Bounce {
                    damping: BOUNCE_DAMPING,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_regions_launch_away_from_their_edge() {
        let mut rng = Rng::new(3);
        let bottom = SpawnRegion::Edge {
            edge: Edge::Bottom,
            width: 4,
            height: 15,
        };
        let (x, y) = bottom.spawn_position(&mut rng);
        assert!((0.0..4.0).contains(&x));
        assert_eq!(y, 14.0);
        assert!(bottom.contains(x, y));
        assert_eq!(bottom.initial_velocity(5.0, &mut rng), (0.0, -5.0));
    }

    #[test]
    fn center_region_stays_on_grid() {
        let mut rng = Rng::new(11);
        let region = SpawnRegion::Center {
            width: 8,
            height: 8,
            spread: 0.9,
        };
        for _ in 0..500 {
            let (x, y) = region.spawn_position(&mut rng);
            assert!((0.0..=7.0).contains(&x) && (0.0..=7.0).contains(&y));
        }
    }

    #[test]
    fn single_row_strings_launch_along_the_string() {
        let mut rng = Rng::new(5);
        let string = SpawnRegion::Random { width: 89, height: 1 };
        for _ in 0..50 {
            let (_, vy) = string.initial_velocity(6.0, &mut rng);
            assert_eq!(vy, 0.0);
        }
    }

    #[test]
    fn bounce_reflects_with_restitution() {
        let boundary = Boundary::Bounce { damping: 0.8 };
        let mut p = Particle::new(-0.5, 2.0, -10.0, 0.0, 100);
        assert_eq!(boundary.resolve(&mut p, 4, 4), Fate::Live);
        assert_eq!(p.x, 0.0);
        assert!(libm::fabsf(p.vx - 8.0) < 1e-5);

        let mut q = Particle::new(1.0, 4.2, 0.0, 5.0, 100);
        boundary.resolve(&mut q, 4, 4);
        assert!(q.y < 4.0);
        assert!(libm::fabsf(q.vy + 4.0) < 1e-5);
    }

    #[test]
    fn wrap_moves_to_the_far_side_and_kills_off_axis() {
        let boundary = Boundary::Wrap { x: true, y: false };
        let mut p = Particle::new(-0.25, 0.0, -1.0, 0.0, 100);
        assert_eq!(boundary.resolve(&mut p, 89, 1), Fate::Live);
        assert!(libm::fabsf(p.x - 88.75) < 1e-4);

        let mut q = Particle::new(90.5, 0.0, 1.0, 0.0, 100);
        boundary.resolve(&mut q, 89, 1);
        assert!(libm::fabsf(q.x - 1.5) < 1e-4);

        let mut r = Particle::new(3.0, 1.5, 0.0, 1.0, 100);
        assert_eq!(boundary.resolve(&mut r, 89, 1), Fate::Kill);
    }

    #[test]
    fn non_finite_positions_are_killed() {
        let mut p = Particle::new(f32::NAN, 0.0, 0.0, 0.0, 100);
        assert_eq!(Boundary::Bounce { damping: 0.8 }.resolve(&mut p, 4, 4), Fate::Kill);
    }

    #[test]
    fn linear_adapter_turns_gravity_sideways() {
        let adapter = ForceAdapter::for_layout(LayoutKind::Linear);
        let mut p = Particle::new(10.0, 0.0, 0.0, 0.0, 100).with_flags(ParticleFlags::GRAVITY);
        adapter.apply_gravity(&mut p, 0.5, 4.0);
        assert_eq!((p.vx, p.vy), (2.0, 0.0));

        let matrix = ForceAdapter::for_layout(LayoutKind::Matrix);
        let mut q = Particle::new(1.0, 1.0, 0.0, 0.0, 100).with_flags(ParticleFlags::GRAVITY);
        matrix.apply_gravity(&mut q, 0.5, 4.0);
        assert_eq!((q.vx, q.vy), (0.0, 2.0));
    }

    #[test]
    fn factory_matches_layout_and_generator() {
        let fire = PhysicsContext::for_layout(LayoutKind::Matrix, GeneratorKind::Fire, 16, 8);
        assert!(matches!(fire.spawn, SpawnRegion::Edge { edge: Edge::Bottom, .. }));
        assert_eq!(fire.boundary, Boundary::Kill);
        assert!(matches!(fire.forces, ForceAdapter::Matrix { .. }));

        let hat = PhysicsContext::for_layout(LayoutKind::Linear, GeneratorKind::Water, 89, 1);
        assert!(matches!(hat.spawn, SpawnRegion::Random { .. }));
        assert_eq!(hat.boundary, Boundary::Wrap { x: true, y: false });
        assert!(matches!(hat.forces, ForceAdapter::Linear { .. }));

        let storm = PhysicsContext::for_layout(LayoutKind::Random, GeneratorKind::Lightning, 8, 8);
        assert_eq!(storm.boundary, Boundary::Bounce { damping: BOUNCE_DAMPING });
    }
}
