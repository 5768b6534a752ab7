//! force - Velocity rules applied to particles each frame
//! Forces never touch position; integration happens in the generator driver

use core::f32::consts::TAU;

use crate::particle::{Particle, ParticleFlags};

/// Frame rate the drag coefficient is expressed against.
pub const TARGET_FPS: f32 = 30.0;
/// Longest step drag will damp over, in seconds.
pub const MAX_DRAG_DT: f32 = 1.0;
/// Radial pushes are skipped closer than this to the center.
pub const RADIAL_EPSILON: f32 = 0.001;

pub trait Force {
    fn apply(&self, p: &mut Particle, dt: f32);
}

/// Constant acceleration along y. Negative pulls up (sparks), positive down (drops).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Gravity {
    pub g: f32,
}

impl Gravity {
    pub const fn new(g: f32) -> Self {
        Self { g }
    }
}

impl Force for Gravity {
    fn apply(&self, p: &mut Particle, dt: f32) {
        if p.has_flag(ParticleFlags::GRAVITY) {
            p.vy += (self.g / p.mass) * dt;
        }
    }
}

/// Horizontal push with a slowly travelling sine ripple.
///
/// Cheap stand-in for turbulence: the ripple depends on height, so
/// particles at different rows sway differently.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Wind {
    pub base: f32,
    pub variation: f32,
    phase: f32,
}

impl Wind {
    pub const fn new(base: f32, variation: f32) -> Self {
        Self {
            base,
            variation,
            phase: 0.0,
        }
    }

    /// Call once per frame, before applying.
    pub fn update(&mut self, dt: f32) {
        self.phase = libm::fmodf(self.phase + dt * 0.5, TAU);
        if !self.phase.is_finite() || self.phase < 0.0 {
            self.phase = 0.0;
        }
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn strength_at(&self, y: f32) -> f32 {
        self.base + self.variation * libm::sinf(self.phase + y * 0.1)
    }
}

impl Force for Wind {
    fn apply(&self, p: &mut Particle, dt: f32) {
        if p.has_flag(ParticleFlags::WIND) {
            p.vx += (self.strength_at(p.y) / p.mass) * dt;
        }
    }
}

/// Air resistance: `v *= coeff^(dt * TARGET_FPS)`.
///
/// `coeff` is the fraction of velocity kept per 1/30 s; 1.0 means no drag.
/// Applies to every particle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Drag {
    pub coeff: f32,
}

impl Drag {
    pub const fn new(coeff: f32) -> Self {
        Self { coeff }
    }

    pub fn damping(&self, dt: f32) -> f32 {
        let safe_dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_DRAG_DT)
        } else {
            0.0
        };
        let coeff = if self.coeff.is_finite() {
            self.coeff.clamp(0.0, 1.0)
        } else {
            1.0
        };
        libm::powf(coeff, safe_dt * TARGET_FPS)
    }
}

impl Force for Drag {
    fn apply(&self, p: &mut Particle, dt: f32) {
        let k = self.damping(dt);
        p.vx *= k;
        p.vy *= k;
    }
}

/// Pushes particles directly away from an impact point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Radial {
    pub cx: f32,
    pub cy: f32,
    pub strength: f32,
}

impl Radial {
    pub const fn new(cx: f32, cy: f32, strength: f32) -> Self {
        Self { cx, cy, strength }
    }
}

impl Force for Radial {
    fn apply(&self, p: &mut Particle, dt: f32) {
        if !p.has_flag(ParticleFlags::RADIAL) {
            return;
        }
        let dx = p.x - self.cx;
        let dy = p.y - self.cy;
        let dist = libm::sqrtf(dx * dx + dy * dy);
        if dist.is_nan() || dist <= RADIAL_EPSILON {
            return;
        }
        let push = self.strength / p.mass * dt;
        p.vx += dx / dist * push;
        p.vy += dy / dist * push;
    }
}
