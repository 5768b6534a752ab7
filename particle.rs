//! particle - The simulated element shared by every particle generator

use core::ops::{BitOr, BitOrAssign};

pub const MIN_MASS: f32 = 0.01;
pub const MAX_MASS: f32 = 10.0;

/// Behavior bits selecting which forces and effects apply to a particle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticleFlags(u8);

impl ParticleFlags {
    pub const NONE: Self = Self(0x00);
    /// Leaves heat or light behind as it moves.
    pub const EMIT_TRAIL: Self = Self(0x01);
    pub const BOUNCE: Self = Self(0x02);
    /// Intensity falls linearly to zero over `max_age`.
    pub const FADE: Self = Self(0x04);
    /// May spawn child particles once.
    pub const BRANCH: Self = Self(0x08);
    /// Spawns a splash when it lands.
    pub const SPLASH: Self = Self(0x10);
    pub const GRAVITY: Self = Self(0x20);
    pub const WIND: Self = Self(0x40);
    pub const RADIAL: Self = Self(0x80);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for ParticleFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ParticleFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Position and velocity are in LED units; ages are in milliseconds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Brightness or heat, 0 means dead.
    pub intensity: u8,
    /// Intensity at spawn, the starting point of the linear fade.
    pub birth_intensity: u8,
    /// Saturates at `u16::MAX`.
    pub age: u16,
    /// 0 = immortal.
    pub max_age: u16,
    pub mass: f32,
    pub flags: ParticleFlags,
}

impl Default for Particle {
    fn default() -> Self {
        Self::DEAD
    }
}

impl Particle {
    pub const DEAD: Self = Self {
        x: 0.0,
        y: 0.0,
        vx: 0.0,
        vy: 0.0,
        intensity: 0,
        birth_intensity: 0,
        age: 0,
        max_age: 0,
        mass: 1.0,
        flags: ParticleFlags::NONE,
    };

    /// Immortal, unit mass, no flags. Refine with the `with_*` builders.
    pub fn new(x: f32, y: f32, vx: f32, vy: f32, intensity: u8) -> Self {
        Self {
            x,
            y,
            vx,
            vy,
            intensity,
            birth_intensity: intensity,
            ..Self::DEAD
        }
    }

    pub fn with_lifetime(mut self, max_age_ms: u16) -> Self {
        self.max_age = max_age_ms;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_flags(mut self, flags: ParticleFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.intensity > 0 && (self.max_age == 0 || self.age < self.max_age)
    }

    pub fn has_flag(&self, flag: ParticleFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Mass outside [MIN_MASS, MAX_MASS] (or NaN) is pulled back in.
    pub fn clamp_mass(&mut self) {
        self.mass = if self.mass.is_nan() {
            1.0
        } else {
            self.mass.clamp(MIN_MASS, MAX_MASS)
        };
    }

    /// Advance age by `dt` seconds, saturating instead of wrapping, then fade.
    pub fn age_by(&mut self, dt: f32) {
        let step_ms = if dt.is_finite() && dt > 0.0 { dt * 1000.0 } else { 0.0 };
        let aged = self.age as f32 + step_ms;
        self.age = if aged >= u16::MAX as f32 {
            u16::MAX
        } else {
            aged as u16
        };

        if self.has_flag(ParticleFlags::FADE) && self.max_age > 0 {
            let ratio = (self.age as f32 / self.max_age as f32).min(1.0);
            let faded = self.birth_intensity as f32 * (1.0 - ratio);
            self.intensity = self.intensity.min(faded as u8);
        }
    }

    pub fn speed(&self) -> f32 {
        libm::sqrtf(self.vx * self.vx + self.vy * self.vy)
    }

    /// Rescale velocity so its magnitude is at most `max_speed`.
    /// Non-finite components zero the velocity.
    pub fn clamp_velocity(&mut self, max_speed: f32) {
        if !self.vx.is_finite() || !self.vy.is_finite() {
            self.vx = 0.0;
            self.vy = 0.0;
            return;
        }
        let speed = self.speed();
        if speed > max_speed && speed > 0.0 {
            let scale = max_speed / speed;
            self.vx *= scale;
            self.vy *= scale;
        }
    }

    pub fn integrate(&mut self, dt: f32) {
        self.x += self.vx * dt;
        self.y += self.vy * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liveness_follows_intensity_and_age() {
        let mut p = Particle::new(0.0, 0.0, 0.0, 0.0, 10).with_lifetime(100);
        assert!(p.is_alive());
        p.age = 100;
        assert!(!p.is_alive());
        p.max_age = 0;
        assert!(p.is_alive());
        p.intensity = 0;
        assert!(!p.is_alive());
    }

    #[test]
    fn age_saturates_instead_of_wrapping() {
        let mut p = Particle::new(0.0, 0.0, 0.0, 0.0, 10);
        p.age = 65_000;
        p.age_by(3_600.0);
        assert_eq!(p.age, u16::MAX);
        p.age_by(f32::INFINITY);
        assert_eq!(p.age, u16::MAX);
    }

    #[test]
    fn fade_is_linear_from_birth_intensity() {
        let mut p = Particle::new(0.0, 0.0, 0.0, 0.0, 200)
            .with_lifetime(1000)
            .with_flags(ParticleFlags::FADE);
        p.age_by(0.5);
        assert_eq!(p.age, 500);
        assert_eq!(p.intensity, 100);
        p.age_by(0.25);
        assert_eq!(p.intensity, 50);
        p.age_by(0.25);
        assert!(!p.is_alive());
    }

    #[test]
    fn velocity_clamp_keeps_direction() {
        let mut p = Particle::new(0.0, 0.0, 30.0, 40.0, 1);
        p.clamp_velocity(10.0);
        assert!(libm::fabsf(p.speed() - 10.0) < 1e-4);
        assert!(libm::fabsf(p.vx - 6.0) < 1e-4);
        assert!(libm::fabsf(p.vy - 8.0) < 1e-4);

        p.vx = f32::NAN;
        p.clamp_velocity(10.0);
        assert_eq!((p.vx, p.vy), (0.0, 0.0));
    }

    #[test]
    fn flags_combine_and_clear() {
        let mut f = ParticleFlags::GRAVITY | ParticleFlags::WIND;
        assert!(f.contains(ParticleFlags::GRAVITY));
        assert!(!f.contains(ParticleFlags::FADE));
        f.remove(ParticleFlags::GRAVITY);
        assert_eq!(f, ParticleFlags::WIND);
        f |= ParticleFlags::BRANCH;
        assert_eq!(f.bits(), 0x48);
    }
}
