//! lightning - Stationary bolt chains that flash, branch once and fade fast

use core::f32::consts::TAU;

use heapless::Vec;

use crate::generator::{
    Blend, FrameView, GeneratorKind, ParticleBehavior, ParticleGenerator, ParticleSystem,
};
use crate::palette::{self, gradient};
use crate::particle::{Particle, ParticleFlags};
use crate::pool::Fate;
use crate::rng::Rng;
use crate::target::Rgb;

pub const LIGHTNING_CAPACITY: usize = 48;
/// Longest bolt, in segments (a bolt has one more particle than segments).
pub const MAX_BOLT_SEGMENTS: usize = 12;
pub const MAX_PENDING_BRANCHES: usize = 8;
/// A bolt particle may only branch while its age is inside this window.
const BRANCH_MIN_AGE_MS: u16 = 66;
const BRANCH_MAX_AGE_MS: u16 = 266;
const BEAT_BOLTS: f32 = 4.0;
const BOLT_JITTER: f32 = 0.3;
const BRANCH_JITTER: f32 = 0.2;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LightningParams {
    pub base_spawn_chance: f32,
    pub audio_spawn_boost: f32,
    pub max_particles: u8,
    pub lifespan_ms: u16,
    pub intensity_min: u8,
    pub intensity_max: u8,
    /// Intensity lost per second on top of aging.
    pub fade_per_second: f32,
    /// Chance per frame that a young bolt particle branches.
    pub branch_chance: f32,
    pub branch_count: u8,
    /// Percent dimmer than the parent.
    pub branch_intensity_loss: u8,
    pub music_spawn_pulse: f32,
    pub transient_min: f32,
}

impl Default for LightningParams {
    fn default() -> Self {
        Self {
            base_spawn_chance: 0.15,
            audio_spawn_boost: 0.8,
            max_particles: 40,
            lifespan_ms: 330,
            intensity_min: 220,
            intensity_max: 255,
            fade_per_second: 900.0,
            branch_chance: 0.35,
            branch_count: 2,
            branch_intensity_loss: 25,
            music_spawn_pulse: 0.7,
            transient_min: 0.35,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct BranchSeed {
    x: f32,
    y: f32,
    intensity: u8,
}

/// Bolt spawning and branching for [`Lightning`].
pub struct Bolts {
    params: LightningParams,
    rng: Rng,
    branches: Vec<BranchSeed, MAX_PENDING_BRANCHES>,
}

impl Bolts {
    pub fn new(params: LightningParams, seed: u32) -> Self {
        Self {
            params,
            rng: Rng::new(seed),
            branches: Vec::new(),
        }
    }

    fn limit<const N: usize>(&self) -> usize {
        (self.params.max_particles as usize).min(N)
    }

    /// A bolt between two random points of the grid.
    pub fn spawn_bolt<const N: usize>(&self, system: &mut ParticleSystem<N>) {
        let (w, h) = (system.width() as f32, system.height() as f32);
        let from = (system.rng.range_f32(0.0, w), system.rng.range_f32(0.0, h));
        let to = (system.rng.range_f32(0.0, w), system.rng.range_f32(0.0, h));

        let pulse = system.audio().phase_to_pulse();
        let intensity = system
            .rng
            .range_u8(self.params.intensity_min, self.params.intensity_max);
        let intensity = (intensity as f32 * (0.6 + 0.4 * pulse)) as u8;
        self.spawn_bolt_between(system, from, to, intensity);
    }

    /// Lay a jittered chain of stationary particles along the line.
    /// Bolts shorter than one LED are skipped.
    pub fn spawn_bolt_between<const N: usize>(
        &self,
        system: &mut ParticleSystem<N>,
        from: (f32, f32),
        to: (f32, f32),
        intensity: u8,
    ) {
        let dx = (to.0 as i32 - from.0 as i32).unsigned_abs() as usize;
        let dy = (to.1 as i32 - from.1 as i32).unsigned_abs() as usize;
        let steps = dx.max(dy).min(MAX_BOLT_SEGMENTS);
        if steps == 0 {
            return;
        }

        let x_step = (to.0 - from.0) / steps as f32;
        let y_step = (to.1 - from.1) / steps as f32;
        let max_x = (system.width() as f32 - 0.01).max(0.0);
        let max_y = (system.height() as f32 - 0.01).max(0.0);
        let limit = self.limit::<N>();

        for step in 0..=steps {
            if system.active_count() >= limit {
                break;
            }
            let jx = system.rng.range_f32(-BOLT_JITTER, BOLT_JITTER);
            let jy = system.rng.range_f32(-BOLT_JITTER, BOLT_JITTER);
            let x = (from.0 + x_step * step as f32 + jx).clamp(0.0, max_x);
            let y = (from.1 + y_step * step as f32 + jy).clamp(0.0, max_y);
            system.spawn(
                Particle::new(x, y, 0.0, 0.0, intensity)
                    .with_lifetime(self.params.lifespan_ms)
                    .with_flags(ParticleFlags::BRANCH),
            );
        }
    }

    /// Short side chains from a bolt particle. All or nothing: skipped when
    /// the pool cannot hold every branch.
    fn spawn_branch<const N: usize>(&mut self, system: &mut ParticleSystem<N>, seed: BranchSeed) {
        let p = self.params;
        let length = 3 + self.rng.below(3) as usize;
        let needed = length * p.branch_count as usize;
        let available = self.limit::<N>().saturating_sub(system.active_count());
        if needed > available {
            return;
        }

        let keep = 100u16.saturating_sub(p.branch_intensity_loss as u16);
        let intensity = (seed.intensity as u16 * keep / 100) as u8;
        for _ in 0..p.branch_count {
            let angle = self.rng.range_f32(0.0, TAU);
            let end_x = seed.x + libm::cosf(angle) * length as f32;
            let end_y = seed.y + libm::sinf(angle) * length as f32;
            for step in 0..length {
                let t = step as f32 / length as f32;
                let x = seed.x + (end_x - seed.x) * t
                    + self.rng.range_f32(-BRANCH_JITTER, BRANCH_JITTER);
                let y = seed.y + (end_y - seed.y) * t
                    + self.rng.range_f32(-BRANCH_JITTER, BRANCH_JITTER);
                // children never branch again
                system.spawn(
                    Particle::new(x, y, 0.0, 0.0, intensity).with_lifetime(p.lifespan_ms / 2),
                );
            }
        }
    }
}

impl Default for Bolts {
    fn default() -> Self {
        Self::new(LightningParams::default(), 0xb017_5eed)
    }
}

impl<const N: usize> ParticleBehavior<N> for Bolts {
    const KIND: GeneratorKind = GeneratorKind::Lightning;

    fn configure(&mut self, system: &mut ParticleSystem<N>) {
        // bolts hang still
        system.gravity = 0.0;
        system.drag = 1.0;
        system.physics.forces.set_wind(0.0, 0.0);
    }

    fn spawn_particles(&mut self, system: &mut ParticleSystem<N>, _dt: f32) {
        let p = self.params;
        let audio = system.audio();
        let pulse = audio.phase_to_pulse();
        let mut count: u32 = 0;

        if system.beat_happened() {
            count += (BEAT_BOLTS * (0.5 + 0.5 * audio.energy)) as u32;
        }
        if audio.transient > p.transient_min && p.transient_min < 1.0 {
            let strength = (audio.transient - p.transient_min) / (1.0 - p.transient_min);
            if strength > 0.5 {
                count += 1;
            }
        }

        // tension builds between beats and releases on them
        let pump = (1.0 - p.music_spawn_pulse) + p.music_spawn_pulse * pulse;
        let chance = p.base_spawn_chance * pump + p.audio_spawn_boost * audio.transient * pulse;
        if system.rng.chance(chance) {
            count += 1;
        }

        let limit = self.limit::<N>();
        for _ in 0..count {
            if system.active_count() >= limit {
                break;
            }
            self.spawn_bolt(system);
        }
    }

    fn update_particle(&mut self, _view: &FrameView, p: &mut Particle, dt: f32) -> Fate {
        if p.has_flag(ParticleFlags::BRANCH)
            && p.age > BRANCH_MIN_AGE_MS
            && p.age < BRANCH_MAX_AGE_MS
            && !self.branches.is_full()
            && self.rng.chance(self.params.branch_chance)
        {
            let _ = self.branches.push(BranchSeed {
                x: p.x,
                y: p.y,
                intensity: p.intensity,
            });
            p.flags.remove(ParticleFlags::BRANCH);
        }

        let loss = libm::roundf(self.params.fade_per_second * dt).clamp(0.0, 255.0) as u8;
        p.intensity = p.intensity.saturating_sub(loss);
        Fate::Live
    }

    fn after_update(&mut self, system: &mut ParticleSystem<N>) {
        let branches = core::mem::take(&mut self.branches);
        for seed in branches {
            self.spawn_branch(system, seed);
        }
    }

    fn particle_color(&self, intensity: u8) -> Rgb {
        gradient(&palette::LIGHTNING, intensity)
    }

    fn blend(&self) -> Blend {
        Blend::Max
    }

    fn reset(&mut self) {
        self.branches.clear();
    }
}

/// Lightning: bright bolts across the grid, strongest on the beat.
pub type Lightning = ParticleGenerator<Bolts, LIGHTNING_CAPACITY>;

impl ParticleGenerator<Bolts, LIGHTNING_CAPACITY> {
    pub fn new(seed: u32) -> Self {
        Self::with_behavior(
            Bolts::new(LightningParams::default(), seed.rotate_left(16) ^ 0x9e37_79b9),
            seed,
        )
    }

    pub fn params(&self) -> &LightningParams {
        &self.behavior().params
    }

    pub fn params_mut(&mut self) -> &mut LightningParams {
        &mut self.behavior_mut().params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioControl;
    use crate::config::DeviceConfig;
    use crate::generator::Generator;
    use crate::target::PixelBuffer;

    const CALM: AudioControl = AudioControl::new(0.0, 0.0, 0.5);

    fn quiet_lightning() -> Lightning {
        let mut bolt = Lightning::new(6);
        bolt.params_mut().base_spawn_chance = 0.0;
        bolt.begin(&DeviceConfig::bucket_totem(), 0).unwrap();
        bolt
    }

    #[test]
    fn bolt_is_a_short_stationary_chain() {
        let mut gen = quiet_lightning();
        let (system, bolts) = gen.split_mut();
        bolts.spawn_bolt_between(system, (0.0, 0.0), (15.0, 7.0), 250);

        let pool = &gen.system().pool;
        assert_eq!(pool.iter().count(), MAX_BOLT_SEGMENTS + 1);
        assert!(pool.iter().all(|p| p.vx == 0.0 && p.vy == 0.0));
        assert!(pool.iter().all(|p| p.has_flag(ParticleFlags::BRANCH)));
        assert!(pool.iter().all(|p| p.x >= 0.0 && p.x < 16.0 && p.y >= 0.0 && p.y < 8.0));
    }

    #[test]
    fn degenerate_bolt_spawns_nothing() {
        let mut gen = quiet_lightning();
        let (system, bolts) = gen.split_mut();
        bolts.spawn_bolt_between(system, (3.2, 4.1), (3.9, 4.8), 250);
        assert_eq!(gen.active_count(), 0);
    }

    #[test]
    fn bolts_are_gone_within_half_a_second() {
        let mut gen = quiet_lightning();
        {
            let (system, bolts) = gen.split_mut();
            bolts.spawn_bolt_between(system, (0.0, 0.0), (15.0, 7.0), 250);
        }
        let mut buf: PixelBuffer<128> = PixelBuffer::new(16, 8).unwrap();
        for frame in 1..=15 {
            gen.generate(&mut buf, CALM, frame * 33);
        }
        assert_eq!(gen.active_count(), 0);
        assert!(buf.pixels().iter().all(|c| *c == Rgb::BLACK));
    }

    #[test]
    fn a_particle_branches_only_once() {
        let mut bolts = Bolts::default();
        bolts.params.branch_chance = 1.0;
        let view = FrameView {
            width: 16,
            height: 8,
            layout: crate::config::LayoutKind::Matrix,
            audio: CALM,
        };
        let mut p = Particle::new(5.0, 5.0, 0.0, 0.0, 255).with_flags(ParticleFlags::BRANCH);
        p.age = 100;

        for _ in 0..3 {
            <Bolts as ParticleBehavior<LIGHTNING_CAPACITY>>::update_particle(
                &mut bolts, &view, &mut p, 0.0,
            );
        }
        assert_eq!(bolts.branches.len(), 1);
        assert!(!p.has_flag(ParticleFlags::BRANCH));
    }

    #[test]
    fn too_young_to_branch() {
        let mut bolts = Bolts::default();
        bolts.params.branch_chance = 1.0;
        let view = FrameView {
            width: 16,
            height: 8,
            layout: crate::config::LayoutKind::Matrix,
            audio: CALM,
        };
        let mut p = Particle::new(5.0, 5.0, 0.0, 0.0, 255).with_flags(ParticleFlags::BRANCH);
        <Bolts as ParticleBehavior<LIGHTNING_CAPACITY>>::update_particle(
            &mut bolts, &view, &mut p, 1.0 / 30.0,
        );
        assert!(bolts.branches.is_empty());
        assert_eq!(p.intensity, 225);
    }

    #[test]
    fn branch_needs_room_for_every_arm() {
        let mut gen = quiet_lightning();
        gen.params_mut().max_particles = 4;
        let (system, bolts) = gen.split_mut();
        let seed = BranchSeed {
            x: 8.0,
            y: 4.0,
            intensity: 200,
        };
        bolts.spawn_branch(system, seed);
        assert_eq!(gen.active_count(), 0);

        gen.params_mut().max_particles = 40;
        let (system, bolts) = gen.split_mut();
        bolts.spawn_branch(system, seed);
        let pool = &gen.system().pool;
        let count = pool.iter().count();
        assert!((6..=10).contains(&count));
        assert!(pool.iter().all(|p| p.intensity == 150 && !p.has_flag(ParticleFlags::BRANCH)));
    }
}
