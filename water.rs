//! water - Falling drops that splash on impact
//!
//! A drop that reaches the floor dies and leaves an impact behind. Impacts are
//! queued during the update pass and turned into splash particles once it is
//! over; the impact point then pushes its splash outward for a short while.

use core::f32::consts::TAU;

use heapless::Vec;

use crate::force::{Force, Radial};
use crate::generator::{
    Blend, FrameView, GeneratorKind, ParticleBehavior, ParticleGenerator, ParticleSystem,
};
use crate::layout::is_primary_axis_vertical;
use crate::particle::{Particle, ParticleFlags};
use crate::pool::Fate;
use crate::target::Rgb;

pub const WATER_CAPACITY: usize = 32;
/// Impacts remembered between the update pass and the splash spawn.
pub const MAX_PENDING_SPLASHES: usize = 8;
/// Impact points pushing splash particles at the same time.
pub const MAX_BLASTS: usize = 4;
const BEAT_WAVE_DROPS: f32 = 8.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WaterParams {
    pub base_spawn_chance: f32,
    pub audio_spawn_boost: f32,
    pub max_particles: u8,
    pub lifespan_ms: u16,
    pub intensity_min: u8,
    pub intensity_max: u8,
    /// Positive pulls down.
    pub gravity: f32,
    pub wind_base: f32,
    pub wind_variation: f32,
    pub drag: f32,
    pub drop_velocity_min: f32,
    pub drop_velocity_max: f32,
    pub drop_spread: f32,
    pub splash_particles: u8,
    pub splash_velocity_min: f32,
    pub splash_velocity_max: f32,
    /// Splash brightness as a fraction of the drop's, out of 255.
    pub splash_intensity: u8,
    pub splash_lifespan_ms: u16,
    /// Outward acceleration from the impact point, LEDs/s².
    pub splash_push: f32,
    /// How long an impact keeps pushing.
    pub splash_push_ms: u16,
    pub music_spawn_pulse: f32,
    pub transient_min: f32,
}

impl Default for WaterParams {
    fn default() -> Self {
        Self {
            base_spawn_chance: 0.8,
            audio_spawn_boost: 0.3,
            max_particles: 30,
            lifespan_ms: 2000,
            intensity_min: 180,
            intensity_max: 255,
            gravity: 25.0,
            wind_base: 0.0,
            wind_variation: 3.0,
            drag: 0.995,
            drop_velocity_min: 6.0,
            drop_velocity_max: 10.0,
            drop_spread: 1.5,
            splash_particles: 3,
            splash_velocity_min: 4.0,
            splash_velocity_max: 8.0,
            splash_intensity: 150,
            splash_lifespan_ms: 300,
            splash_push: 20.0,
            splash_push_ms: 200,
            music_spawn_pulse: 0.4,
            transient_min: 0.5,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Impact {
    x: f32,
    y: f32,
    intensity: u8,
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Blast {
    force: Radial,
    until_ms: u32,
}

/// Drop spawning and splash handling for [`Water`].
pub struct Drops {
    params: WaterParams,
    impacts: Vec<Impact, MAX_PENDING_SPLASHES>,
    blasts: Vec<Blast, MAX_BLASTS>,
}

impl Drops {
    pub fn new(params: WaterParams) -> Self {
        Self {
            params,
            impacts: Vec::new(),
            blasts: Vec::new(),
        }
    }

    /// Impact points currently pushing splash particles.
    pub fn active_blasts(&self) -> usize {
        self.blasts.len()
    }

    fn spawn_splash<const N: usize>(&mut self, system: &mut ParticleSystem<N>, impact: Impact) {
        let p = &self.params;
        let limit = (p.max_particles as usize).min(N);
        let available = limit.saturating_sub(system.active_count());
        let count = (p.splash_particles as usize).min(available);
        if count == 0 {
            return;
        }

        let intensity = (impact.intensity as u32 * p.splash_intensity as u32 / 255) as u8;
        for i in 0..count {
            let angle = i as f32 * TAU / count as f32 + system.rng.next_f32();
            let speed = system
                .rng
                .range_f32(p.splash_velocity_min, p.splash_velocity_max);
            let vx = libm::cosf(angle) * speed;
            // slight upward kick, none on a single-row string
            let vy = if system.height() <= 1 {
                0.0
            } else {
                libm::sinf(angle) * speed - 1.0
            };
            system.spawn(
                Particle::new(impact.x, impact.y, vx, vy, intensity)
                    .with_lifetime(p.splash_lifespan_ms)
                    .with_mass(0.5)
                    .with_flags(
                        ParticleFlags::GRAVITY
                            | ParticleFlags::FADE
                            | ParticleFlags::RADIAL,
                    ),
            );
        }

        if self.blasts.is_full() {
            self.blasts.remove(0);
        }
        let _ = self.blasts.push(Blast {
            force: Radial::new(impact.x, impact.y, p.splash_push),
            until_ms: system.elapsed_ms().saturating_add(p.splash_push_ms as u32),
        });
    }
}

impl Default for Drops {
    fn default() -> Self {
        Self::new(WaterParams::default())
    }
}

impl<const N: usize> ParticleBehavior<N> for Drops {
    const KIND: GeneratorKind = GeneratorKind::Water;

    fn configure(&mut self, system: &mut ParticleSystem<N>) {
        system.gravity = self.params.gravity;
        system.drag = self.params.drag;
        system
            .physics
            .forces
            .set_wind(self.params.wind_base, self.params.wind_variation);
    }

    fn prepare_frame(&mut self, system: &mut ParticleSystem<N>) {
        let now = system.elapsed_ms();
        self.blasts.retain(|b| b.until_ms > now);
    }

    fn spawn_particles(&mut self, system: &mut ParticleSystem<N>, _dt: f32) {
        let p = self.params;
        let audio = system.audio();
        let pulse = audio.phase_to_pulse();
        let mut count: u32 = 0;

        if system.beat_happened() {
            count += (BEAT_WAVE_DROPS * (0.5 + 0.5 * audio.energy)) as u32;
        }
        if audio.transient > p.transient_min && p.transient_min < 1.0 {
            let strength = (audio.transient - p.transient_min) / (1.0 - p.transient_min);
            count += (2.0 * strength) as u32;
        }

        let wave = (1.0 - p.music_spawn_pulse) + p.music_spawn_pulse * pulse;
        let chance = p.base_spawn_chance * wave + p.audio_spawn_boost * audio.transient * pulse;
        if system.rng.chance(chance) {
            count += 1;
        }

        let limit = (p.max_particles as usize).min(N);
        let vertical = is_primary_axis_vertical(system.layout());
        let velocity_mult = 1.0 + 0.2 * audio.transient;
        for _ in 0..count {
            if system.active_count() >= limit {
                break;
            }
            let (x, y) = system.spawn_position();
            let speed = system
                .rng
                .range_f32(p.drop_velocity_min, p.drop_velocity_max);
            let (mut vx, vy) = system.initial_velocity(speed);
            let spread = system.rng.range_f32(-1.0, 1.0) * p.drop_spread;
            // a string has no cross axis; jitter along it
            vx += if vertical { spread } else { spread * 0.3 };
            let intensity = system.rng.range_u8(p.intensity_min, p.intensity_max);
            system.spawn(
                Particle::new(x, y, vx * velocity_mult, vy * velocity_mult, intensity)
                    .with_lifetime(p.lifespan_ms)
                    .with_flags(
                        ParticleFlags::GRAVITY
                            | ParticleFlags::WIND
                            | ParticleFlags::FADE
                            | ParticleFlags::SPLASH,
                    ),
            );
        }
    }

    fn update_particle(&mut self, view: &FrameView, p: &mut Particle, dt: f32) -> Fate {
        if p.has_flag(ParticleFlags::RADIAL) {
            for blast in self.blasts.iter() {
                blast.force.apply(p, dt);
            }
        }

        if p.has_flag(ParticleFlags::SPLASH) {
            let landed = if is_primary_axis_vertical(view.layout) {
                p.y >= view.height as f32 - 1.0
            } else {
                p.x < 0.5 || p.x >= view.width as f32 - 0.5
            };
            if landed {
                // a full queue just loses the splash
                let _ = self.impacts.push(Impact {
                    x: p.x,
                    y: p.y,
                    intensity: p.intensity,
                });
                return Fate::Kill;
            }
        }
        Fate::Live
    }

    fn after_update(&mut self, system: &mut ParticleSystem<N>) {
        let impacts = core::mem::take(&mut self.impacts);
        for impact in impacts {
            self.spawn_splash(system, impact);
        }
    }

    fn particle_color(&self, intensity: u8) -> Rgb {
        Rgb::new(
            intensity,
            (intensity as u16 * 3 / 4) as u8,
            intensity.saturating_add(40),
        )
    }

    fn blend(&self) -> Blend {
        Blend::Max
    }

    fn reset(&mut self) {
        self.impacts.clear();
        self.blasts.clear();
    }
}

/// Rain: drops fall from the top edge and splash on the floor.
pub type Water = ParticleGenerator<Drops, WATER_CAPACITY>;

impl ParticleGenerator<Drops, WATER_CAPACITY> {
    pub fn new(seed: u32) -> Self {
        Self::with_behavior(Drops::default(), seed)
    }

    pub fn params(&self) -> &WaterParams {
        &self.behavior().params
    }

    /// Physics fields take effect after [`ParticleGenerator::sync_physics`].
    pub fn params_mut(&mut self) -> &mut WaterParams {
        &mut self.behavior_mut().params
    }
}
