//! fire - Rising sparks with thermal buoyancy
//!
//! Sparks are the only visual primitive. Heat is carried as particle
//! intensity: it sets the color and pushes the spark upward, so a spark slows
//! as it fades.

use crate::generator::{
    FrameView, GeneratorKind, ParticleBehavior, ParticleGenerator, ParticleSystem,
};
use crate::layout::is_primary_axis_vertical;
use crate::palette::{self, gradient};
use crate::particle::{Particle, ParticleFlags};
use crate::pool::Fate;
use crate::target::Rgb;

pub const FIRE_CAPACITY: usize = 64;
/// Transients above this turn every new spark into a burst spark.
const BURST_TRANSIENT: f32 = 0.3;
/// Extra intensity at the top of the beat pulse.
const BEAT_INTENSITY_BOOST: f32 = 35.0;

/// Tunables for [`Fire`]. Velocities are LEDs/s, lifetimes milliseconds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FireParams {
    pub base_spawn_chance: f32,
    pub audio_spawn_boost: f32,
    /// Active particle ceiling, at most the pool capacity.
    pub max_particles: u8,
    pub lifespan_ms: u16,
    pub intensity_min: u8,
    pub intensity_max: u8,
    pub gravity: f32,
    pub wind_base: f32,
    pub wind_variation: f32,
    pub drag: f32,
    pub spark_velocity_min: f32,
    pub spark_velocity_max: f32,
    /// Sideways velocity jitter.
    pub spark_spread: f32,
    /// How deep the spawn rate dips off-beat: 0 flat, 1 silent between beats.
    pub music_spawn_pulse: f32,
    pub transient_min: f32,
    pub burst_sparks: u8,
    /// Share of fast sparks; the rest are embers.
    pub fast_spark_ratio: f32,
    /// Upward acceleration of a full-intensity spark, LEDs/s².
    pub thermal_force: f32,
}

impl Default for FireParams {
    fn default() -> Self {
        Self {
            base_spawn_chance: 0.5,
            audio_spawn_boost: 1.5,
            max_particles: 48,
            lifespan_ms: 1700,
            intensity_min: 150,
            intensity_max: 220,
            gravity: 0.0,
            wind_base: 0.0,
            wind_variation: 25.0,
            drag: 0.985,
            spark_velocity_min: 5.0,
            spark_velocity_max: 10.0,
            spark_spread: 4.0,
            music_spawn_pulse: 0.95,
            transient_min: 0.25,
            burst_sparks: 8,
            fast_spark_ratio: 0.7,
            thermal_force: 30.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SparkType {
    /// Bright, normal speed, normal life.
    Fast,
    /// Dim, slow and long-lived.
    Ember,
    /// Full brightness on a hit.
    Burst,
}

/// Spark spawning and buoyancy for [`Fire`].
pub struct Sparks {
    params: FireParams,
    beats: u32,
}

impl Sparks {
    pub fn new(params: FireParams) -> Self {
        Self { params, beats: 0 }
    }

    /// Beats seen since `begin`.
    pub fn beats(&self) -> u32 {
        self.beats
    }

    fn spawn_typed<const N: usize>(
        &self,
        system: &mut ParticleSystem<N>,
        kind: SparkType,
        x: f32,
        y: f32,
        base_speed: f32,
    ) {
        let p = &self.params;
        let audio = system.audio();
        let pulse = audio.phase_to_pulse();

        let (mut vx, vy) = system.initial_velocity(base_speed);
        let spread = system.rng.range_f32(-1.0, 1.0) * p.spark_spread;
        // a string has no cross axis; jitter along it
        vx += if is_primary_axis_vertical(system.layout()) { spread } else { spread * 0.3 };

        let (intensity, lifespan, speed_mult) = match kind {
            SparkType::Fast => (
                system.rng.range_u8(p.intensity_min, p.intensity_max),
                p.lifespan_ms,
                1.0,
            ),
            SparkType::Ember => {
                let lo = p.intensity_min.min(p.intensity_max).saturating_sub(30);
                let hi = p.intensity_min.max(p.intensity_max).saturating_sub(50).max(lo);
                (
                    system.rng.range_u8(lo, hi).max(1),
                    scale_ms(p.lifespan_ms, 1.5),
                    0.6,
                )
            }
            SparkType::Burst => (p.intensity_max, scale_ms(p.lifespan_ms, 0.8), 1.0),
        };
        let intensity = intensity.saturating_add((pulse * BEAT_INTENSITY_BOOST) as u8);

        // faster on the beat, kicked harder by transients
        let velocity_mult = (0.8 + 0.4 * pulse + 0.3 * audio.transient) * speed_mult;

        system.spawn(
            Particle::new(x, y, vx * velocity_mult, vy * velocity_mult, intensity)
                .with_lifetime(lifespan)
                .with_flags(ParticleFlags::GRAVITY | ParticleFlags::WIND | ParticleFlags::FADE),
        );
    }
}

fn scale_ms(ms: u16, factor: f32) -> u16 {
    (ms as f32 * factor).min(u16::MAX as f32) as u16
}

impl Default for Sparks {
    fn default() -> Self {
        Self::new(FireParams::default())
    }
}

impl<const N: usize> ParticleBehavior<N> for Sparks {
    const KIND: GeneratorKind = GeneratorKind::Fire;

    fn configure(&mut self, system: &mut ParticleSystem<N>) {
        system.gravity = self.params.gravity;
        system.drag = self.params.drag;
        system
            .physics
            .forces
            .set_wind(self.params.wind_base, self.params.wind_variation);
    }

    fn prepare_frame(&mut self, system: &mut ParticleSystem<N>) {
        // wind breathes with the beat and gusts on hits
        let audio = system.audio();
        let breathing = 0.3 + 0.7 * audio.phase_to_pulse();
        let gust = 1.0 + 2.0 * audio.transient;
        system.physics.forces.set_wind(
            self.params.wind_base,
            self.params.wind_variation * breathing * gust,
        );
    }

    fn spawn_particles(&mut self, system: &mut ParticleSystem<N>, _dt: f32) {
        let p = self.params;
        let audio = system.audio();
        let pulse = audio.phase_to_pulse();
        let mut count: u32 = 0;

        if audio.transient > p.transient_min && p.transient_min < 1.0 {
            let strength = (audio.transient - p.transient_min) / (1.0 - p.transient_min);
            count += (p.burst_sparks as f32 * strength) as u32;
        }
        if system.beat_happened() {
            self.beats = self.beats.wrapping_add(1);
            count += p.burst_sparks as u32;
        }

        let pump = (1.0 - p.music_spawn_pulse) + p.music_spawn_pulse * pulse;
        let chance = p.base_spawn_chance * pump + p.audio_spawn_boost * audio.energy;
        if system.rng.chance(chance) {
            count += 1;
        }

        let limit = (p.max_particles as usize).min(N);
        for _ in 0..count {
            if system.active_count() >= limit {
                break;
            }
            let (x, y) = system.spawn_position();
            let speed = system
                .rng
                .range_f32(p.spark_velocity_min, p.spark_velocity_max);
            let kind = if audio.transient > BURST_TRANSIENT {
                SparkType::Burst
            } else if system.rng.chance(p.fast_spark_ratio) {
                SparkType::Fast
            } else {
                SparkType::Ember
            };
            self.spawn_typed(system, kind, x, y, speed);
        }
    }

    fn update_particle(&mut self, view: &FrameView, p: &mut Particle, dt: f32) -> Fate {
        let force = self.params.thermal_force;
        if force > 0.0 {
            let lift = p.intensity as f32 / 255.0 * force / p.mass * dt;
            if is_primary_axis_vertical(view.layout) {
                p.vy -= lift;
            } else {
                p.vx += lift;
            }
        }
        Fate::Live
    }

    fn particle_color(&self, intensity: u8) -> Rgb {
        gradient(&palette::FIRE, intensity)
    }

    fn reset(&mut self) {
        self.beats = 0;
    }
}

/// Particle fire: sparks rise from the bottom edge (or anywhere on a string).
pub type Fire = ParticleGenerator<Sparks, FIRE_CAPACITY>;

impl ParticleGenerator<Sparks, FIRE_CAPACITY> {
    pub fn new(seed: u32) -> Self {
        Self::with_behavior(Sparks::default(), seed)
    }

    pub fn params(&self) -> &FireParams {
        &self.behavior().params
    }

    /// Physics fields take effect after [`ParticleGenerator::sync_physics`].
    pub fn params_mut(&mut self) -> &mut FireParams {
        &mut self.behavior_mut().params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioControl;
    use crate::config::DeviceConfig;
    use crate::generator::Generator;
    use crate::target::{PixelBuffer, RenderTarget};

    fn run(fire: &mut Fire, buf: &mut PixelBuffer<60>, audio: AudioControl, frames: u32) {
        for frame in 1..=frames {
            fire.generate(buf, audio, frame * 33);
        }
    }

    #[test]
    fn sparks_respect_the_particle_ceiling() {
        let mut fire = Fire::new(3);
        fire.params_mut().max_particles = 10;
        fire.begin(&DeviceConfig::tube_light(), 0).unwrap();
        let mut buf: PixelBuffer<60> = PixelBuffer::new(4, 15).unwrap();
        run(&mut fire, &mut buf, AudioControl::new(1.0, 1.0, 0.0), 60);
        assert!(fire.active_count() <= 10);
        assert!(fire.active_count() > 0);
    }

    #[test]
    fn sparks_rise() {
        let mut fire = Fire::new(5);
        fire.params_mut().wind_variation = 0.0;
        fire.begin(&DeviceConfig::tube_light(), 0).unwrap();
        let mut buf: PixelBuffer<60> = PixelBuffer::new(4, 15).unwrap();
        run(&mut fire, &mut buf, AudioControl::new(0.5, 0.0, 0.0), 20);

        let system = fire.system();
        assert!(system.active_count() > 0);
        assert!(system.pool.iter().all(|p| p.vy < 0.0));
        // something glows above the spawn row
        let lit_above = (0..14).any(|y| (0..4).any(|x| buf.pixel(x, y).brightness() > 0));
        assert!(lit_above);
    }

    #[test]
    fn beats_are_counted() {
        let mut fire = Fire::new(8);
        fire.begin(&DeviceConfig::bucket_totem(), 0).unwrap();
        let mut buf: PixelBuffer<128> = PixelBuffer::new(16, 8).unwrap();
        let phases = [0.5, 0.9, 0.1, 0.5, 0.85, 0.05];
        for (i, phase) in phases.iter().enumerate() {
            fire.generate(&mut buf, AudioControl::new(0.2, 0.0, *phase), (i as u32 + 1) * 33);
        }
        assert_eq!(fire.behavior().beats(), 2);
    }

    #[test]
    fn embers_never_spawn_dead() {
        let mut params = FireParams::default();
        params.intensity_min = 10;
        params.intensity_max = 20;
        let sparks = Sparks::new(params);
        let mut system: ParticleSystem<4> = ParticleSystem::new(1);
        system.begin(&DeviceConfig::tube_light(), GeneratorKind::Fire, 0).unwrap();
        sparks.spawn_typed(&mut system, SparkType::Ember, 1.0, 14.0, 5.0);
        assert_eq!(system.active_count(), 1);
    }

    #[test]
    fn rejected_config_stops_a_burning_fire() {
        let mut fire = Fire::new(4);
        fire.begin(&DeviceConfig::tube_light(), 0).unwrap();
        let mut buf: PixelBuffer<60> = PixelBuffer::new(4, 15).unwrap();
        run(&mut fire, &mut buf, AudioControl::new(0.8, 0.5, 0.0), 5);
        assert!(fire.is_ready());

        let mut config = DeviceConfig::tube_light();
        config.matrix.width = 0;
        assert!(fire.begin(&config, 200).is_err());
        assert!(!fire.is_ready());
    }

    #[test]
    fn sync_physics_pushes_new_drag() {
        let mut fire = Fire::new(2);
        fire.begin(&DeviceConfig::tube_light(), 0).unwrap();
        fire.params_mut().drag = 0.5;
        fire.params_mut().gravity = -3.0;
        assert_eq!(fire.system().drag, 0.985);
        fire.sync_physics();
        assert_eq!(fire.system().drag, 0.5);
        assert_eq!(fire.system().gravity, -3.0);
    }

    #[test]
    fn palette_is_additive_fire() {
        let sparks = Sparks::default();
        let color = <Sparks as ParticleBehavior<FIRE_CAPACITY>>::particle_color(&sparks, 255);
        assert_eq!(color, Rgb::new(255, 255, 64));
    }
}
