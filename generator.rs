//! generator - The shared generator contract and the particle lifecycle driver
//!
//! Every pattern source implements [`Generator`]. Particle-based patterns are
//! built from a [`ParticleSystem`] (pool, physics strategies, timing) and a
//! [`ParticleBehavior`] that supplies the pattern-specific decisions; the two
//! are glued together by [`ParticleGenerator`], which runs the fixed per-frame
//! sequence:
//!
//! 1. time step from the clock, clamped
//! 2. time-varying forces advance
//! 3. behavior spawns
//! 4. per particle: behavior hook, gravity/wind/drag, speed clamp,
//!    integration, aging, boundary
//! 5. render
//! 6. remember the beat phase for edge detection

use crate::audio::{AudioControl, BEAT_PHASE_MAX, BEAT_PHASE_MIN};
use crate::config::{DeviceConfig, LayoutKind, Orientation};
use crate::error::ConfigError;
use crate::layout::PhysicsContext;
use crate::particle::Particle;
use crate::pool::{Fate, ParticleHandle, ParticlePool};
use crate::rng::Rng;
use crate::target::{RenderTarget, Rgb};

/// Fastest a particle may move, in LEDs per second. Keeps a single step
/// from carrying a particle clean across a boundary.
pub const MAX_PARTICLE_SPEED: f32 = 50.0;
/// Longest time step the driver will simulate, in seconds. A stalled clock
/// turns into slow motion rather than a jump.
pub const MAX_FRAME_DT: f32 = 0.25;

/// Which pattern a generator produces.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GeneratorKind {
    Fire,
    Water,
    Lightning,
    /// Cellular-automaton fire on a heat grid.
    HeatFire,
}

impl GeneratorKind {
    pub const ALL: [GeneratorKind; 4] = [
        GeneratorKind::Fire,
        GeneratorKind::Water,
        GeneratorKind::Lightning,
        GeneratorKind::HeatFire,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            GeneratorKind::Fire => "Fire",
            GeneratorKind::Water => "Water",
            GeneratorKind::Lightning => "Lightning",
            GeneratorKind::HeatFire => "Heat Fire",
        }
    }

    /// The following kind, wrapping around.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

/// The contract the render pipeline drives.
///
/// Lifecycle: `begin` (Ok = ready) → any number of `generate` calls →
/// `reset` (back to uninitialized; `begin` again before generating).
/// `generate` on an uninitialized generator does nothing.
pub trait Generator {
    fn begin(&mut self, config: &DeviceConfig, now_ms: u32) -> Result<(), ConfigError>;
    fn generate<T: RenderTarget>(&mut self, target: &mut T, audio: AudioControl, now_ms: u32);
    fn reset(&mut self);
    fn name(&self) -> &'static str;
    fn is_ready(&self) -> bool;
}

/// Clamp a time step to [0, MAX_FRAME_DT]; garbage becomes 0.
pub fn sanitize_dt(dt: f32) -> f32 {
    if dt.is_finite() {
        dt.clamp(0.0, MAX_FRAME_DT)
    } else {
        0.0
    }
}

/// How a particle's color combines with what is already on the pixel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Blend {
    Replace,
    /// Overlapping particles glow hotter.
    Additive,
    /// The brightest particle wins.
    Max,
}

impl Blend {
    pub fn mix(self, under: Rgb, over: Rgb) -> Rgb {
        match self {
            Blend::Replace => over,
            Blend::Additive => under.saturating_add(over),
            Blend::Max => under.max(over),
        }
    }
}

/// Read-only frame facts handed to per-particle hooks.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameView {
    pub width: u16,
    pub height: u16,
    pub layout: LayoutKind,
    pub audio: AudioControl,
}

/// Pool, physics strategies and timing state for one particle generator.
pub struct ParticleSystem<const N: usize> {
    pub pool: ParticlePool<N>,
    pub physics: PhysicsContext,
    /// Gravity magnitude handed to the force adapter (negative = up).
    pub gravity: f32,
    /// Drag coefficient, fraction of speed kept per 1/30 s.
    pub drag: f32,
    pub rng: Rng,
    width: u16,
    height: u16,
    layout: LayoutKind,
    orientation: Orientation,
    audio: AudioControl,
    prev_phase: f32,
    start_ms: u32,
    last_ms: u32,
    ready: bool,
}

impl<const N: usize> ParticleSystem<N> {
    pub fn new(seed: u32) -> Self {
        Self {
            pool: ParticlePool::new(),
            physics: PhysicsContext::for_layout(LayoutKind::Matrix, GeneratorKind::Fire, 0, 0),
            gravity: 0.0,
            drag: 1.0,
            rng: Rng::new(seed),
            width: 0,
            height: 0,
            layout: LayoutKind::Matrix,
            orientation: Orientation::Horizontal,
            audio: AudioControl::SILENT,
            prev_phase: 1.0,
            start_ms: 0,
            last_ms: 0,
            ready: false,
        }
    }

    /// Capture the matrix shape, clear the pool and pick layout strategies.
    pub fn begin(
        &mut self,
        config: &DeviceConfig,
        kind: GeneratorKind,
        now_ms: u32,
    ) -> Result<(), ConfigError> {
        // a rejected config leaves the system uninitialized, even if it was running
        self.ready = false;
        config.validate()?;
        let matrix = config.matrix;
        self.width = matrix.width;
        self.height = matrix.height;
        self.layout = matrix.layout;
        self.orientation = matrix.orientation;
        self.pool.reset();
        self.physics = PhysicsContext::for_layout(matrix.layout, kind, matrix.width, matrix.height);
        self.audio = AudioControl::SILENT;
        self.prev_phase = 1.0;
        self.start_ms = now_ms;
        self.last_ms = now_ms;
        self.ready = true;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.pool.reset();
        self.audio = AudioControl::SILENT;
        self.prev_phase = 1.0;
        self.ready = false;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn layout(&self) -> LayoutKind {
        self.layout
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// This frame's audio snapshot.
    pub fn audio(&self) -> AudioControl {
        self.audio
    }

    pub fn set_audio(&mut self, audio: AudioControl) {
        self.audio = audio;
    }

    /// Milliseconds since `begin`, as of the last frame.
    pub fn elapsed_ms(&self) -> u32 {
        self.last_ms.wrapping_sub(self.start_ms)
    }

    /// Seconds since the previous frame. The wrapping subtraction survives
    /// the millisecond counter rolling over.
    pub fn frame_dt(&mut self, now_ms: u32) -> f32 {
        let delta = now_ms.wrapping_sub(self.last_ms);
        self.last_ms = now_ms;
        sanitize_dt(delta as f32 / 1000.0)
    }

    /// The beat phase wrapped from late in the cycle to early in it.
    pub fn beat_happened(&self) -> bool {
        self.prev_phase > BEAT_PHASE_MAX && self.audio.phase < BEAT_PHASE_MIN
    }

    pub fn view(&self) -> FrameView {
        FrameView {
            width: self.width,
            height: self.height,
            layout: self.layout,
            audio: self.audio,
        }
    }

    pub fn spawn_position(&mut self) -> (f32, f32) {
        self.physics.spawn.spawn_position(&mut self.rng)
    }

    pub fn initial_velocity(&mut self, speed: f32) -> (f32, f32) {
        self.physics.spawn.initial_velocity(speed, &mut self.rng)
    }

    pub fn spawn(&mut self, particle: Particle) -> Option<ParticleHandle> {
        self.pool.spawn(particle)
    }

    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Advance wind phase and other time-varying force state.
    pub fn advance_forces(&mut self, dt: f32) {
        self.physics.forces.update(sanitize_dt(dt));
    }

    /// One physics step for every alive particle.
    ///
    /// `hook` runs first and may kill the particle outright; survivors get
    /// gravity, wind and drag, a speed clamp, integration, aging and finally
    /// the boundary check.
    pub fn update_particles<F>(&mut self, dt: f32, mut hook: F)
    where
        F: FnMut(&mut Particle, f32) -> Fate,
    {
        let dt = sanitize_dt(dt);
        let forces = &self.physics.forces;
        let boundary = self.physics.boundary;
        let (gravity, drag) = (self.gravity, self.drag);
        let (width, height) = (self.width, self.height);

        self.pool.update_all(|p| {
            if hook(p, dt) == Fate::Kill {
                return Fate::Kill;
            }

            forces.apply_gravity(p, dt, gravity);
            forces.apply_wind(p, dt);
            forces.apply_drag(p, dt, drag);

            p.clamp_velocity(MAX_PARTICLE_SPEED);
            p.integrate(dt);
            p.age_by(dt);

            boundary.resolve(p, width, height)
        });
    }

    /// Store this frame's phase for the next frame's beat detection.
    pub fn finish_frame(&mut self) {
        self.prev_phase = self.audio.phase;
    }
}

/// Pattern-specific decisions plugged into the particle lifecycle.
pub trait ParticleBehavior<const N: usize> {
    const KIND: GeneratorKind;

    fn name(&self) -> &'static str {
        Self::KIND.name()
    }

    /// Set gravity, drag and wind on a freshly begun system.
    fn configure(&mut self, system: &mut ParticleSystem<N>);

    /// Runs after forces advance and before spawning.
    fn prepare_frame(&mut self, _system: &mut ParticleSystem<N>) {}

    fn spawn_particles(&mut self, system: &mut ParticleSystem<N>, dt: f32);

    /// Per-particle logic, before forces are applied.
    fn update_particle(&mut self, view: &FrameView, p: &mut Particle, dt: f32) -> Fate;

    /// Runs once the update pass is over; the pool is free to spawn into again.
    fn after_update(&mut self, _system: &mut ParticleSystem<N>) {}

    fn particle_color(&self, intensity: u8) -> Rgb;

    fn blend(&self) -> Blend {
        Blend::Additive
    }

    /// Default footprint: the single LED under the particle.
    fn render_particle<T: RenderTarget>(&self, p: &Particle, target: &mut T) {
        if p.x < 0.0 || p.y < 0.0 {
            return;
        }
        let (x, y) = (p.x as u16, p.y as u16);
        if x >= target.width() || y >= target.height() {
            return;
        }
        let color = self.blend().mix(target.pixel(x, y), self.particle_color(p.intensity));
        target.set_pixel(x, y, color);
    }

    fn reset(&mut self) {}
}

/// A [`ParticleBehavior`] running on a pool of `N` particles.
pub struct ParticleGenerator<B, const N: usize> {
    system: ParticleSystem<N>,
    behavior: B,
}

impl<B: ParticleBehavior<N>, const N: usize> ParticleGenerator<B, N> {
    pub fn with_behavior(behavior: B, seed: u32) -> Self {
        Self {
            system: ParticleSystem::new(seed),
            behavior,
        }
    }

    pub fn system(&self) -> &ParticleSystem<N> {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut ParticleSystem<N> {
        &mut self.system
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    /// Both halves at once, for driving a behavior by hand.
    pub fn split_mut(&mut self) -> (&mut ParticleSystem<N>, &mut B) {
        (&mut self.system, &mut self.behavior)
    }

    pub fn active_count(&self) -> usize {
        self.system.active_count()
    }

    /// Re-apply gravity, drag and wind after live parameter changes.
    pub fn sync_physics(&mut self) {
        if self.system.is_ready() {
            self.behavior.configure(&mut self.system);
        }
    }
}

impl<B: ParticleBehavior<N>, const N: usize> Generator for ParticleGenerator<B, N> {
    fn begin(&mut self, config: &DeviceConfig, now_ms: u32) -> Result<(), ConfigError> {
        self.behavior.reset();
        self.system.begin(config, B::KIND, now_ms)?;
        self.behavior.configure(&mut self.system);
        log::debug!(
            "{}: ready on {}x{} {:?} layout, {} particle slots",
            self.behavior.name(),
            config.matrix.width,
            config.matrix.height,
            config.matrix.layout,
            N
        );
        Ok(())
    }

    fn generate<T: RenderTarget>(&mut self, target: &mut T, audio: AudioControl, now_ms: u32) {
        if !self.system.is_ready() {
            return;
        }
        let system = &mut self.system;
        let behavior = &mut self.behavior;

        let dt = system.frame_dt(now_ms);
        system.set_audio(audio.sanitized());
        system.advance_forces(dt);
        behavior.prepare_frame(system);

        behavior.spawn_particles(system, dt);

        let view = system.view();
        system.update_particles(dt, |p, dt| behavior.update_particle(&view, p, dt));
        behavior.after_update(system);

        target.clear();
        let behavior = &self.behavior;
        self.system.pool.for_each(|p| behavior.render_particle(p, target));

        self.system.finish_frame();
    }

    fn reset(&mut self) {
        self.system.reset();
        self.behavior.reset();
        log::debug!("{}: reset", self.behavior.name());
    }

    fn name(&self) -> &'static str {
        self.behavior.name()
    }

    fn is_ready(&self) -> bool {
        self.system.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::particle::ParticleFlags;
    use crate::target::PixelBuffer;

    /// Minimal behavior: one spark per frame from the spawn region.
    struct Trickle {
        frames: u32,
    }

    impl ParticleBehavior<8> for Trickle {
        const KIND: GeneratorKind = GeneratorKind::Fire;

        fn configure(&mut self, system: &mut ParticleSystem<8>) {
            system.gravity = -5.0;
            system.drag = 1.0;
        }

        fn spawn_particles(&mut self, system: &mut ParticleSystem<8>, _dt: f32) {
            let (x, y) = system.spawn_position();
            let (vx, vy) = system.initial_velocity(4.0);
            system.spawn(
                Particle::new(x, y, vx, vy, 255)
                    .with_lifetime(500)
                    .with_flags(ParticleFlags::GRAVITY),
            );
        }

        fn update_particle(&mut self, _view: &FrameView, _p: &mut Particle, _dt: f32) -> Fate {
            Fate::Live
        }

        fn after_update(&mut self, _system: &mut ParticleSystem<8>) {
            self.frames += 1;
        }

        fn particle_color(&self, intensity: u8) -> Rgb {
            Rgb::new(intensity, 0, 0)
        }
    }

    fn trickle() -> ParticleGenerator<Trickle, 8> {
        ParticleGenerator::with_behavior(Trickle { frames: 0 }, 42)
    }

    #[test]
    fn generate_before_begin_does_nothing() {
        let mut gen = trickle();
        let mut buf: PixelBuffer<60> = PixelBuffer::new(4, 15).unwrap();
        gen.generate(&mut buf, AudioControl::SILENT, 100);
        assert_eq!(gen.active_count(), 0);
        assert_eq!(gen.behavior().frames, 0);
    }

    #[test]
    fn lifecycle_runs_and_reset_returns_to_uninitialized() {
        let mut gen = trickle();
        let mut buf: PixelBuffer<60> = PixelBuffer::new(4, 15).unwrap();
        gen.begin(&DeviceConfig::tube_light(), 0).unwrap();
        assert!(gen.is_ready());

        for frame in 1..=5 {
            gen.generate(&mut buf, AudioControl::SILENT, frame * 33);
        }
        assert_eq!(gen.behavior().frames, 5);
        assert!(gen.active_count() > 0);
        assert!(buf.pixels().iter().any(|c| c.r > 0));

        gen.reset();
        assert!(!gen.is_ready());
        assert_eq!(gen.active_count(), 0);
        gen.generate(&mut buf, AudioControl::SILENT, 1_000);
        assert_eq!(gen.behavior().frames, 5);
    }

    #[test]
    fn bad_config_keeps_generator_uninitialized() {
        let mut gen = trickle();
        let mut config = DeviceConfig::tube_light();
        config.matrix.width = 0;
        assert_eq!(gen.begin(&config, 0), Err(ConfigError::EmptyMatrix));
        assert!(!gen.is_ready());
    }

    #[test]
    fn failed_rebegin_stops_a_running_generator() {
        let mut gen = trickle();
        let mut buf: PixelBuffer<60> = PixelBuffer::new(4, 15).unwrap();
        gen.begin(&DeviceConfig::tube_light(), 0).unwrap();
        gen.generate(&mut buf, AudioControl::SILENT, 33);
        assert!(gen.is_ready());

        let mut config = DeviceConfig::tube_light();
        config.matrix.width = 0;
        assert_eq!(gen.begin(&config, 50), Err(ConfigError::EmptyMatrix));
        assert!(!gen.is_ready());

        let frames = gen.behavior().frames;
        gen.generate(&mut buf, AudioControl::SILENT, 66);
        assert_eq!(gen.behavior().frames, frames);
    }

    #[test]
    fn frame_dt_survives_clock_wrap_and_stalls() {
        let mut system: ParticleSystem<1> = ParticleSystem::new(1);
        system.begin(&DeviceConfig::tube_light(), GeneratorKind::Fire, u32::MAX - 10).unwrap();
        let dt = system.frame_dt(22);
        assert!(libm::fabsf(dt - 0.033) < 1e-6);
        assert_eq!(system.frame_dt(60_022), MAX_FRAME_DT);
        assert_eq!(system.frame_dt(60_022), 0.0);
    }

    #[test]
    fn beat_detection_needs_a_high_to_low_wrap() {
        let mut system: ParticleSystem<1> = ParticleSystem::new(1);
        system.begin(&DeviceConfig::tube_light(), GeneratorKind::Fire, 0).unwrap();

        system.set_audio(AudioControl::new(0.0, 0.0, 0.9));
        system.finish_frame();
        system.set_audio(AudioControl::new(0.0, 0.0, 0.05));
        assert!(system.beat_happened());
        system.finish_frame();

        system.set_audio(AudioControl::new(0.0, 0.0, 0.1));
        assert!(!system.beat_happened());
    }

    #[test]
    fn velocity_is_clamped_before_integration() {
        let mut system: ParticleSystem<1> = ParticleSystem::new(1);
        system.begin(&DeviceConfig::bucket_totem(), GeneratorKind::Lightning, 0).unwrap();
        system.spawn(Particle::new(8.0, 4.0, 1.0e6, 0.0, 200));
        system.update_particles(0.01, |_, _| Fate::Live);
        let p = system.pool.iter().next().copied().unwrap();
        assert!(libm::fabsf(p.x - (8.0 + MAX_PARTICLE_SPEED * 0.01)) < 1e-4);
    }

    #[test]
    fn hook_kill_skips_the_rest_of_the_step() {
        let mut system: ParticleSystem<2> = ParticleSystem::new(1);
        system.begin(&DeviceConfig::tube_light(), GeneratorKind::Fire, 0).unwrap();
        system.spawn(Particle::new(1.0, 1.0, 0.0, 0.0, 200));
        system.spawn(Particle::new(2.0, 1.0, 0.0, 0.0, 200));
        system.update_particles(0.03, |p, _| if p.x < 1.5 { Fate::Kill } else { Fate::Live });
        assert_eq!(system.active_count(), 1);
    }

    #[test]
    fn blend_modes() {
        let a = Rgb::new(200, 10, 0);
        let b = Rgb::new(100, 20, 5);
        assert_eq!(Blend::Additive.mix(a, b), Rgb::new(255, 30, 5));
        assert_eq!(Blend::Max.mix(a, b), Rgb::new(200, 20, 5));
        assert_eq!(Blend::Replace.mix(a, b), b);
    }

    #[test]
    fn kinds_cycle() {
        assert_eq!(GeneratorKind::HeatFire.next(), GeneratorKind::Fire);
        assert_eq!(GeneratorKind::Fire.next(), GeneratorKind::Water);
    }
}
