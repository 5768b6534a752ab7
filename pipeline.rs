//! pipeline - Owns the active generator and feeds it audio and time
//!
//! Exactly one generator is alive at a time. Switching builds the new one in
//! place and begins it; if that fails the pipeline drops into safe mode and
//! renders nothing until a working generator is selected.

use core::fmt::Write;

use heapless::String;

use crate::audio::AudioControl;
use crate::config::DeviceConfig;
use crate::error::ConfigError;
use crate::fire::Fire;
use crate::generator::{Generator, GeneratorKind};
use crate::heat::HeatFire;
use crate::lightning::Lightning;
use crate::target::RenderTarget;
use crate::water::Water;

/// One frame at roughly 30 Hz.
pub const DEFAULT_FRAME_BUDGET_MS: u32 = 33;

pub enum ActiveGenerator {
    Fire(Fire),
    Water(Water),
    Lightning(Lightning),
    HeatFire(HeatFire),
}

impl ActiveGenerator {
    pub fn new(kind: GeneratorKind, seed: u32) -> Self {
        match kind {
            GeneratorKind::Fire => ActiveGenerator::Fire(Fire::new(seed)),
            GeneratorKind::Water => ActiveGenerator::Water(Water::new(seed)),
            GeneratorKind::Lightning => ActiveGenerator::Lightning(Lightning::new(seed)),
            GeneratorKind::HeatFire => ActiveGenerator::HeatFire(HeatFire::new(seed)),
        }
    }

    pub fn kind(&self) -> GeneratorKind {
        match self {
            ActiveGenerator::Fire(_) => GeneratorKind::Fire,
            ActiveGenerator::Water(_) => GeneratorKind::Water,
            ActiveGenerator::Lightning(_) => GeneratorKind::Lightning,
            ActiveGenerator::HeatFire(_) => GeneratorKind::HeatFire,
        }
    }

    /// Live particles; the heat grid has none.
    pub fn particles(&self) -> usize {
        match self {
            ActiveGenerator::Fire(g) => g.active_count(),
            ActiveGenerator::Water(g) => g.active_count(),
            ActiveGenerator::Lightning(g) => g.active_count(),
            ActiveGenerator::HeatFire(_) => 0,
        }
    }
}

impl Generator for ActiveGenerator {
    fn begin(&mut self, config: &DeviceConfig, now_ms: u32) -> Result<(), ConfigError> {
        match self {
            ActiveGenerator::Fire(g) => g.begin(config, now_ms),
            ActiveGenerator::Water(g) => g.begin(config, now_ms),
            ActiveGenerator::Lightning(g) => g.begin(config, now_ms),
            ActiveGenerator::HeatFire(g) => g.begin(config, now_ms),
        }
    }

    fn generate<T: RenderTarget>(&mut self, target: &mut T, audio: AudioControl, now_ms: u32) {
        match self {
            ActiveGenerator::Fire(g) => g.generate(target, audio, now_ms),
            ActiveGenerator::Water(g) => g.generate(target, audio, now_ms),
            ActiveGenerator::Lightning(g) => g.generate(target, audio, now_ms),
            ActiveGenerator::HeatFire(g) => g.generate(target, audio, now_ms),
        }
    }

    fn reset(&mut self) {
        match self {
            ActiveGenerator::Fire(g) => g.reset(),
            ActiveGenerator::Water(g) => g.reset(),
            ActiveGenerator::Lightning(g) => g.reset(),
            ActiveGenerator::HeatFire(g) => g.reset(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ActiveGenerator::Fire(g) => g.name(),
            ActiveGenerator::Water(g) => g.name(),
            ActiveGenerator::Lightning(g) => g.name(),
            ActiveGenerator::HeatFire(g) => g.name(),
        }
    }

    fn is_ready(&self) -> bool {
        match self {
            ActiveGenerator::Fire(g) => g.is_ready(),
            ActiveGenerator::Water(g) => g.is_ready(),
            ActiveGenerator::Lightning(g) => g.is_ready(),
            ActiveGenerator::HeatFire(g) => g.is_ready(),
        }
    }
}

pub struct RenderPipeline {
    config: DeviceConfig,
    active: Option<ActiveGenerator>,
    /// Last requested kind, kept through safe mode.
    selected: Option<GeneratorKind>,
    last_error: Option<ConfigError>,
    seed: u32,
    max_frame_ms: u32,
    frames: u32,
    overruns: u32,
}

impl RenderPipeline {
    /// Starts with no generator; call [`RenderPipeline::set_generator`].
    pub fn new(config: DeviceConfig, seed: u32) -> Self {
        Self {
            config,
            active: None,
            selected: None,
            last_error: None,
            seed,
            max_frame_ms: DEFAULT_FRAME_BUDGET_MS,
            frames: 0,
            overruns: 0,
        }
    }

    pub fn with_frame_budget(mut self, max_frame_ms: u32) -> Self {
        self.max_frame_ms = max_frame_ms;
        self
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Replace the active generator with a fresh `kind`.
    ///
    /// On error the pipeline is left in safe mode.
    pub fn set_generator(&mut self, kind: GeneratorKind, now_ms: u32) -> Result<(), ConfigError> {
        if let Some(old) = self.active.as_mut() {
            old.reset();
        }
        self.active = None;
        self.selected = Some(kind);
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);

        let mut generator = ActiveGenerator::new(kind, self.seed);
        match generator.begin(&self.config, now_ms) {
            Ok(()) => {
                log::debug!("pipeline: switched to {}", generator.name());
                self.active = Some(generator);
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                log::warn!("pipeline: {} rejected {}: {}", kind.name(), self.config.name, e);
                self.last_error = Some(e);
                Err(e)
            }
        }
    }

    /// Swap in a new device configuration and restart the selected generator on it.
    pub fn set_config(&mut self, config: DeviceConfig, now_ms: u32) -> Result<(), ConfigError> {
        self.config = config;
        match self.selected {
            Some(kind) => self.set_generator(kind, now_ms),
            None => Ok(()),
        }
    }

    /// Advance the active generator one frame. Safe mode draws nothing.
    pub fn render<T: RenderTarget>(&mut self, target: &mut T, audio: AudioControl, now_ms: u32) {
        match self.active.as_mut() {
            Some(generator) if generator.is_ready() => {
                generator.generate(target, audio, now_ms);
                self.frames = self.frames.wrapping_add(1);
            }
            _ => {}
        }
    }

    /// Uninitialize the active generator; `set_generator` brings one back.
    pub fn reset(&mut self) {
        if let Some(generator) = self.active.as_mut() {
            generator.reset();
        }
    }

    /// Report how long the last loop iteration took. Returns true on an overrun.
    pub fn note_frame_time(&mut self, elapsed_ms: u32) -> bool {
        if elapsed_ms <= self.max_frame_ms {
            return false;
        }
        self.overruns = self.overruns.saturating_add(1);
        log::warn!(
            "frame took {} ms (budget {} ms), {} overruns so far",
            elapsed_ms,
            self.max_frame_ms,
            self.overruns
        );
        true
    }

    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(|g| g.is_ready())
    }

    pub fn kind(&self) -> Option<GeneratorKind> {
        self.active.as_ref().map(|g| g.kind())
    }

    pub fn name(&self) -> &'static str {
        self.active.as_ref().map_or("none", |g| g.name())
    }

    pub fn active(&self) -> Option<&ActiveGenerator> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveGenerator> {
        self.active.as_mut()
    }

    pub fn last_error(&self) -> Option<ConfigError> {
        self.last_error
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    /// One line for a console or status display. Truncated to fit.
    pub fn status(&self) -> String<64> {
        let mut line = String::new();
        // overflow only truncates the line
        let _ = match (&self.active, self.last_error) {
            (Some(g), _) if g.is_ready() => write!(
                line,
                "{}: {} particles, {} overruns",
                g.name(),
                g.particles(),
                self.overruns
            ),
            (_, Some(e)) => write!(line, "safe mode: {}", e),
            _ => write!(line, "idle"),
        };
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatrixConfig;
    use crate::target::{PixelBuffer, Rgb};

    fn tube() -> RenderPipeline {
        RenderPipeline::new(DeviceConfig::tube_light(), 7)
    }

    #[test]
    fn every_kind_starts_on_the_tube() {
        let mut pipeline = tube();
        let mut buf: PixelBuffer<60> = PixelBuffer::new(4, 15).unwrap();
        for kind in GeneratorKind::ALL {
            pipeline.set_generator(kind, 0).unwrap();
            assert_eq!(pipeline.kind(), Some(kind));
            assert_eq!(pipeline.name(), kind.name());
            for frame in 1..=10 {
                pipeline.render(&mut buf, AudioControl::new(0.6, 0.4, 0.0), frame * 33);
            }
            assert!(pipeline.is_active());
        }
        assert_eq!(pipeline.frames(), 40);
    }

    #[test]
    fn oversized_heat_grid_falls_into_safe_mode() {
        let mut config = DeviceConfig::bucket_totem();
        config.matrix = MatrixConfig {
            width: 32,
            height: 32,
            ..config.matrix
        };
        let mut pipeline = RenderPipeline::new(config, 1);
        let err = pipeline.set_generator(GeneratorKind::HeatFire, 0);
        assert_eq!(
            err,
            Err(ConfigError::GridTooLarge {
                cells: 1024,
                capacity: 256
            })
        );
        assert!(!pipeline.is_active());
        assert!(pipeline.status().starts_with("safe mode"));

        let mut buf: PixelBuffer<16> = PixelBuffer::new(4, 4).unwrap();
        buf.fill(Rgb::new(1, 2, 3));
        pipeline.render(&mut buf, AudioControl::SILENT, 33);
        assert!(buf.pixels().iter().all(|c| *c == Rgb::new(1, 2, 3)));
        assert_eq!(pipeline.frames(), 0);

        // particle generators do not care about the grid size
        pipeline.set_generator(GeneratorKind::Water, 40).unwrap();
        assert!(pipeline.is_active());
        assert_eq!(pipeline.last_error(), None);
    }

    #[test]
    fn reset_stops_rendering_until_reselected() {
        let mut pipeline = tube();
        pipeline.set_generator(GeneratorKind::Fire, 0).unwrap();
        pipeline.reset();
        assert!(!pipeline.is_active());
        assert_eq!(pipeline.status().as_str(), "idle");
        pipeline.set_generator(GeneratorKind::Fire, 10).unwrap();
        assert!(pipeline.is_active());
    }

    #[test]
    fn overruns_are_counted() {
        let mut pipeline = tube().with_frame_budget(20);
        assert!(!pipeline.note_frame_time(20));
        assert!(pipeline.note_frame_time(21));
        assert!(pipeline.note_frame_time(90));
        assert_eq!(pipeline.overruns(), 2);
    }

    #[test]
    fn status_names_the_generator() {
        let mut pipeline = tube();
        assert_eq!(pipeline.status().as_str(), "idle");
        pipeline.set_generator(GeneratorKind::HeatFire, 0).unwrap();
        assert_eq!(
            pipeline.status().as_str(),
            "Heat Fire: 0 particles, 0 overruns"
        );
    }

    #[test]
    fn config_swap_restarts_the_generator() {
        let mut pipeline = tube();
        pipeline.set_generator(GeneratorKind::Lightning, 0).unwrap();
        pipeline.set_config(DeviceConfig::hat(), 100).unwrap();
        assert_eq!(pipeline.kind(), Some(GeneratorKind::Lightning));
        assert_eq!(pipeline.config().matrix.width, 89);

        let mut bad = DeviceConfig::hat();
        bad.fire.spark_chance = 2.0;
        assert_eq!(
            pipeline.set_config(bad, 200),
            Err(ConfigError::InvalidSparkChance)
        );
        assert!(!pipeline.is_active());

        // a good config brings the same kind back
        pipeline.set_config(DeviceConfig::hat(), 300).unwrap();
        assert_eq!(pipeline.kind(), Some(GeneratorKind::Lightning));
    }
}
