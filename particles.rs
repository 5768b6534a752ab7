//! particles - Audio-reactive light generators for small LED arrays
//! No heap allocation, no_std compatible
//!
//! Two generation models share one [`Generator`] contract:
//!
//! - particle systems ([`Fire`], [`Water`], [`Lightning`]) built on a
//!   fixed-capacity [`ParticlePool`], a handful of forces and layout-aware
//!   spawn/boundary strategies, driven frame by frame by [`ParticleGenerator`]
//! - a heat-diffusion cellular automaton ([`HeatFire`])
//!
//! A [`RenderPipeline`] owns whichever one is active, feeds it the
//! per-frame [`AudioControl`] snapshot and a millisecond clock, and lets it
//! paint any [`RenderTarget`].

#![no_std]

pub mod audio;
pub mod config;
pub mod error;
pub mod fire;
pub mod force;
pub mod generator;
pub mod heat;
pub mod layout;
pub mod lightning;
pub mod palette;
pub mod particle;
pub mod pipeline;
pub mod pool;
pub mod rng;
pub mod target;
pub mod water;

pub use audio::AudioControl;
pub use config::{DeviceConfig, FireDefaults, LayoutKind, MatrixConfig, Orientation};
pub use error::ConfigError;
pub use fire::{Fire, FireParams};
pub use force::{Drag, Force, Gravity, Radial, Wind};
pub use generator::{
    Blend, Generator, GeneratorKind, ParticleBehavior, ParticleGenerator, ParticleSystem,
};
pub use heat::{heat_to_color, HeatFire};
pub use layout::{Boundary, ForceAdapter, PhysicsContext, SpawnRegion};
pub use lightning::{Lightning, LightningParams};
pub use particle::{Particle, ParticleFlags};
pub use pipeline::{ActiveGenerator, RenderPipeline};
pub use pool::{Fate, ParticleHandle, ParticlePool};
pub use rng::Rng;
pub use target::{PixelBuffer, RenderTarget, Rgb};
pub use water::{Water, WaterParams};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_runs_every_generator_through_the_crate_root() {
        let mut pipeline = RenderPipeline::new(DeviceConfig::default(), 1);
        let mut buffer: PixelBuffer<60> = PixelBuffer::new(4, 15).unwrap();
        let mut kind = GeneratorKind::Fire;
        for step in 0..8u32 {
            pipeline.set_generator(kind, step * 100).unwrap();
            pipeline.render(&mut buffer, AudioControl::new(0.5, 0.2, 0.0), step * 100 + 33);
            kind = kind.next();
        }
        assert_eq!(pipeline.frames(), 8);
    }
}
