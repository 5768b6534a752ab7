//! audio - Per-frame audio snapshot consumed by the generators
//! Produced by the external analysis stage; read-only here

use core::f32::consts::TAU;

/// Phase above this on the previous frame arms beat detection.
pub const BEAT_PHASE_MAX: f32 = 0.8;
/// Phase below this on the current frame completes a beat crossing.
pub const BEAT_PHASE_MIN: f32 = 0.2;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AudioControl {
    /// Smoothed loudness, 0-1.
    pub energy: f32,
    /// Transient/hit strength, 0-1.
    pub transient: f32,
    /// Position inside the beat cycle, 0-1 (0 = on the beat).
    pub phase: f32,
}

impl AudioControl {
    pub const SILENT: Self = Self {
        energy: 0.0,
        transient: 0.0,
        phase: 0.0,
    };

    pub const fn new(energy: f32, transient: f32, phase: f32) -> Self {
        Self {
            energy,
            transient,
            phase,
        }
    }

    /// Every field clamped into [0, 1]; NaN and infinities become 0.
    pub fn sanitized(self) -> Self {
        Self {
            energy: unit(self.energy),
            transient: unit(self.transient),
            phase: unit(self.phase),
        }
    }

    /// 1.0 on the beat, 0.0 half way between beats.
    pub fn phase_to_pulse(&self) -> f32 {
        0.5 + 0.5 * libm::cosf(self.phase * TAU)
    }
}

fn unit(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
