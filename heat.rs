//! heat - Cellular-automaton fire on a grid of heat values
//!
//! Each frame the grid cools, heat rises one row, and fresh sparks land in the
//! bottom rows. Heat row 0 is the spark row and is drawn on the bottom line of
//! the display.

use crate::audio::AudioControl;
use crate::config::{DeviceConfig, FireDefaults};
use crate::error::ConfigError;
use crate::generator::Generator;
use crate::rng::Rng;
use crate::target::{RenderTarget, Rgb};

/// Grid capacity of the default heat fire (covers 16x16 and smaller).
pub const HEAT_FIRE_CELLS: usize = 256;

/// Quietest frame energy; keeps embers glowing in silence.
pub const EMBER_FLOOR: f32 = 0.03;
/// Spark gating never sees less than this much energy.
pub const MIN_SPARK_ENERGY: f32 = 0.05;

const COOLING_SCALE: f32 = 0.5 / 255.0;
const CENTER_WEIGHT: f32 = 1.4;
const DIAGONAL_WEIGHT: f32 = 0.8;
const PROPAGATION_RATE: f32 = 3.1;
const FLICKER_DEPTH: f32 = 0.05;

const DARK_RED_END: f32 = 0.15;
const RED_END: f32 = 0.40;
const ORANGE_END: f32 = 0.70;
const YELLOW_END: f32 = 0.90;

fn channel(v: f32) -> u8 {
    (v + 0.5) as u8
}

/// Five-band fire palette: black, dark red, red, orange, yellow, then white-blue.
/// `h` is clamped to [0, 1].
pub fn heat_to_color(h: f32) -> Rgb {
    let h = if h.is_finite() { h.clamp(0.0, 1.0) } else { 0.0 };

    if h <= DARK_RED_END {
        let t = h / DARK_RED_END;
        Rgb::new(channel(t * 120.0), channel(t * 15.0), 0)
    } else if h <= RED_END {
        let t = (h - DARK_RED_END) / (RED_END - DARK_RED_END);
        Rgb::new(channel(120.0 + t * 135.0), channel(15.0 + t * 25.0), 0)
    } else if h <= ORANGE_END {
        let t = (h - RED_END) / (ORANGE_END - RED_END);
        Rgb::new(255, channel(40.0 + t * 125.0), channel(t * 20.0))
    } else if h <= YELLOW_END {
        let t = (h - ORANGE_END) / (YELLOW_END - ORANGE_END);
        Rgb::new(255, channel(165.0 + t * 90.0), channel(20.0 + t * 30.0))
    } else {
        let t = (h - YELLOW_END) / (1.0 - YELLOW_END);
        Rgb::new(255, 255, channel(50.0 + t * 205.0))
    }
}

/// Scale `h` by a slow ±5% shimmer and re-clamp to [0, 1].
pub fn flicker(h: f32, now_ms: u32) -> f32 {
    let wave = libm::sinf(now_ms as f32 * 0.01 + h * 10.0);
    (h * (1.0 + FLICKER_DEPTH * wave)).clamp(0.0, 1.0)
}

/// Energy driving one frame: loudness lifted by transients, never below the ember floor.
pub fn frame_energy(audio: AudioControl, transient_heat_max: u8) -> f32 {
    let lift = 1.0 + audio.transient * (transient_heat_max as f32 / 255.0);
    (audio.energy * lift).max(EMBER_FLOOR).min(1.0)
}

pub struct HeatFire<const CELLS: usize = HEAT_FIRE_CELLS> {
    heat: [f32; CELLS],
    width: u16,
    height: u16,
    params: FireDefaults,
    rng: Rng,
    ready: bool,
}

impl<const CELLS: usize> HeatFire<CELLS> {
    pub fn new(seed: u32) -> Self {
        Self {
            heat: [0.0; CELLS],
            width: 0,
            height: 0,
            params: FireDefaults::default(),
            rng: Rng::new(seed),
            ready: false,
        }
    }

    pub fn params(&self) -> &FireDefaults {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut FireDefaults {
        &mut self.params
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    fn index(&self, x: u16, row: u16) -> usize {
        row as usize * self.width as usize + x as usize
    }

    fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Heat at column `x`, heat row `row` (0 = spark row). 0 outside the grid.
    pub fn heat(&self, x: u16, row: u16) -> f32 {
        if x < self.width && row < self.height {
            self.heat[self.index(x, row)]
        } else {
            0.0
        }
    }

    /// Random convective loss per cell. Louder frames cool less when the
    /// audio bias is negative.
    pub fn cool(&mut self, energy: f32) {
        let cooling = (self.params.base_cooling as f32
            + self.params.cooling_audio_bias as f32 * energy)
            .clamp(0.0, 255.0) as u32;
        let cells = self.cells();
        for cell in self.heat[..cells].iter_mut() {
            let decay = self.rng.below(cooling + 1) as f32 * COOLING_SCALE;
            *cell = (*cell - decay).max(0.0);
        }
    }

    /// Heat rises: every row above the spark row takes a weighted blend of
    /// the three cells beneath it. Columns wrap.
    pub fn propagate(&mut self) {
        let w = self.width;
        if w == 0 {
            return;
        }
        for row in (1..self.height).rev() {
            for x in 0..w {
                let below = self.heat[self.index(x, row - 1)];
                let left = self.heat[self.index((x + w - 1) % w, row - 1)];
                let right = self.heat[self.index((x + 1) % w, row - 1)];
                let blended =
                    (below * CENTER_WEIGHT + (left + right) * DIAGONAL_WEIGHT) / PROPAGATION_RATE;
                let i = self.index(x, row);
                self.heat[i] = blended.clamp(0.0, 1.0);
            }
        }
    }

    /// Roll for new sparks in the bottom `bottom_rows_for_sparks` rows.
    /// A spark only ever raises a cell's heat.
    pub fn inject_sparks(&mut self, energy: f32) {
        let p = self.params;
        let e = if energy.is_finite() {
            energy.max(MIN_SPARK_ENERGY)
        } else {
            MIN_SPARK_ENERGY
        };
        let gate = p.spark_chance * (libm::sqrtf(e) + p.audio_spark_boost * e).clamp(0.0, 1.0);
        let boost = p.audio_heat_boost_max as f32 / 255.0 * e;
        let rows = (p.bottom_rows_for_sparks.max(1) as u16).min(self.height);

        for row in 0..rows {
            for x in 0..self.width {
                if !self.rng.chance(gate) {
                    continue;
                }
                let spark = self.rng.range_u8(p.spark_heat_min, p.spark_heat_max) as f32 / 255.0;
                let i = self.index(x, row);
                self.heat[i] = self.heat[i].max((spark + boost).min(1.0));
            }
        }
    }

    /// Paint the grid, spark row at the bottom of the target.
    pub fn render<T: RenderTarget>(&self, target: &mut T, now_ms: u32) {
        for row in 0..self.height {
            let y = self.height - 1 - row;
            for x in 0..self.width {
                let h = flicker(self.heat(x, row), now_ms);
                target.set_pixel(x, y, heat_to_color(h));
            }
        }
    }
}

impl<const CELLS: usize> Default for HeatFire<CELLS> {
    fn default() -> Self {
        Self::new(0x5eed_f12e)
    }
}

impl<const CELLS: usize> Generator for HeatFire<CELLS> {
    fn begin(&mut self, config: &DeviceConfig, _now_ms: u32) -> Result<(), ConfigError> {
        self.ready = false;
        config.validate()?;
        let cells = config.matrix.cells();
        if cells > CELLS {
            return Err(ConfigError::GridTooLarge {
                cells,
                capacity: CELLS,
            });
        }
        self.width = config.matrix.width;
        self.height = config.matrix.height;
        self.params = config.fire;
        self.heat = [0.0; CELLS];
        self.ready = true;
        log::debug!(
            "Heat Fire: ready on {}x{} grid, cooling {}",
            self.width,
            self.height,
            self.params.base_cooling
        );
        Ok(())
    }

    fn generate<T: RenderTarget>(&mut self, target: &mut T, audio: AudioControl, now_ms: u32) {
        if !self.ready {
            return;
        }
        let energy = frame_energy(audio.sanitized(), self.params.transient_heat_max);
        self.cool(energy);
        self.propagate();
        self.inject_sparks(energy);
        self.render(target, now_ms);
    }

    fn reset(&mut self) {
        self.heat = [0.0; CELLS];
        self.ready = false;
        log::debug!("Heat Fire: reset");
    }

    fn name(&self) -> &'static str {
        "Heat Fire"
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::PixelBuffer;

    fn ready_fire() -> HeatFire<64> {
        let mut fire = HeatFire::new(9);
        fire.begin(&DeviceConfig::tube_light(), 0).unwrap();
        fire
    }

    #[test]
    fn palette_endpoints() {
        assert_eq!(heat_to_color(0.0), Rgb::BLACK);
        assert_eq!(heat_to_color(1.0), Rgb::new(255, 255, 255));
        assert_eq!(heat_to_color(-3.0), Rgb::BLACK);
        assert_eq!(heat_to_color(f32::NAN), Rgb::BLACK);
    }

    #[test]
    fn palette_channels_never_decrease() {
        let mut last = heat_to_color(0.0);
        for step in 1..=1000 {
            let c = heat_to_color(step as f32 / 1000.0);
            assert!(c.r >= last.r && c.g >= last.g && c.b >= last.b, "step {}", step);
            last = c;
        }
    }

    #[test]
    fn flicker_stays_in_range() {
        for t in (0..10_000).step_by(37) {
            let h = flicker(0.98, t);
            assert!((0.0..=1.0).contains(&h));
            assert!(libm::fabsf(flicker(0.5, t) - 0.5) <= 0.5 * FLICKER_DEPTH + 1e-6);
        }
        assert_eq!(flicker(0.0, 1234), 0.0);
    }

    #[test]
    fn energy_has_a_floor_and_a_ceiling() {
        assert_eq!(frame_energy(AudioControl::SILENT, 100), EMBER_FLOOR);
        assert_eq!(frame_energy(AudioControl::new(1.0, 1.0, 0.0), 255), 1.0);
        let lifted = frame_energy(AudioControl::new(0.5, 1.0, 0.0), 255);
        assert!(libm::fabsf(lifted - 1.0) < 1e-6);
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let mut fire: HeatFire<64> = HeatFire::new(1);
        let result = fire.begin(&DeviceConfig::bucket_totem(), 0);
        assert_eq!(
            result,
            Err(ConfigError::GridTooLarge {
                cells: 128,
                capacity: 64
            })
        );
        assert!(!fire.is_ready());
    }

    #[test]
    fn heat_rises_from_the_spark_row() {
        let mut fire = ready_fire();
        fire.params_mut().spark_chance = 1.0;
        fire.inject_sparks(1.0);
        for x in 0..4 {
            assert!(fire.heat(x, 0) > 0.0);
            assert_eq!(fire.heat(x, 1), 0.0);
        }
        fire.propagate();
        for x in 0..4 {
            assert!(fire.heat(x, 1) > 0.0);
        }
    }

    #[test]
    fn no_cooling_means_no_loss() {
        let mut fire = ready_fire();
        fire.params_mut().spark_chance = 1.0;
        fire.inject_sparks(0.5);
        let before = fire.heat(2, 0);
        fire.params_mut().base_cooling = 0;
        fire.params_mut().cooling_audio_bias = 0;
        fire.cool(1.0);
        assert_eq!(fire.heat(2, 0), before);
    }

    #[test]
    fn spark_row_is_drawn_at_the_bottom() {
        let mut fire = ready_fire();
        fire.params_mut().spark_chance = 1.0;
        fire.inject_sparks(1.0);
        let mut buf: PixelBuffer<60> = PixelBuffer::new(4, 15).unwrap();
        fire.render(&mut buf, 0);
        assert!(buf.pixel(0, 14).brightness() > 0);
        assert_eq!(buf.pixel(0, 0), Rgb::BLACK);
    }

    #[test]
    fn reset_clears_and_deactivates() {
        let mut fire = ready_fire();
        let mut buf: PixelBuffer<60> = PixelBuffer::new(4, 15).unwrap();
        for t in 0..30 {
            fire.generate(&mut buf, AudioControl::new(0.8, 0.5, 0.0), t * 33);
        }
        fire.reset();
        assert!(!fire.is_ready());
        assert!((0..4).all(|x| (0..15).all(|y| fire.heat(x, y) == 0.0)));
    }
}
