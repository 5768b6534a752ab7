//! config - Device configuration handed to generators in `begin`
//! Plain Copy structs; loading and persistence live outside this crate

use crate::error::ConfigError;

/// Physical arrangement of the LEDs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayoutKind {
    /// Rectangular grid; "up" is decreasing y.
    Matrix,
    /// A single string, possibly closed into a ring.
    Linear,
    /// Scattered LEDs mapped onto a grid.
    Random,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MatrixConfig {
    pub width: u16,
    pub height: u16,
    pub layout: LayoutKind,
    pub orientation: Orientation,
}

impl MatrixConfig {
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Tuning bundle for the heat-diffusion fire.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FireDefaults {
    pub base_cooling: u8,
    pub spark_heat_min: u8,
    pub spark_heat_max: u8,
    pub spark_chance: f32,
    pub audio_spark_boost: f32,
    pub audio_heat_boost_max: u8,
    /// Negative values cool less when loud (taller flames).
    pub cooling_audio_bias: i8,
    pub bottom_rows_for_sparks: u8,
    pub transient_heat_max: u8,
}

impl Default for FireDefaults {
    fn default() -> Self {
        Self {
            base_cooling: 85,
            spark_heat_min: 40,
            spark_heat_max: 200,
            spark_chance: 0.32,
            audio_spark_boost: 0.3,
            audio_heat_boost_max: 60,
            cooling_audio_bias: -20,
            bottom_rows_for_sparks: 1,
            transient_heat_max: 100,
        }
    }
}

impl FireDefaults {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spark_heat_min > self.spark_heat_max {
            return Err(ConfigError::InvalidSparkRange {
                min: self.spark_heat_min,
                max: self.spark_heat_max,
            });
        }
        if !(0.0..=1.0).contains(&self.spark_chance) {
            return Err(ConfigError::InvalidSparkChance);
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DeviceConfig {
    pub name: &'static str,
    pub matrix: MatrixConfig,
    pub fire: FireDefaults,
}

impl DeviceConfig {
    /// 4x15 zigzag tube, strip running top to bottom.
    pub fn tube_light() -> Self {
        Self {
            name: "Tube Light",
            matrix: MatrixConfig {
                width: 4,
                height: 15,
                layout: LayoutKind::Matrix,
                orientation: Orientation::Vertical,
            },
            fire: FireDefaults {
                base_cooling: 40,
                spark_heat_min: 50,
                spark_heat_max: 200,
                spark_chance: 0.2,
                audio_spark_boost: 0.3,
                audio_heat_boost_max: 60,
                cooling_audio_bias: -20,
                bottom_rows_for_sparks: 1,
                transient_heat_max: 100,
            },
        }
    }

    pub fn bucket_totem() -> Self {
        Self {
            name: "Bucket Totem",
            matrix: MatrixConfig {
                width: 16,
                height: 8,
                layout: LayoutKind::Matrix,
                orientation: Orientation::Horizontal,
            },
            fire: FireDefaults {
                base_cooling: 25,
                spark_heat_min: 120,
                spark_heat_max: 255,
                spark_chance: 0.45,
                audio_spark_boost: 0.5,
                cooling_audio_bias: -30,
                bottom_rows_for_sparks: 2,
                ..FireDefaults::default()
            },
        }
    }

    pub fn long_tube() -> Self {
        Self {
            name: "Long Tube",
            matrix: MatrixConfig {
                width: 4,
                height: 60,
                layout: LayoutKind::Matrix,
                orientation: Orientation::Vertical,
            },
            fire: FireDefaults {
                base_cooling: 20,
                spark_heat_min: 60,
                spark_heat_max: 220,
                spark_chance: 0.15,
                audio_spark_boost: 0.35,
                cooling_audio_bias: -15,
                bottom_rows_for_sparks: 2,
                ..FireDefaults::default()
            },
        }
    }

    /// 89 LEDs around a hat brim, closed into a ring.
    pub fn hat() -> Self {
        Self {
            name: "Hat Display",
            matrix: MatrixConfig {
                width: 89,
                height: 1,
                layout: LayoutKind::Linear,
                orientation: Orientation::Horizontal,
            },
            fire: FireDefaults {
                base_cooling: 90,
                spark_heat_min: 200,
                spark_heat_max: 255,
                spark_chance: 0.08,
                audio_spark_boost: 0.8,
                cooling_audio_bias: -70,
                bottom_rows_for_sparks: 1,
                ..FireDefaults::default()
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matrix.width == 0 || self.matrix.height == 0 {
            return Err(ConfigError::EmptyMatrix);
        }
        self.fire.validate()
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::tube_light()
    }
}
