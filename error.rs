//! Configuration errors.
//!
//! Generation itself never fails; a bad device configuration is the only
//! thing reported to the caller, and it keeps the generator from starting.

use core::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Width or height is zero.
    EmptyMatrix,
    /// The grid needs more cells than the generator was built with.
    GridTooLarge { cells: usize, capacity: usize },
    /// `spark_heat_min` is above `spark_heat_max`.
    InvalidSparkRange { min: u8, max: u8 },
    /// `spark_chance` is outside [0, 1] or not finite.
    InvalidSparkChance,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyMatrix => write!(f, "matrix has zero width or height"),
            ConfigError::GridTooLarge { cells, capacity } => write!(
                f,
                "matrix needs {} cells but generator holds {}",
                cells, capacity
            ),
            ConfigError::InvalidSparkRange { min, max } => {
                write!(f, "spark heat range {}..{} is inverted", min, max)
            }
            ConfigError::InvalidSparkChance => write!(f, "spark chance must be within 0..1"),
        }
    }
}
