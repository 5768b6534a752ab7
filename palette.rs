//! palette - Intensity to color gradients for the particle generators

use crate::target::Rgb;

/// One color pinned to an intensity.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stop {
    pub at: u8,
    pub color: Rgb,
}

const fn stop(at: u8, r: u8, g: u8, b: u8) -> Stop {
    Stop {
        at,
        color: Rgb::new(r, g, b),
    }
}

/// Black, deep red, red, orange, yellow-orange, bright yellow.
pub const FIRE: [Stop; 6] = [
    stop(0, 0, 0, 0),
    stop(51, 64, 0, 0),
    stop(102, 255, 0, 0),
    stop(153, 255, 128, 0),
    stop(204, 255, 200, 0),
    stop(255, 255, 255, 64),
];

/// Black, bright yellow, near white, electric blue.
pub const LIGHTNING: [Stop; 4] = [
    stop(0, 0, 0, 0),
    stop(85, 255, 200, 0),
    stop(170, 255, 255, 180),
    stop(255, 150, 200, 255),
];

/// Linear interpolation between the stops surrounding `value`.
///
/// Stops must be sorted by `at`. Values outside the table take the nearest
/// end color; an empty table is black.
pub fn gradient(stops: &[Stop], value: u8) -> Rgb {
    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Rgb::BLACK,
    };
    if value <= first.at {
        return first.color;
    }
    if value >= last.at {
        return last.color;
    }

    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if value >= lo.at && value <= hi.at {
            let range = (hi.at - lo.at) as i32;
            if range == 0 {
                return hi.color;
            }
            let pos = (value - lo.at) as i32;
            let lerp = |a: u8, b: u8| (a as i32 + (b as i32 - a as i32) * pos / range) as u8;
            return Rgb::new(
                lerp(lo.color.r, hi.color.r),
                lerp(lo.color.g, hi.color.g),
                lerp(lo.color.b, hi.color.b),
            );
        }
    }
    last.color
}
