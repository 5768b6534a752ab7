//! target - Pixel buffer the generators draw into
//! The owning pipeline pushes the finished buffer to the LED driver

use crate::error::ConfigError;

/// 8-bit RGB color, convertible to the packed `0x00RRGGBB` form LED drivers use.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn packed(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    pub const fn from_packed(color: u32) -> Self {
        Self {
            r: (color >> 16) as u8,
            g: (color >> 8) as u8,
            b: color as u8,
        }
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self {
            r: self.r.saturating_add(other.r),
            g: self.g.saturating_add(other.g),
            b: self.b.saturating_add(other.b),
        }
    }

    /// Per-channel maximum.
    pub fn max(self, other: Self) -> Self {
        Self {
            r: self.r.max(other.r),
            g: self.g.max(other.g),
            b: self.b.max(other.b),
        }
    }

    /// Unweighted channel sum, used as a cheap brightness measure.
    pub fn brightness(self) -> u16 {
        self.r as u16 + self.g as u16 + self.b as u16
    }
}

impl From<u32> for Rgb {
    fn from(color: u32) -> Self {
        Self::from_packed(color)
    }
}

impl From<Rgb> for u32 {
    fn from(color: Rgb) -> Self {
        color.packed()
    }
}

/// Anything a generator can paint.
///
/// Coordinates are display coordinates: `(0, 0)` is the top-left LED.
/// Writes outside the target are ignored.
pub trait RenderTarget {
    fn width(&self) -> u16;
    fn height(&self) -> u16;
    fn set_pixel(&mut self, x: u16, y: u16, color: Rgb);
    /// Black outside the target.
    fn pixel(&self, x: u16, y: u16) -> Rgb;

    fn fill(&mut self, color: Rgb) {
        for y in 0..self.height() {
            for x in 0..self.width() {
                self.set_pixel(x, y, color);
            }
        }
    }

    fn clear(&mut self) {
        self.fill(Rgb::BLACK);
    }
}

/// Row-major pixel storage with compile-time capacity `N`.
pub struct PixelBuffer<const N: usize> {
    pixels: [Rgb; N],
    width: u16,
    height: u16,
}

impl<const N: usize> PixelBuffer<N> {
    pub fn new(width: u16, height: u16) -> Result<Self, ConfigError> {
        let cells = width as usize * height as usize;
        if cells == 0 {
            return Err(ConfigError::EmptyMatrix);
        }
        if cells > N {
            return Err(ConfigError::GridTooLarge { cells, capacity: N });
        }
        Ok(Self {
            pixels: [Rgb::BLACK; N],
            width,
            height,
        })
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    /// The in-use part of the buffer, row-major.
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels[..self.width as usize * self.height as usize]
    }
}

impl<const N: usize> RenderTarget for PixelBuffer<N> {
    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn set_pixel(&mut self, x: u16, y: u16, color: Rgb) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
        }
    }

    fn pixel(&self, x: u16, y: u16) -> Rgb {
        self.index(x, y).map_or(Rgb::BLACK, |i| self.pixels[i])
    }

    fn fill(&mut self, color: Rgb) {
        let used = self.width as usize * self.height as usize;
        self.pixels[..used].fill(color);
    }
}
