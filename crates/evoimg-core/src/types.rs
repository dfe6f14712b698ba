//! Small value types shared by the evaluator and the renderer.

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Three real channel accumulators, not yet clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Build a color from the first three values of an evaluation result.
    /// Missing channels read as 0.
    pub fn from_channels(values: &[f64]) -> Self {
        let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
        Self::new(at(0), at(1), at(2))
    }

    pub fn divide(&self, x: f64) -> Self {
        Self::new(self.r / x, self.g / x, self.b / x)
    }

    /// Clamp every channel to [0,1] and scale to an 8-bit intensity
    /// (truncating).
    pub fn to_rgb8(&self) -> [u8; 3] {
        [channel_to_u8(self.r), channel_to_u8(self.g), channel_to_u8(self.b)]
    }
}

impl AddAssign for Color {
    fn add_assign(&mut self, other: Color) {
        self.r += other.r;
        self.g += other.g;
        self.b += other.b;
    }
}

fn channel_to_u8(x: f64) -> u8 {
    // NaN clamps to 0
    let c = if x > 1.0 {
        1.0
    } else if x >= 0.0 {
        x
    } else {
        0.0
    };
    (c * 255.0) as u8
}

/// Area covered by one output pixel in the unit square.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub xlow: f64,
    pub ylow: f64,
    pub xhigh: f64,
    pub yhigh: f64,
}

impl PixelRect {
    pub fn new(xlow: f64, ylow: f64, xhigh: f64, yhigh: f64) -> Self {
        Self { xlow, ylow, xhigh, yhigh }
    }

    /// The cell at column `x`, row `y` of a `width`×`height` grid laid over
    /// the unit square.
    pub fn for_pixel(x: usize, y: usize, width: usize, height: usize) -> Self {
        let (w, h) = (width as f64, height as f64);
        Self {
            xlow: x as f64 / w,
            xhigh: (x + 1) as f64 / w,
            ylow: y as f64 / h,
            yhigh: (y + 1) as f64 / h,
        }
    }

    pub fn width(&self) -> f64 {
        self.xhigh - self.xlow
    }

    pub fn height(&self) -> f64 {
        self.yhigh - self.ylow
    }
}
