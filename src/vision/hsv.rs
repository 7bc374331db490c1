//! RGB to HSV conversion and inclusive HSV ranges.

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Regions smaller than this many pixels are treated as noise.
pub const DEFAULT_MIN_AREA: u32 = 50;

fn default_min_area() -> u32 {
    DEFAULT_MIN_AREA
}

/// Convert one RGB pixel to 8-bit HSV.
///
/// Hue is expressed in half-degrees (0..=179) so that it fits a byte, which is
/// the convention the marker ranges are tuned in.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    // 359.5 degrees rounds to 180, which wraps back to red.
    let h = ((h / 2.0).round() as u16 % 180) as u8;
    [h, s.round() as u8, max as u8]
}

/// A whole frame converted to HSV, row-major.
#[derive(Debug, Clone)]
pub struct HsvFrame {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl HsvFrame {
    /// Convert an RGB frame.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let pixels = image.pixels().map(|p| rgb_to_hsv(p.0)).collect();
        Self {
            width: image.width(),
            height: image.height(),
            pixels,
        }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Binary mask of the pixels inside `class`'s range.
    pub fn mask(&self, class: &ColorClass) -> Vec<bool> {
        self.pixels.iter().map(|hsv| class.contains(*hsv)).collect()
    }
}

/// Inclusive HSV range plus the minimum region area that counts as a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorClass {
    /// Lower bound, `[h, s, v]`
    pub lower: [u8; 3],
    /// Upper bound, `[h, s, v]`
    pub upper: [u8; 3],
    /// Smallest region area, in pixels, reported as a detection
    #[serde(default = "default_min_area")]
    pub min_area: u32,
}

impl ColorClass {
    /// Range with the default minimum area.
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self {
            lower,
            upper,
            min_area: DEFAULT_MIN_AREA,
        }
    }

    /// Override the minimum area.
    pub fn with_min_area(mut self, min_area: u32) -> Self {
        self.min_area = min_area;
        self
    }

    /// Whether an HSV pixel lies inside the range (bounds included).
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| self.lower[i] <= hsv[i] && hsv[i] <= self.upper[i])
    }

    /// Every lower bound is at most its upper bound.
    pub fn is_well_formed(&self) -> bool {
        (0..3).all(|i| self.lower[i] <= self.upper[i])
    }
}
