//! Color-marker tracking.
//!
//! Frames arrive as RGB rasters. They are converted once to the 8-bit HSV
//! convention (hue halved into 0..=179, saturation and value in 0..=255) and
//! each configured [`ColorClass`] is then matched against that buffer.

pub mod detect;
pub mod hsv;

pub use detect::{Detections, MarkerDetector, MarkerKind, Region};
pub use hsv::{rgb_to_hsv, ColorClass, HsvFrame};
