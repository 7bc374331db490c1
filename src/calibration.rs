//! Calibration artifact.
//!
//! An operator jogs the servo until the pointer lines up with the left and
//! right edges of the camera frame and records both angles together with the
//! frame width. The file is plain JSON:
//!
//! ```json
//! {
//!   "left_angle": 150,
//!   "right_angle": 30,
//!   "frame_width": 640
//! }
//! ```
//!
//! The servo loop uses it to keep closed-loop commands inside the sweep that
//! actually covers the frame.

use crate::actuator::protocol::{MAX_ANGLE, MIN_ANGLE};
use crate::error::{AppResult, ServoError};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::info;

/// Servo angles at the two horizontal frame edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    /// Angle pointing at column 0
    pub left_angle: u8,
    /// Angle pointing at the last column
    pub right_angle: u8,
    /// Frame width in pixels at calibration time
    pub frame_width: u32,
}

impl Calibration {
    /// Build and validate.
    pub fn new(left_angle: u8, right_angle: u8, frame_width: u32) -> AppResult<Self> {
        let calibration = Self {
            left_angle,
            right_angle,
            frame_width,
        };
        calibration.validate()?;
        Ok(calibration)
    }

    /// Read and validate a calibration file.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let calibration: Self = serde_json::from_str(&text)?;
        calibration.validate()?;
        Ok(calibration)
    }

    /// Write as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> AppResult<()> {
        self.validate()?;
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        info!(
            path = %path.as_ref().display(),
            left = self.left_angle,
            right = self.right_angle,
            width = self.frame_width,
            "calibration saved"
        );
        Ok(())
    }

    /// Angles in range, distinct, non-empty frame.
    pub fn validate(&self) -> AppResult<()> {
        let range = MIN_ANGLE..=MAX_ANGLE;
        if !range.contains(&self.left_angle) || !range.contains(&self.right_angle) {
            return Err(ServoError::Calibration(format!(
                "angles must lie in {MIN_ANGLE}..={MAX_ANGLE} (left {}, right {})",
                self.left_angle, self.right_angle
            )));
        }
        if self.left_angle == self.right_angle {
            return Err(ServoError::Calibration(
                "left and right angles must differ".to_string(),
            ));
        }
        if self.frame_width == 0 {
            return Err(ServoError::Calibration(
                "frame_width must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The sweep that covers the frame, low end first.
    pub fn bounds(&self) -> RangeInclusive<u8> {
        self.left_angle.min(self.right_angle)..=self.left_angle.max(self.right_angle)
    }

    /// Open-loop estimate of the angle that points at column `x`.
    ///
    /// Columns outside the frame are clamped to its edges.
    pub fn angle_for_column(&self, x: i32) -> u8 {
        let last = f64::from(self.frame_width.saturating_sub(1).max(1));
        let t = (f64::from(x) / last).clamp(0.0, 1.0);
        let left = f64::from(self.left_angle);
        let right = f64::from(self.right_angle);
        (left + (right - left) * t).round() as u8
    }
}
