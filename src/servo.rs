//! Visual servo controller.
//!
//! Each step samples a fresh frame, finds the tip and axis markers and
//! compares two bearings taken from the axis: towards the tip (where the
//! pointer points now) and towards the target (where it should point). The
//! difference, scaled by a fixed gain, is added to the last commanded angle.
//!
//! The loop ends when the error drops under the threshold, when the step
//! budget runs out, when the frame source fails, or when cancellation is
//! requested. Frames without both markers cost a step but are otherwise
//! ignored, so short occlusions heal on their own.

use crate::actuator::protocol::{MAX_ANGLE, MIN_ANGLE};
use crate::actuator::ActuatorChannel;
use crate::calibration::Calibration;
use crate::camera::FrameSource;
use crate::clock::{CancelFlag, Clock};
use crate::error::AppResult;
use crate::geometry::{bearing, normalize_degrees, Point2D};
use crate::vision::{MarkerDetector, MarkerKind};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Closed-loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentParams {
    /// Feedback iterations before giving up
    pub max_steps: u32,
    /// Absolute bearing error, in degrees, accepted as aligned
    pub threshold_deg: f64,
    /// Degrees of servo travel per degree of bearing error
    pub gain: f64,
    /// Wait after every step, in milliseconds
    pub inter_sample_delay_ms: u64,
    /// Wrap the bearing error into (-180, 180] before applying the gain
    pub normalize_error: bool,
    /// End the attempt after this many consecutive frames without both markers
    pub max_consecutive_losses: Option<u32>,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            max_steps: 50,
            threshold_deg: 2.0,
            gain: 0.5,
            inter_sample_delay_ms: 150,
            normalize_error: true,
            max_consecutive_losses: None,
        }
    }
}

impl AlignmentParams {
    /// Reject parameters the loop cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_steps == 0 {
            return Err("alignment.max_steps must be > 0".to_string());
        }
        if !(self.threshold_deg.is_finite() && self.threshold_deg > 0.0) {
            return Err(format!(
                "alignment.threshold_deg must be a positive number, got {}",
                self.threshold_deg
            ));
        }
        if !self.gain.is_finite() || self.gain == 0.0 {
            return Err(format!(
                "alignment.gain must be finite and non-zero, got {}",
                self.gain
            ));
        }
        if self.max_consecutive_losses == Some(0) {
            return Err("alignment.max_consecutive_losses must be > 0 when set".to_string());
        }
        Ok(())
    }

    fn inter_sample_delay(&self) -> Duration {
        Duration::from_millis(self.inter_sample_delay_ms)
    }
}

/// Why an alignment attempt ended without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AlignmentFailure {
    /// Too many consecutive frames without both markers
    #[error("markers lost persistently")]
    MarkersLostPersistently,
    /// Every step was used without converging
    #[error("step budget exhausted")]
    StepBudgetExhausted,
    /// The frame source failed
    #[error("camera unavailable")]
    CameraUnavailable,
    /// Cancellation was requested
    #[error("cancelled")]
    Cancelled,
}

/// Outcome of one [`ServoController::align`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlignmentResult {
    /// Bearing error fell under the threshold.
    Aligned {
        /// 1-based step on which convergence was observed
        steps: u32,
        /// Final signed error in degrees
        error_deg: f64,
    },
    /// The attempt ended without converging.
    Failed(AlignmentFailure),
}

impl AlignmentResult {
    /// Whether the pointer ended on target.
    pub fn is_aligned(&self) -> bool {
        matches!(self, AlignmentResult::Aligned { .. })
    }
}

/// What one frame tells the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Observation {
    /// Signed bearing error in degrees
    Error(f64),
    /// At least one marker missing
    MarkersMissing,
    /// Axis coincides with the tip or with the target
    Degenerate,
}

/// Signed error between the current pointing direction and the target,
/// both measured from the axis marker.
///
/// `None` when either direction is undefined.
pub fn bearing_error(axis: Point2D, tip: Point2D, target: Point2D, normalize: bool) -> Option<f64> {
    let to_tip = bearing(axis, tip)?;
    let to_target = bearing(axis, target)?;
    let error = to_target - to_tip;
    Some(if normalize { normalize_degrees(error) } else { error })
}

/// Next angle to command: `current + error * gain`, clamped into `bounds`
/// and truncated to whole degrees.
pub fn proportional_command(current: u8, error: f64, gain: f64, bounds: &RangeInclusive<u8>) -> i64 {
    let raw = f64::from(current) + error * gain;
    raw.clamp(f64::from(*bounds.start()), f64::from(*bounds.end())) as i64
}

/// Drives the actuator until the pointer lines up with a target point.
pub struct ServoController {
    frames: Box<dyn FrameSource>,
    detector: MarkerDetector,
    clock: Arc<dyn Clock>,
    params: AlignmentParams,
    bounds: RangeInclusive<u8>,
    cancel: CancelFlag,
}

impl ServoController {
    /// Controller with the full 0..=180 sweep and no cancellation source.
    pub fn new(
        frames: Box<dyn FrameSource>,
        detector: MarkerDetector,
        clock: Arc<dyn Clock>,
        params: AlignmentParams,
    ) -> Self {
        Self {
            frames,
            detector,
            clock,
            params,
            bounds: MIN_ANGLE..=MAX_ANGLE,
            cancel: CancelFlag::new(),
        }
    }

    /// Keep closed-loop commands inside the calibrated sweep.
    pub fn with_calibration(mut self, calibration: &Calibration) -> Self {
        self.bounds = calibration.bounds();
        self
    }

    /// Check `flag` at every step boundary.
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    /// Align with the configured parameters.
    pub async fn align(
        &mut self,
        actuator: &mut ActuatorChannel,
        target: Point2D,
        label: &str,
    ) -> AppResult<AlignmentResult> {
        let params = self.params;
        self.align_with(actuator, target, label, &params).await
    }

    /// Align with explicit parameters.
    ///
    /// Alignment failures are returned as [`AlignmentResult::Failed`]; the
    /// `Err` path is reserved for transport failures, which leave the
    /// physical position unknown.
    pub async fn align_with(
        &mut self,
        actuator: &mut ActuatorChannel,
        target: Point2D,
        label: &str,
        params: &AlignmentParams,
    ) -> AppResult<AlignmentResult> {
        info!(%target, label, angle = actuator.angle(), "aligning");
        let delay = params.inter_sample_delay();
        let mut consecutive_losses = 0u32;

        for step in 1..=params.max_steps {
            if self.cancel.is_cancelled() {
                warn!(label, step, "alignment cancelled");
                return Ok(AlignmentResult::Failed(AlignmentFailure::Cancelled));
            }

            let frame = match self.frames.acquire().await {
                Ok(frame) => frame,
                Err(e) => {
                    error!(label, step, error = %e, "camera unavailable");
                    return Ok(AlignmentResult::Failed(AlignmentFailure::CameraUnavailable));
                }
            };

            match self.observe(&frame, target, params.normalize_error) {
                Observation::Error(error_deg) => {
                    consecutive_losses = 0;
                    info!(
                        step,
                        max_steps = params.max_steps,
                        error_deg = format_args!("{error_deg:.1}"),
                        angle = actuator.angle(),
                        "alignment step"
                    );

                    if error_deg.abs() < params.threshold_deg {
                        info!(label, steps = step, "aligned");
                        return Ok(AlignmentResult::Aligned {
                            steps: step,
                            error_deg,
                        });
                    }

                    let command =
                        proportional_command(actuator.angle(), error_deg, params.gain, &self.bounds);
                    actuator.send_angle(command).await?;
                }
                missing => {
                    consecutive_losses += 1;
                    if missing == Observation::Degenerate {
                        warn!(step, "axis marker overlaps tip or target, retrying");
                    } else {
                        warn!(step, "lost markers, retrying");
                    }
                    if params
                        .max_consecutive_losses
                        .is_some_and(|limit| consecutive_losses >= limit)
                    {
                        warn!(label, consecutive_losses, "markers lost persistently");
                        return Ok(AlignmentResult::Failed(
                            AlignmentFailure::MarkersLostPersistently,
                        ));
                    }
                }
            }

            self.clock.sleep(delay).await;
        }

        warn!(label, max_steps = params.max_steps, "could not align within step budget");
        Ok(AlignmentResult::Failed(AlignmentFailure::StepBudgetExhausted))
    }

    fn observe(&self, frame: &image::RgbImage, target: Point2D, normalize: bool) -> Observation {
        let detections = self.detector.detect(frame);
        let Some((tip, axis)) = detections.pair() else {
            debug!(
                tip = ?detections.get(MarkerKind::Tip),
                axis = ?detections.get(MarkerKind::Axis),
                "incomplete detection"
            );
            return Observation::MarkersMissing;
        };
        match bearing_error(axis, tip, target, normalize) {
            Some(error) => Observation::Error(error),
            None => Observation::Degenerate,
        }
    }
}
