//! Command records and batch decoding.
//!
//! A batch is a JSON array produced by the intent compiler:
//!
//! ```json
//! [
//!   {"cmd": "LED1_ON", "delay": 500},
//!   {"cmd": "SERVO_ANGLE_90", "delay": 500},
//!   {"cmd": "VISUAL_POINT", "target": "water bottle", "x": 320, "y": 240, "delay": 500}
//! ]
//! ```
//!
//! Every element is decoded once, here, into a [`CommandRecord`]. A broken
//! element becomes a [`DecodeError`] in its slot so the rest of the batch can
//! still run.

use crate::actuator::protocol;
use crate::geometry::Point2D;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// `cmd` value selecting the closed-loop path.
pub const VISUAL_POINT: &str = "VISUAL_POINT";
/// Label used when a visual point carries no `target`.
pub const DEFAULT_TARGET_LABEL: &str = "object";

/// What a record asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Opaque text sent as-is.
    Discrete(String),
    /// Open-loop move to an absolute angle (clamped on issue).
    Angle(u32),
    /// Closed-loop pointing at a pixel.
    VisualPoint {
        /// Target pixel
        target: Point2D,
        /// What is at that pixel
        label: String,
    },
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Discrete(text) => f.write_str(text),
            CommandKind::Angle(degrees) => write!(f, "{}{degrees}", protocol::SERVO_ANGLE_PREFIX),
            CommandKind::VisualPoint { target, label } => {
                write!(f, "{VISUAL_POINT} '{label}' at {target}")
            }
        }
    }
}

/// One decoded command plus the pause that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    /// The command
    pub kind: CommandKind,
    /// Wait after executing
    pub delay: Duration,
}

impl CommandRecord {
    /// Discrete text.
    pub fn discrete(text: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            kind: CommandKind::Discrete(text.into()),
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// Open-loop angle.
    pub fn angle(degrees: u32, delay_ms: u64) -> Self {
        Self {
            kind: CommandKind::Angle(degrees),
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// Closed-loop pointing.
    pub fn visual_point(x: i32, y: i32, label: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            kind: CommandKind::VisualPoint {
                target: Point2D::new(x, y),
                label: label.into(),
            },
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// A single batch element that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The element is not a JSON object with the expected field types.
    #[error("record {index}: {reason}")]
    Malformed {
        /// Position in the batch
        index: usize,
        /// What was wrong
        reason: String,
    },
    /// `VISUAL_POINT` without integer `x` and `y`.
    #[error("record {index}: VISUAL_POINT requires integer 'x' and 'y'")]
    MissingTarget {
        /// Position in the batch
        index: usize,
    },
}

/// The whole batch was unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// Not valid JSON.
    #[error("batch is not valid JSON: {0}")]
    InvalidJson(String),
    /// Valid JSON, but not an array.
    #[error("batch must be a JSON array, got {0}")]
    NotAnArray(&'static str),
}

/// Decoded batch: one slot per input element, in input order.
pub type Batch = Vec<Result<CommandRecord, DecodeError>>;

#[derive(Debug, Deserialize)]
struct RawRecord {
    cmd: String,
    #[serde(default)]
    delay: u64,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    x: Option<i32>,
    #[serde(default)]
    y: Option<i32>,
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Decode a batch.
///
/// # Errors
/// [`BatchError`] when the text is not a JSON array at all. Problems with
/// individual elements are returned in their slot instead.
pub fn parse_batch(text: &str) -> Result<Batch, BatchError> {
    let value: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| BatchError::InvalidJson(e.to_string()))?;

    let Value::Array(items) = value else {
        return Err(BatchError::NotAnArray(json_type(&value)));
    };

    Ok(items
        .into_iter()
        .enumerate()
        .map(|(index, item)| decode_record(index, item))
        .collect())
}

/// Decode one batch element.
pub fn decode_record(index: usize, item: Value) -> Result<CommandRecord, DecodeError> {
    let raw: RawRecord = serde_json::from_value(item).map_err(|e| DecodeError::Malformed {
        index,
        reason: e.to_string(),
    })?;
    let delay = Duration::from_millis(raw.delay);

    let kind = if raw.cmd == VISUAL_POINT {
        let (Some(x), Some(y)) = (raw.x, raw.y) else {
            return Err(DecodeError::MissingTarget { index });
        };
        CommandKind::VisualPoint {
            target: Point2D::new(x, y),
            label: raw
                .target
                .unwrap_or_else(|| DEFAULT_TARGET_LABEL.to_string()),
        }
    } else if let Some(digits) = protocol::servo_angle_digits(&raw.cmd) {
        // Digits only: a failed parse is an overflow, clamped to 180 on issue.
        CommandKind::Angle(digits.parse().unwrap_or(u32::MAX))
    } else if raw.cmd.trim().is_empty() {
        return Err(DecodeError::Malformed {
            index,
            reason: "empty 'cmd'".to_string(),
        });
    } else {
        CommandKind::Discrete(raw.cmd)
    };

    Ok(CommandRecord { kind, delay })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Bench check of the board: every LED on and off, the legacy presets, an
/// angle sweep and a combined LED/servo chase, ending centred.
pub fn hardware_check_sequence() -> Vec<CommandRecord> {
    let mut seq = Vec::new();

    for i in 1..=protocol::LED_COUNT {
        seq.push(CommandRecord::discrete(protocol::led(i, true), 500));
    }
    for i in 1..=protocol::LED_COUNT {
        seq.push(CommandRecord::discrete(protocol::led(i, false), 500));
    }

    for preset in [0, 45, 90, 135, 180, 90, 0] {
        seq.push(CommandRecord::discrete(protocol::servo_preset(preset), 700));
    }

    for angle in (0..=180).step_by(10).chain((0..=180).rev().step_by(10)) {
        seq.push(CommandRecord::angle(angle, 100));
    }

    for i in 1..=protocol::LED_COUNT {
        seq.push(CommandRecord::discrete(protocol::led(i, true), 100));
        seq.push(CommandRecord::angle(u32::from(i) * 60, 400));
        seq.push(CommandRecord::discrete(protocol::led(i, false), 100));
    }
    seq.push(CommandRecord::angle(u32::from(protocol::CENTER_ANGLE), 500));

    seq
}
