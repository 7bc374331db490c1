//! Text protocol understood by the servo board.
//!
//! Commands are ASCII, one per line, and the board never replies:
//!
//! | Command            | Effect                                  |
//! |--------------------|-----------------------------------------|
//! | `LED{n}_ON/OFF`    | Switch auxiliary output `n` (1..=3)     |
//! | `SERVO_{preset}`   | Legacy fixed positions                  |
//! | `SERVO_ANGLE_{n}`  | Move to `n` degrees, `n` in 0..=180     |

/// Lowest commandable angle.
pub const MIN_ANGLE: u8 = 0;
/// Highest commandable angle.
pub const MAX_ANGLE: u8 = 180;
/// Position assumed at power-up.
pub const CENTER_ANGLE: u8 = 90;
/// Prefix of the canonical angle command.
pub const SERVO_ANGLE_PREFIX: &str = "SERVO_ANGLE_";
/// Number of auxiliary LED outputs on the board.
pub const LED_COUNT: u8 = 3;

/// `SERVO_ANGLE_{degrees}`
pub fn servo_angle(degrees: u8) -> String {
    format!("{SERVO_ANGLE_PREFIX}{degrees}")
}

/// `SERVO_{preset}`
pub fn servo_preset(preset: u8) -> String {
    format!("SERVO_{preset}")
}

/// `LED{index}_ON` or `LED{index}_OFF`
pub fn led(index: u8, on: bool) -> String {
    format!("LED{index}_{}", if on { "ON" } else { "OFF" })
}

/// Clamp any integer angle into the servo's range.
pub fn clamp_angle(degrees: i64) -> u8 {
    degrees.clamp(i64::from(MIN_ANGLE), i64::from(MAX_ANGLE)) as u8
}

/// The digit suffix of a `SERVO_ANGLE_{digits}` command.
///
/// Returns `None` unless the prefix is present and followed by one or more
/// ASCII digits and nothing else.
pub fn servo_angle_digits(command: &str) -> Option<&str> {
    let digits = command.strip_prefix(SERVO_ANGLE_PREFIX)?;
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_text() {
        assert_eq!(servo_angle(0), "SERVO_ANGLE_0");
        assert_eq!(servo_angle(180), "SERVO_ANGLE_180");
        assert_eq!(servo_preset(45), "SERVO_45");
        assert_eq!(led(2, true), "LED2_ON");
        assert_eq!(led(3, false), "LED3_OFF");
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_angle(-5), 0);
        assert_eq!(clamp_angle(0), 0);
        assert_eq!(clamp_angle(97), 97);
        assert_eq!(clamp_angle(200), 180);
        assert_eq!(clamp_angle(i64::MAX), 180);
    }

    #[test]
    fn test_angle_digits() {
        assert_eq!(servo_angle_digits("SERVO_ANGLE_90"), Some("90"));
        assert_eq!(servo_angle_digits("SERVO_ANGLE_007"), Some("007"));
        assert_eq!(servo_angle_digits("SERVO_ANGLE_"), None);
        assert_eq!(servo_angle_digits("SERVO_ANGLE_-5"), None);
        assert_eq!(servo_angle_digits("SERVO_ANGLE_9x"), None);
        assert_eq!(servo_angle_digits("SERVO_90"), None);
        assert_eq!(servo_angle_digits("servo_angle_90"), None);
    }
}
