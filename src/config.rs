//! Configuration System using Figment
//!
//! Settings are layered, lowest precedence first:
//! 1. Built-in defaults ([`Settings::default`])
//! 2. A TOML file (by default `config/visual_servo.toml`, optional)
//! 3. Environment variables prefixed with `SERVO_`
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated with a double underscore:
//!
//! ```text
//! SERVO_LOG_LEVEL=debug
//! SERVO_SERIAL__PORT=/dev/ttyUSB0
//! SERVO_ALIGNMENT__GAIN=0.4
//! ```
//!
//! # Example
//!
//! ```no_run
//! use visual_servo::config::Settings;
//!
//! let settings = Settings::load_from("config/visual_servo.toml")?;
//! println!("Servo link: {}", settings.serial.port);
//! # Ok::<(), visual_servo::config::ConfigError>(())
//! ```

use crate::servo::AlignmentParams;
use crate::vision::ColorClass;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the settings file.
pub const DEFAULT_CONFIG_PATH: &str = "config/visual_servo.toml";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment could not read or extract the layered configuration.
    #[error("Configuration load error: {0}")]
    LoadError(#[from] Box<figment::Error>),
    /// Values parsed but are semantically invalid.
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Actuator serial link
    pub serial: SerialSettings,
    /// Where frames come from
    pub camera: CameraSettings,
    /// Marker color classes
    pub markers: MarkerSettings,
    /// Closed-loop parameters
    pub alignment: AlignmentParams,
    /// Optional calibration artifact written by `visual_servo calibrate`
    #[serde(default)]
    pub calibration_path: Option<PathBuf>,
}

/// Serial link to the servo board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialSettings {
    /// Port path (e.g. "/dev/ttyACM0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Upper bound on a single write
    pub write_timeout_ms: u64,
    /// The board resets when the port opens; wait this long before writing
    pub settle_after_open_ms: u64,
    /// Appended to every command
    pub line_terminator: String,
}

/// How frames are read from disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    /// Re-read one file that an external capture process keeps overwriting.
    Snapshot,
    /// Walk a directory of frames in name order.
    Sequence,
}

/// Frame source settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraSettings {
    /// Snapshot file or frame directory
    pub source: PathBuf,
    /// Interpretation of `source`
    pub mode: CameraMode,
}

/// The two tracked markers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkerSettings {
    /// Indicator end
    pub tip: ColorClass,
    /// Pivot
    pub axis: ColorClass,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            serial: SerialSettings::default(),
            camera: CameraSettings {
                source: PathBuf::from("frames/latest.png"),
                mode: CameraMode::Snapshot,
            },
            markers: MarkerSettings::default(),
            alignment: AlignmentParams::default(),
            calibration_path: None,
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 9600,
            write_timeout_ms: 1000,
            settle_after_open_ms: 2000,
            line_terminator: "\n".to_string(),
        }
    }
}

impl Default for MarkerSettings {
    fn default() -> Self {
        Self {
            tip: ColorClass::new([0, 80, 150], [10, 180, 255]),
            axis: ColorClass::new([25, 140, 200], [45, 180, 240]),
        }
    }
}

impl Settings {
    /// Load configuration from a specific file path.
    ///
    /// A missing file is not an error: defaults and environment overrides
    /// still apply. The result is validated before it is returned.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Self = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SERVO_").split("__"))
            .extract()
            .map_err(|e| ConfigError::LoadError(Box::new(e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.serial.port.is_empty() {
            return Err(ConfigError::ValidationError(
                "serial.port cannot be empty".to_string(),
            ));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::ValidationError(
                "serial.baud_rate must be > 0".to_string(),
            ));
        }

        for (name, class) in [("tip", &self.markers.tip), ("axis", &self.markers.axis)] {
            if !class.is_well_formed() {
                return Err(ConfigError::ValidationError(format!(
                    "markers.{name}: lower bound {:?} exceeds upper bound {:?}",
                    class.lower, class.upper
                )));
            }
        }

        self.alignment
            .validate()
            .map_err(ConfigError::ValidationError)
    }
}
