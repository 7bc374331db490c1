//! Actuator command channel.
//!
//! The board gives no position feedback, so the last angle this channel
//! transmitted is the only record of where the servo is. That record lives
//! here and nowhere else; the servo controller reads and moves it through
//! [`ActuatorChannel::angle`] and [`ActuatorChannel::send_angle`].
//!
//! The channel is used through `&mut self`, so a single owner serialises all
//! writes. Callers that want to share it across tasks wrap it in a
//! `tokio::sync::Mutex`.

pub mod protocol;

use crate::adapters::Transport;
use crate::error::AppResult;
use tracing::{debug, info};

/// Last angle commanded to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorState {
    angle: u8,
}

impl ActuatorState {
    /// Degrees, always within `0..=180`.
    pub fn angle(&self) -> u8 {
        self.angle
    }
}

impl Default for ActuatorState {
    fn default() -> Self {
        Self {
            angle: protocol::CENTER_ANGLE,
        }
    }
}

/// Owns the transport and the authoritative actuator state.
pub struct ActuatorChannel {
    transport: Box<dyn Transport>,
    state: ActuatorState,
}

impl ActuatorChannel {
    /// Channel starting at the centre position (90°).
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            state: ActuatorState::default(),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> ActuatorState {
        self.state
    }

    /// Last commanded angle.
    pub fn angle(&self) -> u8 {
        self.state.angle
    }

    /// Transmit `text` verbatim. No acknowledgement is awaited.
    ///
    /// # Errors
    /// Any transport failure; the caller must not continue as if the device
    /// had received the command.
    pub async fn send_discrete(&mut self, text: &str) -> AppResult<()> {
        self.transport.send_line(text).await?;
        info!(command = text, "sent");
        Ok(())
    }

    /// Clamp `degrees` into `0..=180`, transmit it and record it as the new
    /// state. Returns the angle actually sent.
    pub async fn send_angle(&mut self, degrees: i64) -> AppResult<u8> {
        let angle = protocol::clamp_angle(degrees);
        if i64::from(angle) != degrees {
            debug!(requested = degrees, clamped = angle, "angle clamped");
        }
        self.transport.send_line(&protocol::servo_angle(angle)).await?;
        let previous = self.state.angle;
        self.state.angle = angle;
        info!(angle, previous, "servo moved");
        Ok(angle)
    }

    /// Name of the underlying transport.
    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }
}
