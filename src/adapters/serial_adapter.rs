//! Serial adapter for the servo board
//!
//! Wraps the `serialport` crate. Writes run on Tokio's blocking pool and are
//! bounded by `write_timeout_ms`; a write that fails or times out is surfaced
//! to the caller, never retried.

use super::Transport;
use crate::config::SerialSettings;
use crate::error::{AppResult, ServoError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

#[cfg(feature = "instrument_serial")]
use serialport::SerialPort;
#[cfg(feature = "instrument_serial")]
use std::sync::Arc;
#[cfg(feature = "instrument_serial")]
use tokio::sync::Mutex;

/// Serial transport
pub struct SerialTransport {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    port_name: String,

    /// Appended to every command
    line_terminator: String,

    /// Upper bound for one write
    write_timeout: Duration,

    /// The open port (behind Arc<Mutex> so the blocking task can own a handle)
    #[cfg(feature = "instrument_serial")]
    port: Arc<Mutex<Box<dyn SerialPort>>>,
}

impl SerialTransport {
    /// Open the port and wait for the board to come out of reset.
    ///
    /// # Errors
    /// Returns [`ServoError::Transport`] if the port cannot be opened, or
    /// [`ServoError::SerialFeatureDisabled`] when built without serial support.
    pub async fn open(settings: &SerialSettings) -> AppResult<Self> {
        #[cfg(feature = "instrument_serial")]
        {
            let write_timeout = Duration::from_millis(settings.write_timeout_ms);
            let port = serialport::new(&settings.port, settings.baud_rate)
                .timeout(write_timeout)
                .open()
                .map_err(|e| ServoError::Transport {
                    port: settings.port.clone(),
                    reason: format!("failed to open at {} baud: {e}", settings.baud_rate),
                })?;

            info!(
                port = %settings.port,
                baud_rate = settings.baud_rate,
                "serial port opened"
            );

            let settle = Duration::from_millis(settings.settle_after_open_ms);
            if !settle.is_zero() {
                debug!(?settle, "waiting for board reset");
                tokio::time::sleep(settle).await;
            }

            Ok(Self {
                port_name: settings.port.clone(),
                line_terminator: settings.line_terminator.clone(),
                write_timeout,
                port: Arc::new(Mutex::new(port)),
            })
        }

        #[cfg(not(feature = "instrument_serial"))]
        {
            let _ = settings;
            Err(ServoError::SerialFeatureDisabled)
        }
    }

    fn write_error(&self, reason: impl std::fmt::Display) -> ServoError {
        ServoError::Transport {
            port: self.port_name.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.port_name
    }

    async fn send_line(&mut self, line: &str) -> AppResult<()> {
        #[cfg(feature = "instrument_serial")]
        {
            let payload = format!("{line}{}", self.line_terminator);
            let port = self.port.clone();

            // Execute blocking serial I/O on dedicated thread
            let task = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
                use std::io::Write;

                let mut port_guard = port.blocking_lock();
                port_guard.write_all(payload.as_bytes())?;
                port_guard.flush()
            });

            match tokio::time::timeout(self.write_timeout, task).await {
                Ok(Ok(Ok(()))) => {
                    debug!(port = %self.port_name, command = line, "sent serial command");
                    Ok(())
                }
                Ok(Ok(Err(e))) => Err(self.write_error(e)),
                Ok(Err(join)) => Err(self.write_error(format!("serial I/O task failed: {join}"))),
                Err(_) => Err(ServoError::TransportTimeout {
                    port: self.port_name.clone(),
                    timeout_ms: self.write_timeout.as_millis() as u64,
                }),
            }
        }

        #[cfg(not(feature = "instrument_serial"))]
        {
            let _ = line;
            Err(ServoError::SerialFeatureDisabled)
        }
    }
}
