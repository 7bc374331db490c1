//! Mock transport for testing and dry runs
//!
//! Records every line instead of writing it anywhere. It provides:
//! - A call log shared between clones, for test verification
//! - Controllable failure injection
//!
//! # Example
//!
//! ```
//! use visual_servo::adapters::{MockTransport, Transport};
//!
//! # tokio_test_block_on(async {
//! let mut transport = MockTransport::new();
//! let log = transport.clone();
//! transport.send_line("LED1_ON").await.unwrap();
//! assert_eq!(log.lines(), vec!["LED1_ON".to_string()]);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use super::Transport;
use crate::error::{AppResult, ServoError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

/// In-memory transport.
#[derive(Clone, Default)]
pub struct MockTransport {
    lines: Arc<Mutex<Vec<String>>>,
    should_fail_next: Arc<AtomicBool>,
    echo: bool,
}

impl MockTransport {
    /// Create a new mock transport with an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log every line at info level (used by `--dry-run`).
    pub fn echoing(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Make the next write fail
    pub fn inject_next_failure(&self) {
        self.should_fail_next.store(true, Ordering::SeqCst);
    }

    /// Every line written so far, in order
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Most recent line, if any
    pub fn last_line(&self) -> Option<String> {
        self.lines.lock().ok().and_then(|l| l.last().cloned())
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_line(&mut self, line: &str) -> AppResult<()> {
        if self.should_fail_next.swap(false, Ordering::SeqCst) {
            return Err(ServoError::Transport {
                port: "mock".to_string(),
                reason: "injected failure".to_string(),
            });
        }

        if self.echo {
            info!(command = line, "dry run");
        }

        self.lines
            .lock()
            .map_err(|_| ServoError::Transport {
                port: "mock".to_string(),
                reason: "log poisoned".to_string(),
            })?
            .push(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_in_order() {
        let mut transport = MockTransport::new();
        transport.send_line("LED1_ON").await.unwrap();
        transport.send_line("SERVO_ANGLE_45").await.unwrap();
        assert_eq!(transport.lines(), vec!["LED1_ON", "SERVO_ANGLE_45"]);
        assert_eq!(transport.last_line().as_deref(), Some("SERVO_ANGLE_45"));
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let mut transport = MockTransport::new();
        transport.inject_next_failure();
        let err = transport.send_line("LED1_ON").await.unwrap_err();
        assert!(err.is_transport_failure());
        assert!(transport.lines().is_empty());

        transport.send_line("LED1_ON").await.unwrap();
        assert_eq!(transport.lines().len(), 1);
    }
}
