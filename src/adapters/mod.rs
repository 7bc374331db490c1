//! Transport adapters for the actuator link
//!
//! An adapter moves one command line to the device. It knows nothing about
//! what the line means; the actuator channel owns that.

pub mod mock_adapter;
pub mod serial_adapter;

pub use mock_adapter::MockTransport;
pub use serial_adapter::SerialTransport;

use crate::error::AppResult;
use async_trait::async_trait;

/// Outbound, fire-and-forget line transport.
#[async_trait]
pub trait Transport: Send {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Write one command. The line terminator is added by the adapter.
    ///
    /// An error means the link can no longer be trusted.
    async fn send_line(&mut self, line: &str) -> AppResult<()>;
}
