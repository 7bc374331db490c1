//! Interactive interpreter loop.
//!
//! Each input line is a request. The [`IntentCompiler`] turns it into batch
//! text, the batch is decoded and the [`Dispatcher`] runs it. Malformed
//! batches and compiler failures are reported and the loop keeps going; a
//! transport failure ends the session because the device state is unknown.

use crate::clock::CancelFlag;
use crate::command::parse_batch;
use crate::dispatch::{BatchReport, Dispatcher};
use crate::error::AppResult;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info, warn};

/// Input that ends the session.
pub const QUIT: &str = "quit";

/// Turns an operator request into batch text.
#[async_trait]
pub trait IntentCompiler: Send + Sync {
    /// Produce the JSON batch (optionally fenced) for `request`.
    async fn compile(&self, request: &str) -> AppResult<String>;
}

/// Treats the request itself as the batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompiler;

#[async_trait]
impl IntentCompiler for PassthroughCompiler {
    async fn compile(&self, request: &str) -> AppResult<String> {
        Ok(request.to_string())
    }
}

/// Totals over one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Batches that were decoded and run
    pub batches: usize,
    /// Requests rejected before execution
    pub rejected: usize,
}

/// A dispatcher fed by an intent compiler.
pub struct Session {
    dispatcher: Dispatcher,
    compiler: Box<dyn IntentCompiler>,
    cancel: Option<CancelFlag>,
}

impl Session {
    /// Build a session.
    pub fn new(dispatcher: Dispatcher, compiler: Box<dyn IntentCompiler>) -> Self {
        Self {
            dispatcher,
            compiler,
            cancel: None,
        }
    }

    /// Stop reading requests once `flag` is raised.
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one request. `Ok(None)` means it was rejected and reported.
    ///
    /// # Errors
    /// Transport failures only.
    pub async fn handle(&mut self, request: &str) -> AppResult<Option<BatchReport>> {
        let text = match self.compiler.compile(request).await {
            Ok(text) => text,
            Err(e) if e.is_transport_failure() => return Err(e),
            Err(e) => {
                error!(error = %e, "intent compiler failed");
                return Ok(None);
            }
        };

        let batch = match parse_batch(&text) {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "malformed batch, nothing executed");
                return Ok(None);
            }
        };

        self.dispatcher.execute(&batch).await.map(Some)
    }

    /// Read requests until `quit`, end of input or cancellation.
    ///
    /// A line that is not valid UTF-8 is reported and counted as rejected.
    /// A raised cancel flag ends the session at once while it waits for
    /// input, or after the batch in progress.
    ///
    /// # Errors
    /// Transport failures and read errors on `reader`.
    pub async fn run<R>(&mut self, mut reader: R) -> AppResult<SessionSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut summary = SessionSummary::default();
        let cancel = self.cancel.clone();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => read?,
                () = wait_for_cancel(cancel.as_ref()) => {
                    warn!("session interrupted");
                    return Ok(summary);
                }
            };
            if read == 0 {
                break;
            }
            if self.interrupted() {
                warn!("session interrupted");
                return Ok(summary);
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(e) => {
                    error!(error = %e, bytes = buf.len(), "input line is not valid UTF-8, ignored");
                    summary.rejected += 1;
                    continue;
                }
            };
            let request = line.trim();
            if request.is_empty() {
                continue;
            }
            if request.eq_ignore_ascii_case(QUIT) {
                info!("session ended by operator");
                return Ok(summary);
            }

            match self.handle(request).await {
                Ok(Some(_)) => summary.batches += 1,
                Ok(None) => summary.rejected += 1,
                Err(e) => {
                    error!(error = %e, "transport failure, ending session");
                    return Err(e);
                }
            }

            if self.interrupted() {
                warn!("session interrupted");
                return Ok(summary);
            }
        }

        warn!("input closed");
        Ok(summary)
    }

    fn interrupted(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

async fn wait_for_cancel(flag: Option<&CancelFlag>) {
    match flag {
        Some(flag) => flag.cancelled().await,
        None => std::future::pending().await,
    }
}
