//! Batch execution.
//!
//! [`Dispatcher::execute`] runs decoded records strictly in order. Discrete
//! and angle records go straight to the actuator channel; visual points go
//! through the servo controller. Whatever a record does, its delay is slept
//! afterwards. A record that failed to decode or an alignment that failed is
//! reported and the batch moves on; only a transport failure stops it.

use crate::actuator::ActuatorChannel;
use crate::clock::Clock;
use crate::command::{CommandKind, CommandRecord, DecodeError};
use crate::error::AppResult;
use crate::servo::{AlignmentResult, ServoController};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of one visual-point record.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentOutcome {
    /// Position of the record in the batch
    pub index: usize,
    /// Target label
    pub label: String,
    /// What the servo loop reported
    pub result: AlignmentResult,
}

/// Summary of one executed batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Records that ran (including failed alignments)
    pub executed: usize,
    /// Records skipped because they did not decode
    pub skipped: usize,
    /// Every visual-point result, in batch order
    pub alignments: Vec<AlignmentOutcome>,
}

impl BatchReport {
    /// Number of alignments that did not converge.
    pub fn failed_alignments(&self) -> usize {
        self.alignments
            .iter()
            .filter(|outcome| !outcome.result.is_aligned())
            .count()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} executed, {} skipped, {}/{} aligned",
            self.executed,
            self.skipped,
            self.alignments.len() - self.failed_alignments(),
            self.alignments.len()
        )
    }
}

/// Routes records to the actuator channel or the servo controller.
pub struct Dispatcher {
    actuator: ActuatorChannel,
    servo: ServoController,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// Create a dispatcher owning the channel and the controller.
    pub fn new(actuator: ActuatorChannel, servo: ServoController, clock: Arc<dyn Clock>) -> Self {
        Self {
            actuator,
            servo,
            clock,
        }
    }

    /// The actuator channel (for state inspection).
    pub fn actuator(&self) -> &ActuatorChannel {
        &self.actuator
    }

    /// Execute a decoded batch.
    ///
    /// # Errors
    /// A transport failure. Records after the failing one are not run.
    pub async fn execute(
        &mut self,
        batch: &[Result<CommandRecord, DecodeError>],
    ) -> AppResult<BatchReport> {
        let mut report = BatchReport::default();
        info!(records = batch.len(), "executing batch");

        for (index, slot) in batch.iter().enumerate() {
            let record = match slot {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "skipping record");
                    report.skipped += 1;
                    continue;
                }
            };

            if let Some(outcome) = self.run_record(index, record).await? {
                report.alignments.push(outcome);
            }
            report.executed += 1;

            if !record.delay.is_zero() {
                self.clock.sleep(record.delay).await;
            }
        }

        info!(%report, "batch complete");
        Ok(report)
    }

    async fn run_record(
        &mut self,
        index: usize,
        record: &CommandRecord,
    ) -> AppResult<Option<AlignmentOutcome>> {
        match &record.kind {
            CommandKind::Discrete(text) => {
                self.actuator.send_discrete(text).await?;
                Ok(None)
            }
            CommandKind::Angle(degrees) => {
                self.actuator.send_discrete(&record.kind.to_string()).await?;
                self.actuator.send_angle(i64::from(*degrees)).await?;
                Ok(None)
            }
            CommandKind::VisualPoint { target, label } => {
                let result = self.servo.align(&mut self.actuator, *target, label).await?;
                match &result {
                    AlignmentResult::Aligned { steps, .. } => {
                        info!(label = label.as_str(), steps, "pointing at target");
                    }
                    AlignmentResult::Failed(reason) => {
                        error!(label = label.as_str(), %reason, "alignment failed, continuing batch");
                    }
                }
                Ok(Some(AlignmentOutcome {
                    index,
                    label: label.clone(),
                    result,
                }))
            }
        }
    }
}
