/*!
 * Idempotent copy/move primitives and the per-invocation payload executor
 *
 * Every transfer compares source and destination sizes before acting, so a
 * payload that was partly processed by a failed invocation can be replayed
 * as a whole without transferring anything twice.
 */

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::task::{ObjectLocation, Task};
use super::wire::{InvocationResponse, InvocationStatus, WorkerState};
use crate::error::{ParcelError, Result};
use crate::storage::ObjectStore;

/// What a single transfer actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOutcome {
    /// Destination was written from the source
    Copied,
    /// Destination was written and the source removed
    Moved,
    /// Nothing to do: destination already matches (or source already moved)
    Skipped,
    /// Destination already matched; only the source was removed
    Deleted,
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOutcome::Copied => write!(f, "copied"),
            TransferOutcome::Moved => write!(f, "moved"),
            TransferOutcome::Skipped => write!(f, "skipped"),
            TransferOutcome::Deleted => write!(f, "deleted"),
        }
    }
}

/// Requested transfer kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TransferOperation {
    #[default]
    Copy,
    Move,
}

impl FromStr for TransferOperation {
    type Err = ParcelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "copy" => Ok(TransferOperation::Copy),
            "move" => Ok(TransferOperation::Move),
            other => Err(ParcelError::InvalidOperationType(other.to_string())),
        }
    }
}

impl TryFrom<String> for TransferOperation {
    type Error = ParcelError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TransferOperation> for String {
    fn from(op: TransferOperation) -> Self {
        op.to_string()
    }
}

impl fmt::Display for TransferOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOperation::Copy => write!(f, "copy"),
            TransferOperation::Move => write!(f, "move"),
        }
    }
}

/// Copy `source` to `destination` unless the destination already has the same size
pub async fn copy_if_absent(
    store: &dyn ObjectStore,
    source: &ObjectLocation,
    destination: &ObjectLocation,
) -> Result<TransferOutcome> {
    if source == destination {
        warn!("{} maps onto itself, leaving it in place", source);
        return Ok(TransferOutcome::Skipped);
    }

    let source_size = store
        .object_size(source)
        .await?
        .ok_or_else(|| ParcelError::MissingSourceFile {
            from: source.clone(),
            to: destination.clone(),
        })?;

    let destination_size = store.object_size(destination).await?;
    if destination_size == Some(source_size) {
        debug!("{} already present at {}, skipping", source, destination);
        return Ok(TransferOutcome::Skipped);
    }

    timed_copy(store, source, destination).await?;
    Ok(TransferOutcome::Copied)
}

/// Move `source` to `destination`, copying only when the destination differs
///
/// A missing source is fine as long as the destination exists: the object was
/// moved by an earlier attempt. An object whose destination is itself is
/// never touched, since deleting it would lose the only copy.
pub async fn move_if_absent(
    store: &dyn ObjectStore,
    source: &ObjectLocation,
    destination: &ObjectLocation,
) -> Result<TransferOutcome> {
    if source == destination {
        warn!("{} maps onto itself, leaving it in place", source);
        return Ok(TransferOutcome::Skipped);
    }

    let source_size = store.object_size(source).await?;
    let destination_size = store.object_size(destination).await?;

    match (source_size, destination_size) {
        (Some(src), dst) => {
            let outcome = if dst == Some(src) {
                TransferOutcome::Deleted
            } else {
                timed_copy(store, source, destination).await?;
                TransferOutcome::Moved
            };
            timed_delete(store, source).await?;
            Ok(outcome)
        }
        (None, Some(_)) => {
            debug!("{} already moved to {}", source, destination);
            Ok(TransferOutcome::Skipped)
        }
        (None, None) => Err(ParcelError::MissingSourceFile {
            from: source.clone(),
            to: destination.clone(),
        }),
    }
}

async fn timed_copy(
    store: &dyn ObjectStore,
    source: &ObjectLocation,
    destination: &ObjectLocation,
) -> Result<()> {
    info!("Copying {} into {}", source, destination);
    let start = Instant::now();
    store.copy_object(source, destination).await?;
    info!(
        elapsed_secs = start.elapsed().as_secs_f64(),
        "Copied {} into {}", source, destination
    );
    Ok(())
}

async fn timed_delete(store: &dyn ObjectStore, location: &ObjectLocation) -> Result<()> {
    info!("Deleting {}", location);
    let start = Instant::now();
    store.delete_object(location).await?;
    info!(elapsed_secs = start.elapsed().as_secs_f64(), "Deleted {}", location);
    Ok(())
}

/// Result of one worker invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub status: InvocationStatus,
    /// State with the cursor advanced past the processed payload
    pub state: WorkerState,
    /// Outcome per file of the processed payload, in payload order
    pub outcomes: Vec<TransferOutcome>,
    pub elapsed: Duration,
}

impl Invocation {
    /// The wire response handed back to the workflow engine
    pub fn response(&self) -> InvocationResponse {
        InvocationResponse {
            status: self.status,
            state: self.state.clone(),
        }
    }

    pub fn count(&self, outcome: TransferOutcome) -> usize {
        self.outcomes.iter().filter(|o| **o == outcome).count()
    }
}

/// Runs one payload per invocation against an injected store
#[derive(Clone)]
pub struct TransferExecutor {
    store: Arc<dyn ObjectStore>,
    operation: TransferOperation,
}

impl TransferExecutor {
    pub fn new(store: Arc<dyn ObjectStore>, operation: TransferOperation) -> Self {
        Self { store, operation }
    }

    pub fn operation(&self) -> TransferOperation {
        self.operation
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Transfer one task according to the configured operation
    pub async fn execute(&self, task: &Task) -> Result<TransferOutcome> {
        match self.operation {
            TransferOperation::Copy => {
                copy_if_absent(self.store.as_ref(), task.source(), task.destination()).await
            }
            TransferOperation::Move => {
                move_if_absent(self.store.as_ref(), task.source(), task.destination()).await
            }
        }
    }

    /// Process the payload at the cursor and advance the cursor by one
    ///
    /// A state whose cursor already reached the payload count is returned as
    /// `Done` untouched. Any transfer failure aborts the invocation and the
    /// cursor is not advanced, so a retry replays the whole payload.
    pub async fn process_next_payload(&self, state: WorkerState) -> Result<Invocation> {
        let start = Instant::now();

        if state.is_done() {
            debug!(cursor = state.cur_payload, "No payloads left");
            return Ok(Invocation {
                status: InvocationStatus::Done,
                state,
                outcomes: Vec::new(),
                elapsed: start.elapsed(),
            });
        }

        let cursor = state.cur_payload;
        let Some(payload) = state.payloads.get(cursor) else {
            return Err(ParcelError::InvalidArgument(format!(
                "worker state lists {} payloads but carries only {}",
                state.num_payloads,
                state.payloads.len()
            )));
        };
        info!(
            payload = cursor,
            payloads = state.num_payloads,
            files = payload.payload_files.len(),
            size_bytes = payload.size_bytes(),
            operation = %self.operation,
            "Processing payload"
        );

        let mut outcomes = Vec::with_capacity(payload.payload_files.len());
        for record in &payload.payload_files {
            let task = record.to_task();
            match self.execute(&task).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(payload = cursor, "Invocation aborted: {}", e);
                    return Err(e);
                }
            }
        }

        let mut state = state;
        state.cur_payload = cursor + 1;
        let status = if state.is_done() {
            InvocationStatus::Done
        } else {
            InvocationStatus::Processing
        };

        let elapsed = start.elapsed();
        info!(
            payload = cursor,
            elapsed_secs = elapsed.as_secs_f64(),
            status = %status,
            "Payload processed"
        );

        Ok(Invocation {
            status,
            state,
            outcomes,
            elapsed,
        })
    }
}
