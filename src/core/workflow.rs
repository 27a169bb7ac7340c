/*!
 * Workflow driver: invokes each worker until its assignment is done
 *
 * Retries a failed invocation with backoff when the failure is transient.
 * Replaying an invocation is safe because every transfer re-checks the
 * destination before acting.
 */

use std::path::Path;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::transfer::{Invocation, TransferExecutor, TransferOutcome};
use super::wire::{InvocationStatus, WorkSet, WorkerState};
use crate::error::{ParcelError, Result};

/// Retry behaviour for failed invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.exponential_backoff {
            self.initial_delay
                .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        } else {
            self.initial_delay
        }
    }
}

/// Summary of one worker driven to completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerReport {
    pub ordinal: usize,
    pub invocations: usize,
    pub retries: usize,
    pub copied: usize,
    pub moved: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub elapsed: Duration,
    /// Final state (cursor at the payload count)
    pub state: Option<WorkerState>,
}

impl WorkerReport {
    fn record(&mut self, invocation: &Invocation) {
        self.invocations += 1;
        self.elapsed += invocation.elapsed;
        for outcome in &invocation.outcomes {
            match outcome {
                TransferOutcome::Copied => self.copied += 1,
                TransferOutcome::Moved => self.moved += 1,
                TransferOutcome::Skipped => self.skipped += 1,
                TransferOutcome::Deleted => self.deleted += 1,
            }
        }
    }

    pub fn files(&self) -> usize {
        self.copied + self.moved + self.skipped + self.deleted
    }
}

/// Run one invocation, retrying transient failures per `policy`
pub async fn invoke_with_retry(
    executor: &TransferExecutor,
    state: &WorkerState,
    policy: &RetryPolicy,
) -> Result<(Invocation, u32)> {
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            warn!(
                attempt,
                max_retries = policy.max_retries,
                payload = state.cur_payload,
                "Retrying invocation after {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
        }

        match executor.process_next_payload(state.clone()).await {
            Ok(invocation) => return Ok((invocation, attempt)),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Invoke the executor for one worker until its status is `Done`
pub async fn drive_worker(
    executor: &TransferExecutor,
    ordinal: usize,
    state: WorkerState,
    policy: &RetryPolicy,
) -> Result<WorkerReport> {
    let mut report = WorkerReport {
        ordinal,
        ..Default::default()
    };
    let mut state = state;

    loop {
        let previous_cursor = state.cur_payload;
        let (invocation, retries) = match invoke_with_retry(executor, &state, policy).await {
            Ok(result) => result,
            Err(e) => {
                error!(worker = ordinal, payload = previous_cursor, "Worker failed: {}", e);
                return Err(e);
            }
        };
        debug_assert!(invocation.state.cur_payload >= previous_cursor);

        report.retries += retries as usize;
        report.record(&invocation);
        let status = invocation.status;
        state = invocation.state;

        if status == InvocationStatus::Done {
            break;
        }
    }

    info!(
        worker = ordinal,
        invocations = report.invocations,
        files = report.files(),
        copied = report.copied,
        moved = report.moved,
        skipped = report.skipped,
        deleted = report.deleted,
        "Worker finished"
    );
    report.state = Some(state);
    Ok(report)
}

/// Drive every worker of `work_set` concurrently; reports come back in
/// ordinal order
///
/// All workers run to completion or failure; the error of the lowest-ordinal
/// failing worker is returned. A worker task that panics counts as a failure
/// of that worker and does not cancel the others.
pub async fn drive_all(
    executor: &TransferExecutor,
    work_set: WorkSet,
    policy: RetryPolicy,
) -> Result<Vec<WorkerReport>> {
    let handles: Vec<(usize, JoinHandle<Result<WorkerReport>>)> = work_set
        .into_states()
        .into_iter()
        .map(|(ordinal, state)| {
            let executor = executor.clone();
            let handle = tokio::spawn(async move {
                drive_worker(&executor, ordinal, state, &policy).await
            });
            (ordinal, handle)
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    let mut failures: Vec<(usize, ParcelError)> = Vec::new();
    for (ordinal, handle) in handles {
        match handle.await {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(e)) => failures.push((ordinal, e)),
            Err(e) => {
                error!(worker = ordinal, "Worker task aborted: {}", e);
                let message = format!("worker {} task failed: {}", ordinal, e);
                failures.push((ordinal, ParcelError::Io(std::io::Error::other(message))));
            }
        }
    }

    if let Some((_, err)) = failures.into_iter().min_by_key(|(ordinal, _)| *ordinal) {
        return Err(err);
    }

    reports.sort_by_key(|r| r.ordinal);
    Ok(reports)
}

/// Run one invocation for `ordinal` against the work set stored at `path`
///
/// The file is rewritten with the advanced cursor only after the invocation
/// succeeds; a failed invocation leaves it untouched so the same payload can be
/// replayed.
pub async fn advance_work_set_file(
    executor: &TransferExecutor,
    path: &Path,
    ordinal: usize,
) -> Result<Invocation> {
    let mut work_set = WorkSet::from_json_str(&std::fs::read_to_string(path)?)?;
    let state = work_set.get(ordinal).cloned().ok_or_else(|| {
        ParcelError::InvalidArgument(format!(
            "worker {} is not part of the work set ({} workers)",
            ordinal,
            work_set.len()
        ))
    })?;

    let invocation = executor.process_next_payload(state).await?;
    work_set.set(ordinal, invocation.state.clone());
    std::fs::write(path, work_set.to_json_string()?)?;
    Ok(invocation)
}
