/*!
 * Greedy, heap-balanced partitioning of tasks across workers
 *
 * Tasks are visited largest first and each one goes to the worker with the
 * least work so far. Within a worker, tasks fill the open payload until its
 * byte budget is reached, then a new payload is opened. The result is a
 * deterministic heuristic (LPT scheduling), not an optimal packing.
 *
 * ```
 * use parcel::core::partition::partition;
 * use parcel::core::task::{ObjectLocation, Task};
 *
 * let tasks = vec![
 *     Task::new(ObjectLocation::new("s", "a"), ObjectLocation::new("d", "a"), 500),
 *     Task::new(ObjectLocation::new("s", "b"), ObjectLocation::new("d", "b"), 400),
 * ];
 * let result = partition(tasks, 2, 10_000).unwrap();
 * assert_eq!(result.len(), 2);
 * assert_eq!(result.total_size_bytes(), 900);
 * ```
 */

use tracing::debug;

use super::heap;
use super::payload::WorkAssignment;
use super::task::Task;
use crate::error::{ParcelError, Result};

/// One work assignment per worker, indexed by 1-based ordinal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionResult {
    assignments: Vec<WorkAssignment>,
}

impl PartitionResult {
    /// Number of workers (always the requested worker count)
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Assignment of the worker with the given 1-based ordinal
    pub fn get(&self, ordinal: usize) -> Option<&WorkAssignment> {
        ordinal
            .checked_sub(1)
            .and_then(|index| self.assignments.get(index))
    }

    /// Assignments in ordinal order
    pub fn iter(&self) -> impl Iterator<Item = &WorkAssignment> {
        self.assignments.iter()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.assignments
            .iter()
            .map(WorkAssignment::total_size_bytes)
            .sum()
    }

    pub fn task_count(&self) -> usize {
        self.assignments.iter().map(WorkAssignment::task_count).sum()
    }

    /// Difference between the most and least loaded workers
    pub fn imbalance_bytes(&self) -> u64 {
        let max = self.assignments.iter().map(WorkAssignment::total_size_bytes).max();
        let min = self.assignments.iter().map(WorkAssignment::total_size_bytes).min();
        match (max, min) {
            (Some(max), Some(min)) => max - min,
            _ => 0,
        }
    }

    pub fn into_assignments(self) -> Vec<WorkAssignment> {
        self.assignments
    }
}

impl<'a> IntoIterator for &'a PartitionResult {
    type Item = &'a WorkAssignment;
    type IntoIter = std::slice::Iter<'a, WorkAssignment>;

    fn into_iter(self) -> Self::IntoIter {
        self.assignments.iter()
    }
}

/// Split `tasks` across `num_workers` workers in payloads of at most
/// `max_payload_bytes` (single oversized tasks excepted)
///
/// Ties between equal-sized tasks keep their input order, and ties between
/// equally loaded workers are broken by heap position, so identical input
/// always yields identical output.
pub fn partition(
    tasks: Vec<Task>,
    num_workers: usize,
    max_payload_bytes: u64,
) -> Result<PartitionResult> {
    if num_workers == 0 {
        return Err(ParcelError::InvalidArgument(
            "number of workers must be greater than zero".to_string(),
        ));
    }
    if max_payload_bytes == 0 {
        return Err(ParcelError::InvalidArgument(
            "maximum payload size must be greater than zero".to_string(),
        ));
    }

    let mut assignments: Vec<WorkAssignment> = (1..=num_workers)
        .map(|ordinal| WorkAssignment::new(ordinal, max_payload_bytes))
        .collect();
    let mut order = heap::identity(num_workers);

    let mut tasks = tasks;
    // sort_by is stable: equal sizes keep catalog order
    tasks.sort_by(|a, b| b.size_bytes().cmp(&a.size_bytes()));

    let task_count = tasks.len();
    for task in tasks {
        let target = order[0];
        assignments[target].assign(task);
        heap::sift_down_root(&mut order, |i| assignments[i].total_size_bytes());
    }

    let result = PartitionResult { assignments };
    debug!(
        tasks = task_count,
        workers = num_workers,
        max_payload_bytes,
        total_bytes = result.total_size_bytes(),
        imbalance_bytes = result.imbalance_bytes(),
        "Partitioned work"
    );
    Ok(result)
}
