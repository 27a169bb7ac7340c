/*!
 * Payloads and per-worker assignments
 *
 * A payload is the unit of work one worker invocation processes. Its
 * capacity bounds how long an invocation runs; a worker's assignment is the
 * ordered list of payloads it will work through, one invocation each.
 */

use super::task::Task;

/// Size-bounded, append-only batch of tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    tasks: Vec<Task>,
    current_size_bytes: u64,
    capacity_bytes: u64,
}

impl Payload {
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            tasks: Vec::new(),
            current_size_bytes: 0,
            capacity_bytes,
        }
    }

    /// Whether a task of `size_bytes` may be appended
    ///
    /// An empty payload accepts anything, so a task larger than the capacity
    /// still gets a payload of its own.
    pub fn has_capacity(&self, size_bytes: u64) -> bool {
        self.tasks.is_empty()
            || self
                .current_size_bytes
                .checked_add(size_bytes)
                .is_some_and(|total| total <= self.capacity_bytes)
    }

    pub(crate) fn push(&mut self, task: Task) {
        self.current_size_bytes += task.size_bytes();
        self.tasks.push(task);
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn current_size_bytes(&self) -> u64 {
        self.current_size_bytes
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Everything one worker has to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkAssignment {
    ordinal: usize,
    payloads: Vec<Payload>,
    total_size_bytes: u64,
}

impl WorkAssignment {
    /// New assignment holding a single empty, open payload
    pub fn new(ordinal: usize, payload_capacity_bytes: u64) -> Self {
        Self {
            ordinal,
            payloads: vec![Payload::new(payload_capacity_bytes)],
            total_size_bytes: 0,
        }
    }

    /// Append a task to the open payload, opening a new one if it is full
    pub fn assign(&mut self, task: Task) {
        let size = task.size_bytes();
        if !self.open_payload().has_capacity(size) {
            let capacity = self.open_payload().capacity_bytes();
            self.payloads.push(Payload::new(capacity));
        }
        if let Some(open) = self.payloads.last_mut() {
            open.push(task);
        }
        self.total_size_bytes += size;
    }

    /// 1-based worker ordinal
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    /// The payload currently receiving tasks (always the last one)
    pub fn open_payload(&self) -> &Payload {
        // payloads is never empty: new() seeds it and nothing removes entries
        &self.payloads[self.payloads.len() - 1]
    }

    pub fn payload_count(&self) -> usize {
        self.payloads.len()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes
    }

    pub fn task_count(&self) -> usize {
        self.payloads.iter().map(Payload::len).sum()
    }

    /// All tasks in payload order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.payloads.iter().flat_map(|p| p.tasks().iter())
    }
}
