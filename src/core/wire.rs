/*!
 * Wire format for partition results and worker invocations
 *
 * The JSON layout matches what workflow engines hand to worker invocations:
 *
 * ```text
 * {
 *   "s3-work-1": {
 *     "cur_payload": 0,
 *     "work_size_in_mb": 12.5,
 *     "num_payloads": 1,
 *     "payloads": [
 *       {
 *         "payload_size_in_mb": 12.5,
 *         "payload_files": [
 *           {"source_s3_bucket": "...", "source_s3_path": "...",
 *            "target_s3_bucket": "...", "target_s3_path": "...",
 *            "file_size_in_mb": 12.5}
 *         ]
 *       }
 *     ]
 *   }
 * }
 * ```
 *
 * Megabyte figures are informational. Exact byte counts travel alongside
 * them in `*_bytes` fields; documents without those fields fall back to the
 * megabyte values.
 */

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::partition::PartitionResult;
use super::payload::{Payload, WorkAssignment};
use super::task::{ObjectLocation, Task};
use crate::config::BYTES_PER_MB;
use crate::error::Result;

/// Key prefix of each worker entry in a work set
pub const WORKER_KEY_PREFIX: &str = "s3-work-";

fn to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB as f64
}

fn from_mb(mb: f64) -> u64 {
    if mb.is_finite() && mb > 0.0 {
        (mb * BYTES_PER_MB as f64).round() as u64
    } else {
        0
    }
}

/// One file to transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub source_s3_bucket: String,
    pub source_s3_path: String,
    pub target_s3_bucket: String,
    pub target_s3_path: String,
    pub file_size_in_mb: f64,
    #[serde(default)]
    pub file_size_bytes: Option<u64>,
}

impl FileRecord {
    pub fn size_bytes(&self) -> u64 {
        self.file_size_bytes
            .unwrap_or_else(|| from_mb(self.file_size_in_mb))
    }

    pub fn to_task(&self) -> Task {
        Task::new(
            ObjectLocation::new(&self.source_s3_bucket, &self.source_s3_path),
            ObjectLocation::new(&self.target_s3_bucket, &self.target_s3_path),
            self.size_bytes(),
        )
    }
}

impl From<&Task> for FileRecord {
    fn from(task: &Task) -> Self {
        Self {
            source_s3_bucket: task.source().bucket.clone(),
            source_s3_path: task.source().key.clone(),
            target_s3_bucket: task.destination().bucket.clone(),
            target_s3_path: task.destination().key.clone(),
            file_size_in_mb: to_mb(task.size_bytes()),
            file_size_bytes: Some(task.size_bytes()),
        }
    }
}

/// One payload as carried between invocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadRecord {
    pub payload_size_in_mb: f64,
    #[serde(default)]
    pub payload_size_bytes: Option<u64>,
    pub payload_files: Vec<FileRecord>,
}

impl PayloadRecord {
    pub fn size_bytes(&self) -> u64 {
        self.payload_size_bytes
            .unwrap_or_else(|| self.payload_files.iter().map(FileRecord::size_bytes).sum())
    }
}

impl From<&Payload> for PayloadRecord {
    fn from(payload: &Payload) -> Self {
        Self {
            payload_size_in_mb: to_mb(payload.current_size_bytes()),
            payload_size_bytes: Some(payload.current_size_bytes()),
            payload_files: payload.tasks().iter().map(FileRecord::from).collect(),
        }
    }
}

/// A worker's assignment plus its payload cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerState {
    /// Index of the next payload to process; only ever moves forward
    pub cur_payload: usize,
    pub work_size_in_mb: f64,
    #[serde(default)]
    pub work_size_bytes: Option<u64>,
    pub num_payloads: usize,
    pub payloads: Vec<PayloadRecord>,
}

impl WorkerState {
    /// Fresh state for an assignment, cursor at the first payload
    pub fn new(assignment: &WorkAssignment) -> Self {
        let payloads: Vec<PayloadRecord> =
            assignment.payloads().iter().map(PayloadRecord::from).collect();
        Self {
            cur_payload: 0,
            work_size_in_mb: to_mb(assignment.total_size_bytes()),
            work_size_bytes: Some(assignment.total_size_bytes()),
            num_payloads: payloads.len(),
            payloads,
        }
    }

    /// True once every payload has been processed
    pub fn is_done(&self) -> bool {
        self.cur_payload >= self.num_payloads
    }

    /// Payload at the cursor, if any remain
    pub fn current_payload(&self) -> Option<&PayloadRecord> {
        if self.is_done() {
            None
        } else {
            self.payloads.get(self.cur_payload)
        }
    }

    pub fn work_size_bytes(&self) -> u64 {
        self.work_size_bytes
            .unwrap_or_else(|| self.payloads.iter().map(PayloadRecord::size_bytes).sum())
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Outcome status reported after each invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    /// Payloads remain; invoke again
    Processing,
    /// Cursor reached the payload count
    Done,
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationStatus::Processing => write!(f, "processing"),
            InvocationStatus::Done => write!(f, "done"),
        }
    }
}

/// What a worker invocation returns: its status next to the updated state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub status: InvocationStatus,
    #[serde(flatten)]
    pub state: WorkerState,
}

/// All workers' states, keyed by 1-based ordinal
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkSet {
    workers: Vec<(usize, WorkerState)>,
}

impl WorkSet {
    pub fn from_partition(result: &PartitionResult) -> Self {
        Self {
            workers: result
                .iter()
                .map(|work| (work.ordinal(), WorkerState::new(work)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn get(&self, ordinal: usize) -> Option<&WorkerState> {
        self.workers
            .iter()
            .find(|(o, _)| *o == ordinal)
            .map(|(_, state)| state)
    }

    /// Replace a worker's state, e.g. after an invocation advanced it
    pub fn set(&mut self, ordinal: usize, state: WorkerState) {
        match self.workers.iter_mut().find(|(o, _)| *o == ordinal) {
            Some(entry) => entry.1 = state,
            None => {
                self.workers.push((ordinal, state));
                self.workers.sort_by_key(|(o, _)| *o);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &WorkerState)> {
        self.workers.iter().map(|(o, s)| (*o, s))
    }

    pub fn into_states(self) -> Vec<(usize, WorkerState)> {
        self.workers
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Serialize for WorkSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.workers.len()))?;
        for (ordinal, state) in &self.workers {
            map.serialize_entry(&format!("{}{}", WORKER_KEY_PREFIX, ordinal), state)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for WorkSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, WorkerState>::deserialize(deserializer)?;
        let mut workers = Vec::with_capacity(raw.len());
        for (key, state) in raw {
            let ordinal = key
                .strip_prefix(WORKER_KEY_PREFIX)
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n > 0 && format!("{}{}", WORKER_KEY_PREFIX, n) == key)
                .ok_or_else(|| D::Error::custom(format!("invalid worker key '{}'", key)))?;
            workers.push((ordinal, state));
        }
        workers.sort_by_key(|(o, _)| *o);
        Ok(Self { workers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::partition::partition;

    fn task(name: &str, size: u64) -> Task {
        Task::new(
            ObjectLocation::new("src", format!("source/{}", name)),
            ObjectLocation::new("dst", format!("target/{}", name)),
            size,
        )
    }

    #[test]
    fn test_worker_state_layout() {
        let tasks = vec![task("a.mp4", 3 * BYTES_PER_MB)];
        let result = partition(tasks, 1, 10 * BYTES_PER_MB).unwrap();
        let state = WorkerState::new(result.get(1).unwrap());
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(value["cur_payload"], 0);
        assert_eq!(value["num_payloads"], 1);
        assert_eq!(value["work_size_in_mb"], 3.0);
        let file = &value["payloads"][0]["payload_files"][0];
        assert_eq!(file["source_s3_bucket"], "src");
        assert_eq!(file["target_s3_path"], "target/a.mp4");
        assert_eq!(file["file_size_in_mb"], 3.0);
        assert_eq!(file["file_size_bytes"], 3 * BYTES_PER_MB);
    }

    #[test]
    fn test_work_set_keys_in_ordinal_order() {
        let tasks = (0..12).map(|i| task(&format!("{}.jpg", i), 10 + i)).collect();
        let result = partition(tasks, 11, 1_000).unwrap();
        let json = WorkSet::from_partition(&result).to_json_string().unwrap();

        let pos2 = json.find("\"s3-work-2\"").unwrap();
        let pos10 = json.find("\"s3-work-10\"").unwrap();
        assert!(pos2 < pos10);

        let parsed = WorkSet::from_json_str(&json).unwrap();
        let ordinals: Vec<_> = parsed.iter().map(|(o, _)| o).collect();
        assert_eq!(ordinals, (1..=11).collect::<Vec<_>>());
    }

    #[test]
    fn test_legacy_document_without_byte_fields() {
        let json = r#"{
            "cur_payload": 0,
            "work_size_in_mb": 1.5,
            "num_payloads": 1,
            "payloads": [{
                "payload_size_in_mb": 1.5,
                "payload_files": [{
                    "source_s3_bucket": "in", "source_s3_path": "source/a.zip",
                    "target_s3_bucket": "out", "target_s3_path": "target/a.zip",
                    "file_size_in_mb": 1.5
                }]
            }]
        }"#;
        let state = WorkerState::from_json_str(json).unwrap();
        let record = &state.payloads[0].payload_files[0];
        assert_eq!(record.size_bytes(), 1_572_864);
        assert_eq!(state.work_size_bytes(), 1_572_864);
        assert_eq!(record.to_task().destination().key, "target/a.zip");
    }

    #[test]
    fn test_invalid_worker_key_rejected() {
        let json = r#"{"worker-1": {"cur_payload": 0, "work_size_in_mb": 0.0, "num_payloads": 0, "payloads": []}}"#;
        assert!(WorkSet::from_json_str(json).is_err());
    }

    #[test]
    fn test_non_canonical_worker_keys_rejected() {
        let state =
            r#"{"cur_payload": 0, "work_size_in_mb": 0.0, "num_payloads": 0, "payloads": []}"#;
        for key in ["s3-work-01", "s3-work-+1", "s3-work- 1", "s3-work-0"] {
            let json = format!(r#"{{"{}": {}}}"#, key, state);
            assert!(WorkSet::from_json_str(&json).is_err(), "{} accepted", key);
        }

        // Aliases of one ordinal would otherwise collapse into duplicate workers
        let json = format!(r#"{{"s3-work-1": {0}, "s3-work-01": {0}, "s3-work-+1": {0}}}"#, state);
        assert!(WorkSet::from_json_str(&json).is_err());

        let json = format!(r#"{{"s3-work-1": {0}, "s3-work-10": {0}}}"#, state);
        let work_set = WorkSet::from_json_str(&json).unwrap();
        assert_eq!(work_set.len(), 2);
        assert!(work_set.get(10).is_some());
    }

    #[test]
    fn test_invocation_response_flattens_state() {
        let result = partition(Vec::new(), 1, 1).unwrap();
        let response = InvocationResponse {
            status: InvocationStatus::Done,
            state: WorkerState::new(result.get(1).unwrap()),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "done");
        assert_eq!(value["num_payloads"], 1);
    }

    #[test]
    fn test_cursor_helpers() {
        let result = partition(vec![task("a", 5), task("b", 5)], 1, 5).unwrap();
        let mut state = WorkerState::new(result.get(1).unwrap());
        assert_eq!(state.num_payloads, 2);
        assert!(state.current_payload().is_some());
        state.cur_payload = 2;
        assert!(state.is_done());
        assert!(state.current_payload().is_none());
    }
}
