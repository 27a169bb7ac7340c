use std::sync::Arc;

use parcel::core::wire::WorkerState;
use parcel::storage::StorageError;
use parcel::{
    partition, InvocationStatus, MemoryStore, ObjectLocation, ParcelError, Task, TransferExecutor,
    TransferOperation, TransferOutcome, WorkSet,
};

fn src(name: &str) -> ObjectLocation {
    ObjectLocation::new("ingest", format!("source/{}", name))
}

fn dst(name: &str) -> ObjectLocation {
    ObjectLocation::new("library", format!("video/{}", name))
}

/// One worker, payloads of two 10-byte files each
fn single_worker_state(store: &MemoryStore, names: &[&str]) -> WorkerState {
    let tasks: Vec<Task> = names
        .iter()
        .map(|name| {
            store.put(src(name), 10);
            Task::new(src(name), dst(name), 10)
        })
        .collect();
    let result = partition(tasks, 1, 20).unwrap();
    WorkSet::from_partition(&result).get(1).cloned().unwrap()
}

#[tokio::test]
async fn test_invocations_walk_the_cursor_to_done() {
    let store = MemoryStore::new();
    let state = single_worker_state(&store, &["a.mp4", "b.mp4", "c.mp4", "d.mp4", "e.mp4"]);
    assert_eq!(state.num_payloads, 3);

    let executor = TransferExecutor::new(Arc::new(store.clone()), TransferOperation::Copy);
    let mut state = state;
    let mut statuses = Vec::new();
    loop {
        let before = state.cur_payload;
        let invocation = executor.process_next_payload(state).await.unwrap();
        assert_eq!(invocation.state.cur_payload, before + 1);
        statuses.push(invocation.status);
        state = invocation.state;
        if invocation.status == InvocationStatus::Done {
            break;
        }
    }

    assert_eq!(
        statuses,
        vec![
            InvocationStatus::Processing,
            InvocationStatus::Processing,
            InvocationStatus::Done
        ]
    );
    for name in ["a.mp4", "b.mp4", "c.mp4", "d.mp4", "e.mp4"] {
        assert!(store.contains(&dst(name)));
    }

    // A finished state stays finished
    let again = executor.process_next_payload(state.clone()).await.unwrap();
    assert_eq!(again.status, InvocationStatus::Done);
    assert_eq!(again.state, state);
    assert!(again.outcomes.is_empty());
}

#[tokio::test]
async fn test_replayed_payload_skips_finished_files() {
    let store = MemoryStore::new();
    let state = single_worker_state(&store, &["a.mp4", "b.mp4"]);
    // An earlier attempt copied the first file before failing
    store.put(dst("a.mp4"), 10);

    let executor = TransferExecutor::new(Arc::new(store.clone()), TransferOperation::Copy);
    let invocation = executor.process_next_payload(state).await.unwrap();

    let mut outcomes = invocation.outcomes.clone();
    outcomes.sort_by_key(|o| o.to_string());
    assert_eq!(outcomes, vec![TransferOutcome::Copied, TransferOutcome::Skipped]);
    assert_eq!(store.copy_count(), 1);
}

#[tokio::test]
async fn test_failed_invocation_keeps_cursor() {
    let store = MemoryStore::new();
    let state = single_worker_state(&store, &["a.mp4", "b.mp4", "c.mp4"]);
    store.fail_next(StorageError::Timeout("head object".to_string()));

    let executor = TransferExecutor::new(Arc::new(store.clone()), TransferOperation::Copy);
    let err = executor.process_next_payload(state.clone()).await.unwrap_err();
    assert!(err.is_transient());

    // The caller still holds the unchanged state and can replay it
    let invocation = executor.process_next_payload(state).await.unwrap();
    assert_eq!(invocation.state.cur_payload, 1);
    assert_eq!(invocation.status, InvocationStatus::Processing);
}

#[tokio::test]
async fn test_missing_source_aborts_invocation() {
    let store = MemoryStore::new();
    let state = single_worker_state(&store, &["a.mp4", "b.mp4"]);
    store.remove(&src("b.mp4"));

    let executor = TransferExecutor::new(Arc::new(store.clone()), TransferOperation::Copy);
    let err = executor.process_next_payload(state).await.unwrap_err();

    assert!(matches!(err, ParcelError::MissingSourceFile { .. }));
    assert!(err.is_fatal());
    assert!(err.to_string().contains("source/b.mp4"));
}

#[tokio::test]
async fn test_move_replay_is_idempotent() {
    let store = MemoryStore::new();
    let state = single_worker_state(&store, &["a.mp4", "b.mp4"]);
    let executor = TransferExecutor::new(Arc::new(store.clone()), TransferOperation::Move);

    let first = executor.process_next_payload(state.clone()).await.unwrap();
    assert_eq!(first.count(TransferOutcome::Moved), 2);
    assert!(!store.contains(&src("a.mp4")));
    assert!(store.contains(&dst("a.mp4")));

    // Replaying the same payload finds everything already moved
    let replay = executor.process_next_payload(state).await.unwrap();
    assert_eq!(replay.count(TransferOutcome::Skipped), 2);
    assert_eq!(store.copy_count(), 2);
}

#[tokio::test]
async fn test_response_serializes_with_status() {
    let store = MemoryStore::new();
    let state = single_worker_state(&store, &["a.mp4"]);
    let executor = TransferExecutor::new(Arc::new(store), TransferOperation::Copy);

    let invocation = executor.process_next_payload(state).await.unwrap();
    let json = serde_json::to_value(invocation.response()).unwrap();
    assert_eq!(json["status"], "done");
    assert_eq!(json["cur_payload"], 1);
    assert_eq!(json["num_payloads"], 1);
}
