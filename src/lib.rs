/*!
 * Parcel - balanced bulk object transfer
 *
 * Splits a listing of object-store files across a fixed number of workers
 * so that each worker carries roughly the same number of bytes, then moves
 * the files in size-bounded payloads:
 * - Greedy largest-first partitioning over a min-heap of worker loads
 * - Payload capacity limits with oversized files admitted on their own
 * - File-type routing of objects to destination buckets
 * - Idempotent copy and move that tolerate replayed invocations
 * - A cursor-driven executor that processes one payload per invocation
 */

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

// Re-export commonly used types
pub use config::{ParcelConfig, Tunables};
pub use self::core::destination::{Destination, DestinationMapper};
pub use self::core::partition::{partition, PartitionResult};
pub use self::core::payload::{Payload, WorkAssignment};
pub use self::core::task::{ObjectLocation, Task};
pub use self::core::transfer::{TransferExecutor, TransferOperation, TransferOutcome};
pub use self::core::wire::{InvocationStatus, WorkSet, WorkerState};
pub use self::core::{plan, Plan};
pub use error::{ParcelError, Result};
pub use storage::{MemoryStore, ObjectStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
