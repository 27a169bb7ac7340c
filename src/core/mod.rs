/*!
 * Work planning and execution
 *
 * Catalog -> partition -> wire format -> per-worker invocations. Only
 * `partition` carries real algorithmic weight; the rest is plumbing around
 * an injected object store.
 */

pub mod catalog;
pub mod destination;
pub mod heap;
pub mod partition;
pub mod payload;
pub mod task;
pub mod transfer;
pub mod wire;
pub mod workflow;

use tracing::info;

use crate::config::{ParcelConfig, Tunables};
use crate::error::Result;
use crate::storage::ObjectStore;

use catalog::{build_catalog, Catalog};
use destination::DestinationMapper;
use partition::{partition, PartitionResult};
use wire::WorkSet;

/// Everything produced by planning a run
#[derive(Debug, Clone)]
pub struct Plan {
    pub catalog: Catalog,
    pub partition: PartitionResult,
    pub work_set: WorkSet,
}

/// Enumerate the configured source and split it across workers
pub async fn plan(
    store: &dyn ObjectStore,
    config: &ParcelConfig,
    tunables: &Tunables,
) -> Result<Plan> {
    tunables.validate()?;
    let mapper = DestinationMapper::from_rules(&config.destinations);
    let catalog = build_catalog(store, &config.source, &mapper).await?;

    let partition = partition(
        catalog.tasks.clone(),
        tunables.workers,
        tunables.max_payload_bytes(),
    )?;
    let work_set = WorkSet::from_partition(&partition);

    info!(
        workers = tunables.workers,
        max_payload_mb = tunables.max_payload_mb,
        tasks = partition.task_count(),
        imbalance_bytes = partition.imbalance_bytes(),
        "Planned work"
    );

    Ok(Plan {
        catalog,
        partition,
        work_set,
    })
}
