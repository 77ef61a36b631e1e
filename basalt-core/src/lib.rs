/*!
# basalt Core Engine

Snapshot lifecycle coordination for a block-storage control plane.

This crate provides the state machine and supporting infrastructure for
managing volume snapshots against a pluggable storage backend:

- A lifecycle coordinator that accepts create/delete requests, dispatches
  the backend driver asynchronously, and reconciles completions via
  compare-and-set transitions
- A snapshot record store with in-memory and filesystem-backed adapters
- A narrow backend driver interface with local-filesystem and simulated
  adapters
- A filter engine for scoped, paginated listings

## Architecture

The coordinator owns the state machine
(`creating → available → deleting → removed`, with `error` and
`error_deleting` as the failure parking states). Store and driver are
traits at the seams, so backends plug in without touching the lifecycle
logic, and tests can drive races deterministically.

Create and delete are accepted without waiting on the backend: the caller
gets the record back in its pending state, and a background task settles
the final state when the driver completes. The store's conditional status
transition is what keeps a slow backend completion from clobbering a newer
state.

## Usage

```rust
use std::sync::Arc;
use basalt_core::{
    CreateSnapshotRequest, LifecycleCoordinator, MemoryStore, SimDriver, VolumeCatalog,
    VolumeRecord,
};

# async fn demo() -> basalt_core::Result<()> {
let volumes = Arc::new(VolumeCatalog::new());
volumes.insert(VolumeRecord::new("vol-1", "project-1", 10));

let coordinator = LifecycleCoordinator::new(
    Arc::new(MemoryStore::new()),
    Arc::new(SimDriver::new()),
    volumes,
);

// Accepted immediately in `creating`; settles to `available` when the
// backend finishes.
let snapshot = coordinator
    .create_snapshot(CreateSnapshotRequest::new("vol-1", "project-1"))
    .await?;
# Ok(())
# }
```
*/

pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod filter;
pub mod observability;
pub mod snapshot;
pub mod store;
pub mod volume;

pub use config::{CoordinatorConfig, DriverBackend, StoreBackend};
pub use coordinator::{
    build_coordinator, Coordinator, CreateSnapshotRequest, LifecycleCoordinator,
};
pub use driver::{LocalDirDriver, SimDriver, SimOutcome, SnapshotDriver};
pub use error::{BasaltError, Result};
pub use filter::SnapshotFilter;
pub use snapshot::{Snapshot, SnapshotStatus};
pub use store::{DirStore, MemoryStore, SnapshotStore};
pub use volume::{VolumeCatalog, VolumeDirectory, VolumeRecord, VolumeStatus};
