/*!
Backend drivers that physically create and delete snapshots.

This module defines the driver abstraction (port) and concrete backends
(adapters). Driver futures resolve when the backend finishes or gives up;
the coordinator runs them on background tasks and reconciles the outcome
into the store, so API callers never wait on the backend. Completions may
arrive in any order across unrelated snapshots.
*/

pub mod local;
pub mod sim;

pub use local::LocalDirDriver;
pub use sim::{SimDriver, SimOutcome};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::snapshot::Snapshot;
use crate::volume::VolumeRecord;
use crate::Result;

/// Backend capability set for snapshot storage.
///
/// Implementations talk to whatever actually holds the bits. The trait is
/// deliberately narrow: create, the attached-volume create variant, and
/// delete.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SnapshotDriver: Send + Sync {
    /// Materialize a snapshot of `volume`.
    ///
    /// Resolves once the backend has finished; an error means the backend
    /// gave up and the snapshot was not created.
    async fn create_snapshot(&self, volume: &VolumeRecord, snapshot: &Snapshot) -> Result<()>;

    /// Create variant for volumes that are attached and in use. Backends
    /// that need to quiesce I/O differently hook in here.
    async fn create_snapshot_force(
        &self,
        volume: &VolumeRecord,
        snapshot: &Snapshot,
    ) -> Result<()>;

    /// Release the backend resources held by `snapshot`.
    async fn delete_snapshot(&self, snapshot: &Snapshot) -> Result<()>;
}
