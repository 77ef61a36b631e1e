/*!
The snapshot lifecycle coordinator.

This module owns the state machine. Create and delete are accepted
synchronously: the record is written (or transitioned) in the store and the
backend driver is dispatched on a background task, so the caller returns
before the backend finishes. When the driver completes, the outcome is
reconciled into the store with a compare-and-set transition; a completion
that lost a race against a newer transition is logged and dropped instead of
overwriting newer state.

Transitions: `creating` settles to `available` (driver success) or `error`
(driver failure); `available` and `error` records accept a delete, which
moves them to `deleting`; `deleting` ends with the record removed (driver
success) or parked in `error_deleting` (driver failure).
*/

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{CoordinatorConfig, DriverBackend, StoreBackend};
use crate::driver::{LocalDirDriver, SimDriver, SnapshotDriver};
use crate::filter::SnapshotFilter;
use crate::snapshot::{Snapshot, SnapshotStatus};
use crate::store::{DirStore, MemoryStore, SnapshotStore};
use crate::volume::{VolumeCatalog, VolumeDirectory, VolumeRecord, VolumeStatus};
use crate::{BasaltError, Result};

#[cfg(feature = "metrics")]
use crate::observability::{BasaltMetrics, MetricsTimer};

/// Parameters of a snapshot create request.
///
/// # Example
/// ```rust
/// use basalt_core::CreateSnapshotRequest;
///
/// let request = CreateSnapshotRequest::new("vol-1", "project-1")
///     .with_display_name("nightly")
///     .with_display_description("nightly backup")
///     .force();
/// ```
#[derive(Debug, Clone)]
pub struct CreateSnapshotRequest {
    pub volume_id: String,
    pub project_id: String,
    pub display_name: String,
    pub display_description: String,
    pub metadata: HashMap<String, String>,
    pub force: bool,
}

impl CreateSnapshotRequest {
    pub fn new<S1, S2>(volume_id: S1, project_id: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            volume_id: volume_id.into(),
            project_id: project_id.into(),
            display_name: String::new(),
            display_description: String::new(),
            metadata: HashMap::new(),
            force: false,
        }
    }

    pub fn with_display_name<S: Into<String>>(mut self, name: S) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_display_description<S: Into<String>>(mut self, description: S) -> Self {
        self.display_description = description.into();
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Permit snapshotting an attached (in-use) volume.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Orchestrates snapshot lifecycle against a store, a backend driver, and a
/// volume directory.
///
/// The coordinator holds its collaborators behind `Arc` so driver
/// completions can be reconciled from background tasks after the accepting
/// call has returned. Operations on different snapshot ids never contend
/// beyond the store's short critical section.
pub struct LifecycleCoordinator<S, D, V>
where
    S: SnapshotStore + 'static,
    D: SnapshotDriver + 'static,
    V: VolumeDirectory,
{
    store: Arc<S>,
    driver: Arc<D>,
    volumes: Arc<V>,
}

impl<S, D, V> LifecycleCoordinator<S, D, V>
where
    S: SnapshotStore + 'static,
    D: SnapshotDriver + 'static,
    V: VolumeDirectory,
{
    /// Create a coordinator over the given collaborators.
    pub fn new(store: Arc<S>, driver: Arc<D>, volumes: Arc<V>) -> Self {
        Self {
            store,
            driver,
            volumes,
        }
    }

    /// Accept a snapshot create request.
    ///
    /// Validates the source volume, writes the record in `creating`, and
    /// dispatches the backend create on a background task. The returned
    /// record is in `creating`; it settles to `available` or `error` when
    /// the backend completes.
    ///
    /// # Errors
    /// * `VolumeNotFound` - The volume id is unknown
    /// * `InvalidVolumeState` - The volume state forbids snapshotting
    ///   (attached volumes are permitted only with `force`)
    /// * `Validation` - Malformed request fields
    pub async fn create_snapshot(&self, request: CreateSnapshotRequest) -> Result<Snapshot> {
        let volume = self.volumes.lookup(&request.volume_id)?;
        check_volume_permits_snapshot(&volume, request.force)?;

        let snapshot = Snapshot::new(&volume.id, &request.project_id, volume.size_gb)
            .with_display_name(request.display_name)
            .with_display_description(request.display_description)
            .with_metadata(request.metadata);
        snapshot.validate()?;
        self.store.insert(snapshot.clone())?;

        info!(
            snapshot_id = %snapshot.id,
            volume_id = %volume.id,
            force = request.force,
            "accepted snapshot create"
        );

        let store = Arc::clone(&self.store);
        let driver = Arc::clone(&self.driver);
        let record = snapshot.clone();
        let force = request.force;
        tokio::spawn(async move {
            #[cfg(feature = "metrics")]
            let timer = MetricsTimer::start("create_snapshot");

            let outcome = if force {
                driver.create_snapshot_force(&volume, &record).await
            } else {
                driver.create_snapshot(&volume, &record).await
            };

            match outcome {
                Ok(()) => {
                    #[cfg(feature = "metrics")]
                    timer.finish();
                    settle(
                        store.as_ref(),
                        &record.id,
                        SnapshotStatus::Creating,
                        SnapshotStatus::Available,
                    );
                }
                Err(err) => {
                    #[cfg(feature = "metrics")]
                    timer.finish_with_error();
                    warn!(snapshot_id = %record.id, error = %err, "backend create failed");
                    settle(
                        store.as_ref(),
                        &record.id,
                        SnapshotStatus::Creating,
                        SnapshotStatus::Error,
                    );
                }
            }
        });

        Ok(snapshot)
    }

    /// Accept a snapshot delete request.
    ///
    /// Transitions the record to `deleting` and dispatches the backend
    /// delete on a background task. The record is removed from the store
    /// when the backend confirms, or parked in `error_deleting` if the
    /// backend fails.
    ///
    /// # Errors
    /// * `NotFound` - No record with this id
    /// * `InvalidState` - The record is not in `available` or `error`
    /// * `Conflict` - A concurrent transition won the race
    pub async fn delete_snapshot(&self, id: &str) -> Result<()> {
        let snapshot = self.store.get(id)?;
        if !snapshot.status.is_deletable() {
            return Err(BasaltError::InvalidState {
                id: id.to_string(),
                status: snapshot.status,
            });
        }

        // Another operation may settle between the read above and this
        // transition; the compare-and-set decides the winner.
        self.store
            .compare_and_set_status(id, snapshot.status, SnapshotStatus::Deleting)
            .map_err(|err| match err {
                BasaltError::StaleState { .. } => BasaltError::conflict(format!(
                    "snapshot {id} changed state before delete was accepted"
                )),
                other => other,
            })?;

        info!(snapshot_id = %id, "accepted snapshot delete");

        let store = Arc::clone(&self.store);
        let driver = Arc::clone(&self.driver);
        let mut record = snapshot;
        record.status = SnapshotStatus::Deleting;
        tokio::spawn(async move {
            #[cfg(feature = "metrics")]
            let timer = MetricsTimer::start("delete_snapshot");

            match driver.delete_snapshot(&record).await {
                Ok(()) => {
                    #[cfg(feature = "metrics")]
                    timer.finish();
                    match store.remove(&record.id) {
                        Ok(()) => debug!(snapshot_id = %record.id, "snapshot removed"),
                        Err(err) => {
                            warn!(
                                snapshot_id = %record.id,
                                error = %err,
                                "backend released snapshot but record was already gone"
                            );
                        }
                    }
                }
                Err(err) => {
                    #[cfg(feature = "metrics")]
                    timer.finish_with_error();
                    warn!(snapshot_id = %record.id, error = %err, "backend delete failed");
                    settle(
                        store.as_ref(),
                        &record.id,
                        SnapshotStatus::Deleting,
                        SnapshotStatus::ErrorDeleting,
                    );
                }
            }
        });

        Ok(())
    }

    /// Update display name and/or description. Purely a metadata mutation:
    /// lifecycle status, size, and volume binding are untouched, and the
    /// update is valid in any state the record still exists in.
    ///
    /// # Errors
    /// * `NotFound` - No record with this id
    pub async fn update_snapshot(
        &self,
        id: &str,
        display_name: Option<&str>,
        display_description: Option<&str>,
    ) -> Result<Snapshot> {
        self.store
            .update_display(id, display_name, display_description)
    }

    /// Point lookup.
    pub async fn get_snapshot(&self, id: &str) -> Result<Snapshot> {
        self.store.get(id)
    }

    /// List snapshots for a project through the filter engine.
    pub async fn list_snapshots(
        &self,
        project_id: &str,
        filter: &SnapshotFilter,
    ) -> Result<Vec<Snapshot>> {
        self.store.list_by_project(project_id, filter)
    }
}

/// Reconcile a driver completion into the store.
///
/// A failed compare-and-set means the record moved on (or is gone) while the
/// backend was working; the completion is stale and must not overwrite the
/// newer state.
fn settle<S: SnapshotStore + ?Sized>(
    store: &S,
    id: &str,
    expected: SnapshotStatus,
    next: SnapshotStatus,
) {
    match store.compare_and_set_status(id, expected, next) {
        Ok(()) => debug!(snapshot_id = %id, status = %next, "snapshot settled"),
        Err(err) => {
            warn!(snapshot_id = %id, error = %err, "dropping stale backend completion");
            #[cfg(feature = "metrics")]
            BasaltMetrics::global().record_stale_completion();
        }
    }
}

fn check_volume_permits_snapshot(volume: &VolumeRecord, force: bool) -> Result<()> {
    match volume.status {
        VolumeStatus::Available => Ok(()),
        VolumeStatus::InUse if force => Ok(()),
        status => Err(BasaltError::InvalidVolumeState {
            volume_id: volume.id.clone(),
            status,
        }),
    }
}

/// Object-safe coordinator interface for callers that choose their backends
/// at runtime.
#[async_trait]
pub trait Coordinator: Send + Sync {
    async fn create_snapshot(&self, request: CreateSnapshotRequest) -> Result<Snapshot>;
    async fn delete_snapshot(&self, id: &str) -> Result<()>;
    async fn update_snapshot(
        &self,
        id: &str,
        display_name: Option<&str>,
        display_description: Option<&str>,
    ) -> Result<Snapshot>;
    async fn get_snapshot(&self, id: &str) -> Result<Snapshot>;
    async fn list_snapshots(
        &self,
        project_id: &str,
        filter: &SnapshotFilter,
    ) -> Result<Vec<Snapshot>>;
}

#[async_trait]
impl<S, D, V> Coordinator for LifecycleCoordinator<S, D, V>
where
    S: SnapshotStore + 'static,
    D: SnapshotDriver + 'static,
    V: VolumeDirectory,
{
    async fn create_snapshot(&self, request: CreateSnapshotRequest) -> Result<Snapshot> {
        LifecycleCoordinator::create_snapshot(self, request).await
    }

    async fn delete_snapshot(&self, id: &str) -> Result<()> {
        LifecycleCoordinator::delete_snapshot(self, id).await
    }

    async fn update_snapshot(
        &self,
        id: &str,
        display_name: Option<&str>,
        display_description: Option<&str>,
    ) -> Result<Snapshot> {
        LifecycleCoordinator::update_snapshot(self, id, display_name, display_description).await
    }

    async fn get_snapshot(&self, id: &str) -> Result<Snapshot> {
        LifecycleCoordinator::get_snapshot(self, id).await
    }

    async fn list_snapshots(
        &self,
        project_id: &str,
        filter: &SnapshotFilter,
    ) -> Result<Vec<Snapshot>> {
        LifecycleCoordinator::list_snapshots(self, project_id, filter).await
    }
}

/// Build a coordinator from configuration.
///
/// The volume directory is an external collaborator and is passed in rather
/// than configured here.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use basalt_core::{build_coordinator, CoordinatorConfig, VolumeCatalog};
///
/// let volumes = Arc::new(VolumeCatalog::new());
/// let coordinator = build_coordinator(&CoordinatorConfig::durable("/var/lib/basalt"), volumes)?;
/// # Ok::<(), basalt_core::BasaltError>(())
/// ```
pub fn build_coordinator(
    config: &CoordinatorConfig,
    volumes: Arc<VolumeCatalog>,
) -> Result<Box<dyn Coordinator>> {
    config.validate()?;

    match (&config.store, &config.driver) {
        (StoreBackend::Memory, DriverBackend::Sim) => Ok(Box::new(LifecycleCoordinator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(sim_driver(config)),
            volumes,
        ))),
        (StoreBackend::Memory, DriverBackend::Local) => Ok(Box::new(LifecycleCoordinator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(local_driver(config)?),
            volumes,
        ))),
        (StoreBackend::Dir, DriverBackend::Sim) => Ok(Box::new(LifecycleCoordinator::new(
            Arc::new(dir_store(config)?),
            Arc::new(sim_driver(config)),
            volumes,
        ))),
        (StoreBackend::Dir, DriverBackend::Local) => Ok(Box::new(LifecycleCoordinator::new(
            Arc::new(dir_store(config)?),
            Arc::new(local_driver(config)?),
            volumes,
        ))),
    }
}

fn dir_store(config: &CoordinatorConfig) -> Result<DirStore> {
    let store_dir = config
        .store_dir
        .as_ref()
        .ok_or_else(|| BasaltError::validation("dir store requires a store directory"))?;
    DirStore::open(store_dir)
}

fn local_driver(config: &CoordinatorConfig) -> Result<LocalDirDriver> {
    let image_dir = config
        .image_dir
        .as_ref()
        .ok_or_else(|| BasaltError::validation("local driver requires an image directory"))?;
    Ok(LocalDirDriver::new(image_dir))
}

fn sim_driver(config: &CoordinatorConfig) -> SimDriver {
    let mut driver = SimDriver::new();
    if let Some(latency_ms) = config.sim_latency_ms {
        driver = driver.with_latency(std::time::Duration::from_millis(latency_ms));
    }
    driver
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockSnapshotDriver, SimOutcome};
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn catalog_with(volume: VolumeRecord) -> Arc<VolumeCatalog> {
        let catalog = VolumeCatalog::new();
        catalog.insert(volume);
        Arc::new(catalog)
    }

    fn sim_coordinator(
        driver: SimDriver,
        volumes: Arc<VolumeCatalog>,
    ) -> LifecycleCoordinator<MemoryStore, SimDriver, VolumeCatalog> {
        LifecycleCoordinator::new(Arc::new(MemoryStore::new()), Arc::new(driver), volumes)
    }

    async fn wait_for_status<S, D, V>(
        coordinator: &LifecycleCoordinator<S, D, V>,
        id: &str,
        status: SnapshotStatus,
    ) where
        S: SnapshotStore + 'static,
        D: SnapshotDriver + 'static,
        V: VolumeDirectory,
    {
        timeout(Duration::from_secs(5), async {
            loop {
                if coordinator.get_snapshot(id).await.unwrap().status == status {
                    return;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("snapshot {id} never reached {status}"));
    }

    #[tokio::test]
    async fn test_create_starts_creating_then_settles_available() {
        let volumes = catalog_with(VolumeRecord::new("vol-1", "project-1", 25));
        let coordinator = sim_coordinator(SimDriver::new(), volumes);

        let request = CreateSnapshotRequest::new("vol-1", "project-1")
            .with_display_name("nightly")
            .with_display_description("nightly backup");
        let snapshot = coordinator.create_snapshot(request).await.unwrap();

        assert_eq!(snapshot.status, SnapshotStatus::Creating);
        assert_eq!(snapshot.size_gb, 25);

        wait_for_status(&coordinator, &snapshot.id, SnapshotStatus::Available).await;

        let settled = coordinator.get_snapshot(&snapshot.id).await.unwrap();
        assert_eq!(settled.display_name, "nightly");
        assert_eq!(settled.display_description, "nightly backup");
        assert_eq!(settled.volume_id, "vol-1");
    }

    #[tokio::test]
    async fn test_create_failure_settles_error() {
        let volumes = catalog_with(VolumeRecord::new("vol-1", "project-1", 10));
        let driver = SimDriver::new().with_create_outcome(SimOutcome::Failure("no space".into()));
        let coordinator = sim_coordinator(driver, volumes);

        let snapshot = coordinator
            .create_snapshot(CreateSnapshotRequest::new("vol-1", "project-1"))
            .await
            .unwrap();

        wait_for_status(&coordinator, &snapshot.id, SnapshotStatus::Error).await;
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_volume() {
        let coordinator = sim_coordinator(SimDriver::new(), Arc::new(VolumeCatalog::new()));

        let result = coordinator
            .create_snapshot(CreateSnapshotRequest::new("vol-missing", "project-1"))
            .await;
        assert!(matches!(result, Err(BasaltError::VolumeNotFound(_))));
    }

    #[tokio::test]
    async fn test_force_permits_only_attached_volumes() {
        let catalog = VolumeCatalog::new();
        catalog.insert(VolumeRecord::new("vol-busy", "project-1", 10).with_status(VolumeStatus::InUse));
        catalog.insert(VolumeRecord::new("vol-bad", "project-1", 10).with_status(VolumeStatus::Error));
        let coordinator = sim_coordinator(SimDriver::new(), Arc::new(catalog));

        // Attached volume: rejected without force.
        let result = coordinator
            .create_snapshot(CreateSnapshotRequest::new("vol-busy", "project-1"))
            .await;
        assert!(matches!(
            result,
            Err(BasaltError::InvalidVolumeState {
                status: VolumeStatus::InUse,
                ..
            })
        ));

        // Attached volume: accepted with force.
        coordinator
            .create_snapshot(CreateSnapshotRequest::new("vol-busy", "project-1").force())
            .await
            .unwrap();

        // Force bypasses only the attach check, not other volume states.
        let result = coordinator
            .create_snapshot(CreateSnapshotRequest::new("vol-bad", "project-1").force())
            .await;
        assert!(matches!(
            result,
            Err(BasaltError::InvalidVolumeState {
                status: VolumeStatus::Error,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_force_create_uses_force_capability() {
        let volumes = catalog_with(
            VolumeRecord::new("vol-busy", "project-1", 10).with_status(VolumeStatus::InUse),
        );

        let mut driver = MockSnapshotDriver::new();
        driver
            .expect_create_snapshot_force()
            .times(1)
            .returning(|_, _| Ok(()));
        driver.expect_create_snapshot().never();

        let coordinator =
            LifecycleCoordinator::new(Arc::new(MemoryStore::new()), Arc::new(driver), volumes);

        let snapshot = coordinator
            .create_snapshot(CreateSnapshotRequest::new("vol-busy", "project-1").force())
            .await
            .unwrap();

        wait_for_status(&coordinator, &snapshot.id, SnapshotStatus::Available).await;
    }

    #[tokio::test]
    async fn test_delete_lifecycle() {
        let volumes = catalog_with(VolumeRecord::new("vol-1", "project-1", 10));
        let coordinator = sim_coordinator(SimDriver::new(), volumes);

        let snapshot = coordinator
            .create_snapshot(CreateSnapshotRequest::new("vol-1", "project-1"))
            .await
            .unwrap();
        wait_for_status(&coordinator, &snapshot.id, SnapshotStatus::Available).await;

        coordinator.delete_snapshot(&snapshot.id).await.unwrap();

        timeout(Duration::from_secs(5), async {
            loop {
                match coordinator.get_snapshot(&snapshot.id).await {
                    Err(BasaltError::NotFound(_)) => return,
                    Ok(_) => sleep(Duration::from_millis(5)).await,
                    Err(err) => panic!("unexpected error: {err}"),
                }
            }
        })
        .await
        .expect("record was never removed");
    }

    #[tokio::test]
    async fn test_delete_rejects_creating_snapshot() {
        let volumes = catalog_with(VolumeRecord::new("vol-1", "project-1", 10));
        let coordinator = sim_coordinator(SimDriver::new().gate_creates(), volumes);

        let snapshot = coordinator
            .create_snapshot(CreateSnapshotRequest::new("vol-1", "project-1"))
            .await
            .unwrap();

        let result = coordinator.delete_snapshot(&snapshot.id).await;
        assert!(matches!(
            result,
            Err(BasaltError::InvalidState {
                status: SnapshotStatus::Creating,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let volumes = catalog_with(VolumeRecord::new("vol-1", "project-1", 10));
        let coordinator = sim_coordinator(SimDriver::new(), volumes);

        let result = coordinator.delete_snapshot("snap-missing").await;
        assert!(matches!(result, Err(BasaltError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_failure_settles_error_deleting() {
        let volumes = catalog_with(VolumeRecord::new("vol-1", "project-1", 10));
        let driver = SimDriver::new().with_delete_outcome(SimOutcome::Failure("lun busy".into()));
        let coordinator = sim_coordinator(driver, volumes);

        let snapshot = coordinator
            .create_snapshot(CreateSnapshotRequest::new("vol-1", "project-1"))
            .await
            .unwrap();
        wait_for_status(&coordinator, &snapshot.id, SnapshotStatus::Available).await;

        coordinator.delete_snapshot(&snapshot.id).await.unwrap();
        wait_for_status(&coordinator, &snapshot.id, SnapshotStatus::ErrorDeleting).await;
    }

    #[tokio::test]
    async fn test_concurrent_deletes_have_one_winner() {
        let volumes = catalog_with(VolumeRecord::new("vol-1", "project-1", 10));
        let coordinator = sim_coordinator(SimDriver::new().gate_deletes(), volumes);

        let snapshot = coordinator
            .create_snapshot(CreateSnapshotRequest::new("vol-1", "project-1"))
            .await
            .unwrap();
        wait_for_status(&coordinator, &snapshot.id, SnapshotStatus::Available).await;

        let (first, second) = tokio::join!(
            coordinator.delete_snapshot(&snapshot.id),
            coordinator.delete_snapshot(&snapshot.id),
        );

        let winners = [&first, &second]
            .iter()
            .filter(|outcome| outcome.is_ok())
            .count();
        assert_eq!(winners, 1);

        let loser = if first.is_err() { first } else { second };
        assert!(matches!(
            loser,
            Err(BasaltError::InvalidState { .. }) | Err(BasaltError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_is_orthogonal_to_lifecycle() {
        let volumes = catalog_with(VolumeRecord::new("vol-1", "project-1", 10));
        let coordinator = sim_coordinator(SimDriver::new().gate_creates(), volumes);

        // Still creating: update must work and must not touch the status.
        let snapshot = coordinator
            .create_snapshot(
                CreateSnapshotRequest::new("vol-1", "project-1").with_display_name("before"),
            )
            .await
            .unwrap();

        let updated = coordinator
            .update_snapshot(&snapshot.id, Some("after"), Some("updated description"))
            .await
            .unwrap();

        assert_eq!(updated.display_name, "after");
        assert_eq!(updated.display_description, "updated description");
        assert_eq!(updated.status, SnapshotStatus::Creating);
        assert_eq!(updated.volume_id, snapshot.volume_id);
        assert_eq!(updated.size_gb, snapshot.size_gb);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let volumes = catalog_with(VolumeRecord::new("vol-1", "project-1", 10));
        let coordinator = sim_coordinator(SimDriver::new(), volumes);

        let result = coordinator
            .update_snapshot("snap-missing", Some("name"), None)
            .await;
        assert!(matches!(result, Err(BasaltError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_passthrough_filters() {
        let volumes = catalog_with(VolumeRecord::new("vol-1", "project-1", 10));
        let coordinator = sim_coordinator(SimDriver::new(), volumes);

        for name in ["backup1", "backup2"] {
            let snapshot = coordinator
                .create_snapshot(
                    CreateSnapshotRequest::new("vol-1", "project-1").with_display_name(name),
                )
                .await
                .unwrap();
            wait_for_status(&coordinator, &snapshot.id, SnapshotStatus::Available).await;
        }

        let named = coordinator
            .list_snapshots(
                "project-1",
                &SnapshotFilter::new().with_display_name("backup2"),
            )
            .await
            .unwrap();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].display_name, "backup2");

        let other_project = coordinator
            .list_snapshots("project-2", &SnapshotFilter::new())
            .await
            .unwrap();
        assert!(other_project.is_empty());
    }

    #[tokio::test]
    async fn test_stale_create_completion_is_dropped() {
        let volumes = catalog_with(VolumeRecord::new("vol-1", "project-1", 10));
        let store = Arc::new(MemoryStore::new());
        let driver = Arc::new(SimDriver::new().gate_creates());
        let coordinator =
            LifecycleCoordinator::new(Arc::clone(&store), Arc::clone(&driver), volumes);

        // Create is accepted but the backend never finishes.
        let snapshot = coordinator
            .create_snapshot(CreateSnapshotRequest::new("vol-1", "project-1"))
            .await
            .unwrap();

        // A reconciliation sweep parks the stuck record in `error`, which
        // unblocks a delete that removes it entirely.
        store
            .compare_and_set_status(&snapshot.id, SnapshotStatus::Creating, SnapshotStatus::Error)
            .unwrap();
        coordinator.delete_snapshot(&snapshot.id).await.unwrap();

        timeout(Duration::from_secs(5), async {
            loop {
                if matches!(
                    coordinator.get_snapshot(&snapshot.id).await,
                    Err(BasaltError::NotFound(_))
                ) {
                    return;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("record was never removed");

        // The original create now completes; its stale success must be
        // dropped rather than resurrect the record.
        driver.release_create();
        sleep(Duration::from_millis(50)).await;

        assert!(matches!(
            coordinator.get_snapshot(&snapshot.id).await,
            Err(BasaltError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_build_coordinator_from_config() {
        let volumes = catalog_with(VolumeRecord::new("vol-1", "project-1", 10));
        let coordinator =
            build_coordinator(&CoordinatorConfig::default_memory(), volumes).unwrap();

        let snapshot = coordinator
            .create_snapshot(CreateSnapshotRequest::new("vol-1", "project-1"))
            .await
            .unwrap();
        assert_eq!(snapshot.status, SnapshotStatus::Creating);
    }
}
