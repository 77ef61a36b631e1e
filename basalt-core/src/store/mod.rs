/*!
Snapshot record stores.

The store is the durable source of truth for snapshot lifecycle state.
`compare_and_set_status` is the sole mutation primitive for status: driver
completions and API calls race against each other, and the conditional
transition is what keeps a stale completion from overwriting newer state.

Two adapters are provided: `MemoryStore` for tests and ephemeral use, and
`DirStore` for a filesystem-backed inventory that survives restarts.
*/

pub mod dir;

pub use dir::DirStore;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::filter::SnapshotFilter;
use crate::snapshot::{Snapshot, SnapshotStatus};
use crate::{BasaltError, Result};

/// Storage abstraction for snapshot records.
///
/// Implementations must make `compare_and_set_status` atomic with respect to
/// concurrent callers; nothing else in the system serializes lifecycle
/// transitions.
pub trait SnapshotStore: Send + Sync {
    /// Insert a new record.
    ///
    /// # Returns
    /// `Conflict` if a record with the same id already exists.
    fn insert(&self, snapshot: Snapshot) -> Result<()>;

    /// Point lookup.
    ///
    /// # Returns
    /// The record, or `NotFound` if absent.
    fn get(&self, id: &str) -> Result<Snapshot>;

    /// List records owned by `project_id` (or every project when the filter
    /// sets `all_tenants`), passed through the filter engine. Records come
    /// back in creation order.
    fn list_by_project(&self, project_id: &str, filter: &SnapshotFilter)
        -> Result<Vec<Snapshot>>;

    /// Atomically transition `id` from `expected` to `next`.
    ///
    /// # Returns
    /// `StaleState` if the current status is not `expected`; `NotFound` if
    /// the record is absent.
    fn compare_and_set_status(
        &self,
        id: &str,
        expected: SnapshotStatus,
        next: SnapshotStatus,
    ) -> Result<()>;

    /// Unconditionally update display fields, leaving lifecycle status,
    /// size, and volume binding untouched. `None` fields are preserved.
    ///
    /// # Returns
    /// The updated record, or `NotFound` if absent.
    fn update_display(
        &self,
        id: &str,
        display_name: Option<&str>,
        display_description: Option<&str>,
    ) -> Result<Snapshot>;

    /// Delete the record.
    ///
    /// # Returns
    /// `NotFound` if absent; never a silent no-op.
    fn remove(&self, id: &str) -> Result<()>;
}

/// In-memory snapshot store.
///
/// Records live in a mutex-guarded map with a side list preserving insertion
/// order, which is the stable order listings are defined over.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    records: HashMap<String, Snapshot>,
    order: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for MemoryStore {
    fn insert(&self, snapshot: Snapshot) -> Result<()> {
        let mut inner = self.inner.lock().expect("snapshot store lock poisoned");
        if inner.records.contains_key(&snapshot.id) {
            return Err(BasaltError::conflict(format!(
                "snapshot {} already exists",
                snapshot.id
            )));
        }
        inner.order.push(snapshot.id.clone());
        inner.records.insert(snapshot.id.clone(), snapshot);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Snapshot> {
        let inner = self.inner.lock().expect("snapshot store lock poisoned");
        inner
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| BasaltError::NotFound(id.to_string()))
    }

    fn list_by_project(
        &self,
        project_id: &str,
        filter: &SnapshotFilter,
    ) -> Result<Vec<Snapshot>> {
        let inner = self.inner.lock().expect("snapshot store lock poisoned");
        let scoped: Vec<Snapshot> = inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .filter(|snapshot| filter.all_tenants || snapshot.project_id == project_id)
            .cloned()
            .collect();
        Ok(filter.apply(scoped))
    }

    fn compare_and_set_status(
        &self,
        id: &str,
        expected: SnapshotStatus,
        next: SnapshotStatus,
    ) -> Result<()> {
        let mut inner = self.inner.lock().expect("snapshot store lock poisoned");
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| BasaltError::NotFound(id.to_string()))?;
        if record.status != expected {
            return Err(BasaltError::StaleState {
                id: id.to_string(),
                expected,
                actual: record.status,
            });
        }
        record.status = next;
        Ok(())
    }

    fn update_display(
        &self,
        id: &str,
        display_name: Option<&str>,
        display_description: Option<&str>,
    ) -> Result<Snapshot> {
        let mut inner = self.inner.lock().expect("snapshot store lock poisoned");
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| BasaltError::NotFound(id.to_string()))?;
        if let Some(name) = display_name {
            record.display_name = name.to_string();
        }
        if let Some(description) = display_description {
            record.display_description = description.to_string();
        }
        Ok(record.clone())
    }

    fn remove(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("snapshot store lock poisoned");
        if inner.records.remove(id).is_none() {
            return Err(BasaltError::NotFound(id.to_string()));
        }
        inner.order.retain(|existing| existing != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use std::sync::Arc;

    fn seeded_store() -> (MemoryStore, Snapshot) {
        let store = MemoryStore::new();
        let snapshot = Snapshot::new("vol-1", "project-1", 10).with_display_name("first");
        store.insert(snapshot.clone()).unwrap();
        (store, snapshot)
    }

    #[test]
    fn test_insert_duplicate_conflicts() {
        let (store, snapshot) = seeded_store();
        let result = store.insert(snapshot);
        assert!(matches!(result, Err(BasaltError::Conflict(_))));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get("snap-missing"),
            Err(BasaltError::NotFound(_))
        ));
    }

    #[test]
    fn test_compare_and_set_success_and_stale() {
        let (store, snapshot) = seeded_store();

        store
            .compare_and_set_status(
                &snapshot.id,
                SnapshotStatus::Creating,
                SnapshotStatus::Available,
            )
            .unwrap();
        assert_eq!(store.get(&snapshot.id).unwrap().status, SnapshotStatus::Available);

        // The expected state has moved on.
        let result = store.compare_and_set_status(
            &snapshot.id,
            SnapshotStatus::Creating,
            SnapshotStatus::Error,
        );
        assert!(matches!(result, Err(BasaltError::StaleState { .. })));
        assert_eq!(store.get(&snapshot.id).unwrap().status, SnapshotStatus::Available);
    }

    #[test]
    fn test_concurrent_cas_has_exactly_one_winner() {
        let (store, snapshot) = seeded_store();
        let store = Arc::new(store);

        let outcomes: Vec<Result<()>> = (0..32)
            .into_par_iter()
            .map(|_| {
                store.compare_and_set_status(
                    &snapshot.id,
                    SnapshotStatus::Creating,
                    SnapshotStatus::Available,
                )
            })
            .collect();

        let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        assert_eq!(winners, 1);
        for outcome in outcomes.iter().filter(|outcome| outcome.is_err()) {
            assert!(matches!(outcome, Err(BasaltError::StaleState { .. })));
        }
    }

    #[test]
    fn test_update_display_preserves_lifecycle_fields() {
        let (store, snapshot) = seeded_store();

        let updated = store
            .update_display(&snapshot.id, Some("renamed"), None)
            .unwrap();
        assert_eq!(updated.display_name, "renamed");
        assert_eq!(updated.display_description, snapshot.display_description);
        assert_eq!(updated.status, snapshot.status);
        assert_eq!(updated.volume_id, snapshot.volume_id);
        assert_eq!(updated.size_gb, snapshot.size_gb);
    }

    #[test]
    fn test_update_display_missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update_display("snap-missing", Some("name"), None),
            Err(BasaltError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let (store, snapshot) = seeded_store();

        store.remove(&snapshot.id).unwrap();
        assert!(matches!(
            store.remove(&snapshot.id),
            Err(BasaltError::NotFound(_))
        ));
    }

    #[test]
    fn test_listing_preserves_insertion_order() {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for name in ["backup1", "backup2", "backup3"] {
            let snapshot = Snapshot::new("vol-1", "project-1", 1).with_display_name(name);
            ids.push(snapshot.id.clone());
            store.insert(snapshot).unwrap();
        }

        let listed = store
            .list_by_project("project-1", &SnapshotFilter::new())
            .unwrap();
        let listed_ids: Vec<String> = listed.into_iter().map(|s| s.id).collect();
        assert_eq!(listed_ids, ids);
    }

    #[test]
    fn test_listing_scopes_by_project() {
        let store = MemoryStore::new();
        store
            .insert(Snapshot::new("vol-1", "project-1", 1))
            .unwrap();
        store
            .insert(Snapshot::new("vol-2", "project-2", 1))
            .unwrap();

        let mine = store
            .list_by_project("project-1", &SnapshotFilter::new())
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].project_id, "project-1");

        let everyone = store
            .list_by_project("project-1", &SnapshotFilter::new().with_all_tenants())
            .unwrap();
        assert_eq!(everyone.len(), 2);
    }
}
