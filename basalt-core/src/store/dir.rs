/*!
Filesystem-backed snapshot store.

Each record is one JSON file under the base directory, so the inventory
survives process restarts. A store-wide mutex makes the read-modify-write
inside `compare_and_set_status` atomic within the process, which is the
atomicity the store contract requires.
*/

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::SnapshotStore;
use crate::filter::SnapshotFilter;
use crate::snapshot::{Snapshot, SnapshotStatus};
use crate::{BasaltError, Result};

/// Filesystem-backed snapshot store.
///
/// # Example
/// ```rust,no_run
/// use basalt_core::store::{DirStore, SnapshotStore};
/// use basalt_core::Snapshot;
///
/// let store = DirStore::open("/var/lib/basalt/records")?;
/// store.insert(Snapshot::new("vol-1", "project-1", 10))?;
/// # Ok::<(), basalt_core::BasaltError>(())
/// ```
pub struct DirStore {
    base_dir: PathBuf,
    lock: Mutex<()>,
}

impl DirStore {
    /// Open a store rooted at `base_dir`, creating the directory if missing.
    pub fn open<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).map_err(|e| {
            BasaltError::store(format!(
                "failed to create store directory {}: {}",
                base_dir.display(),
                e
            ))
        })?;
        Ok(Self {
            base_dir,
            lock: Mutex::new(()),
        })
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{id}.json"))
    }

    fn read_record(&self, id: &str) -> Result<Snapshot> {
        let path = self.record_path(id);
        if !path.exists() {
            return Err(BasaltError::NotFound(id.to_string()));
        }
        let data = fs::read_to_string(&path).map_err(|e| {
            BasaltError::store(format!("failed to read record {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            BasaltError::store(format!("corrupt record {}: {}", path.display(), e))
        })
    }

    fn write_record(&self, snapshot: &Snapshot) -> Result<()> {
        let path = self.record_path(&snapshot.id);
        let data = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, data).map_err(|e| {
            BasaltError::store(format!("failed to write record {}: {}", path.display(), e))
        })
    }

    fn read_all(&self) -> Result<Vec<Snapshot>> {
        let entries = fs::read_dir(&self.base_dir).map_err(|e| {
            BasaltError::store(format!(
                "failed to read store directory {}: {}",
                self.base_dir.display(),
                e
            ))
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                BasaltError::store(format!(
                    "failed to read store directory {}: {}",
                    self.base_dir.display(),
                    e
                ))
            })?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                let data = fs::read_to_string(&path).map_err(|e| {
                    BasaltError::store(format!(
                        "failed to read record {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let record: Snapshot = serde_json::from_str(&data).map_err(|e| {
                    BasaltError::store(format!("corrupt record {}: {}", path.display(), e))
                })?;
                records.push(record);
            }
        }

        // Directory order is arbitrary; creation order is the listing contract.
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }
}

impl SnapshotStore for DirStore {
    fn insert(&self, snapshot: Snapshot) -> Result<()> {
        let _guard = self.lock.lock().expect("snapshot store lock poisoned");
        if self.record_path(&snapshot.id).exists() {
            return Err(BasaltError::conflict(format!(
                "snapshot {} already exists",
                snapshot.id
            )));
        }
        self.write_record(&snapshot)
    }

    fn get(&self, id: &str) -> Result<Snapshot> {
        let _guard = self.lock.lock().expect("snapshot store lock poisoned");
        self.read_record(id)
    }

    fn list_by_project(
        &self,
        project_id: &str,
        filter: &SnapshotFilter,
    ) -> Result<Vec<Snapshot>> {
        let _guard = self.lock.lock().expect("snapshot store lock poisoned");
        let scoped: Vec<Snapshot> = self
            .read_all()?
            .into_iter()
            .filter(|snapshot| filter.all_tenants || snapshot.project_id == project_id)
            .collect();
        Ok(filter.apply(scoped))
    }

    fn compare_and_set_status(
        &self,
        id: &str,
        expected: SnapshotStatus,
        next: SnapshotStatus,
    ) -> Result<()> {
        let _guard = self.lock.lock().expect("snapshot store lock poisoned");
        let mut record = self.read_record(id)?;
        if record.status != expected {
            return Err(BasaltError::StaleState {
                id: id.to_string(),
                expected,
                actual: record.status,
            });
        }
        record.status = next;
        self.write_record(&record)
    }

    fn update_display(
        &self,
        id: &str,
        display_name: Option<&str>,
        display_description: Option<&str>,
    ) -> Result<Snapshot> {
        let _guard = self.lock.lock().expect("snapshot store lock poisoned");
        let mut record = self.read_record(id)?;
        if let Some(name) = display_name {
            record.display_name = name.to_string();
        }
        if let Some(description) = display_description {
            record.display_description = description.to_string();
        }
        self.write_record(&record)?;
        Ok(record)
    }

    fn remove(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().expect("snapshot store lock poisoned");
        let path = self.record_path(id);
        if !path.exists() {
            return Err(BasaltError::NotFound(id.to_string()));
        }
        fs::remove_file(&path).map_err(|e| {
            BasaltError::store(format!("failed to delete record {}: {}", path.display(), e))
        })
    }
}
