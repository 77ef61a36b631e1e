/*!
Volume references and the lookup capability the coordinator consumes.

Volume lifecycle is owned elsewhere in the control plane. The coordinator
only resolves a volume id and checks whether its current state permits
snapshotting, so the seam here is a small read-only trait.
*/

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use crate::{BasaltError, Result};

/// Externally-owned volume states relevant to snapshot admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeStatus {
    /// Detached and idle; snapshotting is always permitted
    Available,
    /// Attached to an instance; snapshotting requires `force`
    InUse,
    /// Still being provisioned
    Creating,
    /// Being torn down
    Deleting,
    /// Faulted
    Error,
}

impl VolumeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeStatus::Available => "available",
            VolumeStatus::InUse => "in-use",
            VolumeStatus::Creating => "creating",
            VolumeStatus::Deleting => "deleting",
            VolumeStatus::Error => "error",
        }
    }
}

impl fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolumeStatus {
    type Err = BasaltError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "available" => Ok(VolumeStatus::Available),
            "in-use" => Ok(VolumeStatus::InUse),
            "creating" => Ok(VolumeStatus::Creating),
            "deleting" => Ok(VolumeStatus::Deleting),
            "error" => Ok(VolumeStatus::Error),
            other => Err(BasaltError::validation(format!(
                "unknown volume status: {other}"
            ))),
        }
    }
}

/// The slice of a volume the snapshot coordinator needs to see.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VolumeRecord {
    pub id: String,
    pub project_id: String,
    pub size_gb: u64,
    pub status: VolumeStatus,
}

impl VolumeRecord {
    /// Create a volume record in the `available` state.
    pub fn new<S1, S2>(id: S1, project_id: S2, size_gb: u64) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            size_gb,
            status: VolumeStatus::Available,
        }
    }

    /// Set the volume status
    pub fn with_status(mut self, status: VolumeStatus) -> Self {
        self.status = status;
        self
    }
}

/// Volume lookup capability, supplied by the volume side of the control plane.
pub trait VolumeDirectory: Send + Sync {
    /// Resolve a volume id to its current record.
    ///
    /// # Returns
    /// The record, or `VolumeNotFound` if the id is unknown.
    fn lookup(&self, volume_id: &str) -> Result<VolumeRecord>;
}

/// In-memory volume inventory with JSON file persistence.
///
/// This is the `VolumeDirectory` implementation used by tests and the
/// operator CLI; a deployed control plane would wire in its real volume
/// service instead.
pub struct VolumeCatalog {
    volumes: Mutex<HashMap<String, VolumeRecord>>,
}

impl VolumeCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            volumes: Mutex::new(HashMap::new()),
        }
    }

    /// Load a catalog from a JSON file.
    ///
    /// A missing file yields an empty catalog, so first use needs no setup
    /// step.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let data = fs::read_to_string(path).map_err(|e| {
            BasaltError::store(format!(
                "failed to read volume catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        let records: Vec<VolumeRecord> = serde_json::from_str(&data).map_err(|e| {
            BasaltError::store(format!(
                "corrupt volume catalog {}: {}",
                path.display(),
                e
            ))
        })?;

        let catalog = Self::new();
        for record in records {
            catalog.insert(record);
        }
        Ok(catalog)
    }

    /// Persist the catalog to a JSON file, creating parent directories as
    /// needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    BasaltError::store(format!(
                        "failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let records = self.list();
        let data = serde_json::to_string_pretty(&records)?;
        fs::write(path, data).map_err(|e| {
            BasaltError::store(format!(
                "failed to write volume catalog {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Insert or replace a volume record.
    pub fn insert(&self, volume: VolumeRecord) {
        let mut volumes = self.volumes.lock().expect("volume catalog lock poisoned");
        volumes.insert(volume.id.clone(), volume);
    }

    /// All records, ordered by id for stable output.
    pub fn list(&self) -> Vec<VolumeRecord> {
        let volumes = self.volumes.lock().expect("volume catalog lock poisoned");
        let mut records: Vec<VolumeRecord> = volumes.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

impl Default for VolumeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeDirectory for VolumeCatalog {
    fn lookup(&self, volume_id: &str) -> Result<VolumeRecord> {
        let volumes = self.volumes.lock().expect("volume catalog lock poisoned");
        volumes
            .get(volume_id)
            .cloned()
            .ok_or_else(|| BasaltError::VolumeNotFound(volume_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lookup_unknown_volume() {
        let catalog = VolumeCatalog::new();
        let result = catalog.lookup("vol-missing");
        assert!(matches!(result, Err(BasaltError::VolumeNotFound(_))));
    }

    #[test]
    fn test_insert_and_lookup() {
        let catalog = VolumeCatalog::new();
        catalog.insert(VolumeRecord::new("vol-1", "project-1", 10).with_status(VolumeStatus::InUse));

        let record = catalog.lookup("vol-1").unwrap();
        assert_eq!(record.status, VolumeStatus::InUse);
        assert_eq!(record.size_gb, 10);
    }

    #[test]
    fn test_catalog_file_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state/volumes.json");

        let catalog = VolumeCatalog::new();
        catalog.insert(VolumeRecord::new("vol-a", "project-1", 10));
        catalog.insert(VolumeRecord::new("vol-b", "project-2", 20));
        catalog.save(&path).unwrap();

        let reloaded = VolumeCatalog::load(&path).unwrap();
        assert_eq!(reloaded.list(), catalog.list());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = VolumeCatalog::load(temp_dir.path().join("absent.json")).unwrap();
        assert!(catalog.list().is_empty());
    }

    #[test]
    fn test_volume_status_parse() {
        assert_eq!("in-use".parse::<VolumeStatus>().unwrap(), VolumeStatus::InUse);
        assert!("detached".parse::<VolumeStatus>().is_err());
    }
}
