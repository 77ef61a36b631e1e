/*!
Snapshot records and lifecycle states.
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{BasaltError, Result};

/// Lifecycle states a snapshot moves through. Exactly one is active at a
/// time, and transitions happen only through the coordinator's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// Create accepted, waiting for the backend to materialize the snapshot
    Creating,
    /// Backend creation finished; the snapshot is usable
    Available,
    /// Delete accepted, waiting for the backend to release the snapshot
    Deleting,
    /// Backend creation failed
    Error,
    /// Backend deletion failed
    ErrorDeleting,
}

impl SnapshotStatus {
    /// States from which a delete request is accepted.
    pub fn is_deletable(&self) -> bool {
        matches!(self, SnapshotStatus::Available | SnapshotStatus::Error)
    }

    /// The wire/storage form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotStatus::Creating => "creating",
            SnapshotStatus::Available => "available",
            SnapshotStatus::Deleting => "deleting",
            SnapshotStatus::Error => "error",
            SnapshotStatus::ErrorDeleting => "error_deleting",
        }
    }
}

impl fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotStatus {
    type Err = BasaltError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "creating" => Ok(SnapshotStatus::Creating),
            "available" => Ok(SnapshotStatus::Available),
            "deleting" => Ok(SnapshotStatus::Deleting),
            "error" => Ok(SnapshotStatus::Error),
            "error_deleting" => Ok(SnapshotStatus::ErrorDeleting),
            other => Err(BasaltError::validation(format!(
                "unknown snapshot status: {other}"
            ))),
        }
    }
}

/// A point-in-time copy reference of a volume, tracked by the control plane.
///
/// `id`, `volume_id`, and `size_gb` are immutable after creation; `status`
/// changes only through the coordinator's state machine. The metadata map is
/// owned exclusively by this snapshot and is destroyed with it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Unique identifier (UUID v4), assigned at creation
    pub id: String,

    /// The volume this snapshot was taken from
    pub volume_id: String,

    /// Owning project/tenant
    pub project_id: String,

    /// Human-readable name
    pub display_name: String,

    /// Human-readable description
    pub display_description: String,

    /// Size in GiB, inherited from the source volume
    pub size_gb: u64,

    /// Current lifecycle state
    pub status: SnapshotStatus,

    /// Timestamp when the create request was accepted
    pub created_at: DateTime<Utc>,

    /// Free-form key/value metadata
    pub metadata: HashMap<String, String>,
}

impl Snapshot {
    /// Create a new snapshot record in the `creating` state.
    ///
    /// # Arguments
    /// * `volume_id` - The source volume
    /// * `project_id` - The owning project/tenant
    /// * `size_gb` - Size inherited from the source volume
    ///
    /// # Example
    /// ```rust
    /// use basalt_core::{Snapshot, SnapshotStatus};
    ///
    /// let snapshot = Snapshot::new("vol-1", "project-1", 10);
    /// assert_eq!(snapshot.status, SnapshotStatus::Creating);
    /// assert_eq!(snapshot.volume_id, "vol-1");
    /// ```
    pub fn new<S1, S2>(volume_id: S1, project_id: S2, size_gb: u64) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            id: Uuid::new_v4().to_string(),
            volume_id: volume_id.into(),
            project_id: project_id.into(),
            display_name: String::new(),
            display_description: String::new(),
            size_gb,
            status: SnapshotStatus::Creating,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Set the display name
    pub fn with_display_name<S: Into<String>>(mut self, name: S) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the display description
    pub fn with_display_description<S: Into<String>>(mut self, description: S) -> Self {
        self.display_description = description.into();
        self
    }

    /// Attach free-form metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validate that all required fields are properly set
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(BasaltError::validation("id cannot be empty"));
        }
        if self.volume_id.is_empty() {
            return Err(BasaltError::validation("volume_id cannot be empty"));
        }
        if self.project_id.is_empty() {
            return Err(BasaltError::validation("project_id cannot be empty"));
        }
        if self.size_gb == 0 {
            return Err(BasaltError::validation("size_gb must be positive"));
        }
        Ok(())
    }
}
