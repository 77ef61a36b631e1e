/*!
Error types for the basalt control plane core.
*/

use thiserror::Error;

use crate::snapshot::SnapshotStatus;
use crate::volume::VolumeStatus;

/// Result type used throughout the basalt core.
pub type Result<T> = std::result::Result<T, BasaltError>;

/// Errors that can occur during snapshot lifecycle operations.
#[derive(Error, Debug)]
pub enum BasaltError {
    /// No snapshot record with the requested id
    #[error("snapshot {0} not found")]
    NotFound(String),

    /// The referenced volume does not exist
    #[error("volume {0} not found")]
    VolumeNotFound(String),

    /// A concurrent operation on the same snapshot got there first
    #[error("conflict: {0}")]
    Conflict(String),

    /// A compare-and-set transition lost the race against a concurrent one
    #[error("stale state for snapshot {id}: expected {expected}, found {actual}")]
    StaleState {
        id: String,
        expected: SnapshotStatus,
        actual: SnapshotStatus,
    },

    /// The snapshot's current lifecycle state does not permit the operation
    #[error("snapshot {id} is {status}: operation not permitted")]
    InvalidState { id: String, status: SnapshotStatus },

    /// The volume's current state does not permit snapshotting
    #[error("volume {volume_id} is {status}: snapshot not permitted")]
    InvalidVolumeState {
        volume_id: String,
        status: VolumeStatus,
    },

    /// Malformed or missing request fields
    #[error("validation error: {0}")]
    Validation(String),

    /// Store-level failures (corrupt records, unreadable state directory)
    #[error("store error: {0}")]
    Store(String),

    /// Backend driver failures
    #[error("driver error: {0}")]
    Driver(String),

    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BasaltError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new conflict error
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new driver error
    pub fn driver<S: Into<String>>(msg: S) -> Self {
        Self::Driver(msg.into())
    }
}
