/*!
Local filesystem backend driver.

Materializes each snapshot as an image descriptor file under a base
directory. Useful for development and for single-host deployments where the
actual block data lives on local disks; transient I/O failures are retried
with the shared backoff policy.
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use async_trait::async_trait;
use basalt_retry::{
    is_transient_io, local_io_backoff_policy, permanent_error, transient_error,
    with_custom_backoff, RetryError,
};

use super::SnapshotDriver;
use crate::snapshot::Snapshot;
use crate::volume::VolumeRecord;
use crate::{BasaltError, Result};

/// On-disk descriptor for a materialized snapshot image.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct SnapshotImage {
    snapshot_id: String,
    volume_id: String,
    size_gb: u64,
    created_at: DateTime<Utc>,
}

/// Local filesystem backend driver.
///
/// # Example
/// ```rust,no_run
/// use basalt_core::driver::LocalDirDriver;
///
/// let driver = LocalDirDriver::new("/var/lib/basalt/images");
/// ```
#[derive(Debug, Clone)]
pub struct LocalDirDriver {
    base_dir: PathBuf,
}

impl LocalDirDriver {
    /// Create a driver rooted at `base_dir`. The directory is created on
    /// first use.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the image descriptor for a snapshot id.
    pub fn image_path(&self, snapshot_id: &str) -> PathBuf {
        self.base_dir.join(format!("{snapshot_id}.img"))
    }

    async fn materialize(&self, op: &'static str, snapshot: &Snapshot) -> Result<()> {
        let image = SnapshotImage {
            snapshot_id: snapshot.id.clone(),
            volume_id: snapshot.volume_id.clone(),
            size_gb: snapshot.size_gb,
            created_at: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&image)?;
        let path = self.image_path(&snapshot.id);
        let base_dir = self.base_dir.clone();

        with_custom_backoff(op, local_io_backoff_policy(), move |_attempt| {
            let path = path.clone();
            let base_dir = base_dir.clone();
            let data = data.clone();
            Box::pin(async move {
                fs::create_dir_all(&base_dir)
                    .await
                    .map_err(|e| classify_io(op, e))?;
                fs::write(&path, &data).await.map_err(|e| classify_io(op, e))
            })
        })
        .await
        .map_err(|e| BasaltError::driver(e.to_string()))?;

        info!(snapshot_id = %snapshot.id, volume_id = %snapshot.volume_id, "materialized snapshot image");
        Ok(())
    }
}

#[async_trait]
impl SnapshotDriver for LocalDirDriver {
    async fn create_snapshot(&self, _volume: &VolumeRecord, snapshot: &Snapshot) -> Result<()> {
        self.materialize("create_snapshot", snapshot).await
    }

    async fn create_snapshot_force(
        &self,
        volume: &VolumeRecord,
        snapshot: &Snapshot,
    ) -> Result<()> {
        // Local images need no quiescing; attached volumes snapshot the
        // same way detached ones do.
        debug!(volume_id = %volume.id, "force create on local backend");
        self.materialize("create_snapshot_force", snapshot).await
    }

    async fn delete_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let path = self.image_path(&snapshot.id);

        with_custom_backoff(
            "delete_snapshot",
            local_io_backoff_policy(),
            move |_attempt| {
                let path = path.clone();
                Box::pin(async move {
                    match fs::remove_file(&path).await {
                        Ok(()) => Ok(()),
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                            Err(permanent_error!(
                                "delete_snapshot",
                                std::io::Error::new(
                                    std::io::ErrorKind::NotFound,
                                    format!("backend image missing: {}", path.display()),
                                )
                            ))
                        }
                        Err(e) => Err(classify_io("delete_snapshot", e)),
                    }
                })
            },
        )
        .await
        .map_err(|e| BasaltError::driver(e.to_string()))?;

        info!(snapshot_id = %snapshot.id, "released snapshot image");
        Ok(())
    }
}

fn classify_io(op: &'static str, err: std::io::Error) -> RetryError {
    if is_transient_io(&err) {
        transient_error!(op, err)
    } else {
        permanent_error!(op, err)
    }
}
