/*!
Filtering and pagination for snapshot listings.

Filters are conjunctive exact matches and commute with each other;
pagination is applied last, after filtering, over the store's stable
listing order. An empty filter set passes everything in scope, and a filter
that matches nothing yields an empty result rather than an error.
*/

use serde::{Deserialize, Serialize};

use crate::snapshot::{Snapshot, SnapshotStatus};

/// Filter set for snapshot listings.
///
/// # Example
/// ```rust
/// use basalt_core::{SnapshotFilter, SnapshotStatus};
///
/// let filter = SnapshotFilter::new()
///     .with_status(SnapshotStatus::Available)
///     .with_volume_id("vol-1")
///     .with_limit(10);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFilter {
    /// Exact lifecycle-status match
    pub status: Option<SnapshotStatus>,

    /// Exact source-volume match
    pub volume_id: Option<String>,

    /// Exact display-name match
    pub display_name: Option<String>,

    /// List across every project. Whether the caller may set this is an
    /// authorization decision made upstream; the store only honors the flag.
    pub all_tenants: bool,

    /// Maximum number of records to return, applied after filtering
    pub limit: Option<usize>,

    /// Number of leading records to skip, applied after filtering
    pub offset: Option<usize>,
}

impl SnapshotFilter {
    /// An empty filter: everything in scope, unpaginated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match only snapshots in `status`
    pub fn with_status(mut self, status: SnapshotStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Match only snapshots of `volume_id`
    pub fn with_volume_id<S: Into<String>>(mut self, volume_id: S) -> Self {
        self.volume_id = Some(volume_id.into());
        self
    }

    /// Match only snapshots named `display_name`
    pub fn with_display_name<S: Into<String>>(mut self, display_name: S) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// List across every project
    pub fn with_all_tenants(mut self) -> Self {
        self.all_tenants = true;
        self
    }

    /// Return at most `limit` records
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` records
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// True when the snapshot passes every set filter.
    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        if let Some(status) = self.status {
            if snapshot.status != status {
                return false;
            }
        }
        if let Some(volume_id) = &self.volume_id {
            if &snapshot.volume_id != volume_id {
                return false;
            }
        }
        if let Some(display_name) = &self.display_name {
            if &snapshot.display_name != display_name {
                return false;
            }
        }
        true
    }

    /// Apply the filters, then pagination, to an ordered record set.
    pub fn apply(&self, snapshots: Vec<Snapshot>) -> Vec<Snapshot> {
        let filtered: Vec<Snapshot> = snapshots
            .into_iter()
            .filter(|snapshot| self.matches(snapshot))
            .collect();

        let offset = self.offset.unwrap_or(0);
        if offset >= filtered.len() {
            return Vec::new();
        }

        let mut page: Vec<Snapshot> = filtered.into_iter().skip(offset).collect();
        if let Some(limit) = self.limit {
            page.truncate(limit);
        }
        page
    }
}
