/*!
Simulated backend driver.

Completion timing and outcomes are controlled by the caller: optional
latency, per-operation failure injection, and completion gates that hold
create or delete completions until explicitly released. The gates make
lifecycle races reproducible in tests; the latency knob makes demos look
like a real backend.
*/

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use super::SnapshotDriver;
use crate::snapshot::Snapshot;
use crate::volume::VolumeRecord;
use crate::{BasaltError, Result};

/// What a simulated backend operation reports when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimOutcome {
    Success,
    Failure(String),
}

impl SimOutcome {
    fn as_result(&self, op: &str) -> Result<()> {
        match self {
            SimOutcome::Success => Ok(()),
            SimOutcome::Failure(reason) => {
                Err(BasaltError::driver(format!("{op} failed: {reason}")))
            }
        }
    }
}

/// Simulated backend driver.
///
/// # Example
/// ```rust
/// use basalt_core::driver::{SimDriver, SimOutcome};
/// use std::time::Duration;
///
/// let flaky = SimDriver::new()
///     .with_latency(Duration::from_millis(50))
///     .with_create_outcome(SimOutcome::Failure("no space".into()));
/// ```
pub struct SimDriver {
    create_outcome: SimOutcome,
    delete_outcome: SimOutcome,
    latency: Option<Duration>,
    create_gate: Option<Arc<Semaphore>>,
    delete_gate: Option<Arc<Semaphore>>,
}

impl SimDriver {
    /// A backend that succeeds immediately at everything.
    pub fn new() -> Self {
        Self {
            create_outcome: SimOutcome::Success,
            delete_outcome: SimOutcome::Success,
            latency: None,
            create_gate: None,
            delete_gate: None,
        }
    }

    /// Sleep this long before completing any operation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Outcome reported by create operations.
    pub fn with_create_outcome(mut self, outcome: SimOutcome) -> Self {
        self.create_outcome = outcome;
        self
    }

    /// Outcome reported by delete operations.
    pub fn with_delete_outcome(mut self, outcome: SimOutcome) -> Self {
        self.delete_outcome = outcome;
        self
    }

    /// Hold create completions until `release_create` is called, once per
    /// pending operation.
    pub fn gate_creates(mut self) -> Self {
        self.create_gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Hold delete completions until `release_delete` is called, once per
    /// pending operation.
    pub fn gate_deletes(mut self) -> Self {
        self.delete_gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let one gated create complete.
    pub fn release_create(&self) {
        if let Some(gate) = &self.create_gate {
            gate.add_permits(1);
        }
    }

    /// Let one gated delete complete.
    pub fn release_delete(&self) {
        if let Some(gate) = &self.delete_gate {
            gate.add_permits(1);
        }
    }

    async fn complete(
        &self,
        op: &str,
        gate: &Option<Arc<Semaphore>>,
        outcome: &SimOutcome,
    ) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| BasaltError::driver("simulated backend shut down"))?;
            permit.forget();
        }
        debug!(op, outcome = ?outcome, "simulated backend completion");
        outcome.as_result(op)
    }
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotDriver for SimDriver {
    async fn create_snapshot(&self, _volume: &VolumeRecord, snapshot: &Snapshot) -> Result<()> {
        debug!(snapshot_id = %snapshot.id, "simulated create");
        self.complete("create_snapshot", &self.create_gate, &self.create_outcome)
            .await
    }

    async fn create_snapshot_force(
        &self,
        _volume: &VolumeRecord,
        snapshot: &Snapshot,
    ) -> Result<()> {
        debug!(snapshot_id = %snapshot.id, "simulated force create");
        self.complete(
            "create_snapshot_force",
            &self.create_gate,
            &self.create_outcome,
        )
        .await
    }

    async fn delete_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        debug!(snapshot_id = %snapshot.id, "simulated delete");
        self.complete("delete_snapshot", &self.delete_gate, &self.delete_outcome)
            .await
    }
}
