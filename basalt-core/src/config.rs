//! Configuration for store and driver backend selection
//!
//! This module provides the configuration structures consumed by
//! `build_coordinator` to pick a snapshot store and a backend driver and to
//! wire up their parameters.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Enumeration of supported snapshot stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-memory store, scoped to the process lifetime
    Memory,
    /// Filesystem-backed store, one JSON record per snapshot
    Dir,
}

/// Enumeration of supported backend drivers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverBackend {
    /// Local filesystem image driver
    Local,
    /// Simulated backend with configurable latency
    Sim,
}

/// Configuration for assembling a coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Which snapshot store to use
    pub store: StoreBackend,
    /// Record directory (required for the dir store)
    pub store_dir: Option<PathBuf>,
    /// Which backend driver to use
    pub driver: DriverBackend,
    /// Image directory (required for the local driver)
    pub image_dir: Option<PathBuf>,
    /// Completion latency for the simulated driver, in milliseconds
    pub sim_latency_ms: Option<u64>,
}

impl CoordinatorConfig {
    /// Ephemeral configuration: memory store, simulated driver. Useful for
    /// tests and demos.
    pub fn default_memory() -> Self {
        CoordinatorConfig {
            store: StoreBackend::Memory,
            store_dir: None,
            driver: DriverBackend::Local,
            image_dir: None,
            sim_latency_ms: None,
        }
        .with_sim_driver()
    }

    /// Durable configuration rooted at a state directory: records under
    /// `<state_dir>/records`, images under `<state_dir>/images`.
    pub fn durable<P: AsRef<Path>>(state_dir: P) -> Self {
        let state_dir = state_dir.as_ref();
        CoordinatorConfig {
            store: StoreBackend::Dir,
            store_dir: Some(state_dir.join("records")),
            driver: DriverBackend::Local,
            image_dir: Some(state_dir.join("images")),
            sim_latency_ms: None,
        }
    }

    /// Switch to the simulated driver.
    pub fn with_sim_driver(mut self) -> Self {
        self.driver = DriverBackend::Sim;
        self.image_dir = None;
        self
    }

    /// Set the simulated driver's completion latency.
    pub fn with_sim_latency_ms(mut self, latency_ms: u64) -> Self {
        self.sim_latency_ms = Some(latency_ms);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.store == StoreBackend::Dir && self.store_dir.is_none() {
            return Err(crate::BasaltError::validation(
                "dir store requires a store directory",
            ));
        }
        if self.driver == DriverBackend::Local && self.image_dir.is_none() {
            return Err(crate::BasaltError::validation(
                "local driver requires an image directory",
            ));
        }
        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::default_memory()
    }
}
