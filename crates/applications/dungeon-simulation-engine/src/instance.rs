//! Dungeon instance loop
//!
//! An instance repeatedly forms a party from the shared pool, runs the
//! dungeon for a random duration and records the result:
//!
//! ```text
//! Idle ──party formed──▶ Active ──run finished──▶ Idle ──▶ ...
//!   └──no party / cancelled──▶ Terminated
//! ```
//!
//! Locks are only held inside pool and registry calls; the run itself
//! sleeps with nothing locked.

use std::sync::Arc;

use dungeon_core::{DurationSource, InstanceId, InstanceStatus, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::RunBounds;
use crate::pool::ResourcePool;
use crate::registry::InstanceRegistry;
use crate::reporter::StatusNotifier;

/// Why an instance stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceExit {
    /// Not enough players left to form a party
    Exhausted,
    /// Dispatcher asked instances to stop
    Cancelled,
}

/// One dungeon instance bound to a registry slot
pub struct ServiceInstance {
    id: InstanceId,
    pool: Arc<ResourcePool>,
    registry: Arc<InstanceRegistry>,
    durations: Arc<dyn DurationSource>,
    bounds: RunBounds,
    notifier: StatusNotifier,
    cancel: watch::Receiver<bool>,
}

impl ServiceInstance {
    pub fn new(
        id: InstanceId,
        pool: Arc<ResourcePool>,
        registry: Arc<InstanceRegistry>,
        durations: Arc<dyn DurationSource>,
        bounds: RunBounds,
        notifier: StatusNotifier,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            pool,
            registry,
            durations,
            bounds,
            notifier,
            cancel,
        }
    }

    /// Serve parties until the pool runs dry or the run is cancelled
    ///
    /// Errors are invariant violations and end the instance without
    /// marking it terminated.
    pub async fn run(self) -> Result<InstanceExit> {
        let exit = loop {
            if *self.cancel.borrow() {
                break InstanceExit::Cancelled;
            }
            if !self.pool.try_allocate()? {
                break InstanceExit::Exhausted;
            }

            self.registry.set_active(self.id)?;
            self.notifier
                .notify(&self.registry, self.id, InstanceStatus::Active);

            self.serve_party().await?;
        };

        self.registry.set_terminated(self.id)?;
        self.notifier
            .notify(&self.registry, self.id, InstanceStatus::Terminated);

        info!(
            instance = %self.id,
            exit = ?exit,
            "Dungeon instance terminated"
        );
        Ok(exit)
    }

    /// Run one already-formed party: the instance must be Active and ends Idle
    ///
    /// Returns the run duration in units.
    pub async fn serve_party(&self) -> Result<u64> {
        let units = self.durations.next_units(self.bounds.min, self.bounds.max);
        debug!(instance = %self.id, units, "Running dungeon");

        tokio::time::sleep(self.bounds.wall_time(units)).await;

        self.registry.record_completion(self.id, units)?;
        self.registry.set_idle(self.id)?;
        self.notifier
            .notify(&self.registry, self.id, InstanceStatus::Idle);

        debug!(instance = %self.id, units, "Dungeon cleared");
        Ok(units)
    }
}
