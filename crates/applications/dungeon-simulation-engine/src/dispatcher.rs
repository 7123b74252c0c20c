//! Dispatcher: owns the pool, the registry and the instance tasks
//!
//! ## Admission policies
//!
//! - **Persistent** (default): N instance loops start together and each
//!   runs until its own allocation fails. The run is done once every loop
//!   has independently observed an empty pool.
//! - **Burst**: the dispatcher forms parties itself and launches one
//!   single-party execution per formed party, round-robin over the N
//!   slots. With N executions in flight it waits for the whole batch
//!   before launching the next one.
//!
//! Any invariant violation cancels the remaining instances and aborts
//! the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dungeon_core::{
    DungeonError, DurationSource, InstanceId, InstanceStatus, InstanceSummary, Reporter, Result,
    Summary,
};
use tokio::sync::watch;
use tokio::task::{Id as TaskId, JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::config::{AdmissionPolicy, SimulationConfig};
use crate::instance::{InstanceExit, ServiceInstance};
use crate::pool::ResourcePool;
use crate::registry::InstanceRegistry;
use crate::reporter::{StatusNotifier, spawn_reporter};

/// Asks running instances to stop before their next party
///
/// A party already in a dungeon always finishes and is recorded.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Instance tasks in flight, keyed back to their registry slot
struct InstanceTasks<T> {
    set: JoinSet<Result<T>>,
    slots: HashMap<TaskId, InstanceId>,
}

impl<T: Send + 'static> InstanceTasks<T> {
    fn new() -> Self {
        Self {
            set: JoinSet::new(),
            slots: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.set.len()
    }

    fn spawn<F>(&mut self, id: InstanceId, task: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let handle = self.set.spawn(task);
        self.slots.insert(handle.id(), id);
    }

    /// Wait for the next task, returning its slot and output
    async fn join_next(&mut self) -> Option<Result<(InstanceId, T)>> {
        let joined = self.set.join_next_with_id().await?;

        Some(match joined {
            Ok((task_id, output)) => {
                let id = self.slot(task_id);
                output.map(|value| (id, value))
            }
            Err(join_error) => Err(self.failure(join_error)),
        })
    }

    /// Stop everything still running
    async fn shutdown(&mut self) {
        self.set.shutdown().await;
        self.slots.clear();
    }

    fn slot(&mut self, task_id: TaskId) -> InstanceId {
        // Every task is registered on spawn
        self.slots.remove(&task_id).unwrap_or(InstanceId(usize::MAX))
    }

    fn failure(&mut self, join_error: JoinError) -> DungeonError {
        let id = self.slot(join_error.id());
        let reason = if join_error.is_panic() {
            "instance task panicked".to_string()
        } else {
            join_error.to_string()
        };
        DungeonError::InstanceFailed { id, reason }
    }
}

/// Runs one simulation from validated configuration to summary
pub struct Dispatcher {
    config: SimulationConfig,
    pool: Arc<ResourcePool>,
    registry: Arc<InstanceRegistry>,
    durations: Arc<dyn DurationSource>,
    cancel: CancelHandle,
    started: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher with a fresh pool and registry
    pub fn new(config: SimulationConfig, durations: Arc<dyn DurationSource>) -> Result<Self> {
        config.validate()?;

        let (tx, _rx) = watch::channel(false);

        Ok(Self {
            pool: Arc::new(ResourcePool::new(config.players)),
            registry: Arc::new(InstanceRegistry::new(config.max_instances)),
            config,
            durations,
            cancel: CancelHandle { tx: Arc::new(tx) },
            started: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run every instance to termination and report the summary
    ///
    /// Can only be called once per dispatcher.
    pub async fn run<R: Reporter + 'static>(&self, reporter: R) -> Result<Summary> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DungeonError::invariant("dispatcher has already run"));
        }

        info!(
            instances = self.config.max_instances,
            tanks = self.config.players.tanks,
            healers = self.config.players.healers,
            dps = self.config.players.dps,
            min_run = self.config.min_run,
            max_run = self.config.max_run,
            policy = ?self.config.policy,
            "Starting dungeon queue"
        );

        let (notifier, reporter_task) = spawn_reporter(reporter);

        let outcome = match self.config.policy {
            AdmissionPolicy::Persistent => self.run_persistent(&notifier).await,
            AdmissionPolicy::Burst => self.run_burst(&notifier).await,
        };

        // Closing the last sender lets the reporter task finish
        drop(notifier);
        let mut reporter = reporter_task
            .await
            .map_err(|e| DungeonError::invariant(format!("reporter task failed: {e}")))?;

        if let Err(e) = outcome {
            error!(error = %e, "Dungeon queue aborted");
            return Err(e);
        }

        let summary = self.finish()?;
        reporter.summary(&summary);
        Ok(summary)
    }

    /// Current statistics and leftover players
    ///
    /// Read-only; after a run it returns the same summary every time.
    pub fn summary(&self) -> Result<Summary> {
        let records = self.registry.records()?;

        Ok(Summary {
            instances: records.iter().map(InstanceSummary::from).collect(),
            leftover: self.pool.remaining()?,
            parties_formed: self.pool.parties_formed()?,
        })
    }

    /// Check end-of-run invariants and build the summary
    fn finish(&self) -> Result<Summary> {
        if !self.registry.all_terminated()? {
            return Err(DungeonError::invariant("run ended with instances still running"));
        }
        self.pool.check_conservation()?;

        let summary = self.summary()?;
        if summary.total_served() != summary.parties_formed {
            return Err(DungeonError::invariant(format!(
                "{} parties formed but {} served",
                summary.parties_formed,
                summary.total_served()
            )));
        }

        let initial = self.pool.initial();
        info!(
            parties = summary.parties_formed,
            tanks = initial.tanks,
            healers = initial.healers,
            dps = initial.dps,
            tanks_left = summary.leftover.tanks,
            healers_left = summary.leftover.healers,
            dps_left = summary.leftover.dps,
            "Dungeon queue finished"
        );
        Ok(summary)
    }

    fn instance(&self, id: InstanceId, notifier: &StatusNotifier) -> ServiceInstance {
        ServiceInstance::new(
            id,
            Arc::clone(&self.pool),
            Arc::clone(&self.registry),
            Arc::clone(&self.durations),
            self.config.run_bounds(),
            notifier.clone(),
            self.cancel.tx.subscribe(),
        )
    }

    async fn run_persistent(&self, notifier: &StatusNotifier) -> Result<()> {
        let mut tasks = InstanceTasks::new();

        for id in self.registry.ids() {
            let instance = self.instance(id, notifier);
            tasks.spawn(id, instance.run());
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, InstanceExit::Exhausted)) => {
                    info!(instance = %id, "No party left to form");
                }
                Ok((id, InstanceExit::Cancelled)) => {
                    warn!(instance = %id, "Instance stopped by cancellation");
                }
                Err(e) => return self.abort(&mut tasks, e).await,
            }
        }

        Ok(())
    }

    async fn run_burst(&self, notifier: &StatusNotifier) -> Result<()> {
        let slots = self.registry.len();
        let mut tasks = InstanceTasks::new();
        let mut next_slot = 0;

        loop {
            if self.cancel.is_cancelled() {
                warn!("Stopped forming parties after cancellation");
                break;
            }

            let formed = match self.pool.try_allocate() {
                Ok(formed) => formed,
                Err(e) => return self.abort(&mut tasks, e).await,
            };
            if !formed {
                break;
            }

            if tasks.len() >= slots {
                self.join_batch(&mut tasks).await?;
            }

            let id = InstanceId(next_slot);
            if let Err(e) = self.registry.set_active(id) {
                return self.abort(&mut tasks, e).await;
            }
            notifier.notify(&self.registry, id, InstanceStatus::Active);

            let instance = self.instance(id, notifier);
            tasks.spawn(id, async move { instance.serve_party().await });

            next_slot = (next_slot + 1) % slots;
        }

        self.join_batch(&mut tasks).await?;

        for id in self.registry.ids() {
            self.registry.set_terminated(id)?;
            notifier.notify(&self.registry, id, InstanceStatus::Terminated);
        }

        Ok(())
    }

    /// Wait for every in-flight party of the current batch
    async fn join_batch(&self, tasks: &mut InstanceTasks<u64>) -> Result<()> {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                return self.abort(tasks, e).await;
            }
        }
        Ok(())
    }

    async fn abort<T: Send + 'static>(
        &self,
        tasks: &mut InstanceTasks<T>,
        cause: DungeonError,
    ) -> Result<()> {
        error!(error = %cause, "Fatal error, stopping all dungeon instances");
        self.cancel.cancel();
        tasks.shutdown().await;
        Err(cause)
    }
}
