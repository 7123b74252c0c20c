//! Per-instance status and statistics
//!
//! Each record sits behind its own lock, so instances update their own
//! slot in parallel and a reader never sees a half-written record.
//! Transitions are checked against the instance state machine:
//!
//! ```text
//! Idle ──set_active──▶ Active ──record_completion, set_idle──▶ Idle
//! Idle ──set_terminated──▶ Terminated
//! ```

use std::sync::{Mutex, MutexGuard};

use dungeon_core::{DungeonError, InstanceId, InstanceRecord, InstanceStatus, Result};

/// Status records of every dungeon instance, indexed by instance id
#[derive(Debug)]
pub struct InstanceRegistry {
    records: Vec<Mutex<InstanceRecord>>,
}

impl InstanceRegistry {
    /// Create `count` idle records with zeroed statistics
    pub fn new(count: usize) -> Self {
        Self {
            records: (0..count)
                .map(|id| Mutex::new(InstanceRecord::new(InstanceId(id))))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = InstanceId> {
        (0..self.records.len()).map(InstanceId)
    }

    /// Mark an idle instance as running a party
    pub fn set_active(&self, id: InstanceId) -> Result<()> {
        self.transition(id, InstanceStatus::Idle, InstanceStatus::Active)
    }

    /// Mark an active instance as idle again
    pub fn set_idle(&self, id: InstanceId) -> Result<()> {
        self.transition(id, InstanceStatus::Active, InstanceStatus::Idle)
    }

    /// Mark an idle instance as finished for good
    pub fn set_terminated(&self, id: InstanceId) -> Result<()> {
        self.transition(id, InstanceStatus::Idle, InstanceStatus::Terminated)
    }

    /// Count one served party and its run time against an active instance
    pub fn record_completion(&self, id: InstanceId, elapsed: u64) -> Result<()> {
        let mut record = self.slot(id)?;

        if record.status != InstanceStatus::Active {
            return Err(DungeonError::invariant(format!(
                "instance {} recorded a completion while {}",
                id, record.status
            )));
        }

        record.parties_served = record
            .parties_served
            .checked_add(1)
            .ok_or_else(|| DungeonError::invariant(format!("instance {id} party counter overflow")))?;
        record.total_time = record
            .total_time
            .checked_add(elapsed)
            .ok_or_else(|| DungeonError::invariant(format!("instance {id} run time overflow")))?;

        Ok(())
    }

    pub fn status(&self, id: InstanceId) -> Result<InstanceStatus> {
        Ok(self.slot(id)?.status)
    }

    pub fn record(&self, id: InstanceId) -> Result<InstanceRecord> {
        Ok(self.slot(id)?.clone())
    }

    /// Status of every instance, in id order
    ///
    /// Each record is read atomically; the list as a whole is not.
    pub fn snapshot(&self) -> Result<Vec<(InstanceId, InstanceStatus)>> {
        self.ids()
            .map(|id| -> Result<_> { Ok((id, self.slot(id)?.status)) })
            .collect()
    }

    /// Copy of every record, in id order
    pub fn records(&self) -> Result<Vec<InstanceRecord>> {
        self.ids().map(|id| self.record(id)).collect()
    }

    pub fn all_terminated(&self) -> Result<bool> {
        Ok(self
            .snapshot()?
            .iter()
            .all(|(_, status)| *status == InstanceStatus::Terminated))
    }

    fn transition(&self, id: InstanceId, from: InstanceStatus, to: InstanceStatus) -> Result<()> {
        let mut record = self.slot(id)?;

        if record.status != from {
            return Err(DungeonError::invariant(format!(
                "instance {} cannot become {} while {}",
                id, to, record.status
            )));
        }
        record.status = to;
        Ok(())
    }

    fn slot(&self, id: InstanceId) -> Result<MutexGuard<'_, InstanceRecord>> {
        self.records
            .get(id.0)
            .ok_or(DungeonError::InstanceNotFound(id))?
            .lock()
            .map_err(|_| DungeonError::invariant(format!("instance {id} record lock poisoned")))
    }
}
