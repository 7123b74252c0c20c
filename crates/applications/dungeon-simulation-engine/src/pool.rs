//! Shared player queue
//!
//! All three role counters live behind one lock so a party is taken
//! all-or-nothing. Allocation never blocks on anything but that lock and
//! never waits for players to appear.

use std::sync::{Mutex, MutexGuard};

use dungeon_core::{DungeonError, PARTY_RECIPE, ResourceCounts, Result};
use tracing::debug;

#[derive(Debug)]
struct PoolState {
    available: ResourceCounts,
    parties_formed: u64,
}

/// Pool of queued players that parties are formed from
#[derive(Debug)]
pub struct ResourcePool {
    state: Mutex<PoolState>,
    initial: ResourceCounts,
    recipe: ResourceCounts,
}

impl ResourcePool {
    /// Create a pool that forms standard parties (1 tank, 1 healer, 3 DPS)
    pub fn new(players: ResourceCounts) -> Self {
        Self::with_recipe(players, PARTY_RECIPE)
    }

    /// Create a pool with a custom party composition
    pub fn with_recipe(players: ResourceCounts, recipe: ResourceCounts) -> Self {
        Self {
            state: Mutex::new(PoolState {
                available: players,
                parties_formed: 0,
            }),
            initial: players,
            recipe,
        }
    }

    /// Attempt to form one party
    ///
    /// Returns `Ok(true)` and removes the party's players if every role has
    /// enough players, `Ok(false)` with no side effects otherwise.
    pub fn try_allocate(&self) -> Result<bool> {
        let mut state = self.lock()?;

        if !state.available.covers(&self.recipe) {
            return Ok(false);
        }

        state.available = state.available.checked_sub(&self.recipe).ok_or_else(|| {
            DungeonError::invariant(format!(
                "player counts {:?} went negative forming a party",
                state.available
            ))
        })?;
        state.parties_formed += 1;

        debug!(
            tanks = state.available.tanks,
            healers = state.available.healers,
            dps = state.available.dps,
            "Formed party"
        );

        Ok(true)
    }

    /// Players still in the queue
    pub fn remaining(&self) -> Result<ResourceCounts> {
        Ok(self.lock()?.available)
    }

    /// Parties formed so far
    pub fn parties_formed(&self) -> Result<u64> {
        Ok(self.lock()?.parties_formed)
    }

    pub fn initial(&self) -> ResourceCounts {
        self.initial
    }

    pub fn recipe(&self) -> ResourceCounts {
        self.recipe
    }

    /// Verify remaining = initial - parties_formed × recipe
    pub fn check_conservation(&self) -> Result<()> {
        let state = self.lock()?;

        let used = u32::try_from(state.parties_formed)
            .ok()
            .and_then(|formed| self.recipe.checked_mul(formed));
        let expected = used.and_then(|used| self.initial.checked_sub(&used));

        if expected != Some(state.available) {
            return Err(DungeonError::invariant(format!(
                "pool started with {:?}, formed {} parties but holds {:?}",
                self.initial, state.parties_formed, state.available
            )));
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, PoolState>> {
        self.state
            .lock()
            .map_err(|_| DungeonError::invariant("player pool lock poisoned"))
    }
}
