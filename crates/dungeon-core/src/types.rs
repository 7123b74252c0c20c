//! Core types shared across dungeon queue components

use serde::{Deserialize, Serialize};

/// Players needed to form one party: 1 tank, 1 healer, 3 DPS
pub const PARTY_RECIPE: ResourceCounts = ResourceCounts {
    tanks: 1,
    healers: 1,
    dps: 3,
};

/// Player counts per role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceCounts {
    pub tanks: u32,
    pub healers: u32,
    pub dps: u32,
}

impl ResourceCounts {
    pub fn new(tanks: u32, healers: u32, dps: u32) -> Self {
        Self { tanks, healers, dps }
    }

    /// Check whether every role has at least `need` players
    pub fn covers(&self, need: &ResourceCounts) -> bool {
        self.tanks >= need.tanks && self.healers >= need.healers && self.dps >= need.dps
    }

    /// Subtract `need` from every role, or `None` if any role would go negative
    pub fn checked_sub(&self, need: &ResourceCounts) -> Option<ResourceCounts> {
        Some(ResourceCounts {
            tanks: self.tanks.checked_sub(need.tanks)?,
            healers: self.healers.checked_sub(need.healers)?,
            dps: self.dps.checked_sub(need.dps)?,
        })
    }

    /// Multiply every role by `n`, or `None` on overflow
    pub fn checked_mul(&self, n: u32) -> Option<ResourceCounts> {
        Some(ResourceCounts {
            tanks: self.tanks.checked_mul(n)?,
            healers: self.healers.checked_mul(n)?,
            dps: self.dps.checked_mul(n)?,
        })
    }

    /// How many whole `recipe`s these counts can form
    ///
    /// Roles the recipe does not use place no limit.
    pub fn units_available(&self, recipe: &ResourceCounts) -> u64 {
        [
            (self.tanks, recipe.tanks),
            (self.healers, recipe.healers),
            (self.dps, recipe.dps),
        ]
        .into_iter()
        .filter(|(_, need)| *need > 0)
        .map(|(have, need)| u64::from(have / need))
        .min()
        .unwrap_or(0)
    }
}

/// Unique identifier for a dungeon instance (its slot in the registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub usize);

impl InstanceId {
    /// One-based number used in human-readable output
    pub fn number(&self) -> usize {
        self.0 + 1
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instance status
///
/// Idle → Active → Idle → ... → Terminated. Terminated is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Idle,
    Active,
    Terminated,
}

impl InstanceStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Idle => write!(f, "empty"),
            InstanceStatus::Active => write!(f, "active"),
            InstanceStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// Status and statistics of one dungeon instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: InstanceId,
    pub status: InstanceStatus,
    pub parties_served: u64,
    /// Sum of run durations, in duration units
    pub total_time: u64,
}

impl InstanceRecord {
    pub fn new(id: InstanceId) -> Self {
        Self {
            id,
            status: InstanceStatus::Idle,
            parties_served: 0,
            total_time: 0,
        }
    }
}

/// Notification emitted after an instance changes status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Instance that transitioned
    pub instance: InstanceId,
    /// Its new status
    pub status: InstanceStatus,
    /// Every instance's status, read right after the transition
    pub snapshot: Vec<(InstanceId, InstanceStatus)>,
}

/// Final statistics of one dungeon instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub id: InstanceId,
    pub parties_served: u64,
    pub total_time: u64,
}

impl From<&InstanceRecord> for InstanceSummary {
    fn from(record: &InstanceRecord) -> Self {
        Self {
            id: record.id,
            parties_served: record.parties_served,
            total_time: record.total_time,
        }
    }
}

/// Result of a simulation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub instances: Vec<InstanceSummary>,
    /// Players left in the queue
    pub leftover: ResourceCounts,
    /// Parties successfully formed from the pool
    pub parties_formed: u64,
}

impl Summary {
    /// Parties completed across all instances
    pub fn total_served(&self) -> u64 {
        self.instances.iter().map(|i| i.parties_served).sum()
    }

    /// Run time across all instances, in duration units
    pub fn total_time(&self) -> u64 {
        self.instances.iter().map(|i| i.total_time).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_available_limited_by_dps() {
        let counts = ResourceCounts::new(7, 5, 16);
        assert_eq!(counts.units_available(&PARTY_RECIPE), 5);

        let counts = ResourceCounts::new(7, 5, 2);
        assert_eq!(counts.units_available(&PARTY_RECIPE), 0);
    }

    #[test]
    fn test_checked_sub() {
        let counts = ResourceCounts::new(1, 1, 3);
        assert_eq!(counts.checked_sub(&PARTY_RECIPE), Some(ResourceCounts::new(0, 0, 0)));

        let counts = ResourceCounts::new(1, 0, 3);
        assert!(!counts.covers(&PARTY_RECIPE));
        assert_eq!(counts.checked_sub(&PARTY_RECIPE), None);
    }

    #[test]
    fn test_leftover_arithmetic() {
        let initial = ResourceCounts::new(7, 5, 16);
        let used = PARTY_RECIPE.checked_mul(5).unwrap();
        assert_eq!(initial.checked_sub(&used), Some(ResourceCounts::new(2, 0, 1)));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(InstanceStatus::Idle.to_string(), "empty");
        assert_eq!(InstanceStatus::Active.to_string(), "active");
        assert_eq!(InstanceStatus::Terminated.to_string(), "terminated");
        assert_eq!(InstanceId(0).number(), 1);
    }

    #[test]
    fn test_summary_totals() {
        let summary = Summary {
            instances: vec![
                InstanceSummary { id: InstanceId(0), parties_served: 3, total_time: 12 },
                InstanceSummary { id: InstanceId(1), parties_served: 2, total_time: 7 },
            ],
            leftover: ResourceCounts::new(2, 0, 1),
            parties_formed: 5,
        };

        assert_eq!(summary.total_served(), 5);
        assert_eq!(summary.total_time(), 19);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"parties_formed\":5"));
        assert!(json.contains("\"leftover\":{\"tanks\":2,\"healers\":0,\"dps\":1}"));
    }
}
