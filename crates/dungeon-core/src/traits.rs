//! Core traits for the dungeon queue
//!
//! The engine draws run durations and publishes progress through these
//! interfaces ONLY, so tests can swap in deterministic durations and
//! recording reporters.

use crate::types::{StatusChange, Summary};

/// Source of simulated run durations
pub trait DurationSource: Send + Sync {
    /// Draw a run duration in `[min, max]` (inclusive), in duration units
    fn next_units(&self, min: u64, max: u64) -> u64;
}

/// Consumer of status notifications and the final summary
pub trait Reporter: Send {
    /// Called after an instance becomes active, idle or terminated
    fn status_changed(&mut self, change: &StatusChange);

    /// Called once all instances have terminated
    fn summary(&mut self, summary: &Summary);
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn status_changed(&mut self, change: &StatusChange) {
        (**self).status_changed(change)
    }

    fn summary(&mut self, summary: &Summary) {
        (**self).summary(summary)
    }
}
