//! Dungeon Core - Shared types and traits
//!
//! This crate defines the core abstractions used across:
//! - dungeon-simulation-engine (pool, registry, instances, dispatcher)
//! - reporters (console status blocks, JSON summaries)
//!
//! Key types:
//! - ResourceCounts and the party recipe
//! - Instance identity, status and statistics records
//! - DurationSource and Reporter traits
//! - Error types

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
