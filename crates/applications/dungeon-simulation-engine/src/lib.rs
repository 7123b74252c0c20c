//! Dungeon Simulation Engine
//!
//! Concurrent dungeon instances drawing parties (1 tank, 1 healer, 3 DPS)
//! from a shared player queue until no full party can be formed.
//!
//! ## Architecture
//!
//! ```text
//! Dispatcher
//! ├── ResourcePool       (one lock over all role counters)
//! ├── InstanceRegistry   (one lock per instance record)
//! ├── ServiceInstance ×N (allocate → run → record → repeat)
//! └── Reporter task      (status blocks, final summary)
//! ```

pub mod config;
pub mod dispatcher;
pub mod duration;
pub mod instance;
pub mod pool;
pub mod registry;
pub mod reporter;

pub use config::{AdmissionPolicy, RunBounds, SimulationConfig};
pub use dispatcher::{CancelHandle, Dispatcher};
pub use duration::{FixedDuration, RandomDuration};
pub use instance::{InstanceExit, ServiceInstance};
pub use pool::ResourcePool;
pub use registry::InstanceRegistry;
pub use reporter::{ConsoleReporter, StatusNotifier, spawn_reporter, write_summary_json};
