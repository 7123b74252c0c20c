//! Simulation configuration
//!
//! Reads `key = value` lines from a text file:
//!
//! ```text
//! n = 3     # max concurrent dungeon instances
//! t = 7     # tank players
//! h = 5     # healer players
//! d = 16    # DPS players
//! t1 = 1    # min dungeon run time
//! t2 = 15   # max dungeon run time (at most 15)
//! ```
//!
//! Everything is validated before a [`SimulationConfig`] exists, so the
//! engine never sees partially valid input.

use std::path::Path;
use std::time::Duration;

use dungeon_core::{DungeonError, ResourceCounts, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "config.txt";

/// Upper bound for the max run duration (`t2`)
pub const MAX_RUN_CEILING: u64 = 15;

/// Upper bound for concurrent dungeon instances (`n`)
pub const MAX_INSTANCES: usize = 1024;

/// Default wall-clock length of one duration unit (one second)
pub const DEFAULT_TIME_UNIT_MS: u64 = 1000;

/// How the dispatcher admits parties to dungeon instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum AdmissionPolicy {
    /// N long-lived instances, each looping until it cannot form a party
    #[default]
    Persistent,
    /// Dispatcher forms parties and launches them in batches of N
    Burst,
}

/// Bounds and scale of simulated dungeon runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunBounds {
    pub min: u64,
    pub max: u64,
    /// Wall-clock length of one unit
    pub unit: Duration,
}

impl RunBounds {
    /// Wall-clock time a run of `units` takes
    pub fn wall_time(&self, units: u64) -> Duration {
        self.unit.saturating_mul(u32::try_from(units).unwrap_or(u32::MAX))
    }
}

/// Validated simulation configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    pub max_instances: usize,
    pub players: ResourceCounts,
    pub min_run: u64,
    pub max_run: u64,
    pub time_unit: Duration,
    pub policy: AdmissionPolicy,
}

impl SimulationConfig {
    /// Create a validated configuration with the default time unit and policy
    pub fn new(
        max_instances: usize,
        players: ResourceCounts,
        min_run: u64,
        max_run: u64,
    ) -> Result<Self> {
        let config = Self {
            max_instances,
            players,
            min_run,
            max_run,
            time_unit: Duration::from_millis(DEFAULT_TIME_UNIT_MS),
            policy: AdmissionPolicy::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the wall-clock length of one duration unit
    pub fn with_time_unit(mut self, unit: Duration) -> Self {
        self.time_unit = unit;
        self
    }

    /// Set the admission policy
    pub fn with_policy(mut self, policy: AdmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn run_bounds(&self) -> RunBounds {
        RunBounds {
            min: self.min_run,
            max: self.max_run,
            unit: self.time_unit,
        }
    }

    /// Check every range constraint
    pub fn validate(&self) -> Result<()> {
        if self.max_instances < 1 {
            return Err(DungeonError::config("n (max concurrent instances) must be at least 1"));
        }
        if self.max_instances > MAX_INSTANCES {
            return Err(DungeonError::config(format!(
                "n (max concurrent instances) must be less than or equal to {MAX_INSTANCES}"
            )));
        }
        if self.players.tanks < 1 {
            return Err(DungeonError::config("t (number of tank players) must be at least 1"));
        }
        if self.players.healers < 1 {
            return Err(DungeonError::config("h (number of healer players) must be at least 1"));
        }
        if self.players.dps < 1 {
            return Err(DungeonError::config("d (number of DPS players) must be at least 1"));
        }
        if self.min_run == 0 {
            return Err(DungeonError::config("t1 (min time) must be greater than 0"));
        }
        if self.max_run == 0 {
            return Err(DungeonError::config("t2 (max time) must be greater than 0"));
        }
        if self.max_run < self.min_run {
            return Err(DungeonError::config("t2 (max time) must be greater than or equal to t1"));
        }
        if self.max_run > MAX_RUN_CEILING {
            return Err(DungeonError::config(format!(
                "t2 (max time) must be less than or equal to {MAX_RUN_CEILING}"
            )));
        }
        Ok(())
    }

    /// Load configuration from a `key = value` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading configuration");

        let contents = std::fs::read_to_string(path).map_err(|e| {
            DungeonError::config(format!(
                "Unable to open configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from `key = value` text
    ///
    /// Lines without `=` and `#` comments are skipped, unknown keys are
    /// logged and skipped. Later occurrences of a key override earlier ones.
    pub fn parse(contents: &str) -> Result<Self> {
        if contents.is_empty() {
            return Err(DungeonError::config("Configuration file is empty"));
        }

        let mut raw = RawConfig::default();

        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                debug!(line = index + 1, "Skipping line without '='");
                continue;
            };
            let key = key.trim();
            // Allow trailing comments after the value
            let value = value.split('#').next().unwrap_or_default().trim();

            let slot = match key {
                "n" => &mut raw.n,
                "t" => &mut raw.t,
                "h" => &mut raw.h,
                "d" => &mut raw.d,
                "t1" => &mut raw.t1,
                "t2" => &mut raw.t2,
                _ => {
                    warn!(key = %key, line = index + 1, "Unknown configuration key, skipping");
                    continue;
                }
            };

            let parsed = value.parse::<i64>().map_err(|_| {
                DungeonError::config(format!("Invalid value for key \"{key}\": \"{value}\""))
            })?;
            *slot = Some(parsed);
        }

        raw.into_config()
    }
}

/// Values as read from the file, before range checks
#[derive(Debug, Default)]
struct RawConfig {
    n: Option<i64>,
    t: Option<i64>,
    h: Option<i64>,
    d: Option<i64>,
    t1: Option<i64>,
    t2: Option<i64>,
}

impl RawConfig {
    fn into_config(self) -> Result<SimulationConfig> {
        let n = required(self.n, "n")?;
        let t = required(self.t, "t")?;
        let h = required(self.h, "h")?;
        let d = required(self.d, "d")?;
        let t1 = required(self.t1, "t1")?;
        let t2 = required(self.t2, "t2")?;

        let max_instances = at_least_one(n, "n (max concurrent instances) must be at least 1")?;
        let players = ResourceCounts::new(
            at_least_one(t, "t (number of tank players) must be at least 1")?,
            at_least_one(h, "h (number of healer players) must be at least 1")?,
            at_least_one(d, "d (number of DPS players) must be at least 1")?,
        );
        let min_run = at_least_one(t1, "t1 (min time) must be greater than 0")?;
        let max_run = at_least_one(t2, "t2 (max time) must be greater than 0")?;

        SimulationConfig::new(max_instances, players, min_run, max_run)
    }
}

fn required(value: Option<i64>, key: &str) -> Result<i64> {
    value.ok_or_else(|| DungeonError::config(format!("Missing required key \"{key}\"")))
}

fn at_least_one<T: TryFrom<i64>>(value: i64, message: &str) -> Result<T> {
    if value < 1 {
        return Err(DungeonError::config(message));
    }
    T::try_from(value).map_err(|_| DungeonError::config(format!("{value} is too large ({message})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "n = 2\nt = 7\nh = 5\nd = 16\nt1 = 1\nt2 = 15\n";

    #[test]
    fn test_parse_valid_config() {
        let config = SimulationConfig::parse(VALID).unwrap();

        assert_eq!(config.max_instances, 2);
        assert_eq!(config.players, ResourceCounts::new(7, 5, 16));
        assert_eq!(config.min_run, 1);
        assert_eq!(config.max_run, 15);
        assert_eq!(config.time_unit, Duration::from_secs(1));
        assert_eq!(config.policy, AdmissionPolicy::Persistent);
    }

    #[test]
    fn test_parse_tolerates_noise() {
        let text = "# dungeon queue\n\
                    t2=10\n\
                    garbage line\n\
                    \x20 n =  3  \n\
                    tanks = 4\n\
                    t=1\nh=1\nd=3 # one party\nt1=10\n";
        let config = SimulationConfig::parse(text).unwrap();

        // t2 before t1 is fine: validation runs after the whole file is read
        assert_eq!(config.max_instances, 3);
        assert_eq!(config.players, ResourceCounts::new(1, 1, 3));
        assert_eq!((config.min_run, config.max_run), (10, 10));
    }

    #[test]
    fn test_empty_file_rejected() {
        let err = SimulationConfig::parse("").unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: Configuration file is empty");
    }

    #[test]
    fn test_missing_key_rejected() {
        let err = SimulationConfig::parse("n = 2\nt = 7\nh = 5\nd = 16\nt1 = 1\n").unwrap_err();
        assert!(err.to_string().contains("Missing required key \"t2\""));
    }

    #[test]
    fn test_non_integer_rejected() {
        let err = SimulationConfig::parse(&VALID.replace("d = 16", "d = lots")).unwrap_err();
        assert!(err.to_string().contains("Invalid value for key \"d\""));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let cases = [
            ("n = 2", "n = 0", "n (max concurrent instances) must be at least 1"),
            ("t = 7", "t = -1", "t (number of tank players) must be at least 1"),
            ("h = 5", "h = 0", "h (number of healer players) must be at least 1"),
            ("d = 16", "d = 0", "d (number of DPS players) must be at least 1"),
            ("t1 = 1", "t1 = 0", "t1 (min time) must be greater than 0"),
            ("t2 = 15", "t2 = 0", "t2 (max time) must be greater than 0"),
            ("t2 = 15", "t2 = 16", "t2 (max time) must be less than or equal to 15"),
        ];

        for (from, to, message) in cases {
            let err = SimulationConfig::parse(&VALID.replace(from, to)).unwrap_err();
            assert!(
                err.to_string().contains(message),
                "{to}: unexpected error {err}"
            );
        }
    }

    #[test]
    fn test_instance_count_capped() {
        let err = SimulationConfig::parse(&VALID.replace("n = 2", "n = 4000000000")).unwrap_err();
        assert!(err.to_string().contains("n (max concurrent instances) must be less than or equal to 1024"));

        let config = SimulationConfig::parse(&VALID.replace("n = 2", "n = 1024")).unwrap();
        assert_eq!(config.max_instances, MAX_INSTANCES);
    }

    #[test]
    fn test_max_below_min_rejected() {
        let err = SimulationConfig::parse(&VALID.replace("t1 = 1", "t1 = 9").replace("t2 = 15", "t2 = 4"))
            .unwrap_err();
        assert!(err.to_string().contains("t2 (max time) must be greater than or equal to t1"));
    }

    #[test]
    fn test_oversized_count_rejected() {
        let err = SimulationConfig::parse(&VALID.replace("d = 16", "d = 99999999999")).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_unreadable_file_rejected() {
        let err = SimulationConfig::from_file("/nonexistent/dungeon/config.txt").unwrap_err();
        assert!(matches!(err, DungeonError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("dungeon-config-{}.txt", std::process::id()));
        std::fs::write(&path, VALID).unwrap();

        let config = SimulationConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.players.dps, 16);
    }

    #[test]
    fn test_builder_and_bounds() {
        let config = SimulationConfig::new(1, ResourceCounts::new(1, 1, 3), 2, 5)
            .unwrap()
            .with_time_unit(Duration::from_millis(10))
            .with_policy(AdmissionPolicy::Burst);

        let bounds = config.run_bounds();
        assert_eq!(config.policy, AdmissionPolicy::Burst);
        assert_eq!((bounds.min, bounds.max), (2, 5));
        assert_eq!(bounds.wall_time(3), Duration::from_millis(30));
    }
}
