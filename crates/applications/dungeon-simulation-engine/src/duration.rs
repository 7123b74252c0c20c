//! Dungeon run duration sources

use std::sync::Mutex;

use dungeon_core::DurationSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniformly random run durations
///
/// Unseeded draws use the thread-local generator; a seeded source shares
/// one generator so a run's draws come from a single reproducible stream.
#[derive(Debug, Default)]
pub struct RandomDuration {
    seeded: Option<Mutex<StdRng>>,
}

impl RandomDuration {
    pub fn new() -> Self {
        Self { seeded: None }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }
}

impl DurationSource for RandomDuration {
    fn next_units(&self, min: u64, max: u64) -> u64 {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };

        match &self.seeded {
            Some(rng) => match rng.lock() {
                Ok(mut rng) => rng.gen_range(low..=high),
                // A panic elsewhere while drawing leaves the generator usable
                Err(poisoned) => poisoned.into_inner().gen_range(low..=high),
            },
            None => rand::thread_rng().gen_range(low..=high),
        }
    }
}

/// Always the same run duration, whatever the bounds
#[derive(Debug, Clone, Copy)]
pub struct FixedDuration(pub u64);

impl DurationSource for FixedDuration {
    fn next_units(&self, _min: u64, _max: u64) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_stays_within_bounds() {
        let source = RandomDuration::new();
        for _ in 0..1000 {
            let units = source.next_units(3, 9);
            assert!((3..=9).contains(&units));
        }
    }

    #[test]
    fn test_equal_bounds_are_fixed() {
        let source = RandomDuration::new();
        assert!((0..100).all(|_| source.next_units(5, 5) == 5));
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = RandomDuration::seeded(42);
        let b = RandomDuration::seeded(42);

        let first: Vec<u64> = (0..20).map(|_| a.next_units(1, 15)).collect();
        let second: Vec<u64> = (0..20).map(|_| b.next_units(1, 15)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fixed_ignores_bounds() {
        assert_eq!(FixedDuration(7).next_units(1, 3), 7);
    }
}
