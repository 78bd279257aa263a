// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Counting distinct triggering events.
//!
//! Many different initial failure sets can lead into the same attractor.
//! Remembering all of them is expensive when trigger diversity is high, so
//! attractors count them through a [`CardinalityEstimator`]. The exact
//! counter is useful in tests and for small sweeps; the HyperLogLog sketch
//! uses a fixed amount of memory regardless of how many triggers it sees.

use crate::config::ConfigError;
use crate::config::TriggerCounterConfig;
use crate::config::HYPER_LOG_LOG_PRECISIONS;
use highway::HighwayHasher;
use std::collections::BTreeSet;
use std::hash::Hasher;

/// Something that counts distinct 64-bit keys, possibly approximately.
pub trait CardinalityEstimator {
    /// Record one key. Adding the same key again has no effect on the count.
    fn add(&mut self, key: u64);

    /// The (estimated) number of distinct keys added so far.
    fn approximate_count(&self) -> u64;
}

/// Counts distinct keys exactly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExactCounter {
    keys: BTreeSet<u64>,
}

impl ExactCounter {
    pub fn new() -> ExactCounter {
        ExactCounter::default()
    }

    pub fn merge(&mut self, other: &ExactCounter) {
        self.keys.extend(other.keys.iter().copied());
    }
}

impl CardinalityEstimator for ExactCounter {
    fn add(&mut self, key: u64) {
        self.keys.insert(key);
    }

    fn approximate_count(&self) -> u64 {
        self.keys.len() as u64
    }
}

/// A HyperLogLog sketch.
///
/// Keys are rehashed before use, so callers may add keys that are not
/// uniformly distributed. The top `precision` bits of the hash select one of
/// `2^precision` registers, and each register remembers the longest run of
/// leading zeros seen in the remaining bits. The standard error of the
/// estimate is about `1.04 / sqrt(2^precision)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HyperLogLog {
    precision: u8,
    registers: Vec<u8>,
}

impl HyperLogLog {
    pub fn new(precision: u8) -> Result<HyperLogLog, ConfigError> {
        if !HYPER_LOG_LOG_PRECISIONS.contains(&precision) {
            return Err(ConfigError::InvalidPrecision(precision));
        }
        Ok(HyperLogLog { precision, registers: vec![0; 1 << precision] })
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Fold another sketch of the same precision into this one.
    pub fn merge(&mut self, other: &HyperLogLog) -> Result<(), ConfigError> {
        if self.precision != other.precision {
            return Err(ConfigError::IncompatibleCounters {
                ours: TriggerCounterConfig::HyperLogLog {
                    precision: self.precision,
                },
                theirs: TriggerCounterConfig::HyperLogLog {
                    precision: other.precision,
                },
            });
        }
        for (mine, theirs) in self.registers.iter_mut().zip(&other.registers) {
            *mine = (*mine).max(*theirs);
        }
        Ok(())
    }

    fn alpha(&self) -> f64 {
        match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            m => 0.7213 / (1.0 + 1.079 / m as f64),
        }
    }
}

impl CardinalityEstimator for HyperLogLog {
    fn add(&mut self, key: u64) {
        let mut hasher = HighwayHasher::default();
        hasher.write_u64(key);
        let hash = hasher.finish();

        let index = (hash >> (64 - self.precision)) as usize;
        // Shift the index bits out and set a sentinel bit so the rank is
        // bounded even when the rest of the hash is zero.
        let rest = (hash << self.precision) | (1 << (self.precision - 1));
        let rank = rest.leading_zeros() as u8 + 1;
        let register = &mut self.registers[index];
        *register = (*register).max(rank);
    }

    fn approximate_count(&self) -> u64 {
        let m = self.registers.len() as f64;
        let sum: f64 =
            self.registers.iter().map(|r| 2f64.powi(-i32::from(*r))).sum();
        let estimate = self.alpha() * m * m / sum;

        // Small cardinalities are better served by linear counting over the
        // empty registers.
        let zeros = self.registers.iter().filter(|r| **r == 0).count();
        let estimate = if estimate <= 2.5 * m && zeros > 0 {
            m * (m / zeros as f64).ln()
        } else {
            estimate
        };
        estimate.round() as u64
    }
}

/// The trigger counter kept by each attractor, chosen by configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerCounter {
    Exact(ExactCounter),
    HyperLogLog(HyperLogLog),
}

impl TriggerCounter {
    pub fn new(config: TriggerCounterConfig) -> Result<Self, ConfigError> {
        match config {
            TriggerCounterConfig::Exact => {
                Ok(TriggerCounter::Exact(ExactCounter::new()))
            }
            TriggerCounterConfig::HyperLogLog { precision } => {
                Ok(TriggerCounter::HyperLogLog(HyperLogLog::new(precision)?))
            }
        }
    }

    pub fn config(&self) -> TriggerCounterConfig {
        match self {
            TriggerCounter::Exact(_) => TriggerCounterConfig::Exact,
            TriggerCounter::HyperLogLog(hll) => {
                TriggerCounterConfig::HyperLogLog { precision: hll.precision() }
            }
        }
    }

    pub fn merge(&mut self, other: &TriggerCounter) -> Result<(), ConfigError> {
        match (self, other) {
            (TriggerCounter::Exact(ours), TriggerCounter::Exact(theirs)) => {
                ours.merge(theirs);
                Ok(())
            }
            (
                TriggerCounter::HyperLogLog(ours),
                TriggerCounter::HyperLogLog(theirs),
            ) => ours.merge(theirs),
            (ours, theirs) => Err(ConfigError::IncompatibleCounters {
                ours: ours.config(),
                theirs: theirs.config(),
            }),
        }
    }
}

impl CardinalityEstimator for TriggerCounter {
    fn add(&mut self, key: u64) {
        match self {
            TriggerCounter::Exact(counter) => counter.add(key),
            TriggerCounter::HyperLogLog(counter) => counter.add(key),
        }
    }

    fn approximate_count(&self) -> u64 {
        match self {
            TriggerCounter::Exact(counter) => counter.approximate_count(),
            TriggerCounter::HyperLogLog(counter) => counter.approximate_count(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_exact_counter() {
        let mut counter = ExactCounter::new();
        assert_eq!(counter.approximate_count(), 0);
        for _ in 0..10 {
            counter.add(7);
        }
        assert_eq!(counter.approximate_count(), 1);
        for key in 0..1000 {
            counter.add(key);
        }
        assert_eq!(counter.approximate_count(), 1000);
    }

    #[test]
    fn test_hyper_log_log_accuracy() {
        let mut hll = HyperLogLog::new(12).unwrap();
        assert_eq!(hll.approximate_count(), 0);
        for _ in 0..100 {
            hll.add(7);
        }
        assert_eq!(hll.approximate_count(), 1);

        let mut hll = HyperLogLog::new(12).unwrap();
        for key in 0..10_000 {
            hll.add(key);
        }
        let estimate = hll.approximate_count() as f64;
        let error = (estimate - 10_000.0).abs() / 10_000.0;
        assert!(error < 0.05, "estimate {estimate} is off by {error}");
    }

    #[test]
    fn test_hyper_log_log_small_counts_are_close() {
        let mut hll = HyperLogLog::new(12).unwrap();
        for key in 0..20 {
            hll.add(key * 1_000_003);
        }
        let estimate = hll.approximate_count();
        assert!((19..=21).contains(&estimate), "estimate {estimate}");
    }

    #[test]
    fn test_hyper_log_log_merge() {
        let mut a = HyperLogLog::new(10).unwrap();
        let mut b = HyperLogLog::new(10).unwrap();
        let mut both = HyperLogLog::new(10).unwrap();
        for key in 0..3000 {
            if key % 2 == 0 {
                a.add(key);
            } else {
                b.add(key);
            }
            both.add(key);
        }
        a.merge(&b).unwrap();
        assert_eq!(a, both);

        let other = HyperLogLog::new(11).unwrap();
        assert!(matches!(
            a.merge(&other),
            Err(ConfigError::IncompatibleCounters { .. })
        ));
    }

    #[test]
    fn test_invalid_precision() {
        assert_eq!(HyperLogLog::new(3), Err(ConfigError::InvalidPrecision(3)));
        assert_eq!(
            HyperLogLog::new(17),
            Err(ConfigError::InvalidPrecision(17))
        );
    }

    #[test]
    fn test_trigger_counter() {
        let mut exact =
            TriggerCounter::new(TriggerCounterConfig::Exact).unwrap();
        exact.add(1);
        exact.add(2);
        exact.add(1);
        assert_eq!(exact.approximate_count(), 2);
        assert_eq!(exact.config(), TriggerCounterConfig::Exact);

        let hll = TriggerCounter::new(TriggerCounterConfig::default()).unwrap();
        assert_eq!(hll.config(), TriggerCounterConfig::default());
        assert!(matches!(
            exact.merge(&hll),
            Err(ConfigError::IncompatibleCounters { .. })
        ));
    }
}
