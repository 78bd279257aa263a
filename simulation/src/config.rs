// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simulation configuration.

use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::Deserialize;
use serde::Serialize;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Valid HyperLogLog precisions, in bits of hash used to pick a register.
pub const HYPER_LOG_LOG_PRECISIONS: RangeInclusive<u8> = 4..=16;

fn default_num_stages() -> usize {
    8
}

fn default_num_runs_per_stage() -> usize {
    2000
}

fn default_num_steps_per_run() -> usize {
    40
}

fn default_precision() -> u8 {
    12
}

/// Configuration for a failure sweep.
///
/// Every field has a default, so an empty TOML file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of stress stages. Stage `s` starts every trial with `s` failed
    /// instances.
    #[serde(default = "default_num_stages")]
    pub num_stages: usize,
    /// Number of trials per stage.
    #[serde(default = "default_num_runs_per_stage")]
    pub num_runs_per_stage: usize,
    /// Number of steps a trial may take while looking for an attractor.
    #[serde(default = "default_num_steps_per_run")]
    pub num_steps_per_run: usize,
    /// Base seed. When absent a seed is chosen at random and logged.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub trigger_counter: TriggerCounterConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            num_stages: default_num_stages(),
            num_runs_per_stage: default_num_runs_per_stage(),
            num_steps_per_run: default_num_steps_per_run(),
            seed: None,
            trigger_counter: TriggerCounterConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_file<P: AsRef<Utf8Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|err| LoadError::Io { path: path.into(), err })?;
        let config = toml::from_str(&contents)
            .map_err(|err| LoadError::Parse { path: path.into(), err })?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_stages == 0 {
            return Err(ConfigError::ZeroStages);
        }
        self.trigger_counter.validate()
    }
}

/// How distinct triggering events are counted for each attractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TriggerCounterConfig {
    /// Remember every trigger. Exact, with memory proportional to the number
    /// of distinct triggers.
    Exact,
    /// Estimate with a HyperLogLog sketch of `2^precision` registers.
    HyperLogLog {
        #[serde(default = "default_precision")]
        precision: u8,
    },
}

impl Default for TriggerCounterConfig {
    fn default() -> Self {
        TriggerCounterConfig::HyperLogLog { precision: default_precision() }
    }
}

impl TriggerCounterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            TriggerCounterConfig::Exact => Ok(()),
            TriggerCounterConfig::HyperLogLog { precision } => {
                if HYPER_LOG_LOG_PRECISIONS.contains(precision) {
                    Ok(())
                } else {
                    Err(ConfigError::InvalidPrecision(*precision))
                }
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("error reading \"{path}\"")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error parsing \"{path}\"")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("num_stages must be at least 1")]
    ZeroStages,

    #[error(
        "HyperLogLog precision {0} is out of range ({min}..={max})",
        min = HYPER_LOG_LOG_PRECISIONS.start(),
        max = HYPER_LOG_LOG_PRECISIONS.end()
    )]
    InvalidPrecision(u8),

    #[error("cannot merge triggers counted with {theirs:?} into {ours:?}")]
    IncompatibleCounters {
        ours: TriggerCounterConfig,
        theirs: TriggerCounterConfig,
    },

    #[error("cannot merge attractors over different node types")]
    IncompatibleNodeTypes,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: SimulationConfig = toml::from_str("").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.num_stages, 8);
        assert_eq!(config.num_runs_per_stage, 2000);
        assert_eq!(config.num_steps_per_run, 40);
        assert_eq!(config.seed, None);
        assert_eq!(
            config.trigger_counter,
            TriggerCounterConfig::HyperLogLog { precision: 12 }
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_config() {
        let config: SimulationConfig = toml::from_str(
            r#"
            num_stages = 3
            num_runs_per_stage = 50
            seed = 42

            [trigger_counter]
            kind = "exact"
            "#,
        )
        .unwrap();
        assert_eq!(config.num_stages, 3);
        assert_eq!(config.num_runs_per_stage, 50);
        assert_eq!(config.num_steps_per_run, 40);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.trigger_counter, TriggerCounterConfig::Exact);

        let config: SimulationConfig = toml::from_str(
            r#"
            [trigger_counter]
            kind = "hyper-log-log"
            precision = 8
            "#,
        )
        .unwrap();
        assert_eq!(
            config.trigger_counter,
            TriggerCounterConfig::HyperLogLog { precision: 8 }
        );
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(toml::from_str::<SimulationConfig>("stages = 3").is_err());
        assert!(toml::from_str::<SimulationConfig>(
            "[trigger_counter]\nkind = \"bloom\""
        )
        .is_err());
    }

    #[test]
    fn test_validate() {
        let config =
            SimulationConfig { num_stages: 0, ..SimulationConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroStages));

        for (precision, valid) in
            [(3, false), (4, true), (16, true), (17, false)]
        {
            let trigger_counter =
                TriggerCounterConfig::HyperLogLog { precision };
            let config = SimulationConfig {
                trigger_counter,
                ..SimulationConfig::default()
            };
            assert_eq!(config.validate().is_ok(), valid, "{precision}");
        }
    }

    #[test]
    fn test_from_file() {
        let dir = camino_tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.toml");
        std::fs::write(&path, "num_runs_per_stage = 10\n").unwrap();
        let config = SimulationConfig::from_file(&path).unwrap();
        assert_eq!(config.num_runs_per_stage, 10);

        std::fs::write(&path, "num_runs_per_stage = \"ten\"\n").unwrap();
        assert!(matches!(
            SimulationConfig::from_file(&path),
            Err(LoadError::Parse { .. })
        ));
        assert!(matches!(
            SimulationConfig::from_file(dir.path().join("missing.toml")),
            Err(LoadError::Io { .. })
        ));
    }
}
