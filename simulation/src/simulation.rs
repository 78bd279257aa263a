// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The stage sweep.

use crate::attractor::Attractors;
use crate::config::ConfigError;
use crate::config::SimulationConfig;
use crate::trial::trial_rng;
use crate::trial::Model;
use crate::trial::Trial;
use crate::trial::TrialOutcome;
use indexmap::IndexMap;
use rand::Rng;
use rbn_network::ExpandedNetwork;
use serde::Serialize;
use slog::{debug, info, o, Logger};

/// Results for one stage of the sweep.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StageSummary {
    pub stage: usize,
    /// Instances failed at the start of every trial in this stage.
    pub failures: usize,
    pub runs: u64,
    pub runs_with_attractor: u64,
    /// Mean final health of each node type, in template order.
    pub type_health: IndexMap<String, f64>,
    /// Mean fraction of healthy health indicator instances at the end of
    /// each trial, if the network has any.
    pub health_indicator_average: Option<f64>,
}

/// Results of a whole sweep.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationSummary {
    /// The base seed. Running again with this seed reproduces the sweep.
    pub seed: u64,
    /// The number of instances.
    pub n: usize,
    /// Average connectivity.
    pub average_k: f64,
    /// Maximum inbound connections of any instance.
    pub max_k: usize,
    /// Fraction of true states across every step of every trial.
    pub p: f64,
    pub runs_with_attractor: u64,
    pub runs_without_attractor: u64,
    pub stages: Vec<StageSummary>,
    pub attractors: Attractors,
}

impl SimulationSummary {
    pub fn total_runs(&self) -> u64 {
        self.runs_with_attractor + self.runs_without_attractor
    }
}

// Sums over the trials of one stage. Everything here is a sum or a count,
// so outcomes can be folded in any order.
struct StageTally {
    runs: u64,
    runs_with_attractor: u64,
    type_health: Vec<f64>,
    indicator_sum: f64,
    indicator_runs: u64,
    on_states: u64,
    evaluations: u64,
}

impl StageTally {
    fn new(node_types: usize) -> StageTally {
        StageTally {
            runs: 0,
            runs_with_attractor: 0,
            type_health: vec![0.0; node_types],
            indicator_sum: 0.0,
            indicator_runs: 0,
            on_states: 0,
            evaluations: 0,
        }
    }

    fn add(&mut self, network: &ExpandedNetwork, outcome: &TrialOutcome) {
        self.runs += 1;
        if outcome.cycle.is_some() {
            self.runs_with_attractor += 1;
        }
        for (sum, node_type) in
            self.type_health.iter_mut().zip(network.node_types())
        {
            let healthy = node_type
                .instances()
                .filter(|id| outcome.final_states[id.index()])
                .count();
            *sum += healthy as f64 / node_type.instance_count() as f64;
        }
        if let Some(fraction) = outcome.health_indicator_fraction {
            self.indicator_sum += fraction;
            self.indicator_runs += 1;
        }
        self.on_states += outcome.on_states;
        self.evaluations += outcome.evaluations;
    }

    fn summarize(
        &self,
        network: &ExpandedNetwork,
        stage: usize,
        failures: usize,
    ) -> StageSummary {
        let mean = |sum: f64, count: u64| {
            if count == 0 {
                0.0
            } else {
                sum / count as f64
            }
        };
        StageSummary {
            stage,
            failures,
            runs: self.runs,
            runs_with_attractor: self.runs_with_attractor,
            type_health: network
                .node_types()
                .iter()
                .zip(&self.type_health)
                .map(|(t, sum)| (t.name().to_string(), mean(*sum, self.runs)))
                .collect(),
            health_indicator_average: (self.indicator_runs > 0)
                .then(|| mean(self.indicator_sum, self.indicator_runs)),
        }
    }
}

/// A failure sweep over one expanded network.
///
/// Stage `s` runs `num_runs_per_stage` trials, each starting from the
/// all-healthy state with `s` randomly chosen instances forced to fail
/// (health indicators are never chosen). Each trial runs until its
/// normalized state repeats or `num_steps_per_run` steps have passed.
pub struct Simulation<'a> {
    log: Logger,
    model: Model<'a>,
    config: SimulationConfig,
    seed: u64,
    empty_attractors: Attractors,
}

impl<'a> Simulation<'a> {
    pub fn new(
        log: &Logger,
        network: &'a ExpandedNetwork,
        config: SimulationConfig,
    ) -> Result<Simulation<'a>, ConfigError> {
        config.validate()?;
        let log = log.new(o!("component" => "Simulation"));
        let seed = match config.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::thread_rng().gen();
                info!(log, "no seed configured, picked one"; "seed" => seed);
                seed
            }
        };
        let model = Model::new(network);
        let empty_attractors = Attractors::new(
            model.normalizer().node_types().iter().copied(),
            config.trigger_counter,
        )?;
        Ok(Simulation { log, model, config, seed, empty_attractors })
    }

    /// The base seed in use.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run one trial.
    ///
    /// The outcome depends only on the network, the base seed, `stage` and
    /// `run`, so any trial of a sweep can be replayed on its own.
    pub fn run_trial(&self, stage: usize, run: usize) -> TrialOutcome {
        Trial::new(
            &self.log,
            &self.model,
            stage,
            self.config.num_steps_per_run,
            trial_rng(self.seed, stage, run),
        )
        .run()
    }

    /// Run every stage and collect the results.
    pub fn run(&self) -> Result<SimulationSummary, ConfigError> {
        let network = self.model.network();
        let eligible = network
            .instance_ids()
            .filter(|id| !network.node_type_of(*id).is_health_indicator())
            .count();
        info!(
            self.log,
            "starting sweep";
            "seed" => self.seed,
            "stages" => self.config.num_stages,
            "runs_per_stage" => self.config.num_runs_per_stage,
            "steps_per_run" => self.config.num_steps_per_run,
        );

        let mut attractors = self.empty_attractors.clone();
        let mut stages = Vec::with_capacity(self.config.num_stages);
        let mut on_states = 0;
        let mut evaluations = 0;
        for stage in 0..self.config.num_stages {
            let (tally, found) = self.run_stage(stage);
            attractors.merge(&found)?;
            on_states += tally.on_states;
            evaluations += tally.evaluations;

            let summary =
                tally.summarize(network, stage, eligible.min(stage));
            info!(
                self.log,
                "finished stage";
                "stage" => stage,
                "failures" => summary.failures,
                "runs_with_attractor" => summary.runs_with_attractor,
                "attractors" => attractors.count(),
            );
            stages.push(summary);
        }

        let p = if evaluations == 0 {
            0.0
        } else {
            on_states as f64 / evaluations as f64
        };
        let runs_with_attractor: u64 =
            stages.iter().map(|s| s.runs_with_attractor).sum();
        let total_runs: u64 = stages.iter().map(|s| s.runs).sum();
        let summary = SimulationSummary {
            seed: self.seed,
            n: network.len(),
            average_k: network.average_k(),
            max_k: network.max_k(),
            p,
            runs_with_attractor,
            runs_without_attractor: total_runs - runs_with_attractor,
            stages,
            attractors,
        };
        info!(
            self.log,
            "finished sweep";
            "n" => summary.n,
            "average_k" => summary.average_k,
            "max_k" => summary.max_k,
            "p" => summary.p,
            "attractors" => summary.attractors.count(),
        );
        Ok(summary)
    }

    fn run_stage(&self, stage: usize) -> (StageTally, Attractors) {
        let network = self.model.network();
        let mut tally = StageTally::new(network.node_types().len());
        let mut attractors = self.empty_attractors.clone();
        for run in 0..self.config.num_runs_per_stage {
            let outcome = self.run_trial(stage, run);
            tally.add(network, &outcome);
            let Some(cycle) = &outcome.cycle else {
                continue;
            };
            let attractor = attractors.record(cycle, outcome.trigger_key);
            if attractor.occurrences() == 1 {
                debug!(
                    self.log,
                    "new attractor in stage";
                    "stage" => stage,
                    "run" => run,
                    "id" => %attractor.id(),
                    "length" => attractor.len(),
                    "steps" => outcome.steps,
                );
            }
        }
        (tally, attractors)
    }
}
