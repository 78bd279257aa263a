// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A single trial.
//!
//! A trial is a synchronous state machine. It injects failures, then steps
//! the network forward until the normalized state repeats or the step budget
//! runs out. Nothing here performs I/O or shares mutable state with other
//! trials, so trials can be driven one transition at a time in tests or run
//! to completion in any order.
//!
//! Valid transitions:
//!
//!   * Initialize -> Step
//!   * Step -> Step
//!   * Step -> Detected
//!   * Step -> Exhausted

use crate::state::NormalizedState;
use crate::state::Normalizer;
use highway::HighwayHasher;
use highway::Key;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rbn_network::ExpandedNetwork;
use rbn_network::InstanceId;
use slog::{trace, Logger};
use std::collections::HashMap;
use std::hash::Hasher;

// Mixed into every trial seed so trial streams differ from other uses of
// the base seed.
const TRIAL_SEED_DOMAIN: u64 = 0x7269_616c_5eed_0001;

/// Derive the random stream for one trial from the sweep's base seed.
pub(crate) fn trial_rng(base_seed: u64, stage: usize, run: usize) -> StdRng {
    let key = Key([base_seed, TRIAL_SEED_DOMAIN, 0, 0]);
    let mut hasher = HighwayHasher::new(key);
    hasher.write_u64(stage as u64);
    hasher.write_u64(run as u64);
    StdRng::seed_from_u64(hasher.finish())
}

/// Identify a failure set. The set is hashed in ascending instance order.
pub(crate) fn trigger_key(trigger: &[InstanceId]) -> u64 {
    let mut hasher = HighwayHasher::default();
    hasher.write_usize(trigger.len());
    for id in trigger {
        hasher.write_usize(id.index());
    }
    hasher.finish()
}

/// Everything about a network that every trial reads and none modify.
pub(crate) struct Model<'a> {
    network: &'a ExpandedNetwork,
    normalizer: Normalizer<'a>,
    // Type tags of each instance's inputs, parallel to its neighbor list.
    input_types: Vec<Vec<&'a str>>,
    // Instances that failure injection may choose.
    eligible: Vec<InstanceId>,
    indicators: Vec<InstanceId>,
}

impl<'a> Model<'a> {
    pub(crate) fn new(network: &'a ExpandedNetwork) -> Model<'a> {
        let input_types = network
            .instance_ids()
            .map(|id| network.input_types(id).collect())
            .collect();
        let (indicators, eligible) = network
            .instance_ids()
            .partition(|id| network.node_type_of(*id).is_health_indicator());
        Model {
            network,
            normalizer: Normalizer::new(network),
            input_types,
            eligible,
            indicators,
        }
    }

    pub(crate) fn network(&self) -> &'a ExpandedNetwork {
        self.network
    }

    pub(crate) fn normalizer(&self) -> &Normalizer<'a> {
        &self.normalizer
    }

    pub(crate) fn has_indicators(&self) -> bool {
        !self.indicators.is_empty()
    }
}

/// Where a trial is in its life cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrialState {
    /// Failures have not been injected yet.
    Initialize,

    /// The network is being stepped forward.
    Step,

    /// The normalized state repeated. The cycle runs from the first
    /// occurrence of the repeated state up to the step before it recurred.
    Detected { cycle: Vec<NormalizedState> },

    /// The step budget ran out before any normalized state repeated.
    Exhausted,
}

impl TrialState {
    pub fn is_finished(&self) -> bool {
        matches!(self, TrialState::Detected { .. } | TrialState::Exhausted)
    }
}

/// The result of a finished trial.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialOutcome {
    /// Instances forced to fail before the first step, in ascending order.
    pub trigger: Vec<InstanceId>,
    /// The hash of `trigger` counted by the attractor trigger counters.
    pub trigger_key: u64,
    /// Instance states after the last step.
    pub final_states: Vec<bool>,
    /// The attractor cycle, if one was reached.
    pub cycle: Option<Vec<NormalizedState>>,
    /// True states seen across all steps.
    pub on_states: u64,
    /// State evaluations across all steps.
    pub evaluations: u64,
    pub steps: usize,
    /// Fraction of health indicator instances that are healthy at the end,
    /// or `None` when the network has no health indicators.
    pub health_indicator_fraction: Option<f64>,
}

pub(crate) struct Trial<'m, 'a> {
    log: Logger,
    model: &'m Model<'a>,
    stage: usize,
    step_budget: usize,
    rng: StdRng,
    state: TrialState,

    states: Vec<bool>,
    next: Vec<bool>,
    inputs: Vec<bool>,

    // Normalized states seen so far, in order, and the position of each.
    history: Vec<NormalizedState>,
    positions: HashMap<NormalizedState, usize>,

    trigger: Vec<InstanceId>,
    on_states: u64,
    evaluations: u64,
}

impl<'m, 'a> Trial<'m, 'a> {
    pub(crate) fn new(
        log: &Logger,
        model: &'m Model<'a>,
        stage: usize,
        step_budget: usize,
        rng: StdRng,
    ) -> Trial<'m, 'a> {
        let len = model.network.len();
        Trial {
            log: log.clone(),
            model,
            stage,
            step_budget,
            rng,
            state: TrialState::Initialize,
            states: vec![true; len],
            next: Vec::with_capacity(len),
            inputs: Vec::new(),
            history: Vec::with_capacity(step_budget),
            positions: HashMap::with_capacity(step_budget),
            trigger: Vec::new(),
            on_states: 0,
            evaluations: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &TrialState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn states(&self) -> &[bool] {
        &self.states
    }

    /// Perform one transition. Does nothing once the trial has finished.
    pub(crate) fn tick(&mut self) -> &TrialState {
        match self.state {
            TrialState::Initialize => {
                self.inject_failures();
                self.state = TrialState::Step;
            }
            TrialState::Step => {
                if self.history.len() >= self.step_budget {
                    self.state = TrialState::Exhausted;
                } else {
                    self.step();
                }
            }
            TrialState::Detected { .. } | TrialState::Exhausted => (),
        }
        &self.state
    }

    /// Tick until finished.
    pub(crate) fn run(mut self) -> TrialOutcome {
        while !self.tick().is_finished() {}
        self.into_outcome()
    }

    fn inject_failures(&mut self) {
        let eligible = &self.model.eligible;
        let amount = eligible.len().min(self.stage);
        let chosen =
            rand::seq::index::sample(&mut self.rng, eligible.len(), amount);
        self.trigger = chosen.into_iter().map(|i| eligible[i]).collect();
        self.trigger.sort_unstable();
        for id in &self.trigger {
            self.states[id.index()] = false;
        }
        trace!(
            self.log,
            "injected failures";
            "failed" => self.trigger.len(),
            "eligible" => eligible.len(),
        );
    }

    // Every instance reads the previous states, so the update is synchronous.
    fn step(&mut self) {
        let network = self.model.network;
        self.next.clear();
        for id in network.instance_ids() {
            self.inputs.clear();
            self.inputs.extend(
                network.neighbors(id).iter().map(|n| self.states[n.index()]),
            );
            let value = network.behavior(id).evaluate(
                &self.inputs,
                &self.model.input_types[id.index()],
                &mut self.rng,
            );
            self.next.push(value);
        }
        std::mem::swap(&mut self.states, &mut self.next);

        let on = self.states.iter().filter(|s| **s).count();
        self.on_states += on as u64;
        self.evaluations += self.states.len() as u64;

        let normalized =
            self.model.normalizer.normalize(&self.states, &mut self.rng);
        let step = self.history.len() + 1;
        trace!(
            self.log,
            "step";
            "step" => step,
            "on" => on,
            "normalized" => %normalized,
        );
        if let Some(start) = self.positions.get(&normalized) {
            self.state =
                TrialState::Detected { cycle: self.history[*start..].to_vec() };
        } else {
            self.positions.insert(normalized.clone(), self.history.len());
            self.history.push(normalized);
        }
    }

    fn into_outcome(self) -> TrialOutcome {
        let health_indicator_fraction = self.model.has_indicators().then(|| {
            let healthy = self
                .model
                .indicators
                .iter()
                .filter(|id| self.states[id.index()])
                .count();
            healthy as f64 / self.model.indicators.len() as f64
        });
        // The repeated state is not pushed onto the history, so the step
        // count is one more than the history length when a cycle was found.
        let (cycle, steps) = match self.state {
            TrialState::Detected { cycle } => {
                (Some(cycle), self.history.len() + 1)
            }
            _ => (None, self.history.len()),
        };
        TrialOutcome {
            trigger_key: trigger_key(&self.trigger),
            trigger: self.trigger,
            final_states: self.states,
            cycle,
            on_states: self.on_states,
            evaluations: self.evaluations,
            steps,
            health_indicator_fraction,
        }
    }
}
