// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Failure sweeps over random Boolean networks.
//!
//! A [`Simulation`] runs many independent trials over an
//! [`ExpandedNetwork`](rbn_network::ExpandedNetwork). Each trial starts from
//! the all-healthy state, forces a random set of instances to fail, and then
//! updates every instance synchronously until the network's
//! [`NormalizedState`] repeats. The repeating cycle is an attractor. Attractors
//! are identified by their canonical rotation, so the same cycle entered at
//! different phases is counted once, and each attractor estimates how many
//! distinct failure sets led into it.
//!
//! Trials are grouped into stages: stage `s` fails `s` instances. The
//! resulting [`SimulationSummary`] holds per-stage health by node type, the
//! attractor collection, and the network's Kauffman parameters.

mod attractor;
mod config;
mod counter;
mod simulation;
mod state;
mod trial;

pub use attractor::Attractor;
pub use attractor::AttractorId;
pub use attractor::Attractors;
pub use attractor::IncidenceMatrix;
pub use config::ConfigError;
pub use config::LoadError;
pub use config::SimulationConfig;
pub use config::TriggerCounterConfig;
pub use config::HYPER_LOG_LOG_PRECISIONS;
pub use counter::CardinalityEstimator;
pub use counter::ExactCounter;
pub use counter::HyperLogLog;
pub use counter::TriggerCounter;
pub use simulation::Simulation;
pub use simulation::SimulationSummary;
pub use simulation::StageSummary;
pub use state::canonicalize;
pub use state::NormalizedState;
pub use state::Normalizer;
pub use trial::TrialOutcome;
pub use trial::TrialState;
