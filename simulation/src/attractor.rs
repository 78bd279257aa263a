// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The collection of attractors found by a sweep.

use crate::config::ConfigError;
use crate::config::TriggerCounterConfig;
use crate::counter::CardinalityEstimator;
use crate::counter::TriggerCounter;
use crate::state::canonicalize;
use crate::state::NormalizedState;
use highway::HighwayHasher;
use serde::ser::SerializeStruct;
use serde::Serialize;
use serde::Serializer;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hasher;

/// A stable identifier derived from an attractor's canonical cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttractorId(u64);

impl AttractorId {
    fn of(cycle: &[NormalizedState]) -> AttractorId {
        let mut hasher = HighwayHasher::default();
        hasher.write_usize(cycle.len());
        for state in cycle {
            hasher.write_usize(state.len());
            for verdict in state.verdicts() {
                hasher.write_u8(u8::from(*verdict));
            }
        }
        AttractorId(hasher.finish())
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// The first eight hex digits, for display in tables.
    pub fn short(self) -> String {
        format!("{:08x}", self.0 >> 32)
    }
}

impl fmt::Display for AttractorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for AttractorId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// One attractor: a canonical cycle of normalized states, how many trials
/// ended in it, and how many distinct failure sets led into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attractor {
    id: AttractorId,
    cycle: Vec<NormalizedState>,
    occurrences: u64,
    triggers: TriggerCounter,
}

impl Attractor {
    pub fn id(&self) -> AttractorId {
        self.id
    }

    /// The cycle, starting from its lexicographically smallest state.
    pub fn cycle(&self) -> &[NormalizedState] {
        &self.cycle
    }

    /// Cycle length. A fixed point has length 1.
    pub fn len(&self) -> usize {
        self.cycle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycle.is_empty()
    }

    pub fn is_fixed_point(&self) -> bool {
        self.cycle.len() == 1
    }

    pub fn occurrences(&self) -> u64 {
        self.occurrences
    }

    /// The estimated number of distinct triggering events.
    pub fn distinct_triggers(&self) -> u64 {
        self.triggers.approximate_count()
    }
}

impl Serialize for Attractor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Attractor", 4)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("cycle", &self.cycle)?;
        state.serialize_field("occurrences", &self.occurrences)?;
        state.serialize_field("distinct_triggers", &self.distinct_triggers())?;
        state.end()
    }
}

/// Attractors keyed by canonical cycle.
///
/// Identity depends only on cycle content, so the same collection results
/// regardless of the order in which trials are recorded or merged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attractors {
    node_types: Vec<String>,
    // An empty counter that new attractors start from.
    empty_counter: TriggerCounter,
    attractors: BTreeMap<Vec<NormalizedState>, Attractor>,
    // Canonical cycle of each attractor, by id.
    by_id: BTreeMap<AttractorId, Vec<NormalizedState>>,
}

impl Attractors {
    /// Create an empty collection over the given node types, in the order
    /// their verdicts appear in each [`NormalizedState`].
    pub fn new<I, S>(
        node_types: I,
        counter: TriggerCounterConfig,
    ) -> Result<Attractors, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Attractors {
            node_types: node_types.into_iter().map(Into::into).collect(),
            empty_counter: TriggerCounter::new(counter)?,
            attractors: BTreeMap::new(),
            by_id: BTreeMap::new(),
        })
    }

    pub fn node_types(&self) -> &[String] {
        &self.node_types
    }

    pub fn counter_config(&self) -> TriggerCounterConfig {
        self.empty_counter.config()
    }

    /// Record one trial that ended in `cycle`, started from the failure set
    /// identified by `trigger_key`.
    ///
    /// `cycle` may start at any phase. Returns the attractor it was folded
    /// into.
    pub fn record(
        &mut self,
        cycle: &[NormalizedState],
        trigger_key: u64,
    ) -> &Attractor {
        let canonical = canonicalize(cycle);
        let by_id = &mut self.by_id;
        let empty_counter = &self.empty_counter;
        let attractor =
            self.attractors.entry(canonical).or_insert_with_key(|canonical| {
                let id = AttractorId::of(canonical);
                by_id.insert(id, canonical.clone());
                Attractor {
                    id,
                    cycle: canonical.clone(),
                    occurrences: 0,
                    triggers: empty_counter.clone(),
                }
            });
        attractor.occurrences += 1;
        attractor.triggers.add(trigger_key);
        attractor
    }

    /// The number of distinct attractors.
    pub fn count(&self) -> usize {
        self.attractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attractors.is_empty()
    }

    /// The number of trials folded into this collection.
    pub fn total_runs(&self) -> u64 {
        self.attractors.values().map(|a| a.occurrences).sum()
    }

    /// Attractors in canonical cycle order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Attractor> {
        self.attractors.values()
    }

    pub fn get(&self, id: AttractorId) -> Option<&Attractor> {
        self.by_id.get(&id).and_then(|cycle| self.attractors.get(cycle))
    }

    /// Fold another collection into this one.
    ///
    /// Both must describe the same node types and count triggers the same
    /// way.
    pub fn merge(&mut self, other: &Attractors) -> Result<(), ConfigError> {
        if self.node_types != other.node_types {
            return Err(ConfigError::IncompatibleNodeTypes);
        }
        if self.counter_config() != other.counter_config() {
            return Err(ConfigError::IncompatibleCounters {
                ours: self.counter_config(),
                theirs: other.counter_config(),
            });
        }
        for (cycle, theirs) in &other.attractors {
            match self.attractors.get_mut(cycle) {
                Some(ours) => {
                    ours.occurrences += theirs.occurrences;
                    ours.triggers.merge(&theirs.triggers)?;
                }
                None => {
                    self.by_id.insert(theirs.id, cycle.clone());
                    self.attractors.insert(cycle.clone(), theirs.clone());
                }
            }
        }
        Ok(())
    }

    /// Which node types stay failed in which attractors.
    pub fn incidence(&self) -> IncidenceMatrix {
        let cells = self
            .attractors
            .values()
            .map(|attractor| {
                (0..self.node_types.len())
                    .map(|column| {
                        attractor
                            .cycle
                            .iter()
                            .all(|state| !state.verdicts()[column])
                    })
                    .collect()
            })
            .collect();
        IncidenceMatrix {
            node_types: self.node_types.clone(),
            attractors: self.attractors.values().map(|a| a.id).collect(),
            cells,
        }
    }
}

impl Serialize for Attractors {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Attractors", 4)?;
        state.serialize_field("node_types", &self.node_types)?;
        state.serialize_field("trigger_counter", &self.counter_config())?;
        state.serialize_field("total_runs", &self.total_runs())?;
        let attractors: Vec<&Attractor> = self.attractors.values().collect();
        state.serialize_field("attractors", &attractors)?;
        state.end()
    }
}

/// Attractors (rows) against node types (columns). A cell is set when the
/// type's health verdict is false in every state of the attractor's cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IncidenceMatrix {
    pub node_types: Vec<String>,
    pub attractors: Vec<AttractorId>,
    pub cells: Vec<Vec<bool>>,
}

impl IncidenceMatrix {
    /// The number of failed node types in each attractor.
    pub fn row_totals(&self) -> Vec<usize> {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|cell| **cell).count())
            .collect()
    }

    /// The number of attractors each node type is failed in.
    pub fn column_totals(&self) -> Vec<usize> {
        (0..self.node_types.len())
            .map(|column| self.cells.iter().filter(|row| row[column]).count())
            .collect()
    }
}
