// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalized states and cycle canonicalization.

use rand::Rng;
use rbn_condition::Condition;
use rbn_network::ExpandedNetwork;
use rbn_network::InstanceId;
use serde::Serialize;
use serde::Serializer;
use std::fmt;
use std::ops::Range;

/// The health verdict of every node type at one step.
///
/// Verdicts are ordered by node type name, so two states compare equal
/// exactly when every type has the same verdict. The ordering is
/// lexicographic with `false < true`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedState(Vec<bool>);

impl NormalizedState {
    pub fn new(verdicts: Vec<bool>) -> NormalizedState {
        NormalizedState(verdicts)
    }

    pub fn verdicts(&self) -> &[bool] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Renders as one `0`/`1` digit per node type.
impl fmt::Display for NormalizedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for verdict in &self.0 {
            f.write_str(if *verdict { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl Serialize for NormalizedState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Rotate a cycle so that it starts at its lexicographically smallest
/// rotation.
///
/// Any rotation of the same cycle canonicalizes to the same sequence.
pub fn canonicalize(cycle: &[NormalizedState]) -> Vec<NormalizedState> {
    let rotated = |start: usize| cycle[start..].iter().chain(&cycle[..start]);
    let Some(best) =
        (0..cycle.len()).min_by(|a, b| rotated(*a).cmp(rotated(*b)))
    else {
        return Vec::new();
    };
    rotated(best).cloned().collect()
}

struct Column<'a> {
    instances: Range<usize>,
    health: &'a Condition,
    tags: Vec<&'a str>,
}

/// Computes [`NormalizedState`]s from raw instance states.
pub struct Normalizer<'a> {
    columns: Vec<Column<'a>>,
    names: Vec<&'a str>,
}

impl<'a> Normalizer<'a> {
    pub fn new(network: &'a ExpandedNetwork) -> Normalizer<'a> {
        let mut node_types: Vec<_> = network.node_types().iter().collect();
        node_types.sort_by(|a, b| a.name().cmp(b.name()));

        let names = node_types.iter().copied().map(|t| t.name()).collect();
        let columns = node_types
            .into_iter()
            .map(|node_type| {
                let mut ids = node_type.instances();
                let start = ids.next().map_or(0, InstanceId::index);
                Column {
                    instances: start..start + node_type.instance_count(),
                    health: node_type.health(),
                    tags: vec![node_type.name(); node_type.instance_count()],
                }
            })
            .collect();
        Normalizer { columns, names }
    }

    /// Node type names in column order.
    pub fn node_types(&self) -> &[&'a str] {
        &self.names
    }

    /// Evaluate every type's health condition over its instances' states.
    ///
    /// `rng` is only used by health conditions that draw at random.
    pub fn normalize<R: Rng>(
        &self,
        states: &[bool],
        rng: &mut R,
    ) -> NormalizedState {
        NormalizedState(
            self.columns
                .iter()
                .map(|column| {
                    column.health.evaluate(
                        &states[column.instances.clone()],
                        &column.tags,
                        rng,
                    )
                })
                .collect(),
        )
    }
}
