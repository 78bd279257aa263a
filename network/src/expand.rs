// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Expansion of a template into a concrete instance network.

use crate::ConnectionPolicy;
use crate::NodeType;
use crate::Template;
use crate::TemplateEdge;
use crate::TemplateError;
use rbn_condition::Condition;
use slog::{debug, info, o, warn, Logger};
use std::ops::Range;
use std::sync::Arc;

/// Identifies one instance within an [`ExpandedNetwork`].
///
/// Ids are dense indexes into the network's instance arena, assigned type by
/// type in template order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(usize);

impl InstanceId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node type after expansion, with its conditions compiled.
#[derive(Debug)]
pub struct ExpandedNodeType {
    name: String,
    label: String,
    instances: Range<usize>,
    behavior: Arc<Condition>,
    health: Condition,
    health_indicator: bool,
}

impl ExpandedNodeType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn instances(&self) -> impl ExactSizeIterator<Item = InstanceId> {
        self.instances.clone().map(InstanceId)
    }

    pub fn behavior(&self) -> &Condition {
        &self.behavior
    }

    /// The condition that judges the whole type from its instance states.
    pub fn health(&self) -> &Condition {
        &self.health
    }

    pub fn is_health_indicator(&self) -> bool {
        self.health_indicator
    }
}

#[derive(Debug)]
struct Instance {
    node_type: usize,
    // One-based position within the node type.
    sequence: usize,
    behavior: Arc<Condition>,
}

/// A fully wired instance network.
///
/// Each instance has an ordered neighbor list. During simulation the states
/// of those neighbors are the inputs of the instance's behavior condition.
/// Duplicate neighbors are kept: they count twice.
#[derive(Debug)]
pub struct ExpandedNetwork {
    node_types: Vec<ExpandedNodeType>,
    instances: Vec<Instance>,
    neighbors: Vec<Vec<InstanceId>>,
}

impl ExpandedNetwork {
    /// The number of instances, N.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instance_ids(&self) -> impl ExactSizeIterator<Item = InstanceId> {
        (0..self.instances.len()).map(InstanceId)
    }

    /// Node types in template order.
    pub fn node_types(&self) -> &[ExpandedNodeType] {
        &self.node_types
    }

    pub fn node_type(&self, name: &str) -> Option<&ExpandedNodeType> {
        self.node_types.iter().find(|t| t.name == name)
    }

    pub fn node_type_of(&self, id: InstanceId) -> &ExpandedNodeType {
        &self.node_types[self.instances[id.0].node_type]
    }

    /// The one-based sequence number of an instance within its type.
    pub fn sequence(&self, id: InstanceId) -> usize {
        self.instances[id.0].sequence
    }

    /// The instance name, `"<NodeType> <k>"`.
    pub fn instance_name(&self, id: InstanceId) -> String {
        format!("{} {}", self.node_type_of(id).name, self.sequence(id))
    }

    /// The instance display label, `"<Label> <k>"`.
    pub fn instance_label(&self, id: InstanceId) -> String {
        format!("{} {}", self.node_type_of(id).label, self.sequence(id))
    }

    pub fn find_instance(&self, name: &str) -> Option<InstanceId> {
        let (type_name, sequence) = name.rsplit_once(' ')?;
        let sequence: usize = sequence.parse().ok()?;
        let node_type = self.node_type(type_name)?;
        node_type.instances().nth(sequence.checked_sub(1)?)
    }

    pub fn behavior(&self, id: InstanceId) -> &Arc<Condition> {
        &self.instances[id.0].behavior
    }

    /// The instances whose states feed this instance's behavior.
    pub fn neighbors(&self, id: InstanceId) -> &[InstanceId] {
        &self.neighbors[id.0]
    }

    /// Type tags parallel to [`ExpandedNetwork::neighbors`].
    pub fn input_types(
        &self,
        id: InstanceId,
    ) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.neighbors[id.0]
            .iter()
            .map(|neighbor| self.node_type_of(*neighbor).name.as_str())
    }

    /// The total number of connections, counting duplicates.
    pub fn connection_count(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum()
    }

    /// How many neighbor lists each instance appears in, with multiplicity.
    pub fn inbound_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.instances.len()];
        for neighbor in self.neighbors.iter().flatten() {
            counts[neighbor.0] += 1;
        }
        counts
    }

    /// Average connectivity, K̄: connections per instance.
    pub fn average_k(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.connection_count() as f64 / self.len() as f64
        }
    }

    /// Maximum inbound connections of any instance, K_max.
    pub fn max_k(&self) -> usize {
        self.inbound_counts().into_iter().max().unwrap_or(0)
    }
}

// Neighbor lists under construction, plus how many connections each target
// has been assigned so far. Counts are shared by every edge in the template.
struct Wiring {
    neighbors: Vec<Vec<InstanceId>>,
    assigned: Vec<usize>,
}

impl Wiring {
    fn new(len: usize) -> Wiring {
        Wiring { neighbors: vec![Vec::new(); len], assigned: vec![0; len] }
    }

    fn assign(&mut self, source: usize, target: usize) {
        self.neighbors[source].push(InstanceId(target));
        self.assigned[target] += 1;
    }

    // Targets ordered by ascending assigned count. The sort is stable, so
    // ties keep instance order.
    fn by_load(&self, targets: impl Iterator<Item = usize>) -> Vec<usize> {
        let mut targets: Vec<usize> = targets.collect();
        targets.sort_by_key(|target| self.assigned[*target]);
        targets
    }

    fn connect(
        &mut self,
        policy: ConnectionPolicy,
        sources: Range<usize>,
        targets: Range<usize>,
        instances: &[Instance],
    ) -> usize {
        let before: usize = self.neighbors.iter().map(Vec::len).sum();
        for source in sources {
            match policy {
                ConnectionPolicy::AllToAll => {
                    let targets = self.by_load(
                        targets.clone().filter(|target| *target != source),
                    );
                    for target in targets {
                        self.assign(source, target);
                    }
                }
                ConnectionPolicy::Ratio(k) => {
                    if targets.is_empty() {
                        continue;
                    }
                    let mut remaining = k;
                    while remaining > 0 {
                        let round = self.by_load(targets.clone());
                        let limit =
                            usize::try_from(remaining).unwrap_or(usize::MAX);
                        let take = round.len().min(limit);
                        for target in round.into_iter().take(take) {
                            self.assign(source, target);
                        }
                        remaining -= take as u64;
                    }
                }
                ConnectionPolicy::SelfLoop => self.assign(source, source),
                ConnectionPolicy::Modulo(modulus) => {
                    let modulus = modulus as usize;
                    let group = instances[source].sequence % modulus;
                    let targets = self.by_load(targets.clone().filter(|t| {
                        instances[*t].sequence % modulus == group
                    }));
                    for target in targets {
                        self.assign(source, target);
                    }
                }
            }
        }
        let after: usize = self.neighbors.iter().map(Vec::len).sum();
        after - before
    }
}

fn compile(
    node_type: &NodeType,
    attribute: &'static str,
    condition: &str,
) -> Result<Condition, TemplateError> {
    Condition::new(condition).map_err(|err| TemplateError::Condition {
        node_type: node_type.name.clone(),
        attribute,
        err,
    })
}

/// Expand a template into an instance network.
///
/// Every node type becomes `instances` instances named `"<Name> <k>"` for
/// `k = 1..=instances`, each sharing the type's compiled behavior condition.
/// Edges are then wired in template order according to their
/// [`ConnectionPolicy`].
///
/// An edge naming a node type that doesn't exist makes no connections. This
/// is logged but is not an error.
pub fn expand(
    log: &Logger,
    template: &Template,
) -> Result<ExpandedNetwork, TemplateError> {
    let log = log.new(o!("component" => "NetworkExpander"));

    let mut node_types = Vec::with_capacity(template.node_types().len());
    let mut instances = Vec::with_capacity(template.total_instances());
    for (index, node_type) in template.node_types().enumerate() {
        if node_type.instances == 0 {
            return Err(TemplateError::ZeroInstances {
                node_type: node_type.name.clone(),
            });
        }
        let behavior = Arc::new(compile(node_type, "func", &node_type.func)?);
        let health =
            compile(node_type, "type_condition", &node_type.type_condition)?;

        let start = instances.len();
        instances.extend((1..=node_type.instances).map(|sequence| Instance {
            node_type: index,
            sequence,
            behavior: Arc::clone(&behavior),
        }));
        node_types.push(ExpandedNodeType {
            name: node_type.name.clone(),
            label: node_type.label.clone(),
            instances: start..instances.len(),
            behavior,
            health,
            health_indicator: node_type.health_indicator,
        });
    }

    let range_of = |name: &str| {
        node_types.iter().find(|t| t.name == name).map(|t| t.instances.clone())
    };

    let mut wiring = Wiring::new(instances.len());
    for TemplateEdge { from, to, policy } in template.edges() {
        policy.check()?;
        if *policy == ConnectionPolicy::SelfLoop && from != to {
            return Err(TemplateError::SelfPolicyAcrossTypes {
                from: from.clone(),
                to: to.clone(),
            });
        }
        let (Some(sources), Some(targets)) = (range_of(from), range_of(to))
        else {
            warn!(
                log,
                "edge endpoint matches no instances, skipping";
                "from" => from,
                "to" => to,
            );
            continue;
        };
        let made = wiring.connect(
            *policy,
            sources.clone(),
            targets.clone(),
            &instances,
        );
        debug!(
            log,
            "expanded edge";
            "from" => from,
            "to" => to,
            "policy" => %policy,
            "sources" => sources.len(),
            "targets" => targets.len(),
            "connections" => made,
        );
    }

    let network =
        ExpandedNetwork { node_types, instances, neighbors: wiring.neighbors };
    info!(
        log,
        "expanded template";
        "node_types" => network.node_types.len(),
        "n" => network.len(),
        "connections" => network.connection_count(),
        "average_k" => network.average_k(),
        "max_k" => network.max_k(),
    );
    Ok(network)
}
