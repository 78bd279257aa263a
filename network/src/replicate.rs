// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building redundant systems by replicating a template.

use crate::NodeType;
use crate::Template;
use crate::TemplateEdge;
use crate::TemplateError;
use rbn_condition::Condition;

fn replica_name(name: &str, replica: usize) -> String {
    format!("{name}_{replica}")
}

// Point every type filter in `condition` at the same replica. Conditions
// without filters are kept exactly as written.
fn rename_filters(
    node_type: &NodeType,
    attribute: &'static str,
    condition: &str,
    replica: usize,
) -> Result<String, TemplateError> {
    let compiled = Condition::new(condition).map_err(|err| {
        TemplateError::Condition {
            node_type: node_type.name.clone(),
            attribute,
            err,
        }
    })?;
    if compiled.referenced_node_types().is_empty() {
        return Ok(condition.to_string());
    }
    Ok(compiled
        .map_node_types(|name| replica_name(name, replica))
        .as_str()
        .to_string())
}

impl Template {
    /// Make a template containing `replicas` independent copies of this one.
    ///
    /// Copy `i` (one-based) of node type `Name` is named `Name_i`, and its
    /// label has spaces replaced with underscores and gets the same suffix.
    /// Edges are copied within each replica only. Type filters in `func` and
    /// `type_condition` are rewritten to refer to types of the same replica,
    /// so `or(A)` in replica 2 becomes `or(A_2)`.
    pub fn replicate(
        &self,
        replicas: usize,
    ) -> Result<Template, TemplateError> {
        let mut replicated = Template::new();
        for node_type in self.node_types() {
            for replica in 1..=replicas {
                replicated.add_node_type(NodeType {
                    name: replica_name(&node_type.name, replica),
                    label: replica_name(
                        &node_type.label.replace(' ', "_"),
                        replica,
                    ),
                    instances: node_type.instances,
                    func: rename_filters(
                        node_type,
                        "func",
                        &node_type.func,
                        replica,
                    )?,
                    type_condition: rename_filters(
                        node_type,
                        "type_condition",
                        &node_type.type_condition,
                        replica,
                    )?,
                    health_indicator: node_type.health_indicator,
                })?;
            }
        }
        for edge in self.edges() {
            for replica in 1..=replicas {
                replicated.add_edge(TemplateEdge::new(
                    replica_name(&edge.from, replica),
                    replica_name(&edge.to, replica),
                    edge.policy,
                ));
            }
        }
        Ok(replicated)
    }
}
