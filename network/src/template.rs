// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The typed template graph a network is expanded from.

use crate::ConnectionPolicy;
use crate::TemplateError;
use indexmap::IndexMap;
use rbn_condition::DEFAULT_BEHAVIOR;
use rbn_condition::DEFAULT_HEALTH;
use swrite::{swrite, swriteln, SWrite};

/// Node types whose name starts with this prefix are health indicators unless
/// they say otherwise.
pub const HEALTH_INDICATOR_PREFIX: &str = "Health";

/// One kind of component in the template.
///
/// Conditions are kept as written and compiled when the template is expanded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeType {
    /// Identifier used by edges and by type filters in conditions.
    pub name: String,
    /// Display name.
    pub label: String,
    /// Number of instances to create, at least one.
    pub instances: usize,
    /// Condition each instance uses to compute its next state.
    pub func: String,
    /// Condition judging the health of the whole type from the states of its
    /// instances.
    pub type_condition: String,
    /// Health indicators observe the rest of the system. They are never
    /// chosen for failure injection.
    pub health_indicator: bool,
}

impl NodeType {
    pub fn new(name: impl Into<String>) -> NodeType {
        let name = name.into();
        NodeType {
            label: name.clone(),
            instances: 1,
            func: DEFAULT_BEHAVIOR.to_string(),
            type_condition: DEFAULT_HEALTH.to_string(),
            health_indicator: name.starts_with(HEALTH_INDICATOR_PREFIX),
            name,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> NodeType {
        self.label = label.into();
        self
    }

    pub fn with_instances(mut self, instances: usize) -> NodeType {
        self.instances = instances;
        self
    }

    pub fn with_func(mut self, func: impl Into<String>) -> NodeType {
        self.func = func.into();
        self
    }

    pub fn with_type_condition(
        mut self,
        type_condition: impl Into<String>,
    ) -> NodeType {
        self.type_condition = type_condition.into();
        self
    }

    pub fn with_health_indicator(mut self, health_indicator: bool) -> NodeType {
        self.health_indicator = health_indicator;
        self
    }
}

/// A directed template edge.
///
/// Several edges between the same pair of types are allowed and are expanded
/// independently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateEdge {
    pub from: String,
    pub to: String,
    pub policy: ConnectionPolicy,
}

impl TemplateEdge {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        policy: ConnectionPolicy,
    ) -> TemplateEdge {
        TemplateEdge { from: from.into(), to: to.into(), policy }
    }
}

/// A template graph: node types in declaration order, plus edges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Template {
    node_types: IndexMap<String, NodeType>,
    edges: Vec<TemplateEdge>,
}

impl Template {
    pub fn new() -> Template {
        Template::default()
    }

    /// Add a node type.
    ///
    /// Fails if a type with the same name already exists or if the type has
    /// no instances.
    pub fn add_node_type(
        &mut self,
        node_type: NodeType,
    ) -> Result<(), TemplateError> {
        if node_type.instances == 0 {
            return Err(TemplateError::ZeroInstances {
                node_type: node_type.name,
            });
        }
        if self.node_types.contains_key(&node_type.name) {
            return Err(TemplateError::DuplicateNodeType(node_type.name));
        }
        self.node_types.insert(node_type.name.clone(), node_type);
        Ok(())
    }

    /// Add an edge.
    ///
    /// Edges may name node types that don't exist. Such edges make no
    /// connections when the template is expanded.
    pub fn add_edge(&mut self, edge: TemplateEdge) {
        self.edges.push(edge);
    }

    pub fn connect(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        policy: ConnectionPolicy,
    ) {
        self.add_edge(TemplateEdge::new(from, to, policy));
    }

    pub fn node_type(&self, name: &str) -> Option<&NodeType> {
        self.node_types.get(name)
    }

    pub fn node_types(&self) -> impl ExactSizeIterator<Item = &NodeType> {
        self.node_types.values()
    }

    pub fn edges(&self) -> &[TemplateEdge] {
        &self.edges
    }

    /// The number of instances the template expands to.
    pub fn total_instances(&self) -> usize {
        self.node_types.values().map(|t| t.instances).sum()
    }

    /// Render the template in the DOT dialect accepted by
    /// [`Template::from_dot`].
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        swriteln!(out, "digraph RBN {{");
        for node_type in self.node_types.values() {
            let mut attrs = vec![
                ("label", node_type.label.clone()),
                ("instances", node_type.instances.to_string()),
                ("func", node_type.func.clone()),
            ];
            if node_type.type_condition != DEFAULT_HEALTH {
                attrs.push((
                    "type_condition",
                    node_type.type_condition.clone(),
                ));
            }
            if node_type.health_indicator
                != node_type.name.starts_with(HEALTH_INDICATOR_PREFIX)
            {
                attrs.push((
                    "health_indicator",
                    node_type.health_indicator.to_string(),
                ));
            }
            swrite!(out, "    {} [", quote(&node_type.name));
            for (i, (key, value)) in attrs.iter().enumerate() {
                if i > 0 {
                    swrite!(out, ", ");
                }
                swrite!(out, "{key}={}", quote(value));
            }
            swriteln!(out, "];");
        }
        for edge in &self.edges {
            swrite!(out, "    {} -> {}", quote(&edge.from), quote(&edge.to));
            if edge.policy != ConnectionPolicy::AllToAll {
                swrite!(out, " [label={}]", quote(&edge.policy.to_string()));
            }
            swriteln!(out, ";");
        }
        swriteln!(out, "}}");
        out
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
