// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Random template generation, for exploring how structure affects
//! resilience.

use crate::ConnectionPolicy;
use crate::NodeType;
use crate::Template;
use crate::TemplateError;
use indexmap::IndexSet;
use rand::seq::SliceRandom;
use rand::Rng;
use rbn_condition::Condition;
use rbn_condition::DEFAULT_BEHAVIOR;

/// Parameters for [`random_template`].
#[derive(Clone, Debug)]
pub struct RandomTemplateParams {
    /// Number of candidate node types, named `N0` through `N{n-1}`.
    pub node_types: usize,
    /// Maximum total degree (in plus out) of any node type.
    pub max_degree: usize,
    /// Behavior conditions to draw from.
    pub functions: Vec<String>,
    pub min_instances: usize,
    /// Never less than `min_instances`.
    pub max_instances: usize,
    /// Stop after this many consecutive rejected candidate edges.
    pub max_attempts: usize,
}

impl Default for RandomTemplateParams {
    fn default() -> Self {
        RandomTemplateParams {
            node_types: 10,
            max_degree: 3,
            functions: vec!["and".into(), "or".into(), "xor".into()],
            min_instances: 1,
            max_instances: 1,
            max_attempts: 1000,
        }
    }
}

/// Generate a random template.
///
/// Candidate edges between two distinct node types are drawn uniformly and
/// kept if the pair isn't already connected and both endpoints are below
/// `max_degree`. Only node types that end up with at least one edge are
/// included.
pub fn random_template<R: Rng>(
    params: &RandomTemplateParams,
    rng: &mut R,
) -> Result<Template, TemplateError> {
    let names: Vec<String> =
        (0..params.node_types).map(|i| format!("N{i}")).collect();
    for function in &params.functions {
        if let Err(err) = Condition::new(function) {
            return Err(TemplateError::Condition {
                node_type: String::from("*"),
                attribute: "func",
                err,
            });
        }
    }

    let mut edges: IndexSet<(usize, usize)> = IndexSet::new();
    let mut degree = vec![0; names.len()];
    let mut attempts = 0;
    while !names.is_empty() && attempts < params.max_attempts {
        let from = rng.gen_range(0..names.len());
        let to = rng.gen_range(0..names.len());
        if from != to
            && degree[from] < params.max_degree
            && degree[to] < params.max_degree
            && edges.insert((from, to))
        {
            degree[from] += 1;
            degree[to] += 1;
            attempts = 0;
        } else {
            attempts += 1;
        }
    }

    let mut template = Template::new();
    let max_instances = params.max_instances.max(params.min_instances);
    for (index, name) in names.iter().enumerate() {
        if degree[index] == 0 {
            continue;
        }
        let func = params
            .functions
            .choose(rng)
            .map(String::as_str)
            .unwrap_or(DEFAULT_BEHAVIOR);
        let instances = rng.gen_range(params.min_instances..=max_instances);
        template.add_node_type(
            NodeType::new(name.clone())
                .with_func(func)
                .with_instances(instances),
        )?;
    }
    for (from, to) in edges {
        template.connect(
            names[from].clone(),
            names[to].clone(),
            ConnectionPolicy::AllToAll,
        );
    }
    Ok(template)
}
