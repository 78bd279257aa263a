// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Template graphs and their expansion into random Boolean networks.
//!
//! A [`Template`] describes a system as a small graph of node types. Each node
//! type says how many instances exist and which condition they use to update
//! their state; each edge says how the instances of two types are wired
//! together (see [`ConnectionPolicy`]). [`expand`] turns a template into an
//! [`ExpandedNetwork`], the instance level graph the simulator runs on.
//!
//! Templates are usually loaded from Graphviz DOT files with
//! [`Template::from_file`], but can also be built in code, replicated with
//! [`Template::replicate`], or generated with [`random_template`].

mod dot;
mod error;
mod expand;
mod generate;
mod policy;
mod replicate;
mod template;

pub use error::TemplateError;
pub use expand::expand;
pub use expand::ExpandedNetwork;
pub use expand::ExpandedNodeType;
pub use expand::InstanceId;
pub use generate::random_template;
pub use generate::RandomTemplateParams;
pub use policy::ConnectionPolicy;
pub use policy::MAX_RATIO;
pub use template::NodeType;
pub use template::Template;
pub use template::TemplateEdge;
pub use template::HEALTH_INDICATOR_PREFIX;
