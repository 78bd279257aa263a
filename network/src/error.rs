// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use camino::Utf8PathBuf;
use rbn_condition::ConditionError;

/// An error describing why a template cannot be loaded or expanded.
///
/// All of these are fatal. They are reported before any simulation starts and
/// no partially expanded network is ever returned alongside one.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template {path}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("malformed template at offset {offset}: {reason}")]
    Parse { offset: usize, reason: String },

    #[error("node type \"{0}\" is declared more than once")]
    DuplicateNodeType(String),

    #[error("node type \"{node_type}\" must have at least one instance")]
    ZeroInstances { node_type: String },

    #[error("node type \"{node_type}\" has invalid instance count \"{value}\"")]
    InvalidInstances { node_type: String, value: String },

    #[error(
        "node type \"{node_type}\" has invalid value \"{value}\" for \
        attribute `{attribute}`"
    )]
    InvalidAttribute { node_type: String, attribute: String, value: String },

    #[error("node type \"{node_type}\" has an invalid `{attribute}` condition")]
    Condition {
        node_type: String,
        attribute: &'static str,
        #[source]
        err: ConditionError,
    },

    #[error("invalid connection policy \"{label}\": {reason}")]
    InvalidPolicy { label: String, reason: String },

    #[error(
        "edge {from} -> {to} uses \"1 to self\", which requires both ends \
        to be the same node type"
    )]
    SelfPolicyAcrossTypes { from: String, to: String },
}
