// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Errors produced while compiling a condition.

/// An error compiling a condition string.
///
/// Every failure is reported when the condition is compiled. Evaluating an
/// already-compiled condition cannot fail.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("unknown function `{name}` in condition \"{condition}\"")]
    UnknownFunction { condition: String, name: String },

    #[error("malformed condition \"{condition}\" at offset {offset}: {reason}")]
    Syntax { condition: String, offset: usize, reason: String },
}

impl ConditionError {
    pub(crate) fn syntax(
        condition: &str,
        offset: usize,
        reason: impl Into<String>,
    ) -> Self {
        ConditionError::Syntax {
            condition: condition.to_string(),
            offset,
            reason: reason.into(),
        }
    }
}
