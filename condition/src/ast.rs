// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! AST nodes for compiled conditions.

use std::fmt;

/// Logical operators joining two conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                LogicalOp::And => "&",
                LogicalOp::Or => "|",
            }
        )
    }
}

/// A built-in Boolean function applied to a set of inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    /// All inputs are true. Also spelled `all`.
    And,
    /// Any input is true. Also spelled `one`.
    Or,
    /// Not all inputs are true.
    Nand,
    /// No input is true. Also spelled `none`.
    Nor,
    /// An odd number of inputs are true.
    Xor,
    /// At least half of the inputs are true.
    Majority,
    /// Fewer than half of the inputs are true.
    Minority,
    /// A value drawn from the inputs themselves, or a fair coin without any.
    Random,
    /// The first input.
    Copy,
    True,
    False,
    /// At least this percentage of the inputs are true.
    Percentage(u8),
}

impl Primitive {
    /// Look up a named primitive.
    ///
    /// Percentages are not named and are handled by the parser.
    pub fn from_name(name: &str) -> Option<Primitive> {
        let primitive = match name {
            "and" | "all" => Primitive::And,
            "or" | "one" => Primitive::Or,
            "nand" => Primitive::Nand,
            "nor" | "none" => Primitive::Nor,
            "xor" => Primitive::Xor,
            "majority" => Primitive::Majority,
            "minority" => Primitive::Minority,
            "random" => Primitive::Random,
            "copy" => Primitive::Copy,
            "true" => Primitive::True,
            "false" => Primitive::False,
            _ => return None,
        };
        Some(primitive)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Primitive::And => write!(f, "and"),
            Primitive::Or => write!(f, "or"),
            Primitive::Nand => write!(f, "nand"),
            Primitive::Nor => write!(f, "nor"),
            Primitive::Xor => write!(f, "xor"),
            Primitive::Majority => write!(f, "majority"),
            Primitive::Minority => write!(f, "minority"),
            Primitive::Random => write!(f, "random"),
            Primitive::Copy => write!(f, "copy"),
            Primitive::True => write!(f, "true"),
            Primitive::False => write!(f, "false"),
            Primitive::Percentage(p) => write!(f, "{p}%"),
        }
    }
}

/// Restrict the `index % modulus == group` positions of the input list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Modulo {
    pub modulus: u32,
    pub group: u32,
}

/// A filter selecting a subset of the inputs.
///
/// The node type and the modulo group are combined: an input at position `i`
/// of the full input list is selected only if its type tag is `node_type` and,
/// when present, `i % modulus == group`. Positions always refer to the full,
/// unfiltered list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub node_type: String,
    pub modulo: Option<Modulo>,
}

impl Selection {
    pub fn matches(&self, position: usize, node_type: &str) -> bool {
        if node_type != self.node_type {
            return false;
        }
        match self.modulo {
            None => true,
            Some(Modulo { modulus, group }) => u32::try_from(position)
                .is_ok_and(|position| position % modulus == group),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}", self.node_type)?;
        if let Some(Modulo { modulus, group }) = self.modulo {
            write!(f, ", mod={modulus}, group={group}")?;
        }
        write!(f, ")")
    }
}

/// A single primitive, optionally applied to a selection of the inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleCondition {
    pub primitive: Primitive,
    pub selection: Option<Selection>,
}

impl fmt::Display for SimpleCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.primitive)?;
        if let Some(selection) = &self.selection {
            write!(f, "{selection}")?;
        }
        Ok(())
    }
}

/// Two conditions joined by a logical operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompoundCondition {
    pub left: Box<ConditionExpr>,
    pub op: LogicalOp,
    pub right: Box<ConditionExpr>,
}

/// A node in the condition tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConditionExpr {
    Simple(SimpleCondition),
    Compound(CompoundCondition),
}

impl ConditionExpr {
    pub(crate) fn compound(
        left: ConditionExpr,
        op: LogicalOp,
        right: ConditionExpr,
    ) -> ConditionExpr {
        ConditionExpr::Compound(CompoundCondition {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    /// Visit every simple condition in the tree, left to right.
    pub fn for_each_simple<'a>(
        &'a self,
        f: &mut impl FnMut(&'a SimpleCondition),
    ) {
        match self {
            ConditionExpr::Simple(simple) => f(simple),
            ConditionExpr::Compound(CompoundCondition { left, right, .. }) => {
                left.for_each_simple(f);
                right.for_each_simple(f);
            }
        }
    }

    /// Visit every selection in the tree mutably, left to right.
    pub fn for_each_selection_mut(
        &mut self,
        f: &mut impl FnMut(&mut Selection),
    ) {
        match self {
            ConditionExpr::Simple(SimpleCondition { selection, .. }) => {
                if let Some(selection) = selection {
                    f(selection);
                }
            }
            ConditionExpr::Compound(CompoundCondition { left, right, .. }) => {
                left.for_each_selection_mut(f);
                right.for_each_selection_mut(f);
            }
        }
    }
}

impl fmt::Display for ConditionExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConditionExpr::Simple(simple) => write!(f, "{simple}"),
            ConditionExpr::Compound(CompoundCondition { left, op, right }) => {
                // `&` binds tighter than `|`, so an `|` nested under an `&`
                // needs parentheses to survive a round trip.
                let needs_parens = |expr: &ConditionExpr| {
                    *op == LogicalOp::And
                        && matches!(
                            expr,
                            ConditionExpr::Compound(CompoundCondition {
                                op: LogicalOp::Or,
                                ..
                            })
                        )
                };
                if needs_parens(left) {
                    write!(f, "({left})")?;
                } else {
                    write!(f, "{left}")?;
                }
                write!(f, " {op} ")?;
                // Chains fold to the left, so a compound on the right with
                // the same operator came from explicit parentheses.
                if needs_parens(right)
                    || matches!(
                        right.as_ref(),
                        ConditionExpr::Compound(CompoundCondition {
                            op: inner, ..
                        }) if inner == op
                    )
                {
                    write!(f, "({right})")
                } else {
                    write!(f, "{right}")
                }
            }
        }
    }
}
