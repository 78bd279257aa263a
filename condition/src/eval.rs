// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Evaluation of condition trees over input vectors.

use crate::ast::CompoundCondition;
use crate::ast::ConditionExpr;
use crate::ast::LogicalOp;
use crate::ast::Primitive;
use crate::ast::SimpleCondition;
use rand::Rng;

/// The value `copy` produces when its selected input set is empty.
///
/// An instance with nothing to copy from is treated as unaffected.
pub const EMPTY_COPY_VALUE: bool = true;

// Summary of the selected inputs, enough to apply every primitive except
// `random`, which needs to look at the inputs themselves.
#[derive(Clone, Copy, Debug, Default)]
struct Tally {
    len: usize,
    trues: usize,
    first: Option<bool>,
}

impl Tally {
    fn of(values: impl Iterator<Item = bool>) -> Tally {
        values.fold(Tally::default(), |mut tally, value| {
            tally.len += 1;
            tally.trues += usize::from(value);
            tally.first.get_or_insert(value);
            tally
        })
    }
}

impl SimpleCondition {
    // The selected inputs, in input order.
    fn selected<'a, T: AsRef<str>>(
        &'a self,
        inputs: &'a [bool],
        input_types: &'a [T],
    ) -> Box<dyn Iterator<Item = bool> + 'a> {
        match &self.selection {
            None => Box::new(inputs.iter().copied()),
            Some(selection) => Box::new(
                inputs
                    .iter()
                    .zip(input_types)
                    .enumerate()
                    .filter(move |(position, (_, ty))| {
                        selection.matches(*position, AsRef::<str>::as_ref(*ty))
                    })
                    .map(|(_, (value, _))| *value),
            ),
        }
    }

    pub(crate) fn evaluate<T, R>(
        &self,
        inputs: &[bool],
        input_types: &[T],
        rng: &mut R,
    ) -> bool
    where
        T: AsRef<str>,
        R: Rng,
    {
        let Tally { len, trues, first } =
            Tally::of(self.selected(inputs, input_types));
        match self.primitive {
            Primitive::True => true,
            Primitive::False => false,
            Primitive::And => trues == len,
            Primitive::Or => trues > 0,
            Primitive::Nand => trues < len,
            Primitive::Nor => trues == 0,
            Primitive::Xor => trues % 2 == 1,
            Primitive::Majority => 2 * trues >= len,
            Primitive::Minority => 2 * trues < len,
            Primitive::Percentage(p) => trues * 100 >= len * usize::from(p),
            Primitive::Copy => first.unwrap_or(EMPTY_COPY_VALUE),
            Primitive::Random => {
                if len == 0 {
                    rng.gen()
                } else {
                    // Draw from the inputs that are actually present, so the
                    // result is biased toward the observed mix.
                    let index = rng.gen_range(0..len);
                    self.selected(inputs, input_types)
                        .nth(index)
                        .unwrap_or(false)
                }
            }
        }
    }
}

impl ConditionExpr {
    pub(crate) fn evaluate<T, R>(
        &self,
        inputs: &[bool],
        input_types: &[T],
        rng: &mut R,
    ) -> bool
    where
        T: AsRef<str>,
        R: Rng,
    {
        match self {
            ConditionExpr::Simple(simple) => {
                simple.evaluate(inputs, input_types, rng)
            }
            ConditionExpr::Compound(CompoundCondition { left, op, right }) => {
                match op {
                    LogicalOp::And => {
                        left.evaluate(inputs, input_types, rng)
                            && right.evaluate(inputs, input_types, rng)
                    }
                    LogicalOp::Or => {
                        left.evaluate(inputs, input_types, rng)
                            || right.evaluate(inputs, input_types, rng)
                    }
                }
            }
        }
    }
}
