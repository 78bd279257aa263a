// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A small Boolean condition language.
//!
//! Every instance in a random Boolean network computes its next state by
//! evaluating a condition over the current states of its inputs. Conditions
//! are written as strings, e.g.
//!
//! ```text
//! one(Power) & (50%(Cooling) | all(Cooling, mod=2, group=0))
//! ```
//!
//! and compiled once with [`compile`] (or [`Condition::new`]). All syntax
//! errors and unknown function names are reported at compile time; evaluation
//! never fails.
//!
//! Each input carries a type tag, the name of the node type it is an instance
//! of. A primitive may be restricted to the inputs of a single type, and
//! further to every `M`th input position, see [`ast::Selection`].
//!
//! # Empty input sets
//!
//! Every primitive is defined on an empty input set. Quantifiers take their
//! vacuous value (`and` is true, `or` is false, `nand` is false, `nor` is true,
//! `xor` is false, `majority` and `NN%` are true, `minority` is false). `copy`
//! has no vacuous value and yields [`EMPTY_COPY_VALUE`]. `random` flips a fair
//! coin.

pub mod ast;
mod error;
mod eval;
mod grammar;

pub use ast::ConditionExpr;
pub use ast::LogicalOp;
pub use ast::Primitive;
pub use error::ConditionError;
pub use eval::EMPTY_COPY_VALUE;

use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The condition used when a node type doesn't specify a behavior.
pub const DEFAULT_BEHAVIOR: &str = "copy";

/// The condition used when a node type doesn't specify how to judge its
/// health.
pub const DEFAULT_HEALTH: &str = "one";

/// Compile a condition string.
pub fn compile(condition: &str) -> Result<Condition, ConditionError> {
    Condition::new(condition)
}

/// A compiled condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Condition {
    source: String,
    expr: ConditionExpr,
}

impl Condition {
    /// Compile a condition written in the condition language.
    pub fn new(condition: impl AsRef<str>) -> Result<Self, ConditionError> {
        let source = condition.as_ref().trim();
        let expr = grammar::parse(source)?;
        Ok(Self { source: source.to_string(), expr })
    }

    /// The condition as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The parsed condition tree.
    pub fn expr(&self) -> &ConditionExpr {
        &self.expr
    }

    /// Evaluate the condition.
    ///
    /// `input_types` runs parallel to `inputs`, naming the node type of each
    /// input. It is only consulted by type-filtered primitives. `rng` is only
    /// used by `random`.
    pub fn evaluate<T, R>(
        &self,
        inputs: &[bool],
        input_types: &[T],
        rng: &mut R,
    ) -> bool
    where
        T: AsRef<str>,
        R: Rng,
    {
        self.expr.evaluate(inputs, input_types, rng)
    }

    /// Return true if evaluation can depend on random draws.
    pub fn is_random(&self) -> bool {
        let mut random = false;
        self.expr.for_each_simple(&mut |simple| {
            random |= simple.primitive == Primitive::Random;
        });
        random
    }

    /// Return the node types named by type filters in this condition.
    pub fn referenced_node_types(&self) -> BTreeSet<&str> {
        let mut types = BTreeSet::new();
        self.expr.for_each_simple(&mut |simple| {
            if let Some(selection) = &simple.selection {
                types.insert(selection.node_type.as_str());
            }
        });
        types
    }

    /// Return a copy of this condition with every type filter renamed.
    pub fn map_node_types(&self, mut f: impl FnMut(&str) -> String) -> Self {
        let mut expr = self.expr.clone();
        expr.for_each_selection_mut(&mut |selection| {
            selection.node_type = f(&selection.node_type);
        });
        Self { source: expr.to_string(), expr }
    }
}

impl FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::new(s)
    }
}

impl TryFrom<String> for Condition {
    type Error = ConditionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Condition::new(s)
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> String {
        condition.source
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use test_strategy::proptest;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5eed)
    }

    fn eval(condition: &str, inputs: &[bool], types: &[&str]) -> bool {
        compile(condition).unwrap().evaluate(inputs, types, &mut rng())
    }

    #[test]
    fn test_one_global() {
        assert!(eval("one", &[false, true], &["X", "Y"]));
        assert!(!eval("one", &[false, false], &["X", "Y"]));
    }

    #[test]
    fn test_all_with_types() {
        assert!(!eval("all(A)", &[false, true, true], &["A", "A", "B"]));
        assert!(eval("all(A)", &[true, true, true], &["A", "A", "B"]));
    }

    #[test]
    fn test_and_restricted_to_type() {
        let types = ["A", "A", "B"];
        assert!(eval("and(A)", &[true, true, false], &types));
        assert!(!eval("and(A)", &[false, true, false], &types));
        assert!(!eval("and(A)", &[true, false, false], &types));
    }

    #[test]
    fn test_percentage_typed() {
        let types = ["CPU", "CPU", "CPU", "Memory"];
        assert!(eval("50%(CPU)", &[true, true, false, true], &types));
        assert!(!eval("50%(CPU)", &[true, false, false, false], &types));

        // Exactly 50% passes.
        let types = ["CPU", "CPU", "CPU", "CPU"];
        assert!(eval("50%(CPU)", &[true, true, false, false], &types));
    }

    #[test]
    fn test_percentage_global() {
        let types = ["X"; 4];
        assert!(eval("50%", &[true, false, true, false], &types));
        assert!(!eval("50%", &[true, false, false, false], &types));
        assert!(eval("0%", &[false, false, false, false], &types));
        assert!(!eval("100%", &[true, true, true, false], &types));
    }

    #[test]
    fn test_and_combination() {
        let types = ["A", "A", "B", "B"];
        let condition = "one(A) & 50%(B)";
        assert!(eval(condition, &[false, true, true, false], &types));
        assert!(!eval(condition, &[false, false, true, false], &types));
        assert!(eval(condition, &[true, false, true, false], &types));
        assert!(!eval(condition, &[true, false, false, false], &types));
    }

    #[test]
    fn test_or_combination() {
        let types = ["A", "A", "B", "B"];
        let condition = "one(A) | 50%(B)";
        assert!(eval(condition, &[false, true, true, false], &types));
        assert!(eval(condition, &[false, false, true, false], &types));
        assert!(!eval(condition, &[false, false, false, false], &types));
    }

    #[test]
    fn test_parentheses_group() {
        let inputs = [false, true, true, true, true];
        let types = ["A", "B", "B", "C", "C"];
        assert!(!eval("one(A) & (50%(B) | all(C))", &inputs, &types));
        assert!(eval("(one(A) & 50%(B)) | all(C)", &inputs, &types));
    }

    #[test]
    fn test_modulo_selection() {
        let inputs = [false, true, true, false, true, false];
        let types = ["A"; 6];
        assert!(!eval("or(A, mod=3, group=0)", &inputs, &types));
        assert!(eval("or(A, mod=2, group=0)", &inputs, &types));
        assert!(eval("or(A, mod=3, group=1)", &inputs, &types));
        assert!(eval("or(A, mod=3, group=2)", &inputs, &types));
        assert!(!eval("and(A, mod=3, group=2)", &inputs, &types));
    }

    // The type filter and the modulo filter combine, and modulo positions
    // count every input, not just those of the selected type.
    #[test]
    fn test_modulo_positions_are_unfiltered() {
        let inputs = [true, false, false, true];
        let types = ["B", "A", "B", "A"];

        // Positions 1 and 3 are the A inputs. With positions taken from the
        // unfiltered list, group 1 of mod 2 selects both of them.
        assert!(!eval("and(A, mod=2, group=1)", &inputs, &types));
        assert!(eval("or(A, mod=2, group=1)", &inputs, &types));

        // Group 0 of mod 2 selects positions 0 and 2, neither of which is an
        // A, so the selection is empty.
        assert!(eval("and(A, mod=2, group=0)", &inputs, &types));
        assert!(!eval("or(A, mod=2, group=0)", &inputs, &types));
    }

    #[test]
    fn test_xor() {
        let types = ["X", "Y"];
        assert!(!eval("xor", &[true, true], &types));
        assert!(!eval("xor", &[false, false], &types));
        assert!(eval("xor", &[true, false], &types));
        assert!(eval("xor", &[false, true], &types));
    }

    #[test]
    fn test_nand_nor() {
        let types = ["X", "Y"];
        assert!(!eval("nand", &[true, true], &types));
        assert!(eval("nand", &[true, false], &types));
        assert!(!eval("nor", &[true, true], &types));
        assert!(!eval("none", &[false, true], &types));
        assert!(eval("nor", &[false, false], &types));
    }

    #[test]
    fn test_majority_minority() {
        let three = ["X", "Y", "Z"];
        assert!(eval("majority", &[true, true, false], &three));
        assert!(!eval("majority", &[true, false, false], &three));
        assert!(eval("majority", &[true, false], &three[..2]));

        assert!(!eval("minority", &[true, true, false], &three));
        assert!(eval("minority", &[true, false, false], &three));
        assert!(!eval("minority", &[true, false], &three[..2]));
    }

    #[test]
    fn test_copy() {
        let types = ["X", "Y"];
        assert!(eval("copy", &[true, true], &types));
        assert!(eval("copy", &[true, false], &types));
        assert!(!eval("copy", &[false, false], &types));
        assert!(!eval("copy", &[false, true], &types));
        assert!(!eval("copy(Y)", &[true, false], &types));
    }

    #[test]
    fn test_constants() {
        assert!(eval("true", &[false, false], &["X", "Y"]));
        assert!(!eval("false", &[true, true], &["X", "Y"]));
        assert!(eval("false | true", &[], &[] as &[&str]));
    }

    #[test]
    fn test_empty_inputs() {
        let none: [&str; 0] = [];
        for (condition, expected) in [
            ("and", true),
            ("all", true),
            ("or", false),
            ("one", false),
            ("nand", false),
            ("nor", true),
            ("xor", false),
            ("majority", true),
            ("minority", false),
            ("40%", true),
            ("copy", EMPTY_COPY_VALUE),
        ] {
            assert_eq!(eval(condition, &[], &none), expected, "{condition}");
        }

        // A type filter that matches nothing is the same as no inputs.
        let types = ["A", "A"];
        assert!(eval("copy(B)", &[false, false], &types));
        assert!(!eval("one(B)", &[true, true], &types));
    }

    #[test]
    fn test_random_draws_from_inputs() {
        let mut rng = rng();
        let condition = compile("random").unwrap();
        let types = ["X"; 3];
        for _ in 0..100 {
            assert!(condition.evaluate(&[true, true, true], &types, &mut rng));
            assert!(!condition.evaluate(
                &[false, false, false],
                &types,
                &mut rng
            ));
        }

        // With no inputs, both outcomes show up.
        let outcomes: BTreeSet<bool> = (0..100)
            .map(|_| condition.evaluate(&[], &[] as &[&str], &mut rng))
            .collect();
        assert_eq!(outcomes.len(), 2);

        // With a filter, only the selected inputs are drawn from.
        let condition = compile("random(A)").unwrap();
        for _ in 0..100 {
            assert!(condition.evaluate(
                &[true, false, true],
                &["A", "B", "A"],
                &mut rng
            ));
        }
    }

    #[test]
    fn test_condition_metadata() {
        let condition =
            compile(" one(Power) & (50%(Cool) | random(Cool, mod=2, group=1)) ")
                .unwrap();
        assert_eq!(
            condition.as_str(),
            "one(Power) & (50%(Cool) | random(Cool, mod=2, group=1))"
        );
        assert!(condition.is_random());
        assert_eq!(
            condition.referenced_node_types().into_iter().collect::<Vec<_>>(),
            vec!["Cool", "Power"]
        );
        assert!(!compile("copy").unwrap().is_random());
    }

    #[test]
    fn test_map_node_types() {
        let condition = compile("all(A) & (one(B) | 50%(A, mod=2, group=1))")
            .unwrap()
            .map_node_types(|name| format!("{name}_2"));
        assert_eq!(
            condition.as_str(),
            "and(A_2) & (or(B_2) | 50%(A_2, mod=2, group=1))"
        );
        // The rendered source compiles back to the same tree.
        assert_eq!(compile(condition.as_str()).unwrap(), condition);
    }

    #[test]
    fn test_serialize_as_string() {
        let condition = compile("majority(A) | copy").unwrap();
        let json = serde_json::to_string(&condition).unwrap();
        assert_eq!(json, r#""majority(A) | copy""#);
        let back: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, condition);
        assert!(serde_json::from_str::<Condition>(r#""bogus""#).is_err());
    }

    const NON_RANDOM: &[&str] = &[
        "and",
        "or",
        "nand",
        "nor",
        "xor",
        "majority",
        "minority",
        "copy",
        "true",
        "false",
        "30%",
        "one(A) & 50%(B)",
        "(or(A, mod=2, group=0) | nand(B)) & majority",
        "xor(B, mod=3, group=1) | copy(A)",
    ];

    #[proptest]
    fn proptest_non_random_conditions_are_pure(
        #[strategy(proptest::collection::vec(
            (proptest::bool::ANY, proptest::bool::ANY),
            0..16
        ))]
        inputs: Vec<(bool, bool)>,
        seed_a: u64,
        seed_b: u64,
    ) {
        let values: Vec<bool> = inputs.iter().map(|(v, _)| *v).collect();
        let types: Vec<&str> =
            inputs.iter().map(|(_, a)| if *a { "A" } else { "B" }).collect();
        for condition in NON_RANDOM {
            let condition = compile(condition).unwrap();
            let first = condition.evaluate(
                &values,
                &types,
                &mut StdRng::seed_from_u64(seed_a),
            );
            let second = condition.evaluate(
                &values,
                &types,
                &mut StdRng::seed_from_u64(seed_b),
            );
            assert_eq!(first, second, "{condition}");
        }
    }
}
