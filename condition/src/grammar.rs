// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parser for the condition language.
//!
//! ```text
//! expr      := term ('|' term)*
//! term      := factor ('&' factor)*
//! factor    := '(' expr ')' | condition
//! condition := (name | NN '%') selection?
//! selection := '(' type (',' 'mod' '=' M ',' 'group' '=' G)? ')'
//! ```
//!
//! Parsing happens in two passes. The nom grammar below only recognizes the
//! shape of the expression and records where each function name appeared.
//! Names, percentages, and modulo groups are then checked in
//! [`resolve`], which is where useful errors are produced.

use crate::ast::ConditionExpr;
use crate::ast::LogicalOp;
use crate::ast::Modulo;
use crate::ast::Primitive;
use crate::ast::Selection;
use crate::ast::SimpleCondition;
use crate::ConditionError;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace0, u32 as nom_u32},
    combinator::{all_consuming, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

// A parsed, but not yet validated, expression.
#[derive(Debug)]
enum RawExpr<'a> {
    Leaf(RawLeaf<'a>),
    Compound(Box<RawExpr<'a>>, LogicalOp, Box<RawExpr<'a>>),
}

#[derive(Debug)]
struct RawLeaf<'a> {
    name: &'a str,
    // The input remaining at the start of the name, used to compute offsets.
    at: &'a str,
    selection: Option<RawSelection<'a>>,
}

#[derive(Debug)]
struct RawSelection<'a> {
    node_type: &'a str,
    modulo: Option<(u32, u32)>,
    at: &'a str,
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn fold<'a>(
    first: RawExpr<'a>,
    rest: Vec<RawExpr<'a>>,
    op: LogicalOp,
) -> RawExpr<'a> {
    rest.into_iter().fold(first, |left, right| {
        RawExpr::Compound(Box::new(left), op, Box::new(right))
    })
}

fn expr(s: &str) -> IResult<&str, RawExpr<'_>> {
    let (s, first) = term(s)?;
    let (s, rest) = many0(preceded(char('|'), term))(s)?;
    Ok((s, fold(first, rest, LogicalOp::Or)))
}

fn term(s: &str) -> IResult<&str, RawExpr<'_>> {
    let (s, first) = factor(s)?;
    let (s, rest) = many0(preceded(char('&'), factor))(s)?;
    Ok((s, fold(first, rest, LogicalOp::And)))
}

fn factor(s: &str) -> IResult<&str, RawExpr<'_>> {
    delimited(
        multispace0,
        alt((delimited(char('('), expr, char(')')), leaf)),
        multispace0,
    )(s)
}

fn leaf(s: &str) -> IResult<&str, RawExpr<'_>> {
    let at = s;
    let (s, name) =
        alt((recognize(pair(digit1, char('%'))), take_while1(is_word)))(s)?;
    let (s, selection) = opt(preceded(multispace0, selection))(s)?;
    Ok((s, RawExpr::Leaf(RawLeaf { name, at, selection })))
}

fn selection(s: &str) -> IResult<&str, RawSelection<'_>> {
    let at = s;
    let (s, (node_type, modulo)) = delimited(
        pair(char('('), multispace0),
        pair(node_type, opt(modulo)),
        pair(multispace0, char(')')),
    )(s)?;
    Ok((s, RawSelection { node_type, modulo, at }))
}

// Node type names may contain interior spaces, e.g. `or(Power Supply)`.
fn node_type(s: &str) -> IResult<&str, &str> {
    let (s, name) = take_while1(|c: char| is_word(c) || c == ' ')(s)?;
    Ok((s, name.trim_end()))
}

fn keyword_value<'a>(
    keyword: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, u32> {
    preceded(
        tuple((
            multispace0,
            char(','),
            multispace0,
            tag(keyword),
            multispace0,
            char('='),
            multispace0,
        )),
        nom_u32,
    )
}

fn modulo(s: &str) -> IResult<&str, (u32, u32)> {
    pair(keyword_value("mod"), keyword_value("group"))(s)
}

/// Parse and validate a condition string.
pub(crate) fn parse(condition: &str) -> Result<ConditionExpr, ConditionError> {
    let offset_of = |rest: &str| condition.len() - rest.len();
    let raw = match all_consuming(expr)(condition) {
        Ok((_, raw)) => raw,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let reason = if e.input.trim().is_empty() {
                String::from("unexpected end of condition")
            } else {
                format!("unexpected input `{}`", e.input.trim_end())
            };
            return Err(ConditionError::syntax(
                condition,
                offset_of(e.input),
                reason,
            ));
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(ConditionError::syntax(
                condition,
                condition.len(),
                "unexpected end of condition",
            ));
        }
    };
    resolve(condition, raw)
}

fn resolve(
    condition: &str,
    raw: RawExpr<'_>,
) -> Result<ConditionExpr, ConditionError> {
    let offset_of = |rest: &str| condition.len() - rest.len();
    match raw {
        RawExpr::Compound(left, op, right) => Ok(ConditionExpr::compound(
            resolve(condition, *left)?,
            op,
            resolve(condition, *right)?,
        )),
        RawExpr::Leaf(RawLeaf { name, at, selection }) => {
            let primitive = if let Some(digits) = name.strip_suffix('%') {
                let percentage = digits
                    .parse::<u8>()
                    .ok()
                    .filter(|p| *p <= 100)
                    .ok_or_else(|| {
                        ConditionError::syntax(
                            condition,
                            offset_of(at),
                            format!(
                                "percentage `{name}` must be between 0% \
                                and 100%"
                            ),
                        )
                    })?;
                Primitive::Percentage(percentage)
            } else {
                Primitive::from_name(name).ok_or_else(|| {
                    ConditionError::UnknownFunction {
                        condition: condition.to_string(),
                        name: name.to_string(),
                    }
                })?
            };

            let selection = match selection {
                None => None,
                Some(RawSelection { node_type, modulo, at }) => {
                    let modulo = match modulo {
                        None => None,
                        Some((0, _)) => {
                            return Err(ConditionError::syntax(
                                condition,
                                offset_of(at),
                                "modulus must be non-zero",
                            ));
                        }
                        Some((modulus, group)) if group >= modulus => {
                            return Err(ConditionError::syntax(
                                condition,
                                offset_of(at),
                                format!(
                                    "group {group} is out of range for \
                                    modulus {modulus}"
                                ),
                            ));
                        }
                        Some((modulus, group)) => {
                            Some(Modulo { modulus, group })
                        }
                    };
                    Some(Selection { node_type: node_type.to_string(), modulo })
                }
            };

            Ok(ConditionExpr::Simple(SimpleCondition { primitive, selection }))
        }
    }
}

#[cfg(test)]
mod test {
    use super::parse;
    use crate::ast::ConditionExpr;
    use crate::ast::LogicalOp;
    use crate::ast::Modulo;
    use crate::ast::Primitive;
    use crate::ast::Selection;
    use crate::ast::SimpleCondition;
    use crate::ConditionError;

    fn simple(primitive: Primitive) -> ConditionExpr {
        ConditionExpr::Simple(SimpleCondition { primitive, selection: None })
    }

    #[test]
    fn test_parse_primitives_and_aliases() {
        for (name, primitive) in [
            ("and", Primitive::And),
            ("all", Primitive::And),
            ("or", Primitive::Or),
            ("one", Primitive::Or),
            ("nand", Primitive::Nand),
            ("nor", Primitive::Nor),
            ("none", Primitive::Nor),
            ("xor", Primitive::Xor),
            ("majority", Primitive::Majority),
            ("minority", Primitive::Minority),
            ("random", Primitive::Random),
            ("copy", Primitive::Copy),
            ("true", Primitive::True),
            ("false", Primitive::False),
            ("50%", Primitive::Percentage(50)),
            ("  0%  ", Primitive::Percentage(0)),
        ] {
            assert_eq!(parse(name).unwrap(), simple(primitive), "{name}");
        }
    }

    #[test]
    fn test_parse_precedence() {
        // `&` binds tighter than `|`.
        let parsed = parse("or | and & xor").unwrap();
        assert_eq!(
            parsed,
            ConditionExpr::compound(
                simple(Primitive::Or),
                LogicalOp::Or,
                ConditionExpr::compound(
                    simple(Primitive::And),
                    LogicalOp::And,
                    simple(Primitive::Xor),
                ),
            )
        );

        let parsed = parse("(or | and) & xor").unwrap();
        assert_eq!(
            parsed,
            ConditionExpr::compound(
                ConditionExpr::compound(
                    simple(Primitive::Or),
                    LogicalOp::Or,
                    simple(Primitive::And),
                ),
                LogicalOp::And,
                simple(Primitive::Xor),
            )
        );
    }

    #[test]
    fn test_parse_chains_fold_left() {
        let parsed = parse("or | and | xor").unwrap();
        assert_eq!(
            parsed,
            ConditionExpr::compound(
                ConditionExpr::compound(
                    simple(Primitive::Or),
                    LogicalOp::Or,
                    simple(Primitive::And),
                ),
                LogicalOp::Or,
                simple(Primitive::Xor),
            )
        );

        let parsed = parse("nand & nor & copy & true").unwrap();
        assert_eq!(
            parsed,
            ConditionExpr::compound(
                ConditionExpr::compound(
                    ConditionExpr::compound(
                        simple(Primitive::Nand),
                        LogicalOp::And,
                        simple(Primitive::Nor),
                    ),
                    LogicalOp::And,
                    simple(Primitive::Copy),
                ),
                LogicalOp::And,
                simple(Primitive::True),
            )
        );
    }

    #[test]
    fn test_parse_selection() {
        let parsed = parse("or(A, mod=3, group=2)").unwrap();
        assert_eq!(
            parsed,
            ConditionExpr::Simple(SimpleCondition {
                primitive: Primitive::Or,
                selection: Some(Selection {
                    node_type: String::from("A"),
                    modulo: Some(Modulo { modulus: 3, group: 2 }),
                }),
            })
        );

        let parsed = parse("75%( Power Supply )").unwrap();
        assert_eq!(
            parsed,
            ConditionExpr::Simple(SimpleCondition {
                primitive: Primitive::Percentage(75),
                selection: Some(Selection {
                    node_type: String::from("Power Supply"),
                    modulo: None,
                }),
            })
        );
    }

    #[test]
    fn test_unknown_function() {
        let err = parse("one(A) & sometimes").unwrap_err();
        assert_eq!(
            err,
            ConditionError::UnknownFunction {
                condition: String::from("one(A) & sometimes"),
                name: String::from("sometimes"),
            }
        );
        assert!(matches!(
            parse("maybe(B)"),
            Err(ConditionError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_malformed_conditions() {
        for bad in [
            "",
            "   ",
            "and &",
            "| or",
            "(and",
            "and)",
            "or(A",
            "or(A, mod=3)",
            "or(A, group=1, mod=3)",
            "or(A, mod=x, group=1)",
            "and or",
        ] {
            assert!(
                matches!(parse(bad), Err(ConditionError::Syntax { .. })),
                "expected syntax error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_invalid_modulo_and_percentage() {
        let Err(ConditionError::Syntax { offset, reason, .. }) =
            parse("and & or(A, mod=0, group=0)")
        else {
            panic!("expected syntax error");
        };
        assert_eq!(offset, 8);
        assert!(reason.contains("non-zero"), "{reason}");

        let Err(ConditionError::Syntax { reason, .. }) =
            parse("or(A, mod=2, group=2)")
        else {
            panic!("expected syntax error");
        };
        assert!(reason.contains("out of range"), "{reason}");

        let Err(ConditionError::Syntax { offset, .. }) = parse("and | 101%")
        else {
            panic!("expected syntax error");
        };
        assert_eq!(offset, 6);
    }
}
