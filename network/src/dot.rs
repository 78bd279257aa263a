// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loading templates from Graphviz DOT text.
//!
//! Only the subset of DOT that templates need is understood: a single graph
//! containing node statements, edge statements (including chains such as
//! `A -> B -> C`), attribute lists, and `graph`/`node`/`edge` default
//! statements. Subgraphs, ports, and HTML labels are rejected.
//!
//! Node attributes:
//!
//! | Attribute          | Meaning                                           |
//! |--------------------|---------------------------------------------------|
//! | `label`            | display name                                      |
//! | `instances`        | instance count (default 1)                        |
//! | `func`             | behavior condition (default `copy`)               |
//! | `type_condition`   | type health condition (default `one`)             |
//! | `health_perc`      | shorthand for `type_condition="NN%"`              |
//! | `health_indicator` | overrides the `Health` name prefix rule           |
//!
//! The `label` of an edge is its [`ConnectionPolicy`]. Other attributes are
//! ignored.

use crate::ConnectionPolicy;
use crate::NodeType;
use crate::Template;
use crate::TemplateEdge;
use crate::TemplateError;
use camino::Utf8Path;
use indexmap::IndexMap;
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_until, take_while1},
    character::complete::{char, multispace1, not_line_ending, one_of},
    combinator::{all_consuming, map, opt, recognize, value},
    error::{Error, ErrorKind},
    multi::{many0, many1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

type Attributes = Vec<(String, String)>;

#[derive(Clone, Debug)]
enum Statement {
    NodeDefaults(Attributes),
    Ignored,
    Node { id: String, attrs: Attributes },
    Edge { ids: Vec<String>, attrs: Attributes },
}

fn comment(s: &str) -> IResult<&str, &str> {
    alt((
        recognize(pair(tag("//"), not_line_ending)),
        recognize(pair(char('#'), not_line_ending)),
        recognize(tuple((tag("/*"), take_until("*/"), tag("*/")))),
    ))(s)
}

fn ws(s: &str) -> IResult<&str, ()> {
    value((), many0(alt((multispace1, comment))))(s)
}

fn quoted(s: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('"')(s)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => {
                return Err(nom::Err::Error(Error::new(s, ErrorKind::Char)));
            }
            Some('"') => return Ok((chars.as_str(), out)),
            Some('\\') => match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some(c) => {
                    out.push('\\');
                    out.push(c);
                }
                None => {
                    return Err(nom::Err::Error(Error::new(
                        s,
                        ErrorKind::Char,
                    )));
                }
            },
            Some(c) => out.push(c),
        }
        rest = chars.as_str();
    }
}

fn bare(s: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            opt(char('-')),
            take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '.'),
        )),
        String::from,
    )(s)
}

fn id(s: &str) -> IResult<&str, String> {
    alt((quoted, bare))(s)
}

fn attr(s: &str) -> IResult<&str, (String, String)> {
    let (s, key) = id(s)?;
    let (s, _) = tuple((ws, char('='), ws))(s)?;
    let (s, value) = id(s)?;
    let (s, _) = tuple((ws, opt(one_of(",;")), ws))(s)?;
    Ok((s, (key, value)))
}

fn attr_list(s: &str) -> IResult<&str, Attributes> {
    map(
        many1(terminated(
            delimited(terminated(char('['), ws), many0(attr), char(']')),
            ws,
        )),
        |lists| lists.into_iter().flatten().collect(),
    )(s)
}

fn defaults_statement(s: &str) -> IResult<&str, Statement> {
    let (s, kind) =
        alt((tag_no_case("graph"), tag_no_case("node"), tag_no_case("edge")))(
            s,
        )?;
    let (s, attrs) = preceded(ws, attr_list)(s)?;
    if kind.eq_ignore_ascii_case("node") {
        Ok((s, Statement::NodeDefaults(attrs)))
    } else {
        Ok((s, Statement::Ignored))
    }
}

fn graph_attribute(s: &str) -> IResult<&str, Statement> {
    value(Statement::Ignored, tuple((id, ws, char('='), ws, id)))(s)
}

fn node_or_edge(s: &str) -> IResult<&str, Statement> {
    let (s, first) = id(s)?;
    let (s, rest) = many0(preceded(
        tuple((ws, alt((tag("->"), tag("--"))), ws)),
        id,
    ))(s)?;
    let (s, attrs) = opt(preceded(ws, attr_list))(s)?;
    let attrs = attrs.unwrap_or_default();
    if rest.is_empty() {
        Ok((s, Statement::Node { id: first, attrs }))
    } else {
        let mut ids = vec![first];
        ids.extend(rest);
        Ok((s, Statement::Edge { ids, attrs }))
    }
}

fn statement(s: &str) -> IResult<&str, Statement> {
    terminated(
        alt((defaults_statement, graph_attribute, node_or_edge)),
        tuple((ws, opt(char(';')), ws)),
    )(s)
}

fn graph(s: &str) -> IResult<&str, Vec<Statement>> {
    let (s, _) = ws(s)?;
    let (s, _) = opt(terminated(tag_no_case("strict"), ws))(s)?;
    let (s, _) = alt((tag_no_case("digraph"), tag_no_case("graph")))(s)?;
    let (s, _) = ws(s)?;
    let (s, _) = opt(terminated(id, ws))(s)?;
    let (s, _) = terminated(char('{'), ws)(s)?;
    let (s, statements) = many0(statement)(s)?;
    let (s, _) = terminated(char('}'), ws)(s)?;
    Ok((s, statements))
}

// Later attributes override earlier ones, as in Graphviz.
fn lookup<'a>(attrs: &'a Attributes, key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn node_type(
    name: String,
    attrs: &Attributes,
) -> Result<NodeType, TemplateError> {
    let invalid = |attribute: &str, value: &str| {
        TemplateError::InvalidAttribute {
            node_type: name.clone(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    };

    let mut node_type = NodeType::new(name.clone());
    if let Some(label) = lookup(attrs, "label") {
        node_type.label = label.to_string();
    }
    if let Some(instances) = lookup(attrs, "instances") {
        node_type.instances = instances.trim().parse().map_err(|_| {
            TemplateError::InvalidInstances {
                node_type: name.clone(),
                value: instances.to_string(),
            }
        })?;
    }
    if let Some(func) = lookup(attrs, "func") {
        node_type.func = func.to_string();
    }
    if let Some(condition) = lookup(attrs, "type_condition") {
        node_type.type_condition = condition.to_string();
    } else if let Some(perc) = lookup(attrs, "health_perc") {
        let perc = perc
            .trim()
            .trim_end_matches('%')
            .parse::<u8>()
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| invalid("health_perc", perc))?;
        node_type.type_condition = format!("{perc}%");
    }
    if let Some(indicator) = lookup(attrs, "health_indicator") {
        node_type.health_indicator = parse_bool(indicator)
            .ok_or_else(|| invalid("health_indicator", indicator))?;
    }
    Ok(node_type)
}

fn parse(text: &str) -> Result<Template, TemplateError> {
    let statements = match all_consuming(graph)(text) {
        Ok((_, statements)) => statements,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = text.len() - e.input.len();
            let reason = if e.input.trim().is_empty() {
                String::from("unexpected end of input")
            } else {
                let context: String = e
                    .input
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .chars()
                    .take(40)
                    .collect();
                format!("unexpected input `{}`", context.trim_end())
            };
            return Err(TemplateError::Parse { offset, reason });
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(TemplateError::Parse {
                offset: text.len(),
                reason: String::from("unexpected end of input"),
            });
        }
    };

    // Nodes are created the first time they're mentioned, picking up the
    // node defaults in effect at that point.
    let mut nodes: IndexMap<String, Attributes> = IndexMap::new();
    let mut defaults = Attributes::new();
    let mut edges = Vec::new();
    for statement in statements {
        match statement {
            Statement::NodeDefaults(attrs) => defaults.extend(attrs),
            Statement::Ignored => {}
            Statement::Node { id, attrs } => {
                nodes
                    .entry(id)
                    .or_insert_with(|| defaults.clone())
                    .extend(attrs);
            }
            Statement::Edge { ids, attrs } => {
                for id in &ids {
                    nodes.entry(id.clone()).or_insert_with(|| defaults.clone());
                }
                let policy = match lookup(&attrs, "label") {
                    Some(label) => label.parse()?,
                    None => ConnectionPolicy::default(),
                };
                for pair in ids.windows(2) {
                    edges.push(TemplateEdge::new(&pair[0], &pair[1], policy));
                }
            }
        }
    }

    let mut template = Template::new();
    for (name, attrs) in nodes {
        template.add_node_type(node_type(name, &attrs)?)?;
    }
    for edge in edges {
        template.add_edge(edge);
    }
    Ok(template)
}

impl Template {
    /// Parse a template from DOT text.
    pub fn from_dot(text: &str) -> Result<Template, TemplateError> {
        parse(text)
    }

    /// Read and parse a DOT template file.
    pub fn from_file(path: &Utf8Path) -> Result<Template, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            TemplateError::Io { path: path.to_owned(), err }
        })?;
        Template::from_dot(&text)
    }
}
