// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection policies for template edges.

use crate::TemplateError;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{u32 as nom_u32, u64 as nom_u64},
    combinator::{map, value},
    sequence::preceded,
    IResult,
};
use std::fmt;
use std::str::FromStr;

/// The largest `K` accepted for `"1 to K"`.
pub const MAX_RATIO: u64 = 1024;

/// How the instances of an edge's source type are wired to the instances of
/// its target type.
///
/// Policies are written as edge labels. Parsing is prefix based, so trailing
/// text such as `"1 to 3 per rack"` is allowed, and any label that is not
/// recognized means [`ConnectionPolicy::AllToAll`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionPolicy {
    /// `"1 to n"`: every source connects to every target except itself.
    #[default]
    AllToAll,
    /// `"1 to K"`: every source is assigned exactly `K` targets, chosen to
    /// keep the number of connections per target balanced.
    Ratio(u64),
    /// `"1 to self"`: every source connects to itself only.
    SelfLoop,
    /// `"1 to n%M"`: source `i` connects to every target `t` with
    /// `t % M == i % M`, using one-based sequence numbers.
    Modulo(u32),
}

#[derive(Clone)]
enum Parsed {
    Policy(ConnectionPolicy),
    Modulo(u32),
}

fn policy(s: &str) -> IResult<&str, Parsed> {
    preceded(
        tag("1 to "),
        alt((
            map(preceded(tag("n%"), nom_u32), Parsed::Modulo),
            map(nom_u64, |k| Parsed::Policy(ConnectionPolicy::Ratio(k))),
            value(Parsed::Policy(ConnectionPolicy::SelfLoop), tag("self")),
        )),
    )(s)
}

impl FromStr for ConnectionPolicy {
    type Err = TemplateError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let label = label.trim();
        match policy(label) {
            // Only an exact "1 to self" is the self policy.
            Ok((rest, Parsed::Policy(ConnectionPolicy::SelfLoop)))
                if !rest.is_empty() =>
            {
                Ok(ConnectionPolicy::AllToAll)
            }
            Ok((_, Parsed::Policy(policy))) => {
                policy.check()?;
                Ok(policy)
            }
            Ok((_, Parsed::Modulo(0))) => Err(TemplateError::InvalidPolicy {
                label: label.to_string(),
                reason: String::from("modulus must be non-zero"),
            }),
            Ok((_, Parsed::Modulo(modulus))) => {
                Ok(ConnectionPolicy::Modulo(modulus))
            }
            Err(_) => Ok(ConnectionPolicy::AllToAll),
        }
    }
}

impl ConnectionPolicy {
    /// Reject policies that would make expansion unreasonably large.
    pub fn check(&self) -> Result<(), TemplateError> {
        match self {
            ConnectionPolicy::Ratio(k) if *k > MAX_RATIO => {
                Err(TemplateError::InvalidPolicy {
                    label: self.to_string(),
                    reason: format!(
                        "at most {MAX_RATIO} connections per source"
                    ),
                })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ConnectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionPolicy::AllToAll => write!(f, "1 to n"),
            ConnectionPolicy::Ratio(k) => write!(f, "1 to {k}"),
            ConnectionPolicy::SelfLoop => write!(f, "1 to self"),
            ConnectionPolicy::Modulo(m) => write!(f, "1 to n%{m}"),
        }
    }
}
