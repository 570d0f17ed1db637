// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! nom-based parser for the query language
//!
//! ```text
//! query     := foreach | concat | forsegloop | hierarchy | element
//! foreach   := "FOREACH(" TAG ")=>" query
//! concat    := "CONCAT(" query "," LITERAL ")=>" query
//! forsegloop:= "FORSEGLOOP(" PATHSPEC ")=>" ( "*" | query )
//! hierarchy := "HL" ( "+" CODE )+ "-" element
//! element   := ( TAG "-" )* ELEMENTREF ( ":" ELEMENTREF "[\"" VALUE "\"]" )*
//! ```

use super::ast::{ElementQuery, ElementRef, LoopQuery, Qualifier, QueryExpr};
use super::path_matcher::PathMatcher;
use crate::error::{Result, X12Error};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::char,
    combinator::{all_consuming, map},
    multi::{many0, many1},
    sequence::{delimited, preceded, terminated},
};

/// Parser error carrying the remaining input at the failure point
#[derive(Debug, Clone, PartialEq)]
enum QueryParseError<'a> {
    Syntax { input: &'a str, message: String },
    Pattern(X12Error),
}

impl<'a> QueryParseError<'a> {
    fn syntax(input: &'a str, message: impl Into<String>) -> Self {
        QueryParseError::Syntax {
            input,
            message: message.into(),
        }
    }
}

impl<'a> nom::error::ParseError<&'a str> for QueryParseError<'a> {
    fn from_error_kind(input: &'a str, kind: nom::error::ErrorKind) -> Self {
        let message = match kind {
            nom::error::ErrorKind::Eof => "unexpected trailing input".to_string(),
            nom::error::ErrorKind::TakeWhile1 => "expected a tag or element reference".to_string(),
            nom::error::ErrorKind::TakeUntil => "unterminated macro argument".to_string(),
            other => format!("unexpected input ({other:?})"),
        };
        QueryParseError::syntax(input, message)
    }

    fn append(_input: &'a str, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }

    fn or(self, other: Self) -> Self {
        // Keep whichever alternative got further into the query
        let keep_self = match (&self, &other) {
            (QueryParseError::Pattern(_), _) => true,
            (_, QueryParseError::Pattern(_)) => false,
            (
                QueryParseError::Syntax { input: a, .. },
                QueryParseError::Syntax { input: b, .. },
            ) => a.len() <= b.len(),
        };
        if keep_self { self } else { other }
    }
}

type ParseResult<'a, T> = IResult<&'a str, T, QueryParseError<'a>>;

/// Parse a query string into an expression
pub fn parse_query(query: &str) -> Result<QueryExpr> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(X12Error::query_syntax(query, 0, "query is empty"));
    }
    let offset = query.len() - query.trim_start().len();

    match all_consuming(expression).parse(trimmed) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(match e {
            QueryParseError::Pattern(err) => err,
            QueryParseError::Syntax { input, message } => {
                X12Error::query_syntax(query, offset + trimmed.len() - input.len(), message)
            }
        }),
        Err(nom::Err::Incomplete(_)) => Err(X12Error::query_syntax(
            query,
            query.len(),
            "unexpected end of query",
        )),
    }
}

fn expression(input: &str) -> ParseResult<'_, QueryExpr> {
    alt((for_each, concat, for_seg_loop, hierarchy, map(element_query, QueryExpr::Element)))
        .parse(input)
}

fn for_each(input: &str) -> ParseResult<'_, QueryExpr> {
    let (input, loop_tag) = delimited(tag("FOREACH("), alphanumeric, tag(")=>")).parse(input)?;
    let (input, query) = expression.parse(input)?;
    Ok((
        input,
        QueryExpr::ForEach {
            loop_tag: loop_tag.to_string(),
            query: Box::new(query),
        },
    ))
}

fn concat(input: &str) -> ParseResult<'_, QueryExpr> {
    let (input, left) = preceded(tag("CONCAT("), expression).parse(input)?;
    let (input, separator) =
        delimited(char(','), take_until(")=>"), tag(")=>")).parse(input)?;
    let (input, right) = expression.parse(input)?;
    Ok((
        input,
        QueryExpr::Concat {
            left: Box::new(left),
            separator: separator.to_string(),
            right: Box::new(right),
        },
    ))
}

fn for_seg_loop(input: &str) -> ParseResult<'_, QueryExpr> {
    let (rest, spec) =
        delimited(tag("FORSEGLOOP("), take_until(")=>"), tag(")=>")).parse(input)?;
    let path = PathMatcher::compile(spec)
        .map_err(|err| nom::Err::Failure(QueryParseError::Pattern(err)))?;
    let (rest, query) = alt((
        map(char('*'), |_| LoopQuery::AllElements),
        map(expression, |q| LoopQuery::Query(Box::new(q))),
    ))
    .parse(rest)?;
    Ok((rest, QueryExpr::ForSegLoop { path, query }))
}

fn hierarchy(input: &str) -> ParseResult<'_, QueryExpr> {
    let (input, levels) = preceded(
        tag("HL"),
        terminated(many1(preceded(char('+'), alphanumeric)), char('-')),
    )
    .parse(input)?;
    let (input, query) = element_query.parse(input)?;
    Ok((
        input,
        QueryExpr::Hierarchy {
            levels: levels.into_iter().map(str::to_string).collect(),
            query,
        },
    ))
}

fn element_query(input: &str) -> ParseResult<'_, ElementQuery> {
    let (input, path) = many0(terminated(alphanumeric, char('-'))).parse(input)?;
    let (input, target) = element_ref(input)?;
    let (input, qualifiers) = many0(preceded(char(':'), qualifier)).parse(input)?;
    Ok((
        input,
        ElementQuery {
            path: path.into_iter().map(str::to_string).collect(),
            target,
            qualifiers,
        },
    ))
}

fn qualifier(input: &str) -> ParseResult<'_, Qualifier> {
    let (input, element) = element_ref(input)?;
    let (input, value) = delimited(tag("[\""), take_until("\"]"), tag("\"]")).parse(input)?;
    Ok((
        input,
        Qualifier {
            element,
            value: value.to_string(),
        },
    ))
}

/// `TAG` followed by a two-digit element position
fn element_ref(input: &str) -> ParseResult<'_, ElementRef> {
    let (rest, token) = alphanumeric(input)?;
    let split = token.len().saturating_sub(2);
    let (segment_tag, digits) = token.split_at(split);
    if segment_tag.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(nom::Err::Error(QueryParseError::syntax(
            input,
            format!("'{token}' is not an element reference such as REF02"),
        )));
    }
    let index = digits.parse::<usize>().unwrap_or_default();
    if index == 0 {
        return Err(nom::Err::Error(QueryParseError::syntax(
            input,
            format!("element positions start at 01 in '{token}'"),
        )));
    }
    Ok((rest, ElementRef::new(segment_tag, index)))
}

fn alphanumeric(input: &str) -> ParseResult<'_, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric()).parse(input)
}
