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

//! Query expression tree
//!
//! Each variant carries exactly what its evaluation needs. Display renders an
//! expression back into query syntax.

use super::path_matcher::PathMatcher;
use std::fmt;

/// Reference to one element position of a segment tag, e.g. `REF02`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    /// Segment tag
    pub tag: String,
    /// 1-based element position
    pub index: usize,
}

impl ElementRef {
    /// Create an element reference
    pub fn new(tag: impl Into<String>, index: usize) -> Self {
        Self {
            tag: tag.into(),
            index,
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.tag, self.index)
    }
}

/// Condition `ELEMENTREF["VALUE"]` gating a target element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Qualifier {
    /// Element whose value is compared
    pub element: ElementRef,
    /// Expected value, compared after trimming trailing pad spaces
    pub value: String,
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[\"{}\"]", self.element, self.value)
    }
}

/// Element reference with an optional segment path and qualifier chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementQuery {
    /// Enclosing segment tags, outermost first (`PO1` in `PO1-PID05`)
    pub path: Vec<String>,
    /// Target element
    pub target: ElementRef,
    /// Qualifiers, all of which must hold
    pub qualifiers: Vec<Qualifier>,
}

impl ElementQuery {
    /// Unqualified reference to `target`
    pub fn new(target: ElementRef) -> Self {
        Self {
            path: Vec::new(),
            target,
            qualifiers: Vec::new(),
        }
    }
}

impl fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tag in &self.path {
            write!(f, "{tag}-")?;
        }
        write!(f, "{}", self.target)?;
        for qualifier in &self.qualifiers {
            write!(f, ":{qualifier}")?;
        }
        Ok(())
    }
}

/// Sub-query of a `FORSEGLOOP` macro
#[derive(Debug, Clone)]
pub enum LoopQuery {
    /// `*`: every element directly on the loop's segments
    AllElements,
    /// Any other query, scoped to the loop instance
    Query(Box<QueryExpr>),
}

/// Parsed query expression
#[derive(Debug, Clone)]
pub enum QueryExpr {
    /// `REF02`, `REF02:REF01["DP"]`, `PO1-PID05`
    Element(ElementQuery),
    /// `HL+S+O+I-LIN03`
    Hierarchy {
        /// Level codes, root first
        levels: Vec<String>,
        /// Query applied to segments with exactly this chain
        query: ElementQuery,
    },
    /// `FOREACH(PO1)=>PID05`
    ForEach {
        /// Loop tag whose instances are iterated
        loop_tag: String,
        /// Query evaluated in each instance
        query: Box<QueryExpr>,
    },
    /// `CONCAT(REF02, & )=>REF03`
    Concat {
        /// First value
        left: Box<QueryExpr>,
        /// Separator text, verbatim
        separator: String,
        /// Second value
        right: Box<QueryExpr>,
    },
    /// `FORSEGLOOP(ISA.GS.ST=271.HL=22)=>DTP03`
    ForSegLoop {
        /// Compiled path specification
        path: PathMatcher,
        /// Query evaluated in each matching loop instance
        query: LoopQuery,
    },
}

impl QueryExpr {
    /// Check if the expression aggregates instead of yielding element matches
    pub fn is_aggregate(&self) -> bool {
        match self {
            QueryExpr::ForEach { .. } | QueryExpr::Concat { .. } => true,
            QueryExpr::ForSegLoop {
                query: LoopQuery::Query(query),
                ..
            } => query.is_aggregate(),
            _ => false,
        }
    }
}

impl fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryExpr::Element(query) => write!(f, "{query}"),
            QueryExpr::Hierarchy { levels, query } => {
                write!(f, "HL")?;
                for level in levels {
                    write!(f, "+{level}")?;
                }
                write!(f, "-{query}")
            }
            QueryExpr::ForEach { loop_tag, query } => write!(f, "FOREACH({loop_tag})=>{query}"),
            QueryExpr::Concat {
                left,
                separator,
                right,
            } => write!(f, "CONCAT({left},{separator})=>{right}"),
            QueryExpr::ForSegLoop { path, query } => {
                write!(f, "FORSEGLOOP({path})=>")?;
                match query {
                    LoopQuery::AllElements => write!(f, "*"),
                    LoopQuery::Query(query) => write!(f, "{query}"),
                }
            }
        }
    }
}
