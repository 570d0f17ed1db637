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

//! Query evaluation over a [`DocumentIndex`]
//!
//! Evaluation is a pure function of an expression and a scope. Scopes are
//! entry ranges; macros narrow them to loop instances and recurse.

use super::ast::{ElementQuery, LoopQuery, Qualifier, QueryExpr};
use super::index::DocumentIndex;
use super::path_matcher::PathMatcher;
use crate::error::Result;
use crate::model::{LoopPath, Segment};
use std::ops::Range;

/// One matched element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Entry position in the index
    pub entry: usize,
    /// 0-based element position
    pub element: usize,
}

/// Result of evaluating an expression in a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Element matches in document order
    Matches(Vec<Hit>),
    /// Aggregated values
    Values(Vec<String>),
    /// One composed value
    Text(String),
}

/// Evaluates expressions against an index
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'i, 'a> {
    index: &'i DocumentIndex<'a>,
}

impl<'i, 'a> Evaluator<'i, 'a> {
    /// Create an evaluator over `index`
    pub fn new(index: &'i DocumentIndex<'a>) -> Self {
        Self { index }
    }

    /// Evaluate `expr` over the whole document
    pub fn evaluate_document(&self, expr: &QueryExpr) -> Result<Evaluation> {
        self.evaluate(expr, self.index.full_scope())
    }

    /// Evaluate `expr` within `scope`
    pub fn evaluate(&self, expr: &QueryExpr, scope: Range<usize>) -> Result<Evaluation> {
        match expr {
            QueryExpr::Element(query) => Ok(Evaluation::Matches(self.element_query(query, scope, None))),
            QueryExpr::Hierarchy { levels, query } => Ok(Evaluation::Matches(self.element_query(
                query,
                scope,
                Some(levels),
            ))),
            QueryExpr::ForEach { loop_tag, query } => self.for_each(loop_tag, query, scope),
            QueryExpr::Concat {
                left,
                separator,
                right,
            } => {
                let left = self.first_value(left, scope.clone())?;
                let right = self.first_value(right, scope)?;
                Ok(Evaluation::Text(format!("{left}{separator}{right}")))
            }
            QueryExpr::ForSegLoop { path, query } => self.for_seg_loop(path, query, scope),
        }
    }

    /// Raw value of a hit
    pub fn value(&self, hit: Hit) -> &'a str {
        self.segment(hit.entry)
            .elements
            .get(hit.element)
            .map_or("", |e| e.value.as_str())
    }

    #[inline]
    fn segment(&self, position: usize) -> &'a Segment {
        self.index.entry(position).segment
    }

    fn element_query(
        &self,
        query: &ElementQuery,
        scope: Range<usize>,
        levels: Option<&[String]>,
    ) -> Vec<Hit> {
        let mut scopes = vec![scope];
        for tag in &query.path {
            scopes = scopes
                .into_iter()
                .flat_map(|s| self.index.instances_of(tag, s))
                .collect();
        }

        let mut hits = Vec::new();
        for scope in scopes {
            for &position in self.index.positions_of(&query.target.tag, scope) {
                let entry = self.index.entry(position);
                if entry.segment.element(query.target.index).is_none() {
                    continue;
                }
                if let Some(levels) = levels
                    && entry.loop_path().and_then(LoopPath::hierarchy) != Some(levels)
                {
                    continue;
                }
                if query.qualifiers.iter().all(|q| self.qualifies(position, q)) {
                    hits.push(Hit {
                        entry: position,
                        element: query.target.index - 1,
                    });
                }
            }
        }
        hits
    }

    /// A same-tag qualifier is checked on the target segment itself. Any other
    /// tag is searched across the target's envelope regardless of the current
    /// scope, restricted to segments whose innermost loop also encloses the
    /// target.
    fn qualifies(&self, position: usize, qualifier: &Qualifier) -> bool {
        let target = self.index.entry(position);
        if qualifier.element.tag == target.segment.tag {
            return holds(target.segment, qualifier);
        }
        let target_path = target.loop_path();
        let candidates = self
            .index
            .positions_of(&qualifier.element.tag, self.index.interchange_scope(position));
        candidates.iter().any(|&candidate| {
            let candidate = self.index.entry(candidate);
            holds(candidate.segment, qualifier)
                && candidate.key.is_compatible(&target.key)
                && candidate
                    .loop_path()
                    .and_then(LoopPath::innermost)
                    .is_none_or(|frame| target_path.is_some_and(|p| p.contains(frame)))
        })
    }

    fn for_each(&self, loop_tag: &str, query: &QueryExpr, scope: Range<usize>) -> Result<Evaluation> {
        let mut values = Vec::new();
        for instance in self.index.instances_of(loop_tag, scope) {
            self.collect_values(self.evaluate(query, instance)?, &mut values);
        }
        Ok(Evaluation::Values(values))
    }

    fn for_seg_loop(
        &self,
        path: &PathMatcher,
        query: &LoopQuery,
        scope: Range<usize>,
    ) -> Result<Evaluation> {
        let mut hits = Vec::new();
        let mut values = Vec::new();
        let mut aggregated = false;

        let instances = self.index.loop_instances(scope);
        log::trace!("FORSEGLOOP({path}) over {} loop instances", instances.len());

        for instance in instances.into_iter().filter(|i| path.matches(&i.steps)) {
            match query {
                LoopQuery::AllElements => {
                    for position in instance.range {
                        if self.index.owner_of(position) != instance.owner {
                            continue;
                        }
                        let count = self.segment(position).elements.len();
                        hits.extend((0..count).map(|element| Hit {
                            entry: position,
                            element,
                        }));
                    }
                }
                LoopQuery::Query(query) => match self.evaluate(query, instance.range)? {
                    Evaluation::Matches(found) => hits.extend(found),
                    other => {
                        aggregated = true;
                        self.collect_values(other, &mut values);
                    }
                },
            }
        }

        Ok(if aggregated {
            Evaluation::Values(values)
        } else {
            Evaluation::Matches(hits)
        })
    }

    fn collect_values(&self, evaluation: Evaluation, values: &mut Vec<String>) {
        match evaluation {
            Evaluation::Matches(hits) => {
                values.extend(hits.into_iter().map(|hit| self.value(hit).to_string()))
            }
            Evaluation::Values(found) => values.extend(found),
            Evaluation::Text(text) => values.push(text),
        }
    }

    /// First value of a sub-query, empty when it yields nothing
    fn first_value(&self, expr: &QueryExpr, scope: Range<usize>) -> Result<String> {
        Ok(match self.evaluate(expr, scope)? {
            Evaluation::Matches(hits) => hits
                .first()
                .map(|hit| self.value(*hit).to_string())
                .unwrap_or_default(),
            Evaluation::Values(values) => values.into_iter().next().unwrap_or_default(),
            Evaluation::Text(text) => text,
        })
    }
}

fn holds(segment: &Segment, qualifier: &Qualifier) -> bool {
    segment
        .element(qualifier.element.index)
        .is_some_and(|e| e.trimmed() == qualifier.value.trim_end_matches(' '))
}
