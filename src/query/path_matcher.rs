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

//! `FORSEGLOOP` path specifications
//!
//! A specification such as `ISA.GS.ST=271.HL=22.NM1=IL` is matched step by
//! step against the resolved path of a loop instance. A specification that
//! starts with `^` or contains an escaped dot is instead compiled as a regular
//! expression and matched against the rendered path string.

use crate::error::{Result, X12Error};
use regex::Regex;
use std::fmt;

/// One `tag` or `tag=value` step of a resolved path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathStep {
    /// Segment tag
    pub tag: String,
    /// Identifying value, when the step carries one
    pub value: Option<String>,
    /// Envelope identifier compared by literal paths but never rendered
    pub identifier: Option<String>,
}

impl PathStep {
    /// Create a step
    pub fn new(tag: impl Into<String>, value: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            value,
            identifier: None,
        }
    }

    /// Create an envelope step whose identifier stays out of the rendered path
    pub fn envelope(tag: impl Into<String>, identifier: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            value: None,
            identifier,
        }
    }

    fn selects(&self, have: &PathStep) -> bool {
        self.tag == have.tag
            && self.value.as_ref().is_none_or(|value| {
                have.value.as_ref().or(have.identifier.as_ref()) == Some(value)
            })
    }

    fn parse(text: &str) -> Self {
        match text.split_once('=') {
            Some((tag, value)) => Self::new(tag, Some(value.to_string())),
            None => Self::new(text, None),
        }
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.tag, value),
            None => f.write_str(&self.tag),
        }
    }
}

/// Render steps as `ISA.GS.ST=271`
pub fn render_steps(steps: &[PathStep]) -> String {
    steps
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Compiled path specification
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// Step-by-step comparison
    Literal(Vec<PathStep>),
    /// Regular expression over the rendered path
    Pattern(Regex),
}

impl PathMatcher {
    /// Compile a path specification
    pub fn compile(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.starts_with('^') || spec.contains("\\.") {
            return Regex::new(spec)
                .map(PathMatcher::Pattern)
                .map_err(|e| {
                    X12Error::query_evaluation(format!("invalid FORSEGLOOP path pattern: {e}"))
                });
        }
        let steps: Vec<PathStep> = spec.split('.').map(PathStep::parse).collect();
        if let Some(step) = steps.iter().find(|s| s.tag == "ISA" && s.value.is_some()) {
            return Err(X12Error::query_evaluation(format!(
                "FORSEGLOOP path step '{step}' cannot carry a value; ISA has no identifier"
            )));
        }
        Ok(PathMatcher::Literal(steps))
    }

    /// Check if a resolved path matches
    pub fn matches(&self, steps: &[PathStep]) -> bool {
        match self {
            PathMatcher::Literal(expected) => {
                expected.len() == steps.len()
                    && expected.iter().zip(steps).all(|(want, have)| want.selects(have))
            }
            PathMatcher::Pattern(pattern) => pattern.is_match(&render_steps(steps)),
        }
    }
}

impl fmt::Display for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathMatcher::Literal(steps) => f.write_str(&render_steps(steps)),
            PathMatcher::Pattern(pattern) => f.write_str(pattern.as_str()),
        }
    }
}
