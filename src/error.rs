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

//! Error types for X12 parsing and querying
//!
//! This module defines the error types used throughout the crate.

use crate::model::Position;
use thiserror::Error;

/// Result type alias for X12 operations
pub type Result<T> = std::result::Result<T, X12Error>;

/// Broad category of an [`X12Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input document was absent
    ArgumentNull,
    /// Structural failure while tokenizing or assembling the tree
    Parse,
    /// Element count or length outside a segment header's bounds
    ElementConstraint,
    /// Query string did not match the query grammar
    QuerySyntax,
    /// Query could not be evaluated
    QueryEvaluation,
    /// Mapping schema could not be applied
    Mapping,
}

/// Comprehensive error type for X12 operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum X12Error {
    /// A required argument was not supplied
    #[error("Argument '{argument}' must be supplied")]
    ArgumentNull {
        /// Name of the missing argument
        argument: String,
    },

    /// Structural parse failure
    #[error("Parse error{}: {message}",
        position.as_ref().map(|p| format!(" at line {}, character {}", p.line, p.character)).unwrap_or_default()
    )]
    Parse {
        /// Human-readable error message
        message: String,
        /// Location in the source document, when known
        position: Option<Position>,
    },

    /// Element count or element length violation
    #[error("Segment '{tag}': {message}")]
    ElementConstraint {
        /// Tag of the offending segment
        tag: String,
        /// Human-readable error message
        message: String,
    },

    /// Query string does not conform to the grammar
    #[error("Query syntax error at position {position} in '{query}': {message}")]
    QuerySyntax {
        /// The query being parsed
        query: String,
        /// Character offset into the query where parsing failed
        position: usize,
        /// Human-readable error message
        message: String,
    },

    /// Query evaluation failure
    #[error("Query evaluation error: {message}")]
    QueryEvaluation {
        /// Human-readable error message
        message: String,
    },

    /// Mapping schema failure
    #[error("Mapping error: {message}")]
    Mapping {
        /// Human-readable error message
        message: String,
    },
}

impl X12Error {
    /// Create an argument-null error
    pub fn argument_null(argument: impl Into<String>) -> Self {
        Self::ArgumentNull {
            argument: argument.into(),
        }
    }

    /// Create a parse error without location
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            position: None,
        }
    }

    /// Create a parse error located at `position`
    pub fn parse_at(message: impl Into<String>, position: Position) -> Self {
        Self::Parse {
            message: message.into(),
            position: Some(position),
        }
    }

    /// Create an element constraint error
    pub fn element_constraint(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ElementConstraint {
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Create a query syntax error
    pub fn query_syntax(query: impl Into<String>, position: usize, message: impl Into<String>) -> Self {
        Self::QuerySyntax {
            query: query.into(),
            position,
            message: message.into(),
        }
    }

    /// Create a query evaluation error
    pub fn query_evaluation(message: impl Into<String>) -> Self {
        Self::QueryEvaluation {
            message: message.into(),
        }
    }

    /// Create a mapping error
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            X12Error::ArgumentNull { .. } => ErrorKind::ArgumentNull,
            X12Error::Parse { .. } => ErrorKind::Parse,
            X12Error::ElementConstraint { .. } => ErrorKind::ElementConstraint,
            X12Error::QuerySyntax { .. } => ErrorKind::QuerySyntax,
            X12Error::QueryEvaluation { .. } => ErrorKind::QueryEvaluation,
            X12Error::Mapping { .. } => ErrorKind::Mapping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_includes_position() {
        let err = X12Error::parse_at("unexpected trailer", Position::new(4, 2, 57));
        assert_eq!(
            err.to_string(),
            "Parse error at line 4, character 2: unexpected trailer"
        );
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_parse_error_display_without_position() {
        let err = X12Error::parse("document too short");
        assert_eq!(err.to_string(), "Parse error: document too short");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(X12Error::argument_null("document").kind(), ErrorKind::ArgumentNull);
        assert_eq!(
            X12Error::query_syntax("REF", 3, "expected element index").kind(),
            ErrorKind::QuerySyntax
        );
        assert_eq!(X12Error::mapping("bad").kind(), ErrorKind::Mapping);
    }
}
