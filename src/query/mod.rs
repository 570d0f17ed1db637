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

//! Path query language over parsed X12 trees
//!
//! Queries are parsed into a [`QueryExpr`] once and evaluated against a
//! [`DocumentIndex`] built from the parsed tree. Loop scoping always comes from
//! the loop paths computed while parsing.

pub mod ast;
pub mod engine;
pub mod evaluator;
pub mod index;
pub mod parser;
pub mod path_matcher;

pub use ast::{ElementQuery, ElementRef, LoopQuery, Qualifier, QueryExpr};
pub use engine::{QueryEngine, QueryMatch, QueryResult, QuerySource};
pub use evaluator::{Evaluation, Evaluator, Hit};
pub use index::{DocumentIndex, EnvelopeKey, EntryRole, IndexEntry, LoopInstance, Owner};
pub use parser::parse_query;
pub use path_matcher::{PathMatcher, PathStep};
