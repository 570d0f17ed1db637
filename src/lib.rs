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

//! # ASC X12 EDI parsing and querying
//!
//! Parses X12 interchanges into a ranged tree, resolves loop membership for
//! every body segment, and evaluates a compact path query language against
//! the result.
//!
//! ## Core Components
//!
//! - [`X12Parser`] - whole-document and chunked parsing
//! - [`SegmentTokenizer`] - push-based streaming tokenizer
//! - [`QueryEngine`] - `query` / `query_single` over text or parsed trees
//! - [`TransactionMap`] - declarative JSON projection of a transaction
//! - [`HeaderTable`] - segment headers driving loops and validation
//!
//! ## Quick Start
//!
//! ```rust
//! use octofhir_x12::{QueryEngine, X12Parser};
//!
//! let edi = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *170301*1129*U*00401*000000001*0*T*>~\
//! GS*PO*SENDER*RECEIVER*20170301*1129*1*X*004010~ST*850*0001~BEG*00*SA*A99999-01**20170301~\
//! REF*DP*038~REF*PS*R~SE*5*0001~GE*1*1~IEA*1*000000001~";
//!
//! let document = X12Parser::strict().parse(edi)?;
//! let engine = QueryEngine::new();
//!
//! let department = engine.query("REF02:REF01[\"DP\"]", &document)?;
//! assert_eq!(department[0].value, "038");
//!
//! let label = engine.query_single("CONCAT(REF02:REF01[\"DP\"], & )=>REF02:REF01[\"PS\"]", &document)?;
//! assert_eq!(label.and_then(|r| r.value().map(str::to_string)).as_deref(), Some("038 & R"));
//! # Ok::<(), octofhir_x12::X12Error>(())
//! ```
//!
//! ## Loops
//!
//! Loops come from the [`HeaderTable`]. The standard table declares the
//! envelope, `HL` and `LS`/`LE`; extend a private copy for anything else:
//!
//! ```rust
//! use octofhir_x12::{HeaderTable, SegmentHeader, SegmentLayout, X12Options, X12Parser};
//!
//! let headers = HeaderTable::standard()
//!     .with_header(SegmentHeader::new("NM1", SegmentLayout::default()).unbounded().with_loop_id_index(1))
//!     .with_header(SegmentHeader::new("EB", SegmentLayout::default()).unbounded().with_loop_id_index(1));
//! let parser = X12Parser::with_options(X12Options::new().with_segment_headers(headers));
//! # let _ = parser;
//! ```

pub mod config;
pub mod error;
pub mod mapping;
pub mod model;
pub mod parser;
pub mod query;

pub use config::{Delimiters, SerializationOptions, X12Options};
pub use error::{ErrorKind, Result, X12Error};
pub use mapping::TransactionMap;
pub use model::{
    Document, Element, ElementValue, FunctionalGroup, HeaderTable, Interchange, LoopFrame,
    LoopPath, LoopStyle, Position, Range, Segment, SegmentHeader, SegmentLayout, Transaction,
};
pub use parser::{SegmentTokenizer, X12Parser};
pub use query::{QueryEngine, QueryMatch, QueryResult, QuerySource, parse_query};
