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

//! Shared fixtures and helpers for integration tests

#![allow(dead_code)]

use octofhir_x12::{
    HeaderTable, QueryEngine, QueryMatch, SegmentHeader, SegmentLayout, X12Options, X12Parser,
};

/// Purchase order, `~` terminators with a newline after each segment
pub const PO_850: &str = include_str!("../data/850.edi");
/// Same purchase order with newline segment terminators
pub const PO_850_LF: &str = include_str!("../data/850_2.edi");
/// Ship notice with an S/O/I and S/O/T hierarchy
pub const ASN_856: &str = include_str!("../data/856.edi");
/// Eligibility response with two subscribers
pub const ELIGIBILITY_271: &str = include_str!("../data/271.edi");
/// Mapping schema for the purchase order
pub const PO_850_MAP: &str = include_str!("../data/850_map.json");
/// Expected projection of the purchase order
pub const PO_850_MAP_RESULT: &str = include_str!("../data/850_map_result.json");

/// Standard headers plus `NM1` and `EB` as unbounded loops keyed on element 01
pub fn eligibility_headers() -> HeaderTable {
    HeaderTable::standard()
        .with_header(
            SegmentHeader::new("NM1", SegmentLayout::default())
                .unbounded()
                .with_loop_id_index(1),
        )
        .with_header(
            SegmentHeader::new("EB", SegmentLayout::default())
                .unbounded()
                .with_loop_id_index(1),
        )
}

/// Strict engine using the standard header table
pub fn strict_engine() -> QueryEngine {
    QueryEngine::with_parser(X12Parser::strict())
}

/// Strict engine that resolves `NM1` and `EB` loops
pub fn eligibility_engine() -> QueryEngine {
    QueryEngine::with_options(
        X12Options::new()
            .with_strict(true)
            .with_segment_headers(eligibility_headers()),
    )
}

/// Values of a match list, trailing pad spaces removed
pub fn values(matches: &[QueryMatch]) -> Vec<&str> {
    matches
        .iter()
        .map(|m| m.value.trim_end_matches(' '))
        .collect()
}
