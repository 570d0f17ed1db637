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

//! Document model for parsed X12
//!
//! The tree produced by the parser: [`Document`] → [`Interchange`] →
//! [`FunctionalGroup`] → [`Transaction`] → [`Segment`] → [`Element`], every
//! segment and element annotated with its source [`Range`].

pub mod element;
pub mod envelope;
pub mod header;
pub mod position;
pub mod segment;

pub use element::{Element, ElementValue};
pub use envelope::{Document, FunctionalGroup, Interchange, Transaction};
pub use header::{
    ElementRule, HeaderTable, HierarchyLayout, LoopStyle, SegmentHeader, SegmentLayout,
    standard_headers,
};
pub use position::{Position, PositionTracker, Range};
pub use segment::{LoopFrame, LoopPath, Segment};
