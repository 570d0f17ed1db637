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

//! Envelope hierarchy: interchange, functional group and transaction set
//!
//! Each envelope owns its header segment, its children in document order and,
//! when one was present in the source, its trailer segment. Trailers are
//! optional because non-strict parsing closes envelopes implicitly.

use super::segment::Segment;
use crate::config::{Delimiters, SerializationOptions, X12Options};
use serde::Serialize;

/// A transaction set bounded by `ST`/`SE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    /// `ST` segment
    pub header: Segment,
    /// Body segments in document order
    pub segments: Vec<Segment>,
    /// `SE` segment
    pub trailer: Option<Segment>,
}

impl Transaction {
    /// Create a transaction with no body and no trailer
    pub fn new(header: Segment) -> Self {
        Self {
            header,
            segments: Vec::new(),
            trailer: None,
        }
    }

    /// Transaction set identifier (`ST01`)
    pub fn set_identifier(&self) -> &str {
        self.header.value_of(1, "")
    }

    /// Control number (`ST02`)
    pub fn control_number(&self) -> &str {
        self.header.value_of(2, "")
    }

    /// Segment count as declared in `SE01`: body plus `ST` and `SE`
    pub fn segment_count(&self) -> usize {
        self.segments.len() + 2
    }

    /// Every segment in document order, envelope segments included
    pub fn all_segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        std::iter::once(&self.header)
            .chain(self.segments.iter())
            .chain(self.trailer.iter())
    }

    /// Serialize as EDI text
    pub fn to_edi(&self, options: &SerializationOptions) -> String {
        let mut out = String::new();
        self.write_edi(&mut out, options);
        out
    }

    pub(crate) fn write_edi(&self, out: &mut String, options: &SerializationOptions) {
        for segment in self.all_segments() {
            segment.write_edi(out, options);
        }
    }
}

/// A functional group bounded by `GS`/`GE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionalGroup {
    /// `GS` segment
    pub header: Segment,
    /// Transactions in document order
    pub transactions: Vec<Transaction>,
    /// `GE` segment
    pub trailer: Option<Segment>,
}

impl FunctionalGroup {
    /// Create a group with no transactions and no trailer
    pub fn new(header: Segment) -> Self {
        Self {
            header,
            transactions: Vec::new(),
            trailer: None,
        }
    }

    /// Group control number (`GS06`)
    pub fn control_number(&self) -> &str {
        self.header.value_of(6, "")
    }

    /// Every segment in document order
    pub fn all_segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        std::iter::once(&self.header)
            .chain(self.transactions.iter().flat_map(|t| t.all_segments()))
            .chain(self.trailer.iter())
    }

    /// Serialize as EDI text
    pub fn to_edi(&self, options: &SerializationOptions) -> String {
        let mut out = String::new();
        self.write_edi(&mut out, options);
        out
    }

    pub(crate) fn write_edi(&self, out: &mut String, options: &SerializationOptions) {
        for segment in self.all_segments() {
            segment.write_edi(out, options);
        }
    }
}

/// An interchange bounded by `ISA`/`IEA`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interchange {
    /// `ISA` segment
    pub header: Segment,
    /// Functional groups in document order
    pub groups: Vec<FunctionalGroup>,
    /// `IEA` segment
    pub trailer: Option<Segment>,
    /// Delimiters discovered from the `ISA` segment
    pub delimiters: Delimiters,
}

impl Interchange {
    /// Create an interchange with no groups and no trailer
    pub fn new(header: Segment, delimiters: Delimiters) -> Self {
        Self {
            header,
            groups: Vec::new(),
            trailer: None,
            delimiters,
        }
    }

    /// Interchange control number (`ISA13`)
    pub fn control_number(&self) -> &str {
        self.header.value_of(13, "")
    }

    /// Every transaction across all groups
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.groups.iter().flat_map(|g| g.transactions.iter())
    }

    /// Every segment in document order
    pub fn all_segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        std::iter::once(&self.header)
            .chain(self.groups.iter().flat_map(|g| g.all_segments()))
            .chain(self.trailer.iter())
    }

    /// Serialize as EDI text
    pub fn to_edi(&self, options: &SerializationOptions) -> String {
        let mut out = String::new();
        self.write_edi(&mut out, options);
        out
    }

    pub(crate) fn write_edi(&self, out: &mut String, options: &SerializationOptions) {
        for segment in self.all_segments() {
            segment.write_edi(out, options);
        }
    }
}

/// A parsed document: one or more concatenated interchanges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Interchanges in document order
    pub interchanges: Vec<Interchange>,
}

impl Document {
    /// Create a document from interchanges
    pub fn new(interchanges: Vec<Interchange>) -> Self {
        Self { interchanges }
    }

    /// First interchange
    pub fn first(&self) -> Option<&Interchange> {
        self.interchanges.first()
    }

    /// Number of interchanges
    pub fn len(&self) -> usize {
        self.interchanges.len()
    }

    /// Check if the document holds no interchange
    pub fn is_empty(&self) -> bool {
        self.interchanges.is_empty()
    }

    /// Every segment in document order
    pub fn all_segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.interchanges.iter().flat_map(|i| i.all_segments())
    }

    /// Serialize every interchange with its own delimiters
    pub fn to_edi(&self, options: &X12Options) -> String {
        let mut out = String::new();
        for interchange in &self.interchanges {
            interchange.write_edi(&mut out, &options.serialization(interchange.delimiters));
        }
        out
    }
}
