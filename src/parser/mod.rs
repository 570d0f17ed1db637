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

//! X12 document parser
//!
//! Parsing runs in two stages: the [`SegmentTokenizer`] turns text into ranged
//! segments, and the [`TreeBuilder`] nests them into envelopes while the
//! [`LoopTracker`] assigns loop paths to body segments.

#![warn(missing_docs)]

pub mod delimiters;
pub mod loops;
pub mod tokenizer;
pub mod tree_builder;

pub use loops::LoopTracker;
pub use tokenizer::SegmentTokenizer;
pub use tree_builder::TreeBuilder;

use crate::config::{Delimiters, X12Options};
use crate::error::{Result, X12Error};
use crate::model::{Document, Interchange, Segment};

/// Entry point for parsing X12 text
///
/// # Examples
///
/// ```rust
/// use octofhir_x12::X12Parser;
///
/// let edi = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *170301*1129*U*00401*000000001*0*T*>~\
/// GS*PO*SENDER*RECEIVER*20170301*1129*1*X*004010~ST*850*0001~BEG*00*SA*A99999-01**20170301~\
/// SE*3*0001~GE*1*1~IEA*1*000000001~";
///
/// let interchange = X12Parser::strict().parse_interchange(edi).unwrap();
/// assert_eq!(interchange.groups[0].transactions[0].set_identifier(), "850");
/// ```
#[derive(Debug, Clone, Default)]
pub struct X12Parser {
    options: X12Options,
}

impl X12Parser {
    /// Create a lenient parser with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a strict parser with default options
    pub fn strict() -> Self {
        Self::with_options(X12Options::new().with_strict(true))
    }

    /// Create a parser with `options`
    pub fn with_options(options: X12Options) -> Self {
        Self { options }
    }

    /// Active options
    pub fn options(&self) -> &X12Options {
        &self.options
    }

    /// Parse a whole document
    pub fn parse<'a>(&self, document: impl Into<Option<&'a str>>) -> Result<Document> {
        let document = document
            .into()
            .ok_or_else(|| X12Error::argument_null("document"))?;
        self.parse_chunks(std::iter::once(document))
    }

    /// Parse a document that must hold a single interchange
    pub fn parse_interchange<'a>(
        &self,
        document: impl Into<Option<&'a str>>,
    ) -> Result<Interchange> {
        let mut parsed = self.parse(document)?;
        if parsed.interchanges.len() > 1 {
            log::warn!(
                "document holds {} interchanges; returning the first",
                parsed.interchanges.len()
            );
        }
        if parsed.interchanges.is_empty() {
            return Err(X12Error::parse("document does not contain an interchange"));
        }
        Ok(parsed.interchanges.swap_remove(0))
    }

    /// Parse text delivered in chunks
    ///
    /// Chunk boundaries need not align with segments or elements.
    pub fn parse_chunks<I, S>(&self, chunks: I) -> Result<Document>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokenizer = self.tokenizer();
        let mut builder = TreeBuilder::new(&self.options, self.options.delimiters());

        for chunk in chunks {
            let segments = tokenizer.feed(chunk.as_ref())?;
            builder.queue_delimiters(tokenizer.take_discovered());
            for segment in segments {
                builder.push(segment)?;
            }
        }

        let segments = tokenizer.finish()?;
        builder.queue_delimiters(tokenizer.take_discovered());
        for segment in segments {
            builder.push(segment)?;
        }

        builder.finish()
    }

    /// Build a document from segments that were tokenized separately
    pub fn parse_segments<I>(&self, segments: I, delimiters: &Delimiters) -> Result<Document>
    where
        I: IntoIterator<Item = Segment>,
    {
        let mut builder = TreeBuilder::new(&self.options, *delimiters);
        for segment in segments {
            builder.push(segment)?;
        }
        builder.finish()
    }

    /// A fresh streaming tokenizer using this parser's options
    pub fn tokenizer(&self) -> SegmentTokenizer {
        SegmentTokenizer::new(&self.options)
    }
}
