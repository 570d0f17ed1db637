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

//! Push-based segment tokenizer
//!
//! [`SegmentTokenizer`] accepts text in arbitrary chunks and emits each
//! segment as soon as its terminator has been seen. Chunk boundaries may fall
//! anywhere, including inside the `ISA` header; unconsumed text is kept until
//! the next [`feed`] or [`finish`].
//!
//! [`feed`]: SegmentTokenizer::feed
//! [`finish`]: SegmentTokenizer::finish

use super::delimiters::{self, ISA_LENGTH};
use crate::config::{Delimiters, X12Options};
use crate::error::{Result, X12Error};
use crate::model::{Element, HeaderTable, Position, PositionTracker, Range, Segment};
use std::sync::Arc;

/// Incremental tokenizer state
#[derive(Debug, Clone)]
pub struct SegmentTokenizer {
    options: X12Options,
    headers: Arc<HeaderTable>,
    buffer: String,
    /// Byte offset of the first unconsumed character in `buffer`
    consumed: usize,
    /// Position of `buffer[consumed..]`
    tracker: PositionTracker,
    /// Delimiters of the current interchange; `None` until an `ISA` is read
    delimiters: Option<Delimiters>,
    last_delimiters: Option<Delimiters>,
    /// Delimiters of each `ISA` read since the last `take_discovered`
    discovered: Vec<Delimiters>,
    emitted: usize,
}

impl SegmentTokenizer {
    /// Create a tokenizer with `options`
    pub fn new(options: &X12Options) -> Self {
        Self {
            headers: options.headers(),
            options: options.clone(),
            buffer: String::new(),
            consumed: 0,
            tracker: PositionTracker::new(),
            delimiters: None,
            last_delimiters: None,
            discovered: Vec::new(),
            emitted: 0,
        }
    }

    /// Delimiters of the most recently read interchange header
    pub fn delimiters(&self) -> Option<Delimiters> {
        self.delimiters.or(self.last_delimiters)
    }

    /// Drain the delimiters of every `ISA` emitted since the last call
    pub fn take_discovered(&mut self) -> Vec<Delimiters> {
        std::mem::take(&mut self.discovered)
    }

    /// Number of segments emitted so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Consume a chunk and return every segment it completes
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<Segment>> {
        self.buffer.push_str(chunk);
        let segments = self.drain(false)?;
        self.compact();
        Ok(segments)
    }

    /// Signal end of input and return the remaining segments
    pub fn finish(&mut self) -> Result<Vec<Segment>> {
        let segments = self.drain(true)?;
        self.compact();

        if self.options.strict && self.emitted == 0 {
            return Err(X12Error::parse_at(
                "document is too short to contain an interchange",
                self.tracker.position(),
            ));
        }

        log::debug!("tokenized {} segments", self.emitted);
        Ok(segments)
    }

    fn drain(&mut self, finishing: bool) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();

        loop {
            self.skip_formatting();
            let rest = &self.buffer[self.consumed..];
            if rest.is_empty() {
                break;
            }

            if self.delimiters.is_none() {
                if !finishing && rest.chars().take(ISA_LENGTH).count() < ISA_LENGTH {
                    break;
                }
                let start = self.tracker.position();
                match delimiters::discover(rest, &self.options, start) {
                    Ok(found) => {
                        self.delimiters = Some(found);
                        self.discovered.push(found);
                        let isa = self.take_isa(found)?;
                        segments.push(isa);
                        continue;
                    }
                    Err(err) if self.options.strict => return Err(err),
                    Err(err) => {
                        log::warn!("{err}; using configured delimiters");
                        self.delimiters =
                            Some(self.last_delimiters.unwrap_or_else(|| self.options.delimiters()));
                    }
                }
            }

            let Some(delimiters) = self.delimiters else {
                break;
            };

            let rest = &self.buffer[self.consumed..];
            let Some(end) = rest.find(delimiters.segment) else {
                if finishing {
                    let start = self.tracker.position();
                    if self.options.strict {
                        return Err(X12Error::parse_at(
                            "segment is missing its terminator",
                            start,
                        ));
                    }
                    log::warn!("unterminated segment at {start}");
                    let raw = rest.to_string();
                    if let Some(segment) = self.take_segment(&raw, delimiters, None)? {
                        segments.push(segment);
                    }
                }
                break;
            };

            let raw = rest[..end].to_string();
            if let Some(segment) = self.take_segment(&raw, delimiters, Some(delimiters.segment))? {
                if segment.tag == "IEA" {
                    self.last_delimiters = self.delimiters.take();
                }
                segments.push(segment);
            }
        }

        Ok(segments)
    }

    /// Skip line breaks and blanks that follow a terminator
    fn skip_formatting(&mut self) {
        let rest = &self.buffer[self.consumed..];
        let skipped = rest
            .char_indices()
            .find(|(_, ch)| !ch.is_whitespace())
            .map_or(rest.len(), |(i, _)| i);
        if skipped > 0 {
            self.tracker.advance_str(&rest[..skipped]);
            self.consumed += skipped;
        }
    }

    /// Consume the fixed-width `ISA` segment
    fn take_isa(&mut self, delimiters: Delimiters) -> Result<Segment> {
        let rest = &self.buffer[self.consumed..];
        let raw_len = rest
            .char_indices()
            .nth(ISA_LENGTH - 1)
            .map_or(rest.len(), |(i, _)| i);
        let raw = rest[..raw_len].to_string();
        let start = self.tracker.position();
        let segment = split_segment(&raw, delimiters.element, start);

        self.tracker.advance_str(&raw);
        self.tracker.advance(delimiters.segment);
        self.consumed += raw_len + delimiters.segment.len_utf8();

        if self.options.strict {
            self.validate(&segment)?;
        }
        self.emitted += 1;
        Ok(segment)
    }

    fn take_segment(
        &mut self,
        raw: &str,
        delimiters: Delimiters,
        terminator: Option<char>,
    ) -> Result<Option<Segment>> {
        let start = self.tracker.position();
        let segment = split_segment(raw, delimiters.element, start);

        self.tracker.advance_str(raw);
        self.consumed += raw.len();
        if let Some(terminator) = terminator {
            self.tracker.advance(terminator);
            self.consumed += terminator.len_utf8();
        }

        if segment.tag.is_empty() {
            if self.options.strict {
                return Err(X12Error::parse_at("empty segment", start));
            }
            log::warn!("skipping empty segment at {start}");
            return Ok(None);
        }

        if self.options.strict {
            self.validate(&segment)?;
        }

        self.emitted += 1;
        Ok(Some(segment))
    }

    fn validate(&self, segment: &Segment) -> Result<()> {
        let Some(header) = self.headers.get(&segment.tag) else {
            return Ok(());
        };
        let values: Vec<&str> = segment.elements.iter().map(Element::as_str).collect();
        header
            .validate(&values)
            .map_err(|err| X12Error::parse_at(err.to_string(), segment.range.start))
    }

    fn compact(&mut self) {
        if self.consumed > 0 {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
    }
}

/// Split raw segment text into a tag and ranged elements
pub(crate) fn split_segment(raw: &str, element_delimiter: char, start: Position) -> Segment {
    let mut tracker = PositionTracker::at(start);
    let mut parts = raw.split(element_delimiter);
    let tag = parts.next().unwrap_or_default().to_string();
    tracker.advance_str(&tag);

    let elements = parts
        .map(|part| {
            tracker.advance(element_delimiter);
            let element_start = tracker.position();
            tracker.advance_str(part);
            Element::with_range(part, Range::new(element_start, tracker.position()))
        })
        .collect();

    Segment {
        tag,
        elements,
        range: Range::new(start, tracker.position()),
        loop_path: None,
    }
}
