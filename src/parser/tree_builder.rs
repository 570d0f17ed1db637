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

//! Envelope assembly
//!
//! Segments arrive in document order. `ISA`, `GS` and `ST` open an envelope
//! and `IEA`, `GE` and `SE` close it; everything else is a body segment of the
//! open transaction and gets its loop path from the [`LoopTracker`].
//!
//! Strict mode rejects envelope mismatches. Otherwise they are logged and
//! envelopes are closed implicitly.

use super::loops::LoopTracker;
use crate::config::{Delimiters, X12Options};
use crate::error::{Result, X12Error};
use crate::model::{Document, FunctionalGroup, Interchange, Position, Segment, Transaction};
use std::collections::VecDeque;

/// Incremental builder of a [`Document`]
#[derive(Debug)]
pub struct TreeBuilder {
    strict: bool,
    loops: LoopTracker,
    fallback: Delimiters,
    discovered: VecDeque<Delimiters>,
    interchanges: Vec<Interchange>,
    interchange: Option<Interchange>,
    group: Option<FunctionalGroup>,
    transaction: Option<Transaction>,
    /// End of the last segment pushed
    last_position: Position,
}

impl TreeBuilder {
    /// Create a builder; interchanges use `fallback` unless discovered delimiters are queued
    pub fn new(options: &X12Options, fallback: Delimiters) -> Self {
        Self {
            strict: options.strict,
            loops: LoopTracker::new(options.headers(), options.strict),
            fallback,
            discovered: VecDeque::new(),
            interchanges: Vec::new(),
            interchange: None,
            group: None,
            transaction: None,
            last_position: Position::default(),
        }
    }

    /// Queue delimiters for upcoming interchanges, in document order
    pub fn queue_delimiters(&mut self, delimiters: impl IntoIterator<Item = Delimiters>) {
        self.discovered.extend(delimiters);
    }

    /// Add the next segment
    pub fn push(&mut self, mut segment: Segment) -> Result<()> {
        self.last_position = segment.range.end;
        match segment.tag.as_str() {
            "ISA" => self.open_interchange(segment),
            "GS" => self.open_group(segment),
            "ST" => self.open_transaction(segment),
            "SE" => self.close_transaction(segment),
            "GE" => self.close_group(segment),
            "IEA" => self.close_interchange(segment),
            _ => {
                let Some(transaction) = self.transaction.as_mut() else {
                    return self.violation(
                        format!("{} segment is outside of a transaction set", segment.tag),
                        segment.range.start,
                    );
                };
                segment.loop_path = Some(self.loops.resolve(&segment)?);
                transaction.segments.push(segment);
                Ok(())
            }
        }
    }

    /// Close any open envelope and return the document
    pub fn finish(mut self) -> Result<Document> {
        if self.interchange.is_some() {
            self.violation("interchange is missing its IEA trailer", self.last_position)?;
            self.flush_interchange()?;
        }
        log::debug!("built {} interchange(s)", self.interchanges.len());
        Ok(Document::new(self.interchanges))
    }

    fn open_interchange(&mut self, segment: Segment) -> Result<()> {
        if self.interchange.is_some() {
            self.violation("ISA found before IEA", segment.range.start)?;
            self.flush_interchange()?;
        }
        let delimiters = self.discovered.pop_front().unwrap_or(self.fallback);
        self.interchange = Some(Interchange::new(segment, delimiters));
        Ok(())
    }

    fn open_group(&mut self, segment: Segment) -> Result<()> {
        if self.interchange.is_none() {
            return self.violation("GS found outside of an interchange", segment.range.start);
        }
        if self.group.is_some() {
            self.violation("GS found before GE", segment.range.start)?;
            self.flush_group()?;
        }
        self.group = Some(FunctionalGroup::new(segment));
        Ok(())
    }

    fn open_transaction(&mut self, segment: Segment) -> Result<()> {
        if self.group.is_none() {
            return self.violation("ST found outside of a functional group", segment.range.start);
        }
        if self.transaction.is_some() {
            self.violation("ST found before SE", segment.range.start)?;
            self.flush_transaction(segment.range.start)?;
        }
        self.loops.reset();
        self.transaction = Some(Transaction::new(segment));
        Ok(())
    }

    fn close_transaction(&mut self, segment: Segment) -> Result<()> {
        let position = segment.range.start;
        let Some(transaction) = self.transaction.as_mut() else {
            return self.violation("SE has no matching ST", position);
        };

        let count = transaction.segment_count();
        let control = transaction.control_number().to_string();
        let declared_count = segment.value_of(1, "").to_string();
        let declared_control = segment.value_of(2, "").to_string();
        transaction.trailer = Some(segment);

        if !counts_match(&declared_count, count) {
            self.violation(
                format!("SE01 declares {declared_count} segments but transaction has {count}"),
                position,
            )?;
        }
        if declared_control.trim() != control.trim() {
            self.violation(
                format!("SE02 control number {declared_control} does not match ST02 {control}"),
                position,
            )?;
        }

        self.flush_transaction(position)
    }

    fn close_group(&mut self, segment: Segment) -> Result<()> {
        let position = segment.range.start;
        if self.transaction.is_some() {
            self.violation("GE found before SE", position)?;
            self.flush_transaction(position)?;
        }
        let Some(group) = self.group.as_mut() else {
            return self.violation("GE has no matching GS", position);
        };

        let count = group.transactions.len();
        let control = group.control_number().to_string();
        let declared_count = segment.value_of(1, "").to_string();
        let declared_control = segment.value_of(2, "").to_string();
        group.trailer = Some(segment);

        if !counts_match(&declared_count, count) {
            self.violation(
                format!("GE01 declares {declared_count} transaction sets but group has {count}"),
                position,
            )?;
        }
        if declared_control.trim() != control.trim() {
            self.violation(
                format!("GE02 control number {declared_control} does not match GS06 {control}"),
                position,
            )?;
        }

        self.flush_group()
    }

    fn close_interchange(&mut self, segment: Segment) -> Result<()> {
        let position = segment.range.start;
        if self.group.is_some() {
            self.violation("IEA found before GE", position)?;
            self.flush_group()?;
        }
        let Some(interchange) = self.interchange.as_mut() else {
            return self.violation("IEA has no matching ISA", position);
        };

        let count = interchange.groups.len();
        let control = interchange.control_number().to_string();
        let declared_count = segment.value_of(1, "").to_string();
        let declared_control = segment.value_of(2, "").to_string();
        interchange.trailer = Some(segment);

        if !counts_match(&declared_count, count) {
            self.violation(
                format!("IEA01 declares {declared_count} functional groups but interchange has {count}"),
                position,
            )?;
        }
        if declared_control.trim() != control.trim() {
            self.violation(
                format!("IEA02 control number {declared_control} does not match ISA13 {control}"),
                position,
            )?;
        }

        self.flush_interchange()
    }

    fn flush_transaction(&mut self, position: Position) -> Result<()> {
        let Some(transaction) = self.transaction.take() else {
            return Ok(());
        };
        self.loops.finish(position)?;
        if let Some(group) = self.group.as_mut() {
            group.transactions.push(transaction);
        }
        Ok(())
    }

    fn flush_group(&mut self) -> Result<()> {
        if self.transaction.is_some() {
            self.flush_transaction(self.last_position)?;
        }
        let Some(group) = self.group.take() else {
            return Ok(());
        };
        if let Some(interchange) = self.interchange.as_mut() {
            interchange.groups.push(group);
        }
        Ok(())
    }

    fn flush_interchange(&mut self) -> Result<()> {
        self.flush_group()?;
        if let Some(interchange) = self.interchange.take() {
            self.interchanges.push(interchange);
        }
        Ok(())
    }

    fn violation(&self, message: impl Into<String>, position: Position) -> Result<()> {
        let message = message.into();
        if self.strict {
            return Err(X12Error::parse_at(message, position));
        }
        log::warn!("{message} at {position}");
        Ok(())
    }
}

fn counts_match(declared: &str, actual: usize) -> bool {
    declared.trim().parse::<usize>().is_ok_and(|n| n == actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn seg(raw: &str) -> Segment {
        let mut parts = raw.split('*');
        let tag = parts.next().unwrap_or_default();
        Segment::with_values(tag, parts)
    }

    const ENVELOPE: &[&str] = &[
        "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *170301*1129*U*00401*000000001*0*T*>",
        "GS*PO*SENDER*RECEIVER*20170301*1129*1*X*004010",
        "ST*850*0001",
        "BEG*00*SA*A99999-01**20170301",
        "REF*DP*038",
        "SE*4*0001",
        "GE*1*1",
        "IEA*1*000000001",
    ];

    fn build(lines: &[&str], strict: bool) -> Result<Document> {
        let options = X12Options::new().with_strict(strict);
        let mut builder = TreeBuilder::new(&options, Delimiters::default());
        for line in lines {
            builder.push(seg(line))?;
        }
        builder.finish()
    }

    #[test]
    fn test_well_formed_envelope() {
        let document = build(ENVELOPE, true).unwrap();
        assert_eq!(document.len(), 1);
        let interchange = &document.interchanges[0];
        assert_eq!(interchange.groups.len(), 1);
        let transaction = &interchange.groups[0].transactions[0];
        assert_eq!(transaction.segments.len(), 2);
        assert!(transaction.trailer.is_some());
        assert!(transaction.header.loop_path.is_none());
        assert_eq!(transaction.segments[0].loop_path, Some(Default::default()));
    }

    #[test]
    fn test_strict_count_and_control_mismatches() {
        for (index, replacement) in [
            (5, "SE*5*0001"),
            (5, "SE*4*0002"),
            (6, "GE*2*1"),
            (6, "GE*1*9"),
            (7, "IEA*2*000000001"),
            (7, "IEA*1*000000002"),
        ] {
            let mut lines = ENVELOPE.to_vec();
            lines[index] = replacement;
            let err = build(&lines, true).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parse, "{replacement}");
            assert!(build(&lines, false).is_ok(), "{replacement}");
        }
    }

    #[test]
    fn test_lenient_missing_trailers_close_implicitly() {
        let lines = &ENVELOPE[..5];
        assert!(build(lines, true).is_err());

        let document = build(lines, false).unwrap();
        let group = &document.interchanges[0].groups[0];
        assert_eq!(group.transactions.len(), 1);
        assert!(group.trailer.is_none());
        assert!(group.transactions[0].trailer.is_none());
    }

    #[test]
    fn test_missing_trailer_reported_at_last_segment() {
        let options = X12Options::new().with_strict(true);
        let mut builder = TreeBuilder::new(&options, Delimiters::default());
        let mut last_end = Position::default();
        for (line, raw) in ENVELOPE[..5].iter().enumerate() {
            let mut segment = seg(raw);
            segment.range.start = Position::new(line, 0, line * 120);
            segment.range.end = Position::new(line, raw.len() + 1, line * 120 + raw.len() + 1);
            last_end = segment.range.end;
            builder.push(segment).unwrap();
        }
        match builder.finish().unwrap_err() {
            X12Error::Parse { position, .. } => assert_eq!(position, Some(last_end)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_orphan_body_segment() {
        let lines = ["REF*DP*038"];
        assert!(build(&lines, true).is_err());
        assert!(build(&lines, false).unwrap().is_empty());
    }
}
