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

//! Flattened view of a parsed tree
//!
//! Every segment becomes one entry in document order, tagged with the
//! envelope it belongs to. An evaluation scope is then just a range of entry
//! positions, and loop instances are contiguous sub-ranges.

use super::path_matcher::PathStep;
use crate::model::{Element, HeaderTable, Interchange, LoopPath, Segment, Transaction};
use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::Range;
use std::sync::Arc;

static SYNTHETIC_ISA: Lazy<Segment> = Lazy::new(|| Segment::new("ISA"));
static SYNTHETIC_GS: Lazy<Segment> = Lazy::new(|| Segment::new("GS"));

/// Position of a segment in the envelope hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvelopeKey {
    /// Interchange index
    pub interchange: usize,
    /// Group index; `None` for interchange envelope segments
    pub group: Option<usize>,
    /// Transaction index; `None` outside a transaction
    pub transaction: Option<usize>,
}

impl EnvelopeKey {
    /// Check if two keys can belong to the same envelope; `None` matches anything
    pub fn is_compatible(&self, other: &EnvelopeKey) -> bool {
        fn loose(a: Option<usize>, b: Option<usize>) -> bool {
            a.zip(b).is_none_or(|(a, b)| a == b)
        }
        self.interchange == other.interchange
            && loose(self.group, other.group)
            && loose(self.transaction, other.transaction)
    }
}

/// Whether an entry is an envelope header/trailer or a body segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryRole {
    /// `ISA`, `GS`, `ST` and their trailers
    Envelope,
    /// Transaction body segment
    Body,
}

/// One segment of the flattened document
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry<'a> {
    /// The segment
    pub segment: &'a Segment,
    /// Owning envelope
    pub key: EnvelopeKey,
    /// Envelope or body
    pub role: EntryRole,
}

impl<'a> IndexEntry<'a> {
    /// Loop path of a body segment
    #[inline]
    pub fn loop_path(&self) -> Option<&'a LoopPath> {
        self.segment.loop_path.as_ref()
    }
}

/// The envelope or loop occurrence that directly owns a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// `ISA`/`IEA`
    Interchange(usize),
    /// `GS`/`GE`
    Group(usize, usize),
    /// `ST`/`SE` and body segments outside any loop
    Transaction(EnvelopeKey),
    /// Body segments whose innermost loop is this occurrence
    Loop(EnvelopeKey, u32),
}

/// A resolved envelope or loop occurrence
#[derive(Debug, Clone)]
pub struct LoopInstance {
    /// Path from the interchange root, e.g. `ISA.GS.ST=271.HL=22`
    pub steps: Vec<PathStep>,
    /// Entries enclosed by the occurrence
    pub range: Range<usize>,
    /// Identity of the occurrence
    pub owner: Owner,
}

/// Entries of a document in order
#[derive(Debug, Clone)]
pub struct DocumentIndex<'a> {
    entries: Vec<IndexEntry<'a>>,
    headers: Arc<HeaderTable>,
    /// Resolved path of every interchange, group and transaction
    envelope_steps: FxHashMap<Owner, Vec<PathStep>>,
    /// Ascending entry positions per tag
    positions: FxHashMap<&'a str, Vec<usize>>,
    /// Tags that open a loop somewhere in the document
    loop_tags: FxHashSet<&'a str>,
    interchange_ranges: Vec<Range<usize>>,
}

impl<'a> DocumentIndex<'a> {
    /// Index interchanges in order
    pub fn from_interchanges<I>(interchanges: I, headers: Arc<HeaderTable>) -> Self
    where
        I: IntoIterator<Item = &'a Interchange>,
    {
        let mut index = Self::empty(headers);
        for (i, interchange) in interchanges.into_iter().enumerate() {
            let start = index.len();
            let interchange_key = EnvelopeKey {
                interchange: i,
                group: None,
                transaction: None,
            };
            let isa_steps = vec![index.step(&interchange.header)];
            index.push(&interchange.header, interchange_key, EntryRole::Envelope);
            for (g, group) in interchange.groups.iter().enumerate() {
                let group_key = EnvelopeKey {
                    group: Some(g),
                    ..interchange_key
                };
                let mut gs_steps = isa_steps.clone();
                gs_steps.push(index.step(&group.header));
                index.push(&group.header, group_key, EntryRole::Envelope);
                for (t, transaction) in group.transactions.iter().enumerate() {
                    let key = EnvelopeKey {
                        transaction: Some(t),
                        ..group_key
                    };
                    index.push_transaction(transaction, key, &gs_steps);
                }
                index
                    .envelope_steps
                    .insert(Owner::Group(i, g), gs_steps);
                if let Some(trailer) = &group.trailer {
                    index.push(trailer, group_key, EntryRole::Envelope);
                }
            }
            if let Some(trailer) = &interchange.trailer {
                index.push(trailer, interchange_key, EntryRole::Envelope);
            }
            index
                .envelope_steps
                .insert(Owner::Interchange(i), isa_steps);
            index.interchange_ranges.push(start..index.len());
        }
        index
    }

    /// Index a lone transaction under a synthesized `ISA`/`GS` envelope
    pub fn from_transaction(transaction: &'a Transaction, headers: Arc<HeaderTable>) -> Self {
        let mut index = Self::empty(headers);
        let interchange_key = EnvelopeKey {
            interchange: 0,
            group: None,
            transaction: None,
        };
        let group_key = EnvelopeKey {
            group: Some(0),
            ..interchange_key
        };
        let isa: &'a Segment = &SYNTHETIC_ISA;
        let gs: &'a Segment = &SYNTHETIC_GS;
        let isa_steps = vec![index.step(isa)];
        let gs_steps = vec![index.step(isa), index.step(gs)];
        index.push(isa, interchange_key, EntryRole::Envelope);
        index.push(gs, group_key, EntryRole::Envelope);
        index.push_transaction(
            transaction,
            EnvelopeKey {
                transaction: Some(0),
                ..group_key
            },
            &gs_steps,
        );
        index.envelope_steps.insert(Owner::Interchange(0), isa_steps);
        index.envelope_steps.insert(Owner::Group(0, 0), gs_steps);
        index.interchange_ranges.push(index.full_scope());
        index
    }

    fn empty(headers: Arc<HeaderTable>) -> Self {
        Self {
            entries: Vec::new(),
            headers,
            envelope_steps: FxHashMap::default(),
            positions: FxHashMap::default(),
            loop_tags: FxHashSet::default(),
            interchange_ranges: Vec::new(),
        }
    }

    fn push(&mut self, segment: &'a Segment, key: EnvelopeKey, role: EntryRole) {
        self.positions
            .entry(segment.tag.as_str())
            .or_default()
            .push(self.entries.len());
        if let Some(path) = segment.loop_path.as_ref() {
            self.loop_tags
                .extend(path.frames().iter().map(|f| f.tag.as_str()));
        }
        self.entries.push(IndexEntry { segment, key, role });
    }

    fn push_transaction(
        &mut self,
        transaction: &'a Transaction,
        key: EnvelopeKey,
        envelope: &[PathStep],
    ) {
        let mut steps = envelope.to_vec();
        steps.push(self.step(&transaction.header));
        self.envelope_steps.insert(Owner::Transaction(key), steps);

        self.push(&transaction.header, key, EntryRole::Envelope);
        for segment in &transaction.segments {
            self.push(segment, key, EntryRole::Body);
        }
        if let Some(trailer) = &transaction.trailer {
            self.push(trailer, key, EntryRole::Envelope);
        }
    }

    /// Path step of an envelope header, valued by its loop identifier element
    ///
    /// `GS` carries its functional identifier (`GS01`) as an unrendered
    /// identifier, so literal paths such as `ISA.GS=HB.ST=271` can select it.
    fn step(&self, segment: &Segment) -> PathStep {
        if segment.tag == "GS" {
            let identifier = segment
                .element(1)
                .map(Element::trimmed)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            return PathStep::envelope("GS", identifier);
        }
        let value = self
            .headers
            .get(&segment.tag)
            .and_then(|h| h.loop_id_index)
            .and_then(|i| segment.element(i))
            .map(Element::trimmed)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        PathStep::new(&segment.tag, value)
    }

    /// All entries
    #[inline]
    pub fn entries(&self) -> &[IndexEntry<'a>] {
        &self.entries
    }

    /// Entry at `position`
    #[inline]
    pub fn entry(&self, position: usize) -> &IndexEntry<'a> {
        &self.entries[position]
    }

    /// Scope covering the whole document
    pub fn full_scope(&self) -> Range<usize> {
        0..self.entries.len()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index holds no segment
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of the interchange containing `position`
    pub fn interchange_scope(&self, position: usize) -> Range<usize> {
        let interchange = self.entries[position].key.interchange;
        self.interchange_ranges
            .get(interchange)
            .cloned()
            .unwrap_or_else(|| self.full_scope())
    }

    /// Positions of `tag` segments within `scope`, ascending
    pub fn positions_of(&self, tag: &str, scope: Range<usize>) -> &[usize] {
        let Some(positions) = self.positions.get(tag) else {
            return &[];
        };
        let start = positions.partition_point(|&p| p < scope.start);
        let end = positions.partition_point(|&p| p < scope.end);
        &positions[start..end]
    }

    /// Occurrence directly owning the entry at `position`
    pub fn owner_of(&self, position: usize) -> Owner {
        let entry = &self.entries[position];
        let key = entry.key;
        if let Some(frame) = entry.loop_path().and_then(LoopPath::innermost) {
            return Owner::Loop(key, frame.instance);
        }
        match (key.group, key.transaction) {
            (_, Some(_)) => Owner::Transaction(key),
            (Some(group), None) => Owner::Group(key.interchange, group),
            (None, None) => Owner::Interchange(key.interchange),
        }
    }

    /// Instances of `tag` within `scope`, in document order
    ///
    /// Envelope tags yield their envelopes. A tag that opens a declared loop
    /// anywhere in the document yields its loop instances. Any other tag yields
    /// document-order runs: each occurrence up to the next occurrence, the next
    /// envelope segment or the end of the scope.
    pub fn instances_of(&self, tag: &str, scope: Range<usize>) -> Vec<Range<usize>> {
        match tag {
            "ISA" | "GS" | "ST" => self.envelope_instances(tag, scope),
            _ if self.declares_loop(tag) => self.declared_instances(tag, scope),
            _ => self.document_order_runs(tag, scope),
        }
    }

    fn declares_loop(&self, tag: &str) -> bool {
        self.loop_tags.contains(tag)
    }

    fn envelope_instances(&self, tag: &str, scope: Range<usize>) -> Vec<Range<usize>> {
        group_contiguous(scope, |position| {
            let key = self.entries[position].key;
            match tag {
                "ISA" => Some(Owner::Interchange(key.interchange)),
                "GS" => key.group.map(|g| Owner::Group(key.interchange, g)),
                _ => key.transaction.map(|_| Owner::Transaction(key)),
            }
        })
    }

    fn declared_instances(&self, tag: &str, scope: Range<usize>) -> Vec<Range<usize>> {
        group_contiguous(scope, |position| {
            let entry = &self.entries[position];
            entry
                .loop_path()
                .and_then(|path| path.find(tag))
                .map(|frame| Owner::Loop(entry.key, frame.instance))
        })
    }

    fn document_order_runs(&self, tag: &str, scope: Range<usize>) -> Vec<Range<usize>> {
        let mut runs = Vec::new();
        let mut position = scope.start;
        while position < scope.end {
            if self.entries[position].segment.tag != tag {
                position += 1;
                continue;
            }
            let start = position;
            position += 1;
            while position < scope.end {
                let entry = &self.entries[position];
                if entry.segment.tag == tag || entry.role == EntryRole::Envelope {
                    break;
                }
                position += 1;
            }
            runs.push(start..position);
        }
        runs
    }

    /// Every envelope and loop occurrence that starts or continues in `scope`
    pub fn loop_instances(&self, scope: Range<usize>) -> Vec<LoopInstance> {
        let mut order: Vec<Owner> = Vec::new();
        let mut found: FxHashMap<Owner, LoopInstance> = FxHashMap::default();

        let envelope = |owner: Owner| self.envelope_steps.get(&owner).cloned().unwrap_or_default();
        let mut touch = |owner: Owner, position: usize, steps: &dyn Fn() -> Vec<PathStep>| {
            found
                .entry(owner)
                .and_modify(|instance| instance.range.end = position + 1)
                .or_insert_with(|| {
                    order.push(owner);
                    LoopInstance {
                        steps: steps(),
                        range: position..position + 1,
                        owner,
                    }
                });
        };

        for position in scope {
            let entry = &self.entries[position];
            let key = entry.key;
            let interchange = Owner::Interchange(key.interchange);
            touch(interchange, position, &|| envelope(interchange));
            if let Some(group) = key.group {
                let group = Owner::Group(key.interchange, group);
                touch(group, position, &|| envelope(group));
            }
            if key.transaction.is_none() {
                continue;
            }
            let transaction = Owner::Transaction(key);
            touch(transaction, position, &|| envelope(transaction));

            let Some(path) = entry.loop_path() else {
                continue;
            };
            for (depth, frame) in path.frames().iter().enumerate() {
                touch(Owner::Loop(key, frame.instance), position, &|| {
                    let mut steps = envelope(transaction);
                    steps.extend(
                        path.frames()[..=depth]
                            .iter()
                            .map(|f| PathStep::new(&f.tag, f.value.clone())),
                    );
                    steps
                });
            }
        }

        order
            .into_iter()
            .filter_map(|owner| found.remove(&owner))
            .collect()
    }
}

/// Group contiguous positions sharing an owner, in first-seen order
fn group_contiguous<F>(scope: Range<usize>, mut owner: F) -> Vec<Range<usize>>
where
    F: FnMut(usize) -> Option<Owner>,
{
    let mut order: Vec<Owner> = Vec::new();
    let mut spans: FxHashMap<Owner, Range<usize>> = FxHashMap::default();
    for position in scope {
        let Some(key) = owner(position) else {
            continue;
        };
        spans
            .entry(key)
            .and_modify(|span| span.end = position + 1)
            .or_insert_with(|| {
                order.push(key);
                position..position + 1
            });
    }
    order
        .into_iter()
        .filter_map(|key| spans.remove(&key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::X12Parser;
    use pretty_assertions::assert_eq;

    const DOC: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *170301*1129*U*00401*000000001*0*T*>~\
GS*SH*SENDER*RECEIVER*20170301*1129*1*X*004010~\
ST*856*0001~BSN*00*123*20170301*1129~\
HL*1**S~TD1*CTN*2~HL*2*1*O~PRF*PO1~HL*3*2*I~LIN**IN*87787D~SN1**1*EA~\
SE*10*0001~GE*1*1~IEA*1*000000001~";

    fn tags(index: &DocumentIndex<'_>, range: &Range<usize>) -> Vec<String> {
        range
            .clone()
            .map(|p| index.entry(p).segment.tag.clone())
            .collect()
    }

    #[test]
    fn test_entries_in_document_order() {
        let document = X12Parser::strict().parse(DOC).unwrap();
        let index = DocumentIndex::from_interchanges(&document.interchanges, HeaderTable::shared_standard());
        assert_eq!(index.len(), 14);
        assert_eq!(index.entry(0).role, EntryRole::Envelope);
        assert_eq!(index.entry(3).role, EntryRole::Body);
        assert_eq!(index.owner_of(0), Owner::Interchange(0));
        assert_eq!(index.owner_of(1), Owner::Group(0, 0));
    }

    #[test]
    fn test_declared_and_document_order_instances() {
        let document = X12Parser::strict().parse(DOC).unwrap();
        let index = DocumentIndex::from_interchanges(&document.interchanges, HeaderTable::shared_standard());

        let hl = index.instances_of("HL", index.full_scope());
        assert_eq!(hl.len(), 3);
        assert_eq!(tags(&index, &hl[2]), vec!["HL", "LIN", "SN1"]);

        let td1 = index.instances_of("TD1", index.full_scope());
        assert_eq!(td1.len(), 1);
        assert_eq!(tags(&index, &td1[0]), vec!["TD1", "HL", "PRF", "HL", "LIN", "SN1"]);

        let st = index.instances_of("ST", index.full_scope());
        assert_eq!(st, vec![2..12]);
    }

    #[test]
    fn test_positions_by_tag() {
        let document = X12Parser::strict().parse(DOC).unwrap();
        let index = DocumentIndex::from_interchanges(&document.interchanges, HeaderTable::shared_standard());
        assert_eq!(index.positions_of("HL", index.full_scope()), &[4, 6, 8]);
        assert_eq!(index.positions_of("HL", 5..8), &[6]);
        assert!(index.positions_of("N1", index.full_scope()).is_empty());
        assert_eq!(index.interchange_scope(5), 0..14);
    }

    #[test]
    fn test_group_step_carries_identifier() {
        let document = X12Parser::strict().parse(DOC).unwrap();
        let index = DocumentIndex::from_interchanges(&document.interchanges, HeaderTable::shared_standard());
        let instances = index.loop_instances(index.full_scope());
        let group = &instances[1];
        assert_eq!(group.owner, Owner::Group(0, 0));
        assert_eq!(group.steps[1].identifier.as_deref(), Some("SH"));
        assert_eq!(instances[2].steps[1], group.steps[1]);
    }

    #[test]
    fn test_loop_instances_render_paths() {
        let document = X12Parser::strict().parse(DOC).unwrap();
        let index = DocumentIndex::from_interchanges(&document.interchanges, HeaderTable::shared_standard());
        let rendered: Vec<String> = index
            .loop_instances(index.full_scope())
            .iter()
            .map(|i| super::super::path_matcher::render_steps(&i.steps))
            .collect();
        assert_eq!(
            rendered,
            vec![
                "ISA",
                "ISA.GS",
                "ISA.GS.ST=856",
                "ISA.GS.ST=856.HL=S",
                "ISA.GS.ST=856.HL=O",
                "ISA.GS.ST=856.HL=I",
            ]
        );
    }

    #[test]
    fn test_transaction_gets_synthetic_envelope() {
        let document = X12Parser::strict().parse(DOC).unwrap();
        let transaction = &document.interchanges[0].groups[0].transactions[0];
        let index = DocumentIndex::from_transaction(transaction, HeaderTable::shared_standard());
        assert_eq!(index.entry(0).segment.tag, "ISA");
        assert_eq!(index.entry(1).segment.tag, "GS");
        assert_eq!(index.len(), 12);
    }

    #[test]
    fn test_key_compatibility() {
        let interchange = EnvelopeKey {
            interchange: 0,
            group: None,
            transaction: None,
        };
        let body = EnvelopeKey {
            interchange: 0,
            group: Some(0),
            transaction: Some(1),
        };
        let other = EnvelopeKey {
            transaction: Some(2),
            ..body
        };
        assert!(interchange.is_compatible(&body));
        assert!(!body.is_compatible(&other));
    }
}
