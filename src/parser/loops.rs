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

//! Loop resolution inside a transaction set
//!
//! The tracker keeps a stack of open loop frames. Bounded loops are pushed by
//! their opening tag and popped by their trailer. Unbounded loops nest by the
//! declaration order of their headers: an occurrence closes every open
//! unbounded frame declared at or after its own position (never crossing a
//! bounded frame) and then opens its own frame.
//!
//! Hierarchical loops additionally record `id -> (parent, level)` so that each
//! frame carries the root-first chain of level codes of its ancestors. The
//! graph lives only for the current transaction.

use crate::error::{Result, X12Error};
use crate::model::{
    Element, HeaderTable, LoopFrame, LoopPath, LoopStyle, Position, Segment, SegmentHeader,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct OpenFrame {
    frame: LoopFrame,
    style: LoopStyle,
    precedence: usize,
    no_unbounded_children: bool,
}

#[derive(Debug, Clone)]
struct HierarchyNode {
    parent: Option<String>,
    level: String,
}

/// Per-transaction loop state
#[derive(Debug, Clone)]
pub struct LoopTracker {
    headers: Arc<HeaderTable>,
    strict: bool,
    stack: Vec<OpenFrame>,
    next_instance: u32,
    hierarchy: FxHashMap<String, HierarchyNode>,
}

impl LoopTracker {
    /// Create a tracker for `headers`
    pub fn new(headers: Arc<HeaderTable>, strict: bool) -> Self {
        Self {
            headers,
            strict,
            stack: Vec::new(),
            next_instance: 0,
            hierarchy: FxHashMap::default(),
        }
    }

    /// Forget all state; called when a transaction opens
    pub fn reset(&mut self) {
        self.stack.clear();
        self.next_instance = 0;
        self.hierarchy.clear();
    }

    /// Compute the loop path of a body segment and update the open loops
    pub fn resolve(&mut self, segment: &Segment) -> Result<LoopPath> {
        let headers = Arc::clone(&self.headers);

        if let Some(opener) = headers
            .opener_for_trailer(&segment.tag)
            .filter(|h| h.loop_style == Some(LoopStyle::Bounded))
        {
            return self.close_bounded(opener, segment);
        }

        let Some(header) = headers.get(&segment.tag) else {
            return Ok(self.current_path());
        };
        let Some(precedence) = headers.position(&segment.tag) else {
            return Ok(self.current_path());
        };

        match header.loop_style {
            Some(LoopStyle::Bounded) => {
                let frame = self.new_frame(header, segment);
                log::debug!("opened bounded loop {frame}");
                self.stack.push(OpenFrame {
                    frame,
                    style: LoopStyle::Bounded,
                    precedence,
                    no_unbounded_children: header.loop_no_unbounded_children,
                });
                Ok(self.current_path())
            }
            Some(LoopStyle::Unbounded) => {
                if self.forbidden_beneath(precedence) {
                    return Ok(self.current_path());
                }
                while self.stack.last().is_some_and(|top| {
                    top.style == LoopStyle::Unbounded && top.precedence >= precedence
                }) {
                    self.stack.pop();
                }

                let mut frame = self.new_frame(header, segment);
                if header.hierarchy.is_some() {
                    frame.ancestry = Some(self.record_hierarchy(header, segment));
                }
                self.stack.push(OpenFrame {
                    frame,
                    style: LoopStyle::Unbounded,
                    precedence,
                    no_unbounded_children: header.loop_no_unbounded_children,
                });
                Ok(self.current_path())
            }
            None => Ok(self.current_path()),
        }
    }

    /// Close out the transaction; open bounded loops are an error in strict mode
    pub fn finish(&mut self, position: Position) -> Result<()> {
        let unclosed: Vec<String> = self
            .stack
            .iter()
            .filter(|f| f.style == LoopStyle::Bounded)
            .map(|f| f.frame.to_string())
            .collect();
        self.reset();

        if unclosed.is_empty() {
            return Ok(());
        }
        let message = format!("bounded loop {} was not closed", unclosed.join(", "));
        if self.strict {
            return Err(X12Error::parse_at(message, position));
        }
        log::warn!("{message} at {position}");
        Ok(())
    }

    fn current_path(&self) -> LoopPath {
        self.stack.iter().map(|f| f.frame.clone()).collect()
    }

    fn new_frame(&mut self, header: &SegmentHeader, segment: &Segment) -> LoopFrame {
        self.next_instance += 1;
        let value = header
            .loop_id_index
            .and_then(|i| segment.element(i))
            .map(Element::trimmed)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        LoopFrame::new(&segment.tag, value, self.next_instance)
    }

    // A later-declared unbounded loop may not open inside a loop that forbids it
    fn forbidden_beneath(&self, precedence: usize) -> bool {
        self.stack
            .iter()
            .any(|f| f.no_unbounded_children && f.precedence < precedence)
    }

    fn close_bounded(&mut self, opener: &SegmentHeader, segment: &Segment) -> Result<LoopPath> {
        let Some(index) = self.stack.iter().rposition(|f| f.frame.tag == opener.tag) else {
            let message = format!(
                "{} has no matching open {} loop",
                segment.tag, opener.tag
            );
            if self.strict {
                return Err(X12Error::parse_at(message, segment.range.start));
            }
            log::warn!("{message} at {}", segment.range.start);
            return Ok(self.current_path());
        };

        if let Some(inner) = self.stack[index + 1..]
            .iter()
            .find(|f| f.style == LoopStyle::Bounded)
        {
            let message = format!(
                "{} closes {} while bounded loop {} is still open",
                segment.tag, opener.tag, inner.frame
            );
            if self.strict {
                return Err(X12Error::parse_at(message, segment.range.start));
            }
            log::warn!("{message} at {}", segment.range.start);
        }

        let path = self.stack[..=index].iter().map(|f| f.frame.clone()).collect();
        let closed = self.stack.split_off(index);
        log::debug!("closed bounded loop {}", closed[0].frame);
        Ok(path)
    }

    fn record_hierarchy(&mut self, header: &SegmentHeader, segment: &Segment) -> Vec<String> {
        let Some(layout) = header.hierarchy else {
            return Vec::new();
        };
        let text = |index: usize| {
            segment
                .element(index)
                .map(Element::trimmed)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let level = header.loop_id_index.and_then(text).unwrap_or_default();
        let Some(id) = text(layout.id_index) else {
            return vec![level];
        };
        self.hierarchy.insert(
            id.clone(),
            HierarchyNode {
                parent: text(layout.parent_index),
                level,
            },
        );

        let mut chain = Vec::new();
        let mut current = Some(id);
        // Bounded by the node count so a parent cycle cannot loop forever
        while let Some(node) = current
            .as_ref()
            .and_then(|id| self.hierarchy.get(id))
            .filter(|_| chain.len() <= self.hierarchy.len())
        {
            chain.push(node.level.clone());
            current = node.parent.clone();
        }
        if let Some(missing) = current.filter(|_| chain.len() <= self.hierarchy.len()) {
            log::warn!(
                "{} at {} references unknown parent {missing}",
                segment.tag,
                segment.range.start
            );
        }
        chain.reverse();
        chain
    }
}
