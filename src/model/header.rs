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

//! Segment header definitions
//!
//! A header describes a recognized segment tag: how many elements it carries,
//! the length bounds of each element, and whether the tag opens a loop. Headers
//! are plain records looked up by tag in a [`HeaderTable`]; the table order is
//! significant because unbounded loops nest by declaration precedence.

use crate::error::{Result, X12Error};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a loop-opening segment delimits its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopStyle {
    /// Explicit open tag closed by a distinct trailer tag
    Bounded,
    /// Every occurrence of the tag starts a new loop instance
    Unbounded,
}

/// Element positions of a parent-pointer hierarchy segment (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HierarchyLayout {
    /// Element carrying the node's own identifier
    pub id_index: usize,
    /// Element carrying the parent node's identifier
    pub parent_index: usize,
}

/// Length bounds of a single element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRule {
    /// Maximum length
    pub max: usize,
    /// Minimum length of a non-empty value
    #[serde(default)]
    pub min: usize,
}

impl ElementRule {
    /// Create a rule
    pub const fn new(max: usize, min: usize) -> Self {
        Self { max, min }
    }
}

/// Element layout of a segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentLayout {
    /// Rules for each element position, in order
    pub elements: Vec<ElementRule>,
    /// Number of leading elements that must be present
    pub required: usize,
    /// Whether short values are padded to their maximum length
    #[serde(default)]
    pub padding: bool,
}

impl SegmentLayout {
    /// Create a layout from `(max, min)` pairs
    pub fn new(required: usize, rules: &[(usize, usize)]) -> Self {
        Self {
            elements: rules
                .iter()
                .map(|&(max, min)| ElementRule::new(max, min))
                .collect(),
            required,
            padding: false,
        }
    }

    /// Mark the layout as fixed-width
    pub fn padded(mut self) -> Self {
        self.padding = true;
        self
    }

    /// Check if the layout declares no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Static description of a recognized segment tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentHeader {
    /// Segment tag
    pub tag: String,
    /// Trailer tag closing a bounded loop or envelope
    #[serde(default)]
    pub trailer: Option<String>,
    /// Element layout
    #[serde(default)]
    pub layout: SegmentLayout,
    /// Loop style, when the tag opens a loop
    #[serde(default)]
    pub loop_style: Option<LoopStyle>,
    /// 1-based index of the element identifying the loop instance
    #[serde(default)]
    pub loop_id_index: Option<usize>,
    /// Forbid later-declared unbounded loops from opening inside this loop
    #[serde(default)]
    pub loop_no_unbounded_children: bool,
    /// Parent-pointer layout for hierarchical loops
    #[serde(default)]
    pub hierarchy: Option<HierarchyLayout>,
}

impl SegmentHeader {
    /// Create a header that opens no loop
    pub fn new(tag: impl Into<String>, layout: SegmentLayout) -> Self {
        Self {
            tag: tag.into(),
            trailer: None,
            layout,
            loop_style: None,
            loop_id_index: None,
            loop_no_unbounded_children: false,
            hierarchy: None,
        }
    }

    /// Make this header open a bounded loop closed by `trailer`
    pub fn bounded(mut self, trailer: impl Into<String>) -> Self {
        self.loop_style = Some(LoopStyle::Bounded);
        self.trailer = Some(trailer.into());
        self
    }

    /// Make this header open an unbounded loop
    pub fn unbounded(mut self) -> Self {
        self.loop_style = Some(LoopStyle::Unbounded);
        self
    }

    /// Set the 1-based element identifying the loop instance
    pub fn with_loop_id_index(mut self, index: usize) -> Self {
        self.loop_id_index = Some(index);
        self
    }

    /// Forbid later-declared unbounded loops inside this loop
    pub fn without_unbounded_children(mut self) -> Self {
        self.loop_no_unbounded_children = true;
        self
    }

    /// Resolve this unbounded loop through parent pointers
    pub fn hierarchical(mut self, id_index: usize, parent_index: usize) -> Self {
        self.hierarchy = Some(HierarchyLayout {
            id_index,
            parent_index,
        });
        self
    }

    /// Element reference name such as `ISA13` for a 0-based index
    pub fn element_name(&self, index: usize) -> String {
        format!("{}{:02}", self.tag, index + 1)
    }

    /// Check element count and element lengths against the layout
    pub fn validate<S: AsRef<str>>(&self, values: &[S]) -> Result<()> {
        let layout = &self.layout;
        if layout.is_empty() {
            return Ok(());
        }

        if values.len() < layout.required || values.len() > layout.elements.len() {
            return Err(X12Error::element_constraint(
                &self.tag,
                format!(
                    "{} elements do not meet the required count of {}{}",
                    values.len(),
                    layout.required,
                    if layout.required == layout.elements.len() {
                        String::new()
                    } else {
                        format!(" to {}", layout.elements.len())
                    }
                ),
            ));
        }

        for (index, (value, rule)) in values.iter().zip(&layout.elements).enumerate() {
            let value = value.as_ref();
            let len = value.chars().count();
            if len == 0 {
                continue;
            }
            if len > rule.max {
                return Err(X12Error::element_constraint(
                    &self.tag,
                    format!(
                        "element {} with value of \"{value}\" exceeds maximum of {} characters",
                        self.element_name(index),
                        rule.max
                    ),
                ));
            }
            if len < rule.min {
                return Err(X12Error::element_constraint(
                    &self.tag,
                    format!(
                        "element {} with value of \"{value}\" does not meet minimum of {} characters",
                        self.element_name(index),
                        rule.min
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Validate `values` and pad fixed-width elements in place
    ///
    /// `ISA16` is forced to `sub_element_delimiter` and `ISA13` is zero-padded.
    pub fn format_values(&self, values: &mut [String], sub_element_delimiter: char) -> Result<()> {
        if self.tag == "ISA" && values.len() == 16 {
            values[15] = sub_element_delimiter.to_string();
        }

        self.validate(values)?;

        if !self.layout.padding {
            return Ok(());
        }

        for (index, (value, rule)) in values.iter_mut().zip(&self.layout.elements).enumerate() {
            let len = value.chars().count();
            if len >= rule.max || (len <= rule.min && len != 0) {
                continue;
            }
            let fill = rule.max - len;
            if self.tag == "ISA" && index == 12 {
                value.insert_str(0, &"0".repeat(fill));
            } else {
                value.push_str(&" ".repeat(fill));
            }
        }

        Ok(())
    }
}

/// Ordered, tag-indexed collection of segment headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SegmentHeader>", into = "Vec<SegmentHeader>")]
pub struct HeaderTable {
    headers: Vec<SegmentHeader>,
    by_tag: FxHashMap<String, usize>,
    by_trailer: FxHashMap<String, usize>,
}

static STANDARD_TABLE: Lazy<Arc<HeaderTable>> = Lazy::new(|| Arc::new(standard_headers().into()));

impl HeaderTable {
    /// Create a table; later duplicates of a tag replace earlier ones
    pub fn new(headers: Vec<SegmentHeader>) -> Self {
        let mut table = Self::default();
        for header in headers {
            table.insert(header);
        }
        table
    }

    /// Private copy of the standard table
    pub fn standard() -> Self {
        STANDARD_TABLE.as_ref().clone()
    }

    /// The shared, immutable standard table
    pub fn shared_standard() -> Arc<HeaderTable> {
        Arc::clone(&STANDARD_TABLE)
    }

    /// Load a table from a JSON array of headers
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| X12Error::parse(format!("invalid segment header table: {e}")))
    }

    /// Add or replace a header
    pub fn with_header(mut self, header: SegmentHeader) -> Self {
        self.insert(header);
        self
    }

    fn insert(&mut self, header: SegmentHeader) {
        if let Some(&index) = self.by_tag.get(&header.tag) {
            if let Some(old) = self.headers[index].trailer.take() {
                self.by_trailer.remove(&old);
            }
            if let Some(trailer) = &header.trailer {
                self.by_trailer.insert(trailer.clone(), index);
            }
            self.headers[index] = header;
            return;
        }
        let index = self.headers.len();
        self.by_tag.insert(header.tag.clone(), index);
        if let Some(trailer) = &header.trailer {
            self.by_trailer.insert(trailer.clone(), index);
        }
        self.headers.push(header);
    }

    /// Header for `tag`
    #[inline]
    pub fn get(&self, tag: &str) -> Option<&SegmentHeader> {
        self.by_tag.get(tag).map(|&i| &self.headers[i])
    }

    /// Declaration position of `tag`
    #[inline]
    pub fn position(&self, tag: &str) -> Option<usize> {
        self.by_tag.get(tag).copied()
    }

    /// Header whose trailer is `tag`
    #[inline]
    pub fn opener_for_trailer(&self, tag: &str) -> Option<&SegmentHeader> {
        self.by_trailer.get(tag).map(|&i| &self.headers[i])
    }

    /// Headers in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &SegmentHeader> {
        self.headers.iter()
    }

    /// Number of headers
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl From<Vec<SegmentHeader>> for HeaderTable {
    fn from(headers: Vec<SegmentHeader>) -> Self {
        HeaderTable::new(headers)
    }
}

impl From<HeaderTable> for Vec<SegmentHeader> {
    fn from(table: HeaderTable) -> Self {
        table.headers
    }
}

/// The standard envelope and loop headers
pub fn standard_headers() -> Vec<SegmentHeader> {
    vec![
        SegmentHeader::new(
            "ISA",
            SegmentLayout::new(
                16,
                &[
                    (2, 0),
                    (10, 0),
                    (2, 0),
                    (10, 0),
                    (2, 0),
                    (15, 0),
                    (2, 0),
                    (15, 0),
                    (6, 0),
                    (4, 0),
                    (1, 0),
                    (5, 0),
                    (9, 0),
                    (1, 0),
                    (1, 0),
                    (1, 0),
                ],
            )
            .padded(),
        )
        .bounded("IEA"),
        SegmentHeader::new(
            "GS",
            SegmentLayout::new(
                8,
                &[
                    (2, 0),
                    (15, 2),
                    (15, 2),
                    (8, 0),
                    (8, 4),
                    (9, 1),
                    (2, 1),
                    (12, 1),
                ],
            ),
        )
        .bounded("GE"),
        SegmentHeader::new("ST", SegmentLayout::new(2, &[(3, 0), (9, 4), (35, 1)]))
            .bounded("SE")
            .with_loop_id_index(1),
        SegmentHeader::new(
            "HL",
            SegmentLayout::new(3, &[(12, 1), (12, 0), (2, 1), (1, 0)]),
        )
        .unbounded()
        .with_loop_id_index(3)
        .hierarchical(1, 2),
        SegmentHeader::new("LS", SegmentLayout::new(1, &[(4, 1)]))
            .bounded("LE")
            .with_loop_id_index(1)
            .without_unbounded_children(),
        SegmentHeader::new("LE", SegmentLayout::new(1, &[(4, 1)])),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_table_order() {
        let table = HeaderTable::standard();
        let tags: Vec<&str> = table.iter().map(|h| h.tag.as_str()).collect();
        assert_eq!(tags, vec!["ISA", "GS", "ST", "HL", "LS", "LE"]);
        assert_eq!(table.opener_for_trailer("LE").map(|h| h.tag.as_str()), Some("LS"));
        assert_eq!(table.position("HL"), Some(3));
    }

    #[test]
    fn test_extending_copy_leaves_shared_default_untouched() {
        let custom = HeaderTable::standard().with_header(
            SegmentHeader::new("NM1", SegmentLayout::default())
                .unbounded()
                .with_loop_id_index(1),
        );
        assert!(custom.get("NM1").is_some());
        assert!(HeaderTable::shared_standard().get("NM1").is_none());
        assert_eq!(HeaderTable::shared_standard().len(), 6);
    }

    #[test]
    fn test_replacing_header_keeps_position() {
        let table = HeaderTable::standard()
            .with_header(SegmentHeader::new("HL", SegmentLayout::default()).unbounded());
        assert_eq!(table.position("HL"), Some(3));
        assert_eq!(table.get("HL").and_then(|h| h.loop_id_index), None);
    }

    #[test]
    fn test_validate_count_and_lengths() {
        let table = HeaderTable::standard();
        let st = table.get("ST").unwrap();
        assert!(st.validate(&["850", "0001"]).is_ok());
        assert!(st.validate(&["271", "0003", "005010X279A1"]).is_ok());

        let err = st.validate(&["850"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ElementConstraint);

        let err = st.validate(&["850", "01"]).unwrap_err();
        assert!(err.to_string().contains("ST02"));

        let err = st.validate(&["8500", "0001"]).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum of 3"));
    }

    #[test]
    fn test_format_values_pads_isa() {
        let table = HeaderTable::standard();
        let isa = table.get("ISA").unwrap();
        let mut values: Vec<String> = [
            "00", "", "00", "", "ZZ", "SENDER", "ZZ", "RECEIVER", "170301", "1129", "U", "00401",
            "1", "0", "T", "?",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        isa.format_values(&mut values, '>').unwrap();

        assert_eq!(values[1], " ".repeat(10));
        assert_eq!(values[5], "SENDER         ");
        assert_eq!(values[12], "000000001");
        assert_eq!(values[15], ">");
    }

    #[test]
    fn test_header_table_json_round_trip() {
        let json = r#"[
            {"tag": "NM1", "loop_style": "unbounded", "loop_id_index": 1,
             "layout": {"elements": [{"max": 3, "min": 2}, {"max": 1}], "required": 1}}
        ]"#;
        let table = HeaderTable::from_json(json).unwrap();
        let nm1 = table.get("NM1").unwrap();
        assert_eq!(nm1.loop_style, Some(LoopStyle::Unbounded));
        assert_eq!(nm1.layout.elements[1], ElementRule::new(1, 0));

        let back = serde_json::to_string(&table).unwrap();
        assert_eq!(HeaderTable::from_json(&back).unwrap(), table);
    }
}
