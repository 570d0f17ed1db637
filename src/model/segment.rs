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

//! Segments and their loop context

use super::element::Element;
use super::header::SegmentHeader;
use super::position::Range;
use crate::config::SerializationOptions;
use crate::error::{Result, X12Error};
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

/// One open loop enclosing a segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LoopFrame {
    /// Tag of the segment that opened the loop
    pub tag: String,
    /// Identifying value; the level code for hierarchical loops
    pub value: Option<String>,
    /// Occurrence number, unique among the frames of one transaction
    pub instance: u32,
    /// Root-first chain of level codes for hierarchical loops
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ancestry: Option<Vec<String>>,
}

impl LoopFrame {
    /// Create a frame for a non-hierarchical loop
    pub fn new(tag: impl Into<String>, value: Option<String>, instance: u32) -> Self {
        Self {
            tag: tag.into(),
            value,
            instance,
            ancestry: None,
        }
    }

    /// Check if both frames denote the same loop occurrence
    #[inline]
    pub fn same_instance(&self, other: &LoopFrame) -> bool {
        self.instance == other.instance && self.tag == other.tag
    }
}

impl fmt::Display for LoopFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.tag, value),
            None => f.write_str(&self.tag),
        }
    }
}

/// Chain of open loops enclosing a segment, outermost first
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LoopPath(SmallVec<[LoopFrame; 4]>);

impl LoopPath {
    /// Empty path
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames, outermost first
    #[inline]
    pub fn frames(&self) -> &[LoopFrame] {
        &self.0
    }

    /// Innermost enclosing frame
    #[inline]
    pub fn innermost(&self) -> Option<&LoopFrame> {
        self.0.last()
    }

    /// Check if `frame`'s loop occurrence encloses this path
    pub fn contains(&self, frame: &LoopFrame) -> bool {
        self.0.iter().any(|f| f.same_instance(frame))
    }

    /// Innermost frame opened by `tag`
    pub fn find(&self, tag: &str) -> Option<&LoopFrame> {
        self.0.iter().rev().find(|f| f.tag == tag)
    }

    /// Level-code chain of the innermost hierarchical frame
    pub fn hierarchy(&self) -> Option<&[String]> {
        self.0.iter().rev().find_map(|f| f.ancestry.as_deref())
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no loop is open
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Dotted rendering such as `HL=22.NM1=IL`
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl FromIterator<LoopFrame> for LoopPath {
    fn from_iter<I: IntoIterator<Item = LoopFrame>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a LoopPath {
    type Item = &'a LoopFrame;
    type IntoIter = std::slice::Iter<'a, LoopFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A tagged sequence of elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Segment tag
    pub tag: String,
    /// Elements in order; element 1 is at index 0
    pub elements: Vec<Element>,
    /// Range from the tag to the terminator (exclusive)
    pub range: Range,
    /// Enclosing loops; `None` for envelope segments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_path: Option<LoopPath>,
}

impl Segment {
    /// Create an empty segment
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Create a segment from raw element values
    pub fn with_values<I, S>(tag: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tag: tag.into(),
            elements: values.into_iter().map(Element::new).collect(),
            ..Self::default()
        }
    }

    /// Element at a 1-based position
    #[inline]
    pub fn element(&self, position: usize) -> Option<&Element> {
        position.checked_sub(1).and_then(|i| self.elements.get(i))
    }

    /// Raw value at a 1-based position, or `default`
    pub fn value_of<'a>(&'a self, position: usize, default: &'a str) -> &'a str {
        self.element(position).map_or(default, Element::as_str)
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if the segment has no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Append an element
    pub fn add_element(&mut self, value: impl Into<String>) -> &mut Element {
        self.elements.push(Element::new(value));
        let last = self.elements.len() - 1;
        &mut self.elements[last]
    }

    /// Replace the element at a 1-based position
    pub fn replace_element(&mut self, value: impl Into<String>, position: usize) -> Result<()> {
        let index = self.existing_index(position)?;
        self.elements[index] = Element::new(value);
        Ok(())
    }

    /// Insert an element before a 1-based position; `len() + 1` appends
    pub fn insert_element(&mut self, value: impl Into<String>, position: usize) -> Result<()> {
        if position == 0 || position > self.elements.len() + 1 {
            return Err(self.out_of_range(position));
        }
        self.elements.insert(position - 1, Element::new(value));
        Ok(())
    }

    /// Remove and return the element at a 1-based position
    pub fn remove_element(&mut self, position: usize) -> Result<Element> {
        let index = self.existing_index(position)?;
        Ok(self.elements.remove(index))
    }

    /// Replace all elements, applying `header`'s validation and padding
    pub fn set_elements<I, S>(
        &mut self,
        values: I,
        header: Option<&SegmentHeader>,
        sub_element_delimiter: char,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        if let Some(header) = header {
            header.format_values(&mut values, sub_element_delimiter)?;
        }
        self.elements = values.into_iter().map(Element::new).collect();
        Ok(())
    }

    /// Serialize as delimited EDI text, terminator included
    pub fn to_edi(&self, options: &SerializationOptions) -> String {
        let mut out = String::with_capacity(self.tag.len() + self.elements.len() * 8 + 2);
        self.write_edi(&mut out, options);
        out
    }

    pub(crate) fn write_edi(&self, out: &mut String, options: &SerializationOptions) {
        let delimiters = &options.delimiters;
        out.push_str(&self.tag);
        for (index, element) in self.elements.iter().enumerate() {
            out.push(delimiters.element);
            if is_control_number(&self.tag, index) && element.value.len() < 9 {
                out.push_str(&format!("{:0>9}", element.value));
            } else {
                out.push_str(&element.value);
            }
        }
        out.push(delimiters.segment);
        out.push_str(options.line_break());
    }

    fn existing_index(&self, position: usize) -> Result<usize> {
        if position == 0 || position > self.elements.len() {
            return Err(self.out_of_range(position));
        }
        Ok(position - 1)
    }

    fn out_of_range(&self, position: usize) -> X12Error {
        X12Error::element_constraint(
            &self.tag,
            format!(
                "element position {position} is out of range for {} elements",
                self.elements.len()
            ),
        )
    }
}

// ISA13 and IEA02 carry the interchange control number
fn is_control_number(tag: &str, index: usize) -> bool {
    matches!((tag, index), ("ISA", 12) | ("IEA", 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Delimiters;
    use crate::error::ErrorKind;
    use crate::model::HeaderTable;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_editing_uses_one_based_positions() {
        let mut segment = Segment::with_values("REF", ["DP", "038"]);
        segment.add_element("NOTE");
        segment.insert_element("X", 1).unwrap();
        assert_eq!(segment.value_of(1, ""), "X");
        assert_eq!(segment.value_of(4, ""), "NOTE");

        segment.replace_element("PS", 2).unwrap();
        let removed = segment.remove_element(1).unwrap();
        assert_eq!(removed.value, "X");
        assert_eq!(segment.value_of(1, ""), "PS");
        assert_eq!(segment.value_of(9, "none"), "none");

        let err = segment.replace_element("Z", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ElementConstraint);
        assert!(segment.insert_element("END", 4).is_ok());
        assert!(segment.insert_element("END", 9).is_err());
    }

    #[test]
    fn test_set_elements_validates_with_header() {
        let table = HeaderTable::standard();
        let mut segment = Segment::new("ST");
        let err = segment
            .set_elements(["850"], table.get("ST"), '>')
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ElementConstraint);

        segment
            .set_elements(["850", "0001"], table.get("ST"), '>')
            .unwrap();
        assert_eq!(segment.len(), 2);
    }

    #[test]
    fn test_to_edi_pads_control_numbers() {
        let options = SerializationOptions::new(Delimiters::default());
        let iea = Segment::with_values("IEA", ["1", "42"]);
        assert_eq!(iea.to_edi(&options), "IEA*1*000000042~");

        let formatted = SerializationOptions::new(Delimiters::default()).formatted("\n");
        let se = Segment::with_values("SE", ["4", "0001"]);
        assert_eq!(se.to_edi(&formatted), "SE*4*0001~\n");
    }

    #[test]
    fn test_loop_path_render_and_hierarchy() {
        let mut hl = LoopFrame::new("HL", Some("22".into()), 1);
        hl.ancestry = Some(vec!["20".into(), "21".into(), "22".into()]);
        let path: LoopPath = [hl, LoopFrame::new("NM1", Some("IL".into()), 2)]
            .into_iter()
            .collect();

        assert_eq!(path.render(), "HL=22.NM1=IL");
        assert_eq!(path.hierarchy().map(|h| h.join("+")), Some("20+21+22".to_string()));
        assert_eq!(path.innermost().map(|f| f.instance), Some(2));
        assert!(path.contains(&LoopFrame::new("NM1", None, 2)));
        assert!(!path.contains(&LoopFrame::new("NM1", None, 3)));
    }
}
