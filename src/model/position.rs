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

//! Source location tracking for segments and elements
//!
//! Lines and characters are 0-based. Ranges are half-open: `end` points at the
//! first character after the covered text.

use serde::Serialize;
use std::fmt;

/// A location in the source document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    /// Line number (0-based)
    pub line: usize,
    /// Character within the line (0-based)
    pub character: usize,
    /// Character offset from the start of the document (0-based)
    pub offset: usize,
}

impl Position {
    /// Create a new position
    pub fn new(line: usize, character: usize, offset: usize) -> Self {
        Self {
            line,
            character,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

/// A start/end pair of positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Range {
    /// First covered position
    pub start: Position,
    /// Position just past the covered text
    pub end: Position,
}

impl Range {
    /// Create a new range
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Number of characters covered
    pub fn len(&self) -> usize {
        self.end.offset - self.start.offset
    }

    /// Check if the range is empty
    pub fn is_empty(&self) -> bool {
        self.start.offset == self.end.offset
    }

    /// Check if `position` falls inside this range
    pub fn contains(&self, position: Position) -> bool {
        self.start.offset <= position.offset && position.offset < self.end.offset
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Incremental line/character counter
///
/// A `\n` ends a line; a `\r` only advances the character counter, so `\r\n`
/// counts as exactly one line break.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionTracker {
    position: Position,
}

impl PositionTracker {
    /// Create a tracker positioned at the start of a document
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker resuming at `position`
    pub fn at(position: Position) -> Self {
        Self { position }
    }

    /// Current position
    #[inline]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Advance over a single character
    #[inline]
    pub fn advance(&mut self, ch: char) {
        self.position.offset += 1;
        if ch == '\n' {
            self.position.line += 1;
            self.position.character = 0;
        } else {
            self.position.character += 1;
        }
    }

    /// Advance over every character of `text`
    pub fn advance_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.advance(ch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_lines_once_per_crlf() {
        let mut tracker = PositionTracker::new();
        tracker.advance_str("ST*850~\r\nBEG");
        assert_eq!(tracker.position(), Position::new(1, 3, 12));
    }

    #[test]
    fn test_range_len_and_contains() {
        let range = Range::new(Position::new(0, 4, 4), Position::new(0, 7, 7));
        assert_eq!(range.len(), 3);
        assert!(range.contains(Position::new(0, 6, 6)));
        assert!(!range.contains(Position::new(0, 7, 7)));
        assert_eq!(range.to_string(), "0:4..0:7");
    }
}
