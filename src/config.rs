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

//! Parser and serializer configuration
//!
//! [`X12Options`] carries every recognized option. Delimiter overrides are kept
//! as `Option<char>` so strict parsing can tell a caller-supplied delimiter
//! from a default one.

use crate::model::HeaderTable;
use serde::Serialize;
use std::sync::Arc;

/// Default element delimiter
pub const DEFAULT_ELEMENT_DELIMITER: char = '*';
/// Default segment terminator
pub const DEFAULT_SEGMENT_TERMINATOR: char = '~';
/// Default sub-element (component) delimiter
pub const DEFAULT_SUB_ELEMENT_DELIMITER: char = '>';
/// Default repetition delimiter
pub const DEFAULT_REPETITION_DELIMITER: char = '^';

/// Host line ending
#[cfg(windows)]
pub const HOST_END_OF_LINE: &str = "\r\n";
/// Host line ending
#[cfg(not(windows))]
pub const HOST_END_OF_LINE: &str = "\n";

/// Resolved delimiter set of an interchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Delimiters {
    /// Separates elements within a segment
    pub element: char,
    /// Ends a segment
    pub segment: char,
    /// Separates components of a composite element
    pub sub_element: char,
    /// Separates repeated values of an element
    pub repetition: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            element: DEFAULT_ELEMENT_DELIMITER,
            segment: DEFAULT_SEGMENT_TERMINATOR,
            sub_element: DEFAULT_SUB_ELEMENT_DELIMITER,
            repetition: DEFAULT_REPETITION_DELIMITER,
        }
    }
}

/// Options for parsing and serializing X12 documents
///
/// # Examples
///
/// ```rust
/// use octofhir_x12::X12Options;
///
/// let options = X12Options::new()
///     .with_strict(true)
///     .with_segment_terminator('\n');
///
/// assert_eq!(options.end_of_line(), "");
/// assert_eq!(options.delimiters().element, '*');
/// ```
#[derive(Debug, Clone, Default)]
pub struct X12Options {
    /// Element delimiter override
    pub element_delimiter: Option<char>,
    /// Segment terminator override
    pub segment_terminator: Option<char>,
    /// Sub-element delimiter override
    pub sub_element_delimiter: Option<char>,
    /// Repetition delimiter override
    pub repetition_delimiter: Option<char>,
    /// Text written after each segment terminator when formatting
    pub end_of_line: Option<String>,
    /// Emit `end_of_line` after each segment on serialization
    pub format: bool,
    /// Treat structural irregularities as fatal
    pub strict: bool,
    /// Segment header table; the shared standard table when unset
    pub segment_headers: Option<Arc<HeaderTable>>,
}

impl X12Options {
    /// Create options with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable strict mode
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Override the element delimiter
    pub fn with_element_delimiter(mut self, delimiter: char) -> Self {
        self.element_delimiter = Some(delimiter);
        self
    }

    /// Override the segment terminator
    pub fn with_segment_terminator(mut self, terminator: char) -> Self {
        self.segment_terminator = Some(terminator);
        self
    }

    /// Override the sub-element delimiter
    pub fn with_sub_element_delimiter(mut self, delimiter: char) -> Self {
        self.sub_element_delimiter = Some(delimiter);
        self
    }

    /// Override the repetition delimiter
    pub fn with_repetition_delimiter(mut self, delimiter: char) -> Self {
        self.repetition_delimiter = Some(delimiter);
        self
    }

    /// Set the end-of-line text used when formatting
    pub fn with_end_of_line(mut self, end_of_line: impl Into<String>) -> Self {
        self.end_of_line = Some(end_of_line.into());
        self
    }

    /// Enable or disable formatted serialization
    pub fn with_format(mut self, format: bool) -> Self {
        self.format = format;
        self
    }

    /// Use a private segment header table
    pub fn with_segment_headers(mut self, headers: impl Into<Arc<HeaderTable>>) -> Self {
        self.segment_headers = Some(headers.into());
        self
    }

    /// Delimiters with defaults applied
    pub fn delimiters(&self) -> Delimiters {
        Delimiters {
            element: self.element_delimiter.unwrap_or(DEFAULT_ELEMENT_DELIMITER),
            segment: self.segment_terminator.unwrap_or(DEFAULT_SEGMENT_TERMINATOR),
            sub_element: self
                .sub_element_delimiter
                .unwrap_or(DEFAULT_SUB_ELEMENT_DELIMITER),
            repetition: self
                .repetition_delimiter
                .unwrap_or(DEFAULT_REPETITION_DELIMITER),
        }
    }

    /// End-of-line text; empty when segments are already newline-terminated
    pub fn end_of_line(&self) -> &str {
        if self.segment_terminator == Some('\n') {
            return "";
        }
        self.end_of_line.as_deref().unwrap_or(HOST_END_OF_LINE)
    }

    /// Active segment header table
    pub fn headers(&self) -> Arc<HeaderTable> {
        self.segment_headers
            .clone()
            .unwrap_or_else(HeaderTable::shared_standard)
    }

    /// Serialization options for an interchange using `delimiters`
    pub fn serialization(&self, delimiters: Delimiters) -> SerializationOptions {
        let end_of_line = if delimiters.segment == '\n' {
            String::new()
        } else {
            self.end_of_line().to_string()
        };
        SerializationOptions {
            delimiters,
            format: self.format,
            end_of_line,
        }
    }
}

/// Options driving EDI re-serialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationOptions {
    /// Delimiters written between elements and after segments
    pub delimiters: Delimiters,
    /// Emit `end_of_line` after each segment terminator
    pub format: bool,
    /// Text written after each terminator when `format` is set
    pub end_of_line: String,
}

impl SerializationOptions {
    /// Unformatted serialization with `delimiters`
    pub fn new(delimiters: Delimiters) -> Self {
        Self {
            delimiters,
            format: false,
            end_of_line: String::new(),
        }
    }

    /// Enable formatting with the given line ending
    pub fn formatted(mut self, end_of_line: impl Into<String>) -> Self {
        self.format = true;
        self.end_of_line = end_of_line.into();
        self
    }

    /// Text following a segment terminator
    #[inline]
    pub fn line_break(&self) -> &str {
        if self.format { &self.end_of_line } else { "" }
    }
}

impl Default for SerializationOptions {
    fn default() -> Self {
        Self::new(Delimiters::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = X12Options::default();
        assert_eq!(options.delimiters(), Delimiters::default());
        assert_eq!(options.end_of_line(), HOST_END_OF_LINE);
        assert!(!options.strict);
        assert!(!options.format);
        assert_eq!(options.headers().len(), 6);
    }

    #[test]
    fn test_newline_terminator_disables_end_of_line() {
        let options = X12Options::new()
            .with_segment_terminator('\n')
            .with_end_of_line("\r\n");
        assert_eq!(options.end_of_line(), "");
    }

    #[test]
    fn test_serialization_follows_discovered_terminator() {
        let options = X12Options::new().with_format(true).with_end_of_line("\n");
        let delimiters = Delimiters {
            segment: '\n',
            ..Delimiters::default()
        };
        assert_eq!(options.serialization(delimiters).line_break(), "");
        assert_eq!(
            options.serialization(Delimiters::default()).line_break(),
            "\n"
        );
    }
}
