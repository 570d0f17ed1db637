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

//! Segment elements and their typed interpretation

use super::position::Range;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A single element value within a segment
///
/// The raw text is stored verbatim so that serialization reproduces the
/// source byte-for-byte; [`Element::typed_value`] offers an interpreted view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Element {
    /// Raw element text
    pub value: String,
    /// Source range of the element text
    pub range: Range,
}

/// Interpreted element value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    /// Free text, identifiers and codes
    Text(String),
    /// X12 numeric (`N`/`R`) value
    Number(Decimal),
    /// CCYYMMDD date
    Date(NaiveDate),
}

impl Element {
    /// Create an element without source information
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            range: Range::default(),
        }
    }

    /// Create an element spanning `range`
    pub fn with_range(value: impl Into<String>, range: Range) -> Self {
        Self {
            value: value.into(),
            range,
        }
    }

    /// Raw text
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Raw text with trailing pad spaces removed
    #[inline]
    pub fn trimmed(&self) -> &str {
        self.value.trim_end_matches(' ')
    }

    /// Check if the element carries no text
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Discover the element's type: dates first, then numbers, then text
    pub fn typed_value(&self) -> ElementValue {
        if let Some(date) = self.as_date() {
            return ElementValue::Date(date);
        }
        if let Some(number) = self.as_decimal() {
            return ElementValue::Number(number);
        }
        ElementValue::Text(self.value.clone())
    }

    /// Interpret as a CCYYMMDD (or YYMMDD) date
    pub fn as_date(&self) -> Option<NaiveDate> {
        let raw = self.value.trim();
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let (year, rest) = match raw.len() {
            8 => (digits(&raw[..4])? as i32, &raw[4..]),
            // YYMMDD is assumed to be in the 2000s
            6 => (2000 + digits(&raw[..2])? as i32, &raw[2..]),
            _ => return None,
        };
        NaiveDate::from_ymd_opt(year, digits(&rest[..2])?, digits(&rest[2..])?)
    }

    /// Interpret as an HHMM, HHMMSS or HHMMSSD.. time
    pub fn as_time(&self) -> Option<NaiveTime> {
        let raw = self.value.trim();
        if raw.len() < 4 || raw.len() > 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let hour = digits(&raw[..2])?;
        let minute = digits(&raw[2..4])?;
        match raw.len() {
            4 => NaiveTime::from_hms_opt(hour, minute, 0),
            6 => NaiveTime::from_hms_opt(hour, minute, digits(&raw[4..6])?),
            7 | 8 => {
                let millis = digits(&format!("{:0<3}", &raw[6..]))?;
                NaiveTime::from_hms_milli_opt(hour, minute, digits(&raw[4..6])?, millis)
            }
            _ => None,
        }
    }

    /// Interpret as a decimal number
    pub fn as_decimal(&self) -> Option<Decimal> {
        let raw = self.value.trim();
        let unsigned = raw.strip_prefix('-').unwrap_or(raw);
        if unsigned.is_empty()
            || !unsigned.bytes().all(|b| b.is_ascii_digit() || b == b'.')
            || unsigned.bytes().filter(|&b| b == b'.').count() > 1
        {
            return None;
        }
        Decimal::from_str(raw).ok()
    }
}

fn digits(raw: &str) -> Option<u32> {
    raw.parse().ok()
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::new(value)
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::new(value)
    }
}
