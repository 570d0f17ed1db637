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

//! Delimiter discovery from the fixed-width `ISA` segment

use crate::config::{Delimiters, X12Options};
use crate::error::{Result, X12Error};
use crate::model::Position;

/// Length of an `ISA` segment including its terminator
pub const ISA_LENGTH: usize = 106;

const ELEMENT_DELIMITER_INDEX: usize = 3;
const REPETITION_INDEX: usize = 82;
const SUB_ELEMENT_INDEX: usize = 104;
const SEGMENT_TERMINATOR_INDEX: usize = 105;

/// Read the delimiters declared by an `ISA` segment at the start of `text`
///
/// In strict mode any caller-supplied delimiter must agree with the
/// discovered one.
pub fn discover(text: &str, options: &X12Options, position: Position) -> Result<Delimiters> {
    let isa: Vec<char> = text.chars().take(ISA_LENGTH).collect();

    if !text.starts_with("ISA") {
        return Err(X12Error::parse_at(
            "document does not begin with an ISA segment",
            position,
        ));
    }
    if isa.len() < ISA_LENGTH {
        return Err(X12Error::parse_at(
            format!(
                "ISA segment is {} characters; expected {ISA_LENGTH}",
                isa.len()
            ),
            position,
        ));
    }

    let repetition = isa[REPETITION_INDEX];
    let discovered = Delimiters {
        element: isa[ELEMENT_DELIMITER_INDEX],
        segment: isa[SEGMENT_TERMINATOR_INDEX],
        sub_element: isa[SUB_ELEMENT_INDEX],
        // Pre-5010 interchanges carry a standards identifier in ISA11
        repetition: if repetition.is_alphanumeric() {
            options.delimiters().repetition
        } else {
            repetition
        },
    };

    if options.strict {
        check_override(
            "element delimiter",
            options.element_delimiter,
            discovered.element,
            position,
        )?;
        check_override(
            "segment terminator",
            options.segment_terminator,
            discovered.segment,
            position,
        )?;
        check_override(
            "sub-element delimiter",
            options.sub_element_delimiter,
            discovered.sub_element,
            position,
        )?;
    }

    log::debug!(
        "discovered delimiters element={:?} segment={:?} sub_element={:?} repetition={:?}",
        discovered.element,
        discovered.segment,
        discovered.sub_element,
        discovered.repetition
    );

    Ok(discovered)
}

fn check_override(
    name: &str,
    supplied: Option<char>,
    discovered: char,
    position: Position,
) -> Result<()> {
    match supplied {
        Some(supplied) if supplied != discovered => Err(X12Error::parse_at(
            format!("{name} {supplied:?} does not match {discovered:?} declared in ISA"),
            position,
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const ISA_5010: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *150701*1200*^*00501*000000003*0*P*:~";
    const ISA_4010: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *170301*1129*U*00401*000000001*0*T*>~";

    #[test]
    fn test_fixture_lengths() {
        assert_eq!(ISA_5010.chars().count(), ISA_LENGTH);
        assert_eq!(ISA_4010.chars().count(), ISA_LENGTH);
    }

    #[test]
    fn test_discover_5010_repetition() {
        let delimiters = discover(ISA_5010, &X12Options::default(), Position::default()).unwrap();
        assert_eq!(delimiters.element, '*');
        assert_eq!(delimiters.segment, '~');
        assert_eq!(delimiters.sub_element, ':');
        assert_eq!(delimiters.repetition, '^');
    }

    #[test]
    fn test_discover_4010_uses_default_repetition() {
        let options = X12Options::new().with_repetition_delimiter('|');
        let delimiters = discover(ISA_4010, &options, Position::default()).unwrap();
        assert_eq!(delimiters.sub_element, '>');
        assert_eq!(delimiters.repetition, '|');
    }

    #[test]
    fn test_strict_override_mismatch() {
        let options = X12Options::new()
            .with_strict(true)
            .with_element_delimiter('+');
        let err = discover(ISA_4010, &options, Position::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);

        // Tolerated when not strict
        let lenient = X12Options::new().with_element_delimiter('+');
        assert!(discover(ISA_4010, &lenient, Position::default()).is_ok());

        let matching = X12Options::new()
            .with_strict(true)
            .with_sub_element_delimiter('>');
        assert!(discover(ISA_4010, &matching, Position::default()).is_ok());
        let mismatched = matching.with_sub_element_delimiter(':');
        assert!(discover(ISA_4010, &mismatched, Position::default()).is_err());
    }

    #[test]
    fn test_short_or_missing_isa() {
        assert!(discover("ISA*00", &X12Options::default(), Position::default()).is_err());
        assert!(discover("GS*PO*S", &X12Options::default(), Position::default()).is_err());
    }
}
