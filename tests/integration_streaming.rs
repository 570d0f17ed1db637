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

//! Chunked input must produce the same tree as whole-document input

use octofhir_x12::{Segment, X12Parser};
use pretty_assertions::assert_eq;
use rstest::rstest;

mod utils;
use utils::*;

fn chunks(text: &str, size: usize) -> Vec<String> {
    text.chars()
        .collect::<Vec<_>>()
        .chunks(size)
        .map(|c| c.iter().collect())
        .collect()
}

#[rstest]
#[case(PO_850, 1)]
#[case(PO_850, 7)]
#[case(PO_850, 105)]
#[case(PO_850, 106)]
#[case(PO_850_LF, 3)]
#[case(ASN_856, 64)]
#[case(ELIGIBILITY_271, 250)]
fn test_chunked_parse_matches_whole_parse(#[case] edi: &str, #[case] size: usize) {
    let parser = X12Parser::strict();
    let whole = parser.parse(edi).unwrap();
    let chunked = parser.parse_chunks(chunks(edi, size)).unwrap();
    assert_eq!(chunked, whole);
}

#[test]
fn test_segments_wait_for_their_terminator() {
    let mut tokenizer = X12Parser::new().tokenizer();
    let (head, tail) = PO_850.split_at(180);

    let first: Vec<Segment> = tokenizer.feed(head).unwrap();
    let tags: Vec<&str> = first.iter().map(|s| s.tag.as_str()).collect();
    assert_eq!(tags, vec!["ISA", "GS", "ST"]);

    let rest = tokenizer.feed(tail).unwrap();
    assert_eq!(rest[0].tag, "BEG");
    assert_eq!(rest[0].elements[2].value, "4500012345");
    assert!(tokenizer.finish().unwrap().is_empty());
}

#[test]
fn test_each_interchange_rediscovers_delimiters() {
    let text = format!("{ELIGIBILITY_271}{PO_850}");
    let mut tokenizer = X12Parser::strict().tokenizer();
    let mut segments = Vec::new();
    for chunk in chunks(&text, 33) {
        segments.extend(tokenizer.feed(&chunk).unwrap());
    }
    segments.extend(tokenizer.finish().unwrap());

    let discovered = tokenizer.take_discovered();
    assert_eq!(discovered.len(), 2);
    assert_eq!(discovered[0].repetition, '^');
    assert_eq!(discovered[1].sub_element, '>');
    assert_eq!(segments.iter().filter(|s| s.tag == "ISA").count(), 2);
}
