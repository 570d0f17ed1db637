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

//! Transaction mapping against the purchase order fixture

use octofhir_x12::{QueryEngine, TransactionMap, X12Parser};
use pretty_assertions::assert_eq;
use serde_json::Value;

mod utils;
use utils::*;

#[test]
fn test_map_transaction() {
    let interchange = X12Parser::new().parse_interchange(PO_850).unwrap();
    let transaction = &interchange.groups[0].transactions[0];

    let map = TransactionMap::from_json(PO_850_MAP).unwrap();
    let object = map.to_object(&QueryEngine::new(), transaction).unwrap();

    let expected: Value = serde_json::from_str(PO_850_MAP_RESULT).unwrap();
    assert_eq!(object, expected);
}

#[test]
fn test_map_keeps_schema_key_order() {
    let interchange = X12Parser::new().parse_interchange(PO_850).unwrap();
    let transaction = &interchange.groups[0].transactions[0];

    let map = TransactionMap::from_json(PO_850_MAP).unwrap();
    let object = map.to_object(&QueryEngine::new(), transaction).unwrap();
    let keys: Vec<&str> = object
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, vec!["header", "lineItems", "totals", "carrier", "version"]);
}

#[test]
fn test_map_each_transaction_of_a_document() {
    let text = format!("{PO_850}{PO_850_LF}");
    let document = X12Parser::strict().parse(text.as_str()).unwrap();
    let map = TransactionMap::from_json(r#"{ "po": "BEG03", "lines": "CTT01" }"#).unwrap();
    let engine = QueryEngine::new();

    let objects: Vec<Value> = document
        .interchanges
        .iter()
        .flat_map(|i| i.transactions())
        .map(|t| map.to_object(&engine, t).unwrap())
        .collect();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0], objects[1]);
    assert_eq!(objects[0]["po"], "4500012345");
}
