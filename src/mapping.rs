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

//! Declarative projection of a transaction into JSON
//!
//! A map is a JSON value whose string leaves are queries. Objects and arrays
//! are walked recursively; any other leaf is copied through.

use crate::error::{Result, X12Error};
use crate::model::Transaction;
use crate::query::{QueryEngine, QueryResult};
use serde_json::{Map, Value};

/// Mapping schema applied to single transactions
///
/// # Examples
///
/// ```rust
/// use octofhir_x12::{QueryEngine, TransactionMap, X12Parser};
/// use serde_json::json;
///
/// let edi = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *170301*1129*U*00401*000000001*0*T*>~\
/// GS*PO*SENDER*RECEIVER*20170301*1129*1*X*004010~ST*850*0001~BEG*00*SA*A99999-01**20170301~\
/// SE*3*0001~GE*1*1~IEA*1*000000001~";
/// let interchange = X12Parser::new().parse_interchange(edi).unwrap();
/// let transaction = &interchange.groups[0].transactions[0];
///
/// let map = TransactionMap::new(json!({ "order": "BEG03", "date": "BEG05" })).unwrap();
/// let object = map.to_object(&QueryEngine::new(), transaction).unwrap();
/// assert_eq!(object, json!({ "order": "A99999-01", "date": "20170301" }));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionMap {
    schema: Value,
}

impl TransactionMap {
    /// Create a map; the schema root must be an object or an array
    pub fn new(schema: Value) -> Result<Self> {
        if !(schema.is_object() || schema.is_array()) {
            return Err(X12Error::mapping(
                "mapping schema must be a JSON object or array",
            ));
        }
        Ok(Self { schema })
    }

    /// Create a map from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let schema = serde_json::from_str(json)
            .map_err(|e| X12Error::mapping(format!("invalid mapping schema: {e}")))?;
        Self::new(schema)
    }

    /// The schema
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Project `transaction` through the schema
    pub fn to_object(&self, engine: &QueryEngine, transaction: &Transaction) -> Result<Value> {
        log::debug!(
            "mapping transaction {} ({})",
            transaction.control_number(),
            transaction.set_identifier()
        );
        self.project(engine, transaction, &self.schema, "$")
    }

    fn project(
        &self,
        engine: &QueryEngine,
        transaction: &Transaction,
        node: &Value,
        at: &str,
    ) -> Result<Value> {
        match node {
            Value::String(query) => self.resolve(engine, transaction, query, at),
            Value::Object(fields) => {
                let mut object = Map::with_capacity(fields.len());
                for (key, value) in fields {
                    let child = self.project(engine, transaction, value, &format!("{at}.{key}"))?;
                    object.insert(key.clone(), child);
                }
                Ok(Value::Object(object))
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.project(engine, transaction, item, &format!("{at}[{i}]")))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn resolve(
        &self,
        engine: &QueryEngine,
        transaction: &Transaction,
        query: &str,
        at: &str,
    ) -> Result<Value> {
        let result = engine
            .query_single(query, transaction)
            .map_err(|e| X12Error::mapping(format!("{at}: {e}")))?;
        Ok(match result {
            None => Value::Null,
            Some(QueryResult::Values(values)) => {
                Value::Array(values.into_iter().map(Value::String).collect())
            }
            Some(single) => single
                .value()
                .map_or(Value::Null, |v| Value::String(v.trim_end_matches(' ').to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parser::X12Parser;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const DOC: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *170301*1129*U*00401*000000001*0*T*>~\
GS*PO*SENDER*RECEIVER*20170301*1129*1*X*004010~ST*850*0001~BEG*00*SA*A99999-01**20170301~\
REF*DP*038~REF*PS*R~PO1*1*1*EA*10**VP*A1~PO1*2*3*EA*12**VP*B2~SE*7*0001~GE*1*1~IEA*1*000000001~";

    fn transaction() -> Transaction {
        let mut interchange = X12Parser::strict().parse_interchange(DOC).unwrap();
        interchange.groups.remove(0).transactions.remove(0)
    }

    #[test]
    fn test_nested_schema() {
        let map = TransactionMap::new(json!({
            "header": {
                "po": "BEG03",
                "department": "REF02:REF01[\"DP\"]",
                "label": "CONCAT(REF02:REF01[\"DP\"], & )=>REF02:REF01[\"PS\"]",
            },
            "items": "FOREACH(PO1)=>PO107",
            "missing": "N102",
            "fixed": 42,
            "list": ["BEG01", true],
        }))
        .unwrap();

        let object = map.to_object(&QueryEngine::new(), &transaction()).unwrap();
        assert_eq!(
            object,
            json!({
                "header": {
                    "po": "A99999-01",
                    "department": "038",
                    "label": "038 & R",
                },
                "items": ["A1", "B2"],
                "missing": null,
                "fixed": 42,
                "list": ["00", true],
            })
        );
    }

    #[test]
    fn test_invalid_schemas() {
        assert_eq!(
            TransactionMap::new(json!("BEG03")).unwrap_err().kind(),
            ErrorKind::Mapping
        );
        assert_eq!(
            TransactionMap::from_json("{").unwrap_err().kind(),
            ErrorKind::Mapping
        );
    }

    #[test]
    fn test_bad_query_reports_location() {
        let map = TransactionMap::new(json!({ "header": { "po": "BEG" } })).unwrap();
        let err = map.to_object(&QueryEngine::new(), &transaction()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mapping);
        assert!(err.to_string().contains("$.header.po"));
    }
}
