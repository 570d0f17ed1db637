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

//! Query engine - the main entry point for query evaluation

use super::ast::QueryExpr;
use super::evaluator::{Evaluation, Evaluator, Hit};
use super::index::DocumentIndex;
use super::parser::parse_query;
use crate::config::X12Options;
use crate::error::{Result, X12Error};
use crate::model::{Document, Element, Interchange, Segment, Transaction};
use crate::parser::X12Parser;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// What a query runs against
#[derive(Debug, Clone, Copy)]
pub enum QuerySource<'a> {
    /// Raw EDI text, parsed once per call; `None` is rejected
    Text(Option<&'a str>),
    /// A parsed document
    Document(&'a Document),
    /// A parsed interchange
    Interchange(&'a Interchange),
    /// A lone transaction, queried under an empty envelope
    Transaction(&'a Transaction),
}

impl<'a> From<&'a str> for QuerySource<'a> {
    fn from(text: &'a str) -> Self {
        QuerySource::Text(Some(text))
    }
}

impl<'a> From<Option<&'a str>> for QuerySource<'a> {
    fn from(text: Option<&'a str>) -> Self {
        QuerySource::Text(text)
    }
}

impl<'a> From<&'a String> for QuerySource<'a> {
    fn from(text: &'a String) -> Self {
        QuerySource::Text(Some(text.as_str()))
    }
}

impl<'a> From<&'a Document> for QuerySource<'a> {
    fn from(document: &'a Document) -> Self {
        QuerySource::Document(document)
    }
}

impl<'a> From<&'a Interchange> for QuerySource<'a> {
    fn from(interchange: &'a Interchange) -> Self {
        QuerySource::Interchange(interchange)
    }
}

impl<'a> From<&'a Transaction> for QuerySource<'a> {
    fn from(transaction: &'a Transaction) -> Self {
        QuerySource::Transaction(transaction)
    }
}

/// One element matched by a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryMatch {
    /// Raw element value
    pub value: String,
    /// Owning segment, with its range and loop path
    pub segment: Segment,
    /// Matched element, with its range
    pub element: Element,
    /// Interchange index within the document
    pub interchange: usize,
    /// Group index, `None` for interchange envelope segments
    pub group: Option<usize>,
    /// Transaction index, `None` outside a transaction
    pub transaction: Option<usize>,
}

/// Result of [`QueryEngine::query_single`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "lowercase")]
pub enum QueryResult {
    /// First element match
    Match(Box<QueryMatch>),
    /// Values aggregated by a macro
    Values(Vec<String>),
    /// Value composed by `CONCAT`
    Text(String),
}

impl QueryResult {
    /// Single value, if the result holds one
    pub fn value(&self) -> Option<&str> {
        match self {
            QueryResult::Match(found) => Some(&found.value),
            QueryResult::Text(text) => Some(text),
            QueryResult::Values(_) => None,
        }
    }

    /// All values in order
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryResult::Match(found) => vec![found.value.as_str()],
            QueryResult::Text(text) => vec![text.as_str()],
            QueryResult::Values(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Main query engine for evaluating queries against X12 documents
///
/// # Examples
///
/// ```rust
/// use octofhir_x12::QueryEngine;
///
/// let edi = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *170301*1129*U*00401*000000001*0*T*>~\
/// GS*PO*SENDER*RECEIVER*20170301*1129*1*X*004010~ST*850*0001~BEG*00*SA*A99999-01**20170301~\
/// REF*DP*038~SE*4*0001~GE*1*1~IEA*1*000000001~";
///
/// let engine = QueryEngine::new();
/// let matches = engine.query("REF02:REF01[\"DP\"]", edi).unwrap();
/// assert_eq!(matches[0].value, "038");
/// ```
#[derive(Debug, Clone)]
pub struct QueryEngine {
    parser: X12Parser,
    /// Compiled expressions by query text
    expression_cache: Arc<Mutex<FxHashMap<String, Arc<QueryExpr>>>>,
    /// Maximum cache size to prevent memory issues
    max_cache_size: usize,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine {
    /// Create an engine with a lenient default parser
    pub fn new() -> Self {
        Self::with_parser(X12Parser::new())
    }

    /// Create an engine that parses text sources with `parser`
    pub fn with_parser(parser: X12Parser) -> Self {
        Self {
            parser,
            expression_cache: Arc::new(Mutex::new(FxHashMap::default())),
            max_cache_size: 1000,
        }
    }

    /// Create an engine whose parser uses `options`
    pub fn with_options(options: X12Options) -> Self {
        Self::with_parser(X12Parser::with_options(options))
    }

    /// Parser used for text sources
    pub fn parser(&self) -> &X12Parser {
        &self.parser
    }

    /// Parse a query, using the cache when possible
    pub fn compile(&self, query: &str) -> Result<Arc<QueryExpr>> {
        if let Ok(cache) = self.expression_cache.lock()
            && let Some(expr) = cache.get(query)
        {
            return Ok(Arc::clone(expr));
        }

        let expr = Arc::new(parse_query(query)?);
        if let Ok(mut cache) = self.expression_cache.lock() {
            if cache.len() >= self.max_cache_size {
                cache.clear();
            }
            cache.insert(query.to_string(), Arc::clone(&expr));
        }
        Ok(expr)
    }

    /// Every element matched by `query`, in document order
    ///
    /// Aggregating macros (`FOREACH`, `CONCAT`) have no element matches; use
    /// [`QueryEngine::query_single`] for them.
    pub fn query<'a>(
        &self,
        query: &str,
        source: impl Into<QuerySource<'a>>,
    ) -> Result<Vec<QueryMatch>> {
        let expr = self.compile(query)?;
        if expr.is_aggregate() {
            return Err(X12Error::query_evaluation(format!(
                "'{query}' aggregates values; use query_single"
            )));
        }

        self.with_index(source.into(), |index| {
            let evaluator = Evaluator::new(index);
            let matches = match evaluator.evaluate_document(&expr)? {
                Evaluation::Matches(hits) => hits
                    .into_iter()
                    .filter_map(|hit| to_match(index, &evaluator, hit))
                    .collect(),
                _ => Vec::new(),
            };
            log::debug!("query '{query}' matched {} elements", matches.len());
            Ok(matches)
        })
    }

    /// First match of `query`, or the aggregated result of a macro
    pub fn query_single<'a>(
        &self,
        query: &str,
        source: impl Into<QuerySource<'a>>,
    ) -> Result<Option<QueryResult>> {
        let expr = self.compile(query)?;
        self.with_index(source.into(), |index| {
            let evaluator = Evaluator::new(index);
            Ok(match evaluator.evaluate_document(&expr)? {
                Evaluation::Matches(hits) => hits
                    .into_iter()
                    .find_map(|hit| to_match(index, &evaluator, hit))
                    .map(|found| QueryResult::Match(Box::new(found))),
                Evaluation::Values(values) => Some(QueryResult::Values(values)),
                Evaluation::Text(text) => Some(QueryResult::Text(text)),
            })
        })
    }

    fn with_index<R, F>(&self, source: QuerySource<'_>, run: F) -> Result<R>
    where
        F: FnOnce(&DocumentIndex<'_>) -> Result<R>,
    {
        let headers = self.parser.options().headers();
        match source {
            QuerySource::Text(text) => {
                let document = self.parser.parse(text)?;
                run(&DocumentIndex::from_interchanges(&document.interchanges, headers))
            }
            QuerySource::Document(document) => {
                run(&DocumentIndex::from_interchanges(&document.interchanges, headers))
            }
            QuerySource::Interchange(interchange) => run(&DocumentIndex::from_interchanges(
                std::iter::once(interchange),
                headers,
            )),
            QuerySource::Transaction(transaction) => {
                run(&DocumentIndex::from_transaction(transaction, headers))
            }
        }
    }
}

fn to_match(
    index: &DocumentIndex<'_>,
    evaluator: &Evaluator<'_, '_>,
    hit: Hit,
) -> Option<QueryMatch> {
    let entry = index.entry(hit.entry);
    let element = entry.segment.elements.get(hit.element)?.clone();
    Some(QueryMatch {
        value: evaluator.value(hit).to_string(),
        segment: entry.segment.clone(),
        element,
        interchange: entry.key.interchange,
        group: entry.key.group,
        transaction: entry.key.transaction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    const DOC: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *170301*1129*U*00401*000000001*0*T*>~\
GS*PO*SENDER*RECEIVER*20170301*1129*1*X*004010~ST*850*0001~BEG*00*SA*A99999-01**20170301~\
REF*DP*038~REF*PS*R~SE*5*0001~GE*1*1~IEA*1*000000001~";

    #[test]
    fn test_aggregate_rejected_by_query() {
        let engine = QueryEngine::new();
        let err = engine.query("FOREACH(REF)=>REF02", DOC).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryEvaluation);
    }

    #[test]
    fn test_absent_text_source() {
        let err = QueryEngine::new().query("REF02", None::<&str>).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentNull);
    }

    #[test]
    fn test_sources_agree() {
        let engine = QueryEngine::new();
        let document = engine.parser().parse(DOC).unwrap();
        let from_text = engine.query("REF02", DOC).unwrap();
        let from_document = engine.query("REF02", &document).unwrap();
        let from_transaction = engine
            .query("REF02", &document.interchanges[0].groups[0].transactions[0])
            .unwrap();
        assert_eq!(from_text, from_document);
        assert_eq!(
            from_transaction.iter().map(|m| m.value.as_str()).collect::<Vec<_>>(),
            vec!["038", "R"]
        );
    }

    #[test]
    fn test_single_results() {
        let engine = QueryEngine::new();
        let single = engine.query_single("REF02", DOC).unwrap().unwrap();
        assert_eq!(single.value(), Some("038"));
        assert_eq!(engine.query_single("N102", DOC).unwrap(), None);

        let values = engine.query_single("FOREACH(REF)=>REF02", DOC).unwrap().unwrap();
        assert_eq!(values.values(), vec!["038", "R"]);
    }

    #[test]
    fn test_match_carries_ranges_and_envelope() {
        let engine = QueryEngine::new();
        let found = &engine.query("BEG03", DOC).unwrap()[0];
        assert_eq!(found.value, "A99999-01");
        assert_eq!(found.segment.tag, "BEG");
        assert_eq!(found.element.range, found.segment.elements[2].range);
        assert_eq!((found.interchange, found.group, found.transaction), (0, Some(0), Some(0)));
    }

    #[test]
    fn test_cache_reuses_compiled_expression() {
        let engine = QueryEngine::new();
        let first = engine.compile("REF02").unwrap();
        let second = engine.compile("REF02").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
