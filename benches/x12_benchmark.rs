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

//! Parser and query engine benchmarks
//!
//! Large inputs are generated by repeating the fixture transactions.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use octofhir_x12::{
    HeaderTable, QueryEngine, SegmentHeader, SegmentLayout, X12Options, X12Parser, parse_query,
};
use std::hint::black_box;

const PO_850: &str = include_str!("../tests/data/850.edi");
const ELIGIBILITY_271: &str = include_str!("../tests/data/271.edi");

/// Purchase order with `lines` PO1 line items in one transaction
fn generate_purchase_order(lines: usize) -> String {
    let isa = "ISA*00*          *00*          *ZZ*4405197800     *ZZ*999999999      *150701*1129*U*00401*000000001*0*T*>~";
    let mut body = vec![
        "BEG*00*SA*4500012345**20150701".to_string(),
        "REF*DP*038".to_string(),
        "REF*PS*R".to_string(),
    ];
    for i in 1..=lines {
        body.push(format!("PO1*{i}*{}*EA*9.25*TE*CB*065322-117", i * 10));
        body.push("PID*F****SMALL WIDGET".to_string());
        body.push("PID*S**VI*FL".to_string());
    }
    body.push(format!("CTT*{lines}"));

    let mut out = String::from(isa);
    out.push_str("\nGS*PO*4405197800*999999999*20150701*1129*1*X*004010~\nST*850*0001~\n");
    for segment in &body {
        out.push_str(segment);
        out.push_str("~\n");
    }
    out.push_str(&format!("SE*{}*0001~\nGE*1*1~\nIEA*1*000000001~\n", body.len() + 2));
    out
}

fn benchmark_parser(c: &mut Criterion) {
    let parser = X12Parser::new();

    c.bench_function("parse_850_fixture", |b| {
        b.iter(|| black_box(parser.parse(black_box(PO_850))))
    });

    let mut group = c.benchmark_group("parse_generated_850");
    for lines in [10, 100, 1000] {
        let edi = generate_purchase_order(lines);
        group.throughput(Throughput::Bytes(edi.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &edi, |b, edi| {
            b.iter(|| black_box(parser.parse(black_box(edi.as_str()))))
        });
    }
    group.finish();
}

fn benchmark_streaming(c: &mut Criterion) {
    let parser = X12Parser::new();
    let edi = generate_purchase_order(1000);
    let chunks: Vec<&str> = edi
        .as_bytes()
        .chunks(4096)
        .filter_map(|c| std::str::from_utf8(c).ok())
        .collect();

    c.bench_function("parse_chunks_4k", |b| {
        b.iter(|| black_box(parser.parse_chunks(black_box(chunks.iter()))))
    });
}

fn benchmark_query_parsing(c: &mut Criterion) {
    let queries = [
        "REF02",
        "REF02:REF01[\"DP\"]:BEG02[\"SA\"]",
        "PO1-PID05:PID01[\"F\"]",
        "HL+S+O+I-LIN03",
        "CONCAT(REF02:REF01[\"DP\"], & )=>REF02:REF01[\"PS\"]",
        r"FORSEGLOOP(^ISA\.GS\.ST=271\.HL=22\.NM1=IL.EB=.*)=>DTP03",
    ];

    for (i, query) in queries.into_iter().enumerate() {
        c.bench_function(&format!("query_{i}_parse"), |b| {
            b.iter(|| black_box(parse_query(black_box(query))))
        });
    }
}

fn benchmark_query_evaluation(c: &mut Criterion) {
    let engine = QueryEngine::new();
    let document = engine.parser().parse(generate_purchase_order(1000).as_str());
    let Ok(document) = document else {
        return;
    };

    c.bench_function("query_qualified_1000_lines", |b| {
        b.iter(|| black_box(engine.query(black_box("PO1-PID05:PID01[\"F\"]"), &document)))
    });
    c.bench_function("query_foreach_1000_lines", |b| {
        b.iter(|| black_box(engine.query_single(black_box("FOREACH(PO1)=>PO102"), &document)))
    });

    let headers = HeaderTable::standard()
        .with_header(
            SegmentHeader::new("NM1", SegmentLayout::default())
                .unbounded()
                .with_loop_id_index(1),
        )
        .with_header(
            SegmentHeader::new("EB", SegmentLayout::default())
                .unbounded()
                .with_loop_id_index(1),
        );
    let eligibility = QueryEngine::with_options(X12Options::new().with_segment_headers(headers));
    c.bench_function("query_forsegloop_271", |b| {
        b.iter(|| {
            black_box(eligibility.query(
                black_box(r"FORSEGLOOP(^ISA\.GS\.ST=271\.HL=22\.NM1=IL.EB=.*)=>DTP03"),
                ELIGIBILITY_271,
            ))
        })
    });
}

criterion_group!(
    benches,
    benchmark_parser,
    benchmark_streaming,
    benchmark_query_parsing,
    benchmark_query_evaluation
);
criterion_main!(benches);
