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

//! Simple CLI for X12 parsing and querying
//!
//! Parses EDI documents into JSON and evaluates queries against them.

use clap::{Parser, Subcommand};
use octofhir_x12::{Document, QueryEngine, TransactionMap, X12Options, X12Parser};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::process;

#[derive(Parser)]
#[command(name = "octofhir-x12")]
#[command(about = "Simple X12 CLI for parsing EDI documents and evaluating queries")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an EDI document and print its tree as JSON
    Parse {
        /// EDI file (reads from stdin if not provided)
        file: Option<String>,
        /// Fail on structural problems instead of warning
        #[arg(short, long)]
        strict: bool,
        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Evaluate a query against an EDI document
    Query {
        /// Query to evaluate, e.g. REF02:REF01["DP"]
        query: String,
        /// EDI file (reads from stdin if not provided)
        file: Option<String>,
        /// Fail on structural problems instead of warning
        #[arg(short, long)]
        strict: bool,
        /// Print only the first match or the aggregated macro result
        #[arg(long)]
        single: bool,
        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
        /// Print values only, one per line
        #[arg(short, long)]
        quiet: bool,
    },
    /// Project every transaction through a JSON mapping schema
    Map {
        /// JSON mapping schema file
        schema: String,
        /// EDI file (reads from stdin if not provided)
        file: Option<String>,
        /// Fail on structural problems instead of warning
        #[arg(short, long)]
        strict: bool,
        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    // Setup human-panic for better error messages
    human_panic::setup_panic!();

    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.verbose {
        "debug"
    } else {
        "warn"
    }))
    .init();

    match cli.command {
        Commands::Parse {
            file,
            strict,
            pretty,
        } => handle_parse(file.as_deref(), strict, pretty),
        Commands::Query {
            query,
            file,
            strict,
            single,
            pretty,
            quiet,
        } => handle_query(&query, file.as_deref(), strict, single, pretty, quiet),
        Commands::Map {
            schema,
            file,
            strict,
            pretty,
        } => handle_map(&schema, file.as_deref(), strict, pretty),
    }
}

fn parser(strict: bool) -> X12Parser {
    X12Parser::with_options(X12Options::new().with_strict(strict))
}

fn read_input(file: Option<&str>) -> String {
    if let Some(filename) = file {
        match fs::read_to_string(filename) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading file '{filename}': {e}");
                process::exit(1);
            }
        }
    } else {
        let mut buffer = String::new();
        if let Err(e) = io::stdin().read_to_string(&mut buffer) {
            eprintln!("Error reading from stdin: {e}");
            process::exit(1);
        }
        buffer
    }
}

fn parse_document(file: Option<&str>, strict: bool) -> Document {
    let content = read_input(file);
    match parser(strict).parse(content.as_str()) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Error parsing document: {e}");
            process::exit(1);
        }
    }
}

fn print_json<T: Serialize + std::fmt::Debug>(value: &T, pretty: bool) {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match output {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{value:?}"),
    }
}

fn handle_parse(file: Option<&str>, strict: bool, pretty: bool) {
    let document = parse_document(file, strict);
    log::info!("parsed {} interchanges", document.len());
    print_json(&document, pretty);
}

fn handle_query(query: &str, file: Option<&str>, strict: bool, single: bool, pretty: bool, quiet: bool) {
    let document = parse_document(file, strict);
    let engine = QueryEngine::with_parser(parser(strict));

    if single {
        match engine.query_single(query, &document) {
            Ok(Some(result)) if quiet => {
                for value in result.values() {
                    println!("{value}");
                }
            }
            Ok(result) => print_json(&result, pretty),
            Err(e) => {
                eprintln!("Error evaluating query: {e}");
                process::exit(1);
            }
        }
        return;
    }

    match engine.query(query, &document) {
        Ok(matches) if quiet => {
            for found in &matches {
                println!("{}", found.value);
            }
        }
        Ok(matches) => print_json(&matches, pretty),
        Err(e) => {
            eprintln!("Error evaluating query: {e}");
            process::exit(1);
        }
    }
}

fn handle_map(schema: &str, file: Option<&str>, strict: bool, pretty: bool) {
    let map = match fs::read_to_string(schema)
        .map_err(|e| e.to_string())
        .and_then(|json| TransactionMap::from_json(&json).map_err(|e| e.to_string()))
    {
        Ok(map) => map,
        Err(e) => {
            eprintln!("Error loading mapping schema '{schema}': {e}");
            process::exit(1);
        }
    };

    let document = parse_document(file, strict);
    let engine = QueryEngine::with_parser(parser(strict));
    let mut objects = Vec::new();
    for interchange in &document.interchanges {
        for transaction in interchange.transactions() {
            match map.to_object(&engine, transaction) {
                Ok(object) => objects.push(object),
                Err(e) => {
                    eprintln!("Error mapping transaction {}: {e}", transaction.control_number());
                    process::exit(1);
                }
            }
        }
    }
    print_json(&objects, pretty);
}
