// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Fabric CLI: inspect, search, and read compiled corpus stores.
//!
//! ```bash
//! # Verify a store and list its catalog
//! fabric inspect ./bhsa
//!
//! # Count matches of a template
//! fabric search ./bhsa "word sp=verb" --count
//!
//! # Render a passage
//! fabric text ./bhsa --section "Genesis 1:1"
//! ```
//!
//! Thin by design: every command is a direct call into the public API.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use fabric::{
    Fabric, FeatureSpec, ReturnType, SearchOpts, SearchOutput, Value,
};

mod cli;
use cli::{Cli, Commands};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Inspect { corpus, version } => inspect(&corpus, version),
        Commands::Search {
            corpus,
            template,
            version,
            limit,
            count,
        } => search(&corpus, &template, version, limit, count),
        Commands::Text {
            corpus,
            version,
            node,
            section,
            format,
        } => text(&corpus, version, node, section.as_deref(), format.as_deref()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn inspect(corpus: &Path, version: Option<u32>) -> fabric::Result<()> {
    let fabric = Fabric::open(corpus, version)?;
    let meta = fabric.meta();

    println!("corpus    {}", meta.name);
    println!("store     {}", fabric.dir().display());
    println!("nodes     {} ({} slots)", meta.node_count, meta.slot_count);
    println!("types     {}", meta.types.len());
    for (i, ty) in meta.types.iter().enumerate() {
        let slot = if ty.slot { "  [slot]" } else { "" };
        println!("  {:>3}  {:<12} level {}{}", i, ty.name, ty.level, slot);
    }
    println!("features  {}", meta.features.len());
    for (name, decl) in &meta.features {
        println!("  {:<20} {:?} {:?}", name, decl.kind, decl.value);
    }
    println!("formats   {}", meta.formats.len());
    for (name, template) in &meta.formats {
        println!("  {:<20} {:?}", name, template);
    }

    print!("integrity ");
    fabric.verify()?;
    println!("ok");
    Ok(())
}

fn search(
    corpus: &Path,
    template: &str,
    version: Option<u32>,
    limit: usize,
    count: bool,
) -> fabric::Result<()> {
    let source = read_template(template)?;
    let fabric = Fabric::open(corpus, version)?;
    let api = fabric.load(&FeatureSpec::Lazy)?;

    if count {
        let out = api
            .s
            .search(&source, ReturnType::Count, &SearchOpts::default())?;
        if let SearchOutput::Count(total) = out {
            println!("{}", total);
        }
        return Ok(());
    }

    let opts = SearchOpts {
        limit: Some(limit),
        ..SearchOpts::default()
    };
    let out = api.s.search(&source, ReturnType::Results, &opts)?;
    if let SearchOutput::Results { tuples, total, .. } = out {
        for tuple in &tuples {
            let cells: Vec<String> = tuple.iter().map(|n| n.to_string()).collect();
            println!("{}", cells.join("\t"));
        }
        if tuples.len() < total {
            eprintln!("({} of {} results shown)", tuples.len(), total);
        }
    }
    Ok(())
}

fn text(
    corpus: &Path,
    version: Option<u32>,
    node: Option<u32>,
    section: Option<&str>,
    format: Option<&str>,
) -> fabric::Result<()> {
    let fabric = Fabric::open(corpus, version)?;
    let api = fabric.load(&FeatureSpec::Lazy)?;

    let node = match (node, section) {
        (Some(n), _) => n,
        (None, Some(reference)) => {
            let labels = parse_section(reference);
            match api.t.section_node(&labels)? {
                Some(n) => n,
                None => {
                    eprintln!("no such section: {}", reference);
                    return Ok(());
                }
            }
        }
        (None, None) => {
            eprintln!("pass --node or --section");
            return Ok(());
        }
    };

    println!("{}", api.t.text(node, format)?);
    Ok(())
}

/// `@path` reads the template from a file; anything else is the template.
fn read_template(arg: &str) -> fabric::Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).map_err(|e| fabric::FabricError::io(path, e))
        }
        None => Ok(arg.to_string()),
    }
}

/// Parse "Genesis 1:1" into section labels; numeric parts become ints.
fn parse_section(reference: &str) -> Vec<Value> {
    let mut labels: Vec<Value> = Vec::new();
    let mut parts = reference.rsplitn(2, ' ');
    let tail = parts.next().unwrap_or_default();
    let head = parts.next();

    match head {
        Some(book) => {
            labels.push(Value::from(book));
            for piece in tail.split(':') {
                match piece.parse::<i64>() {
                    Ok(n) => labels.push(Value::Int(n)),
                    Err(_) => labels.push(Value::from(piece)),
                }
            }
        }
        None => labels.push(Value::from(tail)),
    }
    labels
}
