use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use crossgraph::analyzer::GraphAnalyzer;
use crossgraph::cli::{Args, Command};
use crossgraph::config::CrossGraphConfig;
use crossgraph::error::{CrossGraphError, Result};
use crossgraph::graph::impact::ImpactOptions;
use crossgraph::observability::init_logging;

fn load_config(path: Option<&Path>) -> Result<CrossGraphConfig> {
    match path {
        Some(p) => CrossGraphConfig::from_yaml_str(&std::fs::read_to_string(p)?),
        None => CrossGraphConfig::load(Path::new(".")),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    if let Some(parent) = args.db.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let db = args
        .db
        .to_str()
        .ok_or_else(|| {
            CrossGraphError::Other(format!("non-UTF-8 database path: {}", args.db.display()))
        })?;
    let analyzer = GraphAnalyzer::open(db, config)?;

    match args.command {
        Command::Callers {
            symbol,
            max_depth,
            chains,
            edges,
        } => print_json(
            &analyzer.transitive_callers(symbol, &edges.traversal_options(max_depth, chains))?,
        ),
        Command::Deps {
            symbol,
            max_depth,
            chains,
            edges,
        } => print_json(
            &analyzer.transitive_dependencies(symbol, &edges.traversal_options(max_depth, chains))?,
        ),
        Command::Path { from, to, edges } => {
            print_json(&analyzer.shortest_path(from, to, &edges.path_options())?)
        }
        Command::AllPaths {
            from,
            to,
            max_depth,
            edges,
        } => print_json(&analyzer.all_paths(from, to, max_depth, &edges.path_options())?),
        Command::Impact {
            symbol,
            max_depth,
            direct_only,
        } => {
            let opts = ImpactOptions {
                max_depth,
                include_transitive: !direct_only,
            };
            print_json(&analyzer.cross_stack_impact(symbol, &opts)?)
        }
        Command::Analyze { repository } => {
            let (analysis, summary) = analyzer.analyze_cross_stack(repository)?;
            print_json(&serde_json::json!({ "analysis": analysis, "persisted": summary }))
        }
        Command::Features { repository } => {
            print_json(&analyzer.build_full_stack_feature_graph(repository)?)
        }
        Command::Rank { repository, limit } => {
            print_json(&analyzer.rank_repository(repository, limit)?)
        }
        Command::Cycles { repository } => print_json(&analyzer.dependency_cycles(repository)?),
    }?;

    tracing::debug!(metrics = %analyzer.metrics().to_json(), "done");
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
