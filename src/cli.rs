//! Command-line arguments for the `crossgraph` binary.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::graph::pathfinding::PathOptions;
use crate::graph::traversal::TraversalOptions;
use crate::types::{DependencyKind, SymbolId};

#[derive(Debug, Parser)]
#[command(
    name = "crossgraph",
    version,
    about = "Cross-stack symbol graph analysis",
    after_help = r#"Examples:
  crossgraph --db graph.db callers 42 --max-depth 5 --cross-stack --chains
  crossgraph --db graph.db path 12 87
  crossgraph --db graph.db impact 87
  crossgraph --db graph.db features 1
  crossgraph --db graph.db rank 1 --limit 20
"#
)]
pub struct Args {
    /// SQLite database holding the symbol graph.
    #[arg(long, global = true, default_value = ".crossgraph/graph.db")]
    pub db: PathBuf,
    /// YAML configuration; defaults to `.crossgraph.yaml` in the working
    /// directory when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

/// Edge filtering shared by the traversal commands.
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct EdgeArgs {
    /// Only follow these edge kinds (e.g. CALLS, IMPORTS).
    #[arg(long = "include", value_parser = parse_kind)]
    pub include_kinds: Vec<DependencyKind>,
    /// Never follow these edge kinds.
    #[arg(long = "exclude", value_parser = parse_kind)]
    pub exclude_kinds: Vec<DependencyKind>,
    /// Also follow API_CALL / SHARES_SCHEMA / FRONTEND_BACKEND edges.
    #[arg(long)]
    pub cross_stack: bool,
}

impl EdgeArgs {
    pub fn path_options(&self) -> PathOptions {
        PathOptions {
            include_kinds: self.include_kinds.clone(),
            exclude_kinds: self.exclude_kinds.clone(),
            include_cross_stack: self.cross_stack,
        }
    }

    pub fn traversal_options(&self, max_depth: Option<u32>, chains: bool) -> TraversalOptions {
        TraversalOptions {
            max_depth,
            include_kinds: self.include_kinds.clone(),
            exclude_kinds: self.exclude_kinds.clone(),
            include_cross_stack: self.cross_stack,
            show_call_chains: chains,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Everything that transitively calls or depends on a symbol.
    Callers {
        symbol: SymbolId,
        #[arg(long)]
        max_depth: Option<u32>,
        /// Attach a formatted call chain to every result.
        #[arg(long)]
        chains: bool,
        #[command(flatten)]
        edges: EdgeArgs,
    },
    /// Everything a symbol transitively depends on.
    Deps {
        symbol: SymbolId,
        #[arg(long)]
        max_depth: Option<u32>,
        #[arg(long)]
        chains: bool,
        #[command(flatten)]
        edges: EdgeArgs,
    },
    /// Shortest connection between two symbols.
    Path {
        from: SymbolId,
        to: SymbolId,
        #[command(flatten)]
        edges: EdgeArgs,
    },
    /// All simple forward paths between two symbols.
    AllPaths {
        from: SymbolId,
        to: SymbolId,
        #[arg(long)]
        max_depth: Option<u32>,
        #[command(flatten)]
        edges: EdgeArgs,
    },
    /// Frontend and backend symbols affected by changing a symbol.
    Impact {
        symbol: SymbolId,
        #[arg(long)]
        max_depth: Option<u32>,
        /// Only direct callers.
        #[arg(long)]
        direct_only: bool,
    },
    /// Match frontend calls to backend routes and store the results.
    Analyze { repository: i64 },
    /// Full-stack feature graph of a repository.
    Features { repository: i64 },
    /// Symbols of a repository ordered by importance.
    Rank {
        repository: i64,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Dependency cycles of a repository.
    Cycles { repository: i64 },
}

fn parse_kind(s: &str) -> Result<DependencyKind, String> {
    DependencyKind::from_str_loose(s).ok_or_else(|| format!("unknown edge kind: {s}"))
}
