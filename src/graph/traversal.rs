//! Bounded transitive traversal with path-scoped cycle detection.
//!
//! A walk reports call *paths*: a node reachable through two different
//! ancestors appears once per path. Only nodes on the current path count
//! as visited, so diamonds are expanded per branch while cycles stop at
//! the repeated node and are recorded.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::TraversalConfig;
use crate::graph::adjacency::{EdgeFilter, NeighborSource};
use crate::graph::call_chain::{CallChain, CallChainFormatter};
use crate::graph::store::merge_edges;
use crate::observability::AnalysisMetrics;
use crate::types::{Dependency, DependencyKind, SymbolId};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Which way a walk follows edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    /// Against the edge: who depends on the start symbol.
    Callers,
    /// Along the edge: what the start symbol depends on.
    Dependencies,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraversalOptions {
    /// Requested depth; clamped to the configured ceiling.
    pub max_depth: Option<u32>,
    pub include_kinds: Vec<DependencyKind>,
    pub exclude_kinds: Vec<DependencyKind>,
    /// Merge cross-stack edges (API calls, shared schemas) into every step.
    pub include_cross_stack: bool,
    pub show_call_chains: bool,
}

impl TraversalOptions {
    pub fn with_max_depth(max_depth: u32) -> Self {
        Self {
            max_depth: Some(max_depth),
            ..Self::default()
        }
    }

    pub fn cross_stack(mut self) -> Self {
        self.include_cross_stack = true;
        self
    }
}

/// One reached symbol and the path that reached it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalHit {
    pub symbol_id: SymbolId,
    /// Start symbol first, `symbol_id` last.
    pub path: Vec<SymbolId>,
    pub depth: u32,
    /// Edges between the previous path node and this one.
    pub edge_evidence: Vec<Dependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_chain: Option<CallChain>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalReport {
    pub results: Vec<TraversalHit>,
    pub max_depth_reached: u32,
    pub total_paths: usize,
    pub cycles_detected: usize,
    pub execution_time_ms: u64,
}

/// Canonical signature of a cycle: rotated to start at its smallest id and
/// joined with `->`. Rotations of the same cycle share a signature;
/// cycles over the same nodes in a different order do not.
pub fn cycle_signature(cycle: &[SymbolId]) -> String {
    let Some(start) = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(i, _)| i)
    else {
        return String::new();
    };
    cycle[start..]
        .iter()
        .chain(&cycle[..start])
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join("->")
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Per-walk mutable state.
struct Walk {
    direction: TraversalDirection,
    max_depth: u32,
    filter: EdgeFilter,
    cross_filter: EdgeFilter,
    include_cross_stack: bool,
    show_call_chains: bool,
    results: Vec<TraversalHit>,
    cycles: HashSet<String>,
    max_depth_reached: u32,
    truncated: bool,
}

/// Depth-first walker over a [`NeighborSource`].
pub struct TraversalEngine<'a, S: NeighborSource + ?Sized> {
    source: &'a S,
    config: TraversalConfig,
    metrics: Option<&'a AnalysisMetrics>,
}

impl<'a, S: NeighborSource + ?Sized> TraversalEngine<'a, S> {
    pub fn new(source: &'a S, config: &TraversalConfig) -> Self {
        Self {
            source,
            config: config.clone(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a AnalysisMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Everything that transitively depends on `symbol_id`.
    pub fn transitive_callers(
        &self,
        symbol_id: SymbolId,
        opts: &TraversalOptions,
    ) -> TraversalReport {
        self.walk(TraversalDirection::Callers, symbol_id, opts)
    }

    /// Everything `symbol_id` transitively depends on.
    pub fn transitive_dependencies(
        &self,
        symbol_id: SymbolId,
        opts: &TraversalOptions,
    ) -> TraversalReport {
        self.walk(TraversalDirection::Dependencies, symbol_id, opts)
    }

    pub fn walk(
        &self,
        direction: TraversalDirection,
        symbol_id: SymbolId,
        opts: &TraversalOptions,
    ) -> TraversalReport {
        let started = Instant::now();
        let mut walk = Walk {
            direction,
            max_depth: self.config.effective_depth(opts.max_depth),
            filter: EdgeFilter::for_traversal(
                &opts.include_kinds,
                &opts.exclude_kinds,
                opts.include_cross_stack,
            ),
            cross_filter: EdgeFilter::excluding(&opts.exclude_kinds),
            include_cross_stack: opts.include_cross_stack,
            show_call_chains: opts.show_call_chains,
            results: Vec::new(),
            cycles: HashSet::new(),
            max_depth_reached: 0,
            truncated: false,
        };

        let mut path = vec![symbol_id];
        let mut hop_kinds = Vec::new();
        let mut on_path: HashSet<SymbolId> = HashSet::from([symbol_id]);
        self.visit(&mut walk, &mut path, &mut hop_kinds, &mut on_path, 0);

        if walk.truncated {
            tracing::warn!(
                symbol_id,
                limit = self.config.max_results,
                "traversal result cap reached, returning partial results"
            );
        }
        if let Some(m) = self.metrics {
            m.record_cycles(walk.cycles.len());
        }

        let report = TraversalReport {
            total_paths: walk.results.len(),
            results: walk.results,
            max_depth_reached: walk.max_depth_reached,
            cycles_detected: walk.cycles.len(),
            execution_time_ms: started.elapsed().as_millis() as u64,
        };
        tracing::debug!(
            symbol_id,
            ?direction,
            results = report.total_paths,
            cycles = report.cycles_detected,
            elapsed_ms = report.execution_time_ms,
            "traversal finished"
        );
        report
    }

    fn visit(
        &self,
        walk: &mut Walk,
        path: &mut Vec<SymbolId>,
        hop_kinds: &mut Vec<DependencyKind>,
        on_path: &mut HashSet<SymbolId>,
        depth: u32,
    ) {
        if depth >= walk.max_depth || walk.truncated {
            return;
        }
        let Some(&node) = path.last() else {
            return;
        };
        if let Some(m) = self.metrics {
            m.record_node_expanded();
        }

        for (next, evidence) in self.neighbors(walk, node) {
            if on_path.contains(&next) {
                let start = path.iter().position(|&id| id == next).unwrap_or(0);
                walk.cycles.insert(cycle_signature(&path[start..]));
                continue;
            }
            if walk.results.len() >= self.config.max_results {
                walk.truncated = true;
                return;
            }

            path.push(next);
            hop_kinds.push(evidence[0].kind);
            let call_chain = walk
                .show_call_chains
                .then(|| CallChainFormatter::new(self.source).format(path, hop_kinds));
            walk.results.push(TraversalHit {
                symbol_id: next,
                path: path.clone(),
                depth: depth + 1,
                edge_evidence: evidence,
                call_chain,
            });
            walk.max_depth_reached = walk.max_depth_reached.max(depth + 1);

            on_path.insert(next);
            self.visit(walk, path, hop_kinds, on_path, depth + 1);
            on_path.remove(&next);
            hop_kinds.pop();
            path.pop();
        }
    }

    /// Neighbors of `node` in walk direction, grouped by neighbor id in
    /// first-seen order. A store failure yields no neighbors.
    fn neighbors(&self, walk: &Walk, node: SymbolId) -> Vec<(SymbolId, Vec<Dependency>)> {
        let edges = match self.fetch_edges(walk, node) {
            Ok(edges) => edges,
            Err(e) => {
                tracing::warn!(symbol_id = node, "neighbor lookup failed, treating as leaf: {}", e);
                if let Some(m) = self.metrics {
                    m.record_store_error();
                }
                return Vec::new();
            }
        };

        let mut order: Vec<SymbolId> = Vec::new();
        let mut grouped: HashMap<SymbolId, Vec<Dependency>> = HashMap::new();
        for edge in edges {
            let other = match walk.direction {
                TraversalDirection::Callers => edge.from_symbol_id,
                TraversalDirection::Dependencies => edge.to_symbol_id,
            };
            grouped
                .entry(other)
                .or_insert_with(|| {
                    order.push(other);
                    Vec::new()
                })
                .push(edge);
        }
        order
            .into_iter()
            .filter_map(|id| grouped.remove(&id).map(|edges| (id, edges)))
            .collect()
    }

    fn fetch_edges(&self, walk: &Walk, node: SymbolId) -> crate::error::Result<Vec<Dependency>> {
        match walk.direction {
            TraversalDirection::Callers => {
                let mut edges = self.source.direct_callers(node, &walk.filter)?;
                if walk.include_cross_stack {
                    let cross = self.source.cross_stack_callers(node)?;
                    merge_edges(
                        &mut edges,
                        cross.into_iter().filter(|d| walk.cross_filter.allows(d.kind)),
                    );
                }
                Ok(edges)
            }
            TraversalDirection::Dependencies => {
                let edges = self.source.direct_dependencies(
                    node,
                    &walk.filter,
                    walk.include_cross_stack,
                )?;
                Ok(edges
                    .into_iter()
                    .filter(|d| walk.cross_filter.allows(d.kind))
                    .collect())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
