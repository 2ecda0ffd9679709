//! Shortest path and bounded simple-path enumeration between two symbols.
//!
//! `shortest_path` is a uniform-cost search with unit edge weights that
//! treats the graph as undirected (dependencies and callers both expand).
//! `all_paths` follows forward dependency edges only.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::TraversalConfig;
use crate::graph::adjacency::{EdgeFilter, NeighborSource};
use crate::observability::AnalysisMetrics;
use crate::types::{DependencyKind, SymbolId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathOptions {
    pub include_kinds: Vec<DependencyKind>,
    pub exclude_kinds: Vec<DependencyKind>,
    /// Also expand API calls and other cross-stack edges.
    pub include_cross_stack: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResult {
    pub path: Vec<SymbolId>,
    pub distance: u32,
}

pub struct PathFinder<'a, S: NeighborSource + ?Sized> {
    source: &'a S,
    config: TraversalConfig,
    metrics: Option<&'a AnalysisMetrics>,
}

impl<'a, S: NeighborSource + ?Sized> PathFinder<'a, S> {
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

    fn store_error(&self, node: SymbolId, e: &crate::error::CrossGraphError) {
        tracing::warn!(symbol_id = node, "neighbor lookup failed during path search: {}", e);
        if let Some(m) = self.metrics {
            m.record_store_error();
        }
    }

    /// Neighbors in both directions, de-duplicated.
    fn undirected_neighbors(
        &self,
        node: SymbolId,
        filter: &EdgeFilter,
        opts: &PathOptions,
    ) -> Vec<SymbolId> {
        let mut out: Vec<SymbolId> = Vec::new();
        let mut seen: HashSet<SymbolId> = HashSet::new();
        let mut push = |id: SymbolId| {
            if seen.insert(id) {
                out.push(id);
            }
        };

        match self
            .source
            .direct_dependencies(node, filter, opts.include_cross_stack)
        {
            Ok(edges) => edges.iter().for_each(|d| push(d.to_symbol_id)),
            Err(e) => self.store_error(node, &e),
        }
        match self.source.direct_callers(node, filter) {
            Ok(edges) => edges.iter().for_each(|d| push(d.from_symbol_id)),
            Err(e) => self.store_error(node, &e),
        }
        if opts.include_cross_stack {
            match self.source.cross_stack_callers(node) {
                Ok(edges) => edges.iter().for_each(|d| push(d.from_symbol_id)),
                Err(e) => self.store_error(node, &e),
            }
        }
        out
    }

    /// Fewest-hop path from `start` to `end`, or `None` when unreachable.
    pub fn shortest_path(
        &self,
        start: SymbolId,
        end: SymbolId,
        opts: &PathOptions,
    ) -> Option<PathResult> {
        let filter = EdgeFilter::for_traversal(
            &opts.include_kinds,
            &opts.exclude_kinds,
            opts.include_cross_stack,
        );
        let mut dist: HashMap<SymbolId, u32> = HashMap::from([(start, 0)]);
        let mut prev: HashMap<SymbolId, SymbolId> = HashMap::new();
        let mut settled: HashSet<SymbolId> = HashSet::new();
        let mut frontier = BinaryHeap::from([Reverse((0u32, start))]);

        while let Some(Reverse((d, node))) = frontier.pop() {
            if !settled.insert(node) {
                continue;
            }
            if node == end {
                let mut path = vec![end];
                let mut cur = end;
                while let Some(&p) = prev.get(&cur) {
                    path.push(p);
                    cur = p;
                }
                path.reverse();
                return Some(PathResult { path, distance: d });
            }
            if let Some(m) = self.metrics {
                m.record_node_expanded();
            }
            for next in self.undirected_neighbors(node, &filter, opts) {
                if settled.contains(&next) {
                    continue;
                }
                let candidate = d + 1;
                if dist.get(&next).map_or(true, |&known| candidate < known) {
                    dist.insert(next, candidate);
                    prev.insert(next, node);
                    frontier.push(Reverse((candidate, next)));
                }
            }
        }
        tracing::debug!(start, end, explored = settled.len(), "no path found");
        None
    }

    /// Every simple forward path from `start` to `end` with at most
    /// `max_depth` edges (clamped to the ceiling), capped at the configured
    /// path limit. Paths are returned in discovery order.
    pub fn all_paths(
        &self,
        start: SymbolId,
        end: SymbolId,
        max_depth: Option<u32>,
        opts: &PathOptions,
    ) -> Vec<Vec<SymbolId>> {
        if start == end {
            return vec![vec![start]];
        }
        let max_depth = self.config.effective_depth(max_depth);
        let filter = EdgeFilter::for_traversal(
            &opts.include_kinds,
            &opts.exclude_kinds,
            opts.include_cross_stack,
        );
        let mut found = Vec::new();
        let mut path = vec![start];
        let mut on_path: HashSet<SymbolId> = HashSet::from([start]);
        self.enumerate(end, max_depth, &filter, opts, &mut path, &mut on_path, &mut found);
        if found.len() >= self.config.max_paths {
            tracing::warn!(start, end, limit = self.config.max_paths, "path cap reached");
        }
        found
    }

    #[allow(clippy::too_many_arguments)]
    fn enumerate(
        &self,
        end: SymbolId,
        remaining: u32,
        filter: &EdgeFilter,
        opts: &PathOptions,
        path: &mut Vec<SymbolId>,
        on_path: &mut HashSet<SymbolId>,
        found: &mut Vec<Vec<SymbolId>>,
    ) {
        if remaining == 0 || found.len() >= self.config.max_paths {
            return;
        }
        let Some(&node) = path.last() else {
            return;
        };
        let edges = match self
            .source
            .direct_dependencies(node, filter, opts.include_cross_stack)
        {
            Ok(edges) => edges,
            Err(e) => {
                self.store_error(node, &e);
                return;
            }
        };

        let mut tried: HashSet<SymbolId> = HashSet::new();
        for edge in edges {
            let next = edge.to_symbol_id;
            if on_path.contains(&next) || !tried.insert(next) {
                continue;
            }
            if found.len() >= self.config.max_paths {
                return;
            }
            path.push(next);
            if next == end {
                found.push(path.clone());
            } else {
                on_path.insert(next);
                self.enumerate(end, remaining - 1, filter, opts, path, on_path, found);
                on_path.remove(&next);
            }
            path.pop();
        }
    }
}
