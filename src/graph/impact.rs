//! Cross-stack impact analysis.
//!
//! Walks callers of a symbol with cross-stack edges merged in and splits
//! the impacted symbols into frontend and backend halves.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::{MatcherConfig, TraversalConfig};
use crate::error::{CrossGraphError, Result};
use crate::graph::adjacency::NeighborSource;
use crate::graph::call_chain::{display_name, ApiHop};
use crate::graph::traversal::{TraversalEngine, TraversalOptions};
use crate::observability::AnalysisMetrics;
use crate::types::{DependencyKind, StackSide, SymbolId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImpactOptions {
    pub max_depth: Option<u32>,
    /// When false only direct callers are considered.
    pub include_transitive: bool,
}

impl Default for ImpactOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            include_transitive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactedSymbol {
    pub symbol_id: SymbolId,
    pub name: String,
    pub display_name: String,
    pub file_path: String,
    /// Shortest depth at which the symbol was reached.
    pub depth: u32,
}

/// A cross-stack edge crossed during the walk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossStackEdge {
    pub from_symbol_id: SymbolId,
    pub to_symbol_id: SymbolId,
    pub kind: DependencyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_call: Option<ApiHop>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactReport {
    pub frontend_impact: Vec<ImpactedSymbol>,
    pub backend_impact: Vec<ImpactedSymbol>,
    pub cross_stack_relationships: Vec<CrossStackEdge>,
    pub total_impacted_symbols: usize,
    pub execution_time_ms: u64,
}

pub struct ImpactAnalyzer<'a, S: NeighborSource + ?Sized> {
    source: &'a S,
    traversal: &'a TraversalConfig,
    matcher: &'a MatcherConfig,
    metrics: Option<&'a AnalysisMetrics>,
}

impl<'a, S: NeighborSource + ?Sized> ImpactAnalyzer<'a, S> {
    pub fn new(source: &'a S, traversal: &'a TraversalConfig, matcher: &'a MatcherConfig) -> Self {
        Self {
            source,
            traversal,
            matcher,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a AnalysisMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Everything that breaks, on either side of the stack, if `symbol_id`
    /// changes. An unknown start symbol is an error.
    pub fn cross_stack_impact(
        &self,
        symbol_id: SymbolId,
        opts: &ImpactOptions,
    ) -> Result<ImpactReport> {
        let started = Instant::now();
        if self.source.symbol(symbol_id)?.is_none() {
            return Err(CrossGraphError::NotFound(format!("symbol {symbol_id}")));
        }

        let depth = if opts.include_transitive {
            self.traversal.effective_depth(opts.max_depth)
        } else {
            1
        };
        let mut engine = TraversalEngine::new(self.source, self.traversal);
        if let Some(m) = self.metrics {
            engine = engine.with_metrics(m);
        }
        let walk = engine.transitive_callers(
            symbol_id,
            &TraversalOptions::with_max_depth(depth).cross_stack(),
        );

        // Shortest depth per impacted symbol, in first-reached order.
        let mut order: Vec<SymbolId> = Vec::new();
        let mut depths: HashMap<SymbolId, u32> = HashMap::new();
        let mut seen_edges: HashSet<(SymbolId, SymbolId, DependencyKind)> = HashSet::new();
        let mut relationships = Vec::new();
        for hit in &walk.results {
            if hit.symbol_id != symbol_id {
                depths
                    .entry(hit.symbol_id)
                    .and_modify(|d| *d = (*d).min(hit.depth))
                    .or_insert_with(|| {
                        order.push(hit.symbol_id);
                        hit.depth
                    });
            }
            for edge in hit.edge_evidence.iter().filter(|e| e.kind.is_cross_stack()) {
                if !seen_edges.insert((edge.from_symbol_id, edge.to_symbol_id, edge.kind)) {
                    continue;
                }
                relationships.push(CrossStackEdge {
                    from_symbol_id: edge.from_symbol_id,
                    to_symbol_id: edge.to_symbol_id,
                    kind: edge.kind,
                    api_call: self.api_hop(edge.from_symbol_id, edge.to_symbol_id, edge.kind),
                });
            }
        }

        let mut report = ImpactReport::default();
        for id in order {
            let symbol = match self.source.symbol(id) {
                Ok(Some(s)) => s,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(symbol_id = id, "symbol lookup failed: {}", e);
                    continue;
                }
            };
            let side = StackSide::of_path(&symbol.file_path, &self.matcher.backend_path_markers)
                .unwrap_or(StackSide::Backend);
            let impacted = ImpactedSymbol {
                symbol_id: id,
                display_name: display_name(self.source, &symbol),
                name: symbol.name,
                file_path: symbol.file_path,
                depth: depths[&id],
            };
            match side {
                StackSide::Frontend => report.frontend_impact.push(impacted),
                StackSide::Backend => report.backend_impact.push(impacted),
            }
        }
        report.total_impacted_symbols = report.frontend_impact.len() + report.backend_impact.len();
        report.cross_stack_relationships = relationships;
        report.execution_time_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            symbol_id,
            frontend = report.frontend_impact.len(),
            backend = report.backend_impact.len(),
            cross_stack = report.cross_stack_relationships.len(),
            "cross-stack impact computed"
        );
        Ok(report)
    }

    fn api_hop(&self, from: SymbolId, to: SymbolId, kind: DependencyKind) -> Option<ApiHop> {
        if kind != DependencyKind::ApiCall {
            return None;
        }
        match self.source.api_call(from, to) {
            Ok(call) => call.as_ref().map(ApiHop::from),
            Err(e) => {
                tracing::warn!(from, to, "api call lookup failed: {}", e);
                None
            }
        }
    }
}
