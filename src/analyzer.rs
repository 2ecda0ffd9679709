//! `GraphAnalyzer`: one entry point for every analysis the crate exposes.
//!
//! Each request loads the relevant repository's adjacency into memory once
//! and runs the engines over it. Counters accumulate in the analyzer's own
//! [`AnalysisMetrics`].

use std::fmt;

use crate::config::CrossGraphConfig;
use crate::crossstack::{
    CrossStackAnalysis, CrossStackMatcher, FeatureGraph, FeatureGraphBuilder, PersistSummary,
};
use crate::error::Result;
use crate::graph::adjacency::AdjacencyIndex;
use crate::graph::impact::{ImpactAnalyzer, ImpactOptions, ImpactReport};
use crate::graph::pathfinding::{PathFinder, PathOptions, PathResult};
use crate::graph::ranking::{ImportanceRanker, RankCandidate, RankedSymbol};
use crate::graph::store::GraphStore;
use crate::graph::traversal::{
    TraversalDirection, TraversalEngine, TraversalOptions, TraversalReport,
};
use crate::observability::AnalysisMetrics;
use crate::types::SymbolId;

pub struct GraphAnalyzer {
    store: GraphStore,
    config: CrossGraphConfig,
    metrics: AnalysisMetrics,
}

impl fmt::Debug for GraphAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphAnalyzer")
            .field("config", &self.config)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

impl GraphAnalyzer {
    /// Wrap a store. The configuration is validated first.
    pub fn new(store: GraphStore, config: CrossGraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            metrics: AnalysisMetrics::new(),
        })
    }

    /// Open the database at `db_path` with the given configuration.
    pub fn open(db_path: &str, config: CrossGraphConfig) -> Result<Self> {
        Self::new(GraphStore::new(db_path)?, config)
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn config(&self) -> &CrossGraphConfig {
        &self.config
    }

    pub fn metrics(&self) -> &AnalysisMetrics {
        &self.metrics
    }

    /// Adjacency of the repository owning `symbol_id`; empty when the
    /// symbol is unknown.
    fn index_for_symbol(&self, symbol_id: SymbolId) -> Result<AdjacencyIndex> {
        match self.store.repository_of_symbol(symbol_id)? {
            Some(repo) => AdjacencyIndex::load(&self.store, repo),
            None => {
                tracing::debug!(symbol_id, "symbol not in any repository");
                Ok(AdjacencyIndex::default())
            }
        }
    }

    // -------------------------------------------------------------------
    // Traversal and pathfinding
    // -------------------------------------------------------------------

    pub fn transitive_callers(
        &self,
        symbol_id: SymbolId,
        opts: &TraversalOptions,
    ) -> Result<TraversalReport> {
        self.walk(TraversalDirection::Callers, symbol_id, opts)
    }

    pub fn transitive_dependencies(
        &self,
        symbol_id: SymbolId,
        opts: &TraversalOptions,
    ) -> Result<TraversalReport> {
        self.walk(TraversalDirection::Dependencies, symbol_id, opts)
    }

    fn walk(
        &self,
        direction: TraversalDirection,
        symbol_id: SymbolId,
        opts: &TraversalOptions,
    ) -> Result<TraversalReport> {
        let index = self.index_for_symbol(symbol_id)?;
        Ok(TraversalEngine::new(&index, &self.config.traversal)
            .with_metrics(&self.metrics)
            .walk(direction, symbol_id, opts))
    }

    pub fn shortest_path(
        &self,
        start: SymbolId,
        end: SymbolId,
        opts: &PathOptions,
    ) -> Result<Option<PathResult>> {
        let index = self.index_for_symbol(start)?;
        Ok(PathFinder::new(&index, &self.config.traversal)
            .with_metrics(&self.metrics)
            .shortest_path(start, end, opts))
    }

    pub fn all_paths(
        &self,
        start: SymbolId,
        end: SymbolId,
        max_depth: Option<u32>,
        opts: &PathOptions,
    ) -> Result<Vec<Vec<SymbolId>>> {
        let index = self.index_for_symbol(start)?;
        Ok(PathFinder::new(&index, &self.config.traversal)
            .with_metrics(&self.metrics)
            .all_paths(start, end, max_depth, opts))
    }

    /// Repository-wide dependency cycles (strongly connected components).
    pub fn dependency_cycles(&self, repository_id: i64) -> Result<Vec<Vec<SymbolId>>> {
        self.store.require_repository(repository_id)?;
        Ok(AdjacencyIndex::load(&self.store, repository_id)?.strongly_connected_cycles())
    }

    // -------------------------------------------------------------------
    // Cross-stack
    // -------------------------------------------------------------------

    pub fn cross_stack_impact(
        &self,
        symbol_id: SymbolId,
        opts: &ImpactOptions,
    ) -> Result<ImpactReport> {
        let index = self.index_for_symbol(symbol_id)?;
        ImpactAnalyzer::new(&index, &self.config.traversal, &self.config.matcher)
            .with_metrics(&self.metrics)
            .cross_stack_impact(symbol_id, opts)
    }

    /// Extract, match and persist cross-stack relationships.
    pub fn analyze_cross_stack(
        &self,
        repository_id: i64,
    ) -> Result<(CrossStackAnalysis, PersistSummary)> {
        CrossStackMatcher::new(&self.store, &self.config.matcher)
            .with_metrics(&self.metrics)
            .run(repository_id)
    }

    /// Refresh the repository's cross-stack relationships and build its
    /// feature graph.
    pub fn build_full_stack_feature_graph(&self, repository_id: i64) -> Result<FeatureGraph> {
        self.analyze_cross_stack(repository_id)?;
        FeatureGraphBuilder::new(&self.store).build(repository_id)
    }

    // -------------------------------------------------------------------
    // Ranking
    // -------------------------------------------------------------------

    /// Rank symbols by importance. Centrality comes from the repository of
    /// the first candidate.
    pub fn rank_symbols(&self, candidates: &[RankCandidate]) -> Result<Vec<RankedSymbol>> {
        let Some(first) = candidates.first() else {
            return Ok(Vec::new());
        };
        let index = self.index_for_symbol(first.symbol.id)?;
        let ranker = ImportanceRanker::new(&index, &self.config.ranking)?;
        Ok(ranker.rank_symbols(candidates))
    }

    /// Rank every symbol of a repository at depth 0.
    pub fn rank_repository(
        &self,
        repository_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<RankedSymbol>> {
        self.store.require_repository(repository_id)?;
        let index = AdjacencyIndex::load(&self.store, repository_id)?;
        let ranker = ImportanceRanker::new(&index, &self.config.ranking)?;
        let candidates: Vec<RankCandidate> = index
            .symbol_ids()
            .iter()
            .filter_map(|id| index.get_symbol(*id).cloned())
            .map(RankCandidate::from)
            .collect();
        let mut ranked = ranker.rank_symbols(&candidates);
        if let Some(limit) = limit {
            ranked.truncate(limit);
        }
        Ok(ranked)
    }
}
