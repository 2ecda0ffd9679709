//! Cross-stack relationship matching.
//!
//! Links frontend code to backend code in two ways:
//!
//! - [`extraction`] + [`matcher`]: HTTP calls found in frontend files are
//!   matched to stored backend routes by normalized URL and method
//! - [`contracts`]: frontend and backend types with identical names are
//!   paired as data contracts
//!
//! [`CrossStackMatcher`] runs both passes over a repository and upserts the
//! results; [`feature_graph`] turns what is stored into feature clusters.

pub mod contracts;
pub mod extraction;
pub mod feature_graph;
pub mod matcher;

use std::path::Path;

use serde::Serialize;

use crate::config::MatcherConfig;
use crate::error::Result;
use crate::graph::store::GraphStore;
use crate::observability::AnalysisMetrics;
use crate::types::{ApiCall, DataContract, Dependency, DependencyKind};

pub use contracts::{detect_data_contract_matches, ContractMatch};
pub use extraction::{ApiCallExtractor, ExtractedCall};
pub use feature_graph::{FeatureGraph, FeatureGraphBuilder};
pub use matcher::{match_api_calls_to_routes, normalize_url, ApiRelationship, MatchOutcome};

/// Result of one matching pass, before persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossStackAnalysis {
    pub repository_id: i64,
    pub files_scanned: usize,
    pub failed_files: Vec<String>,
    pub relationships: Vec<ApiRelationship>,
    pub matched: usize,
    pub unmatched: usize,
    pub truncated: bool,
    pub contracts: Vec<ContractMatch>,
}

/// Rows written by [`CrossStackMatcher::persist`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistSummary {
    pub api_calls_inserted: usize,
    pub contracts_written: usize,
    pub dependencies_inserted: usize,
    /// Rows that already existed and were left as they were.
    pub duplicates_skipped: usize,
}

pub struct CrossStackMatcher<'a> {
    store: &'a GraphStore,
    config: &'a MatcherConfig,
    metrics: Option<&'a AnalysisMetrics>,
}

impl<'a> CrossStackMatcher<'a> {
    pub fn new(store: &'a GraphStore, config: &'a MatcherConfig) -> Self {
        Self {
            store,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a AnalysisMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Extract, match and detect contracts for one repository. An unknown
    /// repository is an error; unreadable files are skipped.
    pub fn analyze_repository(&self, repository_id: i64) -> Result<CrossStackAnalysis> {
        let repo = self.store.require_repository(repository_id).map_err(|e| {
            tracing::warn!(repository_id, "cannot analyze repository: {}", e);
            e
        })?;
        let mut analysis = CrossStackAnalysis {
            repository_id,
            ..CrossStackAnalysis::default()
        };

        let root = Path::new(&repo.root_path);
        let calls = if root.is_dir() {
            let mut extractor = ApiCallExtractor::new(self.config);
            if let Some(m) = self.metrics {
                extractor = extractor.with_metrics(m);
            }
            let report = extractor.extract_repository(self.store, repository_id, root)?;
            analysis.files_scanned = report.files_scanned;
            analysis.failed_files = report.failed_files;
            report.calls
        } else {
            tracing::warn!(
                root = %repo.root_path,
                "repository root is not a directory, skipping extraction"
            );
            Vec::new()
        };

        let routes = self.store.routes_by_repository(repository_id, None)?;
        let outcome = match_api_calls_to_routes(&calls, &routes, self.config);
        analysis.matched = outcome.matched;
        analysis.unmatched = outcome.unmatched;
        analysis.truncated = outcome.truncated;
        analysis.relationships = outcome.relationships;

        let symbols = self.store.symbols_by_repository(repository_id)?;
        let (frontend, backend) = contracts::type_candidates(&symbols, self.config);
        analysis.contracts = detect_data_contract_matches(&frontend, &backend, self.config);

        if let Some(m) = self.metrics {
            m.record_match_outcome(analysis.matched, analysis.unmatched);
            m.record_contracts(analysis.contracts.len());
        }
        tracing::info!(
            repository_id,
            files = analysis.files_scanned,
            matched = analysis.matched,
            unmatched = analysis.unmatched,
            contracts = analysis.contracts.len(),
            "cross-stack analysis finished"
        );
        Ok(analysis)
    }

    /// Upsert an analysis: API calls and cross-stack edges are inserted
    /// unless already present, contracts are merged. Calls that could not be
    /// attributed to a symbol are not stored.
    pub fn persist(&self, analysis: &CrossStackAnalysis) -> Result<PersistSummary> {
        let repository_id = analysis.repository_id;
        let mut calls = Vec::new();
        let mut edges = Vec::new();
        for rel in &analysis.relationships {
            let Some(caller) = rel.call.caller_symbol_id else {
                continue;
            };
            let endpoint = rel.route.as_ref().and_then(|r| r.handler_symbol_id);
            calls.push(ApiCall {
                id: 0,
                repository_id,
                caller_symbol_id: caller,
                endpoint_symbol_id: endpoint,
                http_method: rel.call.http_method.to_uppercase(),
                endpoint_path: rel.call.url.clone(),
                line_number: rel.call.line_number,
            });
            if let Some(endpoint) = endpoint {
                edges.push(Dependency::new(
                    caller,
                    endpoint,
                    DependencyKind::ApiCall,
                    Some(rel.call.line_number),
                ));
            }
        }

        let contracts: Vec<DataContract> = analysis
            .contracts
            .iter()
            .map(|c| DataContract {
                id: 0,
                repository_id,
                frontend_type_id: c.frontend_type_id,
                backend_type_id: c.backend_type_id,
                name: c.name.clone(),
                drift_detected: false,
                schema_definition: c.schema_definition.clone(),
            })
            .collect();
        edges.extend(analysis.contracts.iter().map(|c| {
            Dependency::new(
                c.frontend_type_id,
                c.backend_type_id,
                DependencyKind::SharesSchema,
                None,
            )
        }));

        let mut summary = PersistSummary {
            api_calls_inserted: self.store.upsert_api_calls(&calls)?,
            contracts_written: self.store.upsert_data_contracts(&contracts)?,
            dependencies_inserted: self.store.upsert_dependencies(&edges)?,
            duplicates_skipped: 0,
        };
        summary.duplicates_skipped = (calls.len() - summary.api_calls_inserted)
            + (edges.len() - summary.dependencies_inserted);
        if let Some(m) = self.metrics {
            for _ in 0..summary.duplicates_skipped {
                m.record_conflict_resolved();
            }
        }
        tracing::info!(
            repository_id,
            api_calls = summary.api_calls_inserted,
            contracts = summary.contracts_written,
            dependencies = summary.dependencies_inserted,
            duplicates = summary.duplicates_skipped,
            "cross-stack results persisted"
        );
        Ok(summary)
    }

    /// Analyze and persist in one step.
    pub fn run(&self, repository_id: i64) -> Result<(CrossStackAnalysis, PersistSummary)> {
        let analysis = self.analyze_repository(repository_id)?;
        let summary = self.persist(&analysis)?;
        Ok((analysis, summary))
    }
}
