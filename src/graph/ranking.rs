//! Composite importance ranking.
//!
//! `score = Σ weight_i · signal_i` over the four centrality signals plus a
//! semantic weight, clamped to `[0, 1]`. State-mutating operations
//! (per-language "persist/update/delete" conventions) get a depth-reduced
//! multiplier before the clamp.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{DbOperationRule, RankingConfig};
use crate::error::Result;
use crate::graph::adjacency::{AdjacencyIndex, EdgeFilter};
use crate::graph::centrality::{CentralityGraph, CentralityParams, CentralityScores};
use crate::types::{DependencyKind, Language, Symbol, SymbolKind};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A symbol to rank and its distance from the analysis entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankCandidate {
    pub symbol: Symbol,
    #[serde(default)]
    pub depth: u32,
}

impl From<Symbol> for RankCandidate {
    fn from(symbol: Symbol) -> Self {
        Self { symbol, depth: 0 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub betweenness: f64,
    pub degree: f64,
    pub eigenvector: f64,
    pub closeness: f64,
    pub semantic: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSymbol {
    pub symbol: Symbol,
    pub depth: u32,
    pub importance_score: f64,
    pub signals: ScoreBreakdown,
    pub db_operation: bool,
}

// ---------------------------------------------------------------------------
// Database-operation rules
// ---------------------------------------------------------------------------

struct CompiledRule {
    name: Regex,
    context: Option<Regex>,
}

impl CompiledRule {
    fn compile(rule: &DbOperationRule) -> Result<Self> {
        Ok(Self {
            name: Regex::new(&rule.name_pattern)?,
            context: rule.context_pattern.as_deref().map(Regex::new).transpose()?,
        })
    }

    fn matches(&self, name: &str, context: &str) -> bool {
        self.name.is_match(name) && self.context.as_ref().map_or(true, |c| c.is_match(context))
    }
}

/// Rule-set keys to try for a language, most specific first.
fn rule_keys(language: Language) -> &'static [&'static str] {
    match language {
        Language::TypeScript => &["typescript"],
        Language::Tsx => &["tsx", "typescript"],
        Language::JavaScript => &["javascript", "typescript"],
        Language::Jsx => &["jsx", "javascript", "typescript"],
        Language::Vue => &["vue", "typescript"],
        Language::Php => &["php"],
        Language::CSharp => &["csharp"],
        Language::Python => &["python"],
        Language::Java => &["java"],
        Language::Go => &["go"],
        Language::Ruby => &["ruby"],
        Language::Rust => &["rust"],
        Language::Kotlin => &["kotlin"],
        Language::GdScript => &["gdscript"],
        Language::Lua => &["lua"],
    }
}

// ---------------------------------------------------------------------------
// Semantic weight
// ---------------------------------------------------------------------------

const CRUD_VERBS: &[&str] = &[
    "create", "update", "delete", "save", "store", "insert", "remove", "destroy", "upsert",
    "persist",
];
const CORE_VERBS: &[&str] = &["process", "validate", "handle", "execute", "dispatch", "authorize"];
const NOISE_WORDS: &[&str] = &[
    "log", "logger", "format", "formatter", "print", "debug", "render", "response", "tostring",
    "serialize",
];
const PATH_HINTS: &[&str] = &["service", "controller", "repository", "handler", "usecase"];

/// Split `camelCase`, `PascalCase` and `snake_case` into lowercase words.
fn name_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn kind_weight(kind: SymbolKind) -> f64 {
    match kind {
        SymbolKind::Function | SymbolKind::Method => 0.6,
        SymbolKind::Class => 0.5,
        SymbolKind::Interface
        | SymbolKind::TypeAlias
        | SymbolKind::Struct
        | SymbolKind::Enum => 0.4,
        SymbolKind::Module | SymbolKind::Namespace => 0.3,
        SymbolKind::Variable | SymbolKind::Constant | SymbolKind::Property => 0.2,
    }
}

// ---------------------------------------------------------------------------
// ImportanceRanker
// ---------------------------------------------------------------------------

/// Ranks symbols against centrality computed once over a repository.
pub struct ImportanceRanker {
    config: RankingConfig,
    rules: HashMap<String, Vec<CompiledRule>>,
    centrality: CentralityScores,
}

impl ImportanceRanker {
    /// Compute centrality over `index` (containment edges excluded) and
    /// compile the configured database-operation rules.
    pub fn new(index: &AdjacencyIndex, config: &RankingConfig) -> Result<Self> {
        let graph =
            CentralityGraph::from_index(index, &EdgeFilter::excluding(&[DependencyKind::Contains]));
        let centrality = CentralityScores::compute(
            &graph,
            CentralityParams {
                in_degree_weight: config.in_degree_weight,
                alpha: config.eigenvector_alpha,
                iterations: config.eigenvector_iterations,
                tolerance: config.eigenvector_tolerance,
            },
        );
        let mut rules = HashMap::new();
        for (language, list) in &config.db_operation_rules {
            let compiled = list
                .iter()
                .map(CompiledRule::compile)
                .collect::<Result<Vec<_>>>()?;
            rules.insert(language.to_lowercase(), compiled);
        }
        Ok(Self {
            config: config.clone(),
            rules,
            centrality,
        })
    }

    /// Score every candidate and sort by descending importance; ties keep
    /// ascending symbol id.
    pub fn rank_symbols(&self, candidates: &[RankCandidate]) -> Vec<RankedSymbol> {
        let mut ranked: Vec<RankedSymbol> = candidates.iter().map(|c| self.score(c)).collect();
        ranked.sort_by(|a, b| {
            b.importance_score
                .total_cmp(&a.importance_score)
                .then(a.symbol.id.cmp(&b.symbol.id))
        });
        ranked
    }

    pub fn score(&self, candidate: &RankCandidate) -> RankedSymbol {
        let symbol = &candidate.symbol;
        let signals = self.centrality.get(symbol.id);
        let semantic = self.semantic_weight(symbol, candidate.depth);
        let w = &self.config.weights;
        let mut score = w.betweenness * signals.betweenness
            + w.degree * signals.degree
            + w.eigenvector * signals.eigenvector
            + w.closeness * signals.closeness
            + w.semantic * semantic;

        let db_operation = self.is_db_operation(symbol);
        if db_operation {
            let multiplier = (self.config.db_operation_multiplier
                - self.config.db_operation_depth_penalty * candidate.depth as f64)
                .max(1.0);
            score *= multiplier;
        }

        RankedSymbol {
            symbol: symbol.clone(),
            depth: candidate.depth,
            importance_score: if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 },
            signals: ScoreBreakdown {
                betweenness: signals.betweenness,
                degree: signals.degree,
                eigenvector: signals.eigenvector,
                closeness: signals.closeness,
                semantic,
            },
            db_operation,
        }
    }

    /// Kind, name and path heuristics, discounted by depth from the entry
    /// point. Always in `[0, 1]`.
    pub fn semantic_weight(&self, symbol: &Symbol, depth: u32) -> f64 {
        let words = name_words(&symbol.name);
        let has_any = |list: &[&str]| words.iter().any(|w| list.contains(&w.as_str()));

        let mut weight = kind_weight(symbol.kind);
        if has_any(CRUD_VERBS) {
            weight += 0.2;
        }
        if has_any(CORE_VERBS) {
            weight += 0.15;
        }
        if has_any(NOISE_WORDS) {
            weight -= 0.2;
        }
        let path = symbol.file_path.to_lowercase();
        if PATH_HINTS.iter().any(|hint| path.contains(hint)) {
            weight += 0.1;
        }
        weight /= 1.0 + self.config.depth_discount * depth as f64;
        weight.clamp(0.0, 1.0)
    }

    /// Whether the symbol matches its language's database-operation rules.
    pub fn is_db_operation(&self, symbol: &Symbol) -> bool {
        let Some(language) = symbol.language() else {
            return false;
        };
        let Some(rules) = rule_keys(language)
            .iter()
            .find_map(|key| self.rules.get(*key))
        else {
            return false;
        };
        let context = [
            symbol.qualified_name.as_deref().unwrap_or_default(),
            symbol.signature.as_deref().unwrap_or_default(),
            symbol.description.as_deref().unwrap_or_default(),
            symbol.file_path.as_str(),
        ]
        .join(" ");
        rules.iter().any(|r| r.matches(&symbol.name, &context))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
