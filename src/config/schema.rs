//! Configuration data structures for crossgraph.
//!
//! Defines the `.crossgraph.yaml` format: traversal bounds, cross-stack
//! matcher caps and file filters, and importance-ranking weights. Every
//! section defaults, so a partial file only overrides what it names.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CrossGraphError, Result};

/// Name of the per-repository config file.
pub const CONFIG_FILE: &str = ".crossgraph.yaml";

/// Hard upper bound on any traversal depth, whatever the config or request says.
pub const ABSOLUTE_MAX_DEPTH: u32 = 20;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for crossgraph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossGraphConfig {
    #[serde(default)]
    pub traversal: TraversalConfig,

    #[serde(default)]
    pub matcher: MatcherConfig,

    #[serde(default)]
    pub ranking: RankingConfig,
}

impl CrossGraphConfig {
    /// Parse a YAML document and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: CrossGraphConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.crossgraph.yaml` from `repo_root`, or defaults when the file
    /// is absent.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(CONFIG_FILE);
        if !config_path.exists() {
            tracing::debug!("no {} in {}, using defaults", CONFIG_FILE, repo_root.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&config_path)?;
        Self::from_yaml_str(&contents)
    }

    /// Reject values that would make the algorithms meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.traversal.max_depth_ceiling == 0 {
            return Err(CrossGraphError::Config(
                "traversal.max_depth_ceiling must be at least 1".into(),
            ));
        }
        if self.traversal.max_depth_ceiling > ABSOLUTE_MAX_DEPTH {
            return Err(CrossGraphError::Config(format!(
                "traversal.max_depth_ceiling must not exceed {ABSOLUTE_MAX_DEPTH}"
            )));
        }
        let w = &self.ranking.weights;
        if [w.betweenness, w.degree, w.eigenvector, w.closeness, w.semantic]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(CrossGraphError::Config(
                "ranking weights must be finite and non-negative".into(),
            ));
        }
        if self.ranking.db_operation_multiplier < 1.0 {
            return Err(CrossGraphError::Config(
                "ranking.db_operation_multiplier must be >= 1.0".into(),
            ));
        }
        let alpha = self.ranking.eigenvector_alpha;
        if alpha.is_nan() || alpha <= 0.0 || alpha >= 1.0 {
            return Err(CrossGraphError::Config(
                "ranking.eigenvector_alpha must lie strictly between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TraversalConfig
// ---------------------------------------------------------------------------

/// Depth and result-set bounds for traversal and pathfinding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Depth used when a request does not name one.
    #[serde(default = "default_max_depth")]
    pub default_max_depth: u32,

    /// Absolute ceiling; requested depths are clamped to it.
    #[serde(default = "default_max_depth_ceiling")]
    pub max_depth_ceiling: u32,

    /// Maximum number of paths `all_paths` returns.
    #[serde(default = "default_max_paths")]
    pub max_paths: usize,

    /// Maximum number of hits one transitive walk collects.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            default_max_depth: default_max_depth(),
            max_depth_ceiling: default_max_depth_ceiling(),
            max_paths: default_max_paths(),
            max_results: default_max_results(),
        }
    }
}

impl TraversalConfig {
    /// Resolve a caller-requested depth against the default and ceiling.
    pub fn effective_depth(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_max_depth)
            .min(self.max_depth_ceiling)
            .min(ABSOLUTE_MAX_DEPTH)
    }
}

// ---------------------------------------------------------------------------
// MatcherConfig
// ---------------------------------------------------------------------------

/// Caps and file filters for cross-stack matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default = "default_max_api_calls")]
    pub max_api_calls: usize,

    #[serde(default = "default_max_routes")]
    pub max_routes: usize,

    /// Matching stops once this many relationships have been produced.
    #[serde(default = "default_max_relationships")]
    pub max_relationships: usize,

    #[serde(default = "default_max_types")]
    pub max_frontend_types: usize,

    #[serde(default = "default_max_types")]
    pub max_backend_types: usize,

    #[serde(default = "default_max_contracts")]
    pub max_contracts: usize,

    /// Extensions (with dot) scanned for caller-side HTTP calls.
    #[serde(default = "default_frontend_extensions")]
    pub frontend_extensions: Vec<String>,

    /// Path segments that exclude a file from extraction.
    #[serde(default = "default_excluded_path_segments")]
    pub excluded_path_segments: Vec<String>,

    /// File-name fragments that exclude a file from extraction.
    #[serde(default = "default_excluded_file_markers")]
    pub excluded_file_markers: Vec<String>,

    /// Path fragments that put a script file on the backend side even when
    /// its language is usually frontend (e.g. a Node server).
    #[serde(default = "default_backend_path_markers")]
    pub backend_path_markers: Vec<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_api_calls: default_max_api_calls(),
            max_routes: default_max_routes(),
            max_relationships: default_max_relationships(),
            max_frontend_types: default_max_types(),
            max_backend_types: default_max_types(),
            max_contracts: default_max_contracts(),
            frontend_extensions: default_frontend_extensions(),
            excluded_path_segments: default_excluded_path_segments(),
            excluded_file_markers: default_excluded_file_markers(),
            backend_path_markers: default_backend_path_markers(),
        }
    }
}

// ---------------------------------------------------------------------------
// RankingConfig
// ---------------------------------------------------------------------------

/// Weights of the composite importance score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub betweenness: f64,
    pub degree: f64,
    pub eigenvector: f64,
    pub closeness: f64,
    pub semantic: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            betweenness: 0.30,
            degree: 0.20,
            eigenvector: 0.15,
            closeness: 0.10,
            semantic: 0.25,
        }
    }
}

/// A "persist/update/delete" convention for one language.
///
/// A symbol matches when its name matches `name_pattern` and, if present,
/// its context (qualified name, signature, description and file path)
/// matches `context_pattern`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbOperationRule {
    pub name_pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_pattern: Option<String>,
}

impl DbOperationRule {
    fn new(name_pattern: &str, context_pattern: Option<&str>) -> Self {
        Self {
            name_pattern: name_pattern.to_string(),
            context_pattern: context_pattern.map(str::to_string),
        }
    }
}

/// Importance-ranking knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default)]
    pub weights: RankingWeights,

    /// Weight of in-degree relative to out-degree.
    #[serde(default = "default_in_degree_weight")]
    pub in_degree_weight: f64,

    /// Score multiplier for state-mutating operations.
    #[serde(default = "default_db_operation_multiplier")]
    pub db_operation_multiplier: f64,

    /// Subtracted per level of depth from a boosted score.
    #[serde(default = "default_db_operation_depth_penalty")]
    pub db_operation_depth_penalty: f64,

    /// Per-level discount applied to the semantic weight.
    #[serde(default = "default_depth_discount")]
    pub depth_discount: f64,

    /// Attenuation factor of the eigenvector-style iteration.
    #[serde(default = "default_eigenvector_alpha")]
    pub eigenvector_alpha: f64,

    #[serde(default = "default_eigenvector_iterations")]
    pub eigenvector_iterations: usize,

    #[serde(default = "default_eigenvector_tolerance")]
    pub eigenvector_tolerance: f64,

    /// Database-operation conventions keyed by language name
    /// (`php`, `csharp`, `typescript`, `python`, ...).
    #[serde(default = "default_db_operation_rules")]
    pub db_operation_rules: HashMap<String, Vec<DbOperationRule>>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            in_degree_weight: default_in_degree_weight(),
            db_operation_multiplier: default_db_operation_multiplier(),
            db_operation_depth_penalty: default_db_operation_depth_penalty(),
            depth_discount: default_depth_discount(),
            eigenvector_alpha: default_eigenvector_alpha(),
            eigenvector_iterations: default_eigenvector_iterations(),
            eigenvector_tolerance: default_eigenvector_tolerance(),
            db_operation_rules: default_db_operation_rules(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_max_depth() -> u32 {
    10
}

fn default_max_depth_ceiling() -> u32 {
    ABSOLUTE_MAX_DEPTH
}

fn default_max_paths() -> usize {
    1000
}

fn default_max_results() -> usize {
    10_000
}

fn default_max_api_calls() -> usize {
    500
}

fn default_max_routes() -> usize {
    1000
}

fn default_max_relationships() -> usize {
    1000
}

fn default_max_types() -> usize {
    50
}

fn default_max_contracts() -> usize {
    100
}

fn default_frontend_extensions() -> Vec<String> {
    [".vue", ".ts", ".tsx", ".js", ".jsx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_excluded_path_segments() -> Vec<String> {
    [
        "node_modules",
        "dist",
        "build",
        "vendor",
        "coverage",
        ".nuxt",
        ".next",
        "__tests__",
        "__mocks__",
        "tests",
        "test",
        "spec",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_excluded_file_markers() -> Vec<String> {
    [".test.", ".spec.", ".d.ts", ".min.js", ".config."]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_backend_path_markers() -> Vec<String> {
    ["server/", "backend/", "app/Http/"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_in_degree_weight() -> f64 {
    1.5
}

fn default_db_operation_multiplier() -> f64 {
    2.5
}

fn default_db_operation_depth_penalty() -> f64 {
    0.05
}

fn default_depth_discount() -> f64 {
    0.1
}

fn default_eigenvector_alpha() -> f64 {
    0.85
}

fn default_eigenvector_iterations() -> usize {
    100
}

fn default_eigenvector_tolerance() -> f64 {
    1e-6
}

fn default_db_operation_rules() -> HashMap<String, Vec<DbOperationRule>> {
    let mut rules = HashMap::new();
    rules.insert(
        "php".to_string(),
        vec![DbOperationRule::new(
            r"(?i)^(store|save|create|update|destroy|delete|insert|upsert|forceDelete|updateOrCreate|firstOrCreate)",
            Some(r"(?i)(::(create|insert|update|delete|destroy|updateOrCreate|firstOrCreate)\b|->save\(|->delete\(|Model|Repository|Controller|Eloquent)"),
        )],
    );
    rules.insert(
        "csharp".to_string(),
        vec![
            DbOperationRule::new(r"^SaveChanges(Async)?$", None),
            DbOperationRule::new(
                r"(?i)^(add|update|remove|delete|create|insert|save|upsert)",
                Some(r"(?i)(Repository|DbContext|DbSet|SaveChanges|UnitOfWork)"),
            ),
        ],
    );
    rules.insert(
        "typescript".to_string(),
        vec![DbOperationRule::new(
            r"(?i)^(save|insert|update|delete|remove|upsert|persist|create)",
            Some(r"(?i)(repository|prisma|typeorm|mongoose|sequelize|knex|drizzle|getRepository|\.save\()"),
        )],
    );
    rules.insert(
        "python".to_string(),
        vec![DbOperationRule::new(
            r"(?i)^(save|create|update|delete|bulk_create|bulk_update|insert|commit)",
            Some(r"(?i)(models|objects\.|session\.|repository|orm|sqlalchemy)"),
        )],
    );
    rules
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
