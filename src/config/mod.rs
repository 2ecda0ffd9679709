//! Configuration: `.crossgraph.yaml` schema and loading.

pub mod schema;

pub use schema::{
    CrossGraphConfig, DbOperationRule, MatcherConfig, RankingConfig, RankingWeights,
    TraversalConfig, ABSOLUTE_MAX_DEPTH, CONFIG_FILE,
};
