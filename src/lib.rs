//! crossgraph: cross-stack symbol graph analysis.
//!
//! Answers structural questions over a persisted symbol/dependency graph of
//! a polyglot repository: who calls a symbol, what breaks if it changes,
//! which frontend calls reach which backend routes, and which symbols
//! matter most. [`analyzer::GraphAnalyzer`] is the entry point.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod crossstack;
pub mod db;
pub mod error;
pub mod graph;
pub mod observability;
pub mod types;

pub use analyzer::GraphAnalyzer;
pub use error::{CrossGraphError, Result};
