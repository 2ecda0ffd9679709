//! Structured logging, path validation and analysis metrics.
//!
//! - [`init_logging`]: one-time subscriber setup with `RUST_LOG` support
//! - [`validate_path`]: keeps scanned files inside a repository root
//! - [`AnalysisMetrics`]: counters owned by one analyzer or request

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging with `RUST_LOG` environment variable support.
///
/// Defaults to `crossgraph=info` when `RUST_LOG` is not set. Subsequent
/// calls are silently ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crossgraph=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolve `path` against `repo_root` and check that the result stays
/// inside the root. Returns the canonical path on success.
pub fn validate_path(path: &str, repo_root: &Path) -> Result<PathBuf, String> {
    let requested = repo_root.join(path);
    let canonical = requested
        .canonicalize()
        .map_err(|e| format!("Path not found: {}: {}", path, e))?;

    let root_canonical = repo_root
        .canonicalize()
        .map_err(|e| format!("Invalid repository root: {}", e))?;

    if !canonical.starts_with(&root_canonical) {
        return Err(format!(
            "Path traversal detected: {} escapes repository root",
            path
        ));
    }

    Ok(canonical)
}

// ---------------------------------------------------------------------------
// AnalysisMetrics
// ---------------------------------------------------------------------------

/// Counters for one analyzer instance.
///
/// Engines borrow the collector, so several traversals sharing an analyzer
/// add into the same counters. Nothing here is process-global.
#[derive(Debug, Default)]
pub struct AnalysisMetrics {
    nodes_expanded: AtomicU64,
    store_errors: AtomicU64,
    cycles_detected: AtomicU64,
    files_scanned: AtomicU64,
    extraction_failures: AtomicU64,
    calls_matched: AtomicU64,
    calls_unmatched: AtomicU64,
    contracts_detected: AtomicU64,
    conflicts_resolved: AtomicU64,
}

/// Point-in-time copy of [`AnalysisMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub nodes_expanded: u64,
    pub store_errors: u64,
    pub cycles_detected: u64,
    pub files_scanned: u64,
    pub extraction_failures: u64,
    pub calls_matched: u64,
    pub calls_unmatched: u64,
    pub contracts_detected: u64,
    pub conflicts_resolved: u64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl AnalysisMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_node_expanded(&self) {
        bump(&self.nodes_expanded, 1);
    }

    pub fn record_store_error(&self) {
        bump(&self.store_errors, 1);
    }

    pub fn record_cycles(&self, n: usize) {
        bump(&self.cycles_detected, n as u64);
    }

    pub fn record_file_scanned(&self) {
        bump(&self.files_scanned, 1);
    }

    pub fn record_extraction_failure(&self) {
        bump(&self.extraction_failures, 1);
    }

    pub fn record_match_outcome(&self, matched: usize, unmatched: usize) {
        bump(&self.calls_matched, matched as u64);
        bump(&self.calls_unmatched, unmatched as u64);
    }

    pub fn record_contracts(&self, n: usize) {
        bump(&self.contracts_detected, n as u64);
    }

    pub fn record_conflict_resolved(&self) {
        bump(&self.conflicts_resolved, 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            nodes_expanded: load(&self.nodes_expanded),
            store_errors: load(&self.store_errors),
            cycles_detected: load(&self.cycles_detected),
            files_scanned: load(&self.files_scanned),
            extraction_failures: load(&self.extraction_failures),
            calls_matched: load(&self.calls_matched),
            calls_unmatched: load(&self.calls_unmatched),
            contracts_detected: load(&self.contracts_detected),
            conflicts_resolved: load(&self.conflicts_resolved),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }

    /// Share of scanned files whose extraction failed.
    pub fn extraction_failure_rate(&self) -> f64 {
        let snap = self.snapshot();
        if snap.files_scanned == 0 {
            return 0.0;
        }
        snap.extraction_failures as f64 / snap.files_scanned as f64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
