//! Data-contract detection: frontend and backend types sharing a name.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::MatcherConfig;
use crate::types::{StackSide, Symbol, SymbolId, SymbolKind};

/// A frontend type and a backend type believed to describe the same data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMatch {
    pub frontend_type_id: SymbolId,
    pub backend_type_id: SymbolId,
    pub name: String,
    /// Signatures of both sides, when the parser recorded them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_definition: Option<String>,
}

fn is_frontend_type(kind: SymbolKind) -> bool {
    matches!(kind, SymbolKind::Interface | SymbolKind::TypeAlias)
}

fn is_backend_type(kind: SymbolKind) -> bool {
    matches!(kind, SymbolKind::Class | SymbolKind::Interface)
}

/// Split a repository's symbols into frontend type candidates
/// (interfaces, type aliases) and backend type candidates (classes,
/// interfaces) by the stack side of their files.
pub fn type_candidates(symbols: &[Symbol], config: &MatcherConfig) -> (Vec<Symbol>, Vec<Symbol>) {
    let mut frontend = Vec::new();
    let mut backend = Vec::new();
    for symbol in symbols {
        match StackSide::of_path(&symbol.file_path, &config.backend_path_markers) {
            Some(StackSide::Frontend) if is_frontend_type(symbol.kind) => {
                frontend.push(symbol.clone())
            }
            Some(StackSide::Backend) if is_backend_type(symbol.kind) => {
                backend.push(symbol.clone())
            }
            _ => {}
        }
    }
    (frontend, backend)
}

fn schema_definition(frontend: &Symbol, backend: &Symbol) -> Option<String> {
    if frontend.signature.is_none() && backend.signature.is_none() {
        return None;
    }
    serde_json::to_string(&serde_json::json!({
        "frontend": frontend.signature,
        "backend": backend.signature,
    }))
    .ok()
}

/// Pair frontend and backend types whose names are identical
/// (case-sensitive).
///
/// Only the first `max_frontend_types` × `max_backend_types` candidates are
/// compared, at most `max_contracts` pairs are returned, and a repeated
/// (frontend, backend) id pair is reported once.
pub fn detect_data_contract_matches(
    frontend_types: &[Symbol],
    backend_types: &[Symbol],
    config: &MatcherConfig,
) -> Vec<ContractMatch> {
    if frontend_types.len() > config.max_frontend_types
        || backend_types.len() > config.max_backend_types
    {
        tracing::debug!(
            frontend = frontend_types.len(),
            backend = backend_types.len(),
            "truncating type candidates for contract detection"
        );
    }
    let frontend = &frontend_types[..frontend_types.len().min(config.max_frontend_types)];
    let backend = &backend_types[..backend_types.len().min(config.max_backend_types)];

    let mut seen: HashSet<(SymbolId, SymbolId)> = HashSet::new();
    let mut contracts = Vec::new();
    'outer: for f in frontend {
        for b in backend {
            if f.name != b.name || !seen.insert((f.id, b.id)) {
                continue;
            }
            if contracts.len() >= config.max_contracts {
                tracing::warn!(limit = config.max_contracts, "data contract cap reached");
                break 'outer;
            }
            contracts.push(ContractMatch {
                frontend_type_id: f.id,
                backend_type_id: b.id,
                name: f.name.clone(),
                schema_definition: schema_definition(f, b),
            });
        }
    }
    contracts
}
