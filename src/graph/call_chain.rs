//! Renders a symbol-id path as a readable call chain.
//!
//! Each step gets a class-qualified display name; API_CALL hops carry the
//! HTTP method, endpoint path and line of the recorded call, e.g.
//! `UserList.load → [GET /api/users] → UsersController.index`.

use serde::Serialize;

use crate::graph::adjacency::{EdgeFilter, NeighborSource};
use crate::types::{ApiCall, DependencyKind, Symbol, SymbolId};

/// HTTP metadata of an API_CALL hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHop {
    pub http_method: String,
    pub endpoint_path: String,
    pub line_number: u32,
}

impl From<&ApiCall> for ApiHop {
    fn from(call: &ApiCall) -> Self {
        Self {
            http_method: call.http_method.to_uppercase(),
            endpoint_path: call.endpoint_path.clone(),
            line_number: call.line_number,
        }
    }
}

/// One symbol in a chain, plus the hop leading to the next symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStep {
    pub symbol_id: SymbolId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_to_next: Option<DependencyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_call: Option<ApiHop>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallChain {
    pub steps: Vec<ChainStep>,
    pub rendered: String,
}

/// Last two segments of a dotted, `::`, `\` or `@` qualified name,
/// joined with a dot. `None` when the name has a single segment.
fn short_qualified(qualified: &str) -> Option<String> {
    let normalized = qualified.replace("::", ".").replace(['\\', '@', '#'], ".");
    let segments: Vec<&str> = normalized.split('.').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [.., owner, name] => Some(format!("{owner}.{name}")),
        _ => None,
    }
}

/// Class-qualified display name of `symbol`.
///
/// Uses the qualified name when it has an owner segment, otherwise a
/// class-like symbol that CONTAINS it, otherwise the bare name.
pub fn display_name<S: NeighborSource + ?Sized>(source: &S, symbol: &Symbol) -> String {
    if let Some(short) = symbol.qualified_name.as_deref().and_then(short_qualified) {
        return short;
    }
    if symbol.kind.is_container() {
        return symbol.name.clone();
    }
    let contains = EdgeFilter::including(&[DependencyKind::Contains]);
    match source.direct_callers(symbol.id, &contains) {
        Ok(edges) => {
            for edge in edges {
                if let Ok(Some(owner)) = source.symbol(edge.from_symbol_id) {
                    if owner.kind.is_container() {
                        return format!("{}.{}", owner.name, symbol.name);
                    }
                }
            }
        }
        Err(e) => tracing::warn!(symbol_id = symbol.id, "owner lookup failed: {}", e),
    }
    symbol.name.clone()
}

/// Builds [`CallChain`]s over any [`NeighborSource`].
pub struct CallChainFormatter<'a, S: NeighborSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: NeighborSource + ?Sized> CallChainFormatter<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Format `path`, where `hop_kinds[i]` is the edge kind between
    /// `path[i]` and `path[i + 1]`. Missing kinds are left blank.
    pub fn format(&self, path: &[SymbolId], hop_kinds: &[DependencyKind]) -> CallChain {
        let mut steps = Vec::with_capacity(path.len());
        for (i, &id) in path.iter().enumerate() {
            let symbol = match self.source.symbol(id) {
                Ok(sym) => sym,
                Err(e) => {
                    tracing::warn!(symbol_id = id, "symbol lookup failed: {}", e);
                    None
                }
            };
            let edge_to_next = if i + 1 < path.len() {
                hop_kinds.get(i).copied()
            } else {
                None
            };
            let api_call = match edge_to_next {
                Some(DependencyKind::ApiCall) => self.api_hop(id, path[i + 1]),
                _ => None,
            };
            steps.push(ChainStep {
                symbol_id: id,
                display_name: symbol
                    .as_ref()
                    .map(|s| display_name(self.source, s))
                    .unwrap_or_else(|| format!("#{id}")),
                file_path: symbol.map(|s| s.file_path),
                edge_to_next,
                api_call,
            });
        }
        let rendered = render(&steps);
        CallChain { steps, rendered }
    }

    /// The API call behind a hop, looked up in either direction since
    /// caller walks run against the edge.
    fn api_hop(&self, a: SymbolId, b: SymbolId) -> Option<ApiHop> {
        let lookup = |caller: SymbolId, endpoint: SymbolId| {
            match self.source.api_call(caller, endpoint) {
                Ok(call) => call,
                Err(e) => {
                    tracing::warn!(caller, endpoint, "api call lookup failed: {}", e);
                    None
                }
            }
        };
        lookup(a, b).or_else(|| lookup(b, a)).as_ref().map(ApiHop::from)
    }
}

/// `A.f → [GET /api/users] → UsersController.index`
pub fn render(steps: &[ChainStep]) -> String {
    let mut out = String::new();
    for (i, step) in steps.iter().enumerate() {
        if i > 0 {
            out.push_str(" → ");
            if let Some(hop) = &steps[i - 1].api_call {
                out.push_str(&format!("[{} {}] → ", hop.http_method, hop.endpoint_path));
            }
        }
        out.push_str(&step.display_name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::adjacency::AdjacencyIndex;
    use crate::types::{Dependency, SymbolKind};

    fn sym(
        id: SymbolId,
        name: &str,
        qualified: Option<&str>,
        kind: SymbolKind,
        file: &str,
    ) -> Symbol {
        Symbol {
            id,
            file_id: 1,
            name: name.into(),
            qualified_name: qualified.map(Into::into),
            kind,
            file_path: file.into(),
            exported: true,
            signature: None,
            description: None,
        }
    }

    fn fixture() -> AdjacencyIndex {
        let symbols = vec![
            sym(1, "load", Some("UserList.load"), SymbolKind::Method, "src/UserList.vue"),
            sym(2, "UsersController", None, SymbolKind::Class, "app/UsersController.php"),
            sym(3, "index", None, SymbolKind::Method, "app/UsersController.php"),
            sym(4, "helper", None, SymbolKind::Function, "src/util.ts"),
        ];
        let deps = vec![
            Dependency::new(2, 3, DependencyKind::Contains, None),
            Dependency::new(1, 4, DependencyKind::Calls, Some(3)),
        ];
        let calls = vec![ApiCall {
            id: 1,
            repository_id: 1,
            caller_symbol_id: 1,
            endpoint_symbol_id: Some(3),
            http_method: "get".into(),
            endpoint_path: "/api/users".into(),
            line_number: 12,
        }];
        AdjacencyIndex::from_parts(symbols, deps, calls)
    }

    #[test]
    fn short_qualified_names() {
        assert_eq!(
            short_qualified("App\\Http\\UsersController::index").as_deref(),
            Some("UsersController.index")
        );
        assert_eq!(short_qualified("a.b.C.d").as_deref(), Some("C.d"));
        assert_eq!(short_qualified("Player@_ready").as_deref(), Some("Player._ready"));
        assert_eq!(short_qualified("plain"), None);
    }

    #[test]
    fn display_name_uses_contains_edge() {
        let index = fixture();
        let index_sym = index.get_symbol(3).unwrap().clone();
        assert_eq!(display_name(&index, &index_sym), "UsersController.index");
        let helper = index.get_symbol(4).unwrap().clone();
        assert_eq!(display_name(&index, &helper), "helper");
    }

    #[test]
    fn api_hop_is_rendered_with_method_and_path() {
        let index = fixture();
        let chain = CallChainFormatter::new(&index).format(&[1, 3], &[DependencyKind::ApiCall]);
        assert_eq!(chain.rendered, "UserList.load → [GET /api/users] → UsersController.index");
        let hop = chain.steps[0].api_call.as_ref().unwrap();
        assert_eq!(hop.line_number, 12);
        assert_eq!(chain.steps[1].edge_to_next, None);
    }

    #[test]
    fn reversed_api_hop_is_found() {
        let index = fixture();
        let chain = CallChainFormatter::new(&index).format(&[3, 1], &[DependencyKind::ApiCall]);
        assert!(chain.steps[0].api_call.is_some());
    }

    #[test]
    fn unknown_symbols_render_as_ids() {
        let index = fixture();
        let chain = CallChainFormatter::new(&index)
            .format(&[1, 4, 99], &[DependencyKind::Calls, DependencyKind::Calls]);
        assert_eq!(chain.rendered, "UserList.load → helper → #99");
        assert_eq!(chain.steps[2].file_path, None);
    }
}
