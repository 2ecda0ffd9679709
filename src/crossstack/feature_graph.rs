//! Full-stack feature graph.
//!
//! Stored components, routes, API calls and data contracts become a typed
//! node/edge graph, and nodes are grouped into feature clusters by the
//! leading capitalized word of their names (`UserProfile` -> `User`).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::crossstack::matcher::{is_placeholder, methods_match, urls_match};
use crate::error::Result;
use crate::graph::call_chain::display_name;
use crate::graph::store::GraphStore;
use crate::types::{ApiCall, Component, Route, StackSide, Symbol, SymbolId};

/// Component kind the store uses for Vue single-file components.
pub const VUE_COMPONENT_KIND: &str = "vue";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FeatureNode {
    VueComponent {
        id: String,
        name: String,
        component_id: i64,
        symbol_id: Option<SymbolId>,
        file_path: Option<String>,
    },
    BackendRoute {
        id: String,
        name: String,
        route_id: i64,
        framework: String,
        method: String,
        path: String,
        handler_symbol_id: Option<SymbolId>,
    },
    FrontendType {
        id: String,
        name: String,
        symbol_id: SymbolId,
        file_path: String,
    },
    BackendType {
        id: String,
        name: String,
        symbol_id: SymbolId,
        file_path: String,
    },
}

impl FeatureNode {
    pub fn id(&self) -> &str {
        match self {
            Self::VueComponent { id, .. }
            | Self::BackendRoute { id, .. }
            | Self::FrontendType { id, .. }
            | Self::BackendType { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::VueComponent { name, .. }
            | Self::BackendRoute { name, .. }
            | Self::FrontendType { name, .. }
            | Self::BackendType { name, .. } => name,
        }
    }

    pub fn side(&self) -> StackSide {
        match self {
            Self::VueComponent { .. } | Self::FrontendType { .. } => StackSide::Frontend,
            Self::BackendRoute { .. } | Self::BackendType { .. } => StackSide::Backend,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FeatureEdge {
    ApiCall {
        from: String,
        to: String,
        http_method: String,
        endpoint_path: String,
        line_number: u32,
    },
    SharesSchema {
        from: String,
        to: String,
        contract_name: String,
        drift_detected: bool,
    },
}

impl FeatureEdge {
    pub fn endpoints(&self) -> (&str, &str) {
        match self {
            Self::ApiCall { from, to, .. } | Self::SharesSchema { from, to, .. } => (from, to),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubGraph {
    pub nodes: Vec<FeatureNode>,
    pub edges: Vec<FeatureEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureCluster {
    pub name: String,
    pub frontend_nodes: Vec<String>,
    pub backend_nodes: Vec<String>,
    pub api_call_edges: usize,
    pub shared_schema_edges: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureGraph {
    pub features: Vec<FeatureCluster>,
    pub api_call_graph: SubGraph,
    pub data_contract_graph: SubGraph,
    pub total_features: usize,
    pub cross_stack_relationships: usize,
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Leading capitalized word of `name`: `UserProfile` -> `User`,
/// `HTTPClient` -> `HTTP`, `UsersController.index` -> `Users`.
/// `None` when the name starts lowercase.
pub fn cluster_prefix(name: &str) -> Option<String> {
    let chars: Vec<char> = name.chars().collect();
    if !chars.first()?.is_uppercase() {
        return None;
    }
    let upper = chars.iter().take_while(|c| c.is_uppercase()).count();
    let end = if upper > 1 {
        // An acronym run ends one before the capital that starts the next word.
        if chars.get(upper).is_some_and(|c| c.is_lowercase()) {
            upper - 1
        } else {
            upper
        }
    } else {
        1 + chars[1..]
            .iter()
            .take_while(|c| c.is_lowercase() || c.is_ascii_digit())
            .count()
    };
    Some(chars[..end].iter().collect())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Name for a route node: the handler's class-qualified name, else the
/// first literal segment after any `api` prefix, capitalized.
fn route_name(store: &GraphStore, route: &Route, handler: Option<&Symbol>) -> String {
    if let Some(symbol) = handler {
        return display_name(store, symbol);
    }
    route
        .path
        .split('/')
        .filter(|s| !s.is_empty() && !is_placeholder(s))
        .find(|s| !s.eq_ignore_ascii_case("api"))
        .map(capitalize)
        .unwrap_or_else(|| route.path.clone())
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`FeatureGraph`] from what the store holds for one
/// repository.
pub struct FeatureGraphBuilder<'a> {
    store: &'a GraphStore,
    symbols: HashMap<SymbolId, Option<Symbol>>,
}

impl<'a> FeatureGraphBuilder<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self {
            store,
            symbols: HashMap::new(),
        }
    }

    fn symbol(&mut self, id: SymbolId) -> Result<Option<Symbol>> {
        if let Some(cached) = self.symbols.get(&id) {
            return Ok(cached.clone());
        }
        let loaded = self.store.symbol_by_id(id)?;
        self.symbols.insert(id, loaded.clone());
        Ok(loaded)
    }

    pub fn build(mut self, repository_id: i64) -> Result<FeatureGraph> {
        let components = self.store.components_by_kind(repository_id, VUE_COMPONENT_KIND)?;
        let routes = self.store.routes_by_repository(repository_id, None)?;
        let calls = self.store.api_calls_by_repository(repository_id)?;
        let contracts = self.store.data_contracts_by_repository(repository_id)?;

        let mut api_graph = SubGraph::default();
        let mut component_files: Vec<(String, Option<String>, Option<SymbolId>)> = Vec::new();
        for component in &components {
            let node = self.component_node(component)?;
            if let FeatureNode::VueComponent { id, file_path, symbol_id, .. } = &node {
                component_files.push((id.clone(), file_path.clone(), *symbol_id));
            }
            api_graph.nodes.push(node);
        }
        for route in &routes {
            let handler = match route.handler_symbol_id {
                Some(id) => self.symbol(id)?,
                None => None,
            };
            api_graph.nodes.push(FeatureNode::BackendRoute {
                id: format!("route:{}", route.id),
                name: route_name(self.store, route, handler.as_ref()),
                route_id: route.id,
                framework: route.framework.clone(),
                method: route.method.to_uppercase(),
                path: route.path.clone(),
                handler_symbol_id: route.handler_symbol_id,
            });
        }

        for call in &calls {
            let Some(to) = Self::route_for_call(&routes, call) else {
                continue;
            };
            let caller = self.symbol(call.caller_symbol_id)?;
            let from = component_files.iter().find(|(_, file, symbol_id)| {
                *symbol_id == Some(call.caller_symbol_id)
                    || caller
                        .as_ref()
                        .is_some_and(|c| file.as_deref() == Some(c.file_path.as_str()))
            });
            let Some((from, _, _)) = from else {
                tracing::debug!(
                    caller = call.caller_symbol_id,
                    path = %call.endpoint_path,
                    "api call has no component node"
                );
                continue;
            };
            api_graph.edges.push(FeatureEdge::ApiCall {
                from: from.clone(),
                to: format!("route:{}", to.id),
                http_method: call.http_method.to_uppercase(),
                endpoint_path: call.endpoint_path.clone(),
                line_number: call.line_number,
            });
        }

        let mut contract_graph = SubGraph::default();
        let mut type_nodes: BTreeSet<SymbolId> = BTreeSet::new();
        for contract in &contracts {
            let (Some(front), Some(back)) = (
                self.symbol(contract.frontend_type_id)?,
                self.symbol(contract.backend_type_id)?,
            ) else {
                tracing::debug!(contract = %contract.name, "contract references a missing symbol");
                continue;
            };
            if type_nodes.insert(front.id) {
                contract_graph.nodes.push(FeatureNode::FrontendType {
                    id: format!("type:{}", front.id),
                    name: front.name.clone(),
                    symbol_id: front.id,
                    file_path: front.file_path.clone(),
                });
            }
            if type_nodes.insert(back.id) {
                contract_graph.nodes.push(FeatureNode::BackendType {
                    id: format!("type:{}", back.id),
                    name: back.name.clone(),
                    symbol_id: back.id,
                    file_path: back.file_path.clone(),
                });
            }
            contract_graph.edges.push(FeatureEdge::SharesSchema {
                from: format!("type:{}", front.id),
                to: format!("type:{}", back.id),
                contract_name: contract.name.clone(),
                drift_detected: contract.drift_detected,
            });
        }

        let features = cluster_features(&api_graph, &contract_graph);
        let graph = FeatureGraph {
            total_features: features.len(),
            cross_stack_relationships: api_graph.edges.len() + contract_graph.edges.len(),
            features,
            api_call_graph: api_graph,
            data_contract_graph: contract_graph,
        };
        tracing::info!(
            repository_id,
            features = graph.total_features,
            relationships = graph.cross_stack_relationships,
            "feature graph built"
        );
        Ok(graph)
    }

    fn component_node(&mut self, component: &Component) -> Result<FeatureNode> {
        let symbol = match component.symbol_id {
            Some(id) => self.symbol(id)?,
            None => None,
        };
        Ok(FeatureNode::VueComponent {
            id: format!("component:{}", component.id),
            name: component.name.clone(),
            component_id: component.id,
            symbol_id: component.symbol_id,
            file_path: symbol.map(|s| s.file_path),
        })
    }

    /// Route a stored call points at: same handler, preferring one whose
    /// method and path also agree with the call.
    fn route_for_call<'r>(routes: &'r [Route], call: &ApiCall) -> Option<&'r Route> {
        let endpoint = call.endpoint_symbol_id?;
        let candidates: Vec<&Route> = routes
            .iter()
            .filter(|r| r.handler_symbol_id == Some(endpoint))
            .collect();
        candidates
            .iter()
            .find(|r| {
                methods_match(&call.http_method, &r.method)
                    && urls_match(&call.endpoint_path, &r.path)
            })
            .or_else(|| candidates.first())
            .copied()
    }
}

/// Group nodes of both graphs by name prefix and count the edges that
/// touch each group. Unprefixed names stay unclustered.
pub fn cluster_features(api_graph: &SubGraph, contract_graph: &SubGraph) -> Vec<FeatureCluster> {
    let mut clusters: BTreeMap<String, FeatureCluster> = BTreeMap::new();
    let mut node_cluster: HashMap<&str, String> = HashMap::new();

    for node in api_graph.nodes.iter().chain(&contract_graph.nodes) {
        let Some(prefix) = cluster_prefix(node.name()) else {
            continue;
        };
        let cluster = clusters.entry(prefix.clone()).or_insert_with(|| FeatureCluster {
            name: prefix.clone(),
            ..FeatureCluster::default()
        });
        match node.side() {
            StackSide::Frontend => cluster.frontend_nodes.push(node.id().to_string()),
            StackSide::Backend => cluster.backend_nodes.push(node.id().to_string()),
        }
        node_cluster.insert(node.id(), prefix);
    }

    for edge in api_graph.edges.iter().chain(&contract_graph.edges) {
        let (from, to) = edge.endpoints();
        let touched: BTreeSet<&String> = [node_cluster.get(from), node_cluster.get(to)]
            .into_iter()
            .flatten()
            .collect();
        for name in touched {
            if let Some(cluster) = clusters.get_mut(name) {
                match edge {
                    FeatureEdge::ApiCall { .. } => cluster.api_call_edges += 1,
                    FeatureEdge::SharesSchema { .. } => cluster.shared_schema_edges += 1,
                }
            }
        }
    }

    clusters
        .into_values()
        .filter(|c| !c.frontend_nodes.is_empty() || !c.backend_nodes.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::initialize_database;
    use crate::graph::store::NewSymbol;
    use crate::types::{DataContract, SymbolKind};
    use pretty_assertions::assert_eq;

    fn setup() -> GraphStore {
        let conn = initialize_database(":memory:").unwrap();
        GraphStore::from_connection(conn)
    }

    #[test]
    fn test_cluster_prefix() {
        assert_eq!(cluster_prefix("UserProfile").as_deref(), Some("User"));
        assert_eq!(cluster_prefix("User").as_deref(), Some("User"));
        assert_eq!(cluster_prefix("HTTPClient").as_deref(), Some("HTTP"));
        assert_eq!(cluster_prefix("API").as_deref(), Some("API"));
        assert_eq!(cluster_prefix("Order2Form").as_deref(), Some("Order2"));
        assert_eq!(cluster_prefix("UsersController.index").as_deref(), Some("Users"));
        assert_eq!(cluster_prefix("getUsers"), None);
        assert_eq!(cluster_prefix(""), None);
    }

    #[test]
    fn test_route_name_fallback() {
        let store = setup();
        let route = |path: &str| Route {
            id: 1,
            repository_id: 1,
            framework: "express".into(),
            path: path.into(),
            method: "GET".into(),
            handler_symbol_id: None,
            name: None,
        };
        assert_eq!(route_name(&store, &route("/api/orders/{id}"), None), "Orders");
        assert_eq!(route_name(&store, &route("/:tenant/invoices"), None), "Invoices");
        assert_eq!(route_name(&store, &route("/api"), None), "/api");
    }

    /// UserList.vue calls GET /api/users handled by UsersController.index;
    /// the frontend `User` interface shares a schema with the `User` model.
    fn seed(store: &GraphStore) -> i64 {
        let repo = store.insert_repository("shop", "/tmp/shop").unwrap();
        let vue_file = store.insert_file(repo, "src/components/UserList.vue").unwrap();
        let ctrl_file = store
            .insert_file(repo, "app/Http/Controllers/UsersController.php")
            .unwrap();
        let types_file = store.insert_file(repo, "src/types/user.ts").unwrap();
        let model_file = store.insert_file(repo, "app/Models/User.php").unwrap();

        let component_sym = store
            .insert_symbol(&NewSymbol::new(vue_file, "UserList", SymbolKind::Class).exported())
            .unwrap();
        let loader = store
            .insert_symbol(&NewSymbol::new(vue_file, "loadUsers", SymbolKind::Function))
            .unwrap();
        let handler = store
            .insert_symbol(
                &NewSymbol::new(ctrl_file, "index", SymbolKind::Method)
                    .qualified("App\\Http\\Controllers\\UsersController::index"),
            )
            .unwrap();
        let fe_type = store
            .insert_symbol(&NewSymbol::new(types_file, "User", SymbolKind::Interface).exported())
            .unwrap();
        let be_type = store
            .insert_symbol(&NewSymbol::new(model_file, "User", SymbolKind::Class))
            .unwrap();

        store
            .insert_component(&Component {
                id: 0,
                repository_id: repo,
                kind: VUE_COMPONENT_KIND.into(),
                name: "UserList".into(),
                symbol_id: Some(component_sym),
            })
            .unwrap();
        store
            .insert_route(&Route {
                id: 0,
                repository_id: repo,
                framework: "laravel".into(),
                path: "/api/users".into(),
                method: "get".into(),
                handler_symbol_id: Some(handler),
                name: None,
            })
            .unwrap();
        store
            .insert_route(&Route {
                id: 0,
                repository_id: repo,
                framework: "laravel".into(),
                path: "/api/health".into(),
                method: "GET".into(),
                handler_symbol_id: None,
                name: None,
            })
            .unwrap();
        store
            .insert_api_call(&ApiCall {
                id: 0,
                repository_id: repo,
                caller_symbol_id: loader,
                endpoint_symbol_id: Some(handler),
                http_method: "GET".into(),
                endpoint_path: "/api/users".into(),
                line_number: 12,
            })
            .unwrap();
        store
            .insert_data_contract(&DataContract {
                id: 0,
                repository_id: repo,
                frontend_type_id: fe_type,
                backend_type_id: be_type,
                name: "User".into(),
                drift_detected: false,
                schema_definition: None,
            })
            .unwrap();
        repo
    }

    #[test]
    fn test_build_feature_graph() {
        let store = setup();
        let repo = seed(&store);
        let graph = FeatureGraphBuilder::new(&store).build(repo).unwrap();

        assert_eq!(graph.api_call_graph.nodes.len(), 3);
        assert_eq!(graph.api_call_graph.edges.len(), 1);
        assert_eq!(graph.data_contract_graph.nodes.len(), 2);
        assert_eq!(graph.data_contract_graph.edges.len(), 1);
        assert_eq!(graph.cross_stack_relationships, 2);

        let names: Vec<&str> = graph.features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Health", "User", "Users"]);
        assert_eq!(graph.total_features, 3);

        let user = &graph.features[1];
        assert_eq!(user.frontend_nodes.len(), 2);
        assert_eq!(user.backend_nodes.len(), 1);
        assert_eq!(user.api_call_edges, 1);
        assert_eq!(user.shared_schema_edges, 1);

        let users = &graph.features[2];
        assert_eq!(users.backend_nodes.len(), 1);
        assert_eq!(users.api_call_edges, 1);
        assert_eq!(users.shared_schema_edges, 0);
    }

    #[test]
    fn test_nodes_serialize_with_type_tag() {
        let store = setup();
        let repo = seed(&store);
        let graph = FeatureGraphBuilder::new(&store).build(repo).unwrap();
        let json = serde_json::to_value(&graph).unwrap();

        assert_eq!(json["apiCallGraph"]["nodes"][0]["type"], "vue_component");
        assert_eq!(json["apiCallGraph"]["nodes"][1]["type"], "backend_route");
        assert_eq!(json["apiCallGraph"]["nodes"][1]["name"], "UsersController.index");
        assert_eq!(json["apiCallGraph"]["nodes"][1]["method"], "GET");
        assert_eq!(json["apiCallGraph"]["edges"][0]["type"], "api_call");
        assert_eq!(json["apiCallGraph"]["edges"][0]["lineNumber"], 12);
        assert_eq!(json["dataContractGraph"]["edges"][0]["type"], "shares_schema");
        assert_eq!(json["totalFeatures"], 3);
    }

    #[test]
    fn test_empty_repository() {
        let store = setup();
        let repo = store.insert_repository("empty", "/tmp/empty").unwrap();
        let graph = FeatureGraphBuilder::new(&store).build(repo).unwrap();
        assert_eq!(graph, FeatureGraph::default());
    }
}
