//! End-to-end cross-stack tests.
//!
//! These tests write a small full-stack repository to a temporary
//! directory, seed the store with the symbols and routes an indexer would
//! have produced, and run the analyzer over it.

use std::collections::HashSet;

use crossgraph::config::CrossGraphConfig;
use crossgraph::db::schema::initialize_database;
use crossgraph::graph::impact::ImpactOptions;
use crossgraph::graph::store::{GraphStore, NewSymbol};
use crossgraph::graph::traversal::TraversalOptions;
use crossgraph::types::{Component, DependencyKind, Route, SymbolId, SymbolKind};
use crossgraph::{CrossGraphError, GraphAnalyzer};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const USER_LIST_VUE: &str = r#"<template>
  <ul><li v-for="u in users" :key="u.id">{{ u.name }}</li></ul>
</template>
<script setup lang="ts">
import axios from 'axios'
const loadUsers = async () => {
  return axios.get('/api/users')
}
</script>
"#;

const ORDERS_TS: &str = r#"import type { Order } from '../types/order'

export function updateOrder(order: Order) {
  return fetch(`/api/orders/${order.id}`, { method: 'PUT', body: JSON.stringify(order) })
}

export const removeThing = () => axios.delete('/api/things/7')
"#;

/// Ids of the seeded symbols the tests assert on.
struct Seeded {
    repo: i64,
    load_users: SymbolId,
    update_order: SymbolId,
    users_index: SymbolId,
    orders_update: SymbolId,
}

fn write_files(dir: &TempDir, files: &[(&str, &str)]) {
    for (path, content) in files {
        let full_path = dir.path().join(path);
        std::fs::create_dir_all(full_path.parent().unwrap()).unwrap();
        std::fs::write(&full_path, content).unwrap();
    }
}

/// Create the repository on disk and in the store.
fn setup_full_stack() -> (TempDir, GraphAnalyzer, Seeded) {
    let dir = TempDir::new().unwrap();
    write_files(
        &dir,
        &[
            ("src/components/UserList.vue", USER_LIST_VUE),
            ("src/api/orders.ts", ORDERS_TS),
            ("src/api/orders.spec.ts", "axios.get('/api/should-not-count')\n"),
            ("node_modules/lib/index.js", "axios.get('/api/also-ignored')\n"),
        ],
    );

    let conn = initialize_database(":memory:").unwrap();
    let store = GraphStore::from_connection(conn);
    let repo = store
        .insert_repository("shop", dir.path().to_str().unwrap())
        .unwrap();

    let vue = store.insert_file(repo, "src/components/UserList.vue").unwrap();
    let user_list = store
        .insert_symbol(&NewSymbol::new(vue, "UserList", SymbolKind::Class).exported())
        .unwrap();
    let load_users = store
        .insert_symbol(&NewSymbol::new(vue, "loadUsers", SymbolKind::Function))
        .unwrap();
    store
        .insert_component(&Component {
            id: 0,
            repository_id: repo,
            kind: "vue".into(),
            name: "UserList".into(),
            symbol_id: Some(user_list),
        })
        .unwrap();

    let orders = store.insert_file(repo, "src/api/orders.ts").unwrap();
    let update_order = store
        .insert_symbol(&NewSymbol::new(orders, "updateOrder", SymbolKind::Function).exported())
        .unwrap();
    store
        .insert_symbol(&NewSymbol::new(orders, "removeThing", SymbolKind::Variable).exported())
        .unwrap();

    let fe_types = store.insert_file(repo, "src/types/user.ts").unwrap();
    store
        .insert_symbol(
            &NewSymbol::new(fe_types, "User", SymbolKind::Interface)
                .exported()
                .signature("interface User { id: number; name: string }"),
        )
        .unwrap();

    let users_ctrl = store
        .insert_file(repo, "app/Http/Controllers/UsersController.php")
        .unwrap();
    let users_index = store
        .insert_symbol(
            &NewSymbol::new(users_ctrl, "index", SymbolKind::Method)
                .qualified("UsersController.index"),
        )
        .unwrap();
    let orders_ctrl = store
        .insert_file(repo, "app/Http/Controllers/OrdersController.php")
        .unwrap();
    let orders_update = store
        .insert_symbol(
            &NewSymbol::new(orders_ctrl, "update", SymbolKind::Method)
                .qualified("OrdersController.update"),
        )
        .unwrap();
    let model = store.insert_file(repo, "app/Models/User.php").unwrap();
    store
        .insert_symbol(
            &NewSymbol::new(model, "User", SymbolKind::Class).signature("class User extends Model"),
        )
        .unwrap();

    for (method, path, handler) in [
        ("GET", "/api/users", users_index),
        ("PUT", "/api/orders/{order}", orders_update),
    ] {
        store
            .insert_route(&Route {
                id: 0,
                repository_id: repo,
                framework: "laravel".into(),
                path: path.into(),
                method: method.into(),
                handler_symbol_id: Some(handler),
                name: None,
            })
            .unwrap();
    }

    let analyzer = GraphAnalyzer::new(store, CrossGraphConfig::default()).unwrap();
    let seeded = Seeded {
        repo,
        load_users,
        update_order,
        users_index,
        orders_update,
    };
    (dir, analyzer, seeded)
}

// ===========================================================================
// Matching and persistence
// ===========================================================================

#[test]
fn analyze_matches_calls_and_skips_excluded_files() {
    let (_dir, analyzer, s) = setup_full_stack();
    let (analysis, summary) = analyzer.analyze_cross_stack(s.repo).unwrap();

    assert_eq!(analysis.files_scanned, 2);
    assert!(analysis.failed_files.is_empty());
    assert_eq!(analysis.matched, 2);
    assert_eq!(analysis.unmatched, 1);
    assert!(!analysis.truncated);
    assert_eq!(analysis.contracts.len(), 1);
    assert_eq!(analysis.contracts[0].name, "User");

    let urls: HashSet<&str> = analysis
        .relationships
        .iter()
        .map(|r| r.call.url.as_str())
        .collect();
    assert!(!urls.contains("/api/should-not-count"));
    assert!(!urls.contains("/api/also-ignored"));

    assert_eq!(summary.api_calls_inserted, 3);
    assert_eq!(summary.contracts_written, 1);
    assert_eq!(summary.dependencies_inserted, 3);
    assert_eq!(summary.duplicates_skipped, 0);

    let calls = analyzer.store().api_calls_by_repository(s.repo).unwrap();
    let users_call = calls
        .iter()
        .find(|c| c.caller_symbol_id == s.load_users)
        .unwrap();
    assert_eq!(users_call.endpoint_symbol_id, Some(s.users_index));
    assert_eq!(users_call.http_method, "GET");
    assert_eq!(users_call.line_number, 7);

    let orders_call = calls
        .iter()
        .find(|c| c.caller_symbol_id == s.update_order)
        .unwrap();
    assert_eq!(orders_call.endpoint_symbol_id, Some(s.orders_update));
    assert_eq!(orders_call.http_method, "PUT");

    assert!(calls
        .iter()
        .any(|c| c.endpoint_symbol_id.is_none() && c.http_method == "DELETE"));
}

#[test]
fn repeated_analysis_is_idempotent() {
    let (_dir, analyzer, s) = setup_full_stack();
    let store = analyzer.store();

    let first = analyzer.build_full_stack_feature_graph(s.repo).unwrap();
    let calls = store.api_calls_by_repository(s.repo).unwrap().len();
    let deps = store.dependencies_by_repository(s.repo).unwrap().len();
    let contracts = store.data_contracts_by_repository(s.repo).unwrap().len();

    let second = analyzer.build_full_stack_feature_graph(s.repo).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.api_calls_by_repository(s.repo).unwrap().len(), calls);
    assert_eq!(store.dependencies_by_repository(s.repo).unwrap().len(), deps);
    assert_eq!(store.data_contracts_by_repository(s.repo).unwrap().len(), contracts);

    let (_, summary) = analyzer.analyze_cross_stack(s.repo).unwrap();
    assert_eq!(summary.api_calls_inserted, 0);
    assert_eq!(summary.dependencies_inserted, 0);
    assert_eq!(summary.duplicates_skipped, 6);
    assert!(analyzer.metrics().snapshot().conflicts_resolved >= 6);
}

// ===========================================================================
// Feature graph
// ===========================================================================

#[test]
fn feature_graph_clusters_by_name() {
    let (_dir, analyzer, s) = setup_full_stack();
    let graph = analyzer.build_full_stack_feature_graph(s.repo).unwrap();

    assert_eq!(graph.api_call_graph.edges.len(), 1, "only the component call has a node");
    assert_eq!(graph.data_contract_graph.edges.len(), 1);
    assert_eq!(graph.cross_stack_relationships, 2);
    assert_eq!(graph.total_features, graph.features.len());

    let user = graph.features.iter().find(|f| f.name == "User").unwrap();
    assert_eq!(user.api_call_edges, 1);
    assert_eq!(user.shared_schema_edges, 1);
    assert_eq!(user.frontend_nodes.len(), 2);
    assert_eq!(user.backend_nodes.len(), 1);

    let names: Vec<&str> = graph.features.iter().map(|f| f.name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);

    let json = serde_json::to_value(&graph).unwrap();
    assert_eq!(json["apiCallGraph"]["edges"][0]["type"], "api_call");
    assert_eq!(json["dataContractGraph"]["edges"][0]["contractName"], "User");
}

// ===========================================================================
// Traversal and impact across the stack
// ===========================================================================

#[test]
fn impact_of_backend_handler_reaches_frontend() {
    let (_dir, analyzer, s) = setup_full_stack();
    analyzer.analyze_cross_stack(s.repo).unwrap();

    let report = analyzer
        .cross_stack_impact(s.users_index, &ImpactOptions::default())
        .unwrap();
    let frontend: Vec<SymbolId> = report.frontend_impact.iter().map(|i| i.symbol_id).collect();
    assert_eq!(frontend, vec![s.load_users]);
    assert!(report.backend_impact.is_empty());
    assert_eq!(report.total_impacted_symbols, 1);
    let hop = report.cross_stack_relationships[0].api_call.as_ref().unwrap();
    assert_eq!(hop.http_method, "GET");

    let same_stack = analyzer
        .transitive_callers(s.users_index, &TraversalOptions::default())
        .unwrap();
    assert!(same_stack.results.is_empty());

    let crossing = analyzer
        .transitive_callers(s.users_index, &TraversalOptions::default().cross_stack())
        .unwrap();
    assert_eq!(crossing.results.len(), 1);
    assert_eq!(crossing.results[0].edge_evidence[0].kind, DependencyKind::ApiCall);
}

#[test]
fn impact_of_unknown_symbol_is_not_found() {
    let (_dir, analyzer, _) = setup_full_stack();
    let err = analyzer
        .cross_stack_impact(9999, &ImpactOptions::default())
        .unwrap_err();
    assert!(matches!(err, CrossGraphError::NotFound(_)));
}

#[test]
fn ranking_prefers_connected_handlers() {
    let (_dir, analyzer, s) = setup_full_stack();
    analyzer.analyze_cross_stack(s.repo).unwrap();
    let ranked = analyzer.rank_repository(s.repo, None).unwrap();
    assert!(ranked.iter().all(|r| (0.0..=1.0).contains(&r.importance_score)));
    let position = |id: SymbolId| ranked.iter().position(|r| r.symbol.id == id).unwrap();
    let orphan = ranked.iter().position(|r| r.symbol.name == "removeThing").unwrap();
    assert!(position(s.users_index) < orphan);
}
