//! Neighbor lookup seam and the in-memory adjacency index.
//!
//! [`NeighborSource`] answers "what touches this node" one node at a time.
//! [`GraphStore`](crate::graph::store::GraphStore) implements it with live
//! SQL; [`AdjacencyIndex`] loads a repository's edges once and answers from
//! hash maps. Every engine is generic over the trait, so both produce the
//! same results.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::graph::store::{merge_edges, GraphStore};
use crate::types::{ApiCall, Dependency, DependencyKind, Symbol, SymbolId, CROSS_STACK_KINDS};

// ---------------------------------------------------------------------------
// EdgeFilter
// ---------------------------------------------------------------------------

/// Restricts which dependency kinds a lookup returns.
///
/// An empty `include_kinds` admits every kind; `exclude_kinds` always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeFilter {
    pub include_kinds: Vec<DependencyKind>,
    pub exclude_kinds: Vec<DependencyKind>,
}

impl EdgeFilter {
    pub fn including(kinds: &[DependencyKind]) -> Self {
        Self {
            include_kinds: kinds.to_vec(),
            exclude_kinds: Vec::new(),
        }
    }

    pub fn excluding(kinds: &[DependencyKind]) -> Self {
        Self {
            include_kinds: Vec::new(),
            exclude_kinds: kinds.to_vec(),
        }
    }

    /// Build the filter used by same-stack traversal. Without cross-stack
    /// inclusion the API_CALL / SHARES_SCHEMA / FRONTEND_BACKEND kinds are
    /// excluded as well.
    pub fn for_traversal(
        include_kinds: &[DependencyKind],
        exclude_kinds: &[DependencyKind],
        include_cross_stack: bool,
    ) -> Self {
        let mut exclude = exclude_kinds.to_vec();
        if !include_cross_stack {
            for kind in CROSS_STACK_KINDS {
                if !exclude.contains(&kind) {
                    exclude.push(kind);
                }
            }
        }
        Self {
            include_kinds: include_kinds.to_vec(),
            exclude_kinds: exclude,
        }
    }

    pub fn allows(&self, kind: DependencyKind) -> bool {
        if self.exclude_kinds.contains(&kind) {
            return false;
        }
        self.include_kinds.is_empty() || self.include_kinds.contains(&kind)
    }
}

// ---------------------------------------------------------------------------
// NeighborSource
// ---------------------------------------------------------------------------

/// Direct-neighbor queries over the dependency graph.
///
/// Every method may fail with a store error; traversal treats a failure as
/// "no further edges from this node".
pub trait NeighborSource {
    /// Edges pointing at `id` (reverse direction).
    fn direct_callers(&self, id: SymbolId, filter: &EdgeFilter) -> Result<Vec<Dependency>>;

    /// Edges leaving `id`. With `include_api_calls`, recorded API calls from
    /// `id` to a matched endpoint are merged in as API_CALL edges.
    fn direct_dependencies(
        &self,
        id: SymbolId,
        filter: &EdgeFilter,
        include_api_calls: bool,
    ) -> Result<Vec<Dependency>>;

    /// Cross-stack edges pointing at `id`, including API calls whose
    /// endpoint is `id`.
    fn cross_stack_callers(&self, id: SymbolId) -> Result<Vec<Dependency>>;

    fn symbol(&self, id: SymbolId) -> Result<Option<Symbol>>;

    /// The recorded API call behind an API_CALL hop, if any.
    fn api_call(&self, caller: SymbolId, endpoint: SymbolId) -> Result<Option<ApiCall>>;
}

impl<T: NeighborSource + ?Sized> NeighborSource for &T {
    fn direct_callers(&self, id: SymbolId, filter: &EdgeFilter) -> Result<Vec<Dependency>> {
        (**self).direct_callers(id, filter)
    }

    fn direct_dependencies(
        &self,
        id: SymbolId,
        filter: &EdgeFilter,
        include_api_calls: bool,
    ) -> Result<Vec<Dependency>> {
        (**self).direct_dependencies(id, filter, include_api_calls)
    }

    fn cross_stack_callers(&self, id: SymbolId) -> Result<Vec<Dependency>> {
        (**self).cross_stack_callers(id)
    }

    fn symbol(&self, id: SymbolId) -> Result<Option<Symbol>> {
        (**self).symbol(id)
    }

    fn api_call(&self, caller: SymbolId, endpoint: SymbolId) -> Result<Option<ApiCall>> {
        (**self).api_call(caller, endpoint)
    }
}

// ---------------------------------------------------------------------------
// AdjacencyIndex
// ---------------------------------------------------------------------------

/// A repository's symbols and edges, indexed by symbol id.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyIndex {
    symbols: HashMap<SymbolId, Symbol>,
    /// Ids in load order, so iteration is deterministic.
    order: Vec<SymbolId>,
    forward: HashMap<SymbolId, Vec<Dependency>>,
    reverse: HashMap<SymbolId, Vec<Dependency>>,
    calls_by_caller: HashMap<SymbolId, Vec<ApiCall>>,
    calls_by_endpoint: HashMap<SymbolId, Vec<ApiCall>>,
    edge_count: usize,
}

impl AdjacencyIndex {
    /// Load every symbol, dependency and API call of a repository.
    pub fn load(store: &GraphStore, repository_id: i64) -> Result<Self> {
        let symbols = store.symbols_by_repository(repository_id)?;
        let deps = store.dependencies_by_repository(repository_id)?;
        let calls = store.api_calls_by_repository(repository_id)?;
        tracing::debug!(
            repository_id,
            symbols = symbols.len(),
            edges = deps.len(),
            api_calls = calls.len(),
            "loaded adjacency index"
        );
        Ok(Self::from_parts(symbols, deps, calls))
    }

    /// Build an index from already-fetched rows.
    pub fn from_parts(
        symbols: Vec<Symbol>,
        deps: Vec<Dependency>,
        calls: Vec<ApiCall>,
    ) -> Self {
        let mut index = Self::default();
        for sym in symbols {
            if !index.symbols.contains_key(&sym.id) {
                index.order.push(sym.id);
            }
            index.symbols.insert(sym.id, sym);
        }

        let mut seen: HashSet<Dependency> = HashSet::new();
        for dep in deps {
            if !seen.insert(dep) {
                continue;
            }
            index.forward.entry(dep.from_symbol_id).or_default().push(dep);
            index.reverse.entry(dep.to_symbol_id).or_default().push(dep);
            index.edge_count += 1;
        }

        for call in calls {
            if let Some(endpoint) = call.endpoint_symbol_id {
                index
                    .calls_by_endpoint
                    .entry(endpoint)
                    .or_default()
                    .push(call.clone());
            }
            index
                .calls_by_caller
                .entry(call.caller_symbol_id)
                .or_default()
                .push(call);
        }
        index
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn get_symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    /// Symbol ids in load order.
    pub fn symbol_ids(&self) -> &[SymbolId] {
        &self.order
    }

    /// Outgoing edges of `id`, unfiltered.
    pub fn outgoing(&self, id: SymbolId) -> &[Dependency] {
        self.forward.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming edges of `id`, unfiltered.
    pub fn incoming(&self, id: SymbolId) -> &[Dependency] {
        self.reverse.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every node that appears as a symbol or an edge endpoint, in a stable
    /// order: loaded symbols first, then dangling endpoints by id.
    pub fn all_node_ids(&self) -> Vec<SymbolId> {
        let mut ids = self.order.clone();
        let known: HashSet<SymbolId> = ids.iter().copied().collect();
        let mut dangling: Vec<SymbolId> = self
            .forward
            .keys()
            .chain(self.reverse.keys())
            .copied()
            .filter(|id| !known.contains(id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        dangling.sort_unstable();
        ids.extend(dangling);
        ids
    }

    /// Strongly connected components with two or more members, i.e. the
    /// repository's dependency cycles. Each component's ids are sorted and
    /// components are ordered by their smallest id.
    pub fn strongly_connected_cycles(&self) -> Vec<Vec<SymbolId>> {
        let nodes = self.all_node_ids();
        let mut index_of: HashMap<SymbolId, usize> = HashMap::new();
        let mut lowlink: HashMap<SymbolId, usize> = HashMap::new();
        let mut on_stack: HashSet<SymbolId> = HashSet::new();
        let mut stack: Vec<SymbolId> = Vec::new();
        let mut next_index = 0usize;
        let mut sccs: Vec<Vec<SymbolId>> = Vec::new();

        // Iterative Tarjan: each frame is (node, position in its edge list).
        for &root in &nodes {
            if index_of.contains_key(&root) {
                continue;
            }
            let mut frames: Vec<(SymbolId, usize)> = vec![(root, 0)];
            index_of.insert(root, next_index);
            lowlink.insert(root, next_index);
            next_index += 1;
            stack.push(root);
            on_stack.insert(root);

            while let Some(frame) = frames.last_mut() {
                let v = frame.0;
                let edges = self.outgoing(v);
                if frame.1 < edges.len() {
                    let w = edges[frame.1].to_symbol_id;
                    frame.1 += 1;
                    if !index_of.contains_key(&w) {
                        index_of.insert(w, next_index);
                        lowlink.insert(w, next_index);
                        next_index += 1;
                        stack.push(w);
                        on_stack.insert(w);
                        frames.push((w, 0));
                    } else if on_stack.contains(&w) {
                        let w_index = index_of[&w];
                        let v_low = lowlink.entry(v).or_insert(w_index);
                        *v_low = (*v_low).min(w_index);
                    }
                    continue;
                }

                frames.pop();
                let v_low = lowlink[&v];
                if let Some(&(parent, _)) = frames.last() {
                    let p_low = lowlink.entry(parent).or_insert(v_low);
                    *p_low = (*p_low).min(v_low);
                }
                if v_low == index_of[&v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack.remove(&w);
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    if component.len() >= 2 {
                        component.sort_unstable();
                        sccs.push(component);
                    }
                }
            }
        }

        sccs.sort_by_key(|c| c[0]);
        sccs
    }

    fn api_call_edges<'a>(calls: &'a [ApiCall]) -> impl Iterator<Item = Dependency> + 'a {
        calls.iter().filter_map(|call| {
            call.endpoint_symbol_id.map(|endpoint| {
                Dependency::new(
                    call.caller_symbol_id,
                    endpoint,
                    DependencyKind::ApiCall,
                    Some(call.line_number),
                )
            })
        })
    }
}

impl NeighborSource for AdjacencyIndex {
    fn direct_callers(&self, id: SymbolId, filter: &EdgeFilter) -> Result<Vec<Dependency>> {
        Ok(self
            .incoming(id)
            .iter()
            .filter(|d| filter.allows(d.kind))
            .copied()
            .collect())
    }

    fn direct_dependencies(
        &self,
        id: SymbolId,
        filter: &EdgeFilter,
        include_api_calls: bool,
    ) -> Result<Vec<Dependency>> {
        let mut edges: Vec<Dependency> = self
            .outgoing(id)
            .iter()
            .filter(|d| filter.allows(d.kind))
            .copied()
            .collect();
        if include_api_calls {
            if let Some(calls) = self.calls_by_caller.get(&id) {
                merge_edges(&mut edges, Self::api_call_edges(calls));
            }
        }
        Ok(edges)
    }

    fn cross_stack_callers(&self, id: SymbolId) -> Result<Vec<Dependency>> {
        let mut edges: Vec<Dependency> = self
            .incoming(id)
            .iter()
            .filter(|d| d.kind.is_cross_stack())
            .copied()
            .collect();
        if let Some(calls) = self.calls_by_endpoint.get(&id) {
            merge_edges(&mut edges, Self::api_call_edges(calls));
        }
        Ok(edges)
    }

    fn symbol(&self, id: SymbolId) -> Result<Option<Symbol>> {
        Ok(self.symbols.get(&id).cloned())
    }

    fn api_call(&self, caller: SymbolId, endpoint: SymbolId) -> Result<Option<ApiCall>> {
        Ok(self.calls_by_caller.get(&caller).and_then(|calls| {
            calls
                .iter()
                .find(|c| c.endpoint_symbol_id == Some(endpoint))
                .cloned()
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::initialize_database;
    use crate::graph::store::NewSymbol;
    use crate::types::SymbolKind;

    fn edge(from: SymbolId, to: SymbolId) -> Dependency {
        Dependency::new(from, to, DependencyKind::Calls, None)
    }

    fn index_of(edges: &[(SymbolId, SymbolId)]) -> AdjacencyIndex {
        AdjacencyIndex::from_parts(
            Vec::new(),
            edges.iter().map(|&(a, b)| edge(a, b)).collect(),
            Vec::new(),
        )
    }

    #[test]
    fn filter_semantics() {
        let all = EdgeFilter::default();
        assert!(all.allows(DependencyKind::Calls));
        assert!(all.allows(DependencyKind::ApiCall));

        let only_calls = EdgeFilter::including(&[DependencyKind::Calls]);
        assert!(only_calls.allows(DependencyKind::Calls));
        assert!(!only_calls.allows(DependencyKind::Imports));

        let mut both = only_calls.clone();
        both.exclude_kinds.push(DependencyKind::Calls);
        assert!(!both.allows(DependencyKind::Calls));

        let same_stack = EdgeFilter::for_traversal(&[], &[], false);
        assert!(same_stack.allows(DependencyKind::Calls));
        for kind in CROSS_STACK_KINDS {
            assert!(!same_stack.allows(kind));
        }
        let cross = EdgeFilter::for_traversal(&[], &[], true);
        assert!(cross.allows(DependencyKind::SharesSchema));
    }

    #[test]
    fn duplicate_edges_are_collapsed() {
        let index = index_of(&[(1, 2), (1, 2), (2, 3)]);
        assert_eq!(index.edge_count(), 2);
        assert_eq!(index.outgoing(1).len(), 1);
        assert_eq!(index.incoming(3).len(), 1);
        assert!(index.outgoing(99).is_empty());
    }

    #[test]
    fn scc_finds_cycles() {
        let index = index_of(&[(1, 2), (2, 3), (3, 1), (3, 4), (5, 6), (6, 5), (7, 7)]);
        let cycles = index.strongly_connected_cycles();
        assert_eq!(cycles, vec![vec![1, 2, 3], vec![5, 6]]);
    }

    #[test]
    fn scc_empty_for_dag() {
        let index = index_of(&[(1, 2), (1, 3), (2, 4), (3, 4)]);
        assert!(index.strongly_connected_cycles().is_empty());
        assert!(AdjacencyIndex::default().strongly_connected_cycles().is_empty());
    }

    #[test]
    fn scc_handles_long_chain_without_recursion() {
        let n = 50_000;
        let mut edges: Vec<(SymbolId, SymbolId)> = (1..n).map(|i| (i, i + 1)).collect();
        edges.push((n, 1));
        let cycles = index_of(&edges).strongly_connected_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), n as usize);
    }

    #[test]
    fn load_matches_store_answers() {
        let conn = initialize_database(":memory:").unwrap();
        let store = GraphStore::from_connection(conn);
        let repo = store.insert_repository("r", "/r").unwrap();
        let fe = store.insert_file(repo, "src/users.ts").unwrap();
        let be = store.insert_file(repo, "app/UsersController.php").unwrap();
        let a = store
            .insert_symbol(&NewSymbol::new(fe, "loadUsers", SymbolKind::Function))
            .unwrap();
        let b = store.insert_symbol(&NewSymbol::new(fe, "request", SymbolKind::Function)).unwrap();
        let h = store.insert_symbol(&NewSymbol::new(be, "index", SymbolKind::Method)).unwrap();
        store.insert_dependency(&edge(a, b)).unwrap();
        store
            .insert_api_call(&ApiCall {
                id: 0,
                repository_id: repo,
                caller_symbol_id: b,
                endpoint_symbol_id: Some(h),
                http_method: "GET".into(),
                endpoint_path: "/api/users".into(),
                line_number: 3,
            })
            .unwrap();

        let index = AdjacencyIndex::load(&store, repo).unwrap();
        assert_eq!(index.symbol_count(), 3);
        assert_eq!(index.symbol_ids(), &[a, b, h]);

        let filter = EdgeFilter::default();
        for id in [a, b, h] {
            assert_eq!(
                index.direct_dependencies(id, &filter, true).unwrap(),
                store.direct_dependencies(id, &filter, true).unwrap()
            );
            assert_eq!(
                index.direct_callers(id, &filter).unwrap(),
                store.direct_callers(id, &filter).unwrap()
            );
            assert_eq!(
                index.cross_stack_callers(id).unwrap(),
                store.cross_stack_callers(id).unwrap()
            );
        }
        assert_eq!(index.api_call(b, h).unwrap().map(|c| c.line_number), Some(3));
        assert!(index.api_call(a, h).unwrap().is_none());
    }
}
