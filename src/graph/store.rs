//! SQLite CRUD layer for the crossgraph store.
//!
//! Every query goes through [`Connection::prepare_cached`]; batch writes
//! run inside a single `unchecked_transaction`. The store also implements
//! [`NeighborSource`], answering one node's adjacency per call.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::converters::{
    row_to_api_call, row_to_component, row_to_data_contract, row_to_dependency, row_to_file,
    row_to_repository, row_to_route, row_to_symbol, SYMBOL_COLUMNS,
};
use crate::db::schema::initialize_database;
use crate::error::{CrossGraphError, Result};
use crate::graph::adjacency::{EdgeFilter, NeighborSource};
use crate::types::{
    ApiCall, Component, DataContract, Dependency, DependencyKind, FileRecord, Language, Repository,
    Route, Symbol, SymbolId, SymbolKind,
};

// ---------------------------------------------------------------------------
// NewSymbol
// ---------------------------------------------------------------------------

/// Insert payload for a symbol row; the id is assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSymbol {
    pub file_id: i64,
    pub name: String,
    pub qualified_name: Option<String>,
    pub kind: SymbolKind,
    pub exported: bool,
    pub signature: Option<String>,
    pub description: Option<String>,
}

impl NewSymbol {
    pub fn new(file_id: i64, name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            file_id,
            name: name.into(),
            qualified_name: None,
            kind,
            exported: false,
            signature: None,
            description: None,
        }
    }

    pub fn qualified(mut self, qualified_name: impl Into<String>) -> Self {
        self.qualified_name = Some(qualified_name.into());
        self
    }

    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

// ---------------------------------------------------------------------------
// GraphStore
// ---------------------------------------------------------------------------

/// Typed CRUD wrapper around the crossgraph SQLite database.
pub struct GraphStore {
    pub conn: Connection,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

const INSERT_DEPENDENCY_SQL: &str = "\
INSERT OR IGNORE INTO dependencies (from_symbol_id, to_symbol_id, kind, line_number)
VALUES (?1, ?2, ?3, ?4)";

const INSERT_OR_IGNORE_API_CALL_SQL: &str = "\
INSERT OR IGNORE INTO api_calls
  (repository_id, caller_symbol_id, endpoint_symbol_id, http_method, endpoint_path, line_number)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const INSERT_API_CALL_SQL: &str = "\
INSERT INTO api_calls
  (repository_id, caller_symbol_id, endpoint_symbol_id, http_method, endpoint_path, line_number)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const FIND_API_CALL_SQL: &str = "\
SELECT * FROM api_calls
WHERE caller_symbol_id = ?1
  AND IFNULL(endpoint_symbol_id, 0) = IFNULL(?2, 0)
  AND line_number = ?3
  AND http_method = ?4
  AND endpoint_path = ?5";

const UPSERT_DATA_CONTRACT_SQL: &str = "\
INSERT INTO data_contracts
  (repository_id, frontend_type_id, backend_type_id, name, drift_detected, schema_definition)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(frontend_type_id, backend_type_id, name) DO UPDATE SET
  schema_definition = excluded.schema_definition,
  drift_detected = excluded.drift_detected";

const INSERT_DATA_CONTRACT_SQL: &str = "\
INSERT INTO data_contracts
  (repository_id, frontend_type_id, backend_type_id, name, drift_detected, schema_definition)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const FIND_DATA_CONTRACT_SQL: &str = "\
SELECT * FROM data_contracts
WHERE frontend_type_id = ?1 AND backend_type_id = ?2 AND name = ?3";

const DEPENDENCIES_BY_REPOSITORY_SQL: &str = "\
SELECT d.* FROM dependencies d
JOIN symbols s ON s.id = d.from_symbol_id
JOIN files f ON f.id = s.file_id
WHERE f.repository_id = ?1
ORDER BY d.id";

fn symbol_query(where_clause: &str) -> String {
    format!(
        "SELECT {SYMBOL_COLUMNS} FROM symbols s JOIN files f ON f.id = s.file_id {where_clause}"
    )
}

/// Collect a row iterator into a `Vec`, converting the error type.
fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl GraphStore {
    /// Open (or create) the database at `db_path`, apply the schema, and
    /// return a ready-to-use store.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = initialize_database(db_path)?;
        Ok(Self { conn })
    }

    /// Wrap an already-open connection whose schema has been applied.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    // -------------------------------------------------------------------
    // Repositories and files
    // -------------------------------------------------------------------

    pub fn insert_repository(&self, name: &str, root_path: &str) -> Result<i64> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO repositories (name, root_path) VALUES (?1, ?2)")?;
        stmt.execute(params![name, root_path])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn repository(&self, id: i64) -> Result<Option<Repository>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM repositories WHERE id = ?1")?;
        stmt.query_row(params![id], row_to_repository)
            .optional()
            .map_err(Into::into)
    }

    /// Like [`repository`](Self::repository) but a missing row is an error.
    pub fn require_repository(&self, id: i64) -> Result<Repository> {
        self.repository(id)?
            .ok_or_else(|| CrossGraphError::NotFound(format!("repository {id}")))
    }

    /// Register a file; re-registering the same path returns the existing id.
    pub fn insert_file(&self, repository_id: i64, path: &str) -> Result<i64> {
        let language = Language::from_path(path).map(|l| l.as_str());
        let mut insert = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO files (repository_id, path, language) VALUES (?1, ?2, ?3)",
        )?;
        insert.execute(params![repository_id, path, language])?;
        let mut select = self
            .conn
            .prepare_cached("SELECT id FROM files WHERE repository_id = ?1 AND path = ?2")?;
        let id: i64 = select.query_row(params![repository_id, path], |row| row.get(0))?;
        Ok(id)
    }

    pub fn files_by_repository(&self, repository_id: i64) -> Result<Vec<FileRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM files WHERE repository_id = ?1 ORDER BY path")?;
        let rows = stmt.query_and_then(params![repository_id], row_to_file)?;
        collect_rows(rows)
    }

    // -------------------------------------------------------------------
    // Symbols
    // -------------------------------------------------------------------

    pub fn insert_symbol(&self, symbol: &NewSymbol) -> Result<SymbolId> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO symbols
               (file_id, name, qualified_name, kind, exported, signature, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        stmt.execute(params![
            symbol.file_id,
            symbol.name,
            symbol.qualified_name,
            symbol.kind.as_str(),
            symbol.exported as i32,
            symbol.signature,
            symbol.description,
        ])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn symbol_by_id(&self, id: SymbolId) -> Result<Option<Symbol>> {
        let mut stmt = self.conn.prepare_cached(&symbol_query("WHERE s.id = ?1"))?;
        stmt.query_row(params![id], row_to_symbol)
            .optional()
            .map_err(Into::into)
    }

    /// Repository owning a symbol's file.
    pub fn repository_of_symbol(&self, id: SymbolId) -> Result<Option<i64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT f.repository_id FROM symbols s JOIN files f ON f.id = s.file_id
             WHERE s.id = ?1",
        )?;
        stmt.query_row(params![id], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    pub fn symbols_by_repository(&self, repository_id: i64) -> Result<Vec<Symbol>> {
        let mut stmt = self
            .conn
            .prepare_cached(&symbol_query("WHERE f.repository_id = ?1 ORDER BY s.id"))?;
        let rows = stmt.query_and_then(params![repository_id], row_to_symbol)?;
        collect_rows(rows)
    }

    pub fn symbols_by_kind(&self, repository_id: i64, kind: SymbolKind) -> Result<Vec<Symbol>> {
        let mut stmt = self.conn.prepare_cached(&symbol_query(
            "WHERE f.repository_id = ?1 AND s.kind = ?2 ORDER BY s.id",
        ))?;
        let rows = stmt.query_and_then(params![repository_id, kind.as_str()], row_to_symbol)?;
        collect_rows(rows)
    }

    /// Symbols declared in the file at `path` (relative to the repository root).
    pub fn symbols_in_file(&self, repository_id: i64, path: &str) -> Result<Vec<Symbol>> {
        let mut stmt = self.conn.prepare_cached(&symbol_query(
            "WHERE f.repository_id = ?1 AND f.path = ?2 ORDER BY s.id",
        ))?;
        let rows = stmt.query_and_then(params![repository_id, path], row_to_symbol)?;
        collect_rows(rows)
    }

    // -------------------------------------------------------------------
    // Routes and components
    // -------------------------------------------------------------------

    /// Insert a route; `route.id` is ignored and the new id returned.
    pub fn insert_route(&self, route: &Route) -> Result<i64> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO routes (repository_id, framework, path, method, handler_symbol_id, name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        stmt.execute(params![
            route.repository_id,
            route.framework,
            route.path,
            route.method,
            route.handler_symbol_id,
            route.name,
        ])?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Routes of a repository, optionally restricted to one framework.
    pub fn routes_by_repository(
        &self,
        repository_id: i64,
        framework: Option<&str>,
    ) -> Result<Vec<Route>> {
        match framework {
            Some(fw) => {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT * FROM routes WHERE repository_id = ?1 AND framework = ?2 ORDER BY id",
                )?;
                let rows = stmt.query_and_then(params![repository_id, fw], row_to_route)?;
                collect_rows(rows)
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare_cached("SELECT * FROM routes WHERE repository_id = ?1 ORDER BY id")?;
                let rows = stmt.query_and_then(params![repository_id], row_to_route)?;
                collect_rows(rows)
            }
        }
    }

    /// Insert a component; `component.id` is ignored and the new id returned.
    pub fn insert_component(&self, component: &Component) -> Result<i64> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO components (repository_id, kind, name, symbol_id) VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![
            component.repository_id,
            component.kind,
            component.name,
            component.symbol_id,
        ])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn components_by_kind(&self, repository_id: i64, kind: &str) -> Result<Vec<Component>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT * FROM components WHERE repository_id = ?1 AND kind = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_and_then(params![repository_id, kind], row_to_component)?;
        collect_rows(rows)
    }

    // -------------------------------------------------------------------
    // Dependencies
    // -------------------------------------------------------------------

    /// Insert one edge. Returns `false` when the identical edge already exists.
    pub fn insert_dependency(&self, dep: &Dependency) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(INSERT_DEPENDENCY_SQL)?;
        let changed = stmt.execute(params![
            dep.from_symbol_id,
            dep.to_symbol_id,
            dep.kind.as_str(),
            dep.line_number,
        ])?;
        Ok(changed > 0)
    }

    /// Batch-insert edges, ignoring ones already present. Returns the
    /// number of new rows.
    pub fn upsert_dependencies(&self, deps: &[Dependency]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT_DEPENDENCY_SQL)?;
            for dep in deps {
                inserted += stmt.execute(params![
                    dep.from_symbol_id,
                    dep.to_symbol_id,
                    dep.kind.as_str(),
                    dep.line_number,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn dependencies_from(&self, symbol_id: SymbolId) -> Result<Vec<Dependency>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM dependencies WHERE from_symbol_id = ?1 ORDER BY id")?;
        let rows = stmt.query_and_then(params![symbol_id], row_to_dependency)?;
        collect_rows(rows)
    }

    pub fn dependencies_to(&self, symbol_id: SymbolId) -> Result<Vec<Dependency>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM dependencies WHERE to_symbol_id = ?1 ORDER BY id")?;
        let rows = stmt.query_and_then(params![symbol_id], row_to_dependency)?;
        collect_rows(rows)
    }

    /// Every edge whose source symbol belongs to the repository.
    pub fn dependencies_by_repository(&self, repository_id: i64) -> Result<Vec<Dependency>> {
        let mut stmt = self.conn.prepare_cached(DEPENDENCIES_BY_REPOSITORY_SQL)?;
        let rows = stmt.query_and_then(params![repository_id], row_to_dependency)?;
        collect_rows(rows)
    }

    // -------------------------------------------------------------------
    // API calls
    // -------------------------------------------------------------------

    pub fn api_calls_by_repository(&self, repository_id: i64) -> Result<Vec<ApiCall>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM api_calls WHERE repository_id = ?1 ORDER BY id")?;
        let rows = stmt.query_and_then(params![repository_id], row_to_api_call)?;
        collect_rows(rows)
    }

    pub fn api_calls_by_caller(&self, caller_id: SymbolId) -> Result<Vec<ApiCall>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM api_calls WHERE caller_symbol_id = ?1 ORDER BY id")?;
        let rows = stmt.query_and_then(params![caller_id], row_to_api_call)?;
        collect_rows(rows)
    }

    pub fn api_calls_by_endpoint(&self, endpoint_id: SymbolId) -> Result<Vec<ApiCall>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM api_calls WHERE endpoint_symbol_id = ?1 ORDER BY id")?;
        let rows = stmt.query_and_then(params![endpoint_id], row_to_api_call)?;
        collect_rows(rows)
    }

    /// First recorded call from `caller_id` to `endpoint_id`, if any.
    pub fn api_call_between(
        &self,
        caller_id: SymbolId,
        endpoint_id: SymbolId,
    ) -> Result<Option<ApiCall>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT * FROM api_calls WHERE caller_symbol_id = ?1 AND endpoint_symbol_id = ?2
             ORDER BY id LIMIT 1",
        )?;
        stmt.query_row(params![caller_id, endpoint_id], row_to_api_call)
            .optional()
            .map_err(Into::into)
    }

    /// Batch-insert API calls, ignoring natural-key duplicates. Returns the
    /// number of new rows.
    pub fn upsert_api_calls(&self, calls: &[ApiCall]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT_OR_IGNORE_API_CALL_SQL)?;
            for call in calls {
                inserted += stmt.execute(params![
                    call.repository_id,
                    call.caller_symbol_id,
                    call.endpoint_symbol_id,
                    call.http_method,
                    call.endpoint_path,
                    call.line_number,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Insert one API call. A duplicate-key violation means another
    /// analysis already stored it; the existing row is returned instead.
    pub fn insert_api_call(&self, call: &ApiCall) -> Result<ApiCall> {
        let result = self
            .conn
            .prepare_cached(INSERT_API_CALL_SQL)
            .and_then(|mut stmt| {
                stmt.execute(params![
                    call.repository_id,
                    call.caller_symbol_id,
                    call.endpoint_symbol_id,
                    call.http_method,
                    call.endpoint_path,
                    call.line_number,
                ])
            })
            .map_err(CrossGraphError::from);

        match result {
            Ok(_) => Ok(ApiCall {
                id: self.conn.last_insert_rowid(),
                ..call.clone()
            }),
            Err(e) if e.is_unique_violation() => {
                tracing::debug!(
                    caller = call.caller_symbol_id,
                    path = %call.endpoint_path,
                    "api call already stored, returning existing row"
                );
                self.find_api_call(call)?.ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    fn find_api_call(&self, call: &ApiCall) -> Result<Option<ApiCall>> {
        let mut stmt = self.conn.prepare_cached(FIND_API_CALL_SQL)?;
        stmt.query_row(
            params![
                call.caller_symbol_id,
                call.endpoint_symbol_id,
                call.line_number,
                call.http_method,
                call.endpoint_path,
            ],
            row_to_api_call,
        )
        .optional()
        .map_err(Into::into)
    }

    // -------------------------------------------------------------------
    // Data contracts
    // -------------------------------------------------------------------

    pub fn data_contracts_by_repository(&self, repository_id: i64) -> Result<Vec<DataContract>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM data_contracts WHERE repository_id = ?1 ORDER BY id")?;
        let rows = stmt.query_and_then(params![repository_id], row_to_data_contract)?;
        collect_rows(rows)
    }

    /// Contracts in which `symbol_id` is either the frontend or backend type.
    pub fn data_contracts_by_symbol(&self, symbol_id: SymbolId) -> Result<Vec<DataContract>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT * FROM data_contracts
             WHERE frontend_type_id = ?1 OR backend_type_id = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_and_then(params![symbol_id], row_to_data_contract)?;
        collect_rows(rows)
    }

    /// Batch-upsert contracts; an existing (frontend, backend, name) row
    /// has its schema definition and drift flag replaced.
    pub fn upsert_data_contracts(&self, contracts: &[DataContract]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(UPSERT_DATA_CONTRACT_SQL)?;
            for c in contracts {
                written += stmt.execute(params![
                    c.repository_id,
                    c.frontend_type_id,
                    c.backend_type_id,
                    c.name,
                    c.drift_detected as i32,
                    c.schema_definition,
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Insert one contract, returning the existing row on a duplicate key.
    pub fn insert_data_contract(&self, contract: &DataContract) -> Result<DataContract> {
        let result = self
            .conn
            .prepare_cached(INSERT_DATA_CONTRACT_SQL)
            .and_then(|mut stmt| {
                stmt.execute(params![
                    contract.repository_id,
                    contract.frontend_type_id,
                    contract.backend_type_id,
                    contract.name,
                    contract.drift_detected as i32,
                    contract.schema_definition,
                ])
            })
            .map_err(CrossGraphError::from);

        match result {
            Ok(_) => Ok(DataContract {
                id: self.conn.last_insert_rowid(),
                ..contract.clone()
            }),
            Err(e) if e.is_unique_violation() => {
                tracing::debug!(name = %contract.name, "data contract already stored");
                let mut stmt = self.conn.prepare_cached(FIND_DATA_CONTRACT_SQL)?;
                stmt.query_row(
                    params![contract.frontend_type_id, contract.backend_type_id, contract.name],
                    row_to_data_contract,
                )
                .optional()?
                .ok_or(e)
            }
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// NeighborSource: live per-node queries
// ---------------------------------------------------------------------------

fn api_call_edge(call: &ApiCall) -> Option<Dependency> {
    call.endpoint_symbol_id.map(|endpoint| {
        Dependency::new(
            call.caller_symbol_id,
            endpoint,
            DependencyKind::ApiCall,
            Some(call.line_number),
        )
    })
}

/// Append `extra` edges to `edges`, skipping any (from, to, kind) already present.
pub(crate) fn merge_edges(
    edges: &mut Vec<Dependency>,
    extra: impl IntoIterator<Item = Dependency>,
) {
    let mut seen: HashSet<(SymbolId, SymbolId, DependencyKind)> = edges
        .iter()
        .map(|d| (d.from_symbol_id, d.to_symbol_id, d.kind))
        .collect();
    for dep in extra {
        if seen.insert((dep.from_symbol_id, dep.to_symbol_id, dep.kind)) {
            edges.push(dep);
        }
    }
}

impl NeighborSource for GraphStore {
    fn direct_callers(&self, id: SymbolId, filter: &EdgeFilter) -> Result<Vec<Dependency>> {
        Ok(self
            .dependencies_to(id)?
            .into_iter()
            .filter(|d| filter.allows(d.kind))
            .collect())
    }

    fn direct_dependencies(
        &self,
        id: SymbolId,
        filter: &EdgeFilter,
        include_api_calls: bool,
    ) -> Result<Vec<Dependency>> {
        let mut edges: Vec<Dependency> = self
            .dependencies_from(id)?
            .into_iter()
            .filter(|d| filter.allows(d.kind))
            .collect();
        if include_api_calls {
            let calls = self.api_calls_by_caller(id)?;
            merge_edges(&mut edges, calls.iter().filter_map(api_call_edge));
        }
        Ok(edges)
    }

    fn cross_stack_callers(&self, id: SymbolId) -> Result<Vec<Dependency>> {
        let mut edges: Vec<Dependency> = self
            .dependencies_to(id)?
            .into_iter()
            .filter(|d| d.kind.is_cross_stack())
            .collect();
        let calls = self.api_calls_by_endpoint(id)?;
        merge_edges(&mut edges, calls.iter().filter_map(api_call_edge));
        Ok(edges)
    }

    fn symbol(&self, id: SymbolId) -> Result<Option<Symbol>> {
        self.symbol_by_id(id)
    }

    fn api_call(&self, caller: SymbolId, endpoint: SymbolId) -> Result<Option<ApiCall>> {
        self.api_call_between(caller, endpoint)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Spin up an in-memory store with the full schema applied.
    fn setup() -> GraphStore {
        let conn = initialize_database(":memory:").expect("schema init should succeed on :memory:");
        GraphStore::from_connection(conn)
    }

    /// Repository with one frontend and one backend file.
    fn seed_repo(store: &GraphStore) -> (i64, i64, i64) {
        let repo = store.insert_repository("shop", "/srv/shop").unwrap();
        let fe = store.insert_file(repo, "src/api/users.ts").unwrap();
        let be = store.insert_file(repo, "app/Http/UsersController.php").unwrap();
        (repo, fe, be)
    }

    fn make_call(repo: i64, caller: SymbolId, endpoint: Option<SymbolId>, line: u32) -> ApiCall {
        ApiCall {
            id: 0,
            repository_id: repo,
            caller_symbol_id: caller,
            endpoint_symbol_id: endpoint,
            http_method: "GET".into(),
            endpoint_path: "/api/users".into(),
            line_number: line,
        }
    }

    fn make_contract(repo: i64, fe: SymbolId, be: SymbolId, schema: &str) -> DataContract {
        DataContract {
            id: 0,
            repository_id: repo,
            frontend_type_id: fe,
            backend_type_id: be,
            name: "User".into(),
            drift_detected: false,
            schema_definition: Some(schema.into()),
        }
    }

    #[test]
    fn insert_and_read_symbol() {
        let store = setup();
        let (repo, fe, _) = seed_repo(&store);
        let id = store
            .insert_symbol(
                &NewSymbol::new(fe, "fetchUsers", SymbolKind::Function)
                    .exported()
                    .signature("export async function fetchUsers()"),
            )
            .unwrap();

        let sym = store.symbol_by_id(id).unwrap().expect("symbol should exist");
        assert_eq!(sym.name, "fetchUsers");
        assert_eq!(sym.kind, SymbolKind::Function);
        assert_eq!(sym.file_path, "src/api/users.ts");
        assert!(sym.exported);
        assert_eq!(sym.language(), Some(Language::TypeScript));

        assert_eq!(store.symbols_by_repository(repo).unwrap().len(), 1);
        assert_eq!(store.symbols_by_kind(repo, SymbolKind::Function).unwrap().len(), 1);
        assert!(store.symbols_by_kind(repo, SymbolKind::Class).unwrap().is_empty());
        assert_eq!(store.symbols_in_file(repo, "src/api/users.ts").unwrap().len(), 1);
    }

    #[test]
    fn missing_symbol_is_none() {
        let store = setup();
        assert!(store.symbol_by_id(999).unwrap().is_none());
        assert!(store.repository_of_symbol(999).unwrap().is_none());
    }

    #[test]
    fn repository_of_symbol_follows_file() {
        let store = setup();
        let (repo, _, be) = seed_repo(&store);
        let id = store
            .insert_symbol(&NewSymbol::new(be, "index", SymbolKind::Method))
            .unwrap();
        assert_eq!(store.repository_of_symbol(id).unwrap(), Some(repo));
    }

    #[test]
    fn insert_file_is_idempotent() {
        let store = setup();
        let repo = store.insert_repository("r", "/r").unwrap();
        let a = store.insert_file(repo, "src/a.ts").unwrap();
        let b = store.insert_file(repo, "src/a.ts").unwrap();
        assert_eq!(a, b);
        let files = store.files_by_repository(repo).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].language, Some(Language::TypeScript));
    }

    #[test]
    fn require_repository_reports_not_found() {
        let store = setup();
        let err = store.require_repository(42).unwrap_err();
        assert!(matches!(err, CrossGraphError::NotFound(_)));
    }

    #[test]
    fn dependency_duplicates_do_not_accumulate() {
        let store = setup();
        let (_, fe, _) = seed_repo(&store);
        let a = store.insert_symbol(&NewSymbol::new(fe, "a", SymbolKind::Function)).unwrap();
        let b = store.insert_symbol(&NewSymbol::new(fe, "b", SymbolKind::Function)).unwrap();

        let edge = Dependency::new(a, b, DependencyKind::Calls, None);
        assert!(store.insert_dependency(&edge).unwrap());
        assert!(!store.insert_dependency(&edge).unwrap());

        let batch = vec![
            edge,
            Dependency::new(a, b, DependencyKind::Calls, Some(3)),
            Dependency::new(a, b, DependencyKind::Imports, None),
        ];
        assert_eq!(store.upsert_dependencies(&batch).unwrap(), 2);
        assert_eq!(store.upsert_dependencies(&batch).unwrap(), 0);
        assert_eq!(store.dependencies_from(a).unwrap().len(), 3);
        assert_eq!(store.dependencies_to(b).unwrap().len(), 3);
    }

    #[test]
    fn dependencies_by_repository_scopes_to_repo() {
        let store = setup();
        let (repo, fe, _) = seed_repo(&store);
        let other = store.insert_repository("other", "/o").unwrap();
        let of = store.insert_file(other, "x.ts").unwrap();

        let a = store.insert_symbol(&NewSymbol::new(fe, "a", SymbolKind::Function)).unwrap();
        let b = store.insert_symbol(&NewSymbol::new(fe, "b", SymbolKind::Function)).unwrap();
        let x = store.insert_symbol(&NewSymbol::new(of, "x", SymbolKind::Function)).unwrap();
        store.insert_dependency(&Dependency::new(a, b, DependencyKind::Calls, None)).unwrap();
        store.insert_dependency(&Dependency::new(x, a, DependencyKind::Calls, None)).unwrap();

        let deps = store.dependencies_by_repository(repo).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].from_symbol_id, a);
    }

    #[test]
    fn upsert_api_calls_ignores_duplicates() {
        let store = setup();
        let (repo, fe, be) = seed_repo(&store);
        let caller = store
            .insert_symbol(&NewSymbol::new(fe, "fetchUsers", SymbolKind::Function))
            .unwrap();
        let handler = store
            .insert_symbol(&NewSymbol::new(be, "index", SymbolKind::Method))
            .unwrap();

        let calls = vec![
            make_call(repo, caller, Some(handler), 4),
            make_call(repo, caller, None, 9),
        ];
        assert_eq!(store.upsert_api_calls(&calls).unwrap(), 2);
        assert_eq!(store.upsert_api_calls(&calls).unwrap(), 0);
        assert_eq!(store.api_calls_by_repository(repo).unwrap().len(), 2);
        assert_eq!(store.api_calls_by_endpoint(handler).unwrap().len(), 1);
        assert!(store.api_call_between(caller, handler).unwrap().is_some());
    }

    #[test]
    fn insert_api_call_returns_existing_row_on_conflict() {
        let store = setup();
        let (repo, fe, be) = seed_repo(&store);
        let caller = store
            .insert_symbol(&NewSymbol::new(fe, "fetchUsers", SymbolKind::Function))
            .unwrap();
        let handler = store
            .insert_symbol(&NewSymbol::new(be, "index", SymbolKind::Method))
            .unwrap();

        let first = store.insert_api_call(&make_call(repo, caller, Some(handler), 4)).unwrap();
        assert!(first.id > 0);
        let second = store.insert_api_call(&make_call(repo, caller, Some(handler), 4)).unwrap();
        assert_eq!(first, second);

        // Unmatched calls (NULL endpoint) also hit the natural key.
        let a = store.insert_api_call(&make_call(repo, caller, None, 12)).unwrap();
        let b = store.insert_api_call(&make_call(repo, caller, None, 12)).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(store.api_calls_by_repository(repo).unwrap().len(), 2);
    }

    #[test]
    fn upsert_data_contracts_merges_schema() {
        let store = setup();
        let (repo, fe, be) = seed_repo(&store);
        let t1 = store.insert_symbol(&NewSymbol::new(fe, "User", SymbolKind::Interface)).unwrap();
        let t2 = store.insert_symbol(&NewSymbol::new(be, "User", SymbolKind::Class)).unwrap();

        store.upsert_data_contracts(&[make_contract(repo, t1, t2, "v1")]).unwrap();
        let mut updated = make_contract(repo, t1, t2, "v2");
        updated.drift_detected = true;
        store.upsert_data_contracts(&[updated]).unwrap();

        let rows = store.data_contracts_by_repository(repo).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].schema_definition.as_deref(), Some("v2"));
        assert!(rows[0].drift_detected);
        assert_eq!(store.data_contracts_by_symbol(t2).unwrap().len(), 1);
    }

    #[test]
    fn insert_data_contract_returns_existing_row_on_conflict() {
        let store = setup();
        let (repo, fe, be) = seed_repo(&store);
        let t1 = store.insert_symbol(&NewSymbol::new(fe, "User", SymbolKind::Interface)).unwrap();
        let t2 = store.insert_symbol(&NewSymbol::new(be, "User", SymbolKind::Class)).unwrap();

        let first = store.insert_data_contract(&make_contract(repo, t1, t2, "v1")).unwrap();
        let second = store.insert_data_contract(&make_contract(repo, t1, t2, "v9")).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.schema_definition.as_deref(), Some("v1"));
    }

    #[test]
    fn routes_and_components_round_trip() {
        let store = setup();
        let (repo, _, be) = seed_repo(&store);
        let handler = store
            .insert_symbol(&NewSymbol::new(be, "index", SymbolKind::Method))
            .unwrap();
        let route = Route {
            id: 0,
            repository_id: repo,
            framework: "laravel".into(),
            path: "/api/users".into(),
            method: "GET".into(),
            handler_symbol_id: Some(handler),
            name: Some("users.index".into()),
        };
        store.insert_route(&route).unwrap();
        store
            .insert_component(&Component {
                id: 0,
                repository_id: repo,
                kind: "vue".into(),
                name: "UserList".into(),
                symbol_id: None,
            })
            .unwrap();

        assert_eq!(store.routes_by_repository(repo, None).unwrap().len(), 1);
        assert_eq!(store.routes_by_repository(repo, Some("laravel")).unwrap().len(), 1);
        assert!(store.routes_by_repository(repo, Some("express")).unwrap().is_empty());
        assert_eq!(store.components_by_kind(repo, "vue").unwrap()[0].name, "UserList");
    }

    #[test]
    fn neighbor_source_filters_and_merges_api_calls() {
        let store = setup();
        let (repo, fe, be) = seed_repo(&store);
        let caller = store
            .insert_symbol(&NewSymbol::new(fe, "fetchUsers", SymbolKind::Function))
            .unwrap();
        let helper = store
            .insert_symbol(&NewSymbol::new(fe, "buildUrl", SymbolKind::Function))
            .unwrap();
        let handler = store
            .insert_symbol(&NewSymbol::new(be, "index", SymbolKind::Method))
            .unwrap();

        store
            .insert_dependency(&Dependency::new(caller, helper, DependencyKind::Calls, Some(2)))
            .unwrap();
        store
            .insert_dependency(&Dependency::new(caller, helper, DependencyKind::Imports, None))
            .unwrap();
        store.insert_api_call(&make_call(repo, caller, Some(handler), 4)).unwrap();

        let all = EdgeFilter::default();
        assert_eq!(store.direct_dependencies(caller, &all, false).unwrap().len(), 2);
        assert_eq!(store.direct_dependencies(caller, &all, true).unwrap().len(), 3);

        let calls_only = EdgeFilter::including(&[DependencyKind::Calls]);
        assert_eq!(store.direct_dependencies(caller, &calls_only, false).unwrap().len(), 1);
        assert_eq!(store.direct_callers(helper, &calls_only).unwrap().len(), 1);

        let cross = store.cross_stack_callers(handler).unwrap();
        assert_eq!(cross.len(), 1);
        assert_eq!(cross[0].from_symbol_id, caller);
        assert_eq!(cross[0].kind, DependencyKind::ApiCall);

        // A persisted API_CALL edge for the same pair is not double-counted.
        store
            .insert_dependency(&Dependency::new(caller, handler, DependencyKind::ApiCall, Some(4)))
            .unwrap();
        assert_eq!(store.cross_stack_callers(handler).unwrap().len(), 1);
    }
}
