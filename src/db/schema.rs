//! SQLite schema initialization for crossgraph.
//!
//! Parser-owned tables (repositories, files, symbols, dependencies, routes,
//! components) are created here so the crate can run standalone; the
//! cross-stack tables (api_calls, data_contracts) are the ones this crate
//! writes. Natural-key unique indexes are the only mutual exclusion
//! between concurrent analyses of the same repository.

use rusqlite::Connection;

// ---------------------------------------------------------------------------
// DDL constants
// ---------------------------------------------------------------------------

const CREATE_REPOSITORIES: &str = "\
CREATE TABLE IF NOT EXISTS repositories (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  root_path TEXT NOT NULL
)";

const CREATE_FILES: &str = "\
CREATE TABLE IF NOT EXISTS files (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  repository_id INTEGER NOT NULL,
  path TEXT NOT NULL,
  language TEXT,
  UNIQUE (repository_id, path),
  FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE
)";

const CREATE_SYMBOLS: &str = "\
CREATE TABLE IF NOT EXISTS symbols (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  file_id INTEGER NOT NULL,
  name TEXT NOT NULL,
  qualified_name TEXT,
  kind TEXT NOT NULL,
  exported INTEGER NOT NULL DEFAULT 0,
  signature TEXT,
  description TEXT,
  FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
)";

const CREATE_DEPENDENCIES: &str = "\
CREATE TABLE IF NOT EXISTS dependencies (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  from_symbol_id INTEGER NOT NULL,
  to_symbol_id INTEGER NOT NULL,
  kind TEXT NOT NULL,
  line_number INTEGER
)";

const CREATE_API_CALLS: &str = "\
CREATE TABLE IF NOT EXISTS api_calls (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  repository_id INTEGER NOT NULL,
  caller_symbol_id INTEGER NOT NULL,
  endpoint_symbol_id INTEGER,
  http_method TEXT NOT NULL,
  endpoint_path TEXT NOT NULL,
  line_number INTEGER NOT NULL DEFAULT 0
)";

const CREATE_DATA_CONTRACTS: &str = "\
CREATE TABLE IF NOT EXISTS data_contracts (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  repository_id INTEGER NOT NULL,
  frontend_type_id INTEGER NOT NULL,
  backend_type_id INTEGER NOT NULL,
  name TEXT NOT NULL,
  drift_detected INTEGER NOT NULL DEFAULT 0,
  schema_definition TEXT,
  UNIQUE (frontend_type_id, backend_type_id, name)
)";

const CREATE_ROUTES: &str = "\
CREATE TABLE IF NOT EXISTS routes (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  repository_id INTEGER NOT NULL,
  framework TEXT NOT NULL,
  path TEXT NOT NULL,
  method TEXT NOT NULL,
  handler_symbol_id INTEGER,
  name TEXT
)";

const CREATE_COMPONENTS: &str = "\
CREATE TABLE IF NOT EXISTS components (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  repository_id INTEGER NOT NULL,
  kind TEXT NOT NULL,
  name TEXT NOT NULL,
  symbol_id INTEGER
)";

// Indexes ----------------------------------------------------------------

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_files_repo ON files(repository_id)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_kind ON symbols(kind)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name)",
    "CREATE INDEX IF NOT EXISTS idx_deps_from ON dependencies(from_symbol_id)",
    "CREATE INDEX IF NOT EXISTS idx_deps_to ON dependencies(to_symbol_id)",
    "CREATE INDEX IF NOT EXISTS idx_api_calls_repo ON api_calls(repository_id)",
    "CREATE INDEX IF NOT EXISTS idx_api_calls_endpoint ON api_calls(endpoint_symbol_id)",
    "CREATE INDEX IF NOT EXISTS idx_contracts_repo ON data_contracts(repository_id)",
    "CREATE INDEX IF NOT EXISTS idx_routes_repo ON routes(repository_id)",
    "CREATE INDEX IF NOT EXISTS idx_components_repo ON components(repository_id)",
];

// Natural keys. A NULL line / endpoint would defeat a plain UNIQUE
// constraint, so both are folded to a sentinel inside the index.
const CREATE_UNIQUE_INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_dependencies_natural \
     ON dependencies(from_symbol_id, to_symbol_id, kind, IFNULL(line_number, -1))",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_api_calls_natural \
     ON api_calls(caller_symbol_id, IFNULL(endpoint_symbol_id, 0), line_number, \
     http_method, endpoint_path)",
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Open (or create) the SQLite database at `db_path` and apply the full
/// crossgraph schema.
///
/// The returned connection has WAL mode and synchronous NORMAL configured.
/// Foreign keys stay off: parsers may emit edges to symbols that land in a
/// later batch.
pub fn initialize_database(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;

    // -- Pragmas ----------------------------------------------------------
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "OFF")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    // -- Core tables ------------------------------------------------------
    conn.execute_batch(CREATE_REPOSITORIES)?;
    conn.execute_batch(CREATE_FILES)?;
    conn.execute_batch(CREATE_SYMBOLS)?;
    conn.execute_batch(CREATE_DEPENDENCIES)?;
    conn.execute_batch(CREATE_API_CALLS)?;
    conn.execute_batch(CREATE_DATA_CONTRACTS)?;
    conn.execute_batch(CREATE_ROUTES)?;
    conn.execute_batch(CREATE_COMPONENTS)?;

    // -- Indexes ----------------------------------------------------------
    for ddl in CREATE_INDEXES.iter().chain(CREATE_UNIQUE_INDEXES) {
        conn.execute_batch(ddl)?;
    }

    Ok(conn)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
