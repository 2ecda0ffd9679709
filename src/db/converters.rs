//! Row → domain type converters shared by every store query.
//!
//! Each converter reads columns by name, so queries only need to select
//! (or alias) the expected column set.

use rusqlite::types::Type;
use rusqlite::Row;

use crate::types::{
    ApiCall, Component, DataContract, Dependency, DependencyKind, FileRecord, Language, Repository,
    Route, Symbol, SymbolKind,
};

/// Column list expected by [`row_to_symbol`]; symbols are always joined
/// with their owning file.
pub const SYMBOL_COLUMNS: &str = "\
s.id, s.file_id, s.name, s.qualified_name, s.kind, s.exported, s.signature, s.description,
f.path AS file_path";

fn conversion_error(column: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        format!("unknown {what}: {value}").into(),
    )
}

pub fn row_to_symbol(row: &Row<'_>) -> rusqlite::Result<Symbol> {
    let kind_str: String = row.get("kind")?;
    let kind = SymbolKind::from_str_loose(&kind_str)
        .ok_or_else(|| conversion_error(4, "symbol kind", &kind_str))?;
    Ok(Symbol {
        id: row.get("id")?,
        file_id: row.get("file_id")?,
        name: row.get("name")?,
        qualified_name: row.get("qualified_name")?,
        kind,
        file_path: row.get("file_path")?,
        exported: row.get::<_, i64>("exported")? != 0,
        signature: row.get("signature")?,
        description: row.get("description")?,
    })
}

pub fn row_to_dependency(row: &Row<'_>) -> rusqlite::Result<Dependency> {
    let kind_str: String = row.get("kind")?;
    let kind = DependencyKind::from_str_loose(&kind_str)
        .ok_or_else(|| conversion_error(2, "dependency kind", &kind_str))?;
    Ok(Dependency {
        from_symbol_id: row.get("from_symbol_id")?,
        to_symbol_id: row.get("to_symbol_id")?,
        kind,
        line_number: row.get("line_number")?,
    })
}

pub fn row_to_api_call(row: &Row<'_>) -> rusqlite::Result<ApiCall> {
    Ok(ApiCall {
        id: row.get("id")?,
        repository_id: row.get("repository_id")?,
        caller_symbol_id: row.get("caller_symbol_id")?,
        endpoint_symbol_id: row.get("endpoint_symbol_id")?,
        http_method: row.get("http_method")?,
        endpoint_path: row.get("endpoint_path")?,
        line_number: row.get("line_number")?,
    })
}

pub fn row_to_data_contract(row: &Row<'_>) -> rusqlite::Result<DataContract> {
    Ok(DataContract {
        id: row.get("id")?,
        repository_id: row.get("repository_id")?,
        frontend_type_id: row.get("frontend_type_id")?,
        backend_type_id: row.get("backend_type_id")?,
        name: row.get("name")?,
        drift_detected: row.get::<_, i64>("drift_detected")? != 0,
        schema_definition: row.get("schema_definition")?,
    })
}

pub fn row_to_route(row: &Row<'_>) -> rusqlite::Result<Route> {
    Ok(Route {
        id: row.get("id")?,
        repository_id: row.get("repository_id")?,
        framework: row.get("framework")?,
        path: row.get("path")?,
        method: row.get("method")?,
        handler_symbol_id: row.get("handler_symbol_id")?,
        name: row.get("name")?,
    })
}

pub fn row_to_component(row: &Row<'_>) -> rusqlite::Result<Component> {
    Ok(Component {
        id: row.get("id")?,
        repository_id: row.get("repository_id")?,
        kind: row.get("kind")?,
        name: row.get("name")?,
        symbol_id: row.get("symbol_id")?,
    })
}

pub fn row_to_file(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let language: Option<String> = row.get("language")?;
    Ok(FileRecord {
        id: row.get("id")?,
        repository_id: row.get("repository_id")?,
        path: row.get("path")?,
        language: language.as_deref().and_then(Language::from_str_loose),
    })
}

pub fn row_to_repository(row: &Row<'_>) -> rusqlite::Result<Repository> {
    Ok(Repository {
        id: row.get("id")?,
        name: row.get("name")?,
        root_path: row.get("root_path")?,
    })
}
