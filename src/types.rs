//! Core domain types for crossgraph.
//!
//! Symbols, dependency edges and framework entities are produced by the
//! external parsing layer and are read-only here. API calls and data
//! contracts are the rows this crate writes back after cross-stack
//! analysis.

use serde::{Deserialize, Serialize};

/// Stable identifier of a symbol row.
pub type SymbolId = i64;

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Source languages that take part in cross-stack analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
    Vue,
    Php,
    CSharp,
    Python,
    Java,
    Go,
    Ruby,
    Rust,
    Kotlin,
    GdScript,
    Lua,
}

impl Language {
    /// Map a file extension (including the dot) to a language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".ts" | ".mts" | ".cts" => Some(Self::TypeScript),
            ".tsx" => Some(Self::Tsx),
            ".js" | ".mjs" | ".cjs" => Some(Self::JavaScript),
            ".jsx" => Some(Self::Jsx),
            ".vue" => Some(Self::Vue),
            ".php" => Some(Self::Php),
            ".cs" | ".cshtml" | ".razor" => Some(Self::CSharp),
            ".py" => Some(Self::Python),
            ".java" => Some(Self::Java),
            ".go" => Some(Self::Go),
            ".rb" => Some(Self::Ruby),
            ".rs" => Some(Self::Rust),
            ".kt" | ".kts" => Some(Self::Kotlin),
            ".gd" => Some(Self::GdScript),
            ".lua" => Some(Self::Lua),
            _ => None,
        }
    }

    /// Detect the language of a file path from its extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let dot = file_name.rfind('.')?;
        Self::from_extension(&file_name[dot..])
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::JavaScript => "javascript",
            Self::Jsx => "jsx",
            Self::Vue => "vue",
            Self::Php => "php",
            Self::CSharp => "csharp",
            Self::Python => "python",
            Self::Java => "java",
            Self::Go => "go",
            Self::Ruby => "ruby",
            Self::Rust => "rust",
            Self::Kotlin => "kotlin",
            Self::GdScript => "gdscript",
            Self::Lua => "lua",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "typescript" | "ts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "javascript" | "js" => Some(Self::JavaScript),
            "jsx" => Some(Self::Jsx),
            "vue" => Some(Self::Vue),
            "php" => Some(Self::Php),
            "csharp" | "c#" | "cs" => Some(Self::CSharp),
            "python" | "py" => Some(Self::Python),
            "java" => Some(Self::Java),
            "go" | "golang" => Some(Self::Go),
            "ruby" | "rb" => Some(Self::Ruby),
            "rust" | "rs" => Some(Self::Rust),
            "kotlin" | "kt" => Some(Self::Kotlin),
            "gdscript" | "gd" => Some(Self::GdScript),
            "lua" => Some(Self::Lua),
            _ => None,
        }
    }

    /// Which side of the stack code in this language usually lives on.
    pub fn stack_side(&self) -> StackSide {
        match self {
            Self::TypeScript | Self::Tsx | Self::JavaScript | Self::Jsx | Self::Vue => {
                StackSide::Frontend
            }
            _ => StackSide::Backend,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frontend or backend half of a full-stack repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackSide {
    Frontend,
    Backend,
}

impl StackSide {
    /// Side of the file at `path`. Script files under one of
    /// `backend_markers` (e.g. `server/`) count as backend. `None` when
    /// the language is unknown.
    pub fn of_path(path: &str, backend_markers: &[String]) -> Option<Self> {
        let side = Language::from_path(path)?.stack_side();
        let normalized = path.replace('\\', "/");
        if side == StackSide::Frontend
            && backend_markers
                .iter()
                .any(|m| {
                    normalized.starts_with(m.as_str()) || normalized.contains(&format!("/{m}"))
                })
        {
            return Some(StackSide::Backend);
        }
        Some(side)
    }
}

// ---------------------------------------------------------------------------
// SymbolKind
// ---------------------------------------------------------------------------

/// Kinds of named code entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    TypeAlias,
    Enum,
    Struct,
    Variable,
    Constant,
    Property,
    Module,
    Namespace,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::TypeAlias => "type_alias",
            Self::Enum => "enum",
            Self::Struct => "struct",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Property => "property",
            Self::Module => "module",
            Self::Namespace => "namespace",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "type_alias" | "type" => Some(Self::TypeAlias),
            "enum" => Some(Self::Enum),
            "struct" => Some(Self::Struct),
            "variable" => Some(Self::Variable),
            "constant" | "const" => Some(Self::Constant),
            "property" | "field" => Some(Self::Property),
            "module" => Some(Self::Module),
            "namespace" | "package" => Some(Self::Namespace),
            _ => None,
        }
    }

    /// Class-like kinds that can own methods.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Class | Self::Interface | Self::Struct | Self::Enum)
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DependencyKind
// ---------------------------------------------------------------------------

/// Kinds of directed relationships between two symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyKind {
    Calls,
    Imports,
    Inherits,
    Implements,
    References,
    Contains,
    ApiCall,
    SharesSchema,
    FrontendBackend,
}

/// Edge kinds that connect the frontend and backend halves of a repository.
pub const CROSS_STACK_KINDS: [DependencyKind; 3] = [
    DependencyKind::ApiCall,
    DependencyKind::SharesSchema,
    DependencyKind::FrontendBackend,
];

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calls => "CALLS",
            Self::Imports => "IMPORTS",
            Self::Inherits => "INHERITS",
            Self::Implements => "IMPLEMENTS",
            Self::References => "REFERENCES",
            Self::Contains => "CONTAINS",
            Self::ApiCall => "API_CALL",
            Self::SharesSchema => "SHARES_SCHEMA",
            Self::FrontendBackend => "FRONTEND_BACKEND",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CALLS" => Some(Self::Calls),
            "IMPORTS" => Some(Self::Imports),
            "INHERITS" | "EXTENDS" => Some(Self::Inherits),
            "IMPLEMENTS" => Some(Self::Implements),
            "REFERENCES" => Some(Self::References),
            "CONTAINS" => Some(Self::Contains),
            "API_CALL" => Some(Self::ApiCall),
            "SHARES_SCHEMA" => Some(Self::SharesSchema),
            "FRONTEND_BACKEND" => Some(Self::FrontendBackend),
            _ => None,
        }
    }

    pub fn is_cross_stack(&self) -> bool {
        CROSS_STACK_KINDS.contains(self)
    }
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Symbol
// ---------------------------------------------------------------------------

/// A named code entity with a stable id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub id: SymbolId,
    pub file_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    pub kind: SymbolKind,
    /// Path of the owning file, relative to the repository root.
    pub file_path: String,
    pub exported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Symbol {
    pub fn language(&self) -> Option<Language> {
        Language::from_path(&self.file_path)
    }
}

// ---------------------------------------------------------------------------
// Dependency
// ---------------------------------------------------------------------------

/// A directed, typed edge between two symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub from_symbol_id: SymbolId,
    pub to_symbol_id: SymbolId,
    pub kind: DependencyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

impl Dependency {
    pub fn new(from: SymbolId, to: SymbolId, kind: DependencyKind, line: Option<u32>) -> Self {
        Self {
            from_symbol_id: from,
            to_symbol_id: to,
            kind,
            line_number: line,
        }
    }
}

// ---------------------------------------------------------------------------
// Cross-stack rows
// ---------------------------------------------------------------------------

/// An observed or inferred frontend → backend invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCall {
    /// Row id; 0 until the call has been persisted.
    pub id: i64,
    pub repository_id: i64,
    pub caller_symbol_id: SymbolId,
    /// Handler of the matched backend route, if any.
    pub endpoint_symbol_id: Option<SymbolId>,
    pub http_method: String,
    pub endpoint_path: String,
    pub line_number: u32,
}

/// A detected pairing between a frontend type and a backend type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataContract {
    /// Row id; 0 until the contract has been persisted.
    pub id: i64,
    pub repository_id: i64,
    pub frontend_type_id: SymbolId,
    pub backend_type_id: SymbolId,
    pub name: String,
    pub drift_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_definition: Option<String>,
}

// ---------------------------------------------------------------------------
// Framework entities
// ---------------------------------------------------------------------------

/// A backend route declared by a web framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: i64,
    pub repository_id: i64,
    /// Framework that declared the route (e.g. "laravel", "aspnet", "express").
    pub framework: String,
    pub path: String,
    pub method: String,
    pub handler_symbol_id: Option<SymbolId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A UI component (e.g. a Vue single-file component).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: i64,
    pub repository_id: i64,
    /// Component flavor, e.g. "vue".
    pub kind: String,
    pub name: String,
    pub symbol_id: Option<SymbolId>,
}

// ---------------------------------------------------------------------------
// Repository / files
// ---------------------------------------------------------------------------

/// A repository registered with the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: i64,
    pub name: String,
    pub root_path: String,
}

/// A source file belonging to a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: i64,
    pub repository_id: i64,
    /// Path relative to the repository root.
    pub path: String,
    pub language: Option<Language>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
