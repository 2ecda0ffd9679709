//! Frontend HTTP call extraction.
//!
//! Scans frontend source files for calls through the usual HTTP clients
//! (`axios`, `fetch`, `$http`, `http`, `api`, `useFetch`, `ky`) and
//! attributes each call to a symbol of the file it appears in.

use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use walkdir::{DirEntry, WalkDir};

use crate::config::MatcherConfig;
use crate::error::Result;
use crate::graph::store::GraphStore;
use crate::observability::{validate_path, AnalysisMetrics};
use crate::types::{Symbol, SymbolId, SymbolKind};

static SCRIPT_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<script[^>]*>(.*?)</script>").expect("valid regex"));

/// `axios.get('/x')`, `this.$http.post("/x")`, `api.delete(`/x/${id}`)`
static MEMBER_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:^|[^\w$])(?:this\.)?\$?(?:axios|http|api|ky)\s*\.\s*(get|post|put|patch|delete|head|options)\s*(?:<[^>()]*>)?\s*\(\s*(?:'([^'\n]*)'|"([^"\n]*)"|`([^`]*)`)"#,
    )
    .expect("valid regex")
});

/// `fetch('/x', { method: 'POST' })`, `useFetch('/x')`, `$fetch('/x')`
static FETCH_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:^|[^\w$.])(\$?(?:fetch|useFetch))\s*(?:<[^>()]*>)?\s*\(\s*(?:'([^'\n]*)'|"([^"\n]*)"|`([^`]*)`)"#,
    )
    .expect("valid regex")
});

/// `axios({ method: 'post', url: '/x' })`
static AXIOS_CONFIG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w$.])(axios)\s*\(\s*\{").expect("valid regex"));

static METHOD_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"method\s*:\s*['"`]([A-Za-z]+)['"`]"#).expect("valid regex")
});

static URL_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\s*:\s*(?:'([^'\n]*)'|"([^"\n]*)"|`([^`]*)`)"#).expect("valid regex")
});

/// Function-like declarations, used to find the code enclosing a call.
static DECLARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:default\s+)?(?:(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)|(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=\n]+)?=\s*(?:async\s*)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=\n]+)?=>|(?:async\s+)?([A-Za-z_$][\w$]*)\s*\([^)\n]*\)\s*(?::[^{\n]+)?\{)",
    )
    .expect("valid regex")
});

const NOT_DECLARATIONS: &[&str] = &["if", "for", "while", "switch", "catch", "return", "function"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One HTTP call found in a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHttpCall {
    /// Uppercase HTTP method.
    pub method: String,
    pub url: String,
    pub line_number: u32,
    /// Nearest declaration preceding the call, if any.
    pub enclosing: Option<String>,
}

/// An HTTP call attributed to a caller in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedCall {
    pub file_path: String,
    /// Symbol name the call was attributed to; the file stem when no
    /// symbol in the file could be resolved.
    pub caller_name: String,
    pub caller_symbol_id: Option<SymbolId>,
    pub http_method: String,
    pub url: String,
    pub line_number: u32,
}

impl ExtractedCall {
    /// A call with no caller attribution.
    pub fn new(http_method: &str, url: &str) -> Self {
        Self {
            file_path: String::new(),
            caller_name: String::new(),
            caller_symbol_id: None,
            http_method: http_method.to_uppercase(),
            url: url.to_string(),
            line_number: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub calls: Vec<ExtractedCall>,
    pub files_scanned: usize,
    pub failed_files: Vec<String>,
}

// ---------------------------------------------------------------------------
// Source-level extraction
// ---------------------------------------------------------------------------

/// Extract HTTP calls from one file's text. For `.vue` files only the
/// `<script>` blocks are scanned; line numbers stay file-relative.
pub fn extract_http_calls(source: &str, is_vue: bool) -> Vec<RawHttpCall> {
    if !is_vue {
        return extract_from_script(source, 0);
    }
    let mut calls = Vec::new();
    for caps in SCRIPT_BLOCK_RE.captures_iter(source) {
        if let Some(body) = caps.get(1) {
            let offset = line_of(source, body.start()) - 1;
            calls.extend(extract_from_script(body.as_str(), offset));
        }
    }
    calls
}

fn extract_from_script(script: &str, line_offset: u32) -> Vec<RawHttpCall> {
    // (byte offset, method, url)
    let mut found: Vec<(usize, String, String)> = Vec::new();

    for caps in MEMBER_CALL_RE.captures_iter(script) {
        if let (Some(m), Some(url)) = (caps.get(1), literal(&caps, 2)) {
            found.push((m.start(), m.as_str().to_uppercase(), url));
        }
    }

    for caps in FETCH_CALL_RE.captures_iter(script) {
        let (Some(whole), Some(callee), Some(url)) = (caps.get(0), caps.get(1), literal(&caps, 2))
        else {
            continue;
        };
        let method = METHOD_OPTION_RE
            .captures(call_tail(script, whole.end()))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| "GET".to_string());
        found.push((callee.start(), method, url));
    }

    for caps in AXIOS_CONFIG_RE.captures_iter(script) {
        let (Some(whole), Some(callee)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let body = call_tail(script, whole.end());
        let Some(url) = URL_OPTION_RE.captures(body).and_then(|c| literal(&c, 1)) else {
            continue;
        };
        let method = METHOD_OPTION_RE
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| "GET".to_string());
        found.push((callee.start(), method, url));
    }

    found.sort_by_key(|(offset, _, _)| *offset);
    let declarations = declarations(script);
    found
        .into_iter()
        .filter(|(_, _, url)| !url.trim().is_empty())
        .map(|(offset, method, url)| RawHttpCall {
            method,
            url,
            line_number: line_offset + line_of(script, offset),
            enclosing: declarations
                .iter()
                .take_while(|(start, _)| *start <= offset)
                .last()
                .map(|(_, name)| name.clone()),
        })
        .collect()
}

/// The literal held by one of three consecutive capture groups
/// (single-quoted, double-quoted, template).
fn literal(caps: &Captures<'_>, first: usize) -> Option<String> {
    (first..first + 3)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
}

/// Text from `start` up to the parenthesis closing the current call.
fn call_tail(text: &str, start: usize) -> &str {
    let rest = &text[start..];
    let mut depth = 1i32;
    for (i, ch) in rest.char_indices() {
        match ch {
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return &rest[..i];
                }
            }
            _ => {}
        }
    }
    rest
}

fn line_of(text: &str, offset: usize) -> u32 {
    text[..offset].bytes().filter(|b| *b == b'\n').count() as u32 + 1
}

fn declarations(script: &str) -> Vec<(usize, String)> {
    DECLARATION_RE
        .captures_iter(script)
        .filter_map(|caps| {
            let name = caps.get(1).or(caps.get(2)).or(caps.get(3))?;
            if NOT_DECLARATIONS.contains(&name.as_str()) {
                return None;
            }
            Some((caps.get(0)?.start(), name.as_str().to_string()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Caller resolution
// ---------------------------------------------------------------------------

fn file_stem(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}

fn is_function_or_variable(kind: SymbolKind) -> bool {
    matches!(
        kind,
        SymbolKind::Function | SymbolKind::Method | SymbolKind::Variable | SymbolKind::Constant
    )
}

/// Pick the symbol a call in `file_path` belongs to: the enclosing
/// declaration when it is a known symbol, then an exported function or
/// variable named after the file, then any exported function or variable,
/// then any symbol of the file.
pub fn resolve_caller<'s>(
    symbols: &'s [Symbol],
    file_path: &str,
    enclosing: Option<&str>,
) -> Option<&'s Symbol> {
    if let Some(name) = enclosing {
        if let Some(s) = symbols.iter().find(|s| s.name == name) {
            return Some(s);
        }
    }
    let stem = file_stem(file_path).to_lowercase();
    let exported = || {
        symbols
            .iter()
            .filter(|s| s.exported && is_function_or_variable(s.kind))
    };
    exported()
        .find(|s| {
            let name = s.name.to_lowercase();
            !stem.is_empty() && (name.contains(&stem) || stem.contains(&name))
        })
        .or_else(|| exported().next())
        .or_else(|| symbols.first())
}

// ---------------------------------------------------------------------------
// Repository scan
// ---------------------------------------------------------------------------

/// Walks a repository's frontend files and attributes their HTTP calls to
/// stored symbols.
pub struct ApiCallExtractor<'a> {
    config: &'a MatcherConfig,
    metrics: Option<&'a AnalysisMetrics>,
}

impl<'a> ApiCallExtractor<'a> {
    pub fn new(config: &'a MatcherConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a AnalysisMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether a repository-relative path is a frontend source file worth
    /// scanning.
    pub fn is_frontend_file(&self, rel_path: &str) -> bool {
        let path = rel_path.replace('\\', "/");
        if !self
            .config
            .frontend_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
        {
            return false;
        }
        if path
            .split('/')
            .any(|seg| self.config.excluded_path_segments.iter().any(|x| x == seg))
        {
            return false;
        }
        let file_name = path.rsplit('/').next().unwrap_or(&path);
        !self
            .config
            .excluded_file_markers
            .iter()
            .any(|marker| file_name.contains(marker.as_str()))
    }

    /// Repository-relative paths of every frontend file under `root`,
    /// sorted.
    pub fn frontend_files(&self, root: &Path) -> Vec<String> {
        let excluded = &self.config.excluded_path_segments;
        let skip_dir = |entry: &DirEntry| {
            entry.depth() > 0
                && entry.file_type().is_dir()
                && excluded.iter().any(|x| entry.file_name().to_string_lossy() == x.as_str())
        };
        let mut files: Vec<String> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !skip_dir(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let rel = e.path().strip_prefix(root).ok()?;
                Some(rel.to_string_lossy().replace('\\', "/"))
            })
            .filter(|rel| self.is_frontend_file(rel))
            .collect();
        files.sort();
        files
    }

    /// Scan every frontend file of the repository rooted at `root`. A file
    /// that cannot be read is logged, counted and skipped.
    pub fn extract_repository(
        &self,
        store: &GraphStore,
        repository_id: i64,
        root: &Path,
    ) -> Result<ExtractionReport> {
        let mut report = ExtractionReport::default();
        for rel in self.frontend_files(root) {
            report.files_scanned += 1;
            if let Some(m) = self.metrics {
                m.record_file_scanned();
            }
            let text = match validate_path(&rel, root)
                .and_then(|p| std::fs::read_to_string(&p).map_err(|e| e.to_string()))
            {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(file = %rel, "skipping file: {}", e);
                    if let Some(m) = self.metrics {
                        m.record_extraction_failure();
                    }
                    report.failed_files.push(rel);
                    continue;
                }
            };

            let raw = extract_http_calls(&text, rel.ends_with(".vue"));
            if raw.is_empty() {
                continue;
            }
            let symbols = store.symbols_in_file(repository_id, &rel)?;
            for call in raw {
                let caller = resolve_caller(&symbols, &rel, call.enclosing.as_deref());
                if caller.is_none() {
                    tracing::debug!(file = %rel, url = %call.url, "no symbol to attribute call to");
                }
                report.calls.push(ExtractedCall {
                    file_path: rel.clone(),
                    caller_name: caller
                        .map(|s| s.name.clone())
                        .unwrap_or_else(|| file_stem(&rel).to_string()),
                    caller_symbol_id: caller.map(|s| s.id),
                    http_method: call.method,
                    url: call.url,
                    line_number: call.line_number,
                });
            }
        }
        tracing::debug!(
            files = report.files_scanned,
            calls = report.calls.len(),
            failed = report.failed_files.len(),
            "frontend extraction finished"
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
