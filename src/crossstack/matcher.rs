//! URL and method matching between frontend calls and backend routes.

use serde::Serialize;

use crate::config::MatcherConfig;
use crate::crossstack::extraction::ExtractedCall;
use crate::types::Route;

/// Token every path parameter normalizes to.
pub const PLACEHOLDER: &str = "{param}";

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Whether a raw path segment is a parameter: `{id}`, `{id:int}`, `:id`,
/// `${id}`, `<int:id>` or `*`.
pub(crate) fn is_placeholder(segment: &str) -> bool {
    (segment.starts_with('{') && segment.ends_with('}'))
        || (segment.starts_with(':') && segment.len() > 1)
        || (segment.starts_with('<') && segment.ends_with('>'))
        || segment.contains("${")
        || segment == "*"
}

/// Normalize a URL or route path for comparison.
///
/// Scheme and host are dropped, as is a leading `${base}` expression, the
/// query string and fragment. Segments are case-folded and every parameter
/// becomes [`PLACEHOLDER`]. The result always starts with `/` and never
/// ends with one (except the root itself).
pub fn normalize_url(raw: &str) -> String {
    let mut url = raw.trim();
    if let Some(idx) = url.find("://") {
        let after = &url[idx + 3..];
        url = after.find('/').map_or("", |i| &after[i..]);
    }
    if url.starts_with("${") {
        if let Some(end) = url.find('}') {
            if url[end + 1..].starts_with('/') {
                url = &url[end + 1..];
            }
        }
    }
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let segments: Vec<String> = url[..end]
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if is_placeholder(s) {
                PLACEHOLDER.to_string()
            } else {
                s.to_lowercase()
            }
        })
        .collect();
    format!("/{}", segments.join("/"))
}

/// Positional comparison of two normalized paths. A placeholder only
/// matches a placeholder; literals must be identical.
fn segments_match(a: &str, b: &str) -> bool {
    let left: Vec<&str> = a.split('/').collect();
    let right: Vec<&str> = b.split('/').collect();
    left.len() == right.len()
        && left.iter().zip(&right).all(|(x, y)| {
            match (*x == PLACEHOLDER, *y == PLACEHOLDER) {
                (true, true) => true,
                (false, false) => x == y,
                _ => false,
            }
        })
}

/// Whether a call URL targets a route path.
pub fn urls_match(call_url: &str, route_path: &str) -> bool {
    let call = normalize_url(call_url);
    let route = normalize_url(route_path);
    call == route || segments_match(&call, &route)
}

/// Case-insensitive method comparison. Routes registered for any verb
/// (`ANY`, `*`) accept every method.
pub fn methods_match(call_method: &str, route_method: &str) -> bool {
    let route = route_method.trim();
    route == "*"
        || route.eq_ignore_ascii_case("any")
        || call_method.trim().eq_ignore_ascii_case(route)
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// A frontend call and the backend route it targets, if one was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRelationship {
    pub call: ExtractedCall,
    pub route: Option<Route>,
}

impl ApiRelationship {
    pub fn is_matched(&self) -> bool {
        self.route.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    /// Matched pairs and unmatched calls, in call order.
    pub relationships: Vec<ApiRelationship>,
    pub matched: usize,
    pub unmatched: usize,
    /// An input list or the relationship count hit its cap.
    pub truncated: bool,
}

/// Match calls to routes on normalized URL and method.
///
/// At most `max_api_calls` calls and `max_routes` routes are considered
/// and matching stops once `max_relationships` relationships exist. A call
/// without a matching route is kept with `route: None`.
pub fn match_api_calls_to_routes(
    calls: &[ExtractedCall],
    routes: &[Route],
    config: &MatcherConfig,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    if calls.len() > config.max_api_calls {
        tracing::warn!(
            calls = calls.len(),
            limit = config.max_api_calls,
            "truncating frontend calls before matching"
        );
        outcome.truncated = true;
    }
    if routes.len() > config.max_routes {
        tracing::warn!(
            routes = routes.len(),
            limit = config.max_routes,
            "truncating backend routes before matching"
        );
        outcome.truncated = true;
    }
    let calls = &calls[..calls.len().min(config.max_api_calls)];
    let routes: Vec<(&Route, String)> = routes
        .iter()
        .take(config.max_routes)
        .map(|r| (r, normalize_url(&r.path)))
        .collect();

    let mut capped = false;
    'calls: for call in calls {
        let normalized = normalize_url(&call.url);
        let mut found = false;
        for (route, route_path) in &routes {
            if !methods_match(&call.http_method, &route.method) {
                continue;
            }
            if normalized != *route_path && !segments_match(&normalized, route_path) {
                continue;
            }
            if outcome.relationships.len() >= config.max_relationships {
                capped = true;
                break 'calls;
            }
            outcome.relationships.push(ApiRelationship {
                call: call.clone(),
                route: Some((*route).clone()),
            });
            outcome.matched += 1;
            found = true;
        }
        if !found {
            if outcome.relationships.len() >= config.max_relationships {
                capped = true;
                break;
            }
            outcome.relationships.push(ApiRelationship {
                call: call.clone(),
                route: None,
            });
            outcome.unmatched += 1;
        }
    }

    if capped {
        tracing::warn!(
            limit = config.max_relationships,
            "relationship cap reached, remaining calls not matched"
        );
        outcome.truncated = true;
    }
    tracing::debug!(
        matched = outcome.matched,
        unmatched = outcome.unmatched,
        "api calls matched to routes"
    );
    outcome
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn make_route(id: i64, method: &str, path: &str) -> Route {
        Route {
            id,
            repository_id: 1,
            framework: "laravel".into(),
            path: path.into(),
            method: method.into(),
            handler_symbol_id: Some(100 + id),
            name: None,
        }
    }

    #[test_case("/api/users", "/api/users" ; "plain path")]
    #[test_case("/api/users/", "/api/users" ; "trailing slash")]
    #[test_case("/API/Users", "/api/users" ; "case folded")]
    #[test_case("/api/users?page=2&sort=name", "/api/users" ; "query string")]
    #[test_case("https://example.com/api/users", "/api/users" ; "absolute url")]
    #[test_case("http://localhost:8000", "/" ; "host only")]
    #[test_case("${API_BASE}/users", "/users" ; "base url expression")]
    #[test_case("/api/users/{id}", "/api/users/{param}" ; "brace placeholder")]
    #[test_case("/api/users/{id:int}", "/api/users/{param}" ; "typed placeholder")]
    #[test_case("/api/users/:id", "/api/users/{param}" ; "express placeholder")]
    #[test_case("/api/users/${user.id}/posts", "/api/users/{param}/posts" ; "template placeholder")]
    #[test_case("/api/users/<int:id>", "/api/users/{param}" ; "flask placeholder")]
    #[test_case("api//users", "/api/users" ; "missing leading and doubled slash")]
    #[test_case("", "/" ; "empty")]
    fn test_normalize_url(raw: &str, expected: &str) {
        assert_eq!(normalize_url(raw), expected);
    }

    #[test]
    fn test_exact_match() {
        let out = match_api_calls_to_routes(
            &[ExtractedCall::new("GET", "/api/users")],
            &[make_route(1, "GET", "/api/users")],
            &MatcherConfig::default(),
        );
        assert_eq!(out.matched, 1);
        assert_eq!(out.unmatched, 0);
        assert_eq!(out.relationships.len(), 1);
        assert_eq!(out.relationships[0].route.as_ref().unwrap().id, 1);
    }

    #[test_case("POST", "GET" ; "call method differs")]
    #[test_case("GET", "POST" ; "route method differs")]
    fn test_method_mismatch_keeps_call_unmatched(call_method: &str, route_method: &str) {
        let out = match_api_calls_to_routes(
            &[ExtractedCall::new(call_method, "/api/users")],
            &[make_route(1, route_method, "/api/users")],
            &MatcherConfig::default(),
        );
        assert_eq!(out.matched, 0);
        assert_eq!(out.unmatched, 1);
        assert!(!out.relationships[0].is_matched());
    }

    #[test]
    fn test_methods_case_insensitive() {
        assert!(methods_match("get", "GET"));
        assert!(methods_match("Post", "ANY"));
        assert!(!methods_match("PUT", "PATCH"));
    }

    #[test]
    fn test_placeholder_against_placeholder() {
        let routes = [make_route(1, "GET", "/api/users/{id}")];
        let config = MatcherConfig::default();
        let out = match_api_calls_to_routes(
            &[ExtractedCall::new("GET", "/api/users/{id}")],
            &routes,
            &config,
        );
        assert_eq!(out.matched, 1);

        let out = match_api_calls_to_routes(
            &[ExtractedCall::new("GET", "/api/users/${id}")],
            &routes,
            &config,
        );
        assert_eq!(out.matched, 1);
    }

    #[test]
    fn test_literal_never_matches_placeholder() {
        let out = match_api_calls_to_routes(
            &[ExtractedCall::new("GET", "/api/users/42")],
            &[make_route(1, "GET", "/api/users/{id}")],
            &MatcherConfig::default(),
        );
        assert_eq!(out.matched, 0);
        assert_eq!(out.unmatched, 1);
        assert!(!urls_match("/api/users/42", "/api/users/{id}"));
        assert!(!urls_match("/api/users/{id}", "/api/users/me"));
        assert!(!urls_match("/api/users", "/api/users/{id}"));
    }

    #[test]
    fn test_call_matching_several_routes() {
        let out = match_api_calls_to_routes(
            &[ExtractedCall::new("GET", "/api/users/{id}")],
            &[
                make_route(1, "GET", "/api/users/{id}"),
                make_route(2, "GET", "/api/users/:user"),
                make_route(3, "DELETE", "/api/users/{id}"),
            ],
            &MatcherConfig::default(),
        );
        let ids: Vec<i64> = out
            .relationships
            .iter()
            .filter_map(|r| r.route.as_ref().map(|r| r.id))
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_caps_are_applied() {
        let config = MatcherConfig {
            max_api_calls: 3,
            max_routes: 1,
            max_relationships: 2,
            ..MatcherConfig::default()
        };
        let calls: Vec<ExtractedCall> = (0..5)
            .map(|i| ExtractedCall::new("GET", &format!("/api/items/{i}")))
            .collect();
        let routes = vec![
            make_route(1, "GET", "/api/items/0"),
            make_route(2, "GET", "/api/items/1"),
        ];
        let out = match_api_calls_to_routes(&calls, &routes, &config);
        assert!(out.truncated);
        assert_eq!(out.relationships.len(), 2);
        assert_eq!(out.matched, 1);
        assert_eq!(out.unmatched, 1);
    }

    #[test]
    fn test_every_call_retained_under_caps() {
        let calls = vec![
            ExtractedCall::new("GET", "/api/a"),
            ExtractedCall::new("POST", "/api/b"),
            ExtractedCall::new("GET", "/api/c"),
        ];
        let out = match_api_calls_to_routes(
            &calls,
            &[make_route(1, "GET", "/api/c")],
            &MatcherConfig::default(),
        );
        let urls: Vec<&str> = out.relationships.iter().map(|r| r.call.url.as_str()).collect();
        assert_eq!(urls, vec!["/api/a", "/api/b", "/api/c"]);
        assert!(!out.truncated);
    }
}
