//! Fixture definitions and path-pattern matching.
//!
//! A [`Fixture`] pairs an HTTP method and path pattern with the response the
//! server should produce. Patterns support exact and single-segment
//! parameterized matching (`/items/:id`); matching is resolved by an ordered
//! list of compiled [`PathPattern`]s rather than regexes so that specificity
//! and tie-break rules stay explicit.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, StubError};

fn default_status() -> u16 {
    200
}

/// A predefined request/response pairing served by the stub server.
///
/// Fixtures are immutable once registered; stateful scenarios are layered on
/// top via the overlay in [`crate::ServerState`]. The type is serde-friendly
/// so fixture sets can be loaded from a JSON file at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    /// HTTP method this fixture answers, e.g. `"GET"`.
    pub method: String,

    /// Path pattern, exact or parameterized (`/items/:id`).
    pub path: String,

    /// Response status code.
    #[serde(default = "default_status")]
    pub status: u16,

    /// Extra response headers. Setting `content-type` to something other
    /// than JSON makes a string body be sent raw instead of JSON-encoded.
    #[serde(default)]
    pub headers: Vec<(String, String)>,

    /// Response body. `{name}` placeholders in string values are filled from
    /// matched path parameters.
    #[serde(default)]
    pub body: Value,

    /// Stateful fixtures apply write requests to the path's overlay instead
    /// of serving a canned body.
    #[serde(default)]
    pub stateful: bool,
}

impl Fixture {
    /// Create a fixture answering `method` `path` with a 200 and `body`.
    pub fn new(method: &str, path: &str, body: Value) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            status: 200,
            headers: Vec::new(),
            body,
            stateful: false,
        }
    }

    /// Set the response status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a response header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Mark the fixture as stateful.
    pub fn into_stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    /// Compile this fixture's path pattern.
    pub(crate) fn pattern(&self) -> PathPattern {
        PathPattern::parse(&self.path)
    }
}

/// A compiled path pattern: an ordered list of literal and parameter segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

impl PathPattern {
    /// Compile a pattern string. Segments starting with `:` capture a single
    /// path segment under that name.
    pub fn parse(pattern: &str) -> Self {
        let segments = split_segments(pattern)
            .map(|seg| match seg.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(seg.to_string()),
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// The pattern as registered. Overlay state is keyed on this string.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Number of parameterized segments; fewer means more specific.
    pub fn wildcard_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Param(_)))
            .count()
    }

    /// Match a concrete request path, returning captured parameters.
    ///
    /// Path segments are URL-decoded before comparison, so encoded ids like
    /// `custom%2B1` match their decoded form.
    pub fn capture(&self, path: &str) -> Option<HashMap<String, String>> {
        let concrete: Vec<String> = split_segments(path)
            .map(|seg| {
                urlencoding::decode(seg)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| seg.to_string())
            })
            .collect();

        if concrete.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, value) in self.segments.iter().zip(concrete) {
            match segment {
                Segment::Literal(expected) if *expected == value => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), value);
                }
            }
        }

        Some(params)
    }
}

/// Split a path into segments, ignoring a trailing slash.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim_start_matches('/')
        .trim_end_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
}

/// Fill `{name}` placeholders in string values from matched path parameters.
pub(crate) fn substitute_params(body: &Value, params: &HashMap<String, String>) -> Value {
    if params.is_empty() {
        return body.clone();
    }

    match body {
        Value::String(s) => {
            let mut out = s.clone();
            for (name, value) in params {
                out = out.replace(&format!("{{{name}}}"), value);
            }
            Value::String(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| substitute_params(v, params)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_params(v, params)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Collection of fixture factories for the built-in scenario.
pub struct Fixtures;

impl Fixtures {
    /// League constraints. Doubles as the default readiness-probe target.
    pub fn constraints() -> Fixture {
        Fixture::new(
            "GET",
            "/api/leagues-management/constraints",
            json!({
                "maxTeams": 16,
                "maxPlayersPerTeam": 25,
                "minPlayersPerTeam": 11,
                "transferWindowOpen": true
            }),
        )
    }

    /// Readable league collection.
    pub fn leagues() -> Fixture {
        Fixture::new(
            "GET",
            "/api/leagues-management/leagues",
            json!([
                { "id": "premier", "name": "Premier League", "teams": 16 },
                { "id": "championship", "name": "Championship", "teams": 24 }
            ]),
        )
    }

    /// Stateful create: appends the request body to the league collection.
    pub fn create_league() -> Fixture {
        Fixture::new("POST", "/api/leagues-management/leagues", Value::Null)
            .with_status(201)
            .into_stateful()
    }

    /// Parameterized single-league lookup.
    pub fn league_by_id() -> Fixture {
        Fixture::new(
            "GET",
            "/api/leagues-management/leagues/:id",
            json!({ "id": "{id}", "name": "League {id}", "teams": 16 }),
        )
    }

    /// Readable team collection, initially empty.
    pub fn teams() -> Fixture {
        Fixture::new("GET", "/api/leagues-management/teams", json!([]))
    }

    /// Stateful create for the team collection.
    pub fn create_team() -> Fixture {
        Fixture::new("POST", "/api/leagues-management/teams", Value::Null)
            .with_status(201)
            .into_stateful()
    }

    /// Plain-text version string, exercising non-JSON content types.
    pub fn version() -> Fixture {
        Fixture::new("GET", "/api/version", json!("1.0.0"))
            .with_header("content-type", "text/plain")
    }

    /// The default fixture set served when no fixture file is given.
    pub fn default_scenario() -> Vec<Fixture> {
        vec![
            Self::constraints(),
            Self::leagues(),
            Self::create_league(),
            Self::league_by_id(),
            Self::teams(),
            Self::create_team(),
            Self::version(),
        ]
    }

    /// Load fixture definitions from a JSON file (an array of fixtures).
    pub fn from_file(path: &Path) -> Result<Vec<Fixture>> {
        let text = fs::read_to_string(path).map_err(|e| StubError::FixtureFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&text).map_err(|e| StubError::FixtureFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pattern_matches() {
        let pattern = PathPattern::parse("/api/leagues-management/constraints");

        assert!(pattern.capture("/api/leagues-management/constraints").is_some());
        assert!(pattern.capture("/api/leagues-management/other").is_none());
        assert!(pattern.capture("/api/leagues-management").is_none());
        assert_eq!(pattern.wildcard_count(), 0);
    }

    #[test]
    fn test_parameterized_pattern_captures() {
        let pattern = PathPattern::parse("/items/:id");

        let params = pattern.capture("/items/42").expect("should match");
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert_eq!(pattern.wildcard_count(), 1);

        // Params capture a single segment only
        assert!(pattern.capture("/items/42/extra").is_none());
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let pattern = PathPattern::parse("/items");

        assert!(pattern.capture("/items/").is_some());
        assert!(pattern.capture("/items").is_some());
    }

    #[test]
    fn test_capture_decodes_segments() {
        let pattern = PathPattern::parse("/items/:id");

        let params = pattern.capture("/items/custom%2B1").expect("should match");
        assert_eq!(params.get("id").map(String::as_str), Some("custom+1"));
    }

    #[test]
    fn test_substitute_params_in_nested_body() {
        let mut params = HashMap::new();
        params.insert("id".to_string(), "premier".to_string());

        let body = json!({ "id": "{id}", "nested": { "label": "League {id}" } });
        let rendered = substitute_params(&body, &params);

        assert_eq!(
            rendered,
            json!({ "id": "premier", "nested": { "label": "League premier" } })
        );
    }

    #[test]
    fn test_fixture_deserializes_with_defaults() {
        let fixture: Fixture =
            serde_json::from_str(r#"{ "method": "GET", "path": "/ping" }"#).unwrap();

        assert_eq!(fixture.status, 200);
        assert!(fixture.headers.is_empty());
        assert_eq!(fixture.body, Value::Null);
        assert!(!fixture.stateful);
    }

    #[test]
    fn test_default_scenario_includes_readiness_target() {
        let fixtures = Fixtures::default_scenario();

        assert!(fixtures
            .iter()
            .any(|f| f.path == "/api/leagues-management/constraints" && f.method == "GET"));
    }
}
