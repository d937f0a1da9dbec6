//! Stub server state management.
//!
//! [`ServerState`] is the in-memory fixture store: the immutable baseline
//! fixture list plus a mutable overlay for stateful scenarios. One instance
//! exists per server and is handed to the router at construction time, so
//! independent servers (e.g. an e2e tier on one port and a unit tier on
//! another) never share state.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::fixture::{substitute_params, Fixture, PathPattern};

/// Shared handle to a server's state.
///
/// Wrapped in `Arc<RwLock<_>>`; every mutation runs to completion under the
/// write lock, so no request observes a torn intermediate state.
pub type SharedState = Arc<RwLock<ServerState>>;

/// A fixture response as resolved for one concrete request.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

#[derive(Debug)]
struct CompiledFixture {
    def: Fixture,
    pattern: PathPattern,
}

/// In-memory fixture store with a resettable overlay.
#[derive(Debug, Default)]
pub struct ServerState {
    /// Baseline fixtures in registration order.
    fixtures: Vec<CompiledFixture>,

    /// Current representations for mutated paths, keyed by pattern string.
    /// Read and write fixtures registered on the same pattern share one
    /// overlay entry, which is what lets a stateful POST show up in the
    /// matching GET.
    overlays: HashMap<String, Value>,

    /// Incremented on every reset.
    generation: u64,
}

impl ServerState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create state wrapped in `Arc<RwLock>` for sharing with the router.
    pub fn shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    /// Add a fixture (builder style).
    pub fn with_fixture(mut self, fixture: Fixture) -> Self {
        self.register(fixture);
        self
    }

    /// Add several fixtures (builder style).
    pub fn with_fixtures(mut self, fixtures: impl IntoIterator<Item = Fixture>) -> Self {
        for fixture in fixtures {
            self.register(fixture);
        }
        self
    }

    /// Register a fixture, replacing any earlier one with the same
    /// (method, path) key. Last registration wins; the replacement keeps the
    /// original's position in registration order.
    pub fn register(&mut self, fixture: Fixture) {
        let compiled = CompiledFixture {
            pattern: fixture.pattern(),
            def: fixture,
        };

        let existing = self.fixtures.iter_mut().find(|f| {
            f.def.method.eq_ignore_ascii_case(&compiled.def.method)
                && f.def.path == compiled.def.path
        });

        match existing {
            Some(slot) => *slot = compiled,
            None => self.fixtures.push(compiled),
        }
    }

    /// The reset generation counter.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of registered fixtures.
    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    /// Whether any fixtures are registered.
    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Find the best-matching fixture for a request.
    ///
    /// Most specific (fewest parameter segments) wins; ties go to the
    /// first-registered fixture.
    fn find(&self, method: &str, path: &str) -> Option<(usize, HashMap<String, String>)> {
        self.fixtures
            .iter()
            .enumerate()
            .filter(|(_, f)| f.def.method.eq_ignore_ascii_case(method))
            .filter_map(|(idx, f)| f.pattern.capture(path).map(|params| (idx, params)))
            .min_by_key(|(idx, _)| (self.fixtures[*idx].pattern.wildcard_count(), *idx))
    }

    /// Resolve the current response for a request, or `None` if no fixture
    /// matches. The overlay body takes precedence over the baseline; path
    /// parameters are substituted into the result.
    pub fn lookup(&self, method: &str, path: &str) -> Option<StoredResponse> {
        let (idx, params) = self.find(method, path)?;
        let fixture = &self.fixtures[idx];

        let body = self
            .overlays
            .get(fixture.pattern.raw())
            .unwrap_or(&fixture.def.body);

        Some(StoredResponse {
            status: fixture.def.status,
            headers: fixture.def.headers.clone(),
            body: substitute_params(body, &params),
        })
    }

    /// Apply a write request to the matching fixture.
    ///
    /// For stateful fixtures the path's current representation (overlay if
    /// present, else the baseline body of the GET fixture on the same
    /// pattern) is updated: arrays append the request body and answer with
    /// the appended element, objects merge the request body's fields and
    /// answer with the merged object, anything else is replaced. Fixtures
    /// not marked stateful serve their configured response unchanged.
    pub fn apply_mutation(
        &mut self,
        method: &str,
        path: &str,
        body: Value,
    ) -> Option<StoredResponse> {
        let (idx, params) = self.find(method, path)?;

        if !self.fixtures[idx].def.stateful {
            return self.lookup(method, path);
        }

        let raw = self.fixtures[idx].pattern.raw().to_string();
        let current = match self.overlays.get(&raw) {
            Some(value) => value.clone(),
            None => self.baseline_for(&raw, idx).clone(),
        };

        let (next, result) = match current {
            Value::Array(mut items) => {
                items.push(body.clone());
                (Value::Array(items), body)
            }
            Value::Object(mut map) => {
                if let Value::Object(incoming) = body {
                    for (key, value) in incoming {
                        map.insert(key, value);
                    }
                }
                let merged = Value::Object(map);
                (merged.clone(), merged)
            }
            _ => (body.clone(), body),
        };

        self.overlays.insert(raw, next);

        let fixture = &self.fixtures[idx].def;
        Some(StoredResponse {
            status: fixture.status,
            headers: fixture.headers.clone(),
            body: substitute_params(&result, &params),
        })
    }

    /// Discard all overlays and bump the generation counter. After this the
    /// store is observably identical to its baseline.
    pub fn reset(&mut self) -> u64 {
        self.overlays.clear();
        self.generation += 1;
        self.generation
    }

    /// The baseline representation for a pattern: the body of the GET fixture
    /// registered on it, falling back to the mutating fixture's own body.
    fn baseline_for(&self, raw: &str, fallback_idx: usize) -> &Value {
        self.fixtures
            .iter()
            .find(|f| f.pattern.raw() == raw && f.def.method.eq_ignore_ascii_case("GET"))
            .map(|f| &f.def.body)
            .unwrap_or(&self.fixtures[fallback_idx].def.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constraints() -> Fixture {
        Fixture::new(
            "GET",
            "/api/leagues-management/constraints",
            json!({ "maxTeams": 16 }),
        )
    }

    #[test]
    fn test_register_and_lookup() {
        let state = ServerState::new().with_fixture(constraints());

        let response = state
            .lookup("GET", "/api/leagues-management/constraints")
            .expect("fixture should match");

        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({ "maxTeams": 16 }));
        assert!(state.lookup("POST", "/api/leagues-management/constraints").is_none());
        assert!(state.lookup("GET", "/api/other").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let state = ServerState::new()
            .with_fixture(constraints())
            .with_fixture(Fixture::new(
                "GET",
                "/api/leagues-management/constraints",
                json!({ "maxTeams": 8 }),
            ));

        assert_eq!(state.len(), 1);
        let response = state
            .lookup("GET", "/api/leagues-management/constraints")
            .unwrap();
        assert_eq!(response.body, json!({ "maxTeams": 8 }));
    }

    #[test]
    fn test_literal_beats_parameterized() {
        let state = ServerState::new()
            .with_fixture(Fixture::new("GET", "/items/:id", json!({ "which": "param" })))
            .with_fixture(Fixture::new("GET", "/items/special", json!({ "which": "literal" })));

        let response = state.lookup("GET", "/items/special").unwrap();
        assert_eq!(response.body, json!({ "which": "literal" }));

        let response = state.lookup("GET", "/items/other").unwrap();
        assert_eq!(response.body, json!({ "which": "param" }));
    }

    #[test]
    fn test_tie_goes_to_first_registered() {
        let state = ServerState::new()
            .with_fixture(Fixture::new("GET", "/a/:x", json!("first")))
            .with_fixture(Fixture::new("GET", "/:y/b", json!("second")));

        // Both match /a/b with one wildcard each
        let response = state.lookup("GET", "/a/b").unwrap();
        assert_eq!(response.body, json!("first"));
    }

    #[test]
    fn test_param_substitution_in_lookup() {
        let state = ServerState::new().with_fixture(Fixture::new(
            "GET",
            "/leagues/:id",
            json!({ "id": "{id}", "name": "League {id}" }),
        ));

        let response = state.lookup("GET", "/leagues/premier").unwrap();
        assert_eq!(
            response.body,
            json!({ "id": "premier", "name": "League premier" })
        );
    }

    #[test]
    fn test_stateful_append_and_reset() {
        let mut state = ServerState::new()
            .with_fixture(Fixture::new("GET", "/items", json!([])))
            .with_fixture(
                Fixture::new("POST", "/items", Value::Null)
                    .with_status(201)
                    .into_stateful(),
            );

        let created = state
            .apply_mutation("POST", "/items", json!({ "name": "one" }))
            .unwrap();
        assert_eq!(created.status, 201);
        assert_eq!(created.body, json!({ "name": "one" }));

        let listed = state.lookup("GET", "/items").unwrap();
        assert_eq!(listed.body, json!([{ "name": "one" }]));

        state.reset();

        let listed = state.lookup("GET", "/items").unwrap();
        assert_eq!(listed.body, json!([]));
    }

    #[test]
    fn test_stateful_object_merge() {
        let mut state = ServerState::new()
            .with_fixture(Fixture::new("GET", "/profile", json!({ "name": "a", "age": 1 })))
            .with_fixture(Fixture::new("PUT", "/profile", Value::Null).into_stateful());

        let merged = state
            .apply_mutation("PUT", "/profile", json!({ "age": 2 }))
            .unwrap();
        assert_eq!(merged.body, json!({ "name": "a", "age": 2 }));

        let read = state.lookup("GET", "/profile").unwrap();
        assert_eq!(read.body, json!({ "name": "a", "age": 2 }));
    }

    #[test]
    fn test_non_stateful_write_serves_canned_body() {
        let mut state = ServerState::new().with_fixture(
            Fixture::new("POST", "/echo", json!({ "ok": true })).with_status(202),
        );

        let response = state
            .apply_mutation("POST", "/echo", json!({ "ignored": 1 }))
            .unwrap();
        assert_eq!(response.status, 202);
        assert_eq!(response.body, json!({ "ok": true }));
    }

    #[test]
    fn test_reset_is_idempotent_and_bumps_generation() {
        let mut state = ServerState::new().with_fixture(constraints());
        assert_eq!(state.generation(), 0);

        assert_eq!(state.reset(), 1);
        let first = state.lookup("GET", "/api/leagues-management/constraints");

        assert_eq!(state.reset(), 2);
        let second = state.lookup("GET", "/api/leagues-management/constraints");

        // Identical post-state both times
        assert_eq!(first, second);
    }

    #[test]
    fn test_mutation_survives_until_reset_regardless_of_count() {
        let mut state = ServerState::new()
            .with_fixture(Fixture::new("GET", "/items", json!([])))
            .with_fixture(Fixture::new("POST", "/items", Value::Null).into_stateful());

        for i in 0..3 {
            state
                .apply_mutation("POST", "/items", json!({ "n": i }))
                .unwrap();
        }

        let listed = state.lookup("GET", "/items").unwrap();
        assert_eq!(listed.body.as_array().map(Vec::len), Some(3));

        state.reset();
        let listed = state.lookup("GET", "/items").unwrap();
        assert_eq!(listed.body, json!([]));
    }
}
