//! Loading fixture definitions from a JSON file.

use std::io::Write;

use serde_json::{json, Value};
use tempfile::NamedTempFile;

use apistub::{Fixtures, ServerState, StubServer};

fn write_fixture_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("failed to write fixture file");
    file
}

#[test]
fn test_from_file_parses_fixture_array() {
    let file = write_fixture_file(
        r#"[
            { "method": "GET", "path": "/api/ping", "body": { "pong": true } },
            { "method": "GET", "path": "/api/items", "body": [] },
            { "method": "POST", "path": "/api/items", "status": 201, "stateful": true }
        ]"#,
    );

    let fixtures = Fixtures::from_file(file.path()).expect("file should parse");

    assert_eq!(fixtures.len(), 3);
    assert_eq!(fixtures[0].path, "/api/ping");
    assert_eq!(fixtures[2].status, 201);
    assert!(fixtures[2].stateful);
}

#[test]
fn test_from_file_reports_parse_errors() {
    let file = write_fixture_file("{ not json ]");

    let result = Fixtures::from_file(file.path());

    let err = result.expect_err("invalid JSON should fail");
    assert!(err.to_string().contains("fixture file"));
}

#[test]
fn test_from_file_reports_missing_file() {
    let result = Fixtures::from_file(std::path::Path::new("/no/such/fixtures.json"));

    assert!(result.is_err());
}

#[tokio::test]
async fn test_server_serves_file_loaded_fixtures() {
    let file = write_fixture_file(
        r#"[
            { "method": "GET", "path": "/api/ping", "body": { "pong": true } },
            { "method": "GET", "path": "/api/items", "body": [] },
            { "method": "POST", "path": "/api/items", "status": 201, "stateful": true }
        ]"#,
    );

    let fixtures = Fixtures::from_file(file.path()).unwrap();
    let server = StubServer::with_state(
        Default::default(),
        ServerState::new().with_fixtures(fixtures),
    )
    .await
    .unwrap();
    let client = reqwest::Client::new();

    let pong: Value = client
        .get(format!("{}/api/ping", server.url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pong, json!({ "pong": true }));

    let response = client
        .post(format!("{}/api/items", server.url()))
        .json(&json!({ "id": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let items: Value = client
        .get(format!("{}/api/items", server.url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(items, json!([{ "id": 1 }]));

    server.stop().await.unwrap();
}
