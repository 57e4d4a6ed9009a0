//! Protocol tests against a mock registry

use std::time::Duration;

use serde_json::{json, Map, Value};
use spool_core::error::SpoolError;
use spool_core::types::Credentials;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use super::*;
use crate::client::RegistryConfig;
use crate::retry::RetryConfig;

fn client_for(server: &MockServer) -> RegistryClient {
    RegistryClient::with_config(RegistryConfig {
        registry: server.uri(),
        retry: RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        },
        ..RegistryConfig::default()
    })
    .unwrap()
}

fn creds() -> Credentials {
    Credentials::token("secret")
}

fn manifest(version: &str) -> Map<String, Value> {
    match json!({ "name": "widget", "version": version, "description": "widgets" }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

async fn requests(server: &MockServer, verb: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.to_string() == verb)
        .collect()
}

fn body_of(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap()
}

fn ok(rev: &str) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(json!({ "ok": true, "rev": rev }))
}

fn conflict() -> ResponseTemplate {
    ResponseTemplate::new(409).set_body_json(json!({
        "error": "conflict",
        "reason": "Document update conflict."
    }))
}

async fn serve_document(server: &MockServer, document: Value) {
    Mock::given(method("GET"))
        .and(path("/widget"))
        .and(query_param("write", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document))
        .mount(server)
        .await;
}

fn existing_document() -> Value {
    json!({
        "_id": "widget",
        "_rev": "3-abc",
        "name": "widget",
        "dist-tags": { "latest": "1.0.0" },
        "versions": { "1.0.0": { "name": "widget", "version": "1.0.0" } },
        "_revisions": { "start": 3 }
    })
}

#[tokio::test]
async fn test_first_publish_is_a_single_write() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/widget"))
        .respond_with(ok("1-a"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = PublishRequest::new(manifest("1.0.0"), b"tarball".to_vec());
    let outcome = client.publish(&request, &creds()).await.unwrap();

    let MutationOutcome::Applied(document) = outcome else {
        panic!("expected the document to be written");
    };
    assert_eq!(document.rev.as_deref(), Some("1-a"));
    assert_eq!(requests(&mock_server, "GET").await.len(), 0);

    let sent = body_of(&requests(&mock_server, "PUT").await[0]);
    assert!(sent.get("_rev").is_none());
    assert_eq!(sent["dist-tags"]["latest"], "1.0.0");
    assert!(sent["_attachments"]["widget-1.0.0.tgz"]["data"].is_string());
}

#[tokio::test]
async fn test_publish_conflict_is_reconciled() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/widget"))
        .respond_with(conflict())
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    serve_document(&mock_server, existing_document()).await;
    Mock::given(method("PUT"))
        .and(path("/widget/-rev/3-abc"))
        .respond_with(ok("4-def"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = PublishRequest::new(manifest("2.0.0"), b"v2".to_vec());
    let outcome = client.publish(&request, &creds()).await.unwrap();

    assert!(matches!(outcome, MutationOutcome::Applied(_)));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);

    let puts = requests(&mock_server, "PUT").await;
    let merged = body_of(&puts[1]);
    assert_eq!(merged["_rev"], "3-abc");
    assert_eq!(merged["dist-tags"]["latest"], "2.0.0");
    assert!(merged["versions"].get("1.0.0").is_some());
    assert!(merged["versions"].get("2.0.0").is_some());
    assert!(merged.get("_revisions").is_none());
}

#[tokio::test]
async fn test_publishing_an_existing_version_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/widget"))
        .respond_with(conflict())
        .mount(&mock_server)
        .await;
    serve_document(&mock_server, existing_document()).await;

    let client = client_for(&mock_server);
    let request = PublishRequest::new(manifest("1.0.0"), Vec::new());
    let err = client.publish(&request, &creds()).await.unwrap_err();

    match err {
        SpoolError::PublishConflict { name, version } => {
            assert_eq!(name, "widget");
            assert_eq!(version, "1.0.0");
        },
        other => panic!("Expected PublishConflict, got {:?}", other),
    }
    assert_eq!(requests(&mock_server, "PUT").await.len(), 1);
}

#[tokio::test]
async fn test_second_conflict_is_returned() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/widget"))
        .respond_with(conflict())
        .mount(&mock_server)
        .await;
    serve_document(&mock_server, existing_document()).await;
    Mock::given(method("PUT"))
        .and(path("/widget/-rev/3-abc"))
        .respond_with(conflict())
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = PublishRequest::new(manifest("2.0.0"), Vec::new());
    let err = client.publish(&request, &creds()).await.unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(requests(&mock_server, "PUT").await.len(), 2);
}

#[tokio::test]
async fn test_unpublishing_the_only_version_deletes_the_document() {
    let mock_server = MockServer::start().await;

    serve_document(
        &mock_server,
        json!({
            "_id": "widget",
            "_rev": "1-a",
            "dist-tags": { "latest": "1.0.0" },
            "versions": { "1.0.0": { "name": "widget", "version": "1.0.0" } }
        }),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/widget/-rev/1-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.unpublish("widget", "1.0.0", &creds()).await.unwrap();

    assert_eq!(result.outcome, MutationOutcome::Deleted);
    assert!(result.failed_attachments.is_empty());
    assert_eq!(requests(&mock_server, "PUT").await.len(), 0);
}

#[tokio::test]
async fn test_unpublish_detaches_tarballs_and_reports_failures() {
    let mock_server = MockServer::start().await;
    let tarball = format!("{}/widget/-/widget-2.0.0.tgz", mock_server.uri());
    let linux = format!("{}/widget/-/widget-2.0.0-linux.tgz", mock_server.uri());

    serve_document(
        &mock_server,
        json!({
            "_id": "widget",
            "_rev": "5-e",
            "dist-tags": { "latest": "2.0.0" },
            "versions": {
                "1.0.0": { "name": "widget", "version": "1.0.0" },
                "2.0.0": {
                    "name": "widget",
                    "version": "2.0.0",
                    "dist": {
                        "tarball": tarball,
                        "bin": { "linux-x64": { "tarball": linux } }
                    }
                }
            }
        }),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/widget/-rev/5-e"))
        .respond_with(ok("6-f"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/widget/-/widget-2.0.0.tgz/-rev/5-e"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/widget/-/widget-2.0.0-linux.tgz/-rev/5-e"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "forbidden" })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.unpublish("widget", "2.0.0", &creds()).await.unwrap();

    let MutationOutcome::Applied(document) = &result.outcome else {
        panic!("expected the document to be written");
    };
    assert_eq!(document.dist_tags["latest"], "1.0.0");

    assert_eq!(result.failed_attachments.len(), 1);
    let (failed, error) = &result.failed_attachments[0];
    assert_eq!(failed, &linux);
    assert_eq!(error.code(), "E403");

    // One read for the write, then a fresh revision per tarball
    assert_eq!(requests(&mock_server, "GET").await.len(), 3);
}

#[tokio::test]
async fn test_unpublish_of_missing_package() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/widget"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "not_found" })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.unpublish("widget", "1.0.0", &creds()).await.unwrap_err();
    assert!(matches!(err, SpoolError::PackageNotFound { .. }));
}

#[tokio::test]
async fn test_unchanged_mutation_skips_the_write() {
    let mock_server = MockServer::start().await;
    serve_document(&mock_server, existing_document()).await;

    let client = client_for(&mock_server);
    let outcome = client
        .add_dist_tag("widget", "1.0.0", "latest", &creds())
        .await
        .unwrap();

    assert!(outcome.is_unchanged());
    assert_eq!(requests(&mock_server, "PUT").await.len(), 0);
}

#[tokio::test]
async fn test_dist_tag_write_after_conflict() {
    let mock_server = MockServer::start().await;
    serve_document(&mock_server, existing_document()).await;

    Mock::given(method("PUT"))
        .and(path("/widget/-rev/3-abc"))
        .respond_with(conflict())
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/widget/-rev/3-abc"))
        .respond_with(ok("4-x"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .add_dist_tag("widget", "1.0.0", "stable", &creds())
        .await
        .unwrap();

    let puts = requests(&mock_server, "PUT").await;
    assert_eq!(puts.len(), 2);
    assert_eq!(body_of(&puts[1])["dist-tags"]["stable"], "1.0.0");
    assert_eq!(requests(&mock_server, "GET").await.len(), 2);
}

#[tokio::test]
async fn test_latest_tag_cannot_be_removed() {
    let mock_server = MockServer::start().await;

    let client = client_for(&mock_server);
    let err = client
        .remove_dist_tag("widget", "latest", &creds())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "EINVALID");
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_star_with_token_asks_whoami() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/-/whoami"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "alice" })))
        .expect(1)
        .mount(&mock_server)
        .await;
    serve_document(&mock_server, existing_document()).await;
    Mock::given(method("PUT"))
        .and(path("/widget/-rev/3-abc"))
        .respond_with(ok("4-s"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.star("widget", true, &creds()).await.unwrap();

    let sent = body_of(&requests(&mock_server, "PUT").await[0]);
    assert_eq!(
        sent,
        json!({ "_id": "widget", "_rev": "3-abc", "users": { "alice": true } })
    );
}

#[tokio::test]
async fn test_deprecate_writes_matching_versions() {
    let mock_server = MockServer::start().await;
    serve_document(&mock_server, existing_document()).await;

    Mock::given(method("PUT"))
        .and(path("/widget/-rev/3-abc"))
        .respond_with(ok("4-d"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .deprecate("widget", "<2.0.0", "use 2.x", &creds())
        .await
        .unwrap();

    let sent = body_of(&requests(&mock_server, "PUT").await[0]);
    assert_eq!(sent["versions"]["1.0.0"]["deprecated"], "use 2.x");
}

#[tokio::test]
async fn test_mutations_require_credentials() {
    let mock_server = MockServer::start().await;
    let client = client_for(&mock_server);
    let anonymous = Credentials::anonymous();

    assert!(matches!(
        client.star("widget", true, &anonymous).await,
        Err(SpoolError::AuthRequired { .. })
    ));
    assert!(matches!(
        client.deprecate("widget", "*", "x", &anonymous).await,
        Err(SpoolError::AuthRequired { .. })
    ));
    assert!(matches!(
        client.unpublish("widget", "1.0.0", &anonymous).await,
        Err(SpoolError::AuthRequired { .. })
    ));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}
