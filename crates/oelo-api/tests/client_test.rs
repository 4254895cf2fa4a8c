#![allow(clippy::unwrap_used)]
// Integration tests for `ControllerClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oelo_api::{ControllerClient, ControllerTransport, Error, ErrorKind, PatternCommand, Rgb};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ControllerClient) {
    setup_with_timeout(Duration::from_secs(5)).await
}

async fn setup_with_timeout(timeout: Duration) -> (MockServer, ControllerClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = ControllerClient::with_client(reqwest::Client::new(), base_url, timeout);
    (server, client)
}

// ── Status query ────────────────────────────────────────────────────

#[tokio::test]
async fn test_query_status() {
    let (server, client) = setup().await;

    let body = json!([
        {
            "num": 1,
            "isOn": true,
            "pattern": "chase",
            "speed": 4,
            "gap": 1,
            "direction": "R",
            "numberOfColors": 2,
            "colorStr": "255,0,0,0,0,255"
        },
        { "num": 2, "isOn": false, "pattern": "off", "colorStr": "0,0,0" }
    ]);

    Mock::given(method("GET"))
        .and(path("/getController"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let zones = client.query_status().await.unwrap();

    assert_eq!(zones.len(), 2);
    assert_eq!(zones[0].num, 1);
    assert_eq!(zones[0].pattern_type(), "chase");
    assert_eq!(zones[0].speed, 4);
    assert_eq!(
        zones[0].colors(),
        vec![Rgb::new(255, 0, 0), Rgb::new(0, 0, 255)]
    );
    assert!(!zones[1].is_lit());
}

#[tokio::test]
async fn test_query_status_malformed_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/getController"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;

    let result = client.query_status().await;

    assert!(
        matches!(result, Err(Error::BadResponse { .. })),
        "expected BadResponse, got: {result:?}"
    );
}

#[tokio::test]
async fn test_query_status_object_instead_of_array() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/getController"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "num": 1 })))
        .mount(&server)
        .await;

    let err = client.query_status().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadResponse);
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_query_status_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/getController"))
        .respond_with(ResponseTemplate::new(503).set_body_string("rebooting"))
        .mount(&server)
        .await;

    let err = client.query_status().await.unwrap_err();
    assert!(
        matches!(err, Error::Http { status: 503, .. }),
        "expected Http 503, got: {err:?}"
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_query_status_timeout() {
    let (server, client) = setup_with_timeout(Duration::from_millis(100)).await;

    Mock::given(method("GET"))
        .and(path("/getController"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.query_status().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.is_transient());
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_solid_color() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/setPattern"))
        .and(query_param("patternType", "custom"))
        .and(query_param("zones", "3"))
        .and(query_param("num_zones", "1"))
        .and(query_param("colors", "255,128,0"))
        .and(query_param("direction", "F"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Command Received"))
        .expect(1)
        .mount(&server)
        .await;

    client
        .send_command(&PatternCommand::solid(3, Rgb::new(255, 128, 0)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_send_off() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/setPattern"))
        .and(query_param("patternType", "off"))
        .and(query_param("colors", "0,0,0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Command Received"))
        .expect(1)
        .mount(&server)
        .await;

    client.send_command(&PatternCommand::off(1)).await.unwrap();
}

#[tokio::test]
async fn test_send_unexpected_ack_is_accepted() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/setPattern"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    client.send_command(&PatternCommand::off(2)).await.unwrap();
}

#[tokio::test]
async fn test_send_rejected_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/setPattern"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad zone"))
        .mount(&server)
        .await;

    let err = client
        .send_command(&PatternCommand::off(9))
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::Http { status: 400, ref body } if body == "bad zone"),
        "expected Http 400, got: {err:?}"
    );
}

#[tokio::test]
async fn test_connect_refused() {
    // Nothing listens on port 1 on the loopback interface.
    let client = ControllerClient::with_client(
        reqwest::Client::new(),
        Url::parse("http://127.0.0.1:1").unwrap(),
        Duration::from_secs(2),
    );

    let err = client.query_status().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connect);
}
