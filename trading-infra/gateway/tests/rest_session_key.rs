//! Session-key REST client against a mocked exchange API

use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gateway::{RestClient, SessionKeyError, SessionKeyProvider};

// ============================================================================
// Create / keepalive
// ============================================================================

#[tokio::test]
async fn test_create_session_key_posts_with_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fapi/v1/listenKey"))
        .and(header("X-MBX-APIKEY", "my-api-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"listenKey": "pqia91ma19a5s61cv6a81va65sdf19v8a65a1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = RestClient::new(server.uri(), "my-api-key", "secret").unwrap();
    let key = client.create_session_key().await.unwrap();
    assert_eq!(key, "pqia91ma19a5s61cv6a81va65sdf19v8a65a1");
}

#[tokio::test]
async fn test_keepalive_puts_listen_key() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v3/userDataStream"))
        .and(query_param("listenKey", "abc123"))
        .and(header("X-MBX-APIKEY", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = RestClient::new(server.uri(), "k", "s")
        .unwrap()
        .with_listen_key_path("/api/v3/userDataStream");
    client.keepalive_session_key("abc123").await.unwrap();
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_api_error_maps_to_session_key_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/fapi/v1/listenKey"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"code": -1125, "msg": "This listenKey does not exist."})),
        )
        .mount(&server)
        .await;

    let client = RestClient::new(server.uri(), "k", "s").unwrap();
    let err = client.keepalive_session_key("gone").await.unwrap_err();
    assert_eq!(
        err,
        SessionKeyError::Api {
            code: -1125,
            message: "This listenKey does not exist.".into()
        }
    );
}

#[tokio::test]
async fn test_empty_key_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fapi/v1/listenKey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"listenKey": ""})))
        .mount(&server)
        .await;

    let client = RestClient::new(server.uri(), "k", "s").unwrap();
    let err = client.create_session_key().await.unwrap_err();
    assert_eq!(err, SessionKeyError::EmptyKey);
}

#[tokio::test]
async fn test_hung_endpoint_times_out_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fapi/v1/listenKey"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"listenKey": "late"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client =
        RestClient::with_timeout(server.uri(), "k", "s", Duration::from_millis(200)).unwrap();
    let err = tokio::time::timeout(Duration::from_secs(2), client.create_session_key())
        .await
        .expect("request deadline not applied")
        .unwrap_err();
    assert!(matches!(err, SessionKeyError::Network(_)));
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RestClient::new(format!("http://{addr}"), "k", "s").unwrap();
    let err = client.create_session_key().await.unwrap_err();
    assert!(matches!(err, SessionKeyError::Network(_)));
}
