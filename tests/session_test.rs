//! Integration tests for the session client: header handling, outcome
//! classification, and the token lifecycle, against a mock backend.

use std::sync::Arc;
use std::time::Duration;
use storefront_client::{
    config::{ClientConfig, DiagnosticsConfig, MonitorConfig},
    events::EventBroadcaster,
    session::{Credentials, SessionClient},
    ApiError, ClientEvent, MemoryTokenStore, TokenStore,
};
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(api_base_url: &str) -> ClientConfig {
    ClientConfig {
        api_base_url: api_base_url.to_string(),
        asset_base_url: api_base_url.to_string(),
        data_dir: std::env::temp_dir(),
        log: "error".to_string(),
        log_format: "pretty".to_string(),
        request_timeout_secs: 5,
        monitor: MonitorConfig::default(),
        diagnostics: DiagnosticsConfig::default(),
    }
}

fn make_client(server_url: &str, store: Arc<dyn TokenStore>) -> (SessionClient, EventBroadcaster) {
    let broadcaster = EventBroadcaster::new();
    let client = SessionClient::new(&test_config(server_url), store, broadcaster.clone()).unwrap();
    (client, broadcaster)
}

#[tokio::test]
async fn success_parses_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "1", "email": "user@example.com"
        })))
        .mount(&server)
        .await;

    let (client, _) = make_client(&server.uri(), Arc::new(MemoryTokenStore::new()));
    let body = client.current_user().await.unwrap();
    assert_eq!(body["email"], "user@example.com");
}

#[tokio::test]
async fn stored_token_is_sent_as_bearer_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer restored-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    // Token restored from the store at construction, no explicit login.
    let store = Arc::new(MemoryTokenStore::with_token("restored-token"));
    let (client, _) = make_client(&server.uri(), store);
    client.current_user().await.unwrap();
}

#[tokio::test]
async fn http_401_clears_token_and_broadcasts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("expired"));
    let (client, broadcaster) = make_client(&server.uri(), store.clone() as Arc<dyn TokenStore>);
    let mut events = broadcaster.subscribe();

    let err = client.current_user().await.unwrap_err();
    assert!(matches!(err, ApiError::AuthRequired));
    assert_eq!(err.status(), Some(401));

    // Both the cache and the durable store are cleared.
    assert!(!client.has_token().await);
    assert_eq!(store.get(), None);

    // The shell is told to redirect; the client itself never navigates.
    assert_eq!(events.try_recv().unwrap(), ClientEvent::SessionInvalidated);
}

#[tokio::test]
async fn request_after_401_carries_no_auth_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    // Reject anything still carrying an Authorization header.
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("expired"));
    let (client, _) = make_client(&server.uri(), store);

    let _ = client.current_user().await.unwrap_err();
    // Succeeds only because the header is gone.
    client.get("/products").await.unwrap();
}

#[tokio::test]
async fn http_error_extracts_detail_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({"detail": "not found"})),
        )
        .mount(&server)
        .await;

    let (client, _) = make_client(&server.uri(), Arc::new(MemoryTokenStore::new()));
    match client.get("/missing").await.unwrap_err() {
        ApiError::Http { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "not found");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn http_error_synthesizes_message_for_unparsable_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let (client, _) = make_client(&server.uri(), Arc::new(MemoryTokenStore::new()));
    match client.get("/broken").await.unwrap_err() {
        ApiError::Http { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "HTTP 500");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    // Nothing listens here.
    let (client, _) = make_client("http://127.0.0.1:9", Arc::new(MemoryTokenStore::new()));
    let err = client.get("/health").await.unwrap_err();
    assert!(err.is_network(), "expected Network, got {err:?}");
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn login_stores_token_and_authenticates_following_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(serde_json::json!({
            "email": "user@example.com",
            "password": "hunter2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-token",
            "user": {"email": "user@example.com"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let (client, _) = make_client(&server.uri(), store.clone() as Arc<dyn TokenStore>);

    let resp = client
        .login(&Credentials {
            email: "user@example.com".to_string(),
            password: "hunter2".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(resp.access_token, "fresh-token");

    // Token persisted before login returned.
    assert_eq!(store.get().as_deref(), Some("fresh-token"));
    client.current_user().await.unwrap();
}

#[tokio::test]
async fn refresh_token_restores_the_new_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/refresh-token"))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "renewed-token"
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("old-token"));
    let (client, _) = make_client(&server.uri(), store.clone() as Arc<dyn TokenStore>);

    let resp = client.refresh_token().await.unwrap();
    assert_eq!(resp.access_token, "renewed-token");
    assert_eq!(store.get().as_deref(), Some("renewed-token"));
}

#[tokio::test]
async fn logout_drops_the_token_without_an_invalidation_event() {
    let (client, broadcaster) = make_client(
        "http://127.0.0.1:9",
        Arc::new(MemoryTokenStore::with_token("tok")),
    );
    let mut events = broadcaster.subscribe();

    client.logout().await;
    assert!(!client.has_token().await);
    // Explicit logout is not a forced teardown.
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn slow_endpoint_times_out_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({}))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let (client, _) = make_client(&server.uri(), Arc::new(MemoryTokenStore::new()));
    let err = client
        .request_with_timeout(
            reqwest::Method::GET,
            "/slow",
            None,
            Some(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();
    assert!(err.is_network(), "expected Network, got {err:?}");
}
