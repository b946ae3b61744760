//! Integration tests for the request pipeline and session refresh

use serde_json::json;
use std::sync::{Arc, Mutex};
use tensorbin_http::client::token_store::StoredToken;
use tensorbin_http::{
    ClientError, MemoryTokenStore, SessionEvent, TensorbinClient, TokenKind, TokenStore,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn tokens_json(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": 1800
    })
}

fn no_authorization(req: &Request) -> bool {
    !req.headers.contains_key("authorization")
}

struct Harness {
    client: TensorbinClient,
    store: Arc<MemoryTokenStore>,
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

fn harness(server: &MockServer) -> Harness {
    let store = Arc::new(MemoryTokenStore::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let client = TensorbinClient::builder()
        .base_url(server.uri())
        .token_store(store.clone())
        .on_session_event(move |event| sink.lock().unwrap().push(event))
        .build()
        .unwrap();

    Harness {
        client,
        store,
        events,
    }
}

async fn get_profile(client: &TensorbinClient) -> Result<serde_json::Value, ClientError> {
    client
        .execute(|| Ok(client.request(reqwest::Method::GET, "/auth/me")))
        .await
}

#[tokio::test]
async fn test_client_builder() {
    let client = TensorbinClient::builder()
        .base_url("http://localhost:8000/api/v1/")
        .build();

    assert!(client.is_ok());
    let client = client.unwrap();
    assert_eq!(client.base_url(), "http://localhost:8000/api/v1");
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = TensorbinClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));

    let result = TensorbinClient::new("localhost without scheme");
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_bearer_attached_when_token_present() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server);
    h.store.set("access-1", "refresh-1").unwrap();

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let body = get_profile(&h.client).await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_request_sent_unauthenticated_without_token() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server);

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(no_authorization)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    assert!(get_profile(&h.client).await.is_ok());
}

#[tokio::test]
async fn test_refresh_then_replay_once() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server);
    h.store.set("stale", "refresh-1").unwrap();

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid token"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(no_authorization)
        .and(body_json(json!({"refresh_token": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens_json("fresh", "refresh-2")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let body = get_profile(&h.client).await.unwrap();
    assert_eq!(body["id"], 1);
    assert_eq!(h.store.get(TokenKind::Access).as_deref(), Some("fresh"));
    assert_eq!(h.store.get(TokenKind::Refresh).as_deref(), Some("refresh-2"));
    assert!(h.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_second_401_is_not_retried() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server);
    h.store.set("stale", "refresh-1").unwrap();

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid token"})))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens_json("fresh", "refresh-2")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = get_profile(&h.client).await;
    match result {
        Err(ClientError::AuthenticationFailed(message)) => assert_eq!(message, "Invalid token"),
        other => panic!("expected AuthenticationFailed, got {other:?}"),
    }

    let requests = mock_server.received_requests().await.unwrap();
    let auth_headers: Vec<_> = requests
        .iter()
        .filter(|r| r.url.path() == "/auth/me")
        .map(|r| r.headers.get("authorization").unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(auth_headers, vec!["Bearer stale", "Bearer fresh"]);
}

#[tokio::test]
async fn test_failed_refresh_clears_tokens() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server);
    h.store.set("stale", "revoked").unwrap();

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid refresh token"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = get_profile(&h.client).await;
    match result {
        Err(ClientError::AuthenticationFailed(message)) => {
            assert_eq!(message, "Invalid refresh token");
        }
        other => panic!("expected refresh failure, got {other:?}"),
    }

    assert_eq!(h.store.get(TokenKind::Access), None);
    assert_eq!(h.store.get(TokenKind::Refresh), None);
    assert_eq!(*h.events.lock().unwrap(), vec![SessionEvent::RefreshFailed]);
}

#[tokio::test]
async fn test_requests_after_failed_refresh_carry_no_credential() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server);
    h.store.set("stale", "revoked").unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let _ = h
        .client
        .execute_unit(|| Ok(h.client.request(reqwest::Method::GET, "/files/1")))
        .await;
    let second = h
        .client
        .execute_unit(|| Ok(h.client.request(reqwest::Method::GET, "/files/1")))
        .await;
    assert!(matches!(second, Err(ClientError::AuthenticationFailed(_))));

    let requests = mock_server.received_requests().await.unwrap();
    let file_requests: Vec<_> = requests.iter().filter(|r| r.url.path() == "/files/1").collect();
    assert_eq!(file_requests.len(), 2);
    assert!(file_requests[0].headers.contains_key("authorization"));
    assert!(!file_requests[1].headers.contains_key("authorization"));
    assert_eq!(
        *h.events.lock().unwrap(),
        vec![SessionEvent::RefreshFailed, SessionEvent::LoginRequired]
    );
}

#[tokio::test]
async fn test_401_without_refresh_token_requires_login() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server);

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Not authenticated"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens_json("a", "r")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = get_profile(&h.client).await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed(ref m)) if m == "Not authenticated"));
    assert_eq!(*h.events.lock().unwrap(), vec![SessionEvent::LoginRequired]);
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server);
    h.store.set("unused", "refresh-1").unwrap();
    h.store.insert(
        TokenKind::Access,
        StoredToken {
            value: "expired".into(),
            expires_at: chrono::Utc::now() - chrono::Duration::minutes(5),
        },
    );

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(no_authorization)
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens_json("fresh", "refresh-2")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    assert!(get_profile(&h.client).await.is_ok());
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server);
    h.store.set("stale", "refresh-1").unwrap();

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens_json("fresh", "refresh-2")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let (first, second) = tokio::join!(get_profile(&h.client), get_profile(&h.client));
    assert!(first.is_ok());
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_non_401_errors_pass_through() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server);
    h.store.set("access-1", "refresh-1").unwrap();

    Mock::given(method("GET"))
        .and(path("/files/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "File not found"})))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/500"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens_json("a", "r")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let not_found = h
        .client
        .execute_unit(|| Ok(h.client.request(reqwest::Method::GET, "/files/404")))
        .await;
    assert!(matches!(not_found, Err(ClientError::NotFound(ref m)) if m == "File not found"));

    let server_error = h
        .client
        .execute_unit(|| Ok(h.client.request(reqwest::Method::GET, "/files/500")))
        .await;
    assert!(matches!(
        server_error,
        Err(ClientError::ServerError { status: 500, ref message }) if message == "boom"
    ));

    assert_eq!(h.store.get(TokenKind::Access).as_deref(), Some("access-1"));
    assert!(h.events.lock().unwrap().is_empty());
}
