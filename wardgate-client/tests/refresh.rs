//! Behavior of the guarded send under credential expiry.
//!
//! Scripted transports cover the scheduling-sensitive properties (single
//! flight, FIFO release, terminal failure fan-out); wiremock covers the same
//! flows end to end over real HTTP.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wardgate_client::{
    ApiClient, ApiError, ApiRequest, ClientConfig, CredentialStore, FileStore, HttpTransport,
    MemoryStore, RawResponse, SessionEndReason, SessionEvent, SessionManager, TokenPair, Transport,
};

fn ok_envelope(data: Value) -> RawResponse {
    RawResponse {
        status: StatusCode::OK,
        body: serde_json::to_vec(&json!({
            "code": 200,
            "message": "success",
            "data": data,
        }))
        .unwrap(),
    }
}

fn unauthorized() -> RawResponse {
    RawResponse {
        status: StatusCode::UNAUTHORIZED,
        body: Vec::new(),
    }
}

/// Scripted backend: protected endpoints accept only the `granted` token;
/// the refresh exchange mints it, optionally parking until notified or
/// rejecting the refresh token outright.
struct FakeBackend {
    calls: Mutex<Vec<String>>,
    refresh_calls: AtomicUsize,
    hold_refresh: Option<Arc<Notify>>,
    fail_refresh: bool,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            hold_refresh: None,
            fail_refresh: false,
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        self.calls.lock().push(request.path.clone());
        if request.path == "/auth/refresh" {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(hold) = &self.hold_refresh {
                hold.notified().await;
            }
            if self.fail_refresh {
                return Ok(unauthorized());
            }
            return Ok(ok_envelope(json!({
                "accessToken": "granted",
                "refreshToken": "granted-refresh",
            })));
        }
        match &request.bearer {
            Some(token) if token.expose() == "granted" => {
                Ok(ok_envelope(json!({ "path": request.path })))
            }
            _ => Ok(unauthorized()),
        }
    }
}

/// Spawn a guarded send and let it run until it parks on the gate.
async fn spawn_settled(
    client: &Arc<ApiClient>,
    path: String,
) -> tokio::task::JoinHandle<Result<Value, ApiError>> {
    let client = client.clone();
    let handle = tokio::spawn(async move { client.send::<Value>(ApiRequest::get(path)).await });
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    handle
}

#[tokio::test]
async fn test_queued_callers_release_in_fifo_order() {
    let hold = Arc::new(Notify::new());
    let backend = Arc::new(FakeBackend {
        hold_refresh: Some(hold.clone()),
        ..FakeBackend::new()
    });
    let store = Arc::new(MemoryStore::with_pair(
        TokenPair::new("stale").with_refresh_token("refresh-1"),
    ));
    let client = Arc::new(ApiClient::new(backend.clone(), store));

    let mut handles = Vec::new();
    for i in 0..5 {
        handles.push(spawn_settled(&client, format!("/papers/{i}")).await);
    }

    // Everyone is either leading the refresh or queued; let it resolve.
    hold.notify_one();
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(backend.refresh_calls(), 1);
    let calls = backend.calls();
    // First attempts arrive in spawn order and the leader starts one
    // refresh; after it resolves, the replays run in queue order.
    assert_eq!(calls[..2], ["/papers/0".to_string(), "/auth/refresh".to_string()]);
    let replays: Vec<String> = calls[calls.len() - 5..].to_vec();
    let expected: Vec<String> = (0..5).map(|i| format!("/papers/{i}")).collect();
    assert_eq!(replays, expected);
}

#[tokio::test]
async fn test_refresh_failure_rejects_all_queued_callers() {
    let hold = Arc::new(Notify::new());
    let backend = Arc::new(FakeBackend {
        hold_refresh: Some(hold.clone()),
        fail_refresh: true,
        ..FakeBackend::new()
    });
    let store = Arc::new(MemoryStore::with_pair(
        TokenPair::new("stale").with_refresh_token("dead-refresh"),
    ));
    let client = Arc::new(ApiClient::new(backend.clone(), store.clone()));
    let mut events = client.subscribe();

    let mut handles = Vec::new();
    for i in 0..4 {
        handles.push(spawn_settled(&client, format!("/papers/{i}")).await);
    }

    hold.notify_one();
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ApiError::Unauthenticated)));
    }

    // One refresh attempt, queued calls failed without replay, session gone.
    assert_eq!(backend.refresh_calls(), 1);
    assert!(store.load().await.unwrap().is_none());
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Ended(SessionEndReason::RefreshFailed)
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_missing_refresh_token_short_circuits() {
    let backend = Arc::new(FakeBackend::new());
    let store = Arc::new(MemoryStore::with_pair(TokenPair::new("stale")));
    let client = Arc::new(ApiClient::new(backend.clone(), store.clone()));
    let mut events = client.subscribe();

    let result = client.send::<Value>(ApiRequest::get("/papers/feed")).await;

    assert!(matches!(result, Err(ApiError::Unauthenticated)));
    // No refresh exchange was even attempted.
    assert_eq!(backend.refresh_calls(), 0);
    assert!(store.load().await.unwrap().is_none());
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Ended(SessionEndReason::Unauthenticated)
    );
}

#[tokio::test]
async fn test_aborted_leader_releases_queued_callers() {
    let hold = Arc::new(Notify::new());
    let backend = Arc::new(FakeBackend {
        hold_refresh: Some(hold.clone()),
        ..FakeBackend::new()
    });
    let store = Arc::new(MemoryStore::with_pair(
        TokenPair::new("stale").with_refresh_token("refresh-1"),
    ));
    let client = Arc::new(ApiClient::new(backend.clone(), store));

    let leader = spawn_settled(&client, "/papers/0".to_string()).await;
    let waiter = spawn_settled(&client, "/papers/1".to_string()).await;

    // Drop the leader's future while its refresh exchange is parked.
    leader.abort();
    assert!(leader.await.unwrap_err().is_cancelled());

    // The queued caller must fail rather than stay parked forever.
    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(ApiError::Unauthenticated)));

    // The gate returned to idle: a later caller leads a fresh refresh.
    hold.notify_one();
    let value: Value = client.send(ApiRequest::get("/papers/2")).await.unwrap();
    assert_eq!(value["path"], json!("/papers/2"));
    assert_eq!(backend.refresh_calls(), 2);
}

#[tokio::test]
async fn test_second_expiry_after_successful_refresh_is_fatal() {
    /// Refreshes happily, but rejects every protected call regardless.
    struct AlwaysExpired {
        refresh_calls: AtomicUsize,
        protected_calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for AlwaysExpired {
        async fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
            if request.path == "/auth/refresh" {
                self.refresh_calls.fetch_add(1, Ordering::SeqCst);
                return Ok(ok_envelope(json!({ "accessToken": "granted" })));
            }
            self.protected_calls.fetch_add(1, Ordering::SeqCst);
            Ok(unauthorized())
        }
    }

    let backend = Arc::new(AlwaysExpired {
        refresh_calls: AtomicUsize::new(0),
        protected_calls: AtomicUsize::new(0),
    });
    let store = Arc::new(MemoryStore::with_pair(
        TokenPair::new("stale").with_refresh_token("refresh-1"),
    ));
    let client = Arc::new(ApiClient::new(backend.clone(), store));

    let result = client.send::<Value>(ApiRequest::get("/papers/feed")).await;

    // Original attempt, one refresh, one replay, then fail: no second loop.
    assert!(matches!(result, Err(ApiError::Unauthenticated)));
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.protected_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_valid_credential_passes_straight_through() {
    let backend = Arc::new(FakeBackend::new());
    let store = Arc::new(MemoryStore::with_pair(TokenPair::new("granted")));
    let client = Arc::new(ApiClient::new(backend.clone(), store));

    let value: Value = client
        .send(ApiRequest::get("/papers/feed"))
        .await
        .unwrap();

    assert_eq!(value["path"], json!("/papers/feed"));
    assert_eq!(backend.calls(), vec!["/papers/feed".to_string()]);
    assert_eq!(backend.refresh_calls(), 0);
}

async fn wired_client(server: &MockServer, pair: TokenPair) -> (Arc<ApiClient>, Arc<MemoryStore>) {
    let config = ClientConfig {
        base_url: server.uri().parse().unwrap(),
        ..ClientConfig::default()
    };
    let store = Arc::new(MemoryStore::with_pair(pair));
    let transport = Arc::new(HttpTransport::new(&config).unwrap());
    let client = Arc::new(ApiClient::new(transport, store.clone()));
    (client, store)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_expiries_share_one_refresh() {
    let server = MockServer::start().await;

    // The refresh answer is delayed so every caller sees its 401 while the
    // exchange is still in flight.
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_string_contains("refreshToken"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_json(json!({
                    "code": 200,
                    "message": "success",
                    "data": {"accessToken": "fresh-token", "refreshToken": "fresh-refresh"},
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/papers/feed"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "success",
            "data": {"items": [1, 2, 3]},
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/papers/feed"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (client, store) = wired_client(
        &server,
        TokenPair::new("stale-token").with_refresh_token("refresh-1"),
    )
    .await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.send::<Value>(ApiRequest::get("/papers/feed")).await
        }));
    }
    for handle in handles {
        let value = handle.await.unwrap().unwrap();
        assert_eq!(value["items"], json!([1, 2, 3]));
    }

    let pair = store.load().await.unwrap().unwrap();
    assert_eq!(pair.access_token.expose(), "fresh-token");
    assert_eq!(pair.refresh_token.unwrap().expose(), "fresh-refresh");
    server.verify().await;
}

#[tokio::test]
async fn test_application_error_passes_through_without_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    // Application failure rides on HTTP 200; only the envelope code differs.
    Mock::given(method("GET"))
        .and(path("/papers/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 500,
            "message": "x",
            "data": null,
        })))
        .mount(&server)
        .await;

    let (client, _) = wired_client(&server, TokenPair::new("valid-token")).await;
    let result = client.send::<Value>(ApiRequest::get("/papers/feed")).await;

    match result {
        Err(ApiError::Application { code, message }) => {
            assert_eq!(code, 500);
            assert_eq!(message, "x");
        }
        other => panic!("expected Application error, got {other:?}"),
    }
    server.verify().await;
}

#[tokio::test]
async fn test_login_then_expired_call_refreshes_once() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "success",
            "data": {
                "accessToken": "short-lived",
                "refreshToken": "refresh-1",
                "userId": 1,
                "username": "alice",
                "role": "USER",
            },
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "success",
            "data": {"accessToken": "fresh-token"},
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/papers/feed"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "success",
            "data": {"ok": true},
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/papers/feed"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = ClientConfig {
        base_url: server.uri().parse().unwrap(),
        credentials_path: Some(dir.path().join("creds.json")),
        ..ClientConfig::default()
    };
    let store = Arc::new(FileStore::open(config.credentials_file()).await.unwrap());
    let transport = Arc::new(HttpTransport::new(&config).unwrap());
    let client = Arc::new(ApiClient::new(transport, store.clone()));
    let session = SessionManager::new(client.clone());

    let user = session.login("alice", "password").await.unwrap();
    assert_eq!(user.username, "alice");

    // The pair reached disk, not just memory.
    let persisted = FileStore::open(config.credentials_file()).await.unwrap();
    assert_eq!(
        persisted.load().await.unwrap().unwrap().access_token.expose(),
        "short-lived"
    );

    let value: Value = client.send(ApiRequest::get("/papers/feed")).await.unwrap();
    assert_eq!(value["ok"], json!(true));

    // Refresh replaced the pair; the omitted refresh token was carried over.
    let pair = store.load().await.unwrap().unwrap();
    assert_eq!(pair.access_token.expose(), "fresh-token");
    assert_eq!(pair.refresh_token.unwrap().expose(), "refresh-1");
    server.verify().await;
}
