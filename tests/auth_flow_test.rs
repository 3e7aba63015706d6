//! Auth Flow Integration Tests
//!
//! End-to-end session scenarios against a loopback auth server.

use axum::{
    extract::Json,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{json, Value};
use std::sync::Arc;

use dormboard::storage::keys;
use dormboard::{
    ApiError, Config, Credentials, MemoryStorage, Registration, SessionError, SessionStorage,
    SessionStore,
};

/// Fixed far-future expiry so server and assertions build the same token
const FIXTURE_EXP: i64 = 4_102_444_800; // 2100-01-01

fn make_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp).as_bytes());
    format!("{}.{}.sig", header, body)
}

fn fixture_token() -> String {
    make_token(FIXTURE_EXP)
}

fn auth_payload() -> Value {
    json!({
        "token": fixture_token(),
        "id": 7,
        "roleIds": [1, 2],
        "permissions": [
            {"id": 1, "name": "view users"},
            {"id": 2, "name": "View Dormitories"}
        ],
        "firstName": "Aziz",
        "lastName": "Karimov",
        "middleName": null,
        "telegramUsername": "@aziz",
        "phone": "+998901234567",
        "username": "admin",
        "roles": ["ADMIN"],
        "status": "ACTIVE"
    })
}

async fn login_handler(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["username"] == "admin" && body["password"] == "correct" {
        (StatusCode::OK, Json(auth_payload()))
    } else {
        (
            StatusCode::FORBIDDEN,
            Json(json!({"message": "Username or password is wrong"})),
        )
    }
}

async fn register_handler(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["username"].as_str().unwrap_or_default().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Username is required"})),
        );
    }
    (StatusCode::OK, Json(auth_payload()))
}

async fn echo_auth(headers: HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/echo", get(echo_auth))
        .route("/api/forbidden", get(|| async { StatusCode::FORBIDDEN }))
        .route("/api/unauthorized", get(|| async { StatusCode::UNAUTHORIZED }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fixture server");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Fixture server died");
    });
    format!("http://{}", addr)
}

/// Shared handle so tests can inspect storage after the store takes a box
#[derive(Clone, Default)]
struct SharedStorage(Arc<MemoryStorage>);

impl SessionStorage for SharedStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key)
    }
    fn set(&self, key: &str, value: &str) -> Result<(), dormboard::StorageError> {
        self.0.set(key, value)
    }
    fn remove(&self, key: &str) -> Result<(), dormboard::StorageError> {
        self.0.remove(key)
    }
}

async fn connected_store() -> (Arc<SessionStore>, SharedStorage) {
    let base_url = spawn_server().await;
    let storage = SharedStorage::default();
    let store = Arc::new(SessionStore::new(
        Config::with_base_url(base_url),
        Box::new(storage.clone()),
    ));
    (store, storage)
}

fn good_credentials() -> Credentials {
    Credentials {
        username: "admin".to_string(),
        password: "correct".to_string(),
    }
}

#[tokio::test]
async fn login_success_populates_session_and_storage() {
    let (store, storage) = connected_store().await;

    let profile = store.login(&good_credentials()).await.unwrap();

    assert!(store.is_authenticated());
    assert_eq!(profile.id, 7);
    assert_eq!(profile.username, "admin");
    assert_eq!(
        store.permission_names(),
        vec!["view users".to_string(), "View Dormitories".to_string()]
    );
    assert_eq!(store.role_ids(), vec![1, 2]);
    assert_eq!(store.permission_ids(), vec![1, 2]);

    // Every key mirrored durably
    assert_eq!(storage.get(keys::TOKEN), Some(fixture_token()));
    assert_eq!(storage.get(keys::USER_ID).as_deref(), Some("7"));
    for key in keys::ALL {
        assert!(storage.get(key).is_some(), "missing stored key {}", key);
    }
}

#[tokio::test]
async fn login_failure_surfaces_message_and_leaves_session_unchanged() {
    let (store, storage) = connected_store().await;

    let err = store
        .login(&Credentials {
            username: "admin".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();

    match err {
        SessionError::Credentials(message) => {
            assert_eq!(message, "Username or password is wrong")
        }
        other => panic!("expected credentials failure, got {:?}", other),
    }
    assert!(!store.is_authenticated());
    assert!(storage.get(keys::TOKEN).is_none());
}

#[tokio::test]
async fn login_transport_failure_is_a_generic_message() {
    // Nothing listens here
    let store = SessionStore::new(
        Config::with_base_url("http://127.0.0.1:1"),
        Box::new(MemoryStorage::new()),
    );

    let err = store.login(&good_credentials()).await.unwrap_err();
    assert!(matches!(err, SessionError::Transport(_)));
    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn register_success_authenticates_immediately() {
    let (store, _storage) = connected_store().await;

    let registration = Registration {
        first_name: "Aziz".to_string(),
        last_name: "Karimov".to_string(),
        username: "admin".to_string(),
        password: "correct".to_string(),
        ..Registration::default()
    };
    let profile = store.register(&registration).await.unwrap();

    assert!(store.is_authenticated());
    assert_eq!(profile.id, 7);
}

#[tokio::test]
async fn register_validation_failure_surfaces_message() {
    let (store, _storage) = connected_store().await;

    let err = store.register(&Registration::default()).await.unwrap_err();
    match err {
        SessionError::Credentials(message) => assert_eq!(message, "Username is required"),
        other => panic!("expected credentials failure, got {:?}", other),
    }
}

#[tokio::test]
async fn logout_clears_every_stored_key() {
    let (store, storage) = connected_store().await;
    store.login(&good_credentials()).await.unwrap();

    store.logout();

    assert!(!store.is_authenticated());
    for key in keys::ALL {
        assert!(storage.get(key).is_none(), "key {} survived logout", key);
    }
}

#[tokio::test]
async fn check_auth_discards_expired_stored_session() {
    let storage = SharedStorage::default();
    storage.set(keys::TOKEN, &make_token(1)).unwrap();
    storage.set(keys::USER_ID, "7").unwrap();
    storage.set(keys::PERMISSION_NAMES, r#"["view users"]"#).unwrap();

    let store = SessionStore::new(
        Config::with_base_url("http://127.0.0.1:1"),
        Box::new(storage.clone()),
    );
    store.check_auth();

    assert!(!store.is_authenticated());
    for key in keys::ALL {
        assert!(storage.get(key).is_none(), "key {} survived expiry", key);
    }
}

#[tokio::test]
async fn check_auth_restores_a_session_across_restarts() {
    let (store, storage) = connected_store().await;
    store.login(&good_credentials()).await.unwrap();
    drop(store);

    // New process, same storage
    let restored = SessionStore::new(
        Config::with_base_url("http://127.0.0.1:1"),
        Box::new(storage),
    );
    restored.check_auth();

    assert!(restored.is_authenticated());
    assert_eq!(restored.user_id(), Some(7));
    assert_eq!(
        restored.permission_names(),
        vec!["view users".to_string(), "View Dormitories".to_string()]
    );
    let user = restored.current_user().expect("profile restored");
    assert_eq!(user.first_name, "Aziz");
}

#[tokio::test]
async fn guarded_request_forbidden_invalidates_and_rejects() {
    let (store, storage) = connected_store().await;
    store.login(&good_credentials()).await.unwrap();

    let req = store.request(reqwest::Method::GET, "/api/forbidden");
    let err = store.authenticated_request(req).await.unwrap_err();

    match err {
        SessionError::Unauthorized(status) => assert_eq!(status, StatusCode::FORBIDDEN),
        other => panic!("expected unauthorized, got {:?}", other),
    }
    assert!(!store.is_authenticated());
    assert!(storage.get(keys::TOKEN).is_none());
}

#[tokio::test]
async fn guarded_request_attaches_bearer_header() {
    let (store, _storage) = connected_store().await;
    store.login(&good_credentials()).await.unwrap();

    let req = store.request(reqwest::Method::GET, "/api/echo");
    let response = store.authenticated_request(req).await.unwrap();
    let body = response.text().await.unwrap();
    assert_eq!(body, format!("Bearer {}", fixture_token()));
}

#[tokio::test]
async fn interceptor_attaches_bearer_header() {
    let (store, _storage) = connected_store().await;
    store.login(&good_credentials()).await.unwrap();

    let api = store.api_client();
    let response = api.get("/api/echo").await.unwrap();
    let body = response.text().await.unwrap();
    assert_eq!(body, format!("Bearer {}", fixture_token()));
}

#[tokio::test]
async fn interceptor_sends_no_header_without_a_token() {
    let (store, _storage) = connected_store().await;

    let api = store.api_client();
    let response = api.get("/api/echo").await.unwrap();
    assert_eq!(response.text().await.unwrap(), "");
}

#[tokio::test]
async fn interceptor_unauthorized_invalidates_and_propagates() {
    let (store, storage) = connected_store().await;
    store.login(&good_credentials()).await.unwrap();

    let api = store.api_client();
    let err = api.get("/api/unauthorized").await.unwrap_err();

    match err {
        ApiError::Unauthorized(status) => assert_eq!(status, StatusCode::UNAUTHORIZED),
        other => panic!("expected unauthorized, got {:?}", other),
    }
    assert!(!store.is_authenticated());
    assert!(storage.get(keys::TOKEN).is_none());
}

#[tokio::test]
async fn api_client_is_one_instance_per_store() {
    let (store, _storage) = connected_store().await;
    let first = store.api_client();
    let second = store.api_client();
    assert!(Arc::ptr_eq(&first, &second));
}
