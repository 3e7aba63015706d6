//! Session Store
//!
//! Single source of truth for the authenticated session: bearer token, user
//! profile, and role/permission identifiers. State lives in memory behind a
//! lock and is mirrored field-by-field into durable storage, so a restart
//! restores the same session via [`SessionStore::check_auth`].
//!
//! Mutation discipline: login, register, logout, and expiry detection are
//! the only writers. Every writer replaces the in-memory state completely
//! before touching durable storage, so a concurrent reader (the navigation
//! guard, the interceptor) never observes a half-updated session.

use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::Config;
use crate::storage::{keys, SessionStorage};
use crate::token;
use crate::transport::ApiClient;

/// Failure message when the server cannot be reached or answers garbage
const TRANSPORT_FAILURE_MESSAGE: &str = "Could not reach the server";

/// Default message for a rejected login
const LOGIN_FAILURE_MESSAGE: &str = "Invalid username or password";

/// Default message for a rejected registration
const REGISTER_FAILURE_MESSAGE: &str = "Registration failed";

/// Session errors
///
/// `Credentials` and `Transport` leave the session untouched. `Expired` and
/// `Unauthorized` are only returned after the session has been cleared.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The remote API rejected the supplied input
    #[error("{0}")]
    Credentials(String),

    /// Network or parse failure, converted to a generic message
    #[error("{0}")]
    Transport(String),

    /// The token expired before the request was sent
    #[error("Session expired")]
    Expired,

    /// An authenticated call came back 401/403
    #[error("Request rejected with {0}")]
    Unauthorized(StatusCode),
}

/// Login credentials
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Registration payload
///
/// Optional fields serialize as `null`, matching the API contract.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub username: String,
    pub password: String,
    pub telegram_username: Option<String>,
    pub phone: Option<String>,
}

/// A granted permission as returned at login time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub id: i64,
    /// Absent names normalize to the empty string during evaluation
    pub name: Option<String>,
}

/// Identity and display attributes, denormalized with roles/permissions
///
/// Owned exclusively by the session; nothing else mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub telegram_username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<PermissionGrant>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Wire shape of a successful login/register response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    token: String,
    id: i64,
    #[serde(default)]
    role_ids: Vec<i64>,
    #[serde(default)]
    permissions: Vec<PermissionGrant>,
    #[serde(default)]
    username: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    middle_name: Option<String>,
    #[serde(default)]
    telegram_username: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    status: Option<String>,
}

/// In-memory session state
///
/// Invariant: `token == None` means unauthenticated regardless of the
/// other fields.
#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    user: Option<UserProfile>,
    user_id: Option<i64>,
    role_ids: Vec<i64>,
    permission_ids: Vec<i64>,
    permission_names: Vec<String>,
}

/// The session store
pub struct SessionStore {
    http: reqwest::Client,
    config: Config,
    storage: Box<dyn SessionStorage>,
    state: RwLock<SessionState>,
    permissions_tx: watch::Sender<Vec<String>>,
    api: OnceLock<Arc<ApiClient>>,
}

impl SessionStore {
    /// Create a store over the given storage; no I/O happens here
    pub fn new(config: Config, storage: Box<dyn SessionStorage>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        let (permissions_tx, _) = watch::channel(Vec::new());

        Self {
            http,
            config,
            storage,
            state: RwLock::new(SessionState::default()),
            permissions_tx,
            api: OnceLock::new(),
        }
    }

    /// Authenticate against the remote API
    ///
    /// On success the entire session is replaced and persisted. On any
    /// failure the session is left untouched and a human-readable message
    /// comes back in the error; nothing escapes this method unhandled.
    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile, SessionError> {
        let url = format!("{}/api/auth/login", self.config.base_url);

        let response = self
            .http
            .post(&url)
            .json(credentials)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Login request failed: {}", e);
                SessionError::Transport(TRANSPORT_FAILURE_MESSAGE.to_string())
            })?;

        if !response.status().is_success() {
            let message = failure_message(response, LOGIN_FAILURE_MESSAGE).await;
            return Err(SessionError::Credentials(message));
        }

        let data: AuthResponse = response.json().await.map_err(|e| {
            tracing::error!("Login response was not valid JSON: {}", e);
            SessionError::Transport(TRANSPORT_FAILURE_MESSAGE.to_string())
        })?;

        tracing::info!("User {} logged in", data.id);
        Ok(self.install(data))
    }

    /// Create an account; on success the session is authenticated
    /// immediately, exactly as after [`login`](Self::login)
    pub async fn register(&self, registration: &Registration) -> Result<UserProfile, SessionError> {
        let url = format!("{}/api/auth/register", self.config.base_url);

        let response = self
            .http
            .post(&url)
            .json(registration)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Register request failed: {}", e);
                SessionError::Transport(TRANSPORT_FAILURE_MESSAGE.to_string())
            })?;

        if !response.status().is_success() {
            let message = failure_message(response, REGISTER_FAILURE_MESSAGE).await;
            return Err(SessionError::Credentials(message));
        }

        let data: AuthResponse = response.json().await.map_err(|e| {
            tracing::error!("Register response was not valid JSON: {}", e);
            SessionError::Transport(TRANSPORT_FAILURE_MESSAGE.to_string())
        })?;

        tracing::info!("User {} registered", data.id);
        Ok(self.install(data))
    }

    /// Clear every session field and remove every storage key
    ///
    /// Idempotent; safe to call when already logged out.
    pub fn logout(&self) {
        *self.state.write() = SessionState::default();

        for key in keys::ALL {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!("Failed to remove stored session key {}: {}", key, e);
            }
        }

        self.permissions_tx.send_replace(Vec::new());
    }

    /// Restore the session from durable storage at startup
    ///
    /// A stored token that has already expired discards all stored fields
    /// instead of restoring stale state. Individually missing or unparsable
    /// fields restore to their defaults.
    pub fn check_auth(&self) {
        let Some(stored_token) = self.storage.get(keys::TOKEN) else {
            return;
        };

        if token::is_expired(&stored_token) {
            tracing::info!("Stored token has expired, discarding persisted session");
            self.logout();
            return;
        }

        let user: Option<UserProfile> = self
            .storage
            .get(keys::USER)
            .and_then(|s| serde_json::from_str(&s).ok());
        let user_id = self.storage.get(keys::USER_ID).and_then(|s| s.parse().ok());
        let role_ids: Vec<i64> = self
            .storage
            .get(keys::ROLE_IDS)
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        let permission_ids: Vec<i64> = self
            .storage
            .get(keys::PERMISSION_IDS)
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        let permission_names: Vec<String> = self
            .storage
            .get(keys::PERMISSION_NAMES)
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        let snapshot = permission_names.clone();
        *self.state.write() = SessionState {
            token: Some(stored_token),
            user,
            user_id,
            role_ids,
            permission_ids,
            permission_names,
        };
        self.permissions_tx.send_replace(snapshot);
        tracing::debug!("Session restored from storage");
    }

    /// Whether a token is present and not expired
    ///
    /// Recomputed on every call; expiry is time-dependent and must not be
    /// cached.
    pub fn is_authenticated(&self) -> bool {
        match self.state.read().token.as_deref() {
            Some(token) => !token::is_expired(token),
            None => false,
        }
    }

    /// Current bearer token, if any
    pub fn token(&self) -> Option<String> {
        self.state.read().token.clone()
    }

    /// Current user profile, if any
    pub fn current_user(&self) -> Option<UserProfile> {
        self.state.read().user.clone()
    }

    /// Current user id, if any
    pub fn user_id(&self) -> Option<i64> {
        self.state.read().user_id
    }

    /// Granted role identifiers
    pub fn role_ids(&self) -> Vec<i64> {
        self.state.read().role_ids.clone()
    }

    /// Granted permission identifiers
    pub fn permission_ids(&self) -> Vec<i64> {
        self.state.read().permission_ids.clone()
    }

    /// Snapshot of granted permission names, as the UI gate consumes them
    pub fn permission_names(&self) -> Vec<String> {
        self.state.read().permission_names.clone()
    }

    /// Subscribe to permission-snapshot changes
    ///
    /// Receives a fresh snapshot after every login, register, restore, and
    /// logout.
    pub fn subscribe_permissions(&self) -> watch::Receiver<Vec<String>> {
        self.permissions_tx.subscribe()
    }

    /// Start a request against the API, relative to the configured base URL
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.config.base_url, path))
    }

    /// Send a request on the per-call guarded path
    ///
    /// Pre-checks expiry (clearing the session and failing fast when the
    /// token is gone), injects the bearer header, and maps a 401/403
    /// response to session invalidation plus [`SessionError::Unauthorized`].
    /// Composes with the [`ApiClient`] interceptor; it does not replace it.
    pub async fn authenticated_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SessionError> {
        let Some(token) = self.token() else {
            self.logout();
            return Err(SessionError::Expired);
        };
        if token::is_expired(&token) {
            tracing::info!("Token expired before request, clearing session");
            self.logout();
            return Err(SessionError::Expired);
        }

        let response = builder.bearer_auth(&token).send().await.map_err(|e| {
            tracing::error!("Authenticated request failed: {}", e);
            SessionError::Transport(TRANSPORT_FAILURE_MESSAGE.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!("Authenticated call rejected with {}, clearing session", status);
            self.logout();
            return Err(SessionError::Unauthorized(status));
        }

        Ok(response)
    }

    /// The process-wide interceptor client for this store
    ///
    /// Memoized: calling this twice hands back the same instance, so the
    /// invalidation hook is wired exactly once.
    pub fn api_client(self: &Arc<Self>) -> Arc<ApiClient> {
        self.api
            .get_or_init(|| Arc::new(ApiClient::new(Arc::clone(self))))
            .clone()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Replace the session with a fresh auth response and mirror it durably
    fn install(&self, data: AuthResponse) -> UserProfile {
        let profile = UserProfile {
            id: data.id,
            username: data.username,
            first_name: data.first_name,
            last_name: data.last_name,
            middle_name: data.middle_name,
            telegram_username: data.telegram_username,
            phone: data.phone,
            roles: data.roles,
            permissions: data.permissions.clone(),
            status: data.status,
        };

        let permission_ids: Vec<i64> = data.permissions.iter().map(|p| p.id).collect();
        let permission_names: Vec<String> = data
            .permissions
            .iter()
            .map(|p| p.name.clone().unwrap_or_default())
            .collect();

        // Memory first, fully; storage after, so a concurrent restore never
        // sees a half-updated session.
        *self.state.write() = SessionState {
            token: Some(data.token.clone()),
            user: Some(profile.clone()),
            user_id: Some(data.id),
            role_ids: data.role_ids.clone(),
            permission_ids: permission_ids.clone(),
            permission_names: permission_names.clone(),
        };

        self.persist(keys::TOKEN, Ok(data.token));
        self.persist(keys::USER_ID, Ok(data.id.to_string()));
        self.persist(keys::USER, serde_json::to_string(&profile));
        self.persist(keys::ROLE_IDS, serde_json::to_string(&data.role_ids));
        self.persist(keys::PERMISSION_IDS, serde_json::to_string(&permission_ids));
        self.persist(keys::PERMISSION_NAMES, serde_json::to_string(&permission_names));

        self.permissions_tx.send_replace(permission_names);
        profile
    }

    /// Write one storage key; storage trouble is logged, never fatal
    fn persist(&self, key: &str, value: Result<String, serde_json::Error>) {
        match value {
            Ok(value) => {
                if let Err(e) = self.storage.set(key, &value) {
                    tracing::warn!("Failed to persist session key {}: {}", key, e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize session key {}: {}", key, e),
        }
    }
}

/// Extract the server's `message` field from a failure body, if present
async fn failure_message(response: reqwest::Response, default: &str) -> String {
    match response.json::<serde_json::Value>().await {
        Ok(body) => body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or(default)
            .to_string(),
        Err(_) => default.to_string(),
    }
}
