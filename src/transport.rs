//! Guarded API Transport
//!
//! The crate-wide request interceptor, re-architected as middleware on an
//! owned client instance rather than a mutated process-global. Every
//! outgoing request gets the bearer header from current session state;
//! every response is inspected, and 401/403 clears the session before the
//! rejection propagates to the caller. The caller handles the returned
//! error; the logout is a side effect, not a substitute.
//!
//! There is exactly one instance per store: obtain it through
//! [`SessionStore::api_client`], which memoizes. Even if logout fires more
//! than once it is idempotent, so the wiring cannot double-punish a single
//! failed response.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::session::SessionStore;

/// Transport errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The call came back 401/403; the session has been cleared
    #[error("Request rejected with {0}")]
    Unauthorized(StatusCode),
}

/// Owned API client with bearer injection and invalidation-on-401/403
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub(crate) fn new(session: Arc<SessionStore>) -> Self {
        Self {
            http: session.http().clone(),
            base_url: session.base_url().to_string(),
            session,
        }
    }

    /// Start a request relative to the API base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    /// Run a request through the interceptor chain
    ///
    /// Attaches the bearer header when a token is present (unauthenticated
    /// calls go out bare), then inspects the response status. Statuses other
    /// than 401/403 are the caller's business and pass through untouched.
    pub async fn execute(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let builder = match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!("API call rejected with {}, invalidating session", status);
            self.session.logout();
            return Err(ApiError::Unauthorized(status));
        }

        Ok(response)
    }

    /// GET a path through the interceptor
    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        self.execute(self.request(Method::GET, path)).await
    }

    /// POST a JSON body through the interceptor
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        self.execute(self.request(Method::POST, path).json(body)).await
    }

    /// DELETE a path through the interceptor
    pub async fn delete(&self, path: &str) -> Result<Response, ApiError> {
        self.execute(self.request(Method::DELETE, path)).await
    }
}
