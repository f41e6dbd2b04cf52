//! Session-aware request client.
//!
//! Issues every outbound API call, attaches the bearer credential when one
//! is held, and classifies each outcome into the [`ApiError`] taxonomy.
//! Owns the token lifecycle: `login`/`refresh_token` store a fresh token,
//! an HTTP 401 tears the session down and broadcasts
//! [`ClientEvent::SessionInvalidated`] — the client itself never retries
//! and never navigates.

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::events::{ClientEvent, EventBroadcaster};
use crate::token::TokenStore;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

// ─── Auth payloads ────────────────────────────────────────────────────────────

/// Login credentials for `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Token response from the auth endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Profile attached by the login endpoint; absent on refresh.
    #[serde(default)]
    pub user: Option<Value>,
}

// ─── SessionClient ────────────────────────────────────────────────────────────

/// HTTP client bound to one session.
///
/// Constructed once per process and passed by reference to every component
/// that issues requests. The token cache is restored from the injected
/// [`TokenStore`] at construction, so an authenticated session survives a
/// restart.
pub struct SessionClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
    store: Arc<dyn TokenStore>,
    broadcaster: EventBroadcaster,
}

impl SessionClient {
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
        broadcaster: EventBroadcaster,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let token = RwLock::new(store.get());
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token,
            store,
            broadcaster,
        })
    }

    /// `true` while a token is held (an Authorization header will be sent).
    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Replace the held token and persist it.
    pub async fn set_token(&self, token: &str) {
        if let Err(e) = self.store.set(token) {
            warn!(err = %e, "failed to persist token");
        }
        *self.token.write().await = Some(token.to_string());
    }

    /// Explicit logout: drop the held token and its persisted copy.
    pub async fn logout(&self) {
        if let Err(e) = self.store.clear() {
            warn!(err = %e, "failed to clear persisted token");
        }
        *self.token.write().await = None;
    }

    // ─── Request pipeline ─────────────────────────────────────────────────

    /// Issue a request and classify the outcome.
    ///
    /// See [`ApiError`] for the classification. A 2xx response parses to its
    /// JSON body (`Value::Null` when the body is empty).
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        self.request_with_timeout(method, endpoint, body, None).await
    }

    /// [`request`](Self::request) with a per-call timeout override, used by
    /// the bounded diagnostics probes.
    pub async fn request_with_timeout(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%method, %url, "api request");

        let mut req = self.http.request(method, &url);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        if let Some(token) = self.token.read().await.clone() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(ApiError::Network)?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(%url, "401 — invalidating session");
            self.invalidate_session().await;
            return Err(ApiError::AuthRequired);
        }

        if !status.is_success() {
            let message = resp
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = resp.bytes().await.map_err(ApiError::Network)?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(ApiError::MalformedBody)
    }

    /// Convenience GET.
    pub async fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, endpoint, None).await
    }

    /// Forced teardown on 401: clear the held token everywhere and tell the
    /// shell. The shell decides where to navigate — not this client.
    async fn invalidate_session(&self) {
        if let Err(e) = self.store.clear() {
            warn!(err = %e, "failed to clear persisted token");
        }
        *self.token.write().await = None;
        self.broadcaster.broadcast(ClientEvent::SessionInvalidated);
    }

    // ─── Auth endpoints ───────────────────────────────────────────────────

    /// `POST /auth/login` — stores the returned access token before
    /// returning the response.
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError> {
        let body = serde_json::json!({
            "email": credentials.email,
            "password": credentials.password,
        });
        let value = self
            .request(Method::POST, "/auth/login", Some(&body))
            .await?;
        let resp: TokenResponse =
            serde_json::from_value(value).map_err(ApiError::MalformedBody)?;
        self.set_token(&resp.access_token).await;
        Ok(resp)
    }

    /// `POST /auth/register`.
    pub async fn register(&self, user_data: &Value) -> Result<Value, ApiError> {
        self.request(Method::POST, "/auth/register", Some(user_data))
            .await
    }

    /// `GET /auth/me`.
    pub async fn current_user(&self) -> Result<Value, ApiError> {
        self.get("/auth/me").await
    }

    /// `PUT /auth/me`.
    pub async fn update_current_user(&self, patch: &Value) -> Result<Value, ApiError> {
        self.request(Method::PUT, "/auth/me", Some(patch)).await
    }

    /// `GET /auth/refresh-token` — re-stores the newly issued token. This is
    /// the only way an expiring token is renewed; renewal is always
    /// caller-triggered, never time-based.
    pub async fn refresh_token(&self) -> Result<TokenResponse, ApiError> {
        let value = self.get("/auth/refresh-token").await?;
        let resp: TokenResponse =
            serde_json::from_value(value).map_err(ApiError::MalformedBody)?;
        self.set_token(&resp.access_token).await;
        Ok(resp)
    }
}
