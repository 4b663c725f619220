//! HTTP implementation of [`BackendClient`]
//!
//! Talks to the table API (`/rest/v1`), the identity API (`/auth/v1`) and
//! opens realtime feeds. Every request carries the `apikey` header and a
//! bearer token: the session's access token when signed in, the anon key
//! otherwise. The access token is renewed shortly before it expires; a
//! failed renewal signs the user out. Admin calls use the service role key.

use super::client::{BackendClient, Subscription};
use super::query::Query;
use super::realtime::{spawn_feed, FeedConfig};
use super::session::{AuthEvent, NewIdentity, Session, SessionManager, SessionUser, TokenAction};
use crate::config::BackendConfig;
use crate::error::{DashError, Result};
use crate::types::Table;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

/// Token grant response of the identity API
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: SessionUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs)
        });
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Admin create-user responses are either the user or `{ "user": ... }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AdminUserResponse {
    Wrapped { user: NewIdentity },
    Bare(NewIdentity),
}

/// Client for a hosted backend
pub struct RestBackend {
    http: reqwest::Client,
    config: BackendConfig,
    session: SessionManager,
    /// Serializes token renewals
    refresh_lock: Mutex<()>,
}

impl RestBackend {
    pub fn new(config: BackendConfig, session: SessionManager) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            config,
            session,
            refresh_lock: Mutex::new(()),
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/{}", self.config.rest_url(), table.name())
    }

    /// Access token for the next request, renewed when close to expiry
    async fn access_token(&self) -> Option<String> {
        let session = self.session.get()?;
        if let TokenAction::Use(token) = session.token_action(chrono::Utc::now().timestamp()) {
            return Some(token);
        }

        // Concurrent callers wait here and reuse the renewed session
        let _guard = self.refresh_lock.lock().await;
        let session = self.session.get()?;
        match session.token_action(chrono::Utc::now().timestamp()) {
            TokenAction::Use(token) => Some(token),
            TokenAction::Refresh(refresh_token) => {
                match self
                    .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
                    .await
                {
                    Ok(fresh) => {
                        tracing::info!("Session refreshed");
                        let token = fresh.access_token.clone();
                        self.session.set(fresh);
                        Some(token)
                    }
                    Err(e) => {
                        tracing::warn!("Session refresh failed: {}", e);
                        self.session.clear();
                        None
                    }
                }
            }
            TokenAction::SignOut => {
                tracing::info!("Session expired without refresh token");
                self.session.clear();
                None
            }
        }
    }

    async fn bearer(&self) -> String {
        self.access_token()
            .await
            .unwrap_or_else(|| self.config.anon_key.clone())
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer().await)
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session> {
        let response = self
            .http
            .post(format!("{}/token", self.config.auth_url()))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;
        Ok(token.into_session())
    }
}

/// Turn a non-success response into [`DashError::Backend`]
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DashError::Backend {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Extract the human-readable message from an error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl BackendClient for RestBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        tracing::debug!("GET {} {:?}", query.table, query.to_params());
        let response = self
            .authorized(self.http.get(self.table_url(query.table)))
            .await
            .query(&query.to_params())
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<()> {
        let response = self
            .authorized(self.http.post(self.table_url(table)))
            .await
            .header("Prefer", "return=minimal")
            .json(&json!([row]))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn update(&self, table: Table, id: &str, patch: Value) -> Result<()> {
        let response = self
            .authorized(self.http.patch(self.table_url(table)))
            .await
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(&patch)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn subscribe_inserts(&self, channel: &str, table: Table) -> Result<Subscription> {
        Ok(spawn_feed(FeedConfig {
            url: self.config.realtime_websocket_url(),
            channel: channel.to_string(),
            table,
            access_token: self.access_token().await,
            heartbeat: Duration::from_secs(self.config.heartbeat_secs),
        }))
    }

    async fn current_session(&self) -> Result<Option<Session>> {
        // Renews or clears an expired stored session
        if self.access_token().await.is_none() {
            return Ok(None);
        }
        Ok(self.session.get())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await
            .map_err(|e| match e {
                DashError::Backend { message, .. } => DashError::Auth(message),
                other => other,
            })?;
        self.session.set(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let result = match self.session.access_token() {
            Some(token) => {
                let response = self
                    .http
                    .post(format!("{}/logout", self.config.auth_url()))
                    .header("apikey", &self.config.anon_key)
                    .bearer_auth(token)
                    .send()
                    .await;
                match response {
                    Ok(response) => check(response).await.map(|_| ()),
                    Err(e) => Err(e.into()),
                }
            }
            None => Ok(()),
        };
        // The local session goes away even if the server call failed
        self.session.clear();
        result
    }

    async fn admin_create_user(&self, email: &str, password: &str) -> Result<NewIdentity> {
        let Some(service_key) = self.config.service_role_key.as_deref() else {
            return Err(DashError::Auth(
                "Creating users requires a service role key".to_string(),
            ));
        };
        let response = self
            .http
            .post(format!("{}/admin/users", self.config.auth_url()))
            .header("apikey", service_key)
            .bearer_auth(service_key)
            .json(&json!({
                "email": email,
                "password": password,
                "email_confirm": true,
            }))
            .send()
            .await?;
        let created: AdminUserResponse = check(response)
            .await
            .map_err(|e| match e {
                DashError::Backend { message, .. } => DashError::Auth(message),
                other => other,
            })?
            .json()
            .await?;
        Ok(match created {
            AdminUserResponse::Wrapped { user } => user,
            AdminUserResponse::Bare(user) => user,
        })
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.session.subscribe()
    }

    fn name(&self) -> &str {
        &self.config.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::session::MemorySessionStore;

    fn config() -> BackendConfig {
        BackendConfig {
            url: "https://demo.example.co".to_string(),
            anon_key: "anon".to_string(),
            ..BackendConfig::default()
        }
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key value"}"#),
            "duplicate key value"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message(r#"{"msg":"User already registered"}"#), "User already registered");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_token_response_expiry() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "expires_at": 1_700_003_600,
            "user": {"id": "u1", "email": "ops@example.com", "role": "authenticated"}
        }))
        .unwrap();
        let session = token.into_session();
        assert_eq!(session.expires_at, Some(1_700_003_600));
        assert_eq!(session.user.id, "u1");
    }

    #[test]
    fn test_admin_user_response_shapes() {
        let bare: AdminUserResponse =
            serde_json::from_value(json!({"id": "u1", "email": "a@b.c", "aud": "authenticated"}))
                .unwrap();
        let wrapped: AdminUserResponse =
            serde_json::from_value(json!({"user": {"id": "u2"}})).unwrap();
        assert!(matches!(bare, AdminUserResponse::Bare(NewIdentity { ref id, .. }) if id == "u1"));
        assert!(matches!(wrapped, AdminUserResponse::Wrapped { ref user } if user.id == "u2"));
    }

    #[test]
    fn test_rejects_unconfigured_backend() {
        let session = SessionManager::new(Box::new(MemorySessionStore::default()));
        let unconfigured = BackendConfig {
            url: String::new(),
            ..config()
        };
        assert!(matches!(
            RestBackend::new(unconfigured, session),
            Err(DashError::Config(_))
        ));
    }

    fn session_expiring_at(expires_at: i64, refresh_token: Option<&str>) -> Session {
        Session {
            access_token: "jwt".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at: Some(expires_at),
            user: SessionUser {
                id: "u1".to_string(),
                email: Some("ops@example.com".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_fresh_token_is_sent_as_is() {
        let session = SessionManager::new(Box::new(MemorySessionStore::default()));
        session.set(session_expiring_at(chrono::Utc::now().timestamp() + 3600, Some("r")));
        let backend = RestBackend::new(config(), session).unwrap();
        assert_eq!(backend.bearer().await, "jwt");
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_signs_out() {
        let session = SessionManager::new(Box::new(MemorySessionStore::default()));
        session.set(session_expiring_at(chrono::Utc::now().timestamp() - 1, None));
        let mut events = session.subscribe();
        let backend = RestBackend::new(config(), session).unwrap();

        assert_eq!(backend.bearer().await, "anon");
        assert_eq!(backend.current_session().await.unwrap(), None);
        assert_eq!(events.try_recv().unwrap(), AuthEvent::SignedOut);
    }

    #[tokio::test]
    async fn test_failed_refresh_signs_out() {
        // Nothing listens on the discard port, so the renewal fails
        let unreachable = BackendConfig {
            url: "http://127.0.0.1:9".to_string(),
            ..config()
        };
        let session = SessionManager::new(Box::new(MemorySessionStore::default()));
        session.set(session_expiring_at(chrono::Utc::now().timestamp() + 10, Some("r")));
        let mut events = session.subscribe();
        let backend = RestBackend::new(unreachable, session).unwrap();

        assert_eq!(backend.bearer().await, "anon");
        assert_eq!(events.try_recv().unwrap(), AuthEvent::SignedOut);
        assert!(backend.session.get().is_none());
    }

    #[tokio::test]
    async fn test_bearer_falls_back_to_anon_key() {
        let session = SessionManager::new(Box::new(MemorySessionStore::default()));
        let backend = RestBackend::new(config(), session).unwrap();
        assert_eq!(backend.bearer().await, "anon");
        assert_eq!(
            backend.table_url(Table::SensorTypes),
            "https://demo.example.co/rest/v1/sensor_types"
        );
    }

    #[tokio::test]
    async fn test_admin_create_requires_service_key() {
        let session = SessionManager::new(Box::new(MemorySessionStore::default()));
        let backend = RestBackend::new(config(), session).unwrap();
        let err = backend
            .admin_create_user("ops@example.com", "secret")
            .await
            .unwrap_err();
        assert!(matches!(err, DashError::Auth(_)));
    }
}
