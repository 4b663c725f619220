//! Session handling for the identity service
//!
//! The identity service itself is external; this module only keeps the
//! current session, persists it between runs through a [`SessionStore`],
//! and broadcasts [`AuthEvent`]s when it changes.

use crate::error::{DashError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// File name of the persisted session in the app data directory
pub const SESSION_FILE: &str = "session.json";

/// Seconds before expiry at which the access token is renewed
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// What to do with the current token before a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenAction {
    /// Send the access token as is
    Use(String),
    /// Exchange this refresh token first
    Refresh(String),
    /// Expired with no way to renew; sign out
    SignOut,
}

/// The identity attached to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry as Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

impl Session {
    /// True when the access token expired at or before `now` (Unix seconds)
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Decide whether the token can be used at `now`, renewing it
    /// [`REFRESH_MARGIN_SECS`] ahead of expiry
    pub fn token_action(&self, now: i64) -> TokenAction {
        if !self.is_expired(now + REFRESH_MARGIN_SECS) {
            return TokenAction::Use(self.access_token.clone());
        }
        match &self.refresh_token {
            Some(refresh_token) => TokenAction::Refresh(refresh_token.clone()),
            None if !self.is_expired(now) => TokenAction::Use(self.access_token.clone()),
            None => TokenAction::SignOut,
        }
    }
}

/// Identity created by the admin endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Session change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(SessionUser),
    SignedOut,
}

/// Persistence seam for the session
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>>;
    fn save(&self, session: &Session) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Stores the session as JSON in a file
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the application data directory
    pub fn in_app_data_dir() -> Result<Self> {
        let dir = crate::config::ensure_app_data_dir()?;
        Ok(Self::new(dir.join(SESSION_FILE)))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| DashError::Config(format!("Failed to read session: {}", e)))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| DashError::Config(format!("Failed to parse session: {}", e)))
    }

    fn save(&self, session: &Session) -> Result<()> {
        let content = serde_json::to_string_pretty(session)
            .map_err(|e| DashError::Config(format!("Failed to serialize session: {}", e)))?;
        std::fs::write(&self.path, content)
            .map_err(|e| DashError::Config(format!("Failed to write session: {}", e)))
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Keeps the session only for the lifetime of the process
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.session.lock().map(|s| s.clone()).unwrap_or(None))
    }

    fn save(&self, session: &Session) -> Result<()> {
        if let Ok(mut slot) = self.session.lock() {
            *slot = Some(session.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if let Ok(mut slot) = self.session.lock() {
            *slot = None;
        }
        Ok(())
    }
}

/// Current session plus change broadcasting
pub struct SessionManager {
    store: Box<dyn SessionStore>,
    current: Mutex<Option<Session>>,
    loaded: Mutex<bool>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionManager {
    pub fn new(store: Box<dyn SessionStore>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            store,
            current: Mutex::new(None),
            loaded: Mutex::new(false),
            events,
        }
    }

    /// Current session, loading the stored one on first use
    pub fn get(&self) -> Option<Session> {
        if let Ok(mut loaded) = self.loaded.lock() {
            if !*loaded {
                *loaded = true;
                match self.store.load() {
                    Ok(stored) => {
                        if let Ok(mut current) = self.current.lock() {
                            *current = stored;
                        }
                    }
                    Err(e) => tracing::warn!("Failed to load stored session: {}", e),
                }
            }
        }
        self.current.lock().ok().and_then(|s| s.clone())
    }

    /// Access token of the current session
    pub fn access_token(&self) -> Option<String> {
        self.get().map(|s| s.access_token)
    }

    /// Replace the session, persist it and announce the sign-in
    pub fn set(&self, session: Session) {
        if let Err(e) = self.store.save(&session) {
            tracing::warn!("Failed to persist session: {}", e);
        }
        let user = session.user.clone();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(session);
        }
        if let Ok(mut loaded) = self.loaded.lock() {
            *loaded = true;
        }
        let _ = self.events.send(AuthEvent::SignedIn(user));
    }

    /// Forget the session and announce the sign-out
    pub fn clear(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to clear stored session: {}", e);
        }
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
        if let Ok(mut loaded) = self.loaded.lock() {
            *loaded = true;
        }
        let _ = self.events.send(AuthEvent::SignedOut);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> Session {
        Session {
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(1_700_000_000),
            user: SessionUser {
                id: "u1".to_string(),
                email: Some("ops@example.com".to_string()),
            },
        }
    }

    #[test]
    fn test_session_expiry() {
        let session = sample_session();
        assert!(!session.is_expired(1_699_999_999));
        assert!(session.is_expired(1_700_000_000));

        let no_expiry = Session {
            expires_at: None,
            ..sample_session()
        };
        assert!(!no_expiry.is_expired(i64::MAX));
    }

    #[test]
    fn test_token_action() {
        let session = sample_session();
        let expiry = 1_700_000_000;

        assert_eq!(
            session.token_action(expiry - REFRESH_MARGIN_SECS - 1),
            TokenAction::Use("token".to_string())
        );
        // Renewed shortly before expiry, and after it
        assert_eq!(
            session.token_action(expiry - REFRESH_MARGIN_SECS),
            TokenAction::Refresh("refresh".to_string())
        );
        assert_eq!(
            session.token_action(expiry + 3600),
            TokenAction::Refresh("refresh".to_string())
        );

        let no_refresh = Session {
            refresh_token: None,
            ..sample_session()
        };
        assert_eq!(
            no_refresh.token_action(expiry - 1),
            TokenAction::Use("token".to_string())
        );
        assert_eq!(no_refresh.token_action(expiry), TokenAction::SignOut);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join(SESSION_FILE));

        assert_eq!(store.load().unwrap(), None);
        store.save(&sample_session()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample_session()));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_manager_loads_stored_session_once() {
        let mut store = MockSessionStore::new();
        store
            .expect_load()
            .times(1)
            .returning(|| Ok(Some(sample_session())));

        let manager = SessionManager::new(Box::new(store));
        assert_eq!(manager.access_token().as_deref(), Some("token"));
        assert!(manager.get().is_some());
    }

    #[test]
    fn test_manager_set_persists_and_broadcasts() {
        let mut store = MockSessionStore::new();
        store.expect_save().times(1).returning(|_| Ok(()));
        store.expect_load().never();

        let manager = SessionManager::new(Box::new(store));
        let mut events = manager.subscribe();
        manager.set(sample_session());

        assert_eq!(
            events.try_recv().unwrap(),
            AuthEvent::SignedIn(sample_session().user)
        );
        assert_eq!(manager.get(), Some(sample_session()));
    }

    #[test]
    fn test_manager_clear_survives_store_failure() {
        let mut store = MockSessionStore::new();
        store.expect_save().returning(|_| Ok(()));
        store
            .expect_clear()
            .times(1)
            .returning(|| Err(DashError::Config("read-only".to_string())));

        let manager = SessionManager::new(Box::new(store));
        manager.set(sample_session());
        let mut events = manager.subscribe();
        manager.clear();

        assert_eq!(manager.get(), None);
        assert_eq!(events.try_recv().unwrap(), AuthEvent::SignedOut);
    }
}
