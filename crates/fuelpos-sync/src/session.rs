//! # Session
//!
//! Bearer-token handling for the upstream API.
//!
//! ## Token Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Session Tokens                                  │
//! │                                                                         │
//! │  login(token, refresh) ──► local_settings                              │
//! │                              session_token / refresh_token             │
//! │                                     │                                   │
//! │  every call ── auth_headers() ◄─────┘  Authorization: Bearer <token>   │
//! │                                                                         │
//! │  401 ──► refresh()  POST /auth/refresh { refreshToken }                │
//! │            │                                                            │
//! │            ├── 2xx  store new tokens, caller resends once              │
//! │            └── else caller calls reset(): both keys cleared            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tokens live in the local store so they survive restarts. Refreshes are
//! serialized: a caller whose token was already replaced by a concurrent
//! refresh does not spend the refresh token a second time.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fuelpos_core::{HttpMethod, REFRESH_TOKEN_KEY, SESSION_TOKEN_KEY};
use fuelpos_db::LocalStore;

use crate::error::{DispatchError, DispatchResult};
use crate::transport::{Transport, TransportRequest};

/// Header carrying the bearer token.
pub const AUTHORIZATION: &str = "Authorization";

/// Stored tokens plus the refresh call.
pub struct Session {
    store: LocalStore,
    transport: Arc<dyn Transport>,
    refresh_path: String,
    refresh_lock: Mutex<()>,
}

impl Session {
    pub fn new(
        store: LocalStore,
        transport: Arc<dyn Transport>,
        refresh_path: impl Into<String>,
    ) -> Self {
        Session {
            store,
            transport,
            refresh_path: refresh_path.into(),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Current session token, if signed in.
    pub async fn token(&self) -> DispatchResult<Option<String>> {
        Ok(self.store.get_setting(SESSION_TOKEN_KEY).await?)
    }

    pub async fn is_authenticated(&self) -> DispatchResult<bool> {
        Ok(self.token().await?.is_some())
    }

    /// Stores the tokens issued by the login screen.
    pub async fn login(&self, token: &str, refresh_token: &str) -> DispatchResult<()> {
        self.store.set_setting(SESSION_TOKEN_KEY, token).await?;
        self.store.set_setting(REFRESH_TOKEN_KEY, refresh_token).await?;
        info!("Session started");
        Ok(())
    }

    /// Clears both tokens (logout, or an unrecoverable 401).
    pub async fn reset(&self) -> DispatchResult<()> {
        self.store.remove_setting(SESSION_TOKEN_KEY).await?;
        self.store.remove_setting(REFRESH_TOKEN_KEY).await?;
        info!("Session cleared");
        Ok(())
    }

    /// Headers for a call made now.
    pub async fn auth_headers(&self) -> DispatchResult<BTreeMap<String, String>> {
        let mut headers = BTreeMap::new();
        apply_token(&mut headers, self.token().await?.as_deref());
        Ok(headers)
    }

    /// Exchanges the refresh token for a new session token.
    ///
    /// `stale` is the token that was rejected. If the stored token already
    /// differs, another caller refreshed in the meantime and this returns
    /// `Ok(true)` without a network call.
    ///
    /// Returns `Ok(false)` when there is nothing to refresh with or the
    /// server refused. Transport failures are errors: they say nothing
    /// about the session.
    pub async fn refresh(&self, stale: Option<&str>) -> DispatchResult<bool> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.token().await?;
        if current.is_some() && current.as_deref() != stale {
            debug!("Session token already refreshed");
            return Ok(true);
        }

        let Some(refresh_token) = self.store.get_setting(REFRESH_TOKEN_KEY).await? else {
            warn!("No refresh token stored");
            return Ok(false);
        };

        let request = TransportRequest::new(HttpMethod::Post, self.refresh_path.as_str())
            .with_body(Some(json!({ "refreshToken": refresh_token })));

        let response = self
            .transport
            .execute(&request)
            .await
            .map_err(|e| DispatchError::unreachable(e.to_string()))?;

        if !response.is_success() {
            warn!(status = response.status, "Token refresh rejected");
            return Ok(false);
        }

        let body = response.body.unwrap_or(Value::Null);
        let Some(token) = body.get("token").and_then(Value::as_str) else {
            warn!("Token refresh response carried no token");
            return Ok(false);
        };

        self.store.set_setting(SESSION_TOKEN_KEY, token).await?;
        if let Some(next_refresh) = body.get("refreshToken").and_then(Value::as_str) {
            self.store.set_setting(REFRESH_TOKEN_KEY, next_refresh).await?;
        }

        info!("Session token refreshed");
        Ok(true)
    }
}

/// Sets (or removes) the bearer header, replacing any existing one
/// regardless of case.
pub fn apply_token(headers: &mut BTreeMap<String, String>, token: Option<&str>) {
    headers.retain(|name, _| !name.eq_ignore_ascii_case(AUTHORIZATION));
    if let Some(token) = token {
        headers.insert(AUTHORIZATION.to_string(), format!("Bearer {}", token));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockFailure, MockTransport, REFRESH_PATH};
    use fuelpos_db::DbConfig;

    async fn setup() -> (Arc<MockTransport>, Session, LocalStore) {
        let store = LocalStore::connect(DbConfig::in_memory()).await.unwrap();
        let mock = Arc::new(MockTransport::new());
        let session = Session::new(store.clone(), mock.clone(), REFRESH_PATH);
        (mock, session, store)
    }

    #[test]
    fn test_apply_token_replaces_any_case() {
        let mut headers = BTreeMap::new();
        headers.insert("authorization".to_string(), "Bearer old".to_string());
        headers.insert("X-Outlet".to_string(), "7".to_string());

        apply_token(&mut headers, Some("new"));
        assert_eq!(headers.get("Authorization"), Some(&"Bearer new".to_string()));
        assert!(!headers.contains_key("authorization"));
        assert_eq!(headers.len(), 2);

        apply_token(&mut headers, None);
        assert_eq!(headers.len(), 1);
    }

    #[tokio::test]
    async fn test_login_and_reset() {
        let (_mock, session, store) = setup().await;
        assert!(!session.is_authenticated().await.unwrap());
        assert!(session.auth_headers().await.unwrap().is_empty());

        session.login("t-1", "r-1").await.unwrap();
        let headers = session.auth_headers().await.unwrap();
        assert_eq!(headers.get(AUTHORIZATION), Some(&"Bearer t-1".to_string()));

        session.reset().await.unwrap();
        assert_eq!(store.get_setting(SESSION_TOKEN_KEY).await.unwrap(), None);
        assert_eq!(store.get_setting(REFRESH_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_rotates_tokens() {
        let (mock, session, store) = setup().await;
        mock.with_auth("t-1", "r-1").await;
        session.login("t-1", "r-1").await.unwrap();

        assert!(session.refresh(Some("t-1")).await.unwrap());
        let token = session.token().await.unwrap().unwrap();
        assert_ne!(token, "t-1");
        assert_ne!(store.get_setting(REFRESH_TOKEN_KEY).await.unwrap().as_deref(), Some("r-1"));
    }

    #[tokio::test]
    async fn test_refresh_skipped_when_already_refreshed() {
        let (mock, session, _store) = setup().await;
        mock.with_auth("t-1", "r-1").await;
        session.login("t-2", "r-1").await.unwrap();

        assert!(session.refresh(Some("t-1")).await.unwrap());
        assert_eq!(mock.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let (mock, session, _store) = setup().await;
        mock.with_auth("t-1", "r-1").await;
        session.login("t-1", "r-wrong").await.unwrap();

        assert!(!session.refresh(Some("t-1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token() {
        let (_mock, session, _store) = setup().await;
        assert!(!session.refresh(None).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_unreachable_is_error() {
        let (mock, session, _store) = setup().await;
        session.login("t-1", "r-1").await.unwrap();
        mock.fail_next(MockFailure::Unreachable).await;

        let err = session.refresh(Some("t-1")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Network { status: None, .. }));
    }
}
