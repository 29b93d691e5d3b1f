//! Authentication session lifecycle.
//!
//! A `SessionHandle` is created once and injected into every HTTP client. It
//! moves `SignedOut -> Active` on login and back to `SignedOut` or `Expired`
//! on logout or when the API answers 401. Consumers that need a token await
//! [`SessionHandle::wait_ready`] instead of polling.

use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::watch;
use url::Url;

use crate::api::wire::{LoginRequest, TokenPair};
use crate::api::{decode, ensure_success};
use crate::config::ApiConfig;
use crate::error::ApiError;

/// Tokens for a signed-in learner.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub username: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    SignedOut,
    Active(AuthSession),
    Expired,
}

/// Shared, cloneable view of the current session.
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionHandle")
            .field(&*self.state.borrow())
            .finish()
    }
}

impl SessionHandle {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::SignedOut);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Handle that is already signed in, for tests and pre-issued tokens.
    #[must_use]
    pub fn active(session: AuthSession) -> Self {
        let handle = Self::new();
        handle.sign_in(session);
        handle
    }

    pub fn sign_in(&self, session: AuthSession) {
        tracing::info!(username = %session.username, "session started");
        self.state.send_replace(SessionState::Active(session));
    }

    pub fn sign_out(&self) {
        self.state.send_replace(SessionState::SignedOut);
    }

    /// Drop the tokens after the server rejected them.
    pub fn expire(&self) {
        let previous = self.state.send_replace(SessionState::Expired);
        if matches!(previous, SessionState::Active(_)) {
            tracing::warn!("session expired");
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn current(&self) -> Option<AuthSession> {
        match &*self.state.borrow() {
            SessionState::Active(session) => Some(session.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn bearer_token(&self) -> Option<String> {
        self.current().map(|s| s.access_token)
    }

    /// Resolve once a session is active.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthenticated` if the channel closes first, which
    /// only happens when every handle has been dropped.
    pub async fn wait_ready(&self) -> Result<AuthSession, ApiError> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|s| matches!(s, SessionState::Active(_)))
            .await
            .map_err(|_| ApiError::Unauthenticated)?;
        match &*state {
            SessionState::Active(session) => Ok(session.clone()),
            _ => Err(ApiError::Unauthenticated),
        }
    }
}

/// Exchanges credentials for tokens and activates the shared session.
#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    base_url: Url,
    session: SessionHandle,
}

impl AuthClient {
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, session: SessionHandle) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            session,
        })
    }

    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// POST `login` and start a session on success.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthenticated` for bad credentials, or other
    /// `ApiError`s for transport and payload failures.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession, ApiError> {
        let url = self.base_url.join("login")?;
        let response = self
            .http
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        let body = ensure_success(response).await?;
        let tokens: TokenPair = decode(&body)?;
        let tokens = tokens.validate()?;
        let session = AuthSession {
            username: username.to_owned(),
            access_token: tokens.access,
            refresh_token: Some(tokens.refresh),
        };
        self.session.sign_in(session.clone());
        Ok(session)
    }

    pub fn logout(&self) {
        self.session.sign_out();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn session() -> AuthSession {
        AuthSession {
            username: "ada".into(),
            access_token: "tok-123".into(),
            refresh_token: Some("refresh".into()),
        }
    }

    #[test]
    fn lifecycle_moves_between_states() {
        let handle = SessionHandle::new();
        assert_eq!(handle.state(), SessionState::SignedOut);
        assert!(handle.bearer_token().is_none());

        handle.sign_in(session());
        assert_eq!(handle.bearer_token().as_deref(), Some("tok-123"));

        handle.expire();
        assert_eq!(handle.state(), SessionState::Expired);
        assert!(handle.current().is_none());

        handle.sign_in(session());
        handle.sign_out();
        assert_eq!(handle.state(), SessionState::SignedOut);
    }

    #[test]
    fn debug_hides_tokens() {
        let rendered = format!("{:?}", session());
        assert!(rendered.contains("ada"));
        assert!(!rendered.contains("tok-123"));
    }

    #[tokio::test]
    async fn wait_ready_resolves_after_sign_in() {
        let handle = SessionHandle::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_ready().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        handle.sign_in(session());
        let ready = waiter.await.unwrap().unwrap();
        assert_eq!(ready.username, "ada");
    }

    #[tokio::test]
    async fn wait_ready_is_immediate_when_active() {
        let handle = SessionHandle::active(session());
        assert_eq!(handle.wait_ready().await.unwrap(), session());
    }
}
