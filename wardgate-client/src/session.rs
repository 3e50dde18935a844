//! Session lifecycle: login, logout, rehydration, and end-of-session events.
//!
//! [`SessionManager`] is a thin orchestrator over [`ApiClient`]: it owns the
//! session subject, populates the credential store on login, and turns
//! terminal auth failures into [`SessionEvent`]s the embedding application
//! can react to (typically by navigating to a login screen). The manager
//! itself never performs navigation.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;

use wardgate_core::{
    ApiError, CredentialStore, LoginRequest, LoginResponse, RegisterRequest, TokenPair, UserInfo,
};

use crate::client::ApiClient;
use crate::transport::ApiRequest;

pub(crate) const LOGIN_PATH: &str = "/auth/login";
pub(crate) const REGISTER_PATH: &str = "/auth/register";
pub(crate) const LOGOUT_PATH: &str = "/auth/logout";
pub(crate) const CURRENT_USER_PATH: &str = "/auth/current";

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    /// The user logged out explicitly.
    LoggedOut,
    /// The refresh exchange failed; the credential could not be recovered.
    RefreshFailed,
    /// Expiry was detected with no refresh credential available.
    Unauthenticated,
}

/// Session lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Ended(SessionEndReason),
}

/// The current subject, shared between the manager and the refresh gate so
/// a terminal refresh failure clears it too.
#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) user: RwLock<Option<UserInfo>>,
}

/// Login/logout/current-user orchestration over an [`ApiClient`].
pub struct SessionManager {
    client: Arc<ApiClient>,
    store: Arc<dyn CredentialStore>,
    state: Arc<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            store: client.store().clone(),
            state: client.session_state().clone(),
            events: client.events().clone(),
            client,
        }
    }

    /// Authenticate and persist the issued token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserInfo, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).with_json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?;
        let response: LoginResponse = self.client.send(request).await?;

        let pair = TokenPair::new(response.access_token)
            .with_refresh_token(response.refresh_token);
        self.store.save(&pair).await?;

        let user = UserInfo {
            id: response.user_id,
            username: response.username,
            email: None,
            role: response.role,
        };
        *self.state.user.write() = Some(user.clone());
        tracing::info!(username = %user.username, "logged in");
        Ok(user)
    }

    /// Create an account. Does not touch the session.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserInfo, ApiError> {
        let request = ApiRequest::post(REGISTER_PATH).with_json(&RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })?;
        self.client.send(request).await
    }

    /// End the session: best-effort server logout, then local clear.
    ///
    /// A failed server call is logged and ignored; the local session is
    /// always cleared and one `Ended(LoggedOut)` event emitted.
    pub async fn logout(&self) -> Result<(), ApiError> {
        if self.store.load().await?.is_some() {
            if let Err(err) = self.client.send_unit(ApiRequest::post(LOGOUT_PATH)).await {
                tracing::warn!(error = %err, "server logout failed, clearing locally");
            }
        }
        self.store.clear().await?;
        self.state.user.write().take();
        let _ = self.events.send(SessionEvent::Ended(SessionEndReason::LoggedOut));
        tracing::info!("logged out");
        Ok(())
    }

    /// Restore a session from a persisted credential at startup.
    ///
    /// No stored credential means logged out, with no network call (the
    /// stored access token is the sole source of truth). The current-user
    /// fetch goes through the guarded send, so an expired access token is
    /// refreshed transparently; any failure is treated as logged out.
    pub async fn rehydrate(&self) -> Result<Option<UserInfo>, ApiError> {
        if self.store.load().await?.is_none() {
            tracing::debug!("no persisted credential, starting logged out");
            return Ok(None);
        }
        match self
            .client
            .send::<UserInfo>(ApiRequest::get(CURRENT_USER_PATH))
            .await
        {
            Ok(user) => {
                *self.state.user.write() = Some(user.clone());
                tracing::info!(username = %user.username, "session rehydrated");
                Ok(Some(user))
            }
            Err(err) => {
                tracing::warn!(error = %err, "rehydration failed, treating as logged out");
                self.store.clear().await?;
                self.state.user.write().take();
                Ok(None)
            }
        }
    }

    /// Fetch the subject from the backend through the guarded send.
    pub async fn fetch_current_user(&self) -> Result<UserInfo, ApiError> {
        let user: UserInfo = self
            .client
            .send(ApiRequest::get(CURRENT_USER_PATH))
            .await?;
        *self.state.user.write() = Some(user.clone());
        Ok(user)
    }

    /// Cached subject, if logged in.
    pub fn current_user(&self) -> Option<UserInfo> {
        self.state.user.read().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.user.read().is_some()
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
