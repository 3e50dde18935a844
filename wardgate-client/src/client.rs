//! The guarded request primitive.
//!
//! [`ApiClient::send`] is what every caller uses instead of talking to the
//! transport directly: it decorates the request with the current access
//! token, detects credential expiry, funnels concurrent expiries into a
//! single refresh, and replays once with the new credential.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::broadcast;

use wardgate_core::{ApiError, CredentialStore, Envelope};

use crate::auth::BearerAuth;
use crate::refresh::{REFRESH_PATH, RefreshGate, RefreshOutcome};
use crate::session::{SessionEvent, SessionState};
use crate::transport::{ApiRequest, RawResponse, Transport};

/// Authenticated client with transparent, single-flight refresh.
///
/// Cheap to share behind an [`Arc`]; all state lives in the injected store
/// and the internal refresh gate.
pub struct ApiClient {
    auth: BearerAuth,
    gate: RefreshGate,
    store: Arc<dyn CredentialStore>,
    session: Arc<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl ApiClient {
    /// Build a client over a transport and a credential store.
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn CredentialStore>) -> Self {
        let (events, _) = broadcast::channel(16);
        let session = Arc::new(SessionState::default());
        Self {
            auth: BearerAuth::new(transport.clone(), store.clone()),
            gate: RefreshGate::new(transport, store.clone(), session.clone(), events.clone()),
            store,
            session,
            events,
        }
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Send a request and decode the enveloped payload.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let raw = self.send_raw(&request).await?;
        let envelope: Envelope<T> = serde_json::from_slice(&raw.body)?;
        envelope.into_data()
    }

    /// Send a request, requiring only an OK envelope code.
    pub async fn send_unit(&self, request: ApiRequest) -> Result<(), ApiError> {
        let raw = self.send_raw(&request).await?;
        let envelope: Envelope<serde_json::Value> = serde_json::from_slice(&raw.body)?;
        envelope.into_unit()
    }

    /// The guarded exchange: at most one transparent refresh-and-replay on
    /// credential expiry. Every other response, success or failure, is
    /// returned unchanged.
    pub async fn send_raw(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        let mut retried = false;
        loop {
            let response = self.auth.send(request).await?;
            if !response.is_unauthorized() {
                return Ok(response);
            }
            if retried || request.path == REFRESH_PATH {
                // A second expiry after a successful refresh is terminal,
                // and a directly-addressed refresh endpoint never recovers
                // through the gate.
                return Err(ApiError::Unauthenticated);
            }
            match self.gate.wait_or_refresh().await {
                RefreshOutcome::Refreshed => retried = true,
                RefreshOutcome::Failed => return Err(ApiError::Unauthenticated),
            }
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub(crate) fn session_state(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub(crate) fn events(&self) -> &broadcast::Sender<SessionEvent> {
        &self.events
    }
}
