//! Single-flight credential refresh.
//!
//! The gate owns the refresh state and the queue of suspended callers. The
//! `Idle -> Refreshing` transition happens under one mutex, so exactly one
//! caller becomes the leader and performs the network exchange; everyone
//! else parks on a oneshot handle and is released in FIFO order when the
//! leader finishes. The mutex covers only state inspection and transition;
//! it is never held across an await.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};

use wardgate_core::{
    ApiError, CredentialStore, Envelope, RefreshRequest, RefreshResponse, Secret, TokenPair,
};

use crate::session::{SessionEndReason, SessionEvent, SessionState};
use crate::transport::{ApiRequest, Transport};

pub(crate) const REFRESH_PATH: &str = "/auth/refresh";

/// Outcome delivered to every caller that hit an expiry while a refresh was
/// pending or in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshOutcome {
    /// A new pair is in the store; replay the request.
    Refreshed,
    /// The refresh failed; the session is over.
    Failed,
}

enum RefreshState {
    Idle,
    Refreshing,
}

struct GateInner {
    state: RefreshState,
    /// Completion handles for suspended callers, oldest first. Fulfilled at
    /// most once each, and cleared in one step on resolution. Never
    /// partially drained.
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

pub(crate) struct RefreshGate {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    session: Arc<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    inner: Mutex<GateInner>,
}

/// Returns the gate to `Idle` and fails any queued callers if the leader's
/// future is dropped mid-refresh. Keeps the gate live even when the task
/// driving the refresh is cancelled.
struct ResetGuard<'a> {
    gate: &'a RefreshGate,
    done: bool,
}

impl ResetGuard<'_> {
    fn finish(&mut self, outcome: RefreshOutcome) {
        self.done = true;
        self.gate.release(outcome);
    }
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.gate.release(RefreshOutcome::Failed);
        }
    }
}

impl RefreshGate {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        session: Arc<SessionState>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            transport,
            store,
            session,
            events,
            inner: Mutex::new(GateInner {
                state: RefreshState::Idle,
                waiters: Vec::new(),
            }),
        }
    }

    /// Suspend on an in-flight refresh, or become the leader and run one.
    ///
    /// Callers act on the outcome themselves: on [`RefreshOutcome::Refreshed`]
    /// they replay their request through the bearer decoration, which reads
    /// the store and therefore picks up the new pair.
    pub(crate) async fn wait_or_refresh(&self) -> RefreshOutcome {
        let rx = {
            let mut inner = self.inner.lock();
            match inner.state {
                RefreshState::Refreshing => {
                    let (tx, rx) = oneshot::channel();
                    inner.waiters.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    inner.state = RefreshState::Refreshing;
                    None
                }
            }
        };

        if let Some(rx) = rx {
            tracing::debug!("refresh already in flight, waiting");
            // A dropped sender means the leader went away without resolving;
            // treat it the same as a failed refresh.
            return rx.await.unwrap_or(RefreshOutcome::Failed);
        }

        // Leader path. No locks are held from here on.
        let mut guard = ResetGuard {
            gate: self,
            done: false,
        };
        let outcome = match self.run_refresh().await {
            Ok(()) => {
                tracing::info!("credential refresh succeeded");
                RefreshOutcome::Refreshed
            }
            Err(err) => {
                let reason = match &err {
                    ApiError::Unauthenticated => SessionEndReason::Unauthenticated,
                    _ => SessionEndReason::RefreshFailed,
                };
                tracing::error!(error = %err, "credential refresh failed, ending session");
                self.end_session(reason).await;
                RefreshOutcome::Failed
            }
        };
        guard.finish(outcome);
        outcome
    }

    /// Return to `Idle` and fulfill every queued handle, oldest first.
    fn release(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut inner = self.inner.lock();
            inner.state = RefreshState::Idle;
            std::mem::take(&mut inner.waiters)
        };
        for tx in waiters {
            // The receiver may be gone if its caller lost interest.
            let _ = tx.send(outcome);
        }
    }

    /// Perform the refresh exchange and persist the replacement pair.
    ///
    /// Goes straight through the transport: the refresh call carries the
    /// refresh token in its body, must not be decorated with the access
    /// token, and must never recover through the gate itself.
    async fn run_refresh(&self) -> Result<(), ApiError> {
        let refresh_token = match self.store.load().await? {
            Some(pair) => match pair.refresh_token {
                Some(token) => token,
                // No refresh credential: fail without a network call.
                None => return Err(ApiError::Unauthenticated),
            },
            None => return Err(ApiError::Unauthenticated),
        };

        tracing::info!("access token rejected, exchanging refresh token");
        let request = ApiRequest::post(REFRESH_PATH).with_json(&RefreshRequest {
            refresh_token: refresh_token.expose().to_string(),
        })?;
        let response = self.transport.execute(&request).await?;

        if response.is_unauthorized() {
            return Err(ApiError::RefreshExhausted {
                message: "refresh token rejected".to_string(),
            });
        }
        if !response.status.is_success() {
            return Err(ApiError::RefreshExhausted {
                message: format!("refresh returned http {}", response.status),
            });
        }

        let envelope: Envelope<RefreshResponse> = serde_json::from_slice(&response.body)?;
        let refreshed = envelope.into_data().map_err(|err| ApiError::RefreshExhausted {
            message: err.to_string(),
        })?;

        let mut pair = TokenPair::new(refreshed.access_token);
        pair.refresh_token = match refreshed.refresh_token {
            Some(new) => Some(Secret::new(new)),
            // Absent in the response means the old one stays valid.
            None => Some(refresh_token),
        };
        self.store.save(&pair).await?;
        Ok(())
    }

    /// Terminal failure: clear the stored pair and the subject, and notify
    /// subscribers exactly once so the embedding application can react.
    async fn end_session(&self, reason: SessionEndReason) {
        if let Err(err) = self.store.clear().await {
            tracing::warn!(error = %err, "failed to clear credential store");
        }
        self.session.user.write().take();
        let _ = self.events.send(SessionEvent::Ended(reason));
    }
}
