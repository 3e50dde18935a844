//! Bearer decoration for outgoing requests.

use std::sync::Arc;

use wardgate_core::{ApiError, CredentialStore};

use crate::transport::{ApiRequest, RawResponse, Transport};

/// Attaches the current access token to outgoing requests.
///
/// The credential is read from the store at call time, not when the request
/// was built, so a request replayed after a refresh automatically carries
/// the newest access token. Pure decoration: no retry, no error
/// classification.
pub struct BearerAuth {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
}

impl BearerAuth {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn CredentialStore>) -> Self {
        Self { transport, store }
    }

    /// Attach the current access token (when present) and delegate.
    pub async fn send(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        let mut request = request.clone();
        if let Some(pair) = self.store.load().await? {
            request.bearer = Some(pair.access_token);
        }
        self.transport.execute(&request).await
    }
}
