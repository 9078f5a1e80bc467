//! Single-flight access token renewal.
//!
//! The cell below is the only shared mutable resource of the protocol: it
//! is installed before the refresh future first suspends and cleared only
//! after the outcome has been applied to the session, so concurrent 401s
//! join one renewal instead of racing their own.

use crate::client::PorticoClient;
use crate::types::{RefreshTokenRequest, TokenResponse};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use portico_core::SessionManager;
use reqwest::Client;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub(crate) const REFRESH_PATH: &str = "/api/v1/auth/refresh";

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Outcome of a refresh operation, observed by every joined caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new access token was obtained and applied to the session.
    Renewed(String),
    /// The session could not be renewed and has been cleared.
    Expired,
}

/// Holds the at-most-one in-flight refresh per gateway.
pub(crate) struct RefreshCell {
    inflight: Mutex<Option<SharedRefresh>>,
}

impl RefreshCell {
    pub(crate) fn new() -> Self {
        Self {
            inflight: Mutex::new(None),
        }
    }
}

impl PorticoClient {
    /// Renew the access token, joining an in-flight refresh when one
    /// exists: for N concurrent callers exactly one network call reaches
    /// the refresh endpoint and all N observe its outcome.
    pub async fn refresh_access_token(&self) -> RefreshOutcome {
        let pending = {
            let cell = Arc::clone(self.refresh_cell());
            let mut inflight = cell.inflight.lock().expect("refresh cell lock poisoned");

            if let Some(pending) = inflight.as_ref() {
                debug!("joining in-flight token refresh");
                pending.clone()
            } else {
                let http = self.http().clone();
                let base_url = self.base_url().to_string();
                let session = self.session().clone();
                // Weak, so the stored future does not keep its own cell
                // alive after the gateway is dropped.
                let slot = Arc::downgrade(&cell);
                let pending: SharedRefresh = async move {
                    let outcome = renew_session(&http, &base_url, &session).await;
                    if let Some(cell) = slot.upgrade() {
                        cell.inflight
                            .lock()
                            .expect("refresh cell lock poisoned")
                            .take();
                    }
                    outcome
                }
                .boxed()
                .shared();
                *inflight = Some(pending.clone());
                pending
            }
        };

        pending.await
    }
}

/// Drive one renewal against the refresh endpoint.
///
/// Fails closed: a missing refresh token, a rejection, a transport
/// failure, and an unparseable body all tear the session down before
/// resolving `Expired`.
async fn renew_session(http: &Client, base_url: &str, session: &SessionManager) -> RefreshOutcome {
    let Some(refresh_token) = session.refresh_token() else {
        warn!("token refresh requested without a stored refresh token");
        expire(session).await;
        return RefreshOutcome::Expired;
    };

    let request = http
        .post(format!("{base_url}{REFRESH_PATH}"))
        .json(&RefreshTokenRequest { refresh_token });

    let response = match request.send().await {
        Ok(response) => response,
        Err(error) => {
            warn!(%error, "token refresh transport failure");
            expire(session).await;
            return RefreshOutcome::Expired;
        }
    };

    if !response.status().is_success() {
        warn!(status = %response.status(), "refresh token rejected");
        expire(session).await;
        return RefreshOutcome::Expired;
    }

    let tokens: TokenResponse = match response.json().await {
        Ok(tokens) => tokens,
        Err(error) => {
            warn!(%error, "malformed refresh response");
            expire(session).await;
            return RefreshOutcome::Expired;
        }
    };

    match session
        .apply_refreshed_tokens(&tokens.access_token, &tokens.refresh_token)
        .await
    {
        Ok(()) => {
            debug!("access token renewed");
            RefreshOutcome::Renewed(tokens.access_token)
        }
        Err(error) => {
            warn!(%error, "failed to persist renewed tokens");
            expire(session).await;
            RefreshOutcome::Expired
        }
    }
}

async fn expire(session: &SessionManager) {
    if let Err(error) = session.logout().await {
        warn!(%error, "failed to clear session after refresh failure");
    }
}
