//! Portico API client

use crate::config::{ClientConfig, DEFAULT_TIMEOUT_SECS};
use crate::error::ClientError;
use crate::refresh::{RefreshCell, RefreshOutcome};
use portico_core::SessionManager;
use reqwest::{Client, ClientBuilder, Response, StatusCode, header};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Authenticated request gateway.
///
/// Attaches the session's bearer credential to every outgoing request. A
/// 401 response triggers the single-flight refresh protocol and one
/// retry with the renewed token; see [`crate::refresh`].
#[derive(Clone)]
pub struct PorticoClient {
    http: Client,
    base_url: String,
    session: SessionManager,
    refresh: Arc<RefreshCell>,
}

impl PorticoClient {
    /// Create a new client with default configuration
    pub fn new(
        base_url: impl Into<String>,
        session: SessionManager,
    ) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).session(session).build()
    }

    /// Create a new client builder
    pub fn builder() -> PorticoClientBuilder {
        PorticoClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The session this gateway reads credentials from.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn refresh_cell(&self) -> &Arc<RefreshCell> {
        &self.refresh
    }

    /// Create a request builder, attaching the current access token when
    /// one is present. Token-less requests go out bare; the backend's
    /// rejection is the caller's to interpret.
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, url);

        if let Some(token) = self.session.access_token() {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        request
    }

    /// Issue a request, driving the refresh protocol on a 401.
    ///
    /// Any status other than 401 is returned as-is. On a 401 the gateway
    /// renews the access token (joining an in-flight refresh if one
    /// exists) and retries exactly once with the new credential; the
    /// retry's response is returned whatever its status. If the session
    /// could not be renewed it has already been cleared and the ORIGINAL
    /// 401 response is returned unchanged.
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ClientError> {
        let request = request.build()?;
        let retry = request.try_clone();
        let response = self.http.execute(request).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(mut retry) = retry else {
            warn!("unauthorized response on a non-replayable request, skipping retry");
            return Ok(response);
        };

        match self.refresh_access_token().await {
            RefreshOutcome::Renewed(access_token) => {
                let bearer = header::HeaderValue::try_from(format!("Bearer {access_token}"))
                    .map_err(|_| {
                        ClientError::Configuration(
                            "renewed access token is not a valid header value".into(),
                        )
                    })?;
                retry.headers_mut().insert(header::AUTHORIZATION, bearer);
                debug!("retrying request with renewed access token");
                Ok(self.http.execute(retry).await?)
            }
            RefreshOutcome::Expired => Ok(response),
        }
    }

    /// Execute a request and decode the JSON body, mapping non-success
    /// statuses to typed errors.
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }
}

/// Builder for PorticoClient
#[derive(Default)]
pub struct PorticoClientBuilder {
    base_url: Option<String>,
    session: Option<SessionManager>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl PorticoClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the session the gateway reads and renews credentials through
    pub fn session(mut self, session: SessionManager) -> Self {
        self.session = Some(session);
        self
    }

    /// Set the request timeout (bounds the refresh call as well)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Take base URL, timeout, and user agent from a loaded config
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.base_url = Some(config.base_url);
        self.timeout = Some(Duration::from_secs(config.timeout_secs));
        self.user_agent = Some(config.user_agent);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<PorticoClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        let session = self
            .session
            .ok_or_else(|| ClientError::Configuration("session is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new();

        #[cfg(not(target_arch = "wasm32"))]
        {
            let timeout = self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
            client_builder = client_builder.timeout(timeout);
        }

        if let Some(user_agent) = self.user_agent {
            client_builder = client_builder.user_agent(user_agent);
        } else {
            client_builder = client_builder.user_agent("portico-client/0.1.0");
        }

        let http = client_builder.build()?;

        Ok(PorticoClient {
            http,
            base_url,
            session,
            refresh: Arc::new(RefreshCell::new()),
        })
    }
}
