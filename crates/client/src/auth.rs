//! Authentication API client methods

use crate::client::PorticoClient;
use crate::error::ClientError;
use crate::types::{LoginRequest, TokenResponse};
use portico_core::User;
use tracing::warn;

impl PorticoClient {
    /// Authenticate with email and password, then establish the session
    /// from the returned token pair and the user's profile.
    ///
    /// The profile is fetched before the session is touched, so a failed
    /// login stores no partial state.
    pub async fn login(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<User, ClientError> {
        let request = self
            .http()
            .post(format!("{}/api/v1/auth/login", self.base_url()))
            .json(&LoginRequest {
                email: email.into(),
                password: password.into(),
            });
        let tokens: TokenResponse = decode(request.send().await?).await?;

        let request = self
            .http()
            .get(format!("{}/api/v1/auth/me", self.base_url()))
            .bearer_auth(&tokens.access_token);
        let user: User = decode(request.send().await?).await?;

        self.session()
            .login(tokens.access_token, tokens.refresh_token, user.clone())
            .await?;
        Ok(user)
    }

    /// Fetch the signed-in user's profile through the gateway.
    pub async fn fetch_profile(&self) -> Result<User, ClientError> {
        let request = self.request(reqwest::Method::GET, "/api/v1/auth/me");
        self.execute(request).await
    }

    /// End the session. The backend call is best-effort; local state is
    /// cleared regardless.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let request = self.request(reqwest::Method::POST, "/api/v1/auth/logout");
        if let Err(error) = self.send(request).await {
            warn!(%error, "logout request failed");
        }
        self.session().logout().await?;
        Ok(())
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response.json().await?)
    } else {
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        Err(ClientError::from_status(status, message))
    }
}
