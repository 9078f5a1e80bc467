//! Portico HTTP client: the authenticated request gateway.
//!
//! Wraps outbound requests with the session's bearer credential, detects
//! 401 responses, renews the access token through a single-flight refresh,
//! and retries the failed request exactly once.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod refresh;
pub mod types;

pub use client::{PorticoClient, PorticoClientBuilder};
pub use config::ClientConfig;
pub use error::ClientError;
pub use refresh::RefreshOutcome;
pub use types::{LoginRequest, RefreshTokenRequest, TokenResponse};
