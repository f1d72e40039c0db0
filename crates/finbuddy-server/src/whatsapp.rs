//! Outbound WhatsApp messaging
//!
//! Replies go out through the whapi.cloud gateway. The transport is a trait
//! so tests can record outbound sends instead of hitting the network.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use finbuddy_core::Result;

const DEFAULT_BASE_URL: &str = "https://gate.whapi.cloud";

/// Sends a text reply back to a chat handle
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;
}

/// whapi.cloud gateway client
#[derive(Clone)]
pub struct WhapiClient {
    http_client: Client,
    base_url: String,
    token: String,
}

impl WhapiClient {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Create from environment variables (WHAPI_TOKEN, optional WHAPI_BASE_URL)
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("WHAPI_TOKEN").ok()?;
        let base_url =
            std::env::var("WHAPI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Some(Self::with_base_url(&token, &base_url))
    }
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    to: &'a str,
    body: &'a str,
}

#[async_trait]
impl MessageTransport for WhapiClient {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        let response = self
            .http_client
            .post(format!("{}/messages/text", self.base_url))
            .bearer_auth(&self.token)
            .json(&SendTextRequest { to, body })
            .send()
            .await?;

        response.error_for_status()?;
        debug!(to, "Sent WhatsApp reply");
        Ok(())
    }
}
