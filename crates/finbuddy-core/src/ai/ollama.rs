//! Ollama backend implementation
//!
//! HTTP client for the Ollama generate API. Intended for local development
//! where no hosted model is available.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::ModelBackend;

/// Ollama backend
///
/// Talks to a local (or remote) Ollama server over its HTTP API. Ollama has
/// no web-search facility, so grounded queries degrade to a plain
/// completion with a caveat prepended to the prompt.
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Some(Self::new(&host, &model))
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt,
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if response.status().as_u16() == 429 {
            return Err(Error::RateLimited(format!(
                "Ollama at {} is overloaded",
                self.base_url
            )));
        }
        let response = response.error_for_status()?;

        let ollama_response: OllamaResponse = response.json().await?;
        debug!("Ollama response: {}", ollama_response.response);

        Ok(ollama_response.response)
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String> {
        // The generate endpoint takes a single prompt, so the system
        // instruction is folded in above the user text.
        let prompt = match system {
            Some(sys) => format!("{}\n\n{}", sys, user),
            None => user.to_string(),
        };
        self.generate(prompt).await
    }

    async fn search_grounded(&self, query: &str) -> Result<String> {
        let prompt = format!(
            "Answer from your own knowledge. If the answer depends on live data \
             you do not have, say so and give the most recent figure you know.\n\n{}",
            query
        );
        self.generate(prompt).await
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let backend = OllamaBackend::new("http://localhost:11434/", "llama3.2");
        assert_eq!(backend.host(), "http://localhost:11434");
        assert_eq!(backend.model(), "llama3.2");
    }
}
