//! Gemini backend implementation
//!
//! HTTP client for the Google Generative Language API. This is the default
//! production backend: it supports system instructions and web-search
//! grounding via the `google_search` tool.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::ModelBackend;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini backend
///
/// A 429 from the API surfaces as `Error::RateLimited` so callers can back
/// off instead of treating it as a hard failure.
#[derive(Clone)]
pub struct GeminiBackend {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiBackend {
    /// Create a new Gemini backend
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Create with a custom base URL (for tests against a local stub)
    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").ok()?;
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Some(Self::new(&api_key, &model))
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self.http_client.post(&url).json(&request).send().await?;

        if response.status().as_u16() == 429 {
            return Err(Error::RateLimited(format!(
                "Gemini quota exhausted for model {}",
                self.model
            )));
        }
        let response = response.error_for_status()?;

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| Error::Model("Gemini reply contained no text part".into()))?;

        debug!("Gemini response: {}", text);
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

fn text_content(text: &str) -> Content {
    Content {
        parts: vec![Part {
            text: Some(text.to_string()),
        }],
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![text_content(user)],
            system_instruction: system.map(text_content),
            tools: Vec::new(),
        };
        self.generate(request).await
    }

    async fn search_grounded(&self, query: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![text_content(query)],
            system_instruction: None,
            tools: vec![Tool {
                google_search: serde_json::json!({}),
            }],
        };
        self.generate(request).await
    }

    async fn health_check(&self) -> bool {
        let url = format!(
            "{}/models/{}?key={}",
            self.base_url, self.model, self.api_key
        );
        match self.http_client.get(&url).send().await {
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
    fn test_request_serialization_shape() {
        let request = GenerateRequest {
            contents: vec![text_content("hello")],
            system_instruction: Some(text_content("be terse")),
            tools: Vec::new(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be terse");
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_grounded_request_carries_search_tool() {
        let request = GenerateRequest {
            contents: vec![text_content("gold rate today")],
            system_instruction: None,
            tools: vec![Tool {
                google_search: serde_json::json!({}),
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json["tools"][0].get("google_search").is_some());
    }

    #[test]
    fn test_response_text_extraction() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "42"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text);
        assert_eq!(text.as_deref(), Some("42"));
    }
}
