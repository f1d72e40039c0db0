//! Pluggable model backend abstraction
//!
//! The pipeline treats the language model as an opaque call: text in, text
//! out, may fail transiently. This module provides the backend-agnostic
//! interface and the concrete backends.
//!
//! # Architecture
//!
//! - `ModelBackend` trait: completion + grounded search
//! - `ModelClient` enum: concrete wrapper providing Clone + compile-time
//!   dispatch
//! - Backend implementations: `GeminiBackend`, `OllamaBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `MODEL_BACKEND`: Backend to use (gemini, ollama, mock). Default: gemini
//! - `GEMINI_API_KEY`: API key (required for gemini backend)
//! - `GEMINI_MODEL`: Model name (default: gemini-2.0-flash)
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_MODEL`: Model name (default: llama3.2)

mod gemini;
mod mock;
mod ollama;
pub mod parsing;
pub mod types;

pub use gemini::GeminiBackend;
pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use types::{Classification, TransactionItem};

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the interface for all model backends
///
/// Backends must be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Run a plain completion with an optional system instruction.
    ///
    /// A transient resource-exhaustion signal must surface as
    /// `Error::RateLimited` so the classifier's backoff can distinguish it
    /// from hard failures.
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String>;

    /// Answer a query with live web-search grounding.
    ///
    /// Backends without a grounding facility degrade to a plain completion.
    async fn search_grounded(&self, query: &str) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete model client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum ModelClient {
    /// Google Generative Language API backend
    Gemini(GeminiBackend),
    /// Ollama backend (local HTTP API)
    Ollama(OllamaBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl ModelClient {
    /// Create a model client from environment variables
    ///
    /// Checks `MODEL_BACKEND` to determine which backend to use:
    /// - `gemini` (default): Uses GEMINI_API_KEY and GEMINI_MODEL
    /// - `ollama`: Uses OLLAMA_HOST and OLLAMA_MODEL
    /// - `mock`: Creates a mock backend for testing
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("MODEL_BACKEND").unwrap_or_else(|_| "gemini".to_string());

        match backend.to_lowercase().as_str() {
            "gemini" => GeminiBackend::from_env().map(ModelClient::Gemini),
            "ollama" => OllamaBackend::from_env().map(ModelClient::Ollama),
            "mock" => Some(ModelClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown MODEL_BACKEND, falling back to gemini");
                GeminiBackend::from_env().map(ModelClient::Gemini)
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ModelClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl ModelBackend for ModelClient {
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String> {
        match self {
            ModelClient::Gemini(b) => b.complete(system, user).await,
            ModelClient::Ollama(b) => b.complete(system, user).await,
            ModelClient::Mock(b) => b.complete(system, user).await,
        }
    }

    async fn search_grounded(&self, query: &str) -> Result<String> {
        match self {
            ModelClient::Gemini(b) => b.search_grounded(query).await,
            ModelClient::Ollama(b) => b.search_grounded(query).await,
            ModelClient::Mock(b) => b.search_grounded(query).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            ModelClient::Gemini(b) => b.health_check().await,
            ModelClient::Ollama(b) => b.health_check().await,
            ModelClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ModelClient::Gemini(b) => b.model(),
            ModelClient::Ollama(b) => b.model(),
            ModelClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            ModelClient::Gemini(b) => b.host(),
            ModelClient::Ollama(b) => b.host(),
            ModelClient::Mock(b) => b.host(),
        }
    }
}
