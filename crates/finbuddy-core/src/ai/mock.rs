//! Mock backend for testing
//!
//! Provides scripted responses for the completion interface. Useful for
//! unit tests and development without a model server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::ModelBackend;

/// Outcome scripted for a mock completion call
#[derive(Clone)]
enum ScriptedReply {
    Text(String),
    RateLimited,
    Failure(String),
}

/// Mock model backend
///
/// Replies are served from a FIFO script; when the script runs dry the mock
/// falls back to a fixed greeting payload so unscripted calls stay
/// deterministic. The completion call counter lets tests assert that a code
/// path never reached the model.
#[derive(Clone, Default)]
pub struct MockBackend {
    script: Arc<Mutex<VecDeque<ScriptedReply>>>,
    completions: Arc<AtomicUsize>,
    /// Whether health_check should return true
    pub healthy: bool,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            completions: Arc::new(AtomicUsize::new(0)),
            healthy: true,
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Queue a reply for the next completion call
    pub fn push_reply(&self, text: impl Into<String>) {
        self.script
            .lock()
            .expect("mock script poisoned")
            .push_back(ScriptedReply::Text(text.into()));
    }

    /// Queue a rate-limit error for the next completion call
    pub fn push_rate_limited(&self) {
        self.script
            .lock()
            .expect("mock script poisoned")
            .push_back(ScriptedReply::RateLimited);
    }

    /// Queue a hard failure for the next completion call
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script
            .lock()
            .expect("mock script poisoned")
            .push_back(ScriptedReply::Failure(message.into()));
    }

    /// Number of completion calls made so far (grounded searches included)
    pub fn calls(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Result<String> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .script
            .lock()
            .expect("mock script poisoned")
            .pop_front();

        match scripted {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::RateLimited) => {
                Err(Error::RateLimited("mock quota exhausted".into()))
            }
            Some(ScriptedReply::Failure(message)) => Err(Error::Model(message)),
            None => Ok(r#"{"intent": "greeting", "response": "Hello from the mock!"}"#.to_string()),
        }
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn complete(&self, _system: Option<&str>, _user: &str) -> Result<String> {
        self.next_reply()
    }

    async fn search_grounded(&self, _query: &str) -> Result<String> {
        self.next_reply()
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
