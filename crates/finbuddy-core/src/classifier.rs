//! Intent classification
//!
//! Sends the inbound message, today's date, and a slice of recent
//! conversation to the model and parses the JSON verdict. Rate limits are
//! retried with a bounded backoff; an unparseable reply is reported as
//! unclassifiable rather than retried, since resending the same prompt
//! rarely fixes a malformed payload.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::ai::parsing::extract_payload;
use crate::ai::{Classification, ModelBackend};
use crate::context::{ContextEntry, Role};
use crate::error::{Error, Result};
use crate::prompts::{PromptId, PromptLibrary};

/// How many recent turns the classification prompt sees
pub const HISTORY_TURNS: usize = 10;

/// Assistant turns are long (reports); cap them so history stays cheap
const ASSISTANT_TURN_MAX_CHARS: usize = 200;

/// Backoff policy for rate-limited classification calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy with no pauses, for tests
    pub fn immediate() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::ZERO,
        }
    }
}

/// Result of a classification attempt
#[derive(Debug)]
pub enum ClassifyOutcome {
    /// The model produced a well-formed verdict
    Classified(Classification),
    /// The model replied but the payload could not be parsed
    Unclassifiable {
        /// Raw model reply, for logging
        raw: String,
    },
}

/// Classifies inbound messages into intents via the model
pub struct IntentClassifier<M> {
    model: M,
    prompts: Mutex<PromptLibrary>,
    retry: RetryPolicy,
}

impl<M: ModelBackend> IntentClassifier<M> {
    pub fn new(model: M) -> Self {
        Self::with_retry(model, RetryPolicy::default())
    }

    pub fn with_retry(model: M, retry: RetryPolicy) -> Self {
        Self {
            model,
            prompts: Mutex::new(PromptLibrary::new()),
            retry,
        }
    }

    /// Classify a message against recent conversation turns.
    ///
    /// Errors only on exhausted rate-limit retries or transport failure;
    /// a malformed payload comes back as `ClassifyOutcome::Unclassifiable`.
    pub async fn classify(
        &self,
        message: &str,
        history: &[ContextEntry],
        today: NaiveDate,
    ) -> Result<ClassifyOutcome> {
        let today_str = today.format("%Y-%m-%d").to_string();
        let history_block = format_history(history);

        let (system, user) = {
            let mut prompts = self
                .prompts
                .lock()
                .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
            let template = prompts.get(PromptId::ClassifyIntent)?;
            let mut vars = HashMap::new();
            vars.insert("today", today_str.as_str());
            vars.insert("message", message);
            if !history_block.is_empty() {
                vars.insert("history", history_block.as_str());
            }
            (template.render_system(&vars), template.render_user(&vars))
        };

        let raw = self.complete_with_retry(system.as_deref(), &user).await?;

        match extract_payload(&raw) {
            Ok(classification) => {
                debug!(intent = classification.intent_name(), "Classified message");
                Ok(ClassifyOutcome::Classified(classification))
            }
            Err(e) => {
                warn!("Unparseable classification payload: {}", e);
                Ok(ClassifyOutcome::Unclassifiable { raw })
            }
        }
    }

    async fn complete_with_retry(&self, system: Option<&str>, user: &str) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self.model.complete(system, user).await {
                Ok(raw) => return Ok(raw),
                Err(e) if e.is_rate_limit() && attempt < self.retry.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "Model rate limited, backing off"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Format context entries for the classification prompt, newest last.
///
/// Only the trailing `HISTORY_TURNS` entries are included, and assistant
/// turns are truncated.
pub fn format_history(entries: &[ContextEntry]) -> String {
    let skip = entries.len().saturating_sub(HISTORY_TURNS);
    entries
        .iter()
        .skip(skip)
        .map(|entry| match entry.role {
            Role::User => format!("User: {}", entry.text),
            Role::Assistant => {
                let mut text = entry.text.clone();
                if text.chars().count() > ASSISTANT_TURN_MAX_CHARS {
                    text = text.chars().take(ASSISTANT_TURN_MAX_CHARS).collect();
                    text.push_str("...");
                }
                format!("Assistant: {}", text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
