//! FinBuddy Core Library
//!
//! Shared functionality for the FinBuddy conversational finance assistant:
//! - Database access and migrations
//! - Intent classification over pluggable model backends
//! - Per-user bounded conversation context
//! - Intent dispatch producing chat-ready replies
//! - Spending aggregation and report narration
//! - Prompt library for customizable prompts

pub mod ai;
pub mod classifier;
pub mod context;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod prompts;
pub mod report;

pub use ai::{
    Classification, GeminiBackend, MockBackend, ModelBackend, ModelClient, OllamaBackend,
    TransactionItem,
};
pub use classifier::{ClassifyOutcome, IntentClassifier, RetryPolicy};
pub use context::{
    ContextEntry, ContextStore, ContextSummary, InMemoryContextStore, Role,
    DEFAULT_WINDOW_CAPACITY,
};
pub use db::Database;
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use models::{
    NewTransaction, RangeSummary, SummaryOutcome, Transaction, TransactionKind, User,
    UNCATEGORIZED,
};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use report::ReportGenerator;
