//! Per-user bounded conversational context windows
//!
//! Each user gets an independent append-only window of recent turns, capped
//! at a fixed size with FIFO eviction. The store is process-local and
//! ephemeral: a restart loses all context. That is a documented limitation,
//! not a bug — persisted state lives in the ledger, not here.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Who produced a context entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One conversational turn in a user's window
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub role: Role,
    pub text: String,
}

impl ContextEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Counts describing a user's window, for the `history` meta-command
#[derive(Debug, Clone, Default)]
pub struct ContextSummary {
    pub total: usize,
    pub user_turns: usize,
    pub assistant_turns: usize,
    /// Text of the most recent entry, truncated to 100 chars
    pub last: Option<String>,
}

/// Store of per-user context windows.
///
/// An explicit abstraction rather than a module-level singleton so the
/// dispatcher can be handed an in-memory store in tests and an alternative
/// backing in production.
pub trait ContextStore: Send + Sync {
    /// Append a turn, evicting the oldest entry once the cap is exceeded
    fn append(&self, user_id: i64, entry: ContextEntry);

    /// The most recent `k` entries, oldest first
    fn recent(&self, user_id: i64, k: usize) -> Vec<ContextEntry>;

    /// Drop a user's entire window, returning how many entries were removed
    fn clear(&self, user_id: i64) -> usize;

    /// Counts for a user's window
    fn summary(&self, user_id: i64) -> ContextSummary;
}

/// Default capacity of a user's context window
pub const DEFAULT_WINDOW_CAPACITY: usize = 20;

/// In-memory context store: one bounded ring per user id
pub struct InMemoryContextStore {
    capacity: usize,
    windows: Mutex<HashMap<i64, VecDeque<ContextEntry>>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WINDOW_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStore for InMemoryContextStore {
    fn append(&self, user_id: i64, entry: ContextEntry) {
        let mut windows = self.windows.lock().expect("context store poisoned");
        let window = windows.entry(user_id).or_default();
        window.push_back(entry);
        while window.len() > self.capacity {
            window.pop_front();
        }
    }

    fn recent(&self, user_id: i64, k: usize) -> Vec<ContextEntry> {
        let windows = self.windows.lock().expect("context store poisoned");
        match windows.get(&user_id) {
            Some(window) => {
                let skip = window.len().saturating_sub(k);
                window.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    fn clear(&self, user_id: i64) -> usize {
        let mut windows = self.windows.lock().expect("context store poisoned");
        windows.remove(&user_id).map(|w| w.len()).unwrap_or(0)
    }

    fn summary(&self, user_id: i64) -> ContextSummary {
        let windows = self.windows.lock().expect("context store poisoned");
        let Some(window) = windows.get(&user_id) else {
            return ContextSummary::default();
        };

        let user_turns = window.iter().filter(|e| e.role == Role::User).count();
        ContextSummary {
            total: window.len(),
            user_turns,
            assistant_turns: window.len() - user_turns,
            last: window.back().map(|e| {
                let mut text = e.text.clone();
                if text.len() > 100 {
                    text.truncate(100);
                    text.push_str("...");
                }
                text
            }),
        }
    }
}
