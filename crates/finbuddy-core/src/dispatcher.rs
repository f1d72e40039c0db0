//! Intent dispatch
//!
//! Routes a classified message to its handler and always comes back with a
//! user-facing reply string. Internal failures are logged and turned into
//! canned replies; nothing in here panics or propagates an error to the
//! chat surface.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Local, NaiveDate};
use tracing::{error, info, warn};

use crate::ai::{Classification, ModelBackend, TransactionItem};
use crate::classifier::{ClassifyOutcome, IntentClassifier, RetryPolicy, HISTORY_TURNS};
use crate::context::{ContextEntry, ContextStore, ContextSummary, InMemoryContextStore, Role};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{NewTransaction, SummaryOutcome, TransactionKind};
use crate::prompts::{PromptId, PromptLibrary};
use crate::report::ReportGenerator;

/// Turns handed to the follow-up prompt
const FOLLOW_UP_TURNS: usize = 6;

/// Default lookback when a history query names no period
const DEFAULT_RANGE_DAYS: i64 = 30;

const REPLY_EMPTY: &str = "I didn't catch anything there. Tell me about a transaction or ask about your spending!";
const REPLY_BUSY: &str =
    "I'm a bit overloaded right now. Give me a minute and try again, please.";
const REPLY_TROUBLE: &str = "Something went wrong on my side. Please try that again.";
const REPLY_RESTATE: &str =
    "I couldn't quite work out what you meant. Could you rephrase that?";
const REPLY_NO_CONTEXT: &str =
    "I don't have our earlier conversation anymore. Could you ask that as a full question?";
const REPLY_LOST_THREAD: &str =
    "I lost the thread there. Could you ask that again in full?";
const REPLY_BAD_DATES: &str =
    "I couldn't make sense of those dates. Try something like 'from 2025-06-01 to 2025-06-15'.";
const REPLY_NO_ITEMS: &str =
    "I couldn't find transaction details in that. Try 'spent 500 on groceries yesterday'.";
const REPLY_SEARCH_DOWN: &str = "I couldn't look that up right now. Try again in a bit.";

/// Routes inbound messages end to end: user lookup, classification,
/// handling, context bookkeeping.
pub struct Dispatcher<M> {
    db: Database,
    model: M,
    classifier: IntentClassifier<M>,
    reports: ReportGenerator<M>,
    context: Arc<dyn ContextStore>,
    prompts: Mutex<PromptLibrary>,
}

impl<M: ModelBackend + Clone> Dispatcher<M> {
    pub fn new(db: Database, model: M) -> Self {
        Self::with_parts(
            db,
            model,
            Arc::new(InMemoryContextStore::new()),
            RetryPolicy::default(),
        )
    }

    pub fn with_parts(
        db: Database,
        model: M,
        context: Arc<dyn ContextStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db,
            classifier: IntentClassifier::with_retry(model.clone(), retry),
            reports: ReportGenerator::new(model.clone()),
            model,
            context,
            prompts: Mutex::new(PromptLibrary::new()),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Handle one inbound message and produce the reply to send back.
    ///
    /// Infallible by contract: every failure path maps to a canned reply.
    pub async fn handle_message(&self, handle: &str, text: &str) -> String {
        self.handle_on(handle, text, Local::now().date_naive()).await
    }

    /// Like [`Dispatcher::handle_message`] with an explicit "today", so
    /// relative date resolution is reproducible in tests.
    pub async fn handle_on(&self, handle: &str, text: &str, today: NaiveDate) -> String {
        let text = text.trim();
        if text.is_empty() {
            return REPLY_EMPTY.to_string();
        }

        let user_id = match self.db.create_or_get_user(handle) {
            Ok(id) => id,
            Err(e) => {
                error!(handle, "User lookup failed: {}", e);
                return REPLY_TROUBLE.to_string();
            }
        };

        let history = self.context.recent(user_id, HISTORY_TURNS);
        let reply = self.dispatch(user_id, text, &history, today).await;

        // Both turns land in the window only after a reply exists, so the
        // classification history never contains the message being classified.
        self.context.append(user_id, ContextEntry::user(text));
        self.context
            .append(user_id, ContextEntry::assistant(reply.clone()));

        reply
    }

    /// Drop a user's conversational context
    pub fn clear_context(&self, handle: &str) -> Result<usize> {
        let user_id = self.db.create_or_get_user(handle)?;
        Ok(self.context.clear(user_id))
    }

    /// Counts describing a user's context window
    pub fn context_summary(&self, handle: &str) -> Result<ContextSummary> {
        let user_id = self.db.create_or_get_user(handle)?;
        Ok(self.context.summary(user_id))
    }

    /// Build the weekly digest for a user
    pub async fn weekly_report(&self, handle: &str, week_ending: NaiveDate) -> Result<String> {
        let user_id = self.db.create_or_get_user(handle)?;
        self.reports.weekly_report(&self.db, user_id, week_ending).await
    }

    async fn dispatch(
        &self,
        user_id: i64,
        text: &str,
        history: &[ContextEntry],
        today: NaiveDate,
    ) -> String {
        let outcome = match self.classifier.classify(text, history, today).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_rate_limit() => {
                warn!(user_id, "Classification rate limited out: {}", e);
                return REPLY_BUSY.to_string();
            }
            Err(e) => {
                error!(user_id, "Classification failed: {}", e);
                return REPLY_TROUBLE.to_string();
            }
        };

        let classification = match outcome {
            ClassifyOutcome::Classified(c) => c,
            ClassifyOutcome::Unclassifiable { raw } => {
                warn!(user_id, raw, "Unclassifiable message");
                return REPLY_RESTATE.to_string();
            }
        };

        info!(user_id, intent = classification.intent_name(), "Dispatching");
        match classification {
            Classification::Greeting { response } => non_empty(response)
                .unwrap_or_else(|| "Hello! Tell me what you spent or ask about your history.".to_string()),
            Classification::OutOfContext { response } => non_empty(response).unwrap_or_else(|| {
                "I stick to personal finance. Tell me about a transaction or your spending!"
                    .to_string()
            }),
            Classification::Transaction { transactions } => {
                self.handle_transactions(user_id, text, transactions, today)
            }
            Classification::TransactionHistory {
                start_date,
                end_date,
                category_filter,
                ..
            } => {
                self.handle_history(
                    user_id,
                    start_date.as_deref(),
                    end_date.as_deref(),
                    category_filter.as_deref(),
                    today,
                )
                .await
            }
            Classification::FollowUp { .. } => self.handle_follow_up(user_id, text).await,
            Classification::FinancialInfo { search_query } => {
                self.handle_financial_info(text, search_query.as_deref()).await
            }
        }
    }

    /// Store each extracted item independently; one bad item never blocks
    /// the rest of the batch.
    fn handle_transactions(
        &self,
        user_id: i64,
        text: &str,
        items: Vec<TransactionItem>,
        today: NaiveDate,
    ) -> String {
        if items.is_empty() {
            return REPLY_NO_ITEMS.to_string();
        }

        let mut stored = 0usize;
        let mut failed = 0usize;
        for item in items {
            let tx = to_new_transaction(&item, text, today);
            match self.db.append_transaction(user_id, &tx) {
                Ok(_) => stored += 1,
                Err(e) => {
                    warn!(user_id, "Failed to store transaction item: {}", e);
                    failed += 1;
                }
            }
        }

        if stored == 0 {
            return "I couldn't save those transactions. Please try again.".to_string();
        }
        let mut reply = format!("Stored {} transaction(s) successfully!", stored);
        if failed > 0 {
            reply.push_str(&format!(" {} item(s) could not be saved.", failed));
        }
        reply
    }

    async fn handle_history(
        &self,
        user_id: i64,
        start: Option<&str>,
        end: Option<&str>,
        category: Option<&str>,
        today: NaiveDate,
    ) -> String {
        let Some((from, to)) = resolve_range(start, end, today) else {
            return REPLY_BAD_DATES.to_string();
        };
        let category = category.map(str::trim).filter(|c| !c.is_empty());

        let outcome = match self.reports.summarize(&self.db, user_id, from, to, category) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(user_id, "History query failed: {}", e);
                return REPLY_TROUBLE.to_string();
            }
        };

        match outcome {
            SummaryOutcome::Empty { from, to } => match category {
                Some(cat) => format!(
                    "No {} transactions recorded between {} and {}.",
                    cat, from, to
                ),
                None => format!("No transactions recorded between {} and {}.", from, to),
            },
            SummaryOutcome::Summary(summary) => self.reports.render_history(&summary).await,
        }
    }

    /// Answer a follow-up from the recent window alone. An empty window is
    /// answered directly, without a model call.
    async fn handle_follow_up(&self, user_id: i64, text: &str) -> String {
        let recent = self.context.recent(user_id, FOLLOW_UP_TURNS);
        if recent.is_empty() {
            return REPLY_NO_CONTEXT.to_string();
        }

        let history = full_history(&recent);
        let rendered = {
            let prompts = self.prompts.lock();
            let mut prompts = match prompts {
                Ok(guard) => guard,
                Err(_) => return REPLY_TROUBLE.to_string(),
            };
            match prompts.get(PromptId::FollowUp) {
                Ok(template) => {
                    let mut vars = HashMap::new();
                    vars.insert("history", history.as_str());
                    vars.insert("message", text);
                    Some((template.render_system(&vars), template.render_user(&vars)))
                }
                Err(e) => {
                    error!("Follow-up prompt unavailable: {}", e);
                    None
                }
            }
        };
        let Some((system, user)) = rendered else {
            return REPLY_TROUBLE.to_string();
        };

        match self.model.complete(system.as_deref(), &user).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => REPLY_LOST_THREAD.to_string(),
            Err(e) => {
                warn!(user_id, "Follow-up completion failed: {}", e);
                REPLY_LOST_THREAD.to_string()
            }
        }
    }

    async fn handle_financial_info(&self, text: &str, search_query: Option<&str>) -> String {
        let query = search_query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(text);

        match self.model.search_grounded(query).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => REPLY_SEARCH_DOWN.to_string(),
            Err(e) if e.is_rate_limit() => {
                warn!("Grounded search rate limited: {}", e);
                REPLY_BUSY.to_string()
            }
            Err(e) => {
                warn!("Grounded search failed: {}", e);
                REPLY_SEARCH_DOWN.to_string()
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Map one extracted item to an insertable record, degrading field by
/// field: an unrecognized kind or unparseable date becomes NULL, a missing
/// date defaults to today.
fn to_new_transaction(item: &TransactionItem, source_text: &str, today: NaiveDate) -> NewTransaction {
    let kind = match item.transaction_type.as_deref() {
        Some(raw) => {
            let parsed = TransactionKind::parse(raw);
            if parsed.is_none() {
                warn!(raw, "Unrecognized transaction kind, storing without one");
            }
            parsed
        }
        None => None,
    };

    let occurred_on = match item.transaction_date.as_deref() {
        Some(raw) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                warn!(raw, "Unparseable transaction date, storing undated");
                None
            }
        },
        None => Some(today),
    };

    NewTransaction {
        kind,
        amount: item.amount,
        category: item.category_name.clone().filter(|c| !c.trim().is_empty()),
        subcategory: item
            .subcategory_name
            .clone()
            .filter(|c| !c.trim().is_empty()),
        occurred_on,
        source_text: source_text.to_string(),
    }
}

/// Resolve a history query's period. Absent bounds default to a trailing
/// window ending today; a bound that is present but unparseable yields
/// None so the user gets asked for clearer dates.
fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    let parse = |raw: Option<&str>| -> std::result::Result<Option<NaiveDate>, ()> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| ()),
            None => Ok(None),
        }
    };

    let start = parse(start).ok()?;
    let end = parse(end).ok()?;

    let to = end.unwrap_or(today);
    let from = start.unwrap_or(to - Duration::days(DEFAULT_RANGE_DAYS - 1));
    if from > to {
        return Some((to, from));
    }
    Some((from, to))
}

/// Full-text turn formatting for the follow-up prompt. Unlike the
/// classification history, assistant turns are kept whole since the user
/// is usually referring into them.
fn full_history(entries: &[ContextEntry]) -> String {
    entries
        .iter()
        .map(|entry| match entry.role {
            Role::User => format!("User: {}", entry.text),
            Role::Assistant => format!("Assistant: {}", entry.text),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_resolve_range_defaults_to_trailing_month() {
        let today = date("2025-06-30");
        let (from, to) = resolve_range(None, None, today).unwrap();
        assert_eq!(to, today);
        assert_eq!(from, date("2025-06-01"));
        assert_eq!((to - from).num_days() + 1, DEFAULT_RANGE_DAYS);
    }

    #[test]
    fn test_resolve_range_explicit_bounds() {
        let today = date("2025-06-30");
        let (from, to) = resolve_range(Some("2025-06-01"), Some("2025-06-15"), today).unwrap();
        assert_eq!(from, date("2025-06-01"));
        assert_eq!(to, date("2025-06-15"));
    }

    #[test]
    fn test_resolve_range_start_only() {
        let today = date("2025-06-30");
        let (from, to) = resolve_range(Some("2025-06-10"), None, today).unwrap();
        assert_eq!(from, date("2025-06-10"));
        assert_eq!(to, today);
    }

    #[test]
    fn test_resolve_range_swaps_inverted_bounds() {
        let today = date("2025-06-30");
        let (from, to) = resolve_range(Some("2025-06-15"), Some("2025-06-01"), today).unwrap();
        assert_eq!(from, date("2025-06-01"));
        assert_eq!(to, date("2025-06-15"));
    }

    #[test]
    fn test_resolve_range_rejects_garbage_dates() {
        let today = date("2025-06-30");
        assert!(resolve_range(Some("last tuesday"), None, today).is_none());
        assert!(resolve_range(None, Some("06/15/2025"), today).is_none());
    }

    #[test]
    fn test_to_new_transaction_defaults_missing_date_to_today() {
        let today = date("2025-06-30");
        let item = TransactionItem {
            transaction_type: Some("Debit".into()),
            amount: Some(250.0),
            category_name: Some("Food".into()),
            ..Default::default()
        };

        let tx = to_new_transaction(&item, "spent 250 on food", today);
        assert_eq!(tx.kind, Some(TransactionKind::Debit));
        assert_eq!(tx.occurred_on, Some(today));
    }

    #[test]
    fn test_to_new_transaction_degrades_bad_fields() {
        let today = date("2025-06-30");
        let item = TransactionItem {
            transaction_type: Some("withdrawal".into()),
            amount: Some(90.0),
            category_name: Some("  ".into()),
            transaction_date: Some("June 5th".into()),
            ..Default::default()
        };

        let tx = to_new_transaction(&item, "withdrew 90", today);
        assert_eq!(tx.kind, None);
        assert_eq!(tx.category, None);
        assert_eq!(tx.occurred_on, None);
        assert_eq!(tx.source_text, "withdrew 90");
    }
}
