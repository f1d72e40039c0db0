//! Spending report generation
//!
//! Aggregation happens in SQL and Rust; the model only narrates figures
//! that are already computed. If narration fails the report falls back to
//! a deterministic plain-text rendering, so a history query never dies on
//! a model hiccup.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, NaiveDate};
use tracing::warn;

use crate::ai::ModelBackend;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{RangeSummary, SummaryOutcome, Transaction, TransactionKind, UNCATEGORIZED};
use crate::prompts::{PromptId, PromptLibrary};

/// Days covered by the weekly digest
const WEEK_DAYS: i64 = 7;

/// Builds spending summaries and narrates them via the model
pub struct ReportGenerator<M> {
    model: M,
    prompts: Mutex<PromptLibrary>,
}

impl<M: ModelBackend> ReportGenerator<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            prompts: Mutex::new(PromptLibrary::new()),
        }
    }

    /// Aggregate a user's transactions over a date range.
    ///
    /// A range with no dated records is a distinct outcome, not an error;
    /// callers word the reply differently for it.
    pub fn summarize(
        &self,
        db: &Database,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
        category: Option<&str>,
    ) -> Result<SummaryOutcome> {
        let summary = db.query_range_filtered(user_id, from, to, category)?;
        if summary.records.is_empty() {
            return Ok(SummaryOutcome::Empty { from, to });
        }
        Ok(SummaryOutcome::Summary(summary))
    }

    /// Narrate a range summary.
    ///
    /// Falls back to the deterministic rendering when the model call or its
    /// reply is unusable.
    pub async fn render_history(&self, summary: &RangeSummary) -> String {
        match self.narrate(PromptId::HistoryReport, summary).await {
            Ok(text) => text,
            Err(e) => {
                warn!("History narration failed, using plain rendering: {}", e);
                plain_summary(summary)
            }
        }
    }

    /// Build and narrate the weekly digest ending on `week_ending`.
    pub async fn weekly_report(
        &self,
        db: &Database,
        user_id: i64,
        week_ending: NaiveDate,
    ) -> Result<String> {
        let from = week_ending - Duration::days(WEEK_DAYS - 1);
        match self.summarize(db, user_id, from, week_ending, None)? {
            SummaryOutcome::Empty { from, to } => Ok(format!(
                "No transactions recorded between {} and {}. Log a few and I'll have something to report!",
                from, to
            )),
            SummaryOutcome::Summary(summary) => {
                match self.narrate(PromptId::WeeklyReport, &summary).await {
                    Ok(text) => Ok(text),
                    Err(e) => {
                        warn!("Weekly narration failed, using plain rendering: {}", e);
                        Ok(plain_summary(&summary))
                    }
                }
            }
        }
    }

    async fn narrate(&self, id: PromptId, summary: &RangeSummary) -> Result<String> {
        let from = summary.from.format("%Y-%m-%d").to_string();
        let to = summary.to.format("%Y-%m-%d").to_string();
        let period_days = summary.period_days.to_string();
        let total_debit = format!("{:.2}", summary.total_debit);
        let total_credit = format!("{:.2}", summary.total_credit);
        let breakdown = breakdown_lines(summary);
        let rows = transaction_rows(&summary.records);

        let (system, user) = {
            let mut prompts = self
                .prompts
                .lock()
                .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
            let template = prompts.get(id)?;
            let mut vars = HashMap::new();
            vars.insert("from", from.as_str());
            vars.insert("to", to.as_str());
            vars.insert("period_days", period_days.as_str());
            vars.insert("total_debit", total_debit.as_str());
            vars.insert("total_credit", total_credit.as_str());
            vars.insert("breakdown", breakdown.as_str());
            vars.insert("rows", rows.as_str());
            (template.render_system(&vars), template.render_user(&vars))
        };

        let text = self.model.complete(system.as_deref(), &user).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Model("Narration reply was empty".into()));
        }
        Ok(text.to_string())
    }
}

/// One line per category, largest spend first
fn breakdown_lines(summary: &RangeSummary) -> String {
    let mut buckets: Vec<(&String, &f64)> = summary.category_breakdown.iter().collect();
    buckets.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
    buckets
        .iter()
        .map(|(category, amount)| format!("{}: {:.2}", category, amount))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per transaction: date | category | subcategory | signed amount
fn transaction_rows(records: &[Transaction]) -> String {
    records
        .iter()
        .map(|t| {
            let date = t
                .occurred_on
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "undated".to_string());
            let category = t.category.as_deref().unwrap_or(UNCATEGORIZED);
            let subcategory = t.subcategory.as_deref().unwrap_or("-");
            let amount = t.amount.unwrap_or(0.0);
            let signed = match t.kind {
                Some(TransactionKind::Debit) => format!("-{:.2}", amount),
                Some(TransactionKind::Credit) => format!("+{:.2}", amount),
                None => format!("{:.2}", amount),
            };
            format!("{} | {} | {} | {}", date, category, subcategory, signed)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Deterministic report used when narration is unavailable
pub fn plain_summary(summary: &RangeSummary) -> String {
    let mut out = format!(
        "Summary for {} to {} ({} days):\nSpent: {:.2}\nReceived: {:.2}",
        summary.from, summary.to, summary.period_days, summary.total_debit, summary.total_credit
    );
    let breakdown = breakdown_lines(summary);
    if !breakdown.is_empty() {
        out.push_str("\nBy category:\n");
        out.push_str(&breakdown);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::models::NewTransaction;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seeded_db() -> (Database, i64) {
        let db = Database::in_memory().unwrap();
        let user = db.create_or_get_user("u").unwrap();
        for (kind, amount, category, day) in [
            (TransactionKind::Debit, 100.0, Some("Food"), "2025-06-01"),
            (TransactionKind::Debit, 200.0, Some("Transport"), "2025-06-03"),
            (TransactionKind::Credit, 1000.0, Some("Income"), "2025-06-02"),
        ] {
            db.append_transaction(
                user,
                &NewTransaction {
                    kind: Some(kind),
                    amount: Some(amount),
                    category: category.map(String::from),
                    occurred_on: Some(date(day)),
                    source_text: "seed".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        (db, user)
    }

    #[test]
    fn test_summarize_empty_range_is_distinct() {
        let (db, user) = seeded_db();
        let generator = ReportGenerator::new(MockBackend::new());

        let outcome = generator
            .summarize(&db, user, date("2024-01-01"), date("2024-01-31"), None)
            .unwrap();
        assert!(matches!(outcome, SummaryOutcome::Empty { .. }));
    }

    #[tokio::test]
    async fn test_render_history_uses_model_reply() {
        let (db, user) = seeded_db();
        let mock = MockBackend::new();
        mock.push_reply("You spent 300.00 this week, mostly on transport.");
        let generator = ReportGenerator::new(mock);

        let outcome = generator
            .summarize(&db, user, date("2025-06-01"), date("2025-06-07"), None)
            .unwrap();
        let summary = match outcome {
            SummaryOutcome::Summary(s) => s,
            other => panic!("unexpected outcome: {:?}", other),
        };
        let text = generator.render_history(&summary).await;
        assert!(text.contains("300.00"));
    }

    #[tokio::test]
    async fn test_render_history_falls_back_on_model_failure() {
        let (db, user) = seeded_db();
        let mock = MockBackend::new();
        mock.push_failure("model down");
        let generator = ReportGenerator::new(mock);

        let outcome = generator
            .summarize(&db, user, date("2025-06-01"), date("2025-06-07"), None)
            .unwrap();
        let summary = match outcome {
            SummaryOutcome::Summary(s) => s,
            other => panic!("unexpected outcome: {:?}", other),
        };
        let text = generator.render_history(&summary).await;
        // Deterministic fallback carries the computed totals
        assert!(text.contains("Spent: 300.00"));
        assert!(text.contains("Received: 1000.00"));
    }

    #[tokio::test]
    async fn test_weekly_report_empty_week() {
        let (db, user) = seeded_db();
        let generator = ReportGenerator::new(MockBackend::new());

        let text = generator
            .weekly_report(&db, user, date("2024-01-07"))
            .await
            .unwrap();
        assert!(text.contains("No transactions recorded"));
    }

    #[tokio::test]
    async fn test_weekly_report_covers_trailing_seven_days() {
        let (db, user) = seeded_db();
        let mock = MockBackend::new();
        mock.push_failure("narration off");
        let generator = ReportGenerator::new(mock);

        // Week ending 2025-06-07 starts 2025-06-01, catching all seeds
        let text = generator
            .weekly_report(&db, user, date("2025-06-07"))
            .await
            .unwrap();
        assert!(text.contains("2025-06-01 to 2025-06-07"));
        assert!(text.contains("Spent: 300.00"));
    }

    #[test]
    fn test_transaction_rows_signs_amounts() {
        let (db, user) = seeded_db();
        let summary = db
            .query_range(user, date("2025-06-01"), date("2025-06-07"))
            .unwrap();

        let rows = transaction_rows(&summary.records);
        assert!(rows.contains("-200.00"));
        assert!(rows.contains("+1000.00"));
    }

    #[test]
    fn test_breakdown_sorted_largest_first() {
        let (db, user) = seeded_db();
        let summary = db
            .query_range(user, date("2025-06-01"), date("2025-06-07"))
            .unwrap();

        let lines: Vec<String> = breakdown_lines(&summary).lines().map(String::from).collect();
        assert_eq!(lines[0], "Transport: 200.00");
        assert_eq!(lines[1], "Food: 100.00");
    }
}
