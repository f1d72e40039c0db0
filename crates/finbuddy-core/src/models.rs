//! Core data types: users, transaction records, and period summaries

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Whether a transaction decreases (Debit) or increases (Credit) the balance.
///
/// Closed two-variant enum. Model output that doesn't match either value is
/// stored with no kind rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Debit,
    Credit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Debit => "Debit",
            TransactionKind::Credit => "Credit",
        }
    }

    /// Parse a kind from model output. Case-insensitive; anything that isn't
    /// recognizably Debit or Credit yields None.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "debit" => Some(TransactionKind::Debit),
            "credit" => Some(TransactionKind::Credit),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered user, keyed by their WhatsApp handle
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: i64,
    pub handle: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted transaction record
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    /// Originating message text
    pub text: String,
    pub kind: Option<TransactionKind>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// Calendar date the transaction occurred on; None means undated
    pub occurred_on: Option<NaiveDate>,
    pub processed_at: DateTime<Utc>,
}

/// A transaction record to insert
#[derive(Debug, Clone, Default)]
pub struct NewTransaction {
    pub kind: Option<TransactionKind>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub occurred_on: Option<NaiveDate>,
    /// The message the transaction was extracted from
    pub source_text: String,
}

/// Category bucket name for debit records with no category
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Aggregated view of a user's transactions over an inclusive date range
#[derive(Debug, Clone, Serialize)]
pub struct RangeSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Matching records, occurrence date descending
    pub records: Vec<Transaction>,
    /// Sum of Debit amounts, rounded to 2 decimals
    pub total_debit: f64,
    /// Sum of Credit amounts, rounded to 2 decimals
    pub total_credit: f64,
    /// Debit totals per category; uncategorized records fall under
    /// [`UNCATEGORIZED`]
    pub category_breakdown: BTreeMap<String, f64>,
    /// Inclusive day count of the period
    pub period_days: i64,
}

/// Outcome of a period summary query.
///
/// Empty is a designated no-data marker, distinct from an error, so callers
/// can emit a friendly "no activity" message instead of a zero-filled report.
#[derive(Debug, Clone)]
pub enum SummaryOutcome {
    Empty { from: NaiveDate, to: NaiveDate },
    Summary(RangeSummary),
}

/// Round a monetary amount to 2 decimal places
pub fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!(TransactionKind::parse("Debit"), Some(TransactionKind::Debit));
        assert_eq!(TransactionKind::parse("credit"), Some(TransactionKind::Credit));
        assert_eq!(TransactionKind::parse(" DEBIT "), Some(TransactionKind::Debit));
        assert_eq!(TransactionKind::parse("withdrawal"), None);
        assert_eq!(TransactionKind::parse(""), None);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(349.996), 350.0);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(1000.0), 1000.0);
    }
}
