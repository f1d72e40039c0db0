//! Transaction record operations

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{round2, NewTransaction, RangeSummary, Transaction, TransactionKind, UNCATEGORIZED};

impl Database {
    /// Append one transaction record for a user.
    ///
    /// Each record is an independent write; there is no grouping across the
    /// items of a single message. A present amount must be non-negative.
    pub fn append_transaction(&self, user_id: i64, tx: &NewTransaction) -> Result<i64> {
        if let Some(amount) = tx.amount {
            if amount < 0.0 {
                return Err(Error::InvalidData(format!(
                    "negative transaction amount: {}",
                    amount
                )));
            }
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions (user_id, text, kind, amount, category, subcategory, occurred_on)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                tx.source_text,
                tx.kind.map(|k| k.as_str()),
                tx.amount,
                tx.category,
                tx.subcategory,
                tx.occurred_on.map(|d| d.to_string()),
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.touch_user(user_id)?;
        Ok(id)
    }

    /// Total number of stored transaction records
    pub fn count_transactions(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?)
    }

    /// Aggregate a user's transactions over an inclusive date range.
    ///
    /// Undated records never match a range query. Records come back ordered
    /// by occurrence date descending; totals and the per-category debit
    /// breakdown are computed here, not in the model, so the narrative layer
    /// only ever formats already-computed numbers.
    pub fn query_range(&self, user_id: i64, from: NaiveDate, to: NaiveDate) -> Result<RangeSummary> {
        self.query_range_filtered(user_id, from, to, None)
    }

    /// Like [`Database::query_range`], optionally restricted to one category
    /// (case-insensitive match).
    pub fn query_range_filtered(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
        category: Option<&str>,
    ) -> Result<RangeSummary> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, text, kind, amount, category, subcategory, occurred_on, processed_at
            FROM transactions
            WHERE user_id = ?1
              AND occurred_on IS NOT NULL
              AND occurred_on BETWEEN ?2 AND ?3
              AND (?4 IS NULL OR LOWER(category) = LOWER(?4))
            ORDER BY occurred_on DESC, id DESC
            "#,
        )?;

        let records: Vec<Transaction> = stmt
            .query_map(
                params![user_id, from.to_string(), to.to_string(), category],
                |row| {
                    Ok(Transaction {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        text: row.get(2)?,
                        kind: row
                            .get::<_, Option<String>>(3)?
                            .as_deref()
                            .and_then(TransactionKind::parse),
                        amount: row.get(4)?,
                        category: row.get(5)?,
                        subcategory: row.get(6)?,
                        occurred_on: row
                            .get::<_, Option<String>>(7)?
                            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                        processed_at: parse_datetime(&row.get::<_, String>(8)?),
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut total_debit = 0.0;
        let mut total_credit = 0.0;
        let mut category_breakdown: BTreeMap<String, f64> = BTreeMap::new();

        for record in &records {
            let amount = record.amount.unwrap_or(0.0);
            match record.kind {
                Some(TransactionKind::Debit) => {
                    total_debit += amount;
                    let bucket = record
                        .category
                        .clone()
                        .filter(|c| !c.trim().is_empty())
                        .unwrap_or_else(|| UNCATEGORIZED.to_string());
                    *category_breakdown.entry(bucket).or_insert(0.0) += amount;
                }
                Some(TransactionKind::Credit) => total_credit += amount,
                None => {}
            }
        }

        for value in category_breakdown.values_mut() {
            *value = round2(*value);
        }

        Ok(RangeSummary {
            from,
            to,
            records,
            total_debit: round2(total_debit),
            total_credit: round2(total_credit),
            category_breakdown,
            period_days: (to - from).num_days() + 1,
        })
    }
}
