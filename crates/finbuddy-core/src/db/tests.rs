//! Database layer tests

use chrono::NaiveDate;

use super::Database;
use crate::models::{NewTransaction, TransactionKind, UNCATEGORIZED};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn tx(
    kind: Option<TransactionKind>,
    amount: f64,
    category: Option<&str>,
    occurred_on: Option<&str>,
) -> NewTransaction {
    NewTransaction {
        kind,
        amount: Some(amount),
        category: category.map(String::from),
        subcategory: None,
        occurred_on: occurred_on.map(date),
        source_text: "test message".into(),
    }
}

#[test]
fn test_create_or_get_user_idempotent() {
    let db = Database::in_memory().unwrap();

    let first = db.create_or_get_user("+919876543210").unwrap();
    let second = db.create_or_get_user("+919876543210").unwrap();
    assert_eq!(first, second);

    let other = db.create_or_get_user("+14155550100").unwrap();
    assert_ne!(first, other);

    assert_eq!(db.count_users().unwrap(), 2);
}

#[test]
fn test_create_user_rejects_empty_handle() {
    let db = Database::in_memory().unwrap();
    assert!(db.create_or_get_user("   ").is_err());
}

#[test]
fn test_append_rejects_negative_amount() {
    let db = Database::in_memory().unwrap();
    let user = db.create_or_get_user("u").unwrap();

    let result = db.append_transaction(
        user,
        &tx(Some(TransactionKind::Debit), -50.0, None, Some("2025-06-01")),
    );
    assert!(result.is_err());
    assert_eq!(db.count_transactions().unwrap(), 0);
}

#[test]
fn test_append_allows_missing_kind_and_date() {
    let db = Database::in_memory().unwrap();
    let user = db.create_or_get_user("u").unwrap();

    // Unrecognized kind and unparseable date are stored as NULLs upstream
    let id = db
        .append_transaction(
            user,
            &NewTransaction {
                amount: Some(120.0),
                source_text: "spent 120 on something".into(),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(id > 0);
    assert_eq!(db.count_transactions().unwrap(), 1);
}

#[test]
fn test_query_range_aggregation() {
    let db = Database::in_memory().unwrap();
    let user = db.create_or_get_user("u").unwrap();

    db.append_transaction(
        user,
        &tx(Some(TransactionKind::Debit), 100.0, Some("Food"), Some("2025-06-01")),
    )
    .unwrap();
    db.append_transaction(
        user,
        &tx(Some(TransactionKind::Debit), 200.0, Some("Transport"), Some("2025-06-03")),
    )
    .unwrap();
    db.append_transaction(
        user,
        &tx(Some(TransactionKind::Debit), 50.0, None, Some("2025-06-05")),
    )
    .unwrap();
    db.append_transaction(
        user,
        &tx(Some(TransactionKind::Credit), 1000.0, Some("Income"), Some("2025-06-02")),
    )
    .unwrap();

    let summary = db
        .query_range(user, date("2025-06-01"), date("2025-06-07"))
        .unwrap();

    assert_eq!(summary.records.len(), 4);
    assert_eq!(summary.total_debit, 350.00);
    assert_eq!(summary.total_credit, 1000.00);
    assert_eq!(summary.period_days, 7);
    assert_eq!(summary.category_breakdown.get("Food"), Some(&100.0));
    assert_eq!(summary.category_breakdown.get(UNCATEGORIZED), Some(&50.0));

    // Ordered by occurrence date descending
    assert_eq!(summary.records[0].occurred_on, Some(date("2025-06-05")));
    assert_eq!(summary.records[3].occurred_on, Some(date("2025-06-01")));
}

#[test]
fn test_query_range_excludes_undated_and_out_of_range() {
    let db = Database::in_memory().unwrap();
    let user = db.create_or_get_user("u").unwrap();

    db.append_transaction(user, &tx(Some(TransactionKind::Debit), 10.0, None, None))
        .unwrap();
    db.append_transaction(
        user,
        &tx(Some(TransactionKind::Debit), 20.0, None, Some("2025-05-01")),
    )
    .unwrap();

    let summary = db
        .query_range(user, date("2025-06-01"), date("2025-06-07"))
        .unwrap();
    assert!(summary.records.is_empty());
    assert_eq!(summary.total_debit, 0.0);
}

#[test]
fn test_query_range_isolated_per_user() {
    let db = Database::in_memory().unwrap();
    let alice = db.create_or_get_user("alice").unwrap();
    let bob = db.create_or_get_user("bob").unwrap();

    db.append_transaction(
        alice,
        &tx(Some(TransactionKind::Debit), 75.0, Some("Food"), Some("2025-06-01")),
    )
    .unwrap();

    let summary = db
        .query_range(bob, date("2025-06-01"), date("2025-06-07"))
        .unwrap();
    assert!(summary.records.is_empty());
}

#[test]
fn test_query_range_category_filter() {
    let db = Database::in_memory().unwrap();
    let user = db.create_or_get_user("u").unwrap();

    db.append_transaction(
        user,
        &tx(Some(TransactionKind::Debit), 100.0, Some("Food"), Some("2025-06-01")),
    )
    .unwrap();
    db.append_transaction(
        user,
        &tx(Some(TransactionKind::Debit), 200.0, Some("Transport"), Some("2025-06-02")),
    )
    .unwrap();

    let summary = db
        .query_range_filtered(user, date("2025-06-01"), date("2025-06-07"), Some("food"))
        .unwrap();
    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.total_debit, 100.0);
    assert_eq!(summary.category_breakdown.len(), 1);
}

#[test]
fn test_date_round_trip() {
    let db = Database::in_memory().unwrap();
    let user = db.create_or_get_user("u").unwrap();

    db.append_transaction(
        user,
        &tx(Some(TransactionKind::Debit), 42.0, None, Some("2025-06-15")),
    )
    .unwrap();

    let summary = db
        .query_range(user, date("2025-06-15"), date("2025-06-15"))
        .unwrap();
    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.records[0].occurred_on, Some(date("2025-06-15")));
    assert_eq!(summary.period_days, 1);
}
