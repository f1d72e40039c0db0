//! Typed payloads for model responses

use serde::Deserialize;

/// Classified purpose of an inbound message.
///
/// Internally tagged on the `"intent"` field the classification prompt asks
/// the model to emit. The set is closed: an unknown intent string fails
/// deserialization, which the classifier reports as unclassifiable instead
/// of guessing.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Classification {
    Greeting {
        #[serde(default)]
        response: Option<String>,
    },
    Transaction {
        #[serde(default)]
        transactions: Vec<TransactionItem>,
    },
    TransactionHistory {
        #[serde(default)]
        query_type: Option<String>,
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
        #[serde(default)]
        category_filter: Option<String>,
    },
    FollowUp {
        #[serde(default)]
        reference_type: Option<String>,
        #[serde(default)]
        context_needed: Option<String>,
    },
    FinancialInfo {
        #[serde(default)]
        search_query: Option<String>,
    },
    OutOfContext {
        #[serde(default)]
        response: Option<String>,
    },
}

impl Classification {
    /// Intent name as emitted by the model, for logging
    pub fn intent_name(&self) -> &'static str {
        match self {
            Classification::Greeting { .. } => "greeting",
            Classification::Transaction { .. } => "transaction",
            Classification::TransactionHistory { .. } => "transaction_history",
            Classification::FollowUp { .. } => "follow_up",
            Classification::FinancialInfo { .. } => "financial_info",
            Classification::OutOfContext { .. } => "out_of_context",
        }
    }
}

/// One structured transaction item inside a transaction classification.
///
/// Everything is optional: the dispatcher validates and degrades field by
/// field (unrecognized kind -> stored kindless, bad date -> stored undated)
/// rather than dropping the item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionItem {
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub subcategory_name: Option<String>,
    #[serde(default)]
    pub transaction_date: Option<String>,
}
