//! Error types for FinBuddy

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model rate limited: {0}")]
    RateLimited(String),

    #[error("Model call failed: {0}")]
    Model(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether this error is the transient rate-limit signal that the
    /// classifier retries on. Everything else fails fast.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
