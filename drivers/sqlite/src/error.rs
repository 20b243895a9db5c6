//! Error types for SQLite parameter binding

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteBindError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot bind non-finite float {0}")]
    NonFiniteFloat(f64),
}
