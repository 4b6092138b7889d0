//! Harness error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{failures} contract check(s) failed")]
    ContractFailed { failures: usize },
    #[error("{errors} invalid line(s) in {path}")]
    InvalidLog { path: String, errors: usize },
}
