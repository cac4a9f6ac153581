use serde::Serialize;
use thiserror::Error;

use crate::model::CustomerId;

/// Upper bound on how much of an error body is carried into status messages.
pub const BODY_EXCERPT_CHARS: usize = 100;

/// Normalized failure of a single backend call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API {status}: {body_excerpt}")]
    Status { status: u16, body_excerpt: String },
    #[error("request to {path} failed: {detail}")]
    Transport { path: String, detail: String },
    #[error("invalid response from {path}: {detail}")]
    Decode { path: String, detail: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Operator-facing detail, bounded like the body excerpt.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Status { .. } => self.to_string(),
            _ => excerpt(&self.to_string()),
        }
    }

    pub(crate) fn transport(path: &str, err: reqwest::Error) -> Self {
        let detail = if err.is_timeout() {
            "timed out".to_string()
        } else if err.is_connect() {
            "connection refused or unreachable".to_string()
        } else {
            err.to_string()
        };
        ApiError::Transport {
            path: path.to_string(),
            detail,
        }
    }
}

/// Identifier problems found while ingesting a record or a selection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record has no customer identifier")]
    MissingIdentifier,
    #[error("customer identifier {0} is not a positive integer")]
    InvalidIdentifier(String),
}

/// State an operation needs before it may call the backend. The message is the
/// guidance shown on the status line.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "missing", content = "customer_id", rename_all = "snake_case")]
pub enum Precondition {
    #[error("Select a customer first.")]
    NoCustomer,
    #[error("Analysis in progress for customer {0}.")]
    AnalysisPending(CustomerId),
    #[error("Load data first.")]
    NothingLoaded,
}

/// Failures surfaced by the orchestration core. None of them are fatal.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Customer ID column not found. Available: {}", available.join(", "))]
    SchemaMismatch { available: Vec<String> },
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Truncate `body` to at most [`BODY_EXCERPT_CHARS`] characters on a char boundary.
pub fn excerpt(body: &str) -> String {
    excerpt_with(body, BODY_EXCERPT_CHARS)
}

pub(crate) fn excerpt_with(body: &str, limit: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(limit) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}
