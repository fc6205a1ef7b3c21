use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookdeskError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the backend. `message` is the backend's own
    /// `message`/`error` field when it sent one.
    #[error("{}", .message.clone().unwrap_or_else(|| format!("Request failed (HTTP {status})")))]
    Api { status: u16, message: Option<String> },

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("QuickBooks authorization expired. Reconnect this client to QuickBooks and try again.")]
    ReconnectRequired,

    #[error("{0}")]
    Validation(String),

    #[error("Unknown client: {0}")]
    UnknownClient(String),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    #[error("Category '{0}' is not in the chart of accounts for this client")]
    UnknownCategory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl BookdeskError {
    /// Backend message if present, otherwise `fallback`. Used where a generic
    /// per-action string reads better than the HTTP status.
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            BookdeskError::Api { message: Some(m), .. } => m.clone(),
            BookdeskError::Api { message: None, .. } | BookdeskError::Http(_) => fallback.to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BookdeskError>;
