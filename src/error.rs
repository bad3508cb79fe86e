use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

/// Client-side rejections raised before any request is sent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} name must not be empty")]
    EmptyName(&'static str),

    #[error("an environment needs between 1 and {max} stocks (got {count})")]
    StockCount { count: usize, max: usize },

    #[error("stock tickers must not be empty")]
    EmptyTicker,

    #[error("stock {0} is selected more than once")]
    DuplicateTicker(String),

    #[error("end date {end} is before start date {start}")]
    DateRange { start: NaiveDate, end: NaiveDate },

    #[error("unknown strategy type: {0}")]
    UnknownStrategyType(String),

    #[error("{parameter} is required for {strategy_type}")]
    MissingParameter {
        strategy_type: &'static str,
        parameter: &'static str,
    },

    #[error("{parameter} for {strategy_type} {reason} (value: {value})")]
    InvalidParameter {
        strategy_type: &'static str,
        parameter: &'static str,
        reason: &'static str,
        value: String,
    },

    #[error("strategy {0} appears more than once")]
    DuplicateStrategy(String),

    #[error("username and password are required")]
    MissingCredentials,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API error: {status}: {message}")]
    Status {
        status: u16,
        body: String,
        message: String,
    },

    #[error("Invalid JSON response: {body}")]
    InvalidJson {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Server returned invalid data format: expected {expected} ({detail})")]
    UnexpectedShape {
        expected: &'static str,
        detail: String,
    },

    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("bearer token contains characters that are not allowed in a header")]
    InvalidToken,

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ApiError {
    pub fn from_status(status: u16, body: String) -> Self {
        let message = extract_detail(&body).unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response body".to_string()
            } else {
                trimmed.to_string()
            }
        });
        ApiError::Status {
            status,
            body,
            message,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(status) if (400..500).contains(&status))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. }) || self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

/// Pulls the FastAPI-style `detail` out of an error body. Validation errors
/// arrive as a list of `{loc, msg}` objects and are joined.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(message) => Some(message.clone()),
        Value::Array(entries) => {
            let messages: Vec<String> = entries
                .iter()
                .map(|entry| match entry.get("msg").and_then(Value::as_str) {
                    Some(msg) => match entry.get("loc").and_then(Value::as_array) {
                        Some(loc) if !loc.is_empty() => {
                            let path: Vec<String> = loc
                                .iter()
                                .map(|part| match part {
                                    Value::String(s) => s.clone(),
                                    other => other.to_string(),
                                })
                                .collect();
                            format!("{}: {}", path.join("."), msg)
                        }
                        _ => msg.to_string(),
                    },
                    None => entry.to_string(),
                })
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
