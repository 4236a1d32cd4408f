// Failure shapes and classification taxonomy

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error code attached when a job attempt exceeds the queue's execution timeout
pub const TIMEOUT_CODE: &str = "ETIMEDOUT";

/// Error code attached when a job handler panics
pub const PANIC_CODE: &str = "PANIC";

/// Typed failure produced by job handlers and retried operations.
///
/// Mirrors the raw failure shape seen from upstream clients: any combination
/// of a transport `code`, an HTTP `status`, a response `data` body and a
/// human-readable `message`.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct OperationError {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
            data: None,
            stack: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attempt exceeded the configured execution timeout
    pub fn timeout(limit: Duration) -> Self {
        Self::new(format!("Job execution timed out after {}ms", limit.as_millis()))
            .with_code(TIMEOUT_CODE)
    }

    /// Handler panicked while executing
    pub fn panic(message: impl AsRef<str>) -> Self {
        Self::new(format!("Job handler panicked: {}", message.as_ref())).with_code(PANIC_CODE)
    }

    pub fn is_panic(&self) -> bool {
        self.code.as_deref() == Some(PANIC_CODE)
    }

    /// Explicit rate-limit flag carried in the response body.
    ///
    /// Accepts `{"error": "ratelimited"}` and `{"rate_limited": true}`.
    pub fn is_rate_limited(&self) -> bool {
        let Some(data) = &self.data else {
            return false;
        };
        data.get("error").and_then(|v| v.as_str()) == Some("ratelimited")
            || data.get("rate_limited").and_then(|v| v.as_bool()) == Some(true)
    }
}

/// Classification taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    Network,
    RateLimit,
    Auth,
    Server,
    Client,
    Unknown,
}

impl ErrorType {
    pub const ALL: [ErrorType; 6] = [
        ErrorType::Network,
        ErrorType::RateLimit,
        ErrorType::Auth,
        ErrorType::Server,
        ErrorType::Client,
        ErrorType::Unknown,
    ];
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorType::Network => write!(f, "NETWORK"),
            ErrorType::RateLimit => write!(f, "RATE_LIMIT"),
            ErrorType::Auth => write!(f, "AUTH"),
            ErrorType::Server => write!(f, "SERVER"),
            ErrorType::Client => write!(f, "CLIENT"),
            ErrorType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classification result with retry-eligibility verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCategory {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub retry_eligible: bool,
    pub message: String,
}

impl ErrorCategory {
    pub fn new(error_type: ErrorType, retry_eligible: bool, message: impl Into<String>) -> Self {
        Self {
            error_type,
            retry_eligible,
            message: message.into(),
        }
    }
}
