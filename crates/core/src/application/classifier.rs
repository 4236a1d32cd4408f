//! Error classification
//!
//! Maps a raw `OperationError` onto the fixed taxonomy with a retry verdict.
//! Rules are evaluated top to bottom and the first match wins; the order is
//! significant because a single failure can carry several signals (a timeout
//! code *and* a 5xx status, a 429 *and* an auth body, ...).
//!
//! | # | Signal                               | Type         | Retry |
//! |---|--------------------------------------|--------------|-------|
//! | 1 | connection refused / timeout code    | `NETWORK`    | yes   |
//! | 2 | HTTP 429 or rate-limit flag in body  | `RATE_LIMIT` | yes   |
//! | 3 | HTTP 401 / 403                       | `AUTH`       | no    |
//! | 4 | HTTP >= 500                          | `SERVER`     | yes   |
//! | 5 | HTTP 400..500                        | `CLIENT`     | no    |
//! | 6 | anything else                        | `UNKNOWN`    | yes   |

use crate::domain::{ErrorCategory, ErrorType, OperationError};
use serde::Serialize;

/// Transport codes treated as network failures
pub const NETWORK_ERROR_CODES: [&str; 5] = [
    "ECONNREFUSED",
    "ETIMEDOUT",
    "ECONNRESET",
    "ECONNABORTED",
    "ESOCKETTIMEDOUT",
];

/// Stateless classifier; construct once and share.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a failure. Total: every input maps to exactly one category.
    pub fn classify(&self, error: &OperationError) -> ErrorCategory {
        if error
            .code
            .as_deref()
            .is_some_and(|code| NETWORK_ERROR_CODES.contains(&code))
        {
            return ErrorCategory::new(
                ErrorType::Network,
                true,
                "Network connection failed or timed out",
            );
        }

        if error.status == Some(429) || error.is_rate_limited() {
            return ErrorCategory::new(ErrorType::RateLimit, true, "Rate limit exceeded");
        }

        match error.status {
            Some(401) | Some(403) => ErrorCategory::new(
                ErrorType::Auth,
                false,
                "Authentication or authorization failed",
            ),
            Some(status) if status >= 500 => ErrorCategory::new(
                ErrorType::Server,
                true,
                format!("Upstream server error (HTTP {})", status),
            ),
            Some(status) if (400..500).contains(&status) => ErrorCategory::new(
                ErrorType::Client,
                false,
                format!("Client request error (HTTP {})", status),
            ),
            _ => ErrorCategory::new(ErrorType::Unknown, true, "Unknown error"),
        }
    }

    /// Build a diagnostic record for logging/alerting. Never used for control flow.
    ///
    /// # Arguments
    /// * `error` - The failure to describe
    /// * `context` - Logical operation name (e.g. `"slack.post_message"`)
    /// * `now_millis` - Timestamp (injected for determinism)
    pub fn format_diagnostic(
        &self,
        error: &OperationError,
        context: &str,
        now_millis: i64,
    ) -> DiagnosticRecord {
        let category = self.classify(error);
        let timestamp = chrono::DateTime::from_timestamp_millis(now_millis)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| now_millis.to_string());

        DiagnosticRecord {
            timestamp,
            context: context.to_string(),
            error_type: category.error_type,
            category_message: category.message,
            original_message: error.message.clone(),
            stack_trace: error.stack.clone(),
            retry_eligible: category.retry_eligible,
            status_code: error.status,
            raw_error_payload: error.data.clone(),
        }
    }
}

/// Structured failure description handed to observability collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticRecord {
    pub timestamp: String,
    pub context: String,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub category_message: String,
    pub original_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    pub retry_eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_error_payload: Option<serde_json::Value>,
}
