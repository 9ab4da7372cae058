//! Error taxonomy for requests against the HMS backend.

use serde_json::Value;
use thiserror::Error;

/// HTTP status the backend uses to signal an expired or missing session.
pub const UNAUTHORIZED: u16 = 401;

/// Typed failure of a single request.
///
/// Cloneable so one outcome can be handed to every caller sharing a
/// single-flight fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpFailure {
    /// No response reached the client (connect error, timeout, aborted body).
    #[error("Network error: {reason}")]
    Network { reason: String },

    /// The backend answered with the unauthorized status.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// 4xx other than unauthorized. The message is the server's, kept for display.
    #[error("{message}")]
    Validation { status: u16, message: String },

    /// 5xx, or any other non-success status.
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },
}

impl HttpFailure {
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }

    /// Classify a non-success status together with its (possibly empty) body.
    pub fn from_status(status: u16, body: &Value) -> Self {
        let message = error_message(status, body);
        match status {
            UNAUTHORIZED => Self::Authentication { message },
            400..=499 => Self::Validation { status, message },
            _ => Self::Server { status, message },
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Status code carried by the failure, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { .. } => None,
            Self::Authentication { .. } => Some(UNAUTHORIZED),
            Self::Validation { status, .. } | Self::Server { status, .. } => Some(*status),
        }
    }

    /// Human readable message, suitable for showing to the user.
    pub fn message(&self) -> &str {
        match self {
            Self::Network { reason } => reason,
            Self::Authentication { message }
            | Self::Validation { message, .. }
            | Self::Server { message, .. } => message,
        }
    }
}

/// Result type alias for request-level operations.
pub type HmsResult<T> = Result<T, HttpFailure>;

fn error_message(status: u16, body: &Value) -> String {
    ["error", "message"]
        .iter()
        .find_map(|field| {
            body.get(field)
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
        })
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with {}", status))
}
