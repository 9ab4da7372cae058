//! Error types for the HMS client.

use hms_core::HttpFailure;

use crate::config::ConfigError;
use crate::persistence::PersistenceError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Http(#[from] HttpFailure),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// The request failure behind this error, if any.
    pub fn http(&self) -> Option<&HttpFailure> {
        match self {
            Self::Http(failure) => Some(failure),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
