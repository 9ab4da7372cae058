//! The seam between the data layer and the wire.

use serde_json::Value;

use crate::error::HmsResult;
use crate::request::ApiRequest;

/// Sends one request and classifies the response.
///
/// Implementations parse the body as JSON (an unreadable body becomes `{}`),
/// map non-2xx statuses through [`crate::HttpFailure::from_status`] and
/// report transport-level failures as [`crate::HttpFailure::Network`].
/// They never retry or refresh; that is the session guard's job.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> HmsResult<Value>;
}
