//! ReplayTransport port - レコードを REST API へ再送する

use async_trait::async_trait;

use crate::domain::ReplayRequest;
use crate::error::TransportError;

/// Sends one replay request.
///
/// Implementations must treat non-2xx responses as `TransportError::Status`
/// so the retry policy sees them as failures.
#[async_trait]
pub trait ReplayTransport: Send + Sync {
    /// Returns the (2xx) status code on success.
    async fn send(&self, request: &ReplayRequest) -> Result<u16, TransportError>;
}
