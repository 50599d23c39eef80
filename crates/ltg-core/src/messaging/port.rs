use async_trait::async_trait;

use crate::{errors::DeliveryError, messaging::types::ApiResult};

/// Hexagonal port for delivering a rendered message.
///
/// Takes the already serialized `sendMessage` body, so encoding failures are
/// caught on the caller's thread before anything is dispatched.
#[async_trait]
pub trait DeliveryPort: Send + Sync {
    async fn send_message(&self, body: Vec<u8>) -> Result<ApiResult, DeliveryError>;
}

/// Where failed deliveries end up.
///
/// Called from background tasks, possibly many at once.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, error: &DeliveryError);
}
