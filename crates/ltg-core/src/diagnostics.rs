//! Local sinks for delivery failures.

use crate::{errors::DeliveryError, messaging::port::DiagnosticSink};

/// Emits one `tracing` error event per failure.
///
/// Do not route these events back into a Telegram handler: a failing channel
/// would then feed itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, error: &DeliveryError) {
        match error {
            DeliveryError::Api { code, message } => {
                tracing::error!(
                    target: "ltg",
                    kind = error.kind(),
                    code = *code,
                    description = %message,
                    "failed to send Telegram message"
                );
            }
            other => {
                tracing::error!(
                    target: "ltg",
                    kind = other.kind(),
                    error = %other,
                    "failed to send Telegram message"
                );
            }
        }
    }
}

/// Writes failures to stderr, for processes without a tracing subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&self, error: &DeliveryError) {
        eprintln!("[TELEGRAM] {error}");
    }
}
