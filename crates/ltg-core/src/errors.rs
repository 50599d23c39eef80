/// Construction-time error type.
///
/// Everything that can fail before a handler exists (loading config, building
/// the HTTP client or a runtime) maps into this type. Failures on the logging
/// path never surface here; see [`DeliveryError`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single delivery attempt did not succeed.
///
/// All variants are handled the same way: reported once to the diagnostic
/// sink and dropped. None of them reach the code that emitted the record.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The payload could not be serialized; nothing was sent.
    #[error("failed to encode message: {0}")]
    Encoding(#[source] serde_json::Error),

    /// Connection, DNS, TLS or timeout failure.
    #[error("failed to send message with connection error: {0}")]
    Transport(String),

    /// The response body is not a Bot API acknowledgment.
    #[error("failed to parse response: {0}")]
    Protocol(String),

    /// The Bot API rejected the request.
    #[error("failed to send message with error {code}: {message}")]
    Api { code: i64, message: String },
}

impl DeliveryError {
    /// Short stable name, used as a structured field in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Encoding(_) => "encoding",
            DeliveryError::Transport(_) => "transport",
            DeliveryError::Protocol(_) => "protocol",
            DeliveryError::Api { .. } => "api",
        }
    }
}
