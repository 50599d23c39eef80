use crate::{errors::Error, Result};

/// Install a `tracing` subscriber for the process.
///
/// Delivery failures are reported as `tracing` events (see
/// [`crate::diagnostics::TracingSink`]); without a subscriber they go nowhere.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,ltg=info,ltg_core=info,ltg_telegram=info,{service_name}=info"))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::External(format!("failed to install tracing subscriber: {e}")))
}
