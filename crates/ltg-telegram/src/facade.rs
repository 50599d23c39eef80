//! Integration with the `log` facade.

use std::sync::Arc;

use ltg_core::{
    errors::Error,
    level::Level,
    metadata::{Metadata, MetadataValue},
    record::{LogRecord, SourceLocation},
    Result,
};

use crate::handler::TelegramLogHandler;

/// `log` targets refused by default: the crates that carry a delivery, and
/// this workspace's libraries. A record from any of them would be sent through
/// the same stack and log again.
pub const DELIVERY_TARGETS: &[&str] = &[
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "tokio_rustls",
    "want",
    "mio",
    "ltg_core",
    "ltg_telegram",
];

/// Convert a `log` record into the handler's record type.
///
/// The module path stands in for the function name. A target that differs
/// from the module path is kept as `target` metadata.
pub fn record_from_log(record: &log::Record<'_>) -> LogRecord {
    let function = record.module_path().unwrap_or_else(|| record.target());
    let location = SourceLocation::new(
        record.file().unwrap_or("<unknown>"),
        function,
        record.line().unwrap_or(0),
    );

    let mut out = LogRecord::new(Level::from(record.level()), record.args().to_string(), location);
    if record.module_path() != Some(record.target()) {
        let mut md = Metadata::new();
        md.insert(
            "target".to_string(),
            MetadataValue::from(record.target()),
        );
        out = out.with_metadata(md);
    }
    out
}

impl log::Log for TelegramLogHandler {
    fn enabled(&self, md: &log::Metadata<'_>) -> bool {
        self.is_enabled(md.level().into()) && !self.is_ignored_target(md.target())
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        TelegramLogHandler::log(self, &record_from_log(record));
    }

    fn flush(&self) {}
}

struct SharedHandler(Arc<TelegramLogHandler>);

impl log::Log for SharedHandler {
    fn enabled(&self, md: &log::Metadata<'_>) -> bool {
        log::Log::enabled(self.0.as_ref(), md)
    }

    fn log(&self, record: &log::Record<'_>) {
        log::Log::log(self.0.as_ref(), record)
    }

    fn flush(&self) {}
}

/// Register `handler` as the global `log` logger.
///
/// The facade's max level is opened up to `trace`; the handler's own
/// threshold decides what is sent, and it can change at runtime. Records from
/// [`DELIVERY_TARGETS`] and from targets added with
/// [`HandlerBuilder::ignore_target`](crate::HandlerBuilder::ignore_target) are
/// never sent.
///
/// `log` stops at error while the process default threshold is critical: a
/// handler without an explicit level of error or lower receives nothing from
/// the facade (see [`TelegramLogHandler::accepts_log_records`]).
pub fn install(handler: Arc<TelegramLogHandler>) -> Result<()> {
    if !handler.accepts_log_records() {
        tracing::warn!(
            target: "ltg",
            threshold = %handler.log_level(),
            "installed handler drops every `log` record; lower its level to error or below"
        );
    }
    log::set_boxed_logger(Box::new(SharedHandler(handler)))
        .map_err(|e| Error::External(format!("failed to install logger: {e}")))?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
