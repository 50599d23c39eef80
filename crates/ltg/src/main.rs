use std::{sync::Arc, time::Duration};

use anyhow::Context;
use ltg_core::{
    config::Config,
    level::{self, Level},
    location,
    record::LogRecord,
};
use ltg_telegram::TelegramLogHandler;

/// Send one test alert through the configured chat.
///
/// Reads `TELEGRAM_*` settings from the environment (or `.env`), installs the
/// handler as the `log` logger, then sends one alert and waits briefly so the
/// background delivery can finish before the process exits.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ltg_core::logging::init("ltg")?;

    let cfg = Config::load().context("loading configuration")?;
    if let Some(default) = cfg.default_level {
        level::set_default_level(default);
    }

    let handler = Arc::new(TelegramLogHandler::new(cfg.handler).context("building handler")?);
    handler.set_metadata("pid", std::process::id());
    ltg_telegram::install(Arc::clone(&handler))?;

    let message = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let message = if message.trim().is_empty() {
        "test alert from ltg".to_string()
    } else {
        message
    };

    // Under the default critical threshold `log` records never pass.
    if handler.accepts_log_records() {
        log::error!("{message}");
    } else {
        handler.log(&LogRecord::new(Level::Critical, message, location!()));
    }

    // Delivery is fire-and-forget; give it a moment before the runtime stops.
    tokio::time::sleep(Duration::from_secs(3)).await;
    Ok(())
}
