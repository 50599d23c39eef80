//! Telegram adapter.
//!
//! [`TelegramClient`] implements the `ltg-core` delivery port over the Bot API
//! `sendMessage` endpoint; [`TelegramLogHandler`] drives the record pipeline
//! and plugs into the `log` facade.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

pub mod facade;
pub mod handler;

pub use facade::install;
pub use handler::{HandlerBuilder, TelegramLogHandler};

use ltg_core::{
    config::HandlerConfig,
    errors::Error,
    messaging::{port::DeliveryPort, types::ApiResult},
    DeliveryError, Result,
};

/// Bot API client bound to one token.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    // Contains the token.
    url: String,
}

impl TelegramClient {
    pub fn new(cfg: &HandlerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| Error::External(format!("reqwest client build: {e}")))?;
        Ok(Self {
            http,
            url: cfg.send_message_url(),
        })
    }

    // reqwest errors embed the request URL, and with it the token.
    fn map_err(e: reqwest::Error) -> DeliveryError {
        let e = e.without_url();
        let mut msg = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            msg.push_str(": ");
            msg.push_str(&cause.to_string());
            source = std::error::Error::source(cause);
        }
        DeliveryError::Transport(msg)
    }
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl DeliveryPort for TelegramClient {
    async fn send_message(&self, body: Vec<u8>) -> std::result::Result<ApiResult, DeliveryError> {
        let resp = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(Self::map_err)?;

        // Rejections come back as 4xx with a JSON body, so the status is not
        // inspected; the body decides.
        let bytes = resp.bytes().await.map_err(Self::map_err)?;
        ApiResult::decode(&bytes)
    }
}
