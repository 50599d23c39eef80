//! Core domain logic for forwarding log records to Telegram.
//!
//! This crate is intentionally transport-agnostic. The Bot API client and the
//! handler that drives the pipeline live in `ltg-telegram`, behind the ports
//! declared in [`messaging::port`].

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod formatting;
pub mod identity;
pub mod level;
pub mod logging;
pub mod messaging;
pub mod metadata;
pub mod record;

pub use errors::{DeliveryError, Error, Result};
