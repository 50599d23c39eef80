//! Bot API wire types and the ports the handler talks through.

pub mod port;
pub mod types;
