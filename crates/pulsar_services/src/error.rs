//! Error types for service implementations.

use thiserror::Error;

/// Reasons a client-settings delivery can fail.
///
/// Delivery failures are expected operational events (clients lag out,
/// connections drop mid-handshake); consumers are expected to retry rather
/// than surface these to players.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("client connection closed before settings were acknowledged")]
    Disconnected,

    #[error("timed out waiting for settings acknowledgment")]
    Timeout,

    #[error("settings channel error: {0}")]
    Channel(String),
}

/// Errors raised by the bundled service implementations.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
