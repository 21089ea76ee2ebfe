//! Realtime delivery errors.

use thiserror::Error;

/// Realtime channel errors.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// Pub/sub backend failure.
    #[error("redis error: {0}")]
    Redis(String),

    /// The notification gateway is unreachable; offers for the current
    /// request are dropped and a reconnect happens on the next publication.
    #[error("notification gateway not connected")]
    NotConnected,

    /// Websocket transport failure.
    #[error("socket error: {0}")]
    Socket(String),

    /// Payload encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for RealtimeError {
    fn from(e: redis::RedisError) -> Self {
        RealtimeError::Redis(e.to_string())
    }
}

impl From<serde_json::Error> for RealtimeError {
    fn from(e: serde_json::Error) -> Self {
        RealtimeError::Serialization(e.to_string())
    }
}

/// Result type for realtime operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;
