//! Session error types.

use thiserror::Error;

/// Errors that can occur during MQTT session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("subscribe error: {0}")]
    Subscribe(String),

    #[error("broker refused subscription: {0}")]
    SubAck(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("unsubscribe error: {0}")]
    Unsubscribe(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("session closed")]
    Closed,
}

/// Convenience alias for session results.
pub type SessionResult<T> = Result<T, SessionError>;
