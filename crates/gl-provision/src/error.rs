//! Provisioning error taxonomy.
//!
//! Every variant aborts the current attempt. The variants exist so callers
//! can tell apart configuration mistakes, transport loss, service
//! rejections, wire-contract mismatches, persistence failures, and
//! exchanges that never resolved.

use std::time::Duration;

use thiserror::Error;

use gl_mqtt_session::SessionError;
use gl_protocol::ServiceRejection;

/// Errors that can occur during a provisioning attempt.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The device configuration cannot start an attempt at all.
    #[error("configuration error: {0}")]
    Config(String),

    /// The MQTT layer failed; the attempt cannot continue.
    #[error("transport error: {0}")]
    Transport(#[from] SessionError),

    /// The service rejected an exchange. Surfaced verbatim.
    #[error("{exchange} rejected by service: {rejection}")]
    Rejected {
        exchange: &'static str,
        rejection: ServiceRejection,
    },

    /// A response arrived but violated the wire contract.
    #[error("protocol error in {exchange}: {message}")]
    Protocol {
        exchange: &'static str,
        message: String,
    },

    /// Granted credentials could not be written durably. The device must
    /// still be treated as unprovisioned even though the service believes
    /// registration succeeded.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// No terminal message arrived within the exchange deadline.
    #[error("{exchange} timed out after {after:?}")]
    Timeout {
        exchange: &'static str,
        after: Duration,
    },
}

impl ProvisionError {
    /// Coarse category tag, used for state reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProvisionError::Config(_) => ErrorKind::Config,
            ProvisionError::Transport(_) => ErrorKind::Transport,
            ProvisionError::Rejected { .. } => ErrorKind::Rejected,
            ProvisionError::Protocol { .. } => ErrorKind::Protocol,
            ProvisionError::Persistence(_) => ErrorKind::Persistence,
            ProvisionError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

/// Category of a provisioning failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Transport,
    Rejected,
    Protocol,
    Persistence,
    Timeout,
}

/// Convenience alias for provisioning results.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_variants() {
        assert_eq!(
            ProvisionError::Config("x".into()).kind(),
            ErrorKind::Config
        );
        assert_eq!(
            ProvisionError::Transport(SessionError::Closed).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            ProvisionError::Timeout {
                exchange: "create-keys-and-certificate",
                after: Duration::from_secs(30),
            }
            .kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn rejection_message_carries_service_fields() {
        let err = ProvisionError::Rejected {
            exchange: "register-thing",
            rejection: ServiceRejection {
                status_code: 400,
                error_code: Some("InvalidTemplate".into()),
                error_message: Some("not found".into()),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("register-thing"));
        assert!(msg.contains("400"));
        assert!(msg.contains("InvalidTemplate"));
    }
}
