//! TLS configuration for mTLS connections to AWS IoT Core.
//!
//! Loads X.509 device certificate, private key, and CA certificate
//! from PEM files and configures rumqttc's TLS transport.

use rumqttc::Transport;

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};

/// Build a TLS transport from certificate file paths in the config.
///
/// Uses `TlsConfiguration::Simple` which reads PEM-encoded files:
/// - CA certificate (e.g., AmazonRootCA1.pem)
/// - Device certificate (claim or granted, depending on the session)
/// - Device private key
pub fn load_tls_transport(config: &SessionConfig) -> SessionResult<Transport> {
    let ca = std::fs::read(&config.ca_cert_path).map_err(|e| {
        SessionError::Tls(format!(
            "failed to read CA cert '{}': {e}",
            config.ca_cert_path
        ))
    })?;

    let client_cert = std::fs::read(&config.client_cert_path).map_err(|e| {
        SessionError::Tls(format!(
            "failed to read client cert '{}': {e}",
            config.client_cert_path
        ))
    })?;

    let client_key = std::fs::read(&config.client_key_path).map_err(|e| {
        SessionError::Tls(format!(
            "failed to read client key '{}': {e}",
            config.client_key_path
        ))
    })?;

    Ok(Transport::tls_with_config(
        rumqttc::TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth: Some((client_cert, client_key)),
        },
    ))
}
