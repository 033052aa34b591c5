//! Broker connection settings.

/// Connection settings for one [`MqttSession`](crate::MqttSession).
///
/// Built in code by the caller that owns credential selection: the same
/// broker is dialed with the claim pair during provisioning and with the
/// granted pair afterwards, so the agent derives one of these per pair
/// from its own config file.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// MQTT broker hostname (e.g., AWS IoT endpoint).
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client ID (should be unique per device).
    pub client_id: String,
    /// Enable TLS (mTLS). When false, connects plaintext (local dev).
    pub use_tls: bool,
    /// Path to device X.509 certificate (PEM).
    pub client_cert_path: String,
    /// Path to device private key (PEM).
    pub client_key_path: String,
    /// Path to CA certificate (e.g., AmazonRootCA1.pem).
    pub ca_cert_path: String,
    /// Keep-alive interval in seconds.
    pub keepalive_secs: u16,
}

impl SessionConfig {
    /// mTLS settings for an AWS IoT endpoint: port 8883, 30 s keep-alive.
    pub fn mtls(
        broker_host: impl Into<String>,
        client_id: impl Into<String>,
        client_cert_path: impl Into<String>,
        client_key_path: impl Into<String>,
        ca_cert_path: impl Into<String>,
    ) -> Self {
        Self {
            broker_host: broker_host.into(),
            broker_port: 8883,
            client_id: client_id.into(),
            use_tls: true,
            client_cert_path: client_cert_path.into(),
            client_key_path: client_key_path.into(),
            ca_cert_path: ca_cert_path.into(),
            keepalive_secs: 30,
        }
    }

    /// Plaintext settings for a local development broker.
    pub fn plain(
        broker_host: impl Into<String>,
        broker_port: u16,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            broker_host: broker_host.into(),
            broker_port,
            client_id: client_id.into(),
            use_tls: false,
            client_cert_path: String::new(),
            client_key_path: String::new(),
            ca_cert_path: String::new(),
            keepalive_secs: 30,
        }
    }

    /// Override the broker port.
    pub fn port(mut self, port: u16) -> Self {
        self.broker_port = port;
        self
    }

    /// Override the keep-alive interval.
    pub fn keepalive(mut self, secs: u16) -> Self {
        self.keepalive_secs = secs;
        self
    }
}
