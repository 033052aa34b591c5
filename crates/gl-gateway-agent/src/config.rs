//! Gateway agent configuration, loaded from TOML.

use std::collections::HashMap;

use serde::Deserialize;

use gl_mqtt_session::SessionConfig;
use gl_provision::{IdentityPaths, ProvisioningIdentity};
use gl_scada_reporter::ReporterConfig;

/// Top-level configuration for the gateway agent.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Physical gateway identifier. Also used as the MQTT client id and,
    /// by default, as the provisioning serial number.
    pub gateway_id: String,
    /// Seconds between telemetry reports.
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
    /// Fleet provisioning and broker settings.
    pub provisioning: ProvisioningConfig,
    /// Telemetry reporting settings. None disables reporting.
    #[serde(default)]
    pub telemetry: Option<ReporterConfig>,
}

fn default_report_interval_secs() -> u64 {
    60
}

impl GatewayConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

/// Fleet provisioning settings: claim credentials, where granted
/// credentials land, and which template admits the device.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisioningConfig {
    /// IoT broker endpoint hostname.
    pub endpoint: String,
    #[serde(default = "default_broker_port")]
    pub broker_port: u16,
    /// Restricted claim credential pair used only for provisioning.
    pub claim_cert_path: String,
    pub claim_key_path: String,
    /// Destination of the granted long-lived credential pair.
    pub cert_path: String,
    pub key_path: String,
    pub ca_cert_path: String,
    #[serde(default = "default_template_name")]
    pub template_name: String,
    /// Parameters forwarded to the provisioning template. When empty, a
    /// `SerialNumber` parameter carrying the gateway id is sent instead.
    #[serde(default)]
    pub template_parameters: HashMap<String, String>,
    /// CSR-based issuance request. Unsupported; provisioning fails up
    /// front when set.
    #[serde(default)]
    pub csr_file_path: Option<String>,
    #[serde(default = "default_exchange_timeout_secs")]
    pub exchange_timeout_secs: u64,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u16,
}

fn default_broker_port() -> u16 {
    8883
}
fn default_template_name() -> String {
    "gridlink-gateway-provision".into()
}
fn default_exchange_timeout_secs() -> u64 {
    30
}
fn default_keepalive_secs() -> u16 {
    30
}

impl ProvisioningConfig {
    pub fn identity_paths(&self) -> IdentityPaths {
        IdentityPaths {
            claim_cert_path: self.claim_cert_path.clone(),
            claim_key_path: self.claim_key_path.clone(),
            grant_cert_path: self.cert_path.clone(),
            grant_key_path: self.key_path.clone(),
        }
    }

    /// Session settings for the claim connection used during provisioning.
    pub fn claim_session_config(&self, client_id: &str) -> SessionConfig {
        SessionConfig::mtls(
            &self.endpoint,
            client_id,
            &self.claim_cert_path,
            &self.claim_key_path,
            &self.ca_cert_path,
        )
        .port(self.broker_port)
        .keepalive(self.keepalive_secs)
    }

    /// Session settings for the long-lived device connection using the
    /// granted credentials.
    pub fn device_session_config(&self, client_id: &str) -> SessionConfig {
        SessionConfig::mtls(
            &self.endpoint,
            client_id,
            &self.cert_path,
            &self.key_path,
            &self.ca_cert_path,
        )
        .port(self.broker_port)
        .keepalive(self.keepalive_secs)
    }

    /// The identity one provisioning attempt runs under.
    pub fn identity(&self, gateway_id: &str) -> ProvisioningIdentity {
        let mut parameters = self.template_parameters.clone();
        if parameters.is_empty() {
            parameters.insert("SerialNumber".to_string(), gateway_id.to_string());
        }
        ProvisioningIdentity {
            paths: self.identity_paths(),
            client_id: gateway_id.to_string(),
            endpoint: self.endpoint.clone(),
            template_name: self.template_name.clone(),
            template_parameters: parameters,
            csr_file_path: self.csr_file_path.clone(),
        }
    }
}
