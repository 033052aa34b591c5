//! Device identity inputs for one provisioning attempt.

use std::collections::HashMap;

/// Filesystem locations of the two credential pairs.
#[derive(Debug, Clone)]
pub struct IdentityPaths {
    /// Restricted claim certificate, only good for authenticating the
    /// provisioning exchange itself.
    pub claim_cert_path: String,
    pub claim_key_path: String,
    /// Where the granted long-lived certificate lands.
    pub grant_cert_path: String,
    /// Where the granted private key lands.
    pub grant_key_path: String,
}

/// Everything one provisioning attempt needs. Immutable for the lifetime
/// of the attempt.
#[derive(Debug, Clone)]
pub struct ProvisioningIdentity {
    pub paths: IdentityPaths,
    /// MQTT client id, unique per device.
    pub client_id: String,
    /// Broker endpoint hostname.
    pub endpoint: String,
    /// Server-side template admitting this device into the fleet.
    pub template_name: String,
    pub template_parameters: HashMap<String, String>,
    /// Present only when a CSR-based flow was requested. The orchestrator
    /// rejects such attempts up front; the field exists so the request is
    /// visible in the failure message.
    pub csr_file_path: Option<String>,
}
