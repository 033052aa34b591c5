use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Request payload for the create-keys-and-certificate exchange.
/// The service expects an empty JSON object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateKeysAndCertificateRequest {}

/// Response published on the create-keys accepted topic.
///
/// Every field is optional on the wire; use [`Self::into_issued`] to obtain
/// credentials that are guaranteed complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeysAndCertificateResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_ownership_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_pem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

/// A complete set of newly issued device credentials.
///
/// Only constructible from a response carrying the ownership token, the
/// certificate PEM, and the private key all at once.
#[derive(Debug, Clone)]
pub struct IssuedCredentials {
    pub certificate_id: Option<String>,
    pub ownership_token: String,
    pub certificate_pem: String,
    pub private_key: String,
}

/// Required fields absent from a keys-and-certificate response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("keys-and-certificate response missing required fields: {}", .0.join(", "))]
pub struct MissingCredentialFields(pub Vec<&'static str>);

impl CreateKeysAndCertificateResponse {
    /// Convert into [`IssuedCredentials`], naming every missing required
    /// field on failure.
    pub fn into_issued(self) -> Result<IssuedCredentials, MissingCredentialFields> {
        match (
            self.certificate_ownership_token,
            self.certificate_pem,
            self.private_key,
        ) {
            (Some(ownership_token), Some(certificate_pem), Some(private_key)) => {
                Ok(IssuedCredentials {
                    certificate_id: self.certificate_id,
                    ownership_token,
                    certificate_pem,
                    private_key,
                })
            }
            (token, pem, key) => {
                let mut missing = Vec::new();
                if token.is_none() {
                    missing.push("certificateOwnershipToken");
                }
                if pem.is_none() {
                    missing.push("certificatePem");
                }
                if key.is_none() {
                    missing.push("privateKey");
                }
                Err(MissingCredentialFields(missing))
            }
        }
    }
}

/// Request payload for the register-thing exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterThingRequest {
    pub template_name: String,
    pub parameters: HashMap<String, String>,
    pub certificate_ownership_token: String,
}

/// Response published on the register-thing accepted topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterThingResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thing_name: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub device_configuration: HashMap<String, String>,
}

/// Error payload published on a rejected topic.
///
/// `statusCode` is the discriminator: a payload without it does not parse
/// as a rejection at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRejection {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl fmt::Display for ServiceRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status {} ({}): {}",
            self.status_code,
            self.error_code.as_deref().unwrap_or("unknown"),
            self.error_message.as_deref().unwrap_or("no message"),
        )
    }
}
