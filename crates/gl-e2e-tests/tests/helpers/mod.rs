//! Shared test harness for E2E integration tests.
//!
//! Wires the provisioning workflow to a shared `MockSession` and an
//! in-memory credential store, exercising real code paths across crate
//! boundaries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gl_mqtt_session::MockSession;
use gl_protocol::topics;
use gl_provision::{
    IdentityPaths, MockCredentialStore, ProvisionReceipt, ProvisionResult, Provisioner,
    ProvisioningIdentity, ProvisioningState,
};

/// Template name shared by the scripted replies and the identity.
pub const TEMPLATE: &str = "gridlink-gateway-provision";

/// End-to-end provisioning harness: mock broker + in-memory store.
pub struct ProvisioningHarness {
    pub session: Arc<MockSession>,
    pub store: MockCredentialStore,
    pub identity: ProvisioningIdentity,
}

impl ProvisioningHarness {
    pub fn new() -> Self {
        let mut template_parameters = HashMap::new();
        template_parameters.insert("SerialNumber".to_string(), "gw-001".to_string());
        Self {
            session: Arc::new(MockSession::new()),
            store: MockCredentialStore::new(),
            identity: ProvisioningIdentity {
                paths: IdentityPaths {
                    claim_cert_path: "/certs/claim.pem".into(),
                    claim_key_path: "/certs/claim.key".into(),
                    grant_cert_path: "/certs/device.pem".into(),
                    grant_key_path: "/certs/device.key".into(),
                },
                client_id: "gw-001".into(),
                endpoint: "iot.example.com".into(),
                template_name: TEMPLATE.into(),
                template_parameters,
                csr_file_path: None,
            },
        }
    }

    /// Script a complete, successful create-keys reply.
    pub fn script_keys_accepted(&self) {
        self.script_keys_reply(
            &topics::create_keys_accepted(),
            serde_json::json!({
                "certificateId": "cert-123",
                "certificateOwnershipToken": "tok-1",
                "certificatePem": "PEM1",
                "privateKey": "KEY1",
            }),
        );
    }

    /// Script an arbitrary reply to the create-keys request.
    pub fn script_keys_reply(&self, reply_topic: &str, payload: serde_json::Value) {
        self.session.script_reply(
            &topics::create_keys_request(),
            reply_topic,
            payload.to_string().into_bytes(),
        );
    }

    /// Script a successful register-thing reply.
    pub fn script_register_accepted(&self) {
        self.session.script_reply(
            &topics::register_thing_request(TEMPLATE),
            &topics::register_thing_accepted(TEMPLATE),
            serde_json::json!({
                "thingName": "gw-001-thing",
                "deviceConfiguration": {"Site": "plant-7"},
            })
            .to_string()
            .into_bytes(),
        );
    }

    /// Script a service rejection of the register-thing request.
    pub fn script_register_rejected(&self, status: u16, code: &str, message: &str) {
        self.session.script_reply(
            &topics::register_thing_request(TEMPLATE),
            &topics::register_thing_rejected(TEMPLATE),
            serde_json::json!({
                "statusCode": status,
                "errorCode": code,
                "errorMessage": message,
            })
            .to_string()
            .into_bytes(),
        );
    }

    /// Run one provisioning attempt, returning the outcome and final state.
    pub async fn run(&self) -> (ProvisionResult<ProvisionReceipt>, ProvisioningState) {
        self.run_with_timeout(Duration::from_secs(1)).await
    }

    pub async fn run_with_timeout(
        &self,
        timeout: Duration,
    ) -> (ProvisionResult<ProvisionReceipt>, ProvisioningState) {
        let mut provisioner =
            Provisioner::new(self.session.as_ref(), &self.store, self.identity.clone())
                .with_exchange_timeout(timeout);
        let result = provisioner.run().await;
        (result, provisioner.state())
    }
}
