//! Gateway connectivity hub.
//!
//! Decides whether the device must provision, runs the provisioning
//! workflow over a short-lived claim session, and opens the long-lived
//! device session with the granted credentials.

use std::sync::Arc;
use std::time::Duration;

use gl_mqtt_session::MqttSession;
use gl_provision::{CredentialStore, FileCredentialStore, ProvisionReceipt, Provisioner};

use crate::config::ProvisioningConfig;

pub struct GatewayHub {
    gateway_id: String,
    config: ProvisioningConfig,
    store: FileCredentialStore,
}

impl GatewayHub {
    pub fn new(gateway_id: &str, config: ProvisioningConfig) -> Self {
        Self {
            gateway_id: gateway_id.to_string(),
            config,
            store: FileCredentialStore,
        }
    }

    /// Provision the gateway if it holds no granted credentials yet.
    ///
    /// Returns `Some(receipt)` when a provisioning run happened, `None`
    /// when the device was already provisioned.
    pub async fn ensure_provisioned(&self) -> anyhow::Result<Option<ProvisionReceipt>> {
        let paths = self.config.identity_paths();
        if !self.store.needs_provisioning(&paths).await? {
            tracing::debug!("granted credentials present, skipping provisioning");
            return Ok(None);
        }

        // Checked before dialing so a missing claim pair reads as a
        // configuration problem, not a TLS failure.
        self.store.verify_claim_pair(&paths).await?;

        tracing::info!(
            endpoint = %self.config.endpoint,
            template = %self.config.template_name,
            "starting fleet provisioning"
        );

        let session_config = self.config.claim_session_config(&self.gateway_id);
        let (session, driver) = MqttSession::connect(&session_config)?;
        let driver_handle = tokio::spawn(driver.run());

        let identity = self.config.identity(&self.gateway_id);
        let mut provisioner = Provisioner::new(&session, &self.store, identity)
            .with_exchange_timeout(Duration::from_secs(self.config.exchange_timeout_secs));
        let result = provisioner.run().await;

        // The claim session is single-purpose; close it whatever happened.
        if let Err(e) = session.disconnect().await {
            tracing::debug!(error = %e, "closing claim session");
        }
        let _ = driver_handle.await;

        Ok(Some(result?))
    }

    /// Open the long-lived device session with the granted credentials.
    /// The driver task runs until the connection drops.
    pub async fn connect(&self) -> anyhow::Result<Arc<MqttSession>> {
        let session_config = self.config.device_session_config(&self.gateway_id);
        let (session, driver) = MqttSession::connect(&session_config)?;
        tokio::spawn(driver.run());
        tracing::info!(endpoint = %self.config.endpoint, "device session opened");
        Ok(Arc::new(session))
    }
}
