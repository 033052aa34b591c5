//! Provisioning orchestrator.
//!
//! Drives the two fleet-provisioning exchanges in order over an
//! already-connected claim session:
//!
//! 1. create-keys-and-certificate, yielding fresh credentials and an
//!    ownership token
//! 2. register-thing, activating the certificate against a template
//!
//! then persists the granted credentials. Any failure aborts the attempt;
//! a later attempt starts over from the beginning. The state only reaches
//! [`ProvisioningState::Complete`] once the credentials are durable on
//! disk, so a crash between registration and persistence re-provisions on
//! the next boot instead of losing the certificate.

use std::collections::HashMap;
use std::time::Duration;

use gl_mqtt_session::Session;
use gl_protocol::{CreateKeysAndCertificateResponse, RegisterThingResponse};

use crate::credentials::CredentialStore;
use crate::error::{ErrorKind, ProvisionError, ProvisionResult};
use crate::exchange::{
    self, CREATE_KEYS_EXCHANGE, ExchangeRequest, REGISTER_THING_EXCHANGE,
};
use crate::identity::ProvisioningIdentity;

/// Deadline applied to each exchange unless overridden.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the orchestrator is in the provisioning workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    Idle,
    AwaitingKeys,
    AwaitingRegistration,
    Complete,
    Failed(ErrorKind),
}

/// What a successful provisioning run produced, beyond the persisted
/// credentials themselves.
#[derive(Debug, Clone)]
pub struct ProvisionReceipt {
    pub certificate_id: Option<String>,
    pub thing_name: Option<String>,
    pub device_configuration: HashMap<String, String>,
}

/// One-shot provisioning workflow over a claim-credential session.
pub struct Provisioner<'a, S, C> {
    session: &'a S,
    store: &'a C,
    identity: ProvisioningIdentity,
    exchange_timeout: Duration,
    state: ProvisioningState,
}

impl<'a, S, C> Provisioner<'a, S, C>
where
    S: Session,
    C: CredentialStore,
{
    pub fn new(session: &'a S, store: &'a C, identity: ProvisioningIdentity) -> Self {
        Self {
            session,
            store,
            identity,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            state: ProvisioningState::Idle,
        }
    }

    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    /// Run the workflow to completion or first failure.
    pub async fn run(&mut self) -> ProvisionResult<ProvisionReceipt> {
        match self.execute().await {
            Ok(receipt) => {
                self.state = ProvisioningState::Complete;
                Ok(receipt)
            }
            Err(e) => {
                self.state = ProvisioningState::Failed(e.kind());
                tracing::error!(error = %e, "provisioning attempt failed");
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> ProvisionResult<ProvisionReceipt> {
        self.guard_configuration().await?;

        self.state = ProvisioningState::AwaitingKeys;
        let request = ExchangeRequest::create_keys()?;
        let response: CreateKeysAndCertificateResponse =
            exchange::execute(self.session, &request, self.exchange_timeout)
                .await?
                .accepted_or(CREATE_KEYS_EXCHANGE)?;
        let issued = response.into_issued().map_err(|e| ProvisionError::Protocol {
            exchange: CREATE_KEYS_EXCHANGE,
            message: e.to_string(),
        })?;
        tracing::info!(
            certificate_id = issued.certificate_id.as_deref().unwrap_or("unknown"),
            "certificate issued"
        );

        self.state = ProvisioningState::AwaitingRegistration;
        let request = ExchangeRequest::register_thing(
            &self.identity.template_name,
            self.identity.template_parameters.clone(),
            &issued.ownership_token,
        )?;
        let registered: RegisterThingResponse =
            exchange::execute(self.session, &request, self.exchange_timeout)
                .await?
                .accepted_or(REGISTER_THING_EXCHANGE)?;
        tracing::info!(
            thing_name = registered.thing_name.as_deref().unwrap_or("unknown"),
            "thing registered"
        );

        self.store
            .persist_granted(
                &self.identity.paths,
                &issued.certificate_pem,
                &issued.private_key,
            )
            .await
            .map_err(|e| ProvisionError::Persistence(e.to_string()))?;
        tracing::info!("provisioning complete, credentials persisted");

        Ok(ProvisionReceipt {
            certificate_id: issued.certificate_id,
            thing_name: registered.thing_name,
            device_configuration: registered.device_configuration,
        })
    }

    /// Fail-fast checks before any message is sent.
    async fn guard_configuration(&self) -> ProvisionResult<()> {
        if let Some(csr) = &self.identity.csr_file_path {
            return Err(ProvisionError::Config(format!(
                "CSR workflow not supported (requested via '{csr}')"
            )));
        }
        if self.identity.template_name.is_empty() {
            return Err(ProvisionError::Config(
                "provisioning template name is empty".into(),
            ));
        }
        self.store
            .verify_claim_pair(&self.identity.paths)
            .await
            .map_err(|e| ProvisionError::Config(e.to_string()))?;
        Ok(())
    }
}
