//! Credential store: decides whether a device must provision and persists
//! granted credentials durably.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::identity::IdentityPaths;

/// Errors from credential storage and inspection.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Exactly one file of a certificate/key pair exists on disk. This is
    /// a corrupt state requiring operator attention, not a provisioning
    /// trigger.
    #[error("inconsistent credential pair: '{present}' exists but '{absent}' is missing")]
    InconsistentPair { present: String, absent: String },

    /// The claim pair needed to authenticate provisioning is unusable.
    #[error("claim credentials unavailable: {0}")]
    MissingClaim(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Convenience alias for credential results.
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Abstraction over credential presence checks and persistence.
///
/// Enables mocking in orchestrator tests without touching the filesystem.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// True when the device holds no granted credentials and must provision.
    /// Both grant files absent means provisioning is needed; both present
    /// means the device can go online; a half-present pair is an error.
    async fn needs_provisioning(&self, paths: &IdentityPaths) -> CredentialResult<bool>;

    /// Fail fast when the claim pair cannot authenticate a provisioning run.
    async fn verify_claim_pair(&self, paths: &IdentityPaths) -> CredentialResult<()>;

    /// Persist the granted certificate and private key. Writes go to
    /// temporary files first and are renamed into place, so an interrupted
    /// attempt never leaves a fresh file next to a stale one. A failure
    /// partway through rolls back: the final paths end up holding both
    /// files or neither.
    async fn persist_granted(
        &self,
        paths: &IdentityPaths,
        certificate_pem: &str,
        private_key: &str,
    ) -> CredentialResult<()>;
}

// ── FileCredentialStore ───────────────────────────────────────

/// Credential store backed by the local filesystem.
pub struct FileCredentialStore;

impl FileCredentialStore {
    async fn exists(path: &str) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn write_temp(path: &str, contents: &str) -> CredentialResult<String> {
        let temp = format!("{path}.{}.tmp", Uuid::now_v7());
        tokio::fs::write(&temp, contents)
            .await
            .map_err(|e| CredentialError::Io(format!("writing '{temp}': {e}")))?;
        Ok(temp)
    }

    async fn remove_quietly(path: &str) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = path, error = %e, "failed to remove temp credential file");
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn needs_provisioning(&self, paths: &IdentityPaths) -> CredentialResult<bool> {
        let cert = Self::exists(&paths.grant_cert_path).await;
        let key = Self::exists(&paths.grant_key_path).await;
        match (cert, key) {
            (true, true) => Ok(false),
            (false, false) => Ok(true),
            (true, false) => Err(CredentialError::InconsistentPair {
                present: paths.grant_cert_path.clone(),
                absent: paths.grant_key_path.clone(),
            }),
            (false, true) => Err(CredentialError::InconsistentPair {
                present: paths.grant_key_path.clone(),
                absent: paths.grant_cert_path.clone(),
            }),
        }
    }

    async fn verify_claim_pair(&self, paths: &IdentityPaths) -> CredentialResult<()> {
        if paths.claim_cert_path.is_empty() || paths.claim_key_path.is_empty() {
            return Err(CredentialError::MissingClaim(
                "claim certificate or key path not configured".into(),
            ));
        }
        for path in [&paths.claim_cert_path, &paths.claim_key_path] {
            if !Self::exists(path).await {
                return Err(CredentialError::MissingClaim(format!(
                    "'{path}' does not exist"
                )));
            }
        }
        Ok(())
    }

    async fn persist_granted(
        &self,
        paths: &IdentityPaths,
        certificate_pem: &str,
        private_key: &str,
    ) -> CredentialResult<()> {
        // Stage both files before renaming either, so a failure here leaves
        // the final paths untouched.
        let cert_temp = Self::write_temp(&paths.grant_cert_path, certificate_pem).await?;
        let key_temp = match Self::write_temp(&paths.grant_key_path, private_key).await {
            Ok(temp) => temp,
            Err(e) => {
                Self::remove_quietly(&cert_temp).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&cert_temp, &paths.grant_cert_path).await {
            Self::remove_quietly(&cert_temp).await;
            Self::remove_quietly(&key_temp).await;
            return Err(CredentialError::Io(format!(
                "renaming into '{}': {e}",
                paths.grant_cert_path
            )));
        }
        if let Err(e) = tokio::fs::rename(&key_temp, &paths.grant_key_path).await {
            // Roll back the renamed cert: the final paths must hold both
            // files or neither, so the next start provisions afresh.
            Self::remove_quietly(&paths.grant_cert_path).await;
            Self::remove_quietly(&key_temp).await;
            return Err(CredentialError::Io(format!(
                "renaming into '{}': {e}",
                paths.grant_key_path
            )));
        }

        tracing::info!(
            cert_path = %paths.grant_cert_path,
            key_path = %paths.grant_key_path,
            "granted credentials persisted"
        );
        Ok(())
    }
}

// ── MockCredentialStore ───────────────────────────────────────

/// Credentials captured by [`MockCredentialStore::persist_granted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedCredentials {
    pub certificate_pem: String,
    pub private_key: String,
}

/// In-memory credential store for tests.
pub struct MockCredentialStore {
    needs_provisioning: AtomicBool,
    claim_error: Mutex<Option<String>>,
    fail_persist: AtomicBool,
    persisted: Mutex<Option<PersistedCredentials>>,
}

impl MockCredentialStore {
    pub fn new() -> Self {
        Self {
            needs_provisioning: AtomicBool::new(true),
            claim_error: Mutex::new(None),
            fail_persist: AtomicBool::new(false),
            persisted: Mutex::new(None),
        }
    }

    pub fn set_needs_provisioning(&self, needs: bool) {
        self.needs_provisioning.store(needs, Ordering::SeqCst);
    }

    /// Make `verify_claim_pair` fail with the given message.
    pub fn reject_claim(&self, message: &str) {
        *self.claim_error.lock().unwrap() = Some(message.to_string());
    }

    /// Make `persist_granted` fail.
    pub fn fail_persist(&self) {
        self.fail_persist.store(true, Ordering::SeqCst);
    }

    /// What was persisted, if anything.
    pub fn persisted(&self) -> Option<PersistedCredentials> {
        self.persisted.lock().unwrap().clone()
    }
}

impl Default for MockCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn needs_provisioning(&self, _paths: &IdentityPaths) -> CredentialResult<bool> {
        Ok(self.needs_provisioning.load(Ordering::SeqCst))
    }

    async fn verify_claim_pair(&self, _paths: &IdentityPaths) -> CredentialResult<()> {
        match self.claim_error.lock().unwrap().clone() {
            Some(message) => Err(CredentialError::MissingClaim(message)),
            None => Ok(()),
        }
    }

    async fn persist_granted(
        &self,
        _paths: &IdentityPaths,
        certificate_pem: &str,
        private_key: &str,
    ) -> CredentialResult<()> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(CredentialError::Io("scripted persistence failure".into()));
        }
        *self.persisted.lock().unwrap() = Some(PersistedCredentials {
            certificate_pem: certificate_pem.to_string(),
            private_key: private_key.to_string(),
        });
        Ok(())
    }
}
