//! Fleet provisioning core for GridLink gateways.
//!
//! A device without long-lived credentials authenticates with a restricted
//! claim certificate and runs two correlated exchanges against the
//! provisioning service: create-keys-and-certificate, then register-thing.
//! On success the granted certificate and key are persisted durably and the
//! device can open its real telemetry session.
//!
//! - `CredentialStore` decides whether provisioning is needed and persists
//!   granted credentials (file-backed or mock)
//! - `exchange` runs one subscribe/publish/await-terminal round trip
//! - `Provisioner` sequences the exchanges and owns the state machine

pub mod credentials;
pub mod error;
pub mod exchange;
pub mod identity;
pub mod workflow;

// Re-exports for convenience.
pub use credentials::{CredentialError, CredentialStore, FileCredentialStore, MockCredentialStore};
pub use error::{ErrorKind, ProvisionError, ProvisionResult};
pub use exchange::{ExchangeOutcome, ExchangeRequest};
pub use identity::{IdentityPaths, ProvisioningIdentity};
pub use workflow::{DEFAULT_EXCHANGE_TIMEOUT, ProvisionReceipt, Provisioner, ProvisioningState};
