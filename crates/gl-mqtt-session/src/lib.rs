//! MQTT transport session for GridLink gateways.
//!
//! Provides the pub/sub capability the provisioning and telemetry flows
//! are built on:
//! - `Session` trait for subscribe/publish/unsubscribe (mockable in tests)
//! - `MqttSession` with TLS (mTLS) for production, plus the `SessionDriver`
//!   that routes inbound publishes and tracks subscription acknowledgements
//! - `MockSession` for testing without a broker

pub mod config;
pub mod error;
pub mod mock;
pub mod session;
pub mod tls;

// Re-exports for convenience.
pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use mock::{MockSession, SessionOp};
pub use session::{MqttSession, Session, SessionDriver, TopicStream};
