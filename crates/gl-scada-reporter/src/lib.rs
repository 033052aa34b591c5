//! SCADA telemetry reporter for GridLink gateways.
//!
//! Collects data-source readings into [`GatewayData`], wraps them in the
//! versioned report envelope, and delivers them to the SCADA cloud either
//! by HTTPS POST or by publishing to an MQTT topic over an existing
//! session:
//! - `GatewayData` / `DataSourceData` accumulate readings per data source
//! - `ScadaReporter` owns the delivery protocol, credentials, and endpoint
//! - `register` announces a new gateway (HTTPS only)

pub mod error;
pub mod gateway_data;
pub mod http;
pub mod mqtt;
pub mod reporter;

// Re-exports for convenience.
pub use error::{ReportError, ReportResult};
pub use gateway_data::{DataSourceData, GatewayData, MAX_DATA_SOURCES};
pub use reporter::{
    DEFAULT_API_VERSION, DEFAULT_ENDPOINT, ReporterConfig, ReporterProtocol, ScadaReporter,
};
