use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A gateway telemetry report as the SCADA cloud expects it.
///
/// The service contract uses PascalCase keys throughout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayReport {
    /// Data schema version (e.g., "20200519").
    pub version: String,
    pub scada_app_id: String,
    pub timestamp: DateTime<Utc>,
    pub secret: String,
    /// Optional gateway unique id assigned by the cloud.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
    /// Physical id the operator stamped on the device.
    pub gateway_physical_id: String,
    pub metric_data: Vec<MetricData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_data: Option<InfoData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_data: Option<ErrorData>,
}

/// One metric line: either a scalar `Value` or sampled `Values`/`Counts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<MetricUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistical_value: Option<StatisticalValue>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<Dimension>>,
}

/// Units accepted by the SCADA metric ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricUnit {
    Count,
}

/// Pre-aggregated statistics for a metric line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatisticalValue {
    pub max: f64,
    pub min: f64,
    pub sample_count: f64,
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

/// Informational block attached to a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InfoData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<InfoName>,
    pub message: String,
}

impl InfoData {
    /// The block a gateway attaches when announcing itself to the cloud.
    pub fn register() -> Self {
        Self {
            name: Some(InfoName::Register),
            message: "Register gateway".into(),
        }
    }
}

/// Well-known info block names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InfoName {
    Register,
}

/// Error block attached to a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}
