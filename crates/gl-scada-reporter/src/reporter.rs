//! The reporter facade: configuration, credentials, and delivery.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use gl_mqtt_session::Session;
use gl_protocol::{GatewayReport, InfoData};

use crate::error::{ReportError, ReportResult};
use crate::gateway_data::GatewayData;
use crate::http::HttpSender;
use crate::mqtt;

/// Report schema version sent unless the config overrides it.
pub const DEFAULT_API_VERSION: &str = "20200519";

/// Default ingestion endpoint. `{app_id}` is replaced with the SCADA
/// application id.
pub const DEFAULT_ENDPOINT: &str = "https://{app_id}.telemetry.gridlink.io";

/// How a reporter delivers its envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReporterProtocol {
    #[default]
    Https,
    Mqtts,
}

/// Reporter configuration, usually one section of the gateway config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    #[serde(default)]
    pub protocol: ReporterProtocol,
    /// Base URL of the ingestion service. May contain `{app_id}`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// SCADA application id the reports are filed under.
    #[serde(default)]
    pub app_id: Option<String>,
    /// Shared secret authenticating the reports.
    #[serde(default)]
    pub secret: Option<String>,
    /// Topic reports are published to when the protocol is MQTTS.
    #[serde(default)]
    pub mqtt_topic: Option<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}
fn default_api_version() -> String {
    DEFAULT_API_VERSION.into()
}
fn default_http_timeout_secs() -> u64 {
    10
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            protocol: ReporterProtocol::default(),
            endpoint: default_endpoint(),
            api_version: default_api_version(),
            app_id: None,
            secret: None,
            mqtt_topic: None,
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl ReporterConfig {
    fn credentials(&self) -> ReportResult<(String, String)> {
        let app_id = self
            .app_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ReportError::Config("scada app id is not set".into()))?;
        let secret = self
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ReportError::Config("secret is not set".into()))?;
        Ok((app_id.to_string(), secret.to_string()))
    }
}

enum Transport {
    Https(HttpSender),
    Mqtts {
        session: Arc<dyn Session>,
        topic: String,
    },
}

/// Sends gateway reports to the SCADA cloud.
pub struct ScadaReporter {
    api_version: String,
    app_id: String,
    secret: String,
    transport: Transport,
}

impl ScadaReporter {
    /// HTTPS reporter. The config must name the HTTPS protocol.
    pub fn new(config: ReporterConfig) -> ReportResult<Self> {
        let (app_id, secret) = config.credentials()?;
        match config.protocol {
            ReporterProtocol::Https => {
                let endpoint = config.endpoint.replace("{app_id}", &app_id);
                let sender =
                    HttpSender::new(&endpoint, Duration::from_secs(config.http_timeout_secs))?;
                Ok(Self {
                    api_version: config.api_version,
                    app_id,
                    secret,
                    transport: Transport::Https(sender),
                })
            }
            ReporterProtocol::Mqtts => Err(ReportError::Config(
                "the MQTTS protocol needs a session, use ScadaReporter::with_session".into(),
            )),
        }
    }

    /// MQTTS reporter publishing over an already-connected session.
    pub fn with_session(config: ReporterConfig, session: Arc<dyn Session>) -> ReportResult<Self> {
        let (app_id, secret) = config.credentials()?;
        match config.protocol {
            ReporterProtocol::Mqtts => {
                let topic = config
                    .mqtt_topic
                    .clone()
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        ReportError::Config("the MQTTS protocol needs a telemetry topic".into())
                    })?;
                Ok(Self {
                    api_version: config.api_version,
                    app_id,
                    secret,
                    transport: Transport::Mqtts { session, topic },
                })
            }
            ReporterProtocol::Https => Err(ReportError::Config(
                "the HTTPS protocol does not use an mqtt session, use ScadaReporter::new".into(),
            )),
        }
    }

    /// Fresh accumulator for the next report.
    pub fn new_gateway_data(&self, gateway_physical_id: &str) -> GatewayData {
        GatewayData::new(gateway_physical_id)
    }

    /// Deliver one report over the configured protocol.
    pub async fn send(&self, data: &GatewayData) -> ReportResult<()> {
        let report = self.build_report(data, None)?;
        match &self.transport {
            Transport::Https(sender) => sender.post_report(&report).await,
            Transport::Mqtts { session, topic } => {
                mqtt::publish_report(session.as_ref(), topic, &report).await
            }
        }
    }

    /// Announce this gateway to the cloud. The registration endpoint only
    /// exists on the HTTPS side.
    pub async fn register(&self, data: &GatewayData) -> ReportResult<()> {
        let Transport::Https(sender) = &self.transport else {
            return Err(ReportError::Config(
                "register is only available over HTTPS".into(),
            ));
        };
        let report = self.build_report(data, Some(InfoData::register()))?;
        sender.post_report(&report).await
    }

    fn build_report(
        &self,
        data: &GatewayData,
        info_data: Option<InfoData>,
    ) -> ReportResult<GatewayReport> {
        Ok(GatewayReport {
            version: self.api_version.clone(),
            scada_app_id: self.app_id.clone(),
            timestamp: Utc::now(),
            secret: self.secret.clone(),
            gateway_id: None,
            gateway_physical_id: data.gateway_physical_id().to_string(),
            metric_data: data.to_metric_data()?,
            info_data,
            error_data: None,
        })
    }
}
