//! HTTPS delivery of gateway reports.

use std::time::Duration;

use gl_protocol::GatewayReport;

use crate::error::{ReportError, ReportResult};

/// POSTs report envelopes to the SCADA ingestion endpoint.
pub struct HttpSender {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSender {
    /// `endpoint` is the service base URL; reports go to `{endpoint}/gateway`.
    pub fn new(endpoint: &str, timeout: Duration) -> ReportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReportError::Config(format!("building http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub async fn post_report(&self, report: &GatewayReport) -> ReportResult<()> {
        let url = format!("{}/gateway", self.endpoint);
        let response = self.client.post(&url).json(report).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(status = status.as_u16(), "report accepted");
        Ok(())
    }
}
