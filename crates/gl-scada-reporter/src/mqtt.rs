//! MQTT delivery of gateway reports over an existing session.

use rumqttc::QoS;

use gl_mqtt_session::Session;
use gl_protocol::GatewayReport;

use crate::error::ReportResult;

/// Publish one report envelope to the configured telemetry topic.
pub async fn publish_report<S>(session: &S, topic: &str, report: &GatewayReport) -> ReportResult<()>
where
    S: Session + ?Sized,
{
    let payload = serde_json::to_vec(report)?;
    session.publish(topic, &payload, QoS::AtLeastOnce).await?;
    tracing::debug!(topic = topic, bytes = payload.len(), "report published");
    Ok(())
}
