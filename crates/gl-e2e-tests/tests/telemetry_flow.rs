//! End-to-end telemetry flow: readings in, accepted envelopes out.
//!
//! Drives the real `ScadaReporter` against a wiremock ingestion service
//! (HTTPS) and a mock session (MQTTS), asserting on the exact bodies the
//! cloud receives.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gl_mqtt_session::MockSession;
use gl_scada_reporter::{ReportError, ReporterConfig, ReporterProtocol, ScadaReporter};

fn https_config(endpoint: &str) -> ReporterConfig {
    ReporterConfig {
        endpoint: endpoint.into(),
        app_id: Some("plant7".into()),
        secret: Some("s3cret".into()),
        ..Default::default()
    }
}

fn mqtts_config(topic: &str) -> ReporterConfig {
    ReporterConfig {
        protocol: ReporterProtocol::Mqtts,
        app_id: Some("plant7".into()),
        secret: Some("s3cret".into()),
        mqtt_topic: Some(topic.into()),
        ..Default::default()
    }
}

async fn posted_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    serde_json::from_slice(&requests[0].body).unwrap()
}

/// A report with scalar and sampled sources serializes exactly as the
/// ingestion contract expects.
#[tokio::test]
async fn e2e_https_report_matches_the_ingestion_contract() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gateway"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let reporter = ScadaReporter::new(https_config(&server.uri())).unwrap();

    // 1. Accumulate one sampled and one scalar data source.
    let mut data = reporter.new_gateway_data("gw-001");
    let flow = data.data_source("flow-2").unwrap();
    flow.add_sample(1.5, 3.0);
    flow.add_sample(2.5, 1.0);
    let pump = data.data_source("pump-1").unwrap();
    pump.set_value(42.0);
    pump.set_property("Unit", "rpm").unwrap();
    pump.set_timestamp(Utc.with_ymd_and_hms(2024, 5, 19, 12, 0, 0).unwrap());

    // 2. Deliver it.
    reporter.send(&data).await.unwrap();

    // 3. The envelope carries the credentials and the version.
    let body = posted_body(&server).await;
    assert_eq!(body["Version"], "20200519");
    assert_eq!(body["ScadaAppId"], "plant7");
    assert_eq!(body["Secret"], "s3cret");
    assert_eq!(body["GatewayPhysicalId"], "gw-001");
    assert!(body.get("GatewayId").is_none());
    assert!(body.get("InfoData").is_none());
    assert!(body.get("ErrorData").is_none());

    // 4. Metric lines are keyed by data source, sampled before scalar here
    //    because sources are ordered by id.
    let metrics = body["MetricData"].as_array().unwrap();
    assert_eq!(metrics.len(), 2);

    assert_eq!(metrics[0]["Dimensions"][0]["Name"], "DataSourceId");
    assert_eq!(metrics[0]["Dimensions"][0]["Value"], "flow-2");
    assert_eq!(metrics[0]["Values"], serde_json::json!([1.5, 2.5]));
    assert_eq!(metrics[0]["Counts"], serde_json::json!([3.0, 1.0]));
    assert!(metrics[0].get("Value").is_none());

    assert_eq!(metrics[1]["Dimensions"][0]["Value"], "pump-1");
    assert_eq!(metrics[1]["Dimensions"][1]["Name"], "Unit");
    assert_eq!(metrics[1]["Dimensions"][1]["Value"], "rpm");
    assert_eq!(metrics[1]["Value"], 42.0);
    assert_eq!(metrics[1]["Timestamp"], "2024-05-19T12:00:00Z");
    assert!(metrics[1].get("Values").is_none());
}

/// Registration is a normal report with the REGISTER info block attached.
#[tokio::test]
async fn e2e_registration_announces_the_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gateway"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let reporter = ScadaReporter::new(https_config(&server.uri())).unwrap();
    let mut data = reporter.new_gateway_data("gw-001");
    data.data_source("pump-1").unwrap().set_value(1.0);

    reporter.register(&data).await.unwrap();

    let body = posted_body(&server).await;
    assert_eq!(body["InfoData"]["Name"], "REGISTER");
    assert_eq!(body["InfoData"]["Message"], "Register gateway");
    assert_eq!(body["GatewayPhysicalId"], "gw-001");
}

/// Over MQTTS the same envelope goes to the configured telemetry topic.
#[tokio::test]
async fn e2e_mqtts_report_publishes_to_the_configured_topic() {
    let session = Arc::new(MockSession::new());
    let reporter = ScadaReporter::with_session(
        mqtts_config("gridlink/gw-001/telemetry"),
        Arc::clone(&session) as _,
    )
    .unwrap();

    let mut data = reporter.new_gateway_data("gw-001");
    data.data_source("pump-1").unwrap().set_value(42.0);
    reporter.send(&data).await.unwrap();

    let (topic, payload) = session.last_published().unwrap();
    assert_eq!(topic, "gridlink/gw-001/telemetry");
    let body: Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(body["Version"], "20200519");
    assert_eq!(body["ScadaAppId"], "plant7");
    assert_eq!(body["MetricData"][0]["Value"], 42.0);
}

/// The registration endpoint only exists on the HTTPS side.
#[tokio::test]
async fn e2e_register_requires_https() {
    let session = Arc::new(MockSession::new());
    let reporter =
        ScadaReporter::with_session(mqtts_config("t"), Arc::clone(&session) as _).unwrap();

    let mut data = reporter.new_gateway_data("gw-001");
    data.data_source("pump-1").unwrap().set_value(1.0);

    let err = reporter.register(&data).await.unwrap_err();
    assert!(err.to_string().contains("HTTPS"));
    assert!(session.last_published().is_none());
}

/// The data source cap is enforced before anything reaches the network.
#[tokio::test]
async fn e2e_oversized_report_never_leaves_the_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gateway"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let reporter = ScadaReporter::new(https_config(&server.uri())).unwrap();
    let mut data = reporter.new_gateway_data("gw-001");
    for i in 0..21 {
        data.data_source(&format!("source-{i}")).unwrap().set_value(1.0);
    }

    let err = reporter.send(&data).await.unwrap_err();
    match err {
        ReportError::TooManyDataSources { max, count } => {
            assert_eq!(max, 20);
            assert_eq!(count, 21);
        }
        other => panic!("expected TooManyDataSources, got {other}"),
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

/// A non-2xx answer from the ingestion service surfaces as a status error
/// with the response body attached.
#[tokio::test]
async fn e2e_ingestion_failure_surfaces_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gateway"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let reporter = ScadaReporter::new(https_config(&server.uri())).unwrap();
    let mut data = reporter.new_gateway_data("gw-001");
    data.data_source("pump-1").unwrap().set_value(1.0);

    let err = reporter.send(&data).await.unwrap_err();
    match err {
        ReportError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected Status, got {other}"),
    }
}

/// The `{app_id}` endpoint placeholder resolves per application.
#[tokio::test]
async fn e2e_endpoint_placeholder_resolves_to_the_app_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/plant7/gateway"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = format!("{}/{{app_id}}", server.uri());
    let reporter = ScadaReporter::new(https_config(&endpoint)).unwrap();

    let mut data = reporter.new_gateway_data("gw-001");
    data.data_source("pump-1").unwrap().set_value(1.0);
    reporter.send(&data).await.unwrap();

    let body = posted_body(&server).await;
    assert_eq!(body["GatewayPhysicalId"], "gw-001");
}
