//! Correlated request/reply exchanges over MQTT topic pairs.
//!
//! The provisioning service answers a request published to one topic with
//! exactly one terminal message on either its `accepted` or its `rejected`
//! topic. [`execute`] runs one such exchange:
//!
//! 1. subscribe to the accepted topic, then the rejected topic, each
//!    confirmed by the broker before proceeding
//! 2. publish the request payload
//! 3. wait for the first terminal message, bounded by a deadline
//! 4. decode it (accepted payloads as `T`, rejected payloads as
//!    [`ServiceRejection`])
//! 5. unsubscribe both topics, best effort
//!
//! Subscribing before publishing is load-bearing: the service can answer
//! faster than a subscribe round-trip, and a reply published before the
//! subscription is in place is lost forever.

use std::collections::HashMap;
use std::time::Duration;

use rumqttc::QoS;
use serde::de::DeserializeOwned;

use gl_mqtt_session::{Session, SessionError, TopicStream};
use gl_protocol::{
    CreateKeysAndCertificateRequest, RegisterThingRequest, ServiceRejection, topics,
};

use crate::error::{ProvisionError, ProvisionResult};

/// Exchange name for certificate creation.
pub const CREATE_KEYS_EXCHANGE: &str = "create-keys-and-certificate";
/// Exchange name for thing registration.
pub const REGISTER_THING_EXCHANGE: &str = "register-thing";

// ── Exchange requests ─────────────────────────────────────────

/// One correlated request: where to publish, where the terminal messages
/// arrive, and what to send.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub name: &'static str,
    pub request_topic: String,
    pub accepted_topic: String,
    pub rejected_topic: String,
    pub payload: Vec<u8>,
}

impl ExchangeRequest {
    /// The create-keys-and-certificate exchange. The service expects an
    /// empty JSON object as the request body.
    pub fn create_keys() -> ProvisionResult<Self> {
        let payload = encode(CREATE_KEYS_EXCHANGE, &CreateKeysAndCertificateRequest::default())?;
        Ok(Self {
            name: CREATE_KEYS_EXCHANGE,
            request_topic: topics::create_keys_request(),
            accepted_topic: topics::create_keys_accepted(),
            rejected_topic: topics::create_keys_rejected(),
            payload,
        })
    }

    /// The register-thing exchange against a named provisioning template.
    pub fn register_thing(
        template_name: &str,
        parameters: HashMap<String, String>,
        ownership_token: &str,
    ) -> ProvisionResult<Self> {
        let request = RegisterThingRequest {
            template_name: template_name.to_string(),
            parameters,
            certificate_ownership_token: ownership_token.to_string(),
        };
        Ok(Self {
            name: REGISTER_THING_EXCHANGE,
            request_topic: topics::register_thing_request(template_name),
            accepted_topic: topics::register_thing_accepted(template_name),
            rejected_topic: topics::register_thing_rejected(template_name),
            payload: encode(REGISTER_THING_EXCHANGE, &request)?,
        })
    }
}

fn encode<R: serde::Serialize>(exchange: &'static str, request: &R) -> ProvisionResult<Vec<u8>> {
    serde_json::to_vec(request).map_err(|e| ProvisionError::Protocol {
        exchange,
        message: format!("encoding request: {e}"),
    })
}

// ── Exchange outcomes ─────────────────────────────────────────

/// Terminal result of an exchange the transport completed.
///
/// A rejection is a successful exchange from the transport's point of
/// view; whether it aborts the workflow is the caller's decision.
#[derive(Debug)]
pub enum ExchangeOutcome<T> {
    Accepted(T),
    Rejected(ServiceRejection),
}

impl<T> ExchangeOutcome<T> {
    /// Unwrap the accepted payload, turning a rejection into
    /// [`ProvisionError::Rejected`].
    pub fn accepted_or(self, exchange: &'static str) -> ProvisionResult<T> {
        match self {
            ExchangeOutcome::Accepted(value) => Ok(value),
            ExchangeOutcome::Rejected(rejection) => {
                Err(ProvisionError::Rejected { exchange, rejection })
            }
        }
    }
}

// ── Execution ─────────────────────────────────────────────────

/// Run one correlated exchange to its terminal outcome.
pub async fn execute<S, T>(
    session: &S,
    request: &ExchangeRequest,
    timeout: Duration,
) -> ProvisionResult<ExchangeOutcome<T>>
where
    S: Session + ?Sized,
    T: DeserializeOwned,
{
    let mut accepted = session
        .subscribe(&request.accepted_topic, QoS::AtLeastOnce)
        .await?;
    let mut rejected = match session
        .subscribe(&request.rejected_topic, QoS::AtLeastOnce)
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            // Release the half-established pair.
            let _ = session.unsubscribe(&request.accepted_topic).await;
            return Err(ProvisionError::Transport(e));
        }
    };

    tracing::debug!(
        exchange = request.name,
        topic = %request.request_topic,
        "publishing exchange request"
    );
    let outcome = match session
        .publish(&request.request_topic, &request.payload, QoS::AtLeastOnce)
        .await
    {
        Ok(()) => await_terminal(request, &mut accepted, &mut rejected, timeout).await,
        Err(e) => Err(ProvisionError::Transport(e)),
    };

    // Best-effort cleanup, skipped when the transport itself failed: the
    // connection is gone and unsubscribing it would only fail again.
    if !matches!(outcome, Err(ProvisionError::Transport(_))) {
        for topic in [&request.accepted_topic, &request.rejected_topic] {
            if let Err(e) = session.unsubscribe(topic).await {
                tracing::warn!(
                    exchange = request.name,
                    topic = %topic,
                    error = %e,
                    "unsubscribe after exchange failed"
                );
            }
        }
    }

    outcome
}

/// Wait for the first terminal message on either stream, or the deadline.
async fn await_terminal<T: DeserializeOwned>(
    request: &ExchangeRequest,
    accepted: &mut TopicStream,
    rejected: &mut TopicStream,
    timeout: Duration,
) -> ProvisionResult<ExchangeOutcome<T>> {
    tokio::select! {
        message = accepted.recv() => match message {
            Some(payload) => decode_accepted(request.name, &payload),
            None => Err(ProvisionError::Transport(SessionError::Closed)),
        },
        message = rejected.recv() => match message {
            Some(payload) => decode_rejected(request.name, &payload),
            None => Err(ProvisionError::Transport(SessionError::Closed)),
        },
        _ = tokio::time::sleep(timeout) => Err(ProvisionError::Timeout {
            exchange: request.name,
            after: timeout,
        }),
    }
}

fn decode_accepted<T: DeserializeOwned>(
    exchange: &'static str,
    payload: &[u8],
) -> ProvisionResult<ExchangeOutcome<T>> {
    match serde_json::from_slice(payload) {
        Ok(value) => Ok(ExchangeOutcome::Accepted(value)),
        Err(e) => Err(ProvisionError::Protocol {
            exchange,
            message: format!("undecodable message on accepted topic: {e}"),
        }),
    }
}

fn decode_rejected<T>(
    exchange: &'static str,
    payload: &[u8],
) -> ProvisionResult<ExchangeOutcome<T>> {
    match serde_json::from_slice::<ServiceRejection>(payload) {
        Ok(rejection) => Ok(ExchangeOutcome::Rejected(rejection)),
        Err(e) => Err(ProvisionError::Protocol {
            exchange,
            message: format!("undecodable message on rejected topic: {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gl_mqtt_session::{MockSession, SessionOp};
    use serde_json::{Value, json};

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn request() -> ExchangeRequest {
        ExchangeRequest {
            name: "test-exchange",
            request_topic: "req".into(),
            accepted_topic: "req/accepted".into(),
            rejected_topic: "req/rejected".into(),
            payload: b"{}".to_vec(),
        }
    }

    #[test]
    fn create_keys_request_is_an_empty_object() {
        let request = ExchangeRequest::create_keys().unwrap();
        assert_eq!(request.payload, b"{}");
        assert_eq!(request.request_topic, "$aws/certificates/create/json");
        assert_eq!(request.accepted_topic, "$aws/certificates/create/json/accepted");
    }

    #[test]
    fn register_thing_request_carries_template_and_token() {
        let mut parameters = HashMap::new();
        parameters.insert("SerialNumber".to_string(), "GW-1".to_string());
        let request = ExchangeRequest::register_thing("T1", parameters, "tok-1").unwrap();

        assert_eq!(
            request.request_topic,
            "$aws/provisioning-templates/T1/provision/json"
        );
        let body: Value = serde_json::from_slice(&request.payload).unwrap();
        assert_eq!(body["templateName"], "T1");
        assert_eq!(body["certificateOwnershipToken"], "tok-1");
        assert_eq!(body["parameters"]["SerialNumber"], "GW-1");
    }

    #[tokio::test]
    async fn resolves_on_accepted_message() {
        let mock = MockSession::new();
        mock.script_reply("req", "req/accepted", br#"{"ok":true}"#.to_vec());

        let outcome: ExchangeOutcome<Value> =
            execute(&mock, &request(), TIMEOUT).await.unwrap();
        match outcome {
            ExchangeOutcome::Accepted(value) => assert_eq!(value, json!({"ok": true})),
            ExchangeOutcome::Rejected(r) => panic!("unexpected rejection: {r}"),
        }

        // Both reply topics subscribed before the publish, both released after.
        let ops = mock.operations();
        assert_eq!(ops[0], SessionOp::Subscribe("req/accepted".into()));
        assert_eq!(ops[1], SessionOp::Subscribe("req/rejected".into()));
        assert!(matches!(&ops[2], SessionOp::Publish { topic, .. } if topic == "req"));
        assert!(mock.unsubscribed_from("req/accepted"));
        assert!(mock.unsubscribed_from("req/rejected"));
    }

    #[tokio::test]
    async fn resolves_on_rejected_message() {
        let mock = MockSession::new();
        mock.script_reply(
            "req",
            "req/rejected",
            br#"{"statusCode":400,"errorCode":"InvalidRequest","errorMessage":"bad"}"#.to_vec(),
        );

        let outcome: ExchangeOutcome<Value> =
            execute(&mock, &request(), TIMEOUT).await.unwrap();
        match outcome {
            ExchangeOutcome::Rejected(rejection) => {
                assert_eq!(rejection.status_code, 400);
                assert_eq!(rejection.error_code.as_deref(), Some("InvalidRequest"));
            }
            ExchangeOutcome::Accepted(_) => panic!("expected a rejection"),
        }
    }

    #[tokio::test]
    async fn undecodable_accepted_message_is_a_protocol_error() {
        let mock = MockSession::new();
        mock.script_reply("req", "req/accepted", b"not json".to_vec());

        let err = execute::<_, Value>(&mock, &request(), TIMEOUT)
            .await
            .unwrap_err();
        match err {
            ProvisionError::Protocol { exchange, message } => {
                assert_eq!(exchange, "test-exchange");
                assert!(message.contains("accepted"));
            }
            other => panic!("expected a protocol error, got {other}"),
        }
        // Cleanup still runs after a decode failure.
        assert!(mock.unsubscribed_from("req/accepted"));
    }

    #[tokio::test]
    async fn rejection_without_status_code_is_a_protocol_error() {
        let mock = MockSession::new();
        mock.script_reply(
            "req",
            "req/rejected",
            br#"{"errorMessage":"no discriminator"}"#.to_vec(),
        );

        let err = execute::<_, Value>(&mock, &request(), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Protocol { .. }));
    }

    #[tokio::test]
    async fn times_out_when_no_terminal_message_arrives() {
        let mock = MockSession::new();

        let err = execute::<_, Value>(&mock, &request(), Duration::from_millis(10))
            .await
            .unwrap_err();
        match err {
            ProvisionError::Timeout { exchange, after } => {
                assert_eq!(exchange, "test-exchange");
                assert_eq!(after, Duration::from_millis(10));
            }
            other => panic!("expected a timeout, got {other}"),
        }
        // The deadline does not leak subscriptions.
        assert!(mock.unsubscribed_from("req/accepted"));
        assert!(mock.unsubscribed_from("req/rejected"));
    }

    #[tokio::test]
    async fn duplicate_deliveries_resolve_once() {
        let mock = MockSession::new();
        mock.script_reply("req", "req/accepted", br#"{"n":1}"#.to_vec());
        mock.script_reply("req", "req/accepted", br#"{"n":2}"#.to_vec());

        let outcome: ExchangeOutcome<Value> =
            execute(&mock, &request(), TIMEOUT).await.unwrap();
        match outcome {
            ExchangeOutcome::Accepted(value) => assert_eq!(value, json!({"n": 1})),
            ExchangeOutcome::Rejected(r) => panic!("unexpected rejection: {r}"),
        }
    }

    #[tokio::test]
    async fn subscribe_failure_aborts_before_publishing() {
        let mock = MockSession::new();
        mock.fail_subscribe_on("req/rejected");

        let err = execute::<_, Value>(&mock, &request(), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Transport(_)));
        assert!(mock.published_to("req").is_empty());
        // The half-established subscription is released.
        assert!(mock.unsubscribed_from("req/accepted"));
    }

    #[tokio::test]
    async fn publish_failure_skips_cleanup() {
        let mock = MockSession::new();
        mock.fail_publish_on("req");

        let err = execute::<_, Value>(&mock, &request(), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Transport(_)));
        assert!(!mock.unsubscribed_from("req/accepted"));
        assert!(!mock.unsubscribed_from("req/rejected"));
    }
}
