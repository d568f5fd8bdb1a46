use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::{
    application::services::delivery::{
        DeliveryProvider, DeliveryRequest, ProviderError, ProviderReceipt, ProviderStatusReport,
    },
    domain::models::{DeliveryState, MessageKind, RejectedRecipient},
};

use super::ProviderEndpoint;

/// Error codes that blame the backend rather than the request.
const SERVER_SIDE_CODES: &[i32] = &[1, 6, 9, 10];

/// Backend using form-encoded method calls answered by a `{response | error}` envelope.
pub struct FormApiProvider {
    http: Client,
    endpoint: ProviderEndpoint,
}

impl FormApiProvider {
    pub fn new(endpoint: ProviderEndpoint) -> anyhow::Result<Arc<dyn DeliveryProvider>> {
        let http = Client::builder()
            .user_agent("scheduled-messaging/form-api")
            .timeout(endpoint.timeout)
            .build()?;
        Ok(Arc::new(Self { http, endpoint }) as Arc<dyn DeliveryProvider>)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let mut form: Vec<(&str, &str)> = vec![("api_key", self.endpoint.api_key.as_str())];
        if let Some(username) = self.endpoint.username.as_deref() {
            form.push(("username", username));
        }
        form.extend_from_slice(params);

        let response = self
            .http
            .post(self.endpoint.url(&format!("method/{method}")))
            .form(&form)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(err, self.endpoint.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ProviderError::from_reqwest(err, self.endpoint.timeout))?;
        read_envelope(status, &body)
    }
}

/// Server faults and throttling blame the backend. Any other failed status whose
/// body is not an envelope blames the request, the same as the JSON backend.
fn read_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ProviderError> {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::Server {
            status: status.as_u16(),
            message: body.to_string(),
        });
    }

    match serde_json::from_str::<Envelope<T>>(body) {
        Ok(envelope) => envelope.into_result(),
        Err(_) if !status.is_success() => Err(ProviderError::Rejected(if body.trim().is_empty() {
            status.to_string()
        } else {
            format!("{status}: {}", body.trim())
        })),
        Err(err) => Err(ProviderError::Decode(err.to_string())),
    }
}

#[async_trait]
impl DeliveryProvider for FormApiProvider {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn send(&self, request: &DeliveryRequest) -> Result<ProviderReceipt, ProviderError> {
        let to = request.recipients.join(",");
        let (method, body_key) = match request.kind {
            MessageKind::Text => ("messages.send", "message"),
            MessageKind::Voice => ("voice.call", "text"),
            MessageKind::Audio => ("voice.call", "audio_url"),
        };
        let result: SendResult = self
            .call(
                method,
                &[
                    ("from", request.sender_id.as_str()),
                    ("to", to.as_str()),
                    (body_key, request.content.as_str()),
                ],
            )
            .await?;
        Ok(result.into_receipt())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let _: serde_json::Value = self.call("account.ping", &[]).await?;
        Ok(())
    }

    async fn message_status(&self, provider_message_id: &str) -> Result<ProviderStatusReport, ProviderError> {
        let result: StatusResult = self
            .call("messages.status", &[("message_id", provider_message_id)])
            .await?;
        Ok(ProviderStatusReport {
            state: DeliveryState::from_provider(&result.status),
            detail: result.description,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: Option<T>,
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    error_code: i32,
    error_msg: Option<String>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, ProviderError> {
        if let Some(error) = self.error {
            let message = format!(
                "error {}: {}",
                error.error_code,
                error.error_msg.unwrap_or_else(|| "unknown".to_string())
            );
            return Err(if SERVER_SIDE_CODES.contains(&error.error_code) {
                ProviderError::Server {
                    status: 200,
                    message,
                }
            } else {
                ProviderError::Rejected(message)
            });
        }
        self.response
            .ok_or_else(|| ProviderError::Decode("empty response body".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct SendResult {
    message_id: Option<String>,
    #[serde(default)]
    failed: Vec<FailedRecipient>,
}

#[derive(Debug, Deserialize)]
struct FailedRecipient {
    to: String,
    #[serde(default)]
    reason: Option<String>,
}

impl SendResult {
    fn into_receipt(self) -> ProviderReceipt {
        ProviderReceipt {
            provider_message_id: self.message_id,
            rejected: self
                .failed
                .into_iter()
                .map(|f| RejectedRecipient {
                    address: f.to,
                    reason: f.reason.unwrap_or_else(|| "rejected".to_string()),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    status: String,
    #[serde(default)]
    description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<T: DeserializeOwned>(raw: &str) -> Result<T, ProviderError> {
        serde_json::from_str::<Envelope<T>>(raw).unwrap().into_result()
    }

    #[test]
    fn failed_status_without_envelope_is_a_rejection() {
        let err = read_envelope::<SendResult>(StatusCode::BAD_REQUEST, "missing parameter: to")
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(ref m) if m.contains("missing parameter")));
        assert!(!err.is_unavailable());

        let err = read_envelope::<SendResult>(StatusCode::FORBIDDEN, "").unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }

    #[test]
    fn throttling_and_server_faults_blame_the_backend() {
        let err = read_envelope::<SendResult>(StatusCode::TOO_MANY_REQUESTS, "slow down").unwrap_err();
        assert!(matches!(err, ProviderError::Server { status: 429, .. }));
        let err = read_envelope::<SendResult>(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert!(matches!(err, ProviderError::Server { status: 502, .. }));
    }

    #[test]
    fn envelope_on_failed_status_keeps_its_error_code() {
        let err = read_envelope::<SendResult>(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"error_code": 9, "error_msg": "flood control"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Server { .. }));
    }

    #[test]
    fn garbage_on_success_is_a_decode_error() {
        let err = read_envelope::<SendResult>(StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[test]
    fn unwraps_successful_send() {
        let result: SendResult = parse(
            r#"{"response": {"message_id": "77", "failed": [{"to": "+14155550100", "reason": "no route"}]}}"#,
        )
        .unwrap();
        let receipt = result.into_receipt();
        assert_eq!(receipt.provider_message_id.as_deref(), Some("77"));
        assert_eq!(receipt.rejected.len(), 1);
        assert_eq!(receipt.rejected[0].address, "+14155550100");
        assert_eq!(receipt.rejected[0].reason, "no route");
    }

    #[test]
    fn envelope_errors_are_classified() {
        let err = parse::<SendResult>(r#"{"error": {"error_code": 100, "error_msg": "invalid sender"}}"#)
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(ref m) if m.contains("invalid sender")));

        let err = parse::<SendResult>(r#"{"error": {"error_code": 10}}"#).unwrap_err();
        assert!(err.is_unavailable());
        assert!(!matches!(err, ProviderError::Rejected(_)));
    }

    #[test]
    fn empty_envelope_is_a_decode_error() {
        let err = parse::<SendResult>("{}").unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[test]
    fn status_is_normalised() {
        let result: StatusResult =
            parse(r#"{"response": {"status": "Delivered", "description": "handset ack"}}"#).unwrap();
        assert_eq!(DeliveryState::from_provider(&result.status), DeliveryState::Delivered);
        assert_eq!(result.description.as_deref(), Some("handset ack"));
    }
}
