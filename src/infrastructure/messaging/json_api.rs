use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    application::services::delivery::{
        DeliveryProvider, DeliveryRequest, ProviderError, ProviderReceipt, ProviderStatusReport,
    },
    domain::models::{DeliveryState, MessageKind, RejectedRecipient},
};

use super::ProviderEndpoint;

/// Backend speaking a bearer-authenticated JSON REST API.
pub struct JsonApiProvider {
    http: Client,
    endpoint: ProviderEndpoint,
}

impl JsonApiProvider {
    pub fn new(endpoint: ProviderEndpoint) -> anyhow::Result<Arc<dyn DeliveryProvider>> {
        let http = Client::builder()
            .user_agent("scheduled-messaging/json-api")
            .timeout(endpoint.timeout)
            .build()?;
        Ok(Arc::new(Self { http, endpoint }) as Arc<dyn DeliveryProvider>)
    }

    fn transport(&self, err: reqwest::Error) -> ProviderError {
        ProviderError::from_reqwest(err, self.endpoint.timeout)
    }

    async fn checked(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, body))
    }
}

#[async_trait]
impl DeliveryProvider for JsonApiProvider {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn send(&self, request: &DeliveryRequest) -> Result<ProviderReceipt, ProviderError> {
        let response = self
            .http
            .post(self.endpoint.url("messages"))
            .bearer_auth(&self.endpoint.api_key)
            .json(&SendBody::from_request(request, self.endpoint.username.as_deref()))
            .send()
            .await
            .map_err(|err| self.transport(err))?;
        let payload: SendResponse = Self::checked(response)
            .await?
            .json()
            .await
            .map_err(|err| self.transport(err))?;
        Ok(payload.into_receipt())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .http
            .get(self.endpoint.url("health"))
            .bearer_auth(&self.endpoint.api_key)
            .send()
            .await
            .map_err(|err| self.transport(err))?;
        Self::checked(response).await?;
        Ok(())
    }

    async fn message_status(&self, provider_message_id: &str) -> Result<ProviderStatusReport, ProviderError> {
        let response = self
            .http
            .get(self.endpoint.url(&format!("messages/{provider_message_id}")))
            .bearer_auth(&self.endpoint.api_key)
            .send()
            .await
            .map_err(|err| self.transport(err))?;
        let payload: StatusResponse = Self::checked(response)
            .await?
            .json()
            .await
            .map_err(|err| self.transport(err))?;
        Ok(ProviderStatusReport {
            state: DeliveryState::from_provider(&payload.status),
            detail: payload.detail,
        })
    }
}

/// 4xx means the request itself is bad; anything else blames the backend.
fn classify_status(status: StatusCode, body: String) -> ProviderError {
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        ProviderError::Rejected(if body.is_empty() {
            status.to_string()
        } else {
            body
        })
    } else {
        ProviderError::Server {
            status: status.as_u16(),
            message: body,
        }
    }
}

#[derive(Debug, Serialize)]
struct SendBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    from: &'a str,
    to: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
}

impl<'a> SendBody<'a> {
    fn from_request(request: &'a DeliveryRequest, username: Option<&'a str>) -> Self {
        let (message, audio_url) = match request.kind {
            MessageKind::Text | MessageKind::Voice => (Some(request.content.as_str()), None),
            MessageKind::Audio => (None, Some(request.content.as_str())),
        };
        Self {
            kind: match request.kind {
                MessageKind::Text => "sms",
                MessageKind::Voice => "voice",
                MessageKind::Audio => "audio",
            },
            from: &request.sender_id,
            to: &request.recipients,
            message,
            audio_url,
            username,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: Option<String>,
    #[serde(default)]
    recipients: Vec<RecipientReport>,
}

#[derive(Debug, Deserialize)]
struct RecipientReport {
    number: String,
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

impl SendResponse {
    fn into_receipt(self) -> ProviderReceipt {
        let rejected = self
            .recipients
            .into_iter()
            .filter(|r| {
                !matches!(
                    r.status.to_ascii_lowercase().as_str(),
                    "accepted" | "queued" | "sent" | "success"
                )
            })
            .map(|r| RejectedRecipient {
                reason: r.reason.unwrap_or(r.status),
                address: r.number,
            })
            .collect();
        ProviderReceipt {
            provider_message_id: self.message_id,
            rejected,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    detail: Option<String>,
}
