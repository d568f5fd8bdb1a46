use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Url;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::services::{cost::CostCalculator, event_bus::MessageBus},
    domain::{
        errors::{DomainError, DomainResult},
        events::MessageScheduledEvent,
        models::{MessageKind, NewScheduledMessage, ScheduledMessage},
        repositories::ScheduledMessageRepository,
        value_objects::{Recipient, SenderId, parse_recipients},
    },
};

#[derive(Debug, Clone)]
pub struct ScheduleMessageConfig {
    pub default_max_retries: u32,
    pub max_retries_limit: u32,
    pub max_content_length: usize,
}

impl Default for ScheduleMessageConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 3,
            max_retries_limit: 10,
            max_content_length: 1600,
        }
    }
}

pub struct ScheduleMessageUseCase {
    repo: Arc<dyn ScheduledMessageRepository>,
    bus: Arc<dyn MessageBus>,
    calculator: CostCalculator,
    config: ScheduleMessageConfig,
}

#[derive(Debug, Clone)]
pub struct ScheduleMessageRequest {
    pub owner_ref: String,
    pub kind: MessageKind,
    pub content: String,
    pub sender_id: String,
    pub recipients: Vec<String>,
    /// `None` or a past instant means "as soon as possible".
    pub scheduled_at: Option<DateTime<Utc>>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ScheduleMessageResponse {
    pub message_id: Uuid,
    pub cost: u64,
    pub scheduled_at: DateTime<Utc>,
}

impl ScheduleMessageUseCase {
    pub fn new(
        repo: Arc<dyn ScheduledMessageRepository>,
        bus: Arc<dyn MessageBus>,
        calculator: CostCalculator,
        config: ScheduleMessageConfig,
    ) -> Self {
        Self {
            repo,
            bus,
            calculator,
            config,
        }
    }

    pub async fn execute(&self, request: ScheduleMessageRequest) -> DomainResult<ScheduleMessageResponse> {
        let recipients: Vec<String> = parse_recipients(&request.recipients)?
            .into_iter()
            .map(Recipient::into_inner)
            .collect();
        let sender_id = SenderId::parse(&request.sender_id)?.into_inner();
        let content = self.validate_content(request.kind, &request.content)?;
        let max_retries = self.validate_max_retries(request.max_retries)?;

        let now = Utc::now();
        let scheduled_at = request.scheduled_at.filter(|at| *at > now).unwrap_or(now);
        let cost = self
            .calculator
            .total_cost(request.kind, &content, &recipients);

        let message = self
            .repo
            .insert(NewScheduledMessage {
                owner_ref: request.owner_ref,
                kind: request.kind,
                content,
                sender_id,
                recipients,
                scheduled_at,
                max_retries,
                cost,
            })
            .await?;

        info!(
            message_id = %message.id,
            kind = message.kind.as_str(),
            recipients = message.recipient_count,
            cost,
            scheduled_at = %message.scheduled_at,
            "message scheduled"
        );
        self.announce(&message).await;

        Ok(ScheduleMessageResponse {
            message_id: message.id,
            cost,
            scheduled_at: message.scheduled_at,
        })
    }

    /// The interval loop picks the message up anyway, so a bus outage is not fatal.
    async fn announce(&self, message: &ScheduledMessage) {
        let event = MessageScheduledEvent {
            event_id: Uuid::new_v4(),
            message_id: message.id,
            kind: message.kind,
            recipient_count: message.recipient_count,
            scheduled_at: message.scheduled_at,
        };
        if let Err(err) = self.bus.publish(event).await {
            warn!(message_id = %message.id, error = %err, "failed to publish scheduled event");
        }
    }

    fn validate_content(&self, kind: MessageKind, content: &str) -> DomainResult<String> {
        match kind {
            MessageKind::Text | MessageKind::Voice => {
                if content.trim().is_empty() {
                    return Err(DomainError::Validation("content cannot be empty".into()));
                }
                if content.chars().count() > self.config.max_content_length {
                    return Err(DomainError::Validation(format!(
                        "content exceeds {} characters",
                        self.config.max_content_length
                    )));
                }
                Ok(content.to_string())
            }
            MessageKind::Audio => {
                let url = Url::parse(content.trim()).map_err(|err| {
                    DomainError::Validation(format!("audio content must be a URL: {err}"))
                })?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(DomainError::Validation(
                        "audio URL must use http or https".into(),
                    ));
                }
                Ok(url.to_string())
            }
        }
    }

    fn validate_max_retries(&self, requested: Option<u32>) -> DomainResult<u32> {
        let max_retries = requested.unwrap_or(self.config.default_max_retries);
        if max_retries > self.config.max_retries_limit {
            return Err(DomainError::Validation(format!(
                "max_retries cannot exceed {}",
                self.config.max_retries_limit
            )));
        }
        Ok(max_retries)
    }
}
