use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::delivery::ProviderSlot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Voice,
    Audio,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Voice => "voice",
            MessageKind::Audio => "audio",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageKind::Text),
            "voice" => Some(MessageKind::Voice),
            "audio" => Some(MessageKind::Audio),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Processing,
    Sent,
    Failed,
    Cancelled,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Processing => "processing",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
            MessageStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(MessageStatus::Pending),
            "processing" => Some(MessageStatus::Processing),
            "sent" => Some(MessageStatus::Sent),
            "failed" => Some(MessageStatus::Failed),
            "cancelled" => Some(MessageStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageStatus::Sent | MessageStatus::Failed | MessageStatus::Cancelled
        )
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a message whose delivery attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Requeue as pending no earlier than `not_before`, unless the retry budget is spent.
    Retry { not_before: DateTime<Utc> },
    /// Go straight to `failed`; retrying cannot change the outcome.
    Permanent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledMessage {
    pub id: Uuid,
    pub owner_ref: String,
    pub kind: MessageKind,
    pub content: String,
    pub sender_id: String,
    pub recipients: Vec<String>,
    pub recipient_count: u32,
    pub scheduled_at: DateTime<Utc>,
    pub status: MessageStatus,
    /// Billing amount in minor currency units.
    pub cost: u64,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub provider_message_id: Option<String>,
    pub provider: Option<ProviderSlot>,
    pub processed_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledMessage {
    pub fn new(request: NewScheduledMessage, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_ref: request.owner_ref,
            kind: request.kind,
            content: request.content,
            sender_id: request.sender_id,
            recipient_count: request.recipients.len() as u32,
            recipients: request.recipients,
            scheduled_at: request.scheduled_at,
            status: MessageStatus::Pending,
            cost: request.cost,
            error_message: None,
            retry_count: 0,
            max_retries: request.max_retries,
            provider_message_id: None,
            provider: None,
            processed_at: None,
            sent_at: None,
            failed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == MessageStatus::Pending && self.scheduled_at <= now
    }

    /// `pending -> processing`.
    pub fn claim(&mut self, now: DateTime<Utc>) -> Result<(), MessageStatus> {
        self.expect_status(MessageStatus::Pending)?;
        self.status = MessageStatus::Processing;
        self.processed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `processing -> sent`.
    pub fn mark_sent(
        &mut self,
        provider_message_id: String,
        provider: ProviderSlot,
        cost: u64,
        now: DateTime<Utc>,
    ) -> Result<(), MessageStatus> {
        self.expect_status(MessageStatus::Processing)?;
        self.status = MessageStatus::Sent;
        self.provider_message_id = Some(provider_message_id);
        self.provider = Some(provider);
        self.cost = cost;
        self.sent_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `processing -> pending` while retries remain, otherwise `processing -> failed`.
    pub fn mark_failed(
        &mut self,
        error_message: String,
        disposition: FailureDisposition,
        now: DateTime<Utc>,
    ) -> Result<(), MessageStatus> {
        self.expect_status(MessageStatus::Processing)?;
        match disposition {
            FailureDisposition::Retry { not_before } if self.retry_count + 1 < self.max_retries => {
                self.status = MessageStatus::Pending;
                self.retry_count += 1;
                self.scheduled_at = not_before;
            }
            FailureDisposition::Retry { .. } => {
                self.status = MessageStatus::Failed;
                self.retry_count = self.max_retries;
                self.error_message = Some(error_message);
                self.failed_at = Some(now);
            }
            FailureDisposition::Permanent => {
                self.status = MessageStatus::Failed;
                self.error_message = Some(error_message);
                self.failed_at = Some(now);
            }
        }
        self.updated_at = now;
        Ok(())
    }

    /// `pending -> cancelled`.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), MessageStatus> {
        self.expect_status(MessageStatus::Pending)?;
        self.status = MessageStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn expect_status(&self, expected: MessageStatus) -> Result<(), MessageStatus> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.status)
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewScheduledMessage {
    pub owner_ref: String,
    pub kind: MessageKind,
    pub content: String,
    pub sender_id: String,
    pub recipients: Vec<String>,
    pub scheduled_at: DateTime<Utc>,
    pub max_retries: u32,
    pub cost: u64,
}

/// Queue counters reported by the store.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub failed_last_24h: u64,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn message(max_retries: u32) -> ScheduledMessage {
        ScheduledMessage::new(
            NewScheduledMessage {
                owner_ref: "owner".to_string(),
                kind: MessageKind::Text,
                content: "hello".to_string(),
                sender_id: "ACME".to_string(),
                recipients: vec!["+254700000001".to_string()],
                scheduled_at: Utc::now(),
                max_retries,
                cost: 80,
            },
            Utc::now(),
        )
    }

    #[test]
    fn retry_cycles_back_to_pending_until_budget_spent() {
        let now = Utc::now();
        let later = now + Duration::seconds(30);
        let mut msg = message(3);

        for expected_retries in 1..=2 {
            msg.claim(now).unwrap();
            msg.mark_failed("boom".into(), FailureDisposition::Retry { not_before: later }, now)
                .unwrap();
            assert_eq!(msg.status, MessageStatus::Pending);
            assert_eq!(msg.retry_count, expected_retries);
            assert_eq!(msg.scheduled_at, later);
            assert!(msg.error_message.is_none());
        }

        msg.claim(now).unwrap();
        msg.mark_failed("boom".into(), FailureDisposition::Retry { not_before: later }, now)
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Failed);
        assert_eq!(msg.retry_count, 3);
        assert_eq!(msg.error_message.as_deref(), Some("boom"));
        assert!(msg.failed_at.is_some());
    }

    #[test]
    fn zero_retry_budget_fails_on_first_error() {
        let now = Utc::now();
        let mut msg = message(0);
        msg.claim(now).unwrap();
        msg.mark_failed("down".into(), FailureDisposition::Retry { not_before: now }, now)
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Failed);
        assert_eq!(msg.retry_count, 0);
    }

    #[test]
    fn permanent_failure_keeps_retry_count() {
        let now = Utc::now();
        let mut msg = message(3);
        msg.claim(now).unwrap();
        msg.mark_failed("all rejected".into(), FailureDisposition::Permanent, now)
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Failed);
        assert_eq!(msg.retry_count, 0);
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let now = Utc::now();
        let mut msg = message(3);
        msg.cancel(now).unwrap();
        let snapshot = msg.clone();

        assert_eq!(msg.cancel(now), Err(MessageStatus::Cancelled));
        assert_eq!(msg.claim(now), Err(MessageStatus::Cancelled));
        assert_eq!(
            msg.mark_sent("id".into(), ProviderSlot::Primary, 1, now),
            Err(MessageStatus::Cancelled)
        );
        assert_eq!(msg.updated_at, snapshot.updated_at);
        assert_eq!(msg.cancelled_at, snapshot.cancelled_at);
    }

    #[test]
    fn processing_message_cannot_be_cancelled() {
        let now = Utc::now();
        let mut msg = message(3);
        msg.claim(now).unwrap();
        assert_eq!(msg.cancel(now), Err(MessageStatus::Processing));
        assert_eq!(msg.status, MessageStatus::Processing);
    }
}
