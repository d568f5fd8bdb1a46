use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::MessageKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageScheduledEvent {
    pub event_id: Uuid,
    pub message_id: Uuid,
    pub kind: MessageKind,
    pub recipient_count: u32,
    pub scheduled_at: DateTime<Utc>,
}

impl MessageScheduledEvent {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }
}
