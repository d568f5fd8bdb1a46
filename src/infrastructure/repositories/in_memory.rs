use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    errors::{DomainError, DomainResult},
    models::{
        FailureDisposition, MessageStatus, NewScheduledMessage, ProviderSlot, QueueStats,
        ScheduledMessage,
    },
    repositories::ScheduledMessageRepository,
};

/// Process-local store. Every transition runs under one write lock, which makes
/// each claim atomic with respect to every other caller.
#[derive(Default, Clone)]
pub struct InMemoryScheduledMessageRepository {
    messages: Arc<RwLock<HashMap<Uuid, ScheduledMessage>>>,
}

impl InMemoryScheduledMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn transition<F>(&self, id: Uuid, operation: &'static str, apply: F) -> DomainResult<ScheduledMessage>
    where
        F: FnOnce(&mut ScheduledMessage) -> Result<(), MessageStatus>,
    {
        let mut messages = self.messages.write().await;
        let entry = messages.get_mut(&id).ok_or(DomainError::NotFound(id))?;
        apply(entry).map_err(|status| DomainError::invalid_state(id, status, operation))?;
        Ok(entry.clone())
    }
}

#[async_trait]
impl ScheduledMessageRepository for InMemoryScheduledMessageRepository {
    async fn insert(&self, message: NewScheduledMessage) -> DomainResult<ScheduledMessage> {
        let entry = ScheduledMessage::new(message, Utc::now());
        let mut messages = self.messages.write().await;
        messages.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> DomainResult<Vec<ScheduledMessage>> {
        let mut messages = self.messages.write().await;

        let mut due: Vec<(DateTime<Utc>, Uuid)> = messages
            .values()
            .filter(|m| m.is_due(now))
            .map(|m| (m.scheduled_at, m.id))
            .collect();
        due.sort();
        due.truncate(limit as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(entry) = messages.get_mut(&id) {
                if entry.claim(now).is_ok() {
                    claimed.push(entry.clone());
                }
            }
        }
        Ok(claimed)
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        provider_message_id: String,
        provider: ProviderSlot,
        cost: u64,
    ) -> DomainResult<ScheduledMessage> {
        self.transition(id, "mark sent", |m| {
            m.mark_sent(provider_message_id, provider, cost, Utc::now())
        })
        .await
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error_message: String,
        disposition: FailureDisposition,
    ) -> DomainResult<ScheduledMessage> {
        self.transition(id, "mark failed", |m| {
            m.mark_failed(error_message, disposition, Utc::now())
        })
        .await
    }

    async fn cancel(&self, id: Uuid) -> DomainResult<ScheduledMessage> {
        self.transition(id, "cancel", |m| m.cancel(Utc::now())).await
    }

    async fn get(&self, id: Uuid) -> DomainResult<ScheduledMessage> {
        let messages = self.messages.read().await;
        messages.get(&id).cloned().ok_or(DomainError::NotFound(id))
    }

    async fn list_stale(&self, claimed_before: DateTime<Utc>, limit: u32) -> DomainResult<Vec<ScheduledMessage>> {
        let messages = self.messages.read().await;
        let mut stale: Vec<ScheduledMessage> = messages
            .values()
            .filter(|m| {
                m.status == MessageStatus::Processing
                    && m.processed_at.is_some_and(|at| at < claimed_before)
            })
            .cloned()
            .collect();
        stale.sort_by_key(|m| m.processed_at);
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn stats(&self, now: DateTime<Utc>) -> DomainResult<QueueStats> {
        let since = now - Duration::hours(24);
        let messages = self.messages.read().await;
        let mut stats = QueueStats::default();
        for message in messages.values() {
            match message.status {
                MessageStatus::Pending => stats.pending += 1,
                MessageStatus::Processing => stats.processing += 1,
                MessageStatus::Failed if message.failed_at.is_some_and(|at| at >= since) => {
                    stats.failed_last_24h += 1
                }
                _ => {}
            }
        }
        Ok(stats)
    }
}
