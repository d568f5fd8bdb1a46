use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    errors::DomainResult,
    models::{FailureDisposition, NewScheduledMessage, ProviderSlot, QueueStats, ScheduledMessage},
};

/// Durable home of every scheduled message and the only writer of its status.
///
/// Every transition is a single conditional update: implementations must never
/// read a status and write it back in two steps.
#[async_trait]
pub trait ScheduledMessageRepository: Send + Sync {
    async fn insert(&self, message: NewScheduledMessage) -> DomainResult<ScheduledMessage>;

    /// Moves up to `limit` due pending messages to `processing` and returns them.
    /// Concurrent callers always receive disjoint batches.
    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> DomainResult<Vec<ScheduledMessage>>;

    async fn mark_sent(
        &self,
        id: Uuid,
        provider_message_id: String,
        provider: ProviderSlot,
        cost: u64,
    ) -> DomainResult<ScheduledMessage>;

    async fn mark_failed(
        &self,
        id: Uuid,
        error_message: String,
        disposition: FailureDisposition,
    ) -> DomainResult<ScheduledMessage>;

    async fn cancel(&self, id: Uuid) -> DomainResult<ScheduledMessage>;

    async fn get(&self, id: Uuid) -> DomainResult<ScheduledMessage>;

    /// Processing messages claimed before `claimed_before`.
    async fn list_stale(&self, claimed_before: DateTime<Utc>, limit: u32) -> DomainResult<Vec<ScheduledMessage>>;

    async fn stats(&self, now: DateTime<Utc>) -> DomainResult<QueueStats>;
}
