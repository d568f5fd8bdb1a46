use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::services::{cost::CostCalculator, delivery::ProviderGateway},
    domain::{
        errors::{DomainError, DomainResult},
        models::{
            DeliveryOutcome, DeliveryResult, FailureDisposition, MessageStatus, ProviderSlot,
            ScheduledMessage,
        },
        repositories::ScheduledMessageRepository,
    },
};

const STORE_WRITE_ATTEMPTS: u32 = 3;
const STORE_WRITE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(15 * 60),
        }
    }
}

impl RetryPolicy {
    /// `base * 2^retry_count`, capped at `max_delay`.
    pub fn delay(&self, retry_count: u32) -> Duration {
        let factor = 1u32 << retry_count.min(16);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    pub fn next_attempt_at(&self, retry_count: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.delay(retry_count))
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent {
        provider: ProviderSlot,
        accepted: u32,
        rejected: u32,
    },
    Retrying {
        retry_count: u32,
        next_attempt_at: DateTime<Utc>,
    },
    Failed {
        reason: String,
    },
}

/// Drives one claimed message through the gateway and records the result.
pub struct MessageDispatchHandler {
    repo: Arc<dyn ScheduledMessageRepository>,
    gateway: Arc<ProviderGateway>,
    calculator: CostCalculator,
    retry: RetryPolicy,
}

impl MessageDispatchHandler {
    pub fn new(
        repo: Arc<dyn ScheduledMessageRepository>,
        gateway: Arc<ProviderGateway>,
        calculator: CostCalculator,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            repo,
            gateway,
            calculator,
            retry,
        }
    }

    pub async fn handle(&self, message: ScheduledMessage) -> DomainResult<DispatchOutcome> {
        if message.status != MessageStatus::Processing {
            return Err(DomainError::invalid_state(
                message.id,
                message.status,
                "dispatch",
            ));
        }

        let delivery = self
            .gateway
            .send_message(
                message.kind,
                &message.recipients,
                &message.content,
                &message.sender_id,
            )
            .await;

        match delivery {
            Ok(result) => self.record_delivery(&message, result).await,
            Err(DomainError::ProviderUnavailable(reason)) => {
                warn!(message_id = %message.id, attempt = message.retry_count + 1, %reason, "delivery attempt failed");
                self.fail(&message, reason, true).await
            }
            Err(err) => Err(err),
        }
    }

    async fn record_delivery(
        &self,
        message: &ScheduledMessage,
        result: DeliveryResult,
    ) -> DomainResult<DispatchOutcome> {
        if result.status == DeliveryOutcome::Rejected {
            let reasons: Vec<String> = result
                .rejected
                .iter()
                .map(|r| format!("{}: {}", r.address, r.reason))
                .collect();
            let reason = format!("all recipients rejected ({})", reasons.join(", "));
            warn!(message_id = %message.id, provider = %result.provider, "provider rejected every recipient");
            return self.fail(message, reason, false).await;
        }

        let Some(provider_message_id) = result.provider_message_id.clone() else {
            return self
                .fail(message, "provider accepted without a message id".to_string(), true)
                .await;
        };

        let accepted: Vec<&String> = result.accepted_recipients(&message.recipients).collect();
        let cost = self
            .calculator
            .total_cost(message.kind, &message.content, &accepted);

        if result.status == DeliveryOutcome::Partial {
            warn!(message_id = %message.id, rejected = result.rejected_count, "some recipients were rejected");
        }

        self.persist(message.id, || {
            self.repo
                .mark_sent(message.id, provider_message_id.clone(), result.provider, cost)
        })
        .await?;

        info!(message_id = %message.id, provider = %result.provider, cost, "message sent");
        Ok(DispatchOutcome::Sent {
            provider: result.provider,
            accepted: result.accepted_count,
            rejected: result.rejected_count,
        })
    }

    /// Treats a claim that outlived its timeout as a failed attempt.
    pub async fn expire_claim(&self, message: &ScheduledMessage) -> DomainResult<DispatchOutcome> {
        warn!(message_id = %message.id, processed_at = ?message.processed_at, "reclaiming stale message");
        self.fail(
            message,
            "claim expired before delivery completed".to_string(),
            true,
        )
        .await
    }

    async fn fail(
        &self,
        message: &ScheduledMessage,
        reason: String,
        retryable: bool,
    ) -> DomainResult<DispatchOutcome> {
        let (disposition, error_message) = if retryable {
            let not_before = self.retry.next_attempt_at(message.retry_count, Utc::now());
            let exhausted = message.retry_count + 1 >= message.max_retries;
            let error_message = if exhausted {
                DomainError::RetryExhausted {
                    attempts: message.retry_count + 1,
                    reason,
                }
                .to_string()
            } else {
                reason
            };
            (FailureDisposition::Retry { not_before }, error_message)
        } else {
            (FailureDisposition::Permanent, reason)
        };

        let updated = self
            .persist(message.id, || {
                self.repo
                    .mark_failed(message.id, error_message.clone(), disposition)
            })
            .await?;

        Ok(match updated.status {
            MessageStatus::Pending => DispatchOutcome::Retrying {
                retry_count: updated.retry_count,
                next_attempt_at: updated.scheduled_at,
            },
            _ => {
                warn!(message_id = %message.id, error = ?updated.error_message, "message failed permanently");
                DispatchOutcome::Failed {
                    reason: updated.error_message.unwrap_or(error_message),
                }
            }
        })
    }

    /// Retries store writes that failed on a transient outage.
    async fn persist<F, Fut>(&self, message_id: Uuid, mut write: F) -> DomainResult<ScheduledMessage>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DomainResult<ScheduledMessage>>,
    {
        let mut attempt = 1;
        loop {
            match write().await {
                Err(err) if err.is_transient() && attempt < STORE_WRITE_ATTEMPTS => {
                    warn!(%message_id, attempt, error = %err, "store write failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(STORE_WRITE_DELAY).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(300),
        };
        assert_eq!(policy.delay(0), Duration::from_secs(30));
        assert_eq!(policy.delay(1), Duration::from_secs(60));
        assert_eq!(policy.delay(3), Duration::from_secs(240));
        assert_eq!(policy.delay(4), Duration::from_secs(300));
        assert_eq!(policy.delay(40), Duration::from_secs(300));
    }

    #[test]
    fn zero_base_delay_retries_immediately() {
        let policy = RetryPolicy {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        let now = Utc::now();
        assert_eq!(policy.next_attempt_at(2, now), now);
    }
}
