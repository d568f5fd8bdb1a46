mod support;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use scheduled_messaging::domain::{
    errors::DomainError,
    models::{FailureDisposition, MessageStatus, ProviderSlot},
    repositories::ScheduledMessageRepository,
};
use scheduled_messaging::infrastructure::repositories::InMemoryScheduledMessageRepository;

use support::{domestic, new_message};

fn store() -> Arc<InMemoryScheduledMessageRepository> {
    Arc::new(InMemoryScheduledMessageRepository::new())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_overlap() {
    let repo = store();
    let now = Utc::now();
    for _ in 0..200 {
        repo.insert(new_message(domestic(1), now - Duration::seconds(1), 3))
            .await
            .unwrap();
    }

    let mut pollers = Vec::new();
    for _ in 0..8 {
        let repo = repo.clone();
        pollers.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            loop {
                let batch = repo.claim_due(Utc::now(), 7).await.unwrap();
                if batch.is_empty() {
                    break;
                }
                assert!(batch.iter().all(|m| m.status == MessageStatus::Processing));
                claimed.extend(batch.into_iter().map(|m| m.id));
                tokio::task::yield_now().await;
            }
            claimed
        }));
    }

    let mut all = Vec::new();
    for poller in pollers {
        all.extend(poller.await.unwrap());
    }
    let unique: HashSet<Uuid> = all.iter().copied().collect();
    assert_eq!(all.len(), 200);
    assert_eq!(unique.len(), 200);
}

#[tokio::test]
async fn only_due_messages_are_claimed() {
    let repo = store();
    let now = Utc::now();
    let due = repo.insert(new_message(domestic(1), now, 3)).await.unwrap();
    let later = repo
        .insert(new_message(domestic(1), now + Duration::hours(1), 3))
        .await
        .unwrap();

    let claimed = repo.claim_due(now, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, due.id);
    assert_eq!(claimed[0].processed_at, Some(now));

    let claimed = repo.claim_due(now + Duration::hours(2), 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, later.id);
}

#[tokio::test]
async fn claim_limit_takes_earliest_first() {
    let repo = store();
    let now = Utc::now();
    let oldest = repo
        .insert(new_message(domestic(1), now - Duration::minutes(10), 3))
        .await
        .unwrap();
    repo.insert(new_message(domestic(1), now - Duration::minutes(1), 3))
        .await
        .unwrap();

    let claimed = repo.claim_due(now, 1).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, oldest.id);
}

#[tokio::test]
async fn cancel_is_only_valid_while_pending() {
    let repo = store();
    let now = Utc::now();
    let waiting = repo
        .insert(new_message(domestic(2), now + Duration::hours(1), 3))
        .await
        .unwrap();
    let cancelled = repo.cancel(waiting.id).await.unwrap();
    assert_eq!(cancelled.status, MessageStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    assert!(matches!(
        repo.cancel(waiting.id).await,
        Err(DomainError::InvalidState {
            status: MessageStatus::Cancelled,
            ..
        })
    ));
    assert!(repo.claim_due(now + Duration::hours(2), 10).await.unwrap().is_empty());

    let claimed = repo.insert(new_message(domestic(1), now, 3)).await.unwrap();
    repo.claim_due(now, 10).await.unwrap();
    assert!(matches!(
        repo.cancel(claimed.id).await,
        Err(DomainError::InvalidState {
            status: MessageStatus::Processing,
            ..
        })
    ));

    assert!(matches!(
        repo.cancel(Uuid::new_v4()).await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn sent_messages_are_immutable() {
    let repo = store();
    let now = Utc::now();
    let message = repo.insert(new_message(domestic(3), now, 3)).await.unwrap();
    repo.claim_due(now, 10).await.unwrap();

    let sent = repo
        .mark_sent(message.id, "p-1".into(), ProviderSlot::Primary, 240)
        .await
        .unwrap();
    assert_eq!(sent.status, MessageStatus::Sent);
    assert_eq!(sent.cost, 240);
    assert_eq!(sent.provider, Some(ProviderSlot::Primary));

    assert!(matches!(
        repo.mark_sent(message.id, "p-2".into(), ProviderSlot::Backup, 1).await,
        Err(DomainError::InvalidState { .. })
    ));
    assert!(matches!(
        repo.mark_failed(message.id, "late".into(), FailureDisposition::Permanent)
            .await,
        Err(DomainError::InvalidState { .. })
    ));
    assert!(matches!(
        repo.cancel(message.id).await,
        Err(DomainError::InvalidState { .. })
    ));

    let stored = repo.get(message.id).await.unwrap();
    assert_eq!(stored.provider_message_id.as_deref(), Some("p-1"));
    assert_eq!(stored.cost, 240);
}

#[tokio::test]
async fn transient_failures_walk_the_retry_budget() {
    let repo = store();
    let message = repo
        .insert(new_message(domestic(1), Utc::now(), 3))
        .await
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let now = Utc::now();
        let claimed = repo.claim_due(now, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        let updated = repo
            .mark_failed(
                message.id,
                "gateway timeout".into(),
                FailureDisposition::Retry { not_before: now },
            )
            .await
            .unwrap();
        assert!(updated.retry_count <= updated.max_retries);
        seen.push((updated.status, updated.retry_count));
    }

    assert_eq!(
        seen,
        vec![
            (MessageStatus::Pending, 1),
            (MessageStatus::Pending, 2),
            (MessageStatus::Failed, 3),
        ]
    );
    let failed = repo.get(message.id).await.unwrap();
    assert_eq!(failed.error_message.as_deref(), Some("gateway timeout"));
    assert!(failed.failed_at.is_some());
    assert!(repo.claim_due(Utc::now(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn retry_reschedules_to_backoff_time() {
    let repo = store();
    let now = Utc::now();
    let message = repo.insert(new_message(domestic(1), now, 3)).await.unwrap();
    repo.claim_due(now, 10).await.unwrap();

    let not_before = now + Duration::minutes(5);
    let updated = repo
        .mark_failed(message.id, "busy".into(), FailureDisposition::Retry { not_before })
        .await
        .unwrap();
    assert_eq!(updated.status, MessageStatus::Pending);
    assert_eq!(updated.scheduled_at, not_before);
    assert!(updated.error_message.is_none());
    assert!(repo.claim_due(now + Duration::minutes(1), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn permanent_failure_keeps_retry_count() {
    let repo = store();
    let now = Utc::now();
    let message = repo.insert(new_message(domestic(1), now, 5)).await.unwrap();
    repo.claim_due(now, 10).await.unwrap();

    let failed = repo
        .mark_failed(message.id, "all recipients rejected".into(), FailureDisposition::Permanent)
        .await
        .unwrap();
    assert_eq!(failed.status, MessageStatus::Failed);
    assert_eq!(failed.retry_count, 0);
}

#[tokio::test]
async fn stale_claims_are_listed_and_stats_count_them() {
    let repo = store();
    let now = Utc::now();
    let stale = repo
        .insert(new_message(domestic(1), now - Duration::hours(1), 3))
        .await
        .unwrap();
    repo.claim_due(now - Duration::minutes(30), 10).await.unwrap();
    let fresh = repo.insert(new_message(domestic(1), now, 3)).await.unwrap();
    repo.claim_due(now, 10).await.unwrap();
    repo.insert(new_message(domestic(1), now + Duration::hours(1), 3))
        .await
        .unwrap();

    let listed = repo
        .list_stale(now - Duration::minutes(10), 10)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, stale.id);
    assert_ne!(listed[0].id, fresh.id);

    repo.mark_failed(stale.id, "claim expired".into(), FailureDisposition::Permanent)
        .await
        .unwrap();
    let stats = repo.stats(Utc::now()).await.unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.processing, 1);
    assert_eq!(stats.failed_last_24h, 1);
}
