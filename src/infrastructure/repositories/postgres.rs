use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres, Row, postgres::PgPoolOptions};
use uuid::Uuid;

use crate::domain::{
    errors::{DomainError, DomainResult},
    models::{
        FailureDisposition, MessageKind, MessageStatus, NewScheduledMessage, ProviderSlot,
        QueueStats, ScheduledMessage,
    },
    repositories::ScheduledMessageRepository,
};

pub type PgPool = Pool<Postgres>;

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

#[derive(Clone)]
pub struct PostgresScheduledMessageRepository {
    pool: PgPool,
}

impl PostgresScheduledMessageRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }

    /// Explains why a conditional update matched no row.
    async fn explain_miss(&self, id: Uuid, operation: &'static str) -> DomainError {
        match self.get(id).await {
            Ok(current) => DomainError::invalid_state(id, current.status, operation),
            Err(err) => err,
        }
    }
}

#[async_trait]
impl ScheduledMessageRepository for PostgresScheduledMessageRepository {
    async fn insert(&self, message: NewScheduledMessage) -> DomainResult<ScheduledMessage> {
        let entry = ScheduledMessage::new(message, Utc::now());
        let row = sqlx::query(
            r#"
            INSERT INTO scheduled_messages (
                id, owner_ref, kind, content, sender_id, recipients, recipient_count,
                scheduled_at, status, cost, retry_count, max_retries, created_at, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
            RETURNING *
            "#,
        )
        .bind(entry.id)
        .bind(&entry.owner_ref)
        .bind(entry.kind.as_str())
        .bind(&entry.content)
        .bind(&entry.sender_id)
        .bind(&entry.recipients)
        .bind(entry.recipient_count as i32)
        .bind(entry.scheduled_at)
        .bind(entry.status.as_str())
        .bind(entry.cost as i64)
        .bind(entry.retry_count as i32)
        .bind(entry.max_retries as i32)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .fetch_one(&self.pool)
        .await?;

        ScheduledMessage::try_from(row)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> DomainResult<Vec<ScheduledMessage>> {
        let rows = sqlx::query(
            r#"
            UPDATE scheduled_messages
            SET status = 'processing',
                processed_at = $1,
                updated_at = $1
            WHERE status = 'pending'
              AND id IN (
                SELECT id
                FROM scheduled_messages
                WHERE status = 'pending'
                  AND scheduled_at <= $1
                ORDER BY scheduled_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
              )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ScheduledMessage::try_from).collect()
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        provider_message_id: String,
        provider: ProviderSlot,
        cost: u64,
    ) -> DomainResult<ScheduledMessage> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            UPDATE scheduled_messages
            SET status = 'sent',
                provider_message_id = $2,
                provider = $3,
                cost = $4,
                sent_at = $5,
                updated_at = $5
            WHERE id = $1
              AND status = 'processing'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&provider_message_id)
        .bind(provider.as_str())
        .bind(cost as i64)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => ScheduledMessage::try_from(row),
            None => Err(self.explain_miss(id, "mark sent").await),
        }
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error_message: String,
        disposition: FailureDisposition,
    ) -> DomainResult<ScheduledMessage> {
        let (retryable, not_before) = match disposition {
            FailureDisposition::Retry { not_before } => (true, Some(not_before)),
            FailureDisposition::Permanent => (false, None),
        };
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            UPDATE scheduled_messages
            SET status = CASE WHEN $3 AND retry_count + 1 < max_retries THEN 'pending' ELSE 'failed' END,
                retry_count = CASE
                    WHEN NOT $3 THEN retry_count
                    WHEN retry_count + 1 < max_retries THEN retry_count + 1
                    ELSE max_retries
                END,
                scheduled_at = CASE WHEN $3 AND retry_count + 1 < max_retries THEN $4 ELSE scheduled_at END,
                error_message = CASE WHEN $3 AND retry_count + 1 < max_retries THEN NULL ELSE $2 END,
                failed_at = CASE WHEN $3 AND retry_count + 1 < max_retries THEN NULL ELSE $5 END,
                updated_at = $5
            WHERE id = $1
              AND status = 'processing'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&error_message)
        .bind(retryable)
        .bind(not_before)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => ScheduledMessage::try_from(row),
            None => Err(self.explain_miss(id, "mark failed").await),
        }
    }

    async fn cancel(&self, id: Uuid) -> DomainResult<ScheduledMessage> {
        let row = sqlx::query(
            r#"
            UPDATE scheduled_messages
            SET status = 'cancelled',
                cancelled_at = $2,
                updated_at = $2
            WHERE id = $1
              AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => ScheduledMessage::try_from(row),
            None => Err(self.explain_miss(id, "cancel").await),
        }
    }

    async fn get(&self, id: Uuid) -> DomainResult<ScheduledMessage> {
        let row = sqlx::query(
            r#"
            SELECT *
            FROM scheduled_messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ScheduledMessage::try_from)
            .transpose()?
            .ok_or(DomainError::NotFound(id))
    }

    async fn list_stale(&self, claimed_before: DateTime<Utc>, limit: u32) -> DomainResult<Vec<ScheduledMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT *
            FROM scheduled_messages
            WHERE status = 'processing'
              AND processed_at < $1
            ORDER BY processed_at
            LIMIT $2
            "#,
        )
        .bind(claimed_before)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ScheduledMessage::try_from).collect()
    }

    async fn stats(&self, now: DateTime<Utc>) -> DomainResult<QueueStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'processing') AS processing,
                COUNT(*) FILTER (WHERE status = 'failed' AND failed_at >= $1) AS failed_last_24h
            FROM scheduled_messages
            "#,
        )
        .bind(now - Duration::hours(24))
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            pending: row.try_get::<i64, _>("pending")? as u64,
            processing: row.try_get::<i64, _>("processing")? as u64,
            failed_last_24h: row.try_get::<i64, _>("failed_last_24h")? as u64,
        })
    }
}

impl TryFrom<sqlx::postgres::PgRow> for ScheduledMessage {
    type Error = DomainError;

    fn try_from(row: sqlx::postgres::PgRow) -> Result<Self, Self::Error> {
        let kind_str: String = row.try_get("kind")?;
        let kind = MessageKind::from_str(&kind_str)
            .ok_or_else(|| anyhow::anyhow!("unknown message kind {kind_str}"))?;
        let status_str: String = row.try_get("status")?;
        let status = MessageStatus::from_str(&status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown message status {status_str}"))?;
        let provider = row
            .try_get::<Option<String>, _>("provider")?
            .map(|value| {
                ProviderSlot::from_str(&value)
                    .ok_or_else(|| anyhow::anyhow!("unknown provider slot {value}"))
            })
            .transpose()?;

        Ok(ScheduledMessage {
            id: row.try_get("id")?,
            owner_ref: row.try_get("owner_ref")?,
            kind,
            content: row.try_get("content")?,
            sender_id: row.try_get("sender_id")?,
            recipients: row.try_get("recipients")?,
            recipient_count: row.try_get::<i32, _>("recipient_count")? as u32,
            scheduled_at: row.try_get("scheduled_at")?,
            status,
            cost: row.try_get::<i64, _>("cost")? as u64,
            error_message: row.try_get("error_message")?,
            retry_count: row.try_get::<i32, _>("retry_count")? as u32,
            max_retries: row.try_get::<i32, _>("max_retries")? as u32,
            provider_message_id: row.try_get("provider_message_id")?,
            provider,
            processed_at: row.try_get("processed_at")?,
            sent_at: row.try_get("sent_at")?,
            failed_at: row.try_get("failed_at")?,
            cancelled_at: row.try_get("cancelled_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
