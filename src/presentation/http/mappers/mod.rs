use poem::http::StatusCode;
use tracing::error;

use crate::{
    application::{
        handlers::dispatch_worker::{PassSummary, WorkerStats},
        usecases::queue_health::QueueHealth,
    },
    domain::{
        errors::DomainError,
        models::{CostEstimate, DeliveryStatus, GatewayHealth, ScheduledMessage},
    },
    presentation::{
        http::responses::{
            CostEstimateDto, DeliveryStatusDto, GatewayHealthDto, PassSummaryDto, QueueHealthDto,
            RecipientCostDto, ScheduledMessageDto, WorkerStatsDto,
        },
        models::MessageStatusDto,
    },
};

pub fn map_message(message: &ScheduledMessage) -> ScheduledMessageDto {
    ScheduledMessageDto {
        id: message.id,
        kind: message.kind.into(),
        content: message.content.clone(),
        sender_id: message.sender_id.clone(),
        recipients: message.recipients.clone(),
        recipient_count: message.recipient_count,
        scheduled_at: message.scheduled_at.to_rfc3339(),
        status: MessageStatusDto::from(message.status),
        cost: message.cost,
        error_message: message.error_message.clone(),
        retry_count: message.retry_count,
        max_retries: message.max_retries,
        provider_message_id: message.provider_message_id.clone(),
        provider: message.provider.map(Into::into),
        processed_at: message.processed_at.map(|at| at.to_rfc3339()),
        sent_at: message.sent_at.map(|at| at.to_rfc3339()),
        failed_at: message.failed_at.map(|at| at.to_rfc3339()),
        cancelled_at: message.cancelled_at.map(|at| at.to_rfc3339()),
        created_at: message.created_at.to_rfc3339(),
        updated_at: message.updated_at.to_rfc3339(),
    }
}

pub fn map_estimate(estimate: CostEstimate) -> CostEstimateDto {
    CostEstimateDto {
        encoding: estimate.encoding.map(Into::into),
        segments: estimate.segments,
        domestic_recipients: estimate.domestic_recipients,
        international_recipients: estimate.international_recipients,
        recipients: estimate
            .recipients
            .into_iter()
            .map(|r| RecipientCostDto {
                address: r.address,
                destination: r.class.into(),
                cost: r.cost,
            })
            .collect(),
        total: estimate.total,
    }
}

pub fn map_delivery_status(status: DeliveryStatus) -> DeliveryStatusDto {
    DeliveryStatusDto {
        provider_message_id: status.provider_message_id,
        provider: status.provider.into(),
        state: status.state.into(),
        detail: status.detail,
    }
}

pub fn map_pass(summary: PassSummary) -> PassSummaryDto {
    PassSummaryDto {
        claimed: summary.claimed,
        sent: summary.sent,
        retrying: summary.retrying,
        failed: summary.failed,
        recovered: summary.recovered,
        errors: summary.errors,
    }
}

fn map_worker(stats: WorkerStats) -> WorkerStatsDto {
    WorkerStatsDto {
        claimed: stats.claimed,
        sent: stats.sent,
        retrying: stats.retrying,
        failed: stats.failed,
        passes: stats.passes,
        in_flight: stats.in_flight,
    }
}

pub fn map_queue_health(health: QueueHealth) -> QueueHealthDto {
    QueueHealthDto {
        enabled: health.enabled,
        pending: health.pending,
        processing: health.processing,
        failed_last_24h: health.failed_last_24h,
        worker: map_worker(health.worker),
    }
}

pub fn map_gateway_health(health: GatewayHealth) -> GatewayHealthDto {
    GatewayHealthDto {
        primary: health.primary.into(),
        backup: health.backup.into(),
    }
}

pub fn map_error(err: DomainError) -> poem::Error {
    let status = match &err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::InvalidState { .. } => StatusCode::CONFLICT,
        DomainError::ProviderUnavailable(_) | DomainError::RetryExhausted { .. } => {
            StatusCode::BAD_GATEWAY
        }
        DomainError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %err, "request failed");
    }
    poem::Error::from_string(err.to_string(), status)
}
