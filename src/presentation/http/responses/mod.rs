use poem_openapi::Object;
use uuid::Uuid;

use crate::presentation::models::{
    DeliveryStateDto, DestinationClassDto, EncodingDto, MessageKindDto, MessageStatusDto,
    ProviderHealthDto, ProviderSlotDto,
};

#[derive(Object)]
pub struct ScheduleMessageResponseDto {
    pub message_id: Uuid,
    /// Estimated cost in minor currency units.
    pub cost: u64,
    pub scheduled_at: String,
}

#[derive(Object)]
pub struct ScheduledMessageDto {
    pub id: Uuid,
    pub kind: MessageKindDto,
    pub content: String,
    pub sender_id: String,
    pub recipients: Vec<String>,
    pub recipient_count: u32,
    pub scheduled_at: String,
    pub status: MessageStatusDto,
    pub cost: u64,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub provider_message_id: Option<String>,
    pub provider: Option<ProviderSlotDto>,
    pub processed_at: Option<String>,
    pub sent_at: Option<String>,
    pub failed_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Object)]
pub struct RecipientCostDto {
    pub address: String,
    pub destination: DestinationClassDto,
    pub cost: u64,
}

#[derive(Object)]
pub struct CostEstimateDto {
    pub encoding: Option<EncodingDto>,
    pub segments: u32,
    pub domestic_recipients: u32,
    pub international_recipients: u32,
    pub recipients: Vec<RecipientCostDto>,
    pub total: u64,
}

#[derive(Object)]
pub struct DeliveryStatusDto {
    pub provider_message_id: String,
    pub provider: ProviderSlotDto,
    pub state: DeliveryStateDto,
    pub detail: Option<String>,
}

#[derive(Object)]
pub struct PassSummaryDto {
    pub claimed: u32,
    pub sent: u32,
    pub retrying: u32,
    pub failed: u32,
    pub recovered: u32,
    pub errors: u32,
}

#[derive(Object)]
pub struct WorkerStatsDto {
    pub claimed: u64,
    pub sent: u64,
    pub retrying: u64,
    pub failed: u64,
    pub passes: u64,
    pub in_flight: u64,
}

#[derive(Object)]
pub struct QueueHealthDto {
    pub enabled: bool,
    pub pending: u64,
    pub processing: u64,
    pub failed_last_24h: u64,
    pub worker: WorkerStatsDto,
}

#[derive(Object)]
pub struct GatewayHealthDto {
    pub primary: ProviderHealthDto,
    pub backup: ProviderHealthDto,
}
