use chrono::{DateTime, Utc};
use poem_openapi::Object;

use crate::presentation::models::MessageKindDto;

#[derive(Object, Debug)]
pub struct ScheduleMessageRequestDto {
    #[oai(default)]
    pub kind: MessageKindDto,
    /// Message text, voice script, or audio URL.
    #[oai(validator(min_length = 1))]
    pub content: String,
    #[oai(validator(min_length = 1, max_length = 16))]
    pub sender_id: String,
    #[oai(validator(min_items = 1))]
    pub recipients: Vec<String>,
    /// Omitted or past means as soon as possible.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub max_retries: Option<u32>,
}

#[derive(Object, Debug)]
pub struct EstimateCostRequestDto {
    #[oai(default)]
    pub kind: MessageKindDto,
    pub content: String,
    #[oai(validator(min_items = 1))]
    pub recipients: Vec<String>,
}
