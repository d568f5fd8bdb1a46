use poem_openapi::Enum;

use crate::domain::models::{
    DeliveryState, DestinationClass, Encoding, MessageKind, MessageStatus, ProviderHealth,
    ProviderSlot,
};

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum MessageKindDto {
    #[oai(rename = "text")]
    Text,
    #[oai(rename = "voice")]
    Voice,
    #[oai(rename = "audio")]
    Audio,
}

impl Default for MessageKindDto {
    fn default() -> Self {
        MessageKindDto::Text
    }
}

impl From<MessageKindDto> for MessageKind {
    fn from(value: MessageKindDto) -> Self {
        match value {
            MessageKindDto::Text => MessageKind::Text,
            MessageKindDto::Voice => MessageKind::Voice,
            MessageKindDto::Audio => MessageKind::Audio,
        }
    }
}

impl From<MessageKind> for MessageKindDto {
    fn from(value: MessageKind) -> Self {
        match value {
            MessageKind::Text => MessageKindDto::Text,
            MessageKind::Voice => MessageKindDto::Voice,
            MessageKind::Audio => MessageKindDto::Audio,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum MessageStatusDto {
    #[oai(rename = "pending")]
    Pending,
    #[oai(rename = "processing")]
    Processing,
    #[oai(rename = "sent")]
    Sent,
    #[oai(rename = "failed")]
    Failed,
    #[oai(rename = "cancelled")]
    Cancelled,
}

impl From<MessageStatus> for MessageStatusDto {
    fn from(value: MessageStatus) -> Self {
        match value {
            MessageStatus::Pending => MessageStatusDto::Pending,
            MessageStatus::Processing => MessageStatusDto::Processing,
            MessageStatus::Sent => MessageStatusDto::Sent,
            MessageStatus::Failed => MessageStatusDto::Failed,
            MessageStatus::Cancelled => MessageStatusDto::Cancelled,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProviderSlotDto {
    #[oai(rename = "primary")]
    Primary,
    #[oai(rename = "backup")]
    Backup,
}

impl From<ProviderSlot> for ProviderSlotDto {
    fn from(value: ProviderSlot) -> Self {
        match value {
            ProviderSlot::Primary => ProviderSlotDto::Primary,
            ProviderSlot::Backup => ProviderSlotDto::Backup,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeliveryStateDto {
    #[oai(rename = "queued")]
    Queued,
    #[oai(rename = "sent")]
    Sent,
    #[oai(rename = "delivered")]
    Delivered,
    #[oai(rename = "failed")]
    Failed,
    #[oai(rename = "unknown")]
    Unknown,
}

impl From<DeliveryState> for DeliveryStateDto {
    fn from(value: DeliveryState) -> Self {
        match value {
            DeliveryState::Queued => DeliveryStateDto::Queued,
            DeliveryState::Sent => DeliveryStateDto::Sent,
            DeliveryState::Delivered => DeliveryStateDto::Delivered,
            DeliveryState::Failed => DeliveryStateDto::Failed,
            DeliveryState::Unknown => DeliveryStateDto::Unknown,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProviderHealthDto {
    #[oai(rename = "healthy")]
    Healthy,
    #[oai(rename = "unhealthy")]
    Unhealthy,
    #[oai(rename = "disabled")]
    Disabled,
}

impl From<ProviderHealth> for ProviderHealthDto {
    fn from(value: ProviderHealth) -> Self {
        match value {
            ProviderHealth::Healthy => ProviderHealthDto::Healthy,
            ProviderHealth::Unhealthy => ProviderHealthDto::Unhealthy,
            ProviderHealth::Disabled => ProviderHealthDto::Disabled,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum EncodingDto {
    /// GSM 03.38.
    #[oai(rename = "gsm7")]
    Narrow,
    /// UCS-2.
    #[oai(rename = "ucs2")]
    Wide,
}

impl From<Encoding> for EncodingDto {
    fn from(value: Encoding) -> Self {
        match value {
            Encoding::Narrow => EncodingDto::Narrow,
            Encoding::Wide => EncodingDto::Wide,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum DestinationClassDto {
    #[oai(rename = "domestic")]
    Domestic,
    #[oai(rename = "international")]
    International,
}

impl From<DestinationClass> for DestinationClassDto {
    fn from(value: DestinationClass) -> Self {
        match value {
            DestinationClass::Domestic => DestinationClassDto::Domestic,
            DestinationClass::International => DestinationClassDto::International,
        }
    }
}
