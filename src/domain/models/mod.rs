pub mod billing;
pub mod delivery;
pub mod message;

pub use billing::{CostEstimate, DestinationClass, Encoding, RateCard, RecipientCost};
pub use delivery::{
    DeliveryOutcome, DeliveryResult, DeliveryState, DeliveryStatus, GatewayHealth, ProviderHealth,
    ProviderSlot, RejectedRecipient,
};
pub use message::{
    FailureDisposition, MessageKind, MessageStatus, NewScheduledMessage, QueueStats,
    ScheduledMessage,
};
