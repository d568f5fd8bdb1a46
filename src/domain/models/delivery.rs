use std::fmt;

use serde::{Deserialize, Serialize};

/// Which configured backend handled a send.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSlot {
    Primary,
    Backup,
}

impl ProviderSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderSlot::Primary => "primary",
            ProviderSlot::Backup => "backup",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "primary" => Some(ProviderSlot::Primary),
            "backup" => Some(ProviderSlot::Backup),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Accepted,
    Partial,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectedRecipient {
    pub address: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub status: DeliveryOutcome,
    pub provider_message_id: Option<String>,
    pub accepted_count: u32,
    pub rejected_count: u32,
    pub provider: ProviderSlot,
    pub rejected: Vec<RejectedRecipient>,
}

impl DeliveryResult {
    /// Addresses the provider took responsibility for.
    pub fn accepted_recipients<'a>(&'a self, requested: &'a [String]) -> impl Iterator<Item = &'a String> {
        requested
            .iter()
            .filter(move |address| !self.rejected.iter().any(|r| &r.address == *address))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Queued,
    Sent,
    Delivered,
    Failed,
    Unknown,
}

impl DeliveryState {
    pub fn from_provider(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "queued" | "submitted" | "buffered" | "pending" => DeliveryState::Queued,
            "sent" | "sending" => DeliveryState::Sent,
            "delivered" | "success" | "completed" => DeliveryState::Delivered,
            "failed" | "rejected" | "undelivered" | "expired" => DeliveryState::Failed,
            _ => DeliveryState::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub provider_message_id: String,
    pub provider: ProviderSlot,
    pub state: DeliveryState,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderHealth {
    Healthy,
    Unhealthy,
    Disabled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayHealth {
    pub primary: ProviderHealth,
    pub backup: ProviderHealth,
}
