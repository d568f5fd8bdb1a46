use std::sync::Arc;

use uuid::Uuid;

use crate::{
    application::services::delivery::ProviderGateway,
    domain::{
        errors::{DomainError, DomainResult},
        models::{DeliveryStatus, MessageStatus},
        repositories::ScheduledMessageRepository,
    },
};

/// Asks the backend that accepted a message how delivery went. Read-only.
pub struct ReconcileDeliveryUseCase {
    repo: Arc<dyn ScheduledMessageRepository>,
    gateway: Arc<ProviderGateway>,
}

impl ReconcileDeliveryUseCase {
    pub fn new(repo: Arc<dyn ScheduledMessageRepository>, gateway: Arc<ProviderGateway>) -> Self {
        Self { repo, gateway }
    }

    pub async fn execute(&self, message_id: Uuid, owner_ref: &str) -> DomainResult<DeliveryStatus> {
        let message = self.repo.get(message_id).await?;
        if message.owner_ref != owner_ref {
            return Err(DomainError::Forbidden(
                "message does not belong to caller".into(),
            ));
        }

        match (message.status, message.provider, message.provider_message_id.as_deref()) {
            (MessageStatus::Sent, Some(provider), Some(provider_message_id)) => {
                self.gateway
                    .message_status(provider, provider_message_id)
                    .await
            }
            (status, _, _) => Err(DomainError::invalid_state(message_id, status, "reconcile")),
        }
    }
}
