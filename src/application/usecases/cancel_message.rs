use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::{
    errors::{DomainError, DomainResult},
    models::ScheduledMessage,
    repositories::ScheduledMessageRepository,
};

pub struct CancelMessageUseCase {
    repo: Arc<dyn ScheduledMessageRepository>,
}

impl CancelMessageUseCase {
    pub fn new(repo: Arc<dyn ScheduledMessageRepository>) -> Self {
        Self { repo }
    }

    /// Only pending messages can be cancelled; a claimed message is already on its way.
    pub async fn execute(&self, message_id: Uuid, owner_ref: &str) -> DomainResult<ScheduledMessage> {
        let message = self.repo.get(message_id).await?;
        if message.owner_ref != owner_ref {
            return Err(DomainError::Forbidden(
                "message does not belong to caller".into(),
            ));
        }

        let cancelled = self.repo.cancel(message_id).await?;
        info!(%message_id, "message cancelled");
        Ok(cancelled)
    }
}
