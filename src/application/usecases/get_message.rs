use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{
    errors::{DomainError, DomainResult},
    models::ScheduledMessage,
    repositories::ScheduledMessageRepository,
};

pub struct GetMessageUseCase {
    repo: Arc<dyn ScheduledMessageRepository>,
}

impl GetMessageUseCase {
    pub fn new(repo: Arc<dyn ScheduledMessageRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, message_id: Uuid, owner_ref: &str) -> DomainResult<ScheduledMessage> {
        let message = self.repo.get(message_id).await?;
        if message.owner_ref != owner_ref {
            return Err(DomainError::Forbidden(
                "message does not belong to caller".into(),
            ));
        }
        Ok(message)
    }
}
