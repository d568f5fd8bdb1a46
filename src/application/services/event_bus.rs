use async_trait::async_trait;

use crate::domain::events::MessageScheduledEvent;

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, event: MessageScheduledEvent) -> anyhow::Result<()>;
}
