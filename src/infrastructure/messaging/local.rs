use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

use crate::{application::services::event_bus::MessageBus, domain::events::MessageScheduledEvent};

/// In-process bus feeding the event-driven dispatch loop.
pub struct LocalBus {
    sender: broadcast::Sender<MessageScheduledEvent>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessageScheduledEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    async fn publish(&self, event: MessageScheduledEvent) -> anyhow::Result<()> {
        // No subscriber just means the interval loop will pick the message up.
        if self.sender.send(event).is_err() {
            trace!("no event subscribers");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::domain::models::MessageKind;

    fn event() -> MessageScheduledEvent {
        MessageScheduledEvent {
            event_id: Uuid::new_v4(),
            message_id: Uuid::new_v4(),
            kind: MessageKind::Text,
            recipient_count: 1,
            scheduled_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = LocalBus::new(8);
        let mut events = bus.subscribe();
        let sent = event();
        bus.publish(sent.clone()).await.unwrap();
        assert_eq!(events.recv().await.unwrap().message_id, sent.message_id);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_succeeds() {
        let bus = LocalBus::new(8);
        assert!(bus.publish(event()).await.is_ok());
    }
}
