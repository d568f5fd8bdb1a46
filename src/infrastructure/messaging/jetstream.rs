use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::{
    self,
    consumer::{AckPolicy, PullConsumer, pull},
};
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::{
    application::{handlers::dispatch_worker::DispatchWorker, services::event_bus::MessageBus},
    domain::events::MessageScheduledEvent,
};

#[derive(Debug, Clone)]
pub struct JetstreamConfig {
    pub url: String,
    pub stream: String,
    pub subject: String,
    pub durable: String,
    pub pull_batch: usize,
    pub ack_wait_seconds: u64,
    pub max_deliver: i64,
}

pub struct JetstreamBus {
    context: jetstream::Context,
    subject: String,
}

impl JetstreamBus {
    pub async fn new(config: &JetstreamConfig) -> anyhow::Result<(Arc<Self>, JetstreamTrigger)> {
        let client = async_nats::connect(&config.url).await?;
        let context = jetstream::new(client);

        let stream = context
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects: vec![config.subject.clone()],
                ..Default::default()
            })
            .await?;

        let consumer = stream
            .get_or_create_consumer(
                &config.durable,
                pull::Config {
                    durable_name: Some(config.durable.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: Duration::from_secs(config.ack_wait_seconds),
                    max_deliver: config.max_deliver,
                    ..Default::default()
                },
            )
            .await?;

        let bus = Arc::new(Self {
            context,
            subject: config.subject.clone(),
        });

        let trigger = JetstreamTrigger {
            consumer,
            pull_batch: config.pull_batch,
        };

        Ok((bus, trigger))
    }
}

#[async_trait::async_trait]
impl MessageBus for JetstreamBus {
    async fn publish(&self, event: MessageScheduledEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&event)?;
        self.context
            .publish(self.subject.clone(), payload.into())
            .await?
            .await?;
        Ok(())
    }
}

/// Consumes scheduling events and runs a dispatch pass for those already due.
/// The store claim stays the only gate, so redelivered events are harmless.
pub struct JetstreamTrigger {
    consumer: PullConsumer,
    pull_batch: usize,
}

impl JetstreamTrigger {
    pub fn spawn(
        self,
        worker: Arc<DispatchWorker>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        if !worker.is_enabled() {
            info!(worker = worker.name(), "dispatch disabled, jetstream trigger not started");
            return None;
        }

        Some(tokio::spawn(async move {
            info!(worker = worker.name(), "jetstream trigger started");
            if let Err(err) = self.run(&worker, &mut shutdown).await {
                error!(error = %err, "jetstream trigger failed");
            }
            info!(worker = worker.name(), "jetstream trigger stopped");
        }))
    }

    /// Shutdown is only observed while waiting for events, never while a
    /// triggered pass is running.
    async fn run(&self, worker: &DispatchWorker, shutdown: &mut watch::Receiver<bool>) -> anyhow::Result<()> {
        loop {
            let mut batch = tokio::select! {
                batch = self.consumer.batch().max_messages(self.pull_batch).messages() => batch?,
                _ = shutdown.changed() => return Ok(()),
            };
            loop {
                let next = tokio::select! {
                    next = batch.next() => next,
                    _ = shutdown.changed() => return Ok(()),
                };
                match next {
                    Some(Ok(msg)) => {
                        if let Err(err) = Self::process_message(msg, worker).await {
                            warn!(error = %err, "failed to process scheduling event");
                        }
                    }
                    Some(Err(err)) => warn!(error = %err, "jetstream batch error"),
                    None => break,
                }
            }
        }
    }

    async fn process_message(message: jetstream::Message, worker: &DispatchWorker) -> anyhow::Result<()> {
        match serde_json::from_slice::<MessageScheduledEvent>(&message.payload) {
            Ok(event) if event.is_due(Utc::now()) => worker.trigger("jetstream").await,
            Ok(event) => {
                debug!(message_id = %event.message_id, scheduled_at = %event.scheduled_at, "not due yet, leaving to interval loop");
            }
            Err(err) => warn!(error = %err, "dropping malformed scheduling event"),
        }
        message
            .ack()
            .await
            .map_err(|e| anyhow::anyhow!("failed to ack message: {e}"))
    }
}
