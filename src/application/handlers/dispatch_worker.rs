//! Polling loops that claim due messages and hand them to the dispatcher.
//!
//! A worker may run an interval loop and an event-driven loop at the same
//! time. Both go through the store's atomic claim, so running them together
//! only improves liveness and never duplicates a send. In-flight sends are
//! bounded by a semaphore shared by both loops.
//!
//! Each send runs in its own task. Dropping a pass part-way detaches those
//! tasks rather than aborting them, so a send the provider already accepted
//! is always recorded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Semaphore, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    application::handlers::message_dispatcher::{DispatchOutcome, MessageDispatchHandler},
    domain::{
        errors::{DomainError, DomainResult},
        events::MessageScheduledEvent,
        repositories::ScheduledMessageRepository,
    },
};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub name: String,
    /// Whether the background loops run. Manual passes are always allowed.
    pub enabled: bool,
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub max_in_flight: usize,
    /// Processing messages older than this are treated as abandoned.
    pub claim_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "dispatch".to_string(),
            enabled: true,
            poll_interval: Duration::from_secs(5),
            batch_size: 50,
            max_in_flight: 10,
            claim_timeout: Duration::from_secs(600),
        }
    }
}

/// Result of one claim-and-dispatch pass.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PassSummary {
    pub claimed: u32,
    pub sent: u32,
    pub retrying: u32,
    pub failed: u32,
    pub recovered: u32,
    pub errors: u32,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct WorkerStats {
    pub claimed: u64,
    pub sent: u64,
    pub retrying: u64,
    pub failed: u64,
    pub passes: u64,
    pub in_flight: u64,
}

#[derive(Default)]
struct Counters {
    claimed: AtomicU64,
    sent: AtomicU64,
    retrying: AtomicU64,
    failed: AtomicU64,
    passes: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: &DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Sent { .. } => &self.sent,
            DispatchOutcome::Retrying { .. } => &self.retrying,
            DispatchOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl PassSummary {
    fn add(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent { .. } => self.sent += 1,
            DispatchOutcome::Retrying { .. } => self.retrying += 1,
            DispatchOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

pub struct DispatchWorker {
    repo: Arc<dyn ScheduledMessageRepository>,
    handler: Arc<MessageDispatchHandler>,
    config: WorkerConfig,
    slots: Arc<Semaphore>,
    counters: Arc<Counters>,
}

impl DispatchWorker {
    pub fn new(
        repo: Arc<dyn ScheduledMessageRepository>,
        handler: Arc<MessageDispatchHandler>,
        config: WorkerConfig,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Self {
            repo,
            handler,
            config,
            slots,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn stats(&self) -> WorkerStats {
        let capacity = self.config.max_in_flight.max(1);
        WorkerStats {
            claimed: self.counters.claimed.load(Ordering::Relaxed),
            sent: self.counters.sent.load(Ordering::Relaxed),
            retrying: self.counters.retrying.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            passes: self.counters.passes.load(Ordering::Relaxed),
            in_flight: capacity.saturating_sub(self.slots.available_permits()) as u64,
        }
    }

    /// Recovers stale claims, then claims at most as many due messages as there
    /// are free slots and dispatches them concurrently.
    pub async fn run_once(&self) -> DomainResult<PassSummary> {
        self.counters.passes.fetch_add(1, Ordering::Relaxed);
        let mut summary = PassSummary {
            recovered: self.recover_stale().await?,
            ..PassSummary::default()
        };

        let first_slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| anyhow::anyhow!("dispatch slots closed"))?;
        let free = self.slots.available_permits() + 1;
        let limit = free.min(self.config.batch_size.max(1) as usize) as u32;

        let batch = self.repo.claim_due(Utc::now(), limit).await?;
        if batch.is_empty() {
            return Ok(summary);
        }

        summary.claimed = batch.len() as u32;
        self.counters
            .claimed
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        info!(worker = %self.config.name, claimed = summary.claimed, limit, "claimed due messages");

        let mut tasks = Vec::with_capacity(batch.len());
        let mut first_slot = Some(first_slot);
        // Nothing below awaits before every claimed message owns a task.
        for message in batch {
            let held = first_slot.take();
            let slots = self.slots.clone();
            let handler = self.handler.clone();
            let counters = self.counters.clone();
            let message_id = message.id;
            let task = tokio::spawn(async move {
                let _slot = match held {
                    Some(slot) => slot,
                    None => slots
                        .acquire_owned()
                        .await
                        .map_err(|_| anyhow::anyhow!("dispatch slots closed"))?,
                };
                let result = handler.handle(message).await;
                if let Ok(outcome) = &result {
                    counters.record(outcome);
                }
                result
            });
            tasks.push((message_id, task));
        }

        for (message_id, task) in tasks {
            match task.await {
                Ok(Ok(outcome)) => summary.add(&outcome),
                Ok(Err(err)) => {
                    summary.errors += 1;
                    error!(worker = %self.config.name, %message_id, error = %err, "dispatch failed");
                }
                Err(err) => {
                    summary.errors += 1;
                    error!(worker = %self.config.name, %message_id, error = %err, "dispatch task panicked");
                }
            }
        }

        Ok(summary)
    }

    /// Waits until every in-flight send has finished, including sends left
    /// running by a pass that was dropped.
    pub async fn drain(&self) {
        let capacity = self.config.max_in_flight.max(1) as u32;
        if self.slots.acquire_many(capacity).await.is_ok() {
            debug!(worker = %self.config.name, "in-flight sends drained");
        }
    }

    async fn recover_stale(&self) -> DomainResult<u32> {
        let Some(cutoff) = chrono::Duration::from_std(self.config.claim_timeout)
            .ok()
            .and_then(|timeout| Utc::now().checked_sub_signed(timeout))
        else {
            return Ok(0);
        };

        let mut recovered = 0;
        for message in self.repo.list_stale(cutoff, self.config.batch_size).await? {
            match self.handler.expire_claim(&message).await {
                Ok(_) => recovered += 1,
                // Finished by its original worker in the meantime.
                Err(DomainError::InvalidState { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(recovered)
    }

    async fn pass(&self, trigger: &'static str) {
        match self.run_once().await {
            Ok(summary) if summary.claimed > 0 || summary.recovered > 0 => {
                info!(worker = %self.config.name, trigger, ?summary, "dispatch pass finished");
            }
            Ok(_) => debug!(worker = %self.config.name, trigger, "nothing due"),
            Err(err) if err.is_transient() => {
                warn!(worker = %self.config.name, trigger, error = %err, "store unavailable, will retry next cycle");
            }
            Err(err) => error!(worker = %self.config.name, trigger, error = %err, "dispatch pass failed"),
        }
    }

    /// Runs a pass for an external trigger, such as a bus delivery.
    pub async fn trigger(&self, source: &'static str) {
        self.pass(source).await;
    }

    /// Fixed-interval loop. Returns `None` when the worker is disabled.
    pub fn spawn_interval(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            info!(worker = %self.config.name, "dispatch disabled, interval loop not started");
            return None;
        }

        Some(tokio::spawn(async move {
            info!(worker = %self.config.name, interval_ms = self.config.poll_interval.as_millis() as u64, "interval loop started");
            let mut ticker = tokio::time::interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.pass("interval").await,
                    _ = shutdown.changed() => break,
                }
            }
            info!(worker = %self.config.name, "interval loop stopped");
        }))
    }

    /// Runs a pass whenever a scheduled message is already due on arrival.
    /// Returns `None` when the worker is disabled.
    pub fn spawn_event_driven(
        self: Arc<Self>,
        mut events: broadcast::Receiver<MessageScheduledEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            info!(worker = %self.config.name, "dispatch disabled, event loop not started");
            return None;
        }

        Some(tokio::spawn(async move {
            info!(worker = %self.config.name, "event loop started");
            loop {
                tokio::select! {
                    received = events.recv() => match received {
                        Ok(event) if event.is_due(Utc::now()) => self.pass("event").await,
                        Ok(event) => {
                            debug!(message_id = %event.message_id, scheduled_at = %event.scheduled_at, "not due yet, leaving to interval loop");
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(worker = %self.config.name, skipped, "event loop lagged");
                            self.pass("event").await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
            info!(worker = %self.config.name, "event loop stopped");
        }))
    }
}
