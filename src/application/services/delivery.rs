use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{
    errors::{DomainError, DomainResult},
    models::{
        DeliveryOutcome, DeliveryResult, DeliveryState, DeliveryStatus, GatewayHealth,
        MessageKind, ProviderHealth, ProviderSlot, RejectedRecipient,
    },
};

#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub kind: MessageKind,
    pub sender_id: String,
    pub recipients: Vec<String>,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderReceipt {
    pub provider_message_id: Option<String>,
    /// Recipients the provider refused; everyone else was accepted.
    pub rejected: Vec<RejectedRecipient>,
}

#[derive(Debug, Clone)]
pub struct ProviderStatusReport {
    pub state: DeliveryState,
    pub detail: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("provider returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Worth one more try against the same backend.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Timeout(_) | ProviderError::Network(_))
    }

    /// The backend, not the request, is at fault; another backend may succeed.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, ProviderError::Rejected(_))
    }
}

impl ProviderError {
    /// `timeout` is the client timeout that produced a timed-out error.
    pub fn from_reqwest(value: reqwest::Error, timeout: Duration) -> Self {
        if value.is_timeout() {
            ProviderError::Timeout(timeout)
        } else if value.is_decode() {
            ProviderError::Decode(value.to_string())
        } else if let Some(status) = value.status() {
            ProviderError::Server {
                status: status.as_u16(),
                message: value.to_string(),
            }
        } else {
            ProviderError::Network(value.to_string())
        }
    }
}

/// Capability set every delivery backend offers.
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, request: &DeliveryRequest) -> Result<ProviderReceipt, ProviderError>;
    async fn health_check(&self) -> Result<(), ProviderError>;
    async fn message_status(
        &self,
        provider_message_id: &str,
    ) -> Result<ProviderStatusReport, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub request_timeout: Duration,
    /// Extra tries per backend for timeouts and network errors.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// How long a backend marked unhealthy is skipped before it is tried first again.
    pub health_recheck: Duration,
    pub backup_enabled: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            retry_attempts: 1,
            retry_delay: Duration::from_millis(500),
            health_recheck: Duration::from_secs(60),
            backup_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SlotHealth {
    healthy: bool,
    changed_at: Instant,
}

pub struct ProviderGateway {
    primary: Arc<dyn DeliveryProvider>,
    backup: Option<Arc<dyn DeliveryProvider>>,
    config: GatewayConfig,
    health: RwLock<HashMap<ProviderSlot, SlotHealth>>,
}

impl ProviderGateway {
    pub fn new(
        primary: Arc<dyn DeliveryProvider>,
        backup: Option<Arc<dyn DeliveryProvider>>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            primary,
            backup,
            config,
            health: RwLock::new(HashMap::new()),
        }
    }

    fn provider(&self, slot: ProviderSlot) -> Option<&Arc<dyn DeliveryProvider>> {
        match slot {
            ProviderSlot::Primary => Some(&self.primary),
            ProviderSlot::Backup if self.config.backup_enabled => self.backup.as_ref(),
            ProviderSlot::Backup => None,
        }
    }

    async fn is_preferred(&self, slot: ProviderSlot) -> bool {
        match self.health.read().await.get(&slot) {
            Some(state) => state.healthy || state.changed_at.elapsed() >= self.config.health_recheck,
            None => true,
        }
    }

    async fn record(&self, slot: ProviderSlot, healthy: bool) {
        let mut health = self.health.write().await;
        let previous = health.get(&slot).map(|state| state.healthy);
        if previous == Some(healthy) && healthy {
            return;
        }
        if previous != Some(healthy) {
            info!(provider = %slot, healthy, "provider health changed");
        }
        health.insert(
            slot,
            SlotHealth {
                healthy,
                changed_at: Instant::now(),
            },
        );
    }

    /// Backends in the order a send should try them. A primary known to be down
    /// goes behind a preferred backup instead of burning the retry budget first.
    async fn route(&self) -> Vec<ProviderSlot> {
        let mut slots = vec![ProviderSlot::Primary];
        if self.provider(ProviderSlot::Backup).is_some() {
            slots.push(ProviderSlot::Backup);
            if !self.is_preferred(ProviderSlot::Primary).await
                && self.is_preferred(ProviderSlot::Backup).await
            {
                slots.swap(0, 1);
            }
        }
        slots
    }

    async fn attempt(
        &self,
        slot: ProviderSlot,
        provider: &dyn DeliveryProvider,
        request: &DeliveryRequest,
    ) -> Result<ProviderReceipt, ProviderError> {
        let mut retries = 0;
        loop {
            let outcome = match tokio::time::timeout(self.config.request_timeout, provider.send(request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Timeout(self.config.request_timeout)),
            };
            match outcome {
                Err(err) if err.is_retryable() && retries < self.config.retry_attempts => {
                    retries += 1;
                    warn!(provider = %slot, name = provider.name(), error = %err, retry = retries, "send failed, retrying");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                other => return other,
            }
        }
    }

    pub async fn send_message(
        &self,
        kind: MessageKind,
        recipients: &[String],
        content: &str,
        sender_id: &str,
    ) -> DomainResult<DeliveryResult> {
        let request = DeliveryRequest {
            kind,
            sender_id: sender_id.to_string(),
            recipients: recipients.to_vec(),
            content: content.to_string(),
        };

        let mut failures = Vec::new();
        let route = self.route().await;
        for (position, slot) in route.iter().copied().enumerate() {
            let Some(provider) = self.provider(slot) else {
                continue;
            };
            match self.attempt(slot, provider.as_ref(), &request).await {
                Ok(receipt) => match build_result(slot, &request, receipt) {
                    Ok(result) => {
                        self.record(slot, true).await;
                        debug!(provider = %slot, accepted = result.accepted_count, rejected = result.rejected_count, "send completed");
                        return Ok(result);
                    }
                    Err(err) => {
                        self.record(slot, false).await;
                        failures.push(format!("{slot}: {err}"));
                    }
                },
                Err(ProviderError::Rejected(reason)) => {
                    self.record(slot, true).await;
                    return Ok(rejected_result(slot, &request, reason));
                }
                Err(err) => {
                    self.record(slot, false).await;
                    if let Some(next) = route.get(position + 1) {
                        warn!(from = %slot, to = %next, error = %err, "provider unavailable, failing over");
                    }
                    failures.push(format!("{slot}: {err}"));
                }
            }
        }

        Err(DomainError::ProviderUnavailable(failures.join("; ")))
    }

    pub async fn health_check(&self) -> GatewayHealth {
        let primary = self.probe(ProviderSlot::Primary).await;
        let backup = self.probe(ProviderSlot::Backup).await;
        GatewayHealth { primary, backup }
    }

    async fn probe(&self, slot: ProviderSlot) -> ProviderHealth {
        let Some(provider) = self.provider(slot) else {
            return ProviderHealth::Disabled;
        };
        let healthy = matches!(
            tokio::time::timeout(self.config.request_timeout, provider.health_check()).await,
            Ok(Ok(()))
        );
        self.record(slot, healthy).await;
        if healthy {
            ProviderHealth::Healthy
        } else {
            ProviderHealth::Unhealthy
        }
    }

    pub async fn message_status(
        &self,
        slot: ProviderSlot,
        provider_message_id: &str,
    ) -> DomainResult<DeliveryStatus> {
        let provider = self.provider(slot).ok_or_else(|| {
            DomainError::ProviderUnavailable(format!("{slot} provider is not configured"))
        })?;
        let report = match tokio::time::timeout(
            self.config.request_timeout,
            provider.message_status(provider_message_id),
        )
        .await
        {
            Ok(Ok(report)) => report,
            Ok(Err(err)) => return Err(DomainError::ProviderUnavailable(format!("{slot}: {err}"))),
            Err(_) => {
                return Err(DomainError::ProviderUnavailable(format!(
                    "{slot}: {}",
                    ProviderError::Timeout(self.config.request_timeout)
                )));
            }
        };
        Ok(DeliveryStatus {
            provider_message_id: provider_message_id.to_string(),
            provider: slot,
            state: report.state,
            detail: report.detail,
        })
    }

    /// Probes both backends every `interval` so routing reacts before a send fails.
    pub fn spawn_health_probe(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let health = self.health_check().await;
                        debug!(primary = ?health.primary, backup = ?health.backup, "provider health probed");
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }
}

fn build_result(
    slot: ProviderSlot,
    request: &DeliveryRequest,
    receipt: ProviderReceipt,
) -> Result<DeliveryResult, ProviderError> {
    let mut rejected: Vec<RejectedRecipient> = Vec::new();
    for entry in receipt.rejected {
        if request.recipients.contains(&entry.address)
            && !rejected.iter().any(|r| r.address == entry.address)
        {
            rejected.push(entry);
        }
    }

    let total = request.recipients.len() as u32;
    let rejected_count = rejected.len() as u32;
    let accepted_count = total - rejected_count;
    let status = if rejected_count == 0 {
        DeliveryOutcome::Accepted
    } else if accepted_count == 0 {
        DeliveryOutcome::Rejected
    } else {
        DeliveryOutcome::Partial
    };

    if accepted_count > 0 && receipt.provider_message_id.is_none() {
        return Err(ProviderError::Decode(
            "recipients accepted without a message id".to_string(),
        ));
    }

    Ok(DeliveryResult {
        status,
        provider_message_id: receipt.provider_message_id,
        accepted_count,
        rejected_count,
        provider: slot,
        rejected,
    })
}

fn rejected_result(slot: ProviderSlot, request: &DeliveryRequest, reason: String) -> DeliveryResult {
    DeliveryResult {
        status: DeliveryOutcome::Rejected,
        provider_message_id: None,
        accepted_count: 0,
        rejected_count: request.recipients.len() as u32,
        provider: slot,
        rejected: request
            .recipients
            .iter()
            .map(|address| RejectedRecipient {
                address: address.clone(),
                reason: reason.clone(),
            })
            .collect(),
    }
}
