#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use scheduled_messaging::{
    app::{App, AppSettings},
    application::{
        handlers::{dispatch_worker::WorkerConfig, message_dispatcher::RetryPolicy},
        services::{
            cost::CostCalculator,
            delivery::{
                DeliveryProvider, DeliveryRequest, GatewayConfig, ProviderError, ProviderGateway,
                ProviderReceipt, ProviderStatusReport,
            },
            jwt::JwtServiceConfig,
        },
        usecases::schedule_message::ScheduleMessageConfig,
    },
    domain::models::{DeliveryState, MessageKind, NewScheduledMessage, RateCard, RejectedRecipient},
    infrastructure::{messaging::LocalBus, repositories::InMemoryScheduledMessageRepository},
};

pub const JWT_SECRET: &str = "test-secret";
pub const OWNER: &str = "account-1";

/// What a scripted provider does on one `send` call.
#[derive(Debug, Clone)]
pub enum Step {
    Accept,
    /// Accept everyone except these addresses.
    RejectSome(Vec<String>),
    Timeout,
    Network,
    ServerError,
    Rejected,
    /// Never answer; only the gateway timeout ends the call.
    Hang,
    /// Accept after a delay.
    Slow(Duration),
}

pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Step>>,
    fallback: Mutex<Step>,
    sends: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    healthy: AtomicBool,
}

/// Counts a `send` as active until it returns or is dropped.
struct ActiveSend<'a>(&'a AtomicUsize);

impl Drop for ActiveSend<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Step::Accept),
            sends: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            healthy: AtomicBool::new(true),
        })
    }

    /// Steps consumed one per call before the fallback takes over.
    pub fn script(&self, steps: impl IntoIterator<Item = Step>) {
        self.script.lock().unwrap().extend(steps);
    }

    /// Behaviour once the script is exhausted.
    pub fn always(&self, step: Step) {
        *self.fallback.lock().unwrap() = step;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Sends running right now.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Most sends ever running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        match self.script.lock().unwrap().pop_front() {
            Some(step) => step,
            None => self.fallback.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl DeliveryProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: &DeliveryRequest) -> Result<ProviderReceipt, ProviderError> {
        let call = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);
        let _active = ActiveSend(&self.active);
        match self.next_step() {
            Step::Accept => Ok(ProviderReceipt {
                provider_message_id: Some(format!("{}-{call}", self.name)),
                rejected: Vec::new(),
            }),
            Step::RejectSome(addresses) => {
                let rejected: Vec<RejectedRecipient> = addresses
                    .into_iter()
                    .map(|address| RejectedRecipient {
                        address,
                        reason: "invalid destination".to_string(),
                    })
                    .collect();
                let accepted_any = request
                    .recipients
                    .iter()
                    .any(|r| !rejected.iter().any(|x| &x.address == r));
                Ok(ProviderReceipt {
                    provider_message_id: accepted_any.then(|| format!("{}-{call}", self.name)),
                    rejected,
                })
            }
            Step::Timeout => Err(ProviderError::Timeout(Duration::from_millis(1))),
            Step::Network => Err(ProviderError::Network("connection reset".to_string())),
            Step::ServerError => Err(ProviderError::Server {
                status: 503,
                message: "maintenance".to_string(),
            }),
            Step::Rejected => Err(ProviderError::Rejected("sender id not registered".to_string())),
            Step::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(ProviderReceipt {
                    provider_message_id: Some(format!("{}-{call}", self.name)),
                    rejected: Vec::new(),
                })
            }
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Network("unreachable".to_string()))
            }
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProviderError::Network("health endpoint unreachable".to_string()))
        }
    }

    async fn message_status(&self, _provider_message_id: &str) -> Result<ProviderStatusReport, ProviderError> {
        Ok(ProviderStatusReport {
            state: DeliveryState::Delivered,
            detail: Some(format!("{} confirmed", self.name)),
        })
    }
}

pub fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        request_timeout: Duration::from_millis(200),
        retry_attempts: 1,
        retry_delay: Duration::ZERO,
        health_recheck: Duration::from_secs(60),
        backup_enabled: true,
    }
}

pub fn gateway(
    primary: &Arc<ScriptedProvider>,
    backup: Option<&Arc<ScriptedProvider>>,
    config: GatewayConfig,
) -> Arc<ProviderGateway> {
    Arc::new(ProviderGateway::new(
        primary.clone(),
        backup.map(|b| b.clone() as Arc<dyn DeliveryProvider>),
        config,
    ))
}

pub fn calculator() -> CostCalculator {
    CostCalculator::new(RateCard::default(), "+254")
}

pub fn domestic(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("+2547000000{i:02}")).collect()
}

pub fn new_message(recipients: Vec<String>, scheduled_at: DateTime<Utc>, max_retries: u32) -> NewScheduledMessage {
    NewScheduledMessage {
        owner_ref: OWNER.to_string(),
        kind: MessageKind::Text,
        content: "Your appointment is tomorrow at 10:00".to_string(),
        sender_id: "CLINIC".to_string(),
        recipients,
        scheduled_at,
        max_retries,
        cost: 0,
    }
}

pub struct Harness {
    pub repo: Arc<InMemoryScheduledMessageRepository>,
    pub primary: Arc<ScriptedProvider>,
    pub backup: Arc<ScriptedProvider>,
    pub bus: Arc<LocalBus>,
    pub app: App,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_worker(WorkerConfig {
            poll_interval: Duration::from_millis(20),
            ..WorkerConfig::default()
        })
    }

    pub fn with_worker(worker: WorkerConfig) -> Self {
        let repo = Arc::new(InMemoryScheduledMessageRepository::new());
        let primary = ScriptedProvider::new("primary");
        let backup = ScriptedProvider::new("backup");
        let bus = LocalBus::new(64);
        let app = App::assemble(
            repo.clone(),
            gateway(&primary, Some(&backup), gateway_config()),
            bus.clone(),
            calculator(),
            AppSettings {
                worker,
                retry: RetryPolicy {
                    base_delay: Duration::ZERO,
                    max_delay: Duration::ZERO,
                },
                schedule: ScheduleMessageConfig::default(),
                jwt: JwtServiceConfig {
                    secret: JWT_SECRET.to_string(),
                },
            },
        );
        Self {
            repo,
            primary,
            backup,
            bus,
            app,
        }
    }
}
