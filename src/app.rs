use std::sync::Arc;

use crate::{
    application::{
        handlers::{
            dispatch_worker::{DispatchWorker, WorkerConfig},
            message_dispatcher::{MessageDispatchHandler, RetryPolicy},
        },
        services::{
            cost::CostCalculator, delivery::ProviderGateway, event_bus::MessageBus,
            jwt::JwtServiceConfig,
        },
        usecases::{
            cancel_message::CancelMessageUseCase, estimate_cost::EstimateCostUseCase,
            force_dispatch::ForceDispatchUseCase, get_message::GetMessageUseCase,
            queue_health::QueueHealthUseCase, reconcile_delivery::ReconcileDeliveryUseCase,
            schedule_message::{ScheduleMessageConfig, ScheduleMessageUseCase},
        },
    },
    config::Config,
    domain::repositories::ScheduledMessageRepository,
    presentation::http::endpoints::root::ApiState,
};

#[derive(Clone)]
pub struct AppSettings {
    pub worker: WorkerConfig,
    pub retry: RetryPolicy,
    pub schedule: ScheduleMessageConfig,
    pub jwt: JwtServiceConfig,
}

impl From<&Config> for AppSettings {
    fn from(config: &Config) -> Self {
        Self {
            worker: config.worker_config(),
            retry: config.retry_policy(),
            schedule: config.schedule_config(),
            jwt: JwtServiceConfig {
                secret: config.auth.jwt_secret.clone(),
            },
        }
    }
}

/// Everything the binary runs, wired over whichever store, gateway and bus it picked.
pub struct App {
    pub repo: Arc<dyn ScheduledMessageRepository>,
    pub gateway: Arc<ProviderGateway>,
    pub worker: Arc<DispatchWorker>,
    pub api_state: Arc<ApiState>,
}

impl App {
    pub fn assemble(
        repo: Arc<dyn ScheduledMessageRepository>,
        gateway: Arc<ProviderGateway>,
        bus: Arc<dyn MessageBus>,
        calculator: CostCalculator,
        settings: AppSettings,
    ) -> Self {
        let handler = Arc::new(MessageDispatchHandler::new(
            repo.clone(),
            gateway.clone(),
            calculator.clone(),
            settings.retry,
        ));
        let worker = Arc::new(DispatchWorker::new(repo.clone(), handler, settings.worker));

        let api_state = Arc::new(ApiState {
            schedule_message_usecase: Arc::new(ScheduleMessageUseCase::new(
                repo.clone(),
                bus,
                calculator.clone(),
                settings.schedule,
            )),
            get_message_usecase: Arc::new(GetMessageUseCase::new(repo.clone())),
            cancel_message_usecase: Arc::new(CancelMessageUseCase::new(repo.clone())),
            estimate_cost_usecase: Arc::new(EstimateCostUseCase::new(calculator)),
            reconcile_delivery_usecase: Arc::new(ReconcileDeliveryUseCase::new(
                repo.clone(),
                gateway.clone(),
            )),
            force_dispatch_usecase: Arc::new(ForceDispatchUseCase::new(worker.clone())),
            queue_health_usecase: Arc::new(QueueHealthUseCase::new(repo.clone(), worker.clone())),
            gateway: gateway.clone(),
            jwt_config: settings.jwt,
        });

        Self {
            repo,
            gateway,
            worker,
            api_state,
        }
    }
}
