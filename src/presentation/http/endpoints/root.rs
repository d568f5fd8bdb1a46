use std::sync::Arc;

use poem_openapi::Tags;

use crate::application::{
    services::{delivery::ProviderGateway, jwt::JwtServiceConfig},
    usecases::{
        cancel_message::CancelMessageUseCase, estimate_cost::EstimateCostUseCase,
        force_dispatch::ForceDispatchUseCase, get_message::GetMessageUseCase,
        queue_health::QueueHealthUseCase, reconcile_delivery::ReconcileDeliveryUseCase,
        schedule_message::ScheduleMessageUseCase,
    },
};

#[derive(Clone)]
pub struct ApiState {
    pub schedule_message_usecase: Arc<ScheduleMessageUseCase>,
    pub get_message_usecase: Arc<GetMessageUseCase>,
    pub cancel_message_usecase: Arc<CancelMessageUseCase>,
    pub estimate_cost_usecase: Arc<EstimateCostUseCase>,
    pub reconcile_delivery_usecase: Arc<ReconcileDeliveryUseCase>,
    pub force_dispatch_usecase: Arc<ForceDispatchUseCase>,
    pub queue_health_usecase: Arc<QueueHealthUseCase>,
    pub gateway: Arc<ProviderGateway>,
    pub jwt_config: JwtServiceConfig,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Messages,
    Dispatch,
    Providers,
}
