use std::sync::Arc;

use poem_openapi::{OpenApi, payload::Json};

use crate::presentation::http::{
    endpoints::root::{ApiState, EndpointsTags},
    mappers::map_gateway_health,
    responses::GatewayHealthDto,
};

#[derive(Clone)]
pub struct ProvidersEndpoints {
    state: Arc<ApiState>,
}

impl ProvidersEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl ProvidersEndpoints {
    /// Probe both delivery backends.
    #[oai(path = "/providers/health", method = "get", tag = EndpointsTags::Providers)]
    pub async fn provider_health(&self) -> Json<GatewayHealthDto> {
        Json(map_gateway_health(self.state.gateway.health_check().await))
    }
}
