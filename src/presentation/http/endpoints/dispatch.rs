use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{OpenApi, payload::Json};

use crate::presentation::http::{
    endpoints::root::{ApiState, EndpointsTags},
    mappers::{map_error, map_pass, map_queue_health},
    responses::{PassSummaryDto, QueueHealthDto},
    security::JwtAuth,
};

#[derive(Clone)]
pub struct DispatchEndpoints {
    state: Arc<ApiState>,
}

impl DispatchEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl DispatchEndpoints {
    /// Run one claim-and-dispatch pass now, even if the background loops are off.
    #[oai(path = "/dispatch/run", method = "post", tag = EndpointsTags::Dispatch)]
    pub async fn run_pass(&self, auth: JwtAuth) -> PoemResult<Json<PassSummaryDto>> {
        auth.into_user(&self.state.jwt_config)?;

        let summary = self
            .state
            .force_dispatch_usecase
            .execute()
            .await
            .map_err(map_error)?;

        Ok(Json(map_pass(summary)))
    }

    #[oai(path = "/dispatch/health", method = "get", tag = EndpointsTags::Dispatch)]
    pub async fn queue_health(&self) -> PoemResult<Json<QueueHealthDto>> {
        let health = self
            .state
            .queue_health_usecase
            .execute()
            .await
            .map_err(map_error)?;

        Ok(Json(map_queue_health(health)))
    }
}
