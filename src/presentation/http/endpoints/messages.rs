use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{ApiResponse, OpenApi, param::Path, payload::Json};
use uuid::Uuid;

use crate::{
    application::usecases::schedule_message::ScheduleMessageRequest,
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags},
        mappers::{map_delivery_status, map_error, map_estimate, map_message},
        requests::{EstimateCostRequestDto, ScheduleMessageRequestDto},
        responses::{
            CostEstimateDto, DeliveryStatusDto, ScheduleMessageResponseDto, ScheduledMessageDto,
        },
        security::JwtAuth,
    },
};

#[derive(ApiResponse)]
pub enum ScheduleMessageResponse {
    #[oai(status = 201)]
    Created(Json<ScheduleMessageResponseDto>),
}

#[derive(Clone)]
pub struct MessagesEndpoints {
    state: Arc<ApiState>,
}

impl MessagesEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl MessagesEndpoints {
    /// Schedule a message for one or more recipients.
    #[oai(path = "/messages", method = "post", tag = EndpointsTags::Messages)]
    pub async fn schedule_message(
        &self,
        auth: JwtAuth,
        request: Json<ScheduleMessageRequestDto>,
    ) -> PoemResult<ScheduleMessageResponse> {
        let user = auth.into_user(&self.state.jwt_config)?;
        let request = request.0;
        let payload = ScheduleMessageRequest {
            owner_ref: user.owner_ref,
            kind: request.kind.into(),
            content: request.content,
            sender_id: request.sender_id,
            recipients: request.recipients,
            scheduled_at: request.scheduled_at,
            max_retries: request.max_retries,
        };

        let response = self
            .state
            .schedule_message_usecase
            .execute(payload)
            .await
            .map_err(map_error)?;

        Ok(ScheduleMessageResponse::Created(Json(
            ScheduleMessageResponseDto {
                message_id: response.message_id,
                cost: response.cost,
                scheduled_at: response.scheduled_at.to_rfc3339(),
            },
        )))
    }

    /// Price a message without scheduling it.
    #[oai(path = "/messages/estimate", method = "post", tag = EndpointsTags::Messages)]
    pub async fn estimate_cost(
        &self,
        auth: JwtAuth,
        request: Json<EstimateCostRequestDto>,
    ) -> PoemResult<Json<CostEstimateDto>> {
        auth.into_user(&self.state.jwt_config)?;

        let estimate = self
            .state
            .estimate_cost_usecase
            .execute(request.kind.into(), &request.content, &request.recipients)
            .map_err(map_error)?;

        Ok(Json(map_estimate(estimate)))
    }

    #[oai(path = "/messages/:message_id", method = "get", tag = EndpointsTags::Messages)]
    pub async fn get_message(
        &self,
        auth: JwtAuth,
        message_id: Path<Uuid>,
    ) -> PoemResult<Json<ScheduledMessageDto>> {
        let user = auth.into_user(&self.state.jwt_config)?;

        let message = self
            .state
            .get_message_usecase
            .execute(message_id.0, &user.owner_ref)
            .await
            .map_err(map_error)?;

        Ok(Json(map_message(&message)))
    }

    /// Cancel a message that has not been picked up yet.
    #[oai(
        path = "/messages/:message_id/cancel",
        method = "post",
        tag = EndpointsTags::Messages,
    )]
    pub async fn cancel_message(
        &self,
        auth: JwtAuth,
        message_id: Path<Uuid>,
    ) -> PoemResult<Json<ScheduledMessageDto>> {
        let user = auth.into_user(&self.state.jwt_config)?;

        let message = self
            .state
            .cancel_message_usecase
            .execute(message_id.0, &user.owner_ref)
            .await
            .map_err(map_error)?;

        Ok(Json(map_message(&message)))
    }

    /// Ask the provider that accepted a sent message for its delivery state.
    #[oai(
        path = "/messages/:message_id/delivery",
        method = "get",
        tag = EndpointsTags::Messages,
    )]
    pub async fn delivery_status(
        &self,
        auth: JwtAuth,
        message_id: Path<Uuid>,
    ) -> PoemResult<Json<DeliveryStatusDto>> {
        let user = auth.into_user(&self.state.jwt_config)?;

        let status = self
            .state
            .reconcile_delivery_usecase
            .execute(message_id.0, &user.owner_ref)
            .await
            .map_err(map_error)?;

        Ok(Json(map_delivery_status(status)))
    }
}
