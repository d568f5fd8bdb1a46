pub mod endpoints;
pub mod mappers;
pub mod requests;
pub mod responses;
pub mod security;

use std::sync::Arc;

use poem::Route;
use poem_openapi::OpenApiService;

use self::endpoints::{
    dispatch::DispatchEndpoints, health::HealthEndpoints, messages::MessagesEndpoints,
    providers::ProvidersEndpoints, root::ApiState,
};

pub type Endpoints = (
    HealthEndpoints,
    MessagesEndpoints,
    DispatchEndpoints,
    ProvidersEndpoints,
);

pub fn api_service(state: Arc<ApiState>, server_url: &str) -> OpenApiService<Endpoints, ()> {
    let endpoints = (
        HealthEndpoints,
        MessagesEndpoints::new(state.clone()),
        DispatchEndpoints::new(state.clone()),
        ProvidersEndpoints::new(state),
    );
    OpenApiService::new(endpoints, "Scheduled Messaging API", env!("CARGO_PKG_VERSION"))
        .server(format!("{server_url}/api"))
}

/// API under `/api`, Swagger UI at the root.
pub fn routes(state: Arc<ApiState>, server_url: &str) -> Route {
    let api_service = api_service(state, server_url);
    let ui = api_service.swagger_ui();
    Route::new().nest("/api", api_service).nest("/", ui)
}
