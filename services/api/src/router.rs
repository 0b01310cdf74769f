//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, the transcript WebSocket endpoint, and OpenAPI
//! documentation.

use crate::{
    handlers,
    models::{
        StartCallRequest, StartCallResponse, StatusResponse, StopCallRequest, TokenRequest,
        TokenResponse,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::issue_token,
        handlers::start_call,
        handlers::stop_call,
    ),
    components(
        schemas(TokenRequest, TokenResponse, StartCallRequest, StartCallResponse, StopCallRequest, StatusResponse)
    ),
    tags(
        (name = "Voice Bridge API", description = "Room tokens and agent call lifecycle")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/api/token", post(handlers::issue_token))
        .route("/api/start", post(handlers::start_call))
        .route("/api/stop", post(handlers::stop_call))
        .route("/ws/transcript", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
