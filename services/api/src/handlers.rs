//! Axum Handlers for the REST API
//!
//! Token issuance and the call lifecycle (start/stop of the agent instance).
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info};
use voicebridge_core::error::CredentialError;

use crate::{
    agent_api::{self, AgentApiError, AgentRoomBinding},
    models::{
        ApiResponse, StartCallRequest, StartCallResponse, StatusResponse, StopCallRequest,
        TokenRequest, TokenResponse,
    },
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    Upstream(AgentApiError),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message))).into_response()
            }
            ApiError::Upstream(err) => {
                error!("Agent API call failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error(err.to_string())),
                )
                    .into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error(message)),
                )
                    .into_response()
            }
        }
    }
}

impl From<AgentApiError> for ApiError {
    fn from(err: AgentApiError) -> Self {
        Self::Upstream(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Issue a room login token for a user.
#[utoipa::path(
    post,
    path = "/api/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued, wrapped in `{code: 0, data}`", body = TokenResponse),
        (status = 400, description = "Bad request", body = StatusResponse),
        (status = 500, description = "Internal server error", body = StatusResponse)
    )
)]
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    let Json(payload) = payload?;
    if payload.user_id.is_empty() {
        return Err(ApiError::BadRequest("userId is required".to_string()));
    }

    let token = state
        .token_issuer
        .issue(&payload.user_id, state.config.token_ttl_seconds)?;
    info!(user_id = %payload.user_id, "Issued room token");

    Ok(Json(ApiResponse::ok(TokenResponse { token })))
}

/// Start a call: make sure the agent exists and put an instance into the room.
#[utoipa::path(
    post,
    path = "/api/start",
    request_body = StartCallRequest,
    responses(
        (status = 200, description = "Agent instance created, wrapped in `{code: 0, data}`", body = StartCallResponse),
        (status = 400, description = "Bad request", body = StatusResponse),
        (status = 500, description = "Agent API failure", body = StatusResponse)
    )
)]
pub async fn start_call(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartCallRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<StartCallResponse>>, ApiError> {
    let Json(payload) = payload?;
    if payload.room_id.is_empty() || payload.user_id.is_empty() || payload.user_stream_id.is_empty()
    {
        return Err(ApiError::BadRequest(
            "roomId, userId, userStreamId are required".to_string(),
        ));
    }

    agent_api::ensure_agent_registered(state.agent_api.as_ref(), &state.registration).await?;

    let binding = AgentRoomBinding::for_room(&payload.room_id, &payload.user_stream_id);
    let agent_instance_id = agent_api::create_agent_instance(
        state.agent_api.as_ref(),
        &state.config.agent_id,
        &payload.user_id,
        &binding,
    )
    .await?;

    Ok(Json(ApiResponse::ok(StartCallResponse {
        agent_instance_id,
        agent_user_id: binding.agent_user_id,
        agent_stream_id: binding.agent_stream_id,
    })))
}

/// Stop a call by deleting its agent instance.
#[utoipa::path(
    post,
    path = "/api/stop",
    request_body = StopCallRequest,
    responses(
        (status = 200, description = "Call stopped", body = StatusResponse),
        (status = 400, description = "Bad request", body = StatusResponse),
        (status = 500, description = "Agent API failure", body = StatusResponse)
    )
)]
pub async fn stop_call(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StopCallRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let Json(payload) = payload?;
    if payload.agent_instance_id.is_empty() {
        return Err(ApiError::BadRequest(
            "agentInstanceId is required".to_string(),
        ));
    }

    agent_api::delete_agent_instance(state.agent_api.as_ref(), &payload.agent_instance_id).await?;

    Ok(Json(ApiResponse::message("Call stopped successfully")))
}
