//! API Models
//!
//! Request and response bodies of the REST API. Field names follow the
//! browser client's camelCase JSON, and every response is wrapped in
//! [`ApiResponse`] with `code == 0` on success.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Uniform response envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            message: None,
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: -1,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Shape of a response that carries no data, used for errors and acknowledgements.
#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = -1)]
    pub code: i32,
    pub message: String,
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[schema(example = "user1700000000000")]
    #[serde(default)]
    pub user_id: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StartCallRequest {
    #[schema(example = "room1700000000000")]
    #[serde(default)]
    pub room_id: String,
    #[schema(example = "user1700000000000")]
    #[serde(default)]
    pub user_id: String,
    #[schema(example = "stream1700000000000")]
    #[serde(default)]
    pub user_stream_id: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartCallResponse {
    pub agent_instance_id: String,
    pub agent_user_id: String,
    pub agent_stream_id: String,
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StopCallRequest {
    #[serde(default)]
    pub agent_instance_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_response_serialization() {
        let response = ApiResponse::ok(TokenResponse {
            token: "04abc".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"code": 0, "data": {"token": "04abc"}})
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ApiResponse::error("userId is required");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"code": -1, "message": "userId is required"})
        );
    }

    #[test]
    fn test_start_call_request_deserialization() {
        let json = r#"{"roomId":"room1","userId":"user1","userStreamId":"stream1"}"#;
        let request: StartCallRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.room_id, "room1");
        assert_eq!(request.user_id, "user1");
        assert_eq!(request.user_stream_id, "stream1");
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let request: StartCallRequest = serde_json::from_str("{}").unwrap();
        assert!(request.room_id.is_empty());

        let request: StopCallRequest = serde_json::from_str("{}").unwrap();
        assert!(request.agent_instance_id.is_empty());
    }

    #[test]
    fn test_start_call_response_is_camel_case() {
        let response = StartCallResponse {
            agent_instance_id: "inst".to_string(),
            agent_user_id: "agent_room1".to_string(),
            agent_stream_id: "agent_stream_room1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "agentInstanceId": "inst",
                "agentUserId": "agent_room1",
                "agentStreamId": "agent_stream_room1"
            })
        );
    }
}
