//! Agent-Management API Client
//!
//! Every call is a `POST` to the management endpoint with the action and the
//! request signature carried as URL query parameters and the action payload as
//! a JSON body. Responses share a `{ Code, Message, Data }` envelope where any
//! non-zero `Code` is a failure.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, error, info};
use voicebridge_core::signature::RequestSigner;

use crate::config::Config;

/// Remote code returned by `RegisterAgent` when the agent id is taken.
pub const AGENT_ALREADY_REGISTERED: i64 = 410_001_008;

#[derive(Debug, thiserror::Error)]
pub enum AgentApiError {
    #[error("Agent API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Agent API error: {message} (Code: {code})")]
    Remote { code: i64, message: String },
    #[error("Agent API payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl AgentApiError {
    /// The remote error code, if the API answered with one.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// A signed, action-based interface to the agent-management API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Performs `action` with `body` and returns the `Data` field of the reply.
    async fn call(&self, action: &str, body: Value) -> Result<Value, AgentApiError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResponseEnvelope {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

/// HTTP implementation of [`AgentApi`].
#[derive(Debug)]
pub struct HttpAgentApi {
    http: reqwest::Client,
    base_url: String,
    signer: RequestSigner,
}

impl HttpAgentApi {
    pub fn new(base_url: String, signer: RequestSigner) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            signer,
        }
    }
}

#[async_trait]
impl AgentApi for HttpAgentApi {
    async fn call(&self, action: &str, body: Value) -> Result<Value, AgentApiError> {
        let query = self.signer.signed_query(action, Utc::now().timestamp());
        debug!(
            action,
            signature_nonce = %query.signature_nonce,
            timestamp = query.timestamp,
            "Calling agent API"
        );

        let envelope: ResponseEnvelope = self
            .http
            .post(&self.base_url)
            .query(&query)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if envelope.code != 0 {
            return Err(AgentApiError::Remote {
                code: envelope.code,
                message: envelope
                    .message
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }
        Ok(envelope.data)
    }
}

/// The agent definition sent with `RegisterAgent` / `UpdateAgent`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AgentRegistration {
    pub agent_id: String,
    pub name: String,
    #[serde(rename = "LLM")]
    pub llm: LlmSettings,
    #[serde(rename = "ASR")]
    pub asr: VendorSettings,
    #[serde(rename = "TTS")]
    pub tts: VendorSettings,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LlmSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub system_prompt: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct VendorSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    pub params: Value,
}

impl AgentRegistration {
    pub fn from_config(config: &Config) -> Self {
        Self {
            agent_id: config.agent_id.clone(),
            name: config.agent_name.clone(),
            llm: LlmSettings {
                url: config.llm.url.clone(),
                api_key: config
                    .llm
                    .api_key
                    .as_ref()
                    .map(|k| k.expose_secret().to_string()),
                model: config.llm.model.clone(),
                system_prompt: config.llm.system_prompt.clone(),
            },
            asr: VendorSettings {
                vendor: Some("Tencent".to_string()),
                params: json!({ "engine_model_type": config.asr_engine_model }),
            },
            tts: VendorSettings {
                vendor: config.tts.vendor.clone(),
                params: json!({
                    "app": present_fields([
                        ("appid", config.tts.app_id.clone()),
                        (
                            "token",
                            config.tts.token.as_ref().map(|t| t.expose_secret().to_string()),
                        ),
                        ("cluster", config.tts.cluster.clone()),
                    ]),
                    "audio": present_fields([("voice_type", config.tts.voice_type.clone())]),
                }),
            },
        }
    }
}

/// Builds a JSON object from the fields that are set; unset ones are left out.
fn present_fields<const N: usize>(fields: [(&str, Option<String>); N]) -> Value {
    let map: Map<String, Value> = fields
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), Value::String(v))))
        .collect();
    Value::Object(map)
}

/// Registers the agent, falling back to an update when it already exists.
pub async fn ensure_agent_registered(
    api: &dyn AgentApi,
    registration: &AgentRegistration,
) -> Result<(), AgentApiError> {
    let body = serde_json::to_value(registration)?;
    match api.call("RegisterAgent", body.clone()).await {
        Ok(_) => {
            info!(agent_id = %registration.agent_id, "Agent registered");
            Ok(())
        }
        Err(e) if e.code() == Some(AGENT_ALREADY_REGISTERED) => {
            info!(agent_id = %registration.agent_id, "Agent already registered, updating");
            if let Err(update_err) = api.call("UpdateAgent", body).await {
                error!(error = %update_err, "Failed to update agent");
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// RTC identities of the agent joining a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRoomBinding {
    pub room_id: String,
    pub agent_user_id: String,
    pub agent_stream_id: String,
    pub user_stream_id: String,
}

impl AgentRoomBinding {
    pub fn for_room(room_id: &str, user_stream_id: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            agent_user_id: format!("agent_{room_id}"),
            agent_stream_id: format!("agent_stream_{room_id}"),
            user_stream_id: user_stream_id.to_string(),
        }
    }
}

/// Creates an agent instance in `binding.room_id` and returns its id.
pub async fn create_agent_instance(
    api: &dyn AgentApi,
    agent_id: &str,
    user_id: &str,
    binding: &AgentRoomBinding,
) -> Result<String, AgentApiError> {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Created {
        agent_instance_id: String,
    }

    let body = json!({
        "AgentId": agent_id,
        "UserId": user_id,
        "RTC": {
            "RoomId": binding.room_id,
            "AgentUserId": binding.agent_user_id,
            "AgentStreamId": binding.agent_stream_id,
            "UserStreamId": binding.user_stream_id,
        },
        "MessageHistory": {
            "SyncMode": 1,
            "Messages": [],
            "WindowSize": 10,
        },
    });
    let data = api.call("CreateAgentInstance", body).await?;
    let created: Created = serde_json::from_value(data)?;
    info!(
        agent_instance_id = %created.agent_instance_id,
        room_id = %binding.room_id,
        "Agent instance created"
    );
    Ok(created.agent_instance_id)
}

pub async fn delete_agent_instance(
    api: &dyn AgentApi,
    agent_instance_id: &str,
) -> Result<(), AgentApiError> {
    api.call(
        "DeleteAgentInstance",
        json!({ "AgentInstanceId": agent_instance_id }),
    )
    .await?;
    info!(agent_instance_id, "Agent instance deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> AgentRegistration {
        AgentRegistration {
            agent_id: "aiAgent1".to_string(),
            name: "AI Assistant".to_string(),
            llm: LlmSettings {
                url: None,
                api_key: None,
                model: Some("gpt-4o".to_string()),
                system_prompt: "Be brief.".to_string(),
            },
            asr: VendorSettings {
                vendor: Some("Tencent".to_string()),
                params: json!({ "engine_model_type": "16k_en" }),
            },
            tts: VendorSettings {
                vendor: None,
                params: json!({}),
            },
        }
    }

    fn remote(code: i64) -> AgentApiError {
        AgentApiError::Remote {
            code,
            message: "failure".to_string(),
        }
    }

    #[test]
    fn test_remote_error_display_and_code() {
        let err = remote(AGENT_ALREADY_REGISTERED);
        assert_eq!(
            err.to_string(),
            "Agent API error: failure (Code: 410001008)"
        );
        assert_eq!(err.code(), Some(AGENT_ALREADY_REGISTERED));
    }

    #[test]
    fn test_registration_serialization() {
        let value = serde_json::to_value(registration()).unwrap();
        assert_eq!(value["AgentId"], "aiAgent1");
        assert_eq!(value["LLM"]["Model"], "gpt-4o");
        assert_eq!(value["LLM"]["SystemPrompt"], "Be brief.");
        assert!(value["LLM"].get("ApiKey").is_none());
        assert_eq!(value["ASR"]["Vendor"], "Tencent");
        assert_eq!(value["ASR"]["Params"]["engine_model_type"], "16k_en");
        assert!(value["TTS"].get("Vendor").is_none());
    }

    #[test]
    fn test_unset_tts_fields_are_omitted() {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            app_id: 1_234_567_890,
            server_secret: secrecy::SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
            api_url: "http://localhost:0".to_string(),
            token_ttl_seconds: 3600,
            agent_id: "aiAgent1".to_string(),
            agent_name: "AI Assistant".to_string(),
            asr_engine_model: "16k_en".to_string(),
            llm: crate::config::LlmConfig::default(),
            tts: crate::config::TtsConfig {
                cluster: Some("volcano_tts".to_string()),
                ..Default::default()
            },
            log_level: tracing::Level::INFO,
        };
        let value = serde_json::to_value(AgentRegistration::from_config(&config)).unwrap();

        assert_eq!(
            value["TTS"]["Params"],
            json!({ "app": { "cluster": "volcano_tts" }, "audio": {} })
        );
    }

    #[test]
    fn test_room_binding_names() {
        let binding = AgentRoomBinding::for_room("room42", "stream42");
        assert_eq!(binding.agent_user_id, "agent_room42");
        assert_eq!(binding.agent_stream_id, "agent_stream_room42");
        assert_eq!(binding.user_stream_id, "stream42");
    }

    #[tokio::test]
    async fn test_register_new_agent() {
        let mut api = MockAgentApi::new();
        api.expect_call()
            .withf(|action, _| action == "RegisterAgent")
            .times(1)
            .returning(|_, _| Ok(Value::Null));

        ensure_agent_registered(&api, &registration()).await.unwrap();
    }

    #[tokio::test]
    async fn test_already_registered_falls_back_to_update() {
        let mut api = MockAgentApi::new();
        api.expect_call()
            .withf(|action, _| action == "RegisterAgent")
            .times(1)
            .returning(|_, _| Err(remote(AGENT_ALREADY_REGISTERED)));
        api.expect_call()
            .withf(|action, body| action == "UpdateAgent" && body["AgentId"] == "aiAgent1")
            .times(1)
            .returning(|_, _| Ok(Value::Null));

        ensure_agent_registered(&api, &registration()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_update_is_not_fatal() {
        let mut api = MockAgentApi::new();
        api.expect_call()
            .withf(|action, _| action == "RegisterAgent")
            .returning(|_, _| Err(remote(AGENT_ALREADY_REGISTERED)));
        api.expect_call()
            .withf(|action, _| action == "UpdateAgent")
            .returning(|_, _| Err(remote(500)));

        assert!(ensure_agent_registered(&api, &registration()).await.is_ok());
    }

    #[tokio::test]
    async fn test_other_registration_errors_propagate() {
        let mut api = MockAgentApi::new();
        api.expect_call()
            .withf(|action, _| action == "RegisterAgent")
            .returning(|_, _| Err(remote(1)));

        let err = ensure_agent_registered(&api, &registration())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(1));
    }

    #[tokio::test]
    async fn test_create_agent_instance() {
        let mut api = MockAgentApi::new();
        api.expect_call()
            .withf(|action, body| {
                action == "CreateAgentInstance"
                    && body["AgentId"] == "aiAgent1"
                    && body["UserId"] == "user1"
                    && body["RTC"]["RoomId"] == "room1"
                    && body["RTC"]["AgentUserId"] == "agent_room1"
                    && body["MessageHistory"]["WindowSize"] == 10
            })
            .times(1)
            .returning(|_, _| Ok(json!({ "AgentInstanceId": "inst-1" })));

        let binding = AgentRoomBinding::for_room("room1", "stream1");
        let id = create_agent_instance(&api, "aiAgent1", "user1", &binding)
            .await
            .unwrap();
        assert_eq!(id, "inst-1");
    }

    #[tokio::test]
    async fn test_create_agent_instance_bad_payload() {
        let mut api = MockAgentApi::new();
        api.expect_call().returning(|_, _| Ok(json!({})));

        let binding = AgentRoomBinding::for_room("room1", "stream1");
        let err = create_agent_instance(&api, "aiAgent1", "user1", &binding)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentApiError::Payload(_)));
    }

    #[tokio::test]
    async fn test_delete_agent_instance() {
        let mut api = MockAgentApi::new();
        api.expect_call()
            .withf(|action, body| {
                action == "DeleteAgentInstance" && *body == json!({ "AgentInstanceId": "inst-1" })
            })
            .times(1)
            .returning(|_, _| Ok(Value::Null));

        delete_agent_instance(&api, "inst-1").await.unwrap();
    }
}
