use secrecy::{ExposeSecret, SecretString};
use std::net::SocketAddr;
use tracing::Level;
use voicebridge_core::credential::KEY_LEN;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

const DEFAULT_API_URL: &str = "https://aigc-aiagent-api.zegotech.cn";
/// Longest token lifetime accepted from the environment (one year).
pub const MAX_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;
const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly AI assistant. Please respond concisely.";

/// LLM settings forwarded to the agent registration.
#[derive(Clone, Debug, Default)]
pub struct LlmConfig {
    pub url: Option<String>,
    pub api_key: Option<SecretString>,
    pub model: Option<String>,
    pub system_prompt: String,
}

/// TTS settings forwarded to the agent registration.
#[derive(Clone, Debug, Default)]
pub struct TtsConfig {
    pub vendor: Option<String>,
    pub app_id: Option<String>,
    pub token: Option<SecretString>,
    pub cluster: Option<String>,
    pub voice_type: Option<String>,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub app_id: u32,
    pub server_secret: SecretString,
    pub api_url: String,
    pub token_ttl_seconds: i64,
    pub agent_id: String,
    pub agent_name: String,
    pub asr_engine_model: String,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub log_level: Level,
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let app_id_str = optional("ZEGO_APP_ID")
            .ok_or_else(|| ConfigError::MissingVar("ZEGO_APP_ID".to_string()))?;
        let app_id = app_id_str
            .parse::<u32>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "ZEGO_APP_ID".to_string(),
                    format!("'{}' is not a positive integer", app_id_str),
                )
            })?;

        let server_secret = optional("ZEGO_SERVER_SECRET")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("ZEGO_SERVER_SECRET".to_string()))?;
        let secret_len = server_secret.expose_secret().len();
        if secret_len != KEY_LEN {
            return Err(ConfigError::InvalidValue(
                "ZEGO_SERVER_SECRET".to_string(),
                format!("expected {} bytes, got {}", KEY_LEN, secret_len),
            ));
        }

        let api_url = optional("ZEGO_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let ttl_str = std::env::var("TOKEN_TTL_SECONDS").unwrap_or_else(|_| "3600".to_string());
        let token_ttl_seconds = ttl_str
            .parse::<i64>()
            .ok()
            .filter(|ttl| (1..=MAX_TOKEN_TTL_SECONDS).contains(ttl))
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "TOKEN_TTL_SECONDS".to_string(),
                    format!(
                        "'{}' is not between 1 and {} seconds",
                        ttl_str, MAX_TOKEN_TTL_SECONDS
                    ),
                )
            })?;

        let agent_id = optional("ZEGO_AGENT_ID").unwrap_or_else(|| "aiAgent1".to_string());
        let agent_name = optional("ZEGO_AGENT_NAME").unwrap_or_else(|| "AI Assistant".to_string());
        let asr_engine_model =
            optional("ASR_ENGINE_MODEL").unwrap_or_else(|| "16k_en".to_string());

        let llm = LlmConfig {
            url: optional("LLM_URL"),
            api_key: optional("LLM_API_KEY").map(SecretString::from),
            model: optional("LLM_MODEL"),
            system_prompt: optional("SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        };

        let tts = TtsConfig {
            vendor: optional("TTS_VENDOR"),
            app_id: optional("TTS_APP_ID"),
            token: optional("TTS_TOKEN").map(SecretString::from),
            cluster: optional("TTS_CLUSTER"),
            voice_type: optional("TTS_VOICE_TYPE"),
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            app_id,
            server_secret,
            api_url,
            token_ttl_seconds,
            agent_id,
            agent_name,
            asr_engine_model,
            llm,
            tts,
            log_level,
        })
    }
}
