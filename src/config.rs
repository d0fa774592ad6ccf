use crate::error::{Result, StreamError};
use crate::streaming::ThinkingMode;
use serde::Deserialize;
use std::env;
use std::fs;

/// Connection settings for an AgentCore runtime endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub endpoint_url: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub thinking: ThinkingMode,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ClientConfig {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            agent_id: None,
            api_key: None,
            auth_token: None,
            session_id: None,
            timeout_secs: default_timeout_secs(),
            thinking: ThinkingMode::default(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let endpoint_url = env::var("AGENTCORE_ENDPOINT")
            .map_err(|_| StreamError::Config("AGENTCORE_ENDPOINT not set".to_string()))?;

        let timeout_secs = match env::var("AGENTCORE_TIMEOUT_SECS") {
            Ok(v) => v
                .parse::<u64>()
                .map_err(|e| StreamError::Config(format!("Invalid timeout value: {}", e)))?,
            Err(_) => default_timeout_secs(),
        };

        let thinking = match env::var("AGENTCORE_THINKING") {
            Ok(v) => v.parse().map_err(StreamError::Config)?,
            Err(_) => ThinkingMode::default(),
        };

        let mut config = ClientConfig {
            endpoint_url,
            timeout_secs,
            thinking,
            ..ClientConfig::new("")
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| StreamError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: ClientConfig = toml::from_str(&contents)
            .map_err(|e| StreamError::Config(format!("Failed to parse config file: {}", e)))?;

        // Secrets and session come from the environment when present
        config.apply_env_overrides();

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(agent_id) = env::var("BEDROCK_AGENT_ID") {
            self.agent_id = Some(agent_id);
        }
        if let Ok(api_key) = env::var("AWS_BEARER_TOKEN_BEDROCK") {
            self.api_key = Some(api_key);
        }
        if let Ok(token) = env::var("AGENTCORE_TOKEN") {
            self.auth_token = Some(token);
        }
        if let Ok(session_id) = env::var("AGENTCORE_SESSION_ID") {
            self.session_id = Some(session_id);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint_url.is_empty() {
            return Err(StreamError::Config("Endpoint is empty".to_string()));
        }

        if !self.endpoint_url.starts_with("http://") && !self.endpoint_url.starts_with("https://")
        {
            return Err(StreamError::Config(format!(
                "Endpoint must be an http(s) URL: {}",
                self.endpoint_url
            )));
        }

        if self.timeout_secs == 0 {
            return Err(StreamError::Config(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
