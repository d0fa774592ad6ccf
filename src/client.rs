use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, Url};
use serde_json::{Map, Value, json};
use std::pin::Pin;
use std::time::Duration;
use tracing::{error, info};

use crate::config::ClientConfig;
use crate::error::{Result, StreamError};
use crate::models::AssembledMessage;
use crate::streaming::{EventStream, StreamCallbacks};

/// Raw response body of one invocation
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

const SESSION_HEADER: &str = "X-Amzn-Bedrock-AgentCore-Runtime-Session-Id";

/// Build the streaming invocation URL of an AgentCore runtime
pub fn runtime_endpoint(region: &str, agent_arn: &str) -> Result<String> {
    let mut url = Url::parse(&format!("https://bedrock-agentcore.{}.amazonaws.com", region))
        .map_err(|e| StreamError::Config(format!("Invalid region {}: {}", region, e)))?;
    url.path_segments_mut()
        .map_err(|_| StreamError::Config("Endpoint cannot carry a path".to_string()))?
        .clear()
        .push("runtimes")
        .push(agent_arn)
        .push("invocations");
    url.query_pairs_mut()
        .append_pair("qualifier", "DEFAULT")
        .append_pair("stream", "true");
    Ok(url.into())
}

/// HTTP transport for an AgentCore agent's streamed responses
pub struct AgentCoreClient {
    client: Client,
    config: ClientConfig,
}

impl AgentCoreClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Invoke the agent and decode its response as it arrives.
    ///
    /// Connection failures and error statuses surface as a single `Error`
    /// event at the head of the stream rather than as a `Result`.
    pub async fn invoke_stream(
        &self,
        prompt: &str,
        session_id: Option<&str>,
        extra: Option<Map<String, Value>>,
    ) -> EventStream<ChunkStream> {
        let session_id = session_id.or(self.config.session_id.as_deref());
        let body = self.request_body(prompt, session_id, extra);

        let chunks = match self.open(body, session_id).await {
            Ok(chunks) => chunks,
            Err(e) => {
                error!("AgentCore request failed: {}", e);
                stream::once(async move { Err(e) }).boxed()
            }
        };

        EventStream::new(chunks, self.config.thinking)
    }

    /// Invoke the agent, feeding each event to `callbacks`, and return the
    /// assembled message once the stream ends
    pub async fn invoke_with_callbacks(
        &self,
        prompt: &str,
        session_id: Option<&str>,
        callbacks: StreamCallbacks<'_>,
    ) -> Option<AssembledMessage> {
        let events = self.invoke_stream(prompt, session_id, None).await;
        callbacks.run_async(events).await
    }

    /// Whether the endpoint answers at all (any status below 500)
    pub async fn test_connection(&self) -> bool {
        let response = self
            .client
            .get(&self.config.endpoint_url)
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(response) => response.status().as_u16() < 500,
            Err(e) => {
                error!("Connection test failed: {}", e);
                false
            }
        }
    }

    fn request_body(
        &self,
        prompt: &str,
        session_id: Option<&str>,
        extra: Option<Map<String, Value>>,
    ) -> Value {
        let mut body = json!({
            "prompt": prompt,
            "stream": true,
        });
        if let Some(fields) = body.as_object_mut() {
            if let Some(session_id) = session_id {
                fields.insert("session_id".to_string(), json!(session_id));
            }
            if let Some(agent_id) = &self.config.agent_id {
                fields.insert("agent_id".to_string(), json!(agent_id));
            }
            if let Some(extra) = extra {
                fields.extend(extra);
            }
        }
        body
    }

    async fn open(&self, body: Value, session_id: Option<&str>) -> Result<ChunkStream> {
        info!(
            endpoint = %self.config.endpoint_url,
            session_id = session_id.unwrap_or("-"),
            "Invoking agent"
        );

        let mut request = self
            .client
            .post(&self.config.endpoint_url)
            .header("Accept", "application/json")
            .header("Cache-Control", "no-cache")
            .json(&body);

        if let Some(api_key) = &self.config.api_key {
            request = request.header("X-API-Key", api_key);
        }
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }
        if let Some(session_id) = session_id {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request.send().await?;
        let status = response.status();
        info!("AgentCore responded with status: {}", status);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StreamError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(StreamError::from))
            .boxed())
    }
}
