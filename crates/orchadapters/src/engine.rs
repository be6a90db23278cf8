use async_trait::async_trait;
use orchcore::{BoundPolicy, EngineError, EngineVerdict, PolicyInvoker};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how to reach the rule-evaluation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Full URL policies are POSTed to
    pub address: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:3000".to_string(),
            timeout_ms: 30_000,
            user_agent: "Policy Orchestrator".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Policy invoker speaking JSON over HTTP POST
pub struct HttpPolicyInvoker {
    client: reqwest::Client,
    config: EngineConfig,
}

impl HttpPolicyInvoker {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| EngineError::Transport {
                endpoint: config.address.clone(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn transport_error(&self, e: reqwest::Error) -> EngineError {
        EngineError::Transport {
            endpoint: self.config.address.clone(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl PolicyInvoker for HttpPolicyInvoker {
    async fn invoke(&self, policy: &BoundPolicy) -> Result<EngineVerdict, EngineError> {
        tracing::debug!(
            endpoint = %self.config.address,
            policy = policy.id.as_deref().unwrap_or("<unsaved>"),
            "POST policy to engine"
        );

        let response = self
            .client
            .post(&self.config.address)
            .header(CONTENT_TYPE, "application/json")
            .json(policy)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Engine rejected policy");
            return Err(EngineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // An empty or `null` body is a failure, never a default verdict.
        serde_json::from_str(&body).map_err(|e| EngineError::Decode(e.to_string()))
    }
}
