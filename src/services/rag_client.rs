use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::config::Settings;
use crate::core::metrics::RAG_REQUESTS;

#[derive(Debug, Error)]
pub(crate) enum RagError {
    #[error("retrieval service is disabled")]
    Disabled,
    #[error("retrieval service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("retrieval service returned status {0}")]
    Status(u16),
    #[error("retrieval service reply was not usable: {0}")]
    Decode(String),
}

impl RagError {
    fn outcome(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Transport(err) if err.is_timeout() => "timeout",
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::Decode(_) => "decode",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct HistoryTurn {
    pub(crate) role: String,
    pub(crate) content: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RagChatRequest {
    pub(crate) student_id: String,
    pub(crate) message: String,
    pub(crate) student_name: String,
    pub(crate) student_email: String,
    pub(crate) session_id: String,
    pub(crate) student_context: Value,
    pub(crate) conversation_history: Vec<HistoryTurn>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RagChatReply {
    #[serde(default)]
    pub(crate) success: bool,
    #[serde(default)]
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) query_type: Option<String>,
    #[serde(default)]
    pub(crate) mode: Option<String>,
    #[serde(default)]
    pub(crate) mode_name: Option<String>,
    #[serde(default)]
    pub(crate) model_used: Option<String>,
    #[serde(default)]
    pub(crate) data: Option<Value>,
    #[serde(default)]
    pub(crate) actions: Option<Vec<Value>>,
    #[serde(default)]
    pub(crate) follow_up_questions: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RagHealth {
    Healthy,
    Degraded(String),
    Unreachable(String),
    Disabled,
}

impl RagHealth {
    pub(crate) fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Healthy => "healthy".to_string(),
            Self::Degraded(status) => format!("degraded: {status}"),
            Self::Unreachable(error) => format!("unreachable: {error}"),
            Self::Disabled => "disabled".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    #[serde(default)]
    status: String,
}

/// Client for the external retrieval chat service. Each call is a single
/// attempt bounded by a timeout; callers fall back on any error.
#[derive(Debug, Clone)]
pub(crate) struct RagClient {
    client: Client,
    base_url: String,
    enabled: bool,
    health_timeout: Duration,
}

impl RagClient {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let rag = settings.rag();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(rag.timeout_seconds.min(5)))
            .timeout(Duration::from_secs(rag.timeout_seconds))
            .build()
            .context("Failed to build retrieval HTTP client")?;

        Ok(Self {
            client,
            base_url: rag.service_url.trim_end_matches('/').to_string(),
            enabled: rag.enabled,
            health_timeout: Duration::from_secs(rag.health_timeout_seconds),
        })
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) async fn chat(&self, request: &RagChatRequest) -> Result<RagChatReply, RagError> {
        let timer = Instant::now();
        let result = self.send_chat(request).await;
        record(&result, timer);

        match &result {
            Ok(reply) => tracing::info!(
                student_id = %request.student_id,
                query_type = reply.query_type.as_deref().unwrap_or("-"),
                duration_seconds = timer.elapsed().as_secs_f64(),
                "Retrieval service answered"
            ),
            Err(err) => tracing::warn!(
                student_id = %request.student_id,
                error = %err,
                "Retrieval service unavailable; using database fallback"
            ),
        }
        result
    }

    async fn send_chat(&self, request: &RagChatRequest) -> Result<RagChatReply, RagError> {
        if !self.enabled {
            return Err(RagError::Disabled);
        }

        let response =
            self.client.post(format!("{}/chat", self.base_url)).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RagError::Status(status.as_u16()));
        }

        let reply: RagChatReply =
            response.json().await.map_err(|err| RagError::Decode(err.to_string()))?;
        if !reply.success || reply.message.trim().is_empty() {
            return Err(RagError::Decode("reply marked unsuccessful or empty".to_string()));
        }
        Ok(reply)
    }

    pub(crate) async fn health(&self) -> RagHealth {
        if !self.enabled {
            return RagHealth::Disabled;
        }

        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(self.health_timeout)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => return RagHealth::Unreachable(err.to_string()),
        };
        if !response.status().is_success() {
            return RagHealth::Unreachable(format!("status {}", response.status().as_u16()));
        }

        match response.json::<HealthBody>().await {
            Ok(body) if body.status == "healthy" => RagHealth::Healthy,
            Ok(body) => RagHealth::Degraded(body.status),
            Err(err) => RagHealth::Degraded(err.to_string()),
        }
    }

    /// Asks the service to rebuild its knowledge base from portal data.
    pub(crate) async fn sync(&self) -> Result<Value, RagError> {
        let timer = Instant::now();
        let result = self.send_sync().await;
        record(&result, timer);
        result
    }

    async fn send_sync(&self) -> Result<Value, RagError> {
        if !self.enabled {
            return Err(RagError::Disabled);
        }

        let response = self.client.post(format!("{}/sync", self.base_url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RagError::Status(status.as_u16()));
        }
        response.json().await.map_err(|err| RagError::Decode(err.to_string()))
    }
}

fn record<T>(result: &Result<T, RagError>, timer: Instant) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(err) => err.outcome(),
    };
    metrics::counter!(RAG_REQUESTS, "outcome" => outcome).increment(1);
    tracing::debug!(outcome, elapsed_ms = timer.elapsed().as_millis() as u64, "Retrieval call finished");
}
