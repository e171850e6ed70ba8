use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ChatRequest {
    #[validate(length(min = 1, max = 1000, message = "message must be 1-1000 characters"))]
    pub(crate) message: String,
    #[serde(default, alias = "sessionId")]
    #[validate(length(max = 100, message = "session_id must be at most 100 characters"))]
    pub(crate) session_id: Option<String>,
}

/// Reply shape shared by retrieval-backed and limited-mode answers.
/// `response` repeats `message` for older clients.
#[derive(Debug, Serialize)]
pub(crate) struct ChatResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
    pub(crate) response: String,
    pub(crate) mode: String,
    pub(crate) mode_name: String,
    pub(crate) query_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) model_used: Option<String>,
    pub(crate) data: Value,
    pub(crate) actions: Vec<Value>,
    pub(crate) follow_up_questions: Vec<String>,
    pub(crate) session_id: String,
    pub(crate) timestamp: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatHealthResponse {
    pub(crate) mode: &'static str,
    pub(crate) mode_name: &'static str,
    pub(crate) rag: String,
    pub(crate) database: String,
}
