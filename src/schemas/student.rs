use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::db::types::DifficultyLevel;
use crate::schemas::assessment::AssessmentResponse;
use crate::schemas::question::StudentQuestion;
use crate::services::reporting::Aggregate;

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct StudentAssessmentsQuery {
    #[serde(default)]
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LatestResult {
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) percentage: f64,
    pub(crate) submitted_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StudentAssessmentItem {
    #[serde(flatten)]
    pub(crate) assessment: AssessmentResponse,
    pub(crate) attempt_count: i64,
    pub(crate) latest_result: Option<LatestResult>,
    pub(crate) can_start: bool,
    pub(crate) availability: String,
    pub(crate) availability_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StartResponse {
    pub(crate) attempt_id: String,
    pub(crate) assessment: AssessmentResponse,
    pub(crate) questions: Vec<StudentQuestion>,
    pub(crate) started_at: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitRequest {
    #[serde(default)]
    pub(crate) answers: HashMap<String, Value>,
    #[validate(range(min = 1, message = "time_taken must be at least 1 second"))]
    pub(crate) time_taken: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AttemptSubmitRequest {
    #[serde(default)]
    #[validate(range(min = 1, message = "time_taken must be at least 1 second"))]
    pub(crate) time_taken: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitResponse {
    pub(crate) message: String,
    pub(crate) result_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) percentage: f64,
    pub(crate) grade: &'static str,
    pub(crate) passed: bool,
    pub(crate) show_results: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) obtained_marks: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) total_marks: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultQuestion {
    pub(crate) question_id: String,
    pub(crate) question_text: String,
    pub(crate) options: Vec<String>,
    pub(crate) student_answer: Option<String>,
    pub(crate) is_correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correct_answer: Option<char>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultResponse {
    pub(crate) result_id: String,
    pub(crate) assessment_id: String,
    pub(crate) assessment_title: String,
    pub(crate) attempt_number: i32,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) percentage: f64,
    pub(crate) grade: &'static str,
    pub(crate) passed: bool,
    pub(crate) pass_percentage: i32,
    pub(crate) time_taken: i32,
    pub(crate) submitted_at: String,
    pub(crate) questions: Vec<ResultQuestion>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerUpsertRequest {
    pub(crate) question_id: String,
    #[serde(default)]
    pub(crate) answer: Value,
    #[serde(default)]
    pub(crate) time_spent: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) student_answer: Option<String>,
    pub(crate) time_spent: i32,
    pub(crate) saved_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct HistoryItem {
    pub(crate) result_id: String,
    pub(crate) assessment_id: String,
    pub(crate) assessment_title: String,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) attempt_number: i32,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) percentage: f64,
    pub(crate) grade: String,
    pub(crate) passed: bool,
    pub(crate) time_taken: i32,
    pub(crate) submitted_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct HistorySummary {
    pub(crate) total_assessments: i64,
    pub(crate) average_percentage: f64,
    pub(crate) highest_percentage: f64,
    pub(crate) total_time_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct HistoryResponse {
    pub(crate) results: Vec<HistoryItem>,
    pub(crate) summary: HistorySummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GroupStat {
    pub(crate) key: String,
    #[serde(flatten)]
    pub(crate) stats: Aggregate,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AnalyticsResponse {
    pub(crate) categories: Vec<GroupStat>,
    pub(crate) difficulties: Vec<GroupStat>,
    pub(crate) monthly: Vec<GroupStat>,
}
