use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use validator::{Validate, ValidationError};

use crate::core::time::format_primitive;
use crate::db::models::Assessment;
use crate::db::types::{AssessmentStatus, DifficultyLevel};
use crate::schemas::datetime::{deserialize_option_flexible, deserialize_patch_flexible};
use crate::schemas::question::QuestionResponse;

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_create_window))]
pub(crate) struct AssessmentCreate {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default = "default_category")]
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub(crate) category: String,
    #[serde(default = "default_difficulty")]
    pub(crate) difficulty: DifficultyLevel,
    #[serde(default = "default_duration", alias = "total_time")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
    #[serde(default = "default_total_marks")]
    #[validate(range(min = 1, message = "total_marks must be positive"))]
    pub(crate) total_marks: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 100, message = "pass_percentage must be between 0 and 100"))]
    pub(crate) pass_percentage: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_option_flexible")]
    pub(crate) start_date: Option<PrimitiveDateTime>,
    #[serde(default, deserialize_with = "deserialize_option_flexible")]
    pub(crate) end_date: Option<PrimitiveDateTime>,
    #[serde(default)]
    pub(crate) allow_multiple_attempts: bool,
    #[serde(default = "default_true")]
    pub(crate) show_results_immediately: bool,
    #[serde(default = "default_true")]
    pub(crate) show_correct_answers: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[validate(schema(function = validate_update_window))]
pub(crate) struct AssessmentUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default, alias = "total_time")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, message = "total_marks must be positive"))]
    pub(crate) total_marks: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0, max = 100, message = "pass_percentage must be between 0 and 100"))]
    pub(crate) pass_percentage: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_patch_flexible")]
    pub(crate) start_date: Option<Option<PrimitiveDateTime>>,
    #[serde(default, deserialize_with = "deserialize_patch_flexible")]
    pub(crate) end_date: Option<Option<PrimitiveDateTime>>,
    #[serde(default)]
    pub(crate) allow_multiple_attempts: Option<bool>,
    #[serde(default)]
    pub(crate) show_results_immediately: Option<bool>,
    #[serde(default)]
    pub(crate) show_correct_answers: Option<bool>,
}

fn check_window(
    start: Option<PrimitiveDateTime>,
    end: Option<PrimitiveDateTime>,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ValidationError::new("window")
            .with_message("end_date must not be before start_date".into())),
        _ => Ok(()),
    }
}

fn validate_create_window(payload: &AssessmentCreate) -> Result<(), ValidationError> {
    check_window(payload.start_date, payload.end_date)
}

fn validate_update_window(payload: &AssessmentUpdate) -> Result<(), ValidationError> {
    check_window(payload.start_date.flatten(), payload.end_date.flatten())
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    pub(crate) status: AssessmentStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LinkQuestionRequest {
    pub(crate) question_id: String,
    #[serde(default, alias = "order")]
    pub(crate) order_index: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdminAssessmentsQuery {
    #[serde(default)]
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    pub(crate) status: Option<AssessmentStatus>,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssessmentResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) duration_minutes: i32,
    pub(crate) total_marks: i32,
    pub(crate) pass_percentage: i32,
    pub(crate) is_active: bool,
    pub(crate) status: AssessmentStatus,
    pub(crate) start_date: Option<String>,
    pub(crate) end_date: Option<String>,
    pub(crate) allow_multiple_attempts: bool,
    pub(crate) show_results_immediately: bool,
    pub(crate) show_correct_answers: bool,
    pub(crate) created_by: String,
    pub(crate) question_count: i64,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl AssessmentResponse {
    pub(crate) fn from_db(assessment: Assessment, question_count: i64) -> Self {
        Self {
            id: assessment.id,
            title: assessment.title,
            description: assessment.description,
            category: assessment.category,
            difficulty: assessment.difficulty,
            duration_minutes: assessment.duration_minutes,
            total_marks: assessment.total_marks,
            pass_percentage: assessment.pass_percentage,
            is_active: assessment.is_active,
            status: assessment.status,
            start_date: assessment.start_date.map(format_primitive),
            end_date: assessment.end_date.map(format_primitive),
            allow_multiple_attempts: assessment.allow_multiple_attempts,
            show_results_immediately: assessment.show_results_immediately,
            show_correct_answers: assessment.show_correct_answers,
            created_by: assessment.created_by,
            question_count,
            created_at: format_primitive(assessment.created_at),
            updated_at: format_primitive(assessment.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AssessmentDetailResponse {
    #[serde(flatten)]
    pub(crate) assessment: AssessmentResponse,
    pub(crate) questions: Vec<QuestionResponse>,
    pub(crate) result_count: i64,
}

fn default_category() -> String {
    "General".to_string()
}

fn default_difficulty() -> DifficultyLevel {
    DifficultyLevel::Medium
}

fn default_duration() -> i32 {
    30
}

fn default_total_marks() -> i32 {
    100
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn create_defaults_and_flexible_dates() {
        let payload: AssessmentCreate = serde_json::from_value(json!({
            "title": "Aptitude Round 1",
            "start_date": "2025-03-01T09:00",
            "end_date": "2025-03-31T18:00:00Z"
        }))
        .expect("payload");

        assert_eq!(payload.category, "General");
        assert_eq!(payload.duration_minutes, 30);
        assert!(!payload.allow_multiple_attempts);
        assert!(payload.show_correct_answers);
        assert_eq!(payload.start_date, Some(datetime!(2025-03-01 09:00)));
        assert_eq!(payload.end_date, Some(datetime!(2025-03-31 18:00)));
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn inverted_window_and_bad_pass_percentage_fail_validation() {
        let inverted: AssessmentCreate = serde_json::from_value(json!({
            "title": "Backwards",
            "start_date": "2025-03-31T09:00",
            "end_date": "2025-03-01T09:00"
        }))
        .expect("payload");
        let over: AssessmentUpdate =
            serde_json::from_value(json!({ "pass_percentage": 120 })).expect("payload");

        assert!(inverted.validate().is_err());
        assert!(over.validate().is_err());
    }

    #[test]
    fn update_tells_cleared_dates_from_absent_ones() {
        let absent: AssessmentUpdate = serde_json::from_value(json!({})).expect("payload");
        let cleared: AssessmentUpdate =
            serde_json::from_value(json!({ "start_date": null, "end_date": "" })).expect("payload");
        let moved: AssessmentUpdate =
            serde_json::from_value(json!({ "end_date": "2025-04-01T10:00" })).expect("payload");

        assert_eq!(absent.start_date, None);
        assert_eq!(absent.end_date, None);
        assert_eq!(cleared.start_date, Some(None));
        assert_eq!(cleared.end_date, Some(None));
        assert_eq!(moved.start_date, None);
        assert_eq!(moved.end_date, Some(Some(datetime!(2025-04-01 10:00))));
    }
}
