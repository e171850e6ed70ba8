use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    ApprovalStatus, AssessmentStatus, AttemptStatus, DifficultyLevel, UserRole,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) status: ApprovalStatus,
    pub(crate) is_active: bool,
    pub(crate) rejection_reason: Option<String>,
    pub(crate) approved_at: Option<PrimitiveDateTime>,
    pub(crate) rejected_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Category {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

/// Raw question row. Options and the answer key may be stored in either of two
/// shapes; `services::answer_key` reconciles them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) question_text: String,
    pub(crate) options: Option<Json<Vec<String>>>,
    pub(crate) option_a: Option<String>,
    pub(crate) option_b: Option<String>,
    pub(crate) option_c: Option<String>,
    pub(crate) option_d: Option<String>,
    pub(crate) correct_answer: Option<String>,
    pub(crate) correct_option: Option<i32>,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) marks: i32,
    pub(crate) time_per_question: i32,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Assessment {
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
    pub(crate) start_date: Option<PrimitiveDateTime>,
    pub(crate) end_date: Option<PrimitiveDateTime>,
    pub(crate) allow_multiple_attempts: bool,
    pub(crate) show_results_immediately: bool,
    pub(crate) show_correct_answers: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// A question as linked to an assessment, in display order.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct LinkedQuestion {
    #[sqlx(flatten)]
    pub(crate) question: Question,
    pub(crate) order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StudentResult {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) assessment_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) time_taken: i32,
    pub(crate) answers: Json<HashMap<String, String>>,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StudentAssessment {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) assessment_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) total_marks: i32,
    pub(crate) obtained_marks: i32,
    pub(crate) percentage: f64,
    pub(crate) pass_status: Option<String>,
    pub(crate) time_taken: i32,
    pub(crate) result_id: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StudentAnswer {
    pub(crate) id: String,
    pub(crate) student_assessment_id: String,
    pub(crate) question_id: String,
    pub(crate) student_answer: Option<String>,
    pub(crate) is_correct: bool,
    pub(crate) marks_obtained: i32,
    pub(crate) time_spent: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ChatMessage {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) session_id: String,
    pub(crate) message: String,
    pub(crate) reply: String,
    pub(crate) mode: String,
    pub(crate) query_type: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}
