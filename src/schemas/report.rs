use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::db::types::DifficultyLevel;
use crate::services::reporting::Aggregate;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssessmentStats {
    pub(crate) assessment_id: String,
    pub(crate) title: String,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) pass_percentage: i32,
    pub(crate) is_active: bool,
    #[serde(flatten)]
    pub(crate) stats: Aggregate,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ReportsOverview {
    pub(crate) overall: Aggregate,
    pub(crate) grade_distribution: BTreeMap<String, i64>,
    pub(crate) students_by_status: BTreeMap<String, i64>,
    pub(crate) assessments: Vec<AssessmentStats>,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct AssessmentReportQuery {
    #[serde(default)]
    pub(crate) grade: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AttemptLine {
    pub(crate) result_id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) student_email: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) percentage: f64,
    pub(crate) grade: String,
    pub(crate) passed: bool,
    pub(crate) time_taken: i32,
    pub(crate) submitted_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssessmentReport {
    pub(crate) assessment_id: String,
    pub(crate) title: String,
    pub(crate) pass_percentage: i32,
    pub(crate) stats: Aggregate,
    pub(crate) grade_distribution: BTreeMap<String, i64>,
    pub(crate) attempts: Vec<AttemptLine>,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct StudentReportQuery {
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) min_attempts: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StudentPerformance {
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) student_email: String,
    #[serde(flatten)]
    pub(crate) stats: Aggregate,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CategoryPerformance {
    pub(crate) category: String,
    pub(crate) assessments: i64,
    #[serde(flatten)]
    pub(crate) stats: Aggregate,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct OptionPick {
    pub(crate) letter: char,
    pub(crate) text: String,
    pub(crate) picks: i64,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct QuestionAnalysis {
    pub(crate) question_id: String,
    pub(crate) question_text: String,
    pub(crate) attempts: i64,
    pub(crate) correct: i64,
    pub(crate) accuracy: f64,
    pub(crate) options: Vec<OptionPick>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct QuestionReport {
    pub(crate) assessment_id: String,
    pub(crate) title: String,
    pub(crate) results: i64,
    pub(crate) questions: Vec<QuestionAnalysis>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExportQuery {
    #[serde(default)]
    pub(crate) assessment_id: Option<String>,
}
