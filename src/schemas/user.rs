use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::User;
use crate::db::types::{ApprovalStatus, UserRole};
use crate::services::reporting::Aggregate;

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) status: ApprovalStatus,
    pub(crate) is_active: bool,
    pub(crate) rejection_reason: Option<String>,
    pub(crate) approved_at: Option<String>,
    pub(crate) rejected_at: Option<String>,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            status: user.status,
            is_active: user.is_active,
            rejection_reason: user.rejection_reason,
            approved_at: user.approved_at.map(format_primitive),
            rejected_at: user.rejected_at.map(format_primitive),
            created_at: format_primitive(user.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListStudentsQuery {
    #[serde(default)]
    pub(crate) status: Option<ApprovalStatus>,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentResultLine {
    pub(crate) result_id: String,
    pub(crate) assessment_id: String,
    pub(crate) assessment_title: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) percentage: f64,
    pub(crate) grade: &'static str,
    pub(crate) passed: bool,
    pub(crate) submitted_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentDetailResponse {
    pub(crate) student: UserResponse,
    pub(crate) summary: Aggregate,
    pub(crate) results: Vec<StudentResultLine>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct RejectRequest {
    #[serde(default)]
    #[validate(length(max = 500, message = "reason must be at most 500 characters"))]
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct BulkDecisionRequest {
    #[serde(alias = "studentIds")]
    #[validate(length(min = 1, message = "student_ids must not be empty"))]
    pub(crate) student_ids: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 500, message = "reason must be at most 500 characters"))]
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DecisionResponse {
    pub(crate) message: String,
    pub(crate) students: Vec<UserResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn response_hides_password_and_formats_dates() {
        let user = User {
            id: "u-1".to_string(),
            email: "asha@college.edu".to_string(),
            hashed_password: "secret-hash".to_string(),
            full_name: "Asha".to_string(),
            role: UserRole::Student,
            status: ApprovalStatus::Approved,
            is_active: true,
            rejection_reason: None,
            approved_at: Some(datetime!(2025-03-05 09:00)),
            rejected_at: None,
            created_at: datetime!(2025-03-04 07:08:09),
            updated_at: datetime!(2025-03-05 09:00),
        };

        let body = serde_json::to_value(UserResponse::from_db(user)).expect("json");
        assert_eq!(body["created_at"], "2025-03-04T07:08:09Z");
        assert_eq!(body["approved_at"], "2025-03-05T09:00:00Z");
        assert_eq!(body["status"], "approved");
        assert!(body.get("hashed_password").is_none());
    }
}
