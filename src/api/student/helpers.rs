use sqlx::Postgres;
use time::PrimitiveDateTime;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::core::time::format_primitive;
use crate::db::models::{Assessment, StudentResult};
use crate::db::types::AssessmentStatus;
use crate::repositories;
use crate::repositories::results::AttemptSummaryRow;
use crate::schemas::assessment::AssessmentResponse;
use crate::schemas::student::{LatestResult, StudentAssessmentItem, SubmitResponse};
use crate::services::availability::{self, Availability, AssessmentWindow};
use crate::services::reporting::{is_pass, percentage, Grade};
use crate::services::scoring::Score;

pub(super) const NO_QUESTIONS: &str = "This assessment has no questions yet";
pub(super) const RETAKE_RACE: &str = "Another submission for this assessment is in progress; retry";

/// Drafts are invisible to students.
pub(super) async fn load_visible_assessment(
    state: &AppState,
    assessment_id: &str,
) -> Result<Assessment, ApiError> {
    repositories::assessments::find_by_id(state.db(), assessment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load assessment"))?
        .filter(|assessment| assessment.status != AssessmentStatus::Draft)
        .ok_or_else(|| ApiError::NotFound("Assessment not found".to_string()))
}

pub(super) fn verdict(
    assessment: &Assessment,
    now: PrimitiveDateTime,
    prior_attempts: i64,
) -> Availability {
    availability::can_start(&AssessmentWindow::of(assessment), now, prior_attempts)
}

/// Turns a refusal from the availability filter into the caller-facing error.
pub(super) fn gate(verdict: Availability) -> Result<(), ApiError> {
    match verdict {
        Availability::Allowed => Ok(()),
        Availability::AlreadyAttempted => Err(ApiError::Conflict(verdict.message().to_string())),
        Availability::Inactive | Availability::NotYetOpen | Availability::Closed => {
            Err(ApiError::Forbidden(verdict.message()))
        }
    }
}

pub(super) async fn prior_attempts(
    state: &AppState,
    student_id: &str,
    assessment_id: &str,
) -> Result<i64, ApiError> {
    repositories::results::count_for_student_assessment(state.db(), student_id, assessment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))
}

pub(super) fn latest_result(summary: &AttemptSummaryRow) -> LatestResult {
    LatestResult {
        score: summary.latest_score,
        total_questions: summary.latest_total,
        percentage: percentage(summary.latest_score, summary.latest_total),
        submitted_at: format_primitive(summary.latest_submitted_at),
    }
}

pub(super) fn student_item(
    assessment: Assessment,
    question_count: i64,
    summary: Option<&AttemptSummaryRow>,
    now: PrimitiveDateTime,
) -> StudentAssessmentItem {
    let attempt_count = summary.map_or(0, |summary| summary.attempts);
    let verdict = verdict(&assessment, now, attempt_count);

    let (can_start, availability_message) = if !verdict.is_allowed() {
        (false, Some(verdict.message().to_string()))
    } else if question_count == 0 {
        (false, Some(NO_QUESTIONS.to_string()))
    } else {
        (true, None)
    };

    StudentAssessmentItem {
        assessment: AssessmentResponse::from_db(assessment, question_count),
        attempt_count,
        latest_result: summary.map(latest_result),
        can_start,
        availability: verdict.as_str().to_string(),
        availability_message,
    }
}

/// Inserts the authoritative result row. Attempt numbers are assigned inside
/// the transaction; with retakes disabled the number is always 1 so the
/// unique constraint rejects a concurrent second submit.
pub(super) async fn insert_result(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    student_id: &str,
    assessment: &Assessment,
    outcome: &Score,
    time_taken: i32,
    submitted_at: PrimitiveDateTime,
) -> Result<StudentResult, ApiError> {
    let attempt_number = if assessment.allow_multiple_attempts {
        repositories::results::next_attempt_number(tx, student_id, &assessment.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to number attempt"))?
    } else {
        1
    };

    repositories::results::insert(
        &mut **tx,
        repositories::results::CreateResult {
            student_id,
            assessment_id: &assessment.id,
            attempt_number,
            score: outcome.score,
            total_questions: outcome.total,
            time_taken,
            answers: crate::services::scoring::stored_answers(outcome),
            submitted_at,
        },
    )
    .await
    .map_err(|e| {
        ApiError::from_insert(e, duplicate_attempt_message(assessment), "Failed to store result")
    })
}

/// Detail for a unique violation on the attempt number. With retakes allowed
/// it can only come from two submits racing for the same number.
pub(super) fn duplicate_attempt_message(assessment: &Assessment) -> &'static str {
    if assessment.allow_multiple_attempts {
        RETAKE_RACE
    } else {
        Availability::AlreadyAttempted.message()
    }
}

pub(super) fn pass_status(passed: bool) -> &'static str {
    if passed {
        "pass"
    } else {
        "fail"
    }
}

pub(super) fn submit_response(
    assessment: &Assessment,
    result: &StudentResult,
    outcome: &Score,
) -> SubmitResponse {
    let percentage = percentage(result.score, result.total_questions);
    SubmitResponse {
        message: "Assessment submitted successfully".to_string(),
        result_id: result.id.clone(),
        attempt_number: result.attempt_number,
        score: result.score,
        total_questions: result.total_questions,
        percentage,
        grade: Grade::from_percentage(percentage).as_str(),
        passed: is_pass(percentage, assessment.pass_percentage),
        show_results: assessment.show_results_immediately,
        obtained_marks: Some(outcome.obtained_marks),
        total_marks: Some(outcome.total_marks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::{AssessmentStatus, DifficultyLevel};
    use time::macros::datetime;

    fn assessment(allow_multiple_attempts: bool) -> Assessment {
        Assessment {
            id: "a-1".to_string(),
            title: "Quantitative Aptitude".to_string(),
            description: None,
            category: "Aptitude".to_string(),
            difficulty: DifficultyLevel::Medium,
            duration_minutes: 30,
            total_marks: 100,
            pass_percentage: 50,
            is_active: true,
            status: AssessmentStatus::Active,
            start_date: None,
            end_date: None,
            allow_multiple_attempts,
            show_results_immediately: true,
            show_correct_answers: true,
            created_by: "admin-1".to_string(),
            created_at: datetime!(2025-01-01 09:00),
            updated_at: datetime!(2025-01-01 09:00),
        }
    }

    #[test]
    fn duplicate_attempts_read_as_retake_races_only_when_retakes_are_allowed() {
        assert_eq!(
            duplicate_attempt_message(&assessment(false)),
            "You have already completed this assessment"
        );
        assert_eq!(duplicate_attempt_message(&assessment(true)), RETAKE_RACE);
    }
}
