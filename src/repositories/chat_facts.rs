use async_trait::async_trait;
use sqlx::PgPool;

use crate::core::time::primitive_now_utc;
use crate::repositories::{assessments, results, users};
use crate::services::chat_fallback::{
    AvailableAssessment, ResultSummary, StudentFacts, StudentProfile,
};

/// [`StudentFacts`] backed by the portal database.
pub(crate) struct PgStudentFacts<'a>(pub(crate) &'a PgPool);

#[async_trait]
impl StudentFacts for PgStudentFacts<'_> {
    async fn available_assessments(
        &self,
        student_id: &str,
        category: Option<&str>,
        limit: i64,
    ) -> Result<Vec<AvailableAssessment>, sqlx::Error> {
        let rows = assessments::available_for_student(
            self.0,
            student_id,
            category,
            primitive_now_utc(),
            limit,
        )
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AvailableAssessment {
                title: row.title,
                category: row.category,
                duration_minutes: row.duration_minutes,
                difficulty: row.difficulty,
            })
            .collect())
    }

    async fn count_available(&self, student_id: &str) -> Result<i64, sqlx::Error> {
        assessments::count_available_for_student(self.0, student_id, primitive_now_utc()).await
    }

    async fn count_active(&self) -> Result<i64, sqlx::Error> {
        assessments::count_active(self.0).await
    }

    async fn results(
        &self,
        student_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ResultSummary>, sqlx::Error> {
        let rows = results::history_for_student(self.0, student_id, limit).await?;
        Ok(rows
            .into_iter()
            .map(|row| ResultSummary {
                assessment_title: row.assessment_title,
                score: row.score,
                total_questions: row.total_questions,
                time_taken: row.time_taken,
                pass_percentage: row.pass_percentage,
                submitted_at: row.submitted_at,
            })
            .collect())
    }

    async fn profile(&self, student_id: &str) -> Result<Option<StudentProfile>, sqlx::Error> {
        let user = users::find_by_id(self.0, student_id).await?;
        Ok(user.map(|user| StudentProfile {
            full_name: user.full_name,
            email: user.email,
            joined_at: user.created_at,
        }))
    }
}
