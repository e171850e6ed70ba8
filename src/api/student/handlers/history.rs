use axum::extract::State;
use axum::Json;
use serde_json::json;
use time::PrimitiveDateTime;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, month_key, primitive_now_utc};
use crate::repositories;
use crate::repositories::results::HistoryRow;
use crate::schemas::student::{
    AnalyticsResponse, GroupStat, HistoryItem, HistoryResponse, HistorySummary,
};
use crate::services::cache::{self, CacheTag};
use crate::services::reporting::{self, is_pass, percentage, round2, Grade, Sample};

const TREND_MONTHS: i32 = 6;

fn sample(row: &HistoryRow) -> Sample {
    Sample::new(row.score, row.total_questions, row.time_taken, row.pass_percentage)
}

async fn load_history(state: &AppState, student_id: &str) -> Result<Vec<HistoryRow>, ApiError> {
    repositories::results::history_for_student(state.db(), student_id, None)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load history"))
}

pub(in crate::api::student) async fn history(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let tags = [CacheTag::Student(student.id.clone())];
    let response = cache::get_or_load(
        &state,
        "student_history",
        &json!({ "student_id": student.id }),
        &tags,
        || async {
            let rows = load_history(&state, &student.id).await?;
            Ok::<_, ApiError>(build_history(&rows))
        },
    )
    .await?;

    Ok(Json(response))
}

fn build_history(rows: &[HistoryRow]) -> HistoryResponse {
    let results: Vec<HistoryItem> = rows
        .iter()
        .map(|row| {
            let row_percentage = percentage(row.score, row.total_questions);
            HistoryItem {
                result_id: row.id.clone(),
                assessment_id: row.assessment_id.clone(),
                assessment_title: row.assessment_title.clone(),
                category: row.category.clone(),
                difficulty: row.difficulty,
                attempt_number: row.attempt_number,
                score: row.score,
                total_questions: row.total_questions,
                percentage: row_percentage,
                grade: Grade::from_percentage(row_percentage).as_str().to_string(),
                passed: is_pass(row_percentage, row.pass_percentage),
                time_taken: row.time_taken,
                submitted_at: format_primitive(row.submitted_at),
            }
        })
        .collect();

    let summary = if results.is_empty() {
        HistorySummary::default()
    } else {
        let count = results.len() as f64;
        HistorySummary {
            total_assessments: results.len() as i64,
            average_percentage: round2(results.iter().map(|item| item.percentage).sum::<f64>() / count),
            highest_percentage: results.iter().map(|item| item.percentage).fold(0.0, f64::max),
            total_time_seconds: results.iter().map(|item| i64::from(item.time_taken)).sum(),
        }
    };

    HistoryResponse { results, summary }
}

pub(in crate::api::student) async fn analytics(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let tags = [CacheTag::Student(student.id.clone())];
    let now = primitive_now_utc();
    let response = cache::get_or_load(
        &state,
        "student_analytics",
        &json!({ "student_id": student.id, "month": month_key(now) }),
        &tags,
        || async {
            let rows = load_history(&state, &student.id).await?;
            Ok::<_, ApiError>(build_analytics(&rows, now))
        },
    )
    .await?;

    Ok(Json(response))
}

fn build_analytics(rows: &[HistoryRow], now: PrimitiveDateTime) -> AnalyticsResponse {
    let to_stats = |groups: std::collections::BTreeMap<String, reporting::Aggregate>| {
        groups.into_iter().map(|(key, stats)| GroupStat { key, stats }).collect::<Vec<_>>()
    };

    let first_month = trend_start(now);
    let recent: Vec<HistoryRow> = rows
        .iter()
        .filter(|row| month_key(row.submitted_at) >= first_month)
        .cloned()
        .collect();

    AnalyticsResponse {
        categories: to_stats(reporting::group_by(rows, |row| row.category.clone(), sample)),
        difficulties: to_stats(reporting::group_by(
            rows,
            |row| row.difficulty.as_str().to_string(),
            sample,
        )),
        monthly: to_stats(reporting::group_by(&recent, |row| month_key(row.submitted_at), sample)),
    }
}

/// `YYYY-MM` of the oldest month in the trend window, current month included.
fn trend_start(now: PrimitiveDateTime) -> String {
    let months = now.year() * 12 + i32::from(u8::from(now.month())) - 1 - (TREND_MONTHS - 1);
    format!("{:04}-{:02}", months / 12, months % 12 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::DifficultyLevel;
    use time::macros::datetime;

    fn row(category: &str, score: i32, submitted_at: PrimitiveDateTime) -> HistoryRow {
        HistoryRow {
            id: format!("r-{category}-{score}"),
            assessment_id: "a-1".to_string(),
            assessment_title: "Aptitude Round".to_string(),
            category: category.to_string(),
            difficulty: DifficultyLevel::Medium,
            pass_percentage: 50,
            attempt_number: 1,
            score,
            total_questions: 4,
            time_taken: 120,
            submitted_at,
        }
    }

    #[test]
    fn trend_window_spans_six_months_across_year_boundary() {
        assert_eq!(trend_start(datetime!(2025-03-15 10:00)), "2024-10");
        assert_eq!(trend_start(datetime!(2025-12-01 00:00)), "2025-07");
    }

    #[test]
    fn history_summary_uses_percentages() {
        let rows = vec![
            row("Aptitude", 3, datetime!(2025-03-02 10:00)),
            row("Technical", 1, datetime!(2025-03-01 10:00)),
        ];
        let history = build_history(&rows);

        assert_eq!(history.summary.total_assessments, 2);
        assert_eq!(history.summary.average_percentage, 50.0);
        assert_eq!(history.summary.highest_percentage, 75.0);
        assert_eq!(history.summary.total_time_seconds, 240);
        assert_eq!(history.results[0].grade, "C");
        assert!(history.results[0].passed);
        assert!(!history.results[1].passed);
    }

    #[test]
    fn analytics_drops_months_outside_window() {
        let rows = vec![
            row("Aptitude", 4, datetime!(2025-03-02 10:00)),
            row("Aptitude", 2, datetime!(2024-01-05 10:00)),
        ];
        let analytics = build_analytics(&rows, datetime!(2025-03-20 10:00));

        assert_eq!(analytics.categories.len(), 1);
        assert_eq!(analytics.categories[0].stats.attempts, 2);
        assert_eq!(analytics.monthly.len(), 1);
        assert_eq!(analytics.monthly[0].key, "2025-03");
        assert_eq!(analytics.difficulties[0].key, "medium");
    }
}
