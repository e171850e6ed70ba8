use std::collections::{BTreeMap, HashMap};

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::non_blank;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::Assessment;
use crate::repositories;
use crate::repositories::reports::{ReportFilter, ReportRow};
use crate::schemas::report::{
    AssessmentReport, AssessmentReportQuery, AssessmentStats, AttemptLine, CategoryPerformance,
    ExportQuery, OptionPick, QuestionAnalysis, QuestionReport, ReportsOverview,
    StudentPerformance, StudentReportQuery,
};
use crate::services::answer_key::{self, SubmittedAnswer, OPTION_COUNT};
use crate::services::cache::{self, CacheTag};
use crate::services::csv_export::{self, ExportRow};
use crate::services::reporting::{self, is_pass, percentage, round2, Aggregate, Grade, Sample};

const REPORT_TAGS: [CacheTag; 1] = [CacheTag::Reports];

fn sample(row: &ReportRow) -> Sample {
    Sample::new(row.score, row.total_questions, row.time_taken, row.pass_percentage)
}

fn distribution(rows: &[ReportRow]) -> BTreeMap<String, i64> {
    let samples: Vec<Sample> = rows.iter().map(sample).collect();
    reporting::grade_distribution(&samples)
        .into_iter()
        .map(|(grade, count)| (grade.to_string(), count))
        .collect()
}

async fn load_rows(state: &AppState, filter: &ReportFilter<'_>) -> Result<Vec<ReportRow>, ApiError> {
    repositories::reports::rows(state.db(), filter, state.settings().reporting().export_max_rows)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load results"))
}

async fn load_assessment(state: &AppState, assessment_id: &str) -> Result<Assessment, ApiError> {
    repositories::assessments::find_by_id(state.db(), assessment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load assessment"))?
        .ok_or_else(|| ApiError::NotFound("Assessment not found".to_string()))
}

pub(in crate::api::admin) async fn overview(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<ReportsOverview>, ApiError> {
    let report = cache::get_or_load(&state, "reports_overview", &json!({}), &REPORT_TAGS, || async {
        let rows = load_rows(&state, &ReportFilter::default()).await?;
        let headers = repositories::reports::assessment_headers(state.db())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load assessments"))?;
        let by_status = repositories::users::count_by_status(state.db())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count students"))?;

        let mut per_assessment = reporting::group_by(&rows, |row| row.assessment_id.clone(), sample);
        let assessments = headers
            .into_iter()
            .map(|header| AssessmentStats {
                stats: per_assessment.remove(&header.id).unwrap_or_default(),
                assessment_id: header.id,
                title: header.title,
                category: header.category,
                difficulty: header.difficulty,
                pass_percentage: header.pass_percentage,
                is_active: header.is_active,
            })
            .collect();

        let samples: Vec<Sample> = rows.iter().map(sample).collect();
        Ok::<_, ApiError>(ReportsOverview {
            overall: reporting::summarize(&samples),
            grade_distribution: distribution(&rows),
            students_by_status: by_status
                .into_iter()
                .map(|(status, count)| (status.as_str().to_string(), count))
                .collect(),
            assessments,
        })
    })
    .await?;

    Ok(Json(report))
}

pub(in crate::api::admin) async fn assessment_report(
    Path(assessment_id): Path<String>,
    Query(params): Query<AssessmentReportQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<AssessmentReport>, ApiError> {
    let grade = match non_blank(&params.grade) {
        Some(value) => Some(
            Grade::parse(value)
                .ok_or_else(|| ApiError::BadRequest("grade must be one of A, B, C, D, F".to_string()))?,
        ),
        None => None,
    };
    let assessment = load_assessment(&state, &assessment_id).await?;

    let cache_params = json!({ "assessment_id": assessment.id, "grade": grade.map(Grade::as_str) });
    let report = cache::get_or_load(&state, "reports_assessment", &cache_params, &REPORT_TAGS, || async {
        let filter = ReportFilter { assessment_id: Some(&assessment.id), search: None };
        let rows = load_rows(&state, &filter).await?;
        let samples: Vec<Sample> = rows.iter().map(sample).collect();

        let attempts = rows
            .iter()
            .filter_map(|row| {
                let row_percentage = percentage(row.score, row.total_questions);
                let row_grade = Grade::from_percentage(row_percentage);
                if grade.is_some_and(|wanted| wanted != row_grade) {
                    return None;
                }
                Some(AttemptLine {
                    result_id: row.result_id.clone(),
                    student_id: row.student_id.clone(),
                    student_name: row.student_name.clone(),
                    student_email: row.student_email.clone(),
                    score: row.score,
                    total_questions: row.total_questions,
                    percentage: row_percentage,
                    grade: row_grade.as_str().to_string(),
                    passed: is_pass(row_percentage, row.pass_percentage),
                    time_taken: row.time_taken,
                    submitted_at: format_primitive(row.submitted_at),
                })
            })
            .collect();

        Ok::<_, ApiError>(AssessmentReport {
            assessment_id: assessment.id.clone(),
            title: assessment.title.clone(),
            pass_percentage: assessment.pass_percentage,
            stats: reporting::summarize(&samples),
            grade_distribution: distribution(&rows),
            attempts,
        })
    })
    .await?;

    Ok(Json(report))
}

pub(in crate::api::admin) async fn student_report(
    Query(params): Query<StudentReportQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentPerformance>>, ApiError> {
    let min_attempts = params.min_attempts.unwrap_or(0).max(0);
    let search = non_blank(&params.search);

    let cache_params = json!({ "search": search, "min_attempts": min_attempts });
    let report = cache::get_or_load(&state, "reports_students", &cache_params, &REPORT_TAGS, || async {
        let rows = load_rows(&state, &ReportFilter { assessment_id: None, search }).await?;
        Ok::<_, ApiError>(student_performance(&rows, min_attempts))
    })
    .await?;

    Ok(Json(report))
}

/// Best average first; ties keep name order.
fn student_performance(rows: &[ReportRow], min_attempts: i64) -> Vec<StudentPerformance> {
    let names: HashMap<&str, (&str, &str)> = rows
        .iter()
        .map(|row| (row.student_id.as_str(), (row.student_name.as_str(), row.student_email.as_str())))
        .collect();

    let mut students: Vec<StudentPerformance> =
        reporting::group_by(rows, |row| row.student_id.clone(), sample)
            .into_iter()
            .filter(|(_, stats)| stats.attempts >= min_attempts)
            .map(|(student_id, stats)| {
                let (name, email) = names.get(student_id.as_str()).copied().unwrap_or_default();
                StudentPerformance {
                    student_name: name.to_string(),
                    student_email: email.to_string(),
                    student_id,
                    stats,
                }
            })
            .collect();

    students.sort_by(|a, b| {
        b.stats
            .average
            .total_cmp(&a.stats.average)
            .then_with(|| a.student_name.cmp(&b.student_name))
    });
    students
}

pub(in crate::api::admin) async fn category_report(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryPerformance>>, ApiError> {
    let report = cache::get_or_load(&state, "reports_categories", &json!({}), &REPORT_TAGS, || async {
        let rows = load_rows(&state, &ReportFilter::default()).await?;
        let headers = repositories::reports::assessment_headers(state.db())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load assessments"))?;

        let mut assessments: BTreeMap<String, i64> = BTreeMap::new();
        for header in &headers {
            *assessments.entry(header.category.clone()).or_default() += 1;
        }
        let mut stats = reporting::group_by(&rows, |row| row.category.clone(), sample);

        let categories: Vec<String> = assessments.keys().chain(stats.keys()).cloned().collect();
        let mut seen = std::collections::BTreeSet::new();
        let report: Vec<CategoryPerformance> = categories
            .into_iter()
            .filter(|category| seen.insert(category.clone()))
            .map(|category| CategoryPerformance {
                assessments: assessments.get(&category).copied().unwrap_or(0),
                stats: stats.remove(&category).unwrap_or_else(Aggregate::default),
                category,
            })
            .collect();
        Ok::<_, ApiError>(report)
    })
    .await?;

    Ok(Json(report))
}

pub(in crate::api::admin) async fn question_report(
    Path(assessment_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<QuestionReport>, ApiError> {
    let assessment = load_assessment(&state, &assessment_id).await?;

    let report = cache::get_or_load(
        &state,
        "reports_questions",
        &json!({ "assessment_id": assessment.id }),
        &REPORT_TAGS,
        || async {
            let linked = repositories::questions::list_linked(state.db(), &assessment.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
            let answers = repositories::results::answers_for_assessment(state.db(), &assessment.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to load answers"))?;

            let questions = linked
                .iter()
                .map(|item| analyse_question(&item.question, &answers))
                .collect();
            Ok::<_, ApiError>(QuestionReport {
                assessment_id: assessment.id.clone(),
                title: assessment.title.clone(),
                results: answers.len() as i64,
                questions,
            })
        },
    )
    .await?;

    Ok(Json(report))
}

/// Pick counts per option over every stored answer sheet. Sheets that skipped
/// the question do not count as attempts.
fn analyse_question(
    question: &crate::db::models::Question,
    sheets: &[HashMap<String, String>],
) -> QuestionAnalysis {
    let key = answer_key::key_for(question);
    let mut picks = [0i64; OPTION_COUNT as usize];
    let mut attempts = 0i64;
    let mut correct = 0i64;

    for sheet in sheets {
        let Some(stored) = sheet.get(&question.id) else {
            continue;
        };
        attempts += 1;
        let submitted = SubmittedAnswer::parse_str(stored);
        if let Some(picked) = submitted.key() {
            picks[usize::from(picked.index())] += 1;
        }
        if answer_key::is_correct(key, submitted) {
            correct += 1;
        }
    }

    let options = answer_key::options_for(question)
        .into_iter()
        .enumerate()
        .filter_map(|(idx, text)| {
            let letter = answer_key::letter_for_index(idx as i64)?;
            Some(OptionPick {
                letter,
                text,
                picks: picks.get(idx).copied().unwrap_or(0),
                is_correct: key.is_some_and(|key| usize::from(key.index()) == idx),
            })
        })
        .collect();

    QuestionAnalysis {
        question_id: question.id.clone(),
        question_text: question.question_text.clone(),
        attempts,
        correct,
        accuracy: if attempts == 0 { 0.0 } else { round2(correct as f64 / attempts as f64 * 100.0) },
        options,
    }
}

pub(in crate::api::admin) async fn export_results(
    Query(params): Query<ExportQuery>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let assessment = match non_blank(&params.assessment_id) {
        Some(id) => Some(load_assessment(&state, id).await?),
        None => None,
    };

    let filter = ReportFilter { assessment_id: assessment.as_ref().map(|a| a.id.as_str()), search: None };
    let rows = load_rows(&state, &filter).await?;
    let export: Vec<ExportRow> = rows
        .into_iter()
        .map(|row| ExportRow {
            student_name: row.student_name,
            student_email: row.student_email,
            assessment_title: row.assessment_title,
            category: row.category,
            score: row.score,
            total_questions: row.total_questions,
            time_taken: row.time_taken,
            submitted_at: row.submitted_at,
        })
        .collect();

    let filename = csv_export::filename(assessment.as_ref().map(|a| a.title.as_str()), primitive_now_utc());
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| ApiError::internal(e, "Failed to build export headers"))?;

    tracing::info!(admin_id = %admin.id, rows = export.len(), filename = %filename, "Results exported");

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv_export::render(&export),
    ))
}
