use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::models::{Assessment, User};
use crate::db::types::{ApprovalStatus, AssessmentStatus};
use crate::test_support::{self, TestContext};

struct Fixture {
    token: String,
    admin_token: String,
    assessment: Assessment,
    questions: Vec<String>,
}

/// Approved student plus an active assessment with questions keyed A, B, C.
async fn fixture(ctx: &TestContext, allow_multiple: bool) -> Fixture {
    let db = ctx.state.db();
    let admin = test_support::insert_admin(db, "admin@college.edu").await;
    let student =
        test_support::insert_student(db, "meera@college.edu", "Meera Iyer", ApprovalStatus::Approved)
            .await;
    let assessment = test_support::insert_assessment(
        db,
        "Quantitative Aptitude",
        &admin.id,
        allow_multiple,
        AssessmentStatus::Active,
    )
    .await;

    let mut questions = Vec::new();
    for (text, key) in [("Speed", 'A'), ("Ratio", 'B'), ("Profit", 'C')] {
        let question = test_support::insert_question(db, text, "Aptitude", key).await;
        test_support::link_question(db, &assessment.id, &question.id).await;
        questions.push(question.id);
    }

    Fixture {
        token: test_support::bearer_token(&student, ctx.state.settings()),
        admin_token: test_support::bearer_token(&admin, ctx.state.settings()),
        assessment,
        questions,
    }
}

async fn call(
    ctx: &TestContext,
    method: Method,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(method, uri, Some(token), body))
        .await
        .expect("request");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

#[tokio::test]
async fn lists_only_published_assessments_with_start_flags() {
    let ctx = test_support::setup_test_context().await;
    let fx = fixture(&ctx, false).await;
    let db = ctx.state.db();
    let owner = fx.assessment.created_by.clone();
    test_support::insert_assessment(db, "Draft Round", &owner, false, AssessmentStatus::Draft).await;
    let empty =
        test_support::insert_assessment(db, "Empty Round", &owner, false, AssessmentStatus::Active)
            .await;

    let (status, body) =
        call(&ctx, Method::GET, "/api/v1/student/assessments", &fx.token, None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["total_count"], 2);
    let items = body["items"].as_array().expect("items");
    let titles: Vec<&str> = items.iter().filter_map(|item| item["title"].as_str()).collect();
    assert!(titles.contains(&"Quantitative Aptitude"));
    assert!(!titles.contains(&"Draft Round"));

    let ready = items.iter().find(|item| item["id"] == fx.assessment.id.as_str()).expect("ready");
    assert_eq!(ready["can_start"], true);
    assert_eq!(ready["attempt_count"], 0);
    let idle = items.iter().find(|item| item["id"] == empty.id.as_str()).expect("empty");
    assert_eq!(idle["can_start"], false);
    assert_eq!(idle["availability_message"], "This assessment has no questions yet");

    let (status, _) = call(
        &ctx,
        Method::GET,
        "/api/v1/student/assessments?search=quantitative",
        &fx.token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn drafts_are_hidden_and_empty_assessments_cannot_start() {
    let ctx = test_support::setup_test_context().await;
    let fx = fixture(&ctx, false).await;
    let db = ctx.state.db();
    let draft = test_support::insert_assessment(
        db,
        "Draft Round",
        &fx.assessment.created_by,
        false,
        AssessmentStatus::Draft,
    )
    .await;
    let empty = test_support::insert_assessment(
        db,
        "Empty Round",
        &fx.assessment.created_by,
        false,
        AssessmentStatus::Active,
    )
    .await;

    let (status, _) = call(
        &ctx,
        Method::GET,
        &format!("/api/v1/student/assessments/{}", draft.id),
        &fx.token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/assessments/{}/start", empty.id),
        &fx.token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "This assessment has no questions yet");

    let (status, _) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/assessments/{}/submit", empty.id),
        &fx.token,
        Some(json!({"answers": {}, "time_taken": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn start_hands_out_questions_without_answer_keys() {
    let ctx = test_support::setup_test_context().await;
    let fx = fixture(&ctx, false).await;

    let (status, body) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/assessments/{}/start", fx.assessment.id),
        &fx.token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert!(body["attempt_id"].is_string());

    let questions = body["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 3);
    for question in questions {
        assert!(question.get("correct_answer").is_none());
        assert!(question.get("correct_letter").is_none());
        assert_eq!(question["options"].as_array().map(Vec::len), Some(4));
    }
    let mut ids: Vec<String> =
        questions.iter().filter_map(|q| q["id"].as_str().map(str::to_string)).collect();
    ids.sort();
    let mut expected = fx.questions.clone();
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn submit_scores_letters_and_indexes_and_blocks_retake() {
    let ctx = test_support::setup_test_context().await;
    let fx = fixture(&ctx, false).await;
    let submit_uri = format!("/api/v1/student/assessments/{}/submit", fx.assessment.id);

    let answers = json!({
        fx.questions[0].as_str(): "a",
        fx.questions[1].as_str(): 1,
        fx.questions[2].as_str(): "D",
    });
    let (status, body) = call(
        &ctx,
        Method::POST,
        &submit_uri,
        &fx.token,
        Some(json!({"answers": answers, "time_taken": 95})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["score"], 2);
    assert_eq!(body["total_questions"], 3);
    assert_eq!(body["attempt_number"], 1);
    assert_eq!(body["percentage"], 66.67);
    assert_eq!(body["grade"], "D");
    assert_eq!(body["passed"], true);

    let (status, body) = call(
        &ctx,
        Method::POST,
        &submit_uri,
        &fx.token,
        Some(json!({"answers": {}, "time_taken": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {body}");

    let (status, body) = call(
        &ctx,
        Method::GET,
        &format!("/api/v1/student/assessments/{}", fx.assessment.id),
        &fx.token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attempt_count"], 1);
    assert_eq!(body["can_start"], false);
    assert_eq!(body["latest_result"]["score"], 2);

    let (status, body) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/assessments/{}/start", fx.assessment.id),
        &fx.token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {body}");
    assert_eq!(body["detail"], "You have already completed this assessment");
    assert!(body.get("questions").is_none());

    let open_attempts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM student_assessments WHERE status = 'in_progress'",
    )
    .fetch_one(ctx.state.db())
    .await
    .expect("count attempts");
    assert_eq!(open_attempts, 0);
}

#[tokio::test]
async fn deactivated_questions_drop_out_of_scoring() {
    let ctx = test_support::setup_test_context().await;
    let fx = fixture(&ctx, false).await;

    let (status, body) = call(
        &ctx,
        Method::PUT,
        &format!("/api/v1/admin/questions/{}", fx.questions[1]),
        &fx.admin_token,
        Some(json!({"is_active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["is_active"], false);

    let (status, body) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/assessments/{}/start", fx.assessment.id),
        &fx.token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let handed_out: Vec<&str> = body["questions"]
        .as_array()
        .expect("questions")
        .iter()
        .filter_map(|q| q["id"].as_str())
        .collect();
    assert_eq!(handed_out.len(), 2);
    assert!(!handed_out.contains(&fx.questions[1].as_str()));

    let answers = json!({
        fx.questions[0].as_str(): "A",
        fx.questions[1].as_str(): "B",
        fx.questions[2].as_str(): "A",
    });
    let (status, body) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/assessments/{}/submit", fx.assessment.id),
        &fx.token,
        Some(json!({"answers": answers, "time_taken": 60})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["total_questions"], 2);
    assert_eq!(body["score"], 1);
    assert_eq!(body["percentage"], 50.0);
}

#[tokio::test]
async fn retakes_number_attempts_when_allowed() {
    let ctx = test_support::setup_test_context().await;
    let fx = fixture(&ctx, true).await;
    let submit_uri = format!("/api/v1/student/assessments/{}/submit", fx.assessment.id);

    for expected in 1..=2 {
        let (status, body) = call(
            &ctx,
            Method::POST,
            &submit_uri,
            &fx.token,
            Some(json!({"answers": {}, "time_taken": 40})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "response: {body}");
        assert_eq!(body["attempt_number"], expected);
        assert_eq!(body["score"], 0);
        assert_eq!(body["passed"], false);
    }
}

#[tokio::test]
async fn result_reveals_keys_only_when_configured() {
    let ctx = test_support::setup_test_context().await;
    let fx = fixture(&ctx, false).await;

    let (status, _) = call(
        &ctx,
        Method::GET,
        &format!("/api/v1/student/assessments/{}/result", fx.assessment.id),
        &fx.token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/assessments/{}/submit", fx.assessment.id),
        &fx.token,
        Some(json!({"answers": {fx.questions[1].as_str(): "B"}, "time_taken": 60})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let result_uri = format!("/api/v1/student/assessments/{}/result", fx.assessment.id);
    let (status, body) = call(&ctx, Method::GET, &result_uri, &fx.token, None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["score"], 1);
    let questions = body["questions"].as_array().expect("questions");
    let ratio = questions
        .iter()
        .find(|q| q["question_id"] == fx.questions[1].as_str())
        .expect("ratio question");
    assert_eq!(ratio["is_correct"], true);
    assert_eq!(ratio["correct_answer"], "B");

    sqlx::query("UPDATE assessments SET show_correct_answers = FALSE WHERE id = $1")
        .bind(&fx.assessment.id)
        .execute(ctx.state.db())
        .await
        .expect("hide answers");

    let (status, body) = call(&ctx, Method::GET, &result_uri, &fx.token, None).await;
    assert_eq!(status, StatusCode::OK);
    for question in body["questions"].as_array().expect("questions") {
        assert!(question.get("correct_answer").is_none());
    }
}

#[tokio::test]
async fn incremental_attempt_saves_and_submits_once() {
    let ctx = test_support::setup_test_context().await;
    let fx = fixture(&ctx, false).await;

    let (status, body) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/assessments/{}/start", fx.assessment.id),
        &fx.token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let attempt_id = body["attempt_id"].as_str().expect("attempt id").to_string();
    let answers_uri = format!("/api/v1/student/attempts/{attempt_id}/answers");

    let (status, body) = call(
        &ctx,
        Method::PUT,
        &answers_uri,
        &fx.token,
        Some(json!({"question_id": fx.questions[0], "answer": 0, "time_spent": 12})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["student_answer"], "A");

    let (status, _) = call(
        &ctx,
        Method::PUT,
        &answers_uri,
        &fx.token,
        Some(json!({"question_id": fx.questions[2], "answer": "Z"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &ctx,
        Method::PUT,
        &answers_uri,
        &fx.token,
        Some(json!({"question_id": "not-a-question", "answer": "A"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let submit_uri = format!("/api/v1/student/attempts/{attempt_id}/submit");
    let (status, body) =
        call(&ctx, Method::POST, &submit_uri, &fx.token, Some(json!({"time_taken": 70}))).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["score"], 1);
    assert_eq!(body["total_questions"], 3);

    let (status, _) = call(&ctx, Method::POST, &submit_uri, &fx.token, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &ctx,
        Method::PUT,
        &answers_uri,
        &fx.token,
        Some(json!({"question_id": fx.questions[1], "answer": "B"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn attempts_of_other_students_are_not_found() {
    let ctx = test_support::setup_test_context().await;
    let fx = fixture(&ctx, false).await;
    let other: User = test_support::insert_student(
        ctx.state.db(),
        "arjun@college.edu",
        "Arjun",
        ApprovalStatus::Approved,
    )
    .await;
    let other_token = test_support::bearer_token(&other, ctx.state.settings());

    let (_, body) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/assessments/{}/start", fx.assessment.id),
        &fx.token,
        None,
    )
    .await;
    let attempt_id = body["attempt_id"].as_str().expect("attempt id").to_string();

    let (status, _) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/attempts/{attempt_id}/submit"),
        &other_token,
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unapproved_students_and_admins_are_refused() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();
    let pending =
        test_support::insert_student(db, "pending@college.edu", "Pending", ApprovalStatus::Pending)
            .await;
    let admin = test_support::insert_admin(db, "admin@college.edu").await;

    for user in [&pending, &admin] {
        let token = test_support::bearer_token(user, ctx.state.settings());
        let (status, _) =
            call(&ctx, Method::GET, "/api/v1/student/assessments", &token, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn history_and_analytics_reflect_new_results() {
    let ctx = test_support::setup_test_context().await;
    let fx = fixture(&ctx, true).await;

    let (status, body) = call(&ctx, Method::GET, "/api/v1/student/history", &fx.token, None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["summary"]["total_assessments"], 0);

    let answers = json!({
        fx.questions[0].as_str(): "A",
        fx.questions[1].as_str(): "B",
        fx.questions[2].as_str(): "C",
    });
    let (status, _) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/assessments/{}/submit", fx.assessment.id),
        &fx.token,
        Some(json!({"answers": answers, "time_taken": 50})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&ctx, Method::GET, "/api/v1/student/history", &fx.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total_assessments"], 1);
    assert_eq!(body["summary"]["highest_percentage"], 100.0);
    assert_eq!(body["results"][0]["grade"], "A");
    assert_eq!(body["results"][0]["assessment_title"], "Quantitative Aptitude");

    let (status, body) =
        call(&ctx, Method::GET, "/api/v1/student/analytics", &fx.token, None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["categories"][0]["key"], "Aptitude");
    assert_eq!(body["categories"][0]["attempts"], 1);
    assert_eq!(body["monthly"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn chat_falls_back_to_limited_mode_when_retrieval_is_down() {
    let ctx = test_support::setup_test_context().await;
    let fx = fixture(&ctx, false).await;

    let (status, body) = call(
        &ctx,
        Method::POST,
        "/api/v1/student/chat",
        &fx.token,
        Some(json!({"message": "show my results", "session_id": "s-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["mode"], "database_only");
    assert_eq!(body["mode_name"], "Mode 2: LIMITED MODE");
    assert_eq!(body["session_id"], "s-1");
    let message = body["message"].as_str().expect("message");
    assert!(message.contains("haven't completed any assessments"), "message: {message}");
    assert_eq!(body["response"], body["message"]);

    let stored: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE session_id = 's-1'")
            .fetch_one(ctx.state.db())
            .await
            .expect("count chat messages");
    assert_eq!(stored, 1);

    let (status, _) = call(
        &ctx,
        Method::POST,
        "/api/v1/student/chat",
        &fx.token,
        Some(json!({"message": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_health_reports_database_only_mode() {
    let ctx = test_support::setup_test_context().await;
    let fx = fixture(&ctx, false).await;

    let (status, body) =
        call(&ctx, Method::GET, "/api/v1/student/chat/health", &fx.token, None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["mode"], "database_only");
    assert_eq!(body["database"], "healthy");
    assert!(body["rag"].as_str().is_some_and(|rag| rag.starts_with("unreachable")));
}
