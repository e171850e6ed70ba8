use axum::http::{header, Method, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::db::models::User;
use crate::db::types::{ApprovalStatus, AssessmentStatus};
use crate::test_support::{self, TestContext};

async fn call(
    ctx: &TestContext,
    method: Method,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(method, uri, Some(token), body))
        .await
        .expect("request");
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return (status, Value::Null);
    }
    (status, test_support::read_json(response).await)
}

async fn admin(ctx: &TestContext) -> (User, String) {
    let admin = test_support::insert_admin(ctx.state.db(), "admin@college.edu").await;
    let token = test_support::bearer_token(&admin, ctx.state.settings());
    (admin, token)
}

async fn approved_student(ctx: &TestContext, email: &str, name: &str) -> (User, String) {
    let student =
        test_support::insert_student(ctx.state.db(), email, name, ApprovalStatus::Approved).await;
    let token = test_support::bearer_token(&student, ctx.state.settings());
    (student, token)
}

#[tokio::test]
async fn admin_routes_refuse_students() {
    let ctx = test_support::setup_test_context().await;
    let (_, token) = approved_student(&ctx, "meera@college.edu", "Meera").await;

    let (status, _) = call(&ctx, Method::GET, "/api/v1/admin/students", &token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/admin/reports", None, None))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn categories_are_unique_by_name() {
    let ctx = test_support::setup_test_context().await;
    let (_, token) = admin(&ctx).await;

    let (status, body) = call(
        &ctx,
        Method::POST,
        "/api/v1/admin/categories",
        &token,
        Some(json!({"name": "Verbal", "description": "Reading and grammar"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");

    let (status, _) = call(
        &ctx,
        Method::POST,
        "/api/v1/admin/categories",
        &token,
        Some(json!({"name": "verbal"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&ctx, Method::GET, "/api/v1/admin/categories", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> =
        body.as_array().expect("list").iter().filter_map(|c| c["name"].as_str()).collect();
    assert!(names.contains(&"Verbal"));
}

#[tokio::test]
async fn question_crud_accepts_letter_or_index_keys() {
    let ctx = test_support::setup_test_context().await;
    let (_, token) = admin(&ctx).await;

    let (status, body) = call(
        &ctx,
        Method::POST,
        "/api/v1/admin/questions",
        &token,
        Some(json!({
            "question_text": "2 + 2 = ?",
            "option_a": "3", "option_b": "4", "option_c": "5", "option_d": "6",
            "correct_answer": "b",
            "category": "Aptitude"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["correct_answer"], "B");
    assert_eq!(body["correct_option"], 1);
    let question_id = body["id"].as_str().expect("id").to_string();

    let (status, body) = call(
        &ctx,
        Method::POST,
        "/api/v1/admin/questions",
        &token,
        Some(json!({
            "question_text": "Capital of India?",
            "options": ["Mumbai", "Delhi", "Chennai", "Kolkata"],
            "correct_option": 1,
            "category": "General"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["correct_answer"], "B");

    let (status, _) = call(
        &ctx,
        Method::POST,
        "/api/v1/admin/questions",
        &token,
        Some(json!({
            "question_text": "Missing options",
            "options": ["only", "three", "options"],
            "correct_answer": "A",
            "category": "General"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/v1/admin/questions/{question_id}");
    let (status, body) = call(
        &ctx,
        Method::PUT,
        &uri,
        &token,
        Some(json!({"option_c": "Four", "correct_option": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["options"], json!(["3", "4", "Four", "6"]));
    assert_eq!(body["correct_answer"], "C");

    let (status, body) =
        call(&ctx, Method::GET, "/api/v1/admin/questions?search=2%20%2B%202", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 1);

    let (status, _) = call(&ctx, Method::DELETE, &uri, &token, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&ctx, Method::GET, &uri, &token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn assessment_lifecycle_and_duplicate() {
    let ctx = test_support::setup_test_context().await;
    let (admin, token) = admin(&ctx).await;
    let db = ctx.state.db();

    let (status, body) = call(
        &ctx,
        Method::POST,
        "/api/v1/admin/assessments",
        &token,
        Some(json!({"title": "Logical Reasoning", "category": "Aptitude", "duration_minutes": 20})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["status"], "draft");
    assert_eq!(body["is_active"], false);
    assert_eq!(body["pass_percentage"], 50);
    let assessment_id = body["id"].as_str().expect("id").to_string();
    let base = format!("/api/v1/admin/assessments/{assessment_id}");

    let (status, _) = call(
        &ctx,
        Method::POST,
        &format!("{base}/status"),
        &token,
        Some(json!({"status": "active"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mut question_ids = Vec::new();
    for (idx, key) in ['A', 'B', 'C', 'D'].into_iter().enumerate() {
        let question =
            test_support::insert_question(db, &format!("Series {idx}"), "Aptitude", key).await;
        let (status, body) = call(
            &ctx,
            Method::POST,
            &format!("{base}/questions"),
            &token,
            Some(json!({"question_id": question.id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        assert_eq!(body["order_index"], idx as i64);
        question_ids.push(question.id);
    }

    let (status, body) = call(
        &ctx,
        Method::POST,
        &format!("{base}/status"),
        &token,
        Some(json!({"status": "active"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["is_active"], true);
    assert_eq!(body["question_count"], 4);

    let (status, copy) =
        call(&ctx, Method::POST, &format!("{base}/duplicate"), &token, None).await;
    assert_eq!(status, StatusCode::CREATED, "response: {copy}");
    assert_eq!(copy["title"], "Logical Reasoning (Copy)");
    assert_eq!(copy["status"], "draft");
    assert_eq!(copy["is_active"], false);
    assert_eq!(copy["created_by"], admin.id.as_str());
    assert_eq!(copy["question_count"], 4);

    let copy_id = copy["id"].as_str().expect("copy id");
    let (status, detail) =
        call(&ctx, Method::GET, &format!("/api/v1/admin/assessments/{copy_id}"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let linked: Vec<&str> = detail["questions"]
        .as_array()
        .expect("questions")
        .iter()
        .filter_map(|q| q["id"].as_str())
        .collect();
    assert_eq!(linked, question_ids.iter().map(String::as_str).collect::<Vec<_>>());

    let total_questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
        .fetch_one(db)
        .await
        .expect("count questions");
    assert_eq!(total_questions, 4);

    let (status, _) = call(
        &ctx,
        Method::DELETE,
        &format!("{base}/questions/{}", question_ids[3]),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(
        &ctx,
        Method::PUT,
        &base,
        &token,
        Some(json!({"pass_percentage": 70, "start_date": "2030-01-02T00:00", "end_date": "2030-01-01T00:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");

    let (status, body) =
        call(&ctx, Method::PUT, &base, &token, Some(json!({"pass_percentage": 70}))).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["pass_percentage"], 70);
    assert_eq!(body["question_count"], 3);

    let (status, _) =
        call(&ctx, Method::DELETE, &format!("/api/v1/admin/assessments/{copy_id}"), &token, None)
            .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn assessment_window_can_be_set_and_cleared() {
    let ctx = test_support::setup_test_context().await;
    let (admin, token) = admin(&ctx).await;
    let assessment = test_support::insert_assessment(
        ctx.state.db(),
        "Verbal Ability",
        &admin.id,
        false,
        AssessmentStatus::Draft,
    )
    .await;
    let uri = format!("/api/v1/admin/assessments/{}", assessment.id);

    let (status, body) = call(
        &ctx,
        Method::PUT,
        &uri,
        &token,
        Some(json!({"start_date": "2030-01-01T09:00", "end_date": "2030-01-31T18:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert!(body["start_date"].is_string());
    assert!(body["end_date"].is_string());

    let (status, body) =
        call(&ctx, Method::PUT, &uri, &token, Some(json!({"title": "Verbal Ability II"}))).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert!(body["start_date"].is_string(), "absent dates keep the window");

    let (status, body) = call(
        &ctx,
        Method::PUT,
        &uri,
        &token,
        Some(json!({"start_date": null, "end_date": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert!(body["start_date"].is_null());
    assert!(body["end_date"].is_null());
    assert_eq!(body["title"], "Verbal Ability II");

    let stored: (Option<time::PrimitiveDateTime>, Option<time::PrimitiveDateTime>) =
        sqlx::query_as("SELECT start_date, end_date FROM assessments WHERE id = $1")
            .bind(&assessment.id)
            .fetch_one(ctx.state.db())
            .await
            .expect("window");
    assert_eq!(stored, (None, None));
}

#[tokio::test]
async fn results_block_deleting_assessments_and_questions() {
    let ctx = test_support::setup_test_context().await;
    let (admin, token) = admin(&ctx).await;
    let (_, student_token) = approved_student(&ctx, "ravi@college.edu", "Ravi").await;
    let db = ctx.state.db();

    let assessment =
        test_support::insert_assessment(db, "Coding Basics", &admin.id, false, AssessmentStatus::Active)
            .await;
    let question = test_support::insert_question(db, "Loop count", "Technical", 'A').await;
    test_support::link_question(db, &assessment.id, &question.id).await;

    let (status, _) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/assessments/{}/submit", assessment.id),
        &student_token,
        Some(json!({"answers": {question.id.as_str(): "A"}, "time_taken": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = call(
        &ctx,
        Method::DELETE,
        &format!("/api/v1/admin/assessments/{}", assessment.id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &ctx,
        Method::DELETE,
        &format!("/api/v1/admin/questions/{}", question.id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn approval_decisions_and_bulk_rollback() {
    let ctx = test_support::setup_test_context().await;
    let (_, token) = admin(&ctx).await;
    let db = ctx.state.db();
    let first =
        test_support::insert_student(db, "one@college.edu", "One", ApprovalStatus::Pending).await;
    let second =
        test_support::insert_student(db, "two@college.edu", "Two", ApprovalStatus::Pending).await;
    let third =
        test_support::insert_student(db, "three@college.edu", "Three", ApprovalStatus::Pending).await;

    let (status, body) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/admin/students/{}/approve", first.id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["students"][0]["status"], "approved");
    assert!(body["students"][0]["approved_at"].is_string());

    let (status, _) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/admin/students/{}/approve", first.id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &ctx,
        Method::POST,
        "/api/v1/admin/students/bulk-approve",
        &token,
        Some(json!({"student_ids": [second.id, first.id]})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let untouched: ApprovalStatus = sqlx::query_scalar("SELECT status FROM users WHERE id = $1")
        .bind(&second.id)
        .fetch_one(db)
        .await
        .expect("status");
    assert_eq!(untouched, ApprovalStatus::Pending);

    let (status, body) = call(
        &ctx,
        Method::POST,
        "/api/v1/admin/students/bulk-reject",
        &token,
        Some(json!({"student_ids": [second.id, third.id, second.id], "reason": "Incomplete profile"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["students"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["students"][0]["rejection_reason"], "Incomplete profile");

    let (status, body) =
        call(&ctx, Method::GET, "/api/v1/admin/students?status=rejected", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 2);

    let (status, body) = call(
        &ctx,
        Method::GET,
        &format!("/api/v1/admin/students/{}", first.id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["student"]["email"], "one@college.edu");
    assert_eq!(body["summary"]["attempts"], 0);

    let (status, _) = call(
        &ctx,
        Method::POST,
        "/api/v1/admin/students/missing-id/reject",
        &token,
        Some(json!({"reason": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reports_aggregate_results_and_export_csv() {
    let ctx = test_support::setup_test_context().await;
    let (admin, token) = admin(&ctx).await;
    let db = ctx.state.db();

    let assessment =
        test_support::insert_assessment(db, "Aptitude Mock", &admin.id, false, AssessmentStatus::Active)
            .await;
    let mut questions = Vec::new();
    for (text, key) in [("Trains", 'A'), ("Ages", 'B')] {
        let question = test_support::insert_question(db, text, "Aptitude", key).await;
        test_support::link_question(db, &assessment.id, &question.id).await;
        questions.push(question.id);
    }

    for (email, name, answers) in [
        ("asha@college.edu", "Asha", json!({questions[0].as_str(): "A", questions[1].as_str(): "B"})),
        ("bala@college.edu", "Bala, Jr", json!({questions[0].as_str(): "C"})),
    ] {
        let (_, student_token) = approved_student(&ctx, email, name).await;
        let (status, _) = call(
            &ctx,
            Method::POST,
            &format!("/api/v1/student/assessments/{}/submit", assessment.id),
            &student_token,
            Some(json!({"answers": answers, "time_taken": 120})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call(&ctx, Method::GET, "/api/v1/admin/reports", &token, None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["overall"]["attempts"], 2);
    assert_eq!(body["overall"]["average"], 50.0);
    assert_eq!(body["grade_distribution"]["A"], 1);
    assert_eq!(body["grade_distribution"]["F"], 1);
    assert_eq!(body["students_by_status"]["approved"], 2);

    let report_uri = format!("/api/v1/admin/reports/assessments/{}", assessment.id);
    let (status, body) = call(&ctx, Method::GET, &format!("{report_uri}?grade=a"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attempts"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["attempts"][0]["student_name"], "Asha");
    let (status, _) = call(&ctx, Method::GET, &format!("{report_uri}?grade=Z"), &token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &ctx,
        Method::GET,
        &format!("/api/v1/admin/reports/questions/{}", assessment.id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["results"], 2);
    let trains = &body["questions"][0];
    assert_eq!(trains["attempts"], 2);
    assert_eq!(trains["correct"], 1);
    assert_eq!(trains["accuracy"], 50.0);
    assert_eq!(trains["options"][0]["picks"], 1);
    assert_eq!(trains["options"][0]["is_correct"], true);
    assert_eq!(trains["options"][2]["picks"], 1);

    let (status, body) =
        call(&ctx, Method::GET, "/api/v1/admin/reports/students?min_attempts=1", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["student_name"], "Asha");

    let (status, body) = call(&ctx, Method::GET, "/api/v1/admin/reports/categories", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["category"], "Aptitude");
    assert_eq!(body[0]["assessments"], 1);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/admin/reports/export?assessment_id={}", assessment.id),
            Some(&token),
            None,
        ))
        .await
        .expect("export");
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().expect("type").to_string();
    let disposition =
        response.headers()[header::CONTENT_DISPOSITION].to_str().expect("disposition").to_string();
    assert!(content_type.starts_with("text/csv"));
    assert!(disposition.starts_with("attachment; filename=\"results-aptitude-mock-"));

    let csv = test_support::read_text(response).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "Student Name,Student Email,Assessment Title,Category,Score,Total Questions,Percentage,Grade,Time Taken,Submitted At"
    );
    assert_eq!(lines.len(), 3);
    assert!(csv.contains("\"Bala, Jr\""));
    assert!(csv.contains("100.00%"));
}

#[tokio::test]
async fn knowledge_sync_reports_unavailable_service() {
    let ctx = test_support::setup_test_context().await;
    let (_, token) = admin(&ctx).await;

    let (status, body) = call(&ctx, Method::POST, "/api/v1/admin/rag/sync", &token, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "response: {body}");
}
