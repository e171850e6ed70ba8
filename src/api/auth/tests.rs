use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::types::ApprovalStatus;
use crate::test_support;

#[tokio::test]
async fn registration_creates_pending_student_without_token() {
    let ctx = test_support::setup_test_context().await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": "  Asha@College.EDU ",
                "fullName": "Asha Rao",
                "password": "password123"
            })),
        ))
        .await
        .expect("register");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert!(body.get("access_token").is_none());
    assert_eq!(body["user"]["email"], "asha@college.edu");
    assert_eq!(body["user"]["status"], "pending");
    assert_eq!(body["user"]["role"], "student");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": "asha@college.edu",
                "full_name": "Someone Else",
                "password": "password123"
            })),
        ))
        .await
        .expect("duplicate register");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn registration_rejects_short_password_and_bad_email() {
    let ctx = test_support::setup_test_context().await;

    for payload in [
        json!({"email": "ravi@college.edu", "full_name": "Ravi", "password": "short"}),
        json!({"email": "not-an-email", "full_name": "Ravi", "password": "password123"}),
    ] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(payload),
            ))
            .await
            .expect("register");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn login_gates_on_approval_status() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();
    test_support::insert_student(db, "pending@college.edu", "Pending", ApprovalStatus::Pending)
        .await;
    test_support::insert_student(db, "rejected@college.edu", "Rejected", ApprovalStatus::Rejected)
        .await;
    test_support::insert_student(db, "approved@college.edu", "Approved", ApprovalStatus::Approved)
        .await;

    let login = |email: &str, password: &str| {
        test_support::json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({"email": email, "password": password})),
        )
    };

    let response = ctx
        .app
        .clone()
        .oneshot(login("pending@college.edu", test_support::TEST_PASSWORD))
        .await
        .expect("pending login");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = test_support::read_json(response).await;
    assert_eq!(body["detail"], "Your account is awaiting admin approval");

    let response = ctx
        .app
        .clone()
        .oneshot(login("rejected@college.edu", test_support::TEST_PASSWORD))
        .await
        .expect("rejected login");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .clone()
        .oneshot(login("approved@college.edu", "wrong-password"))
        .await
        .expect("bad password");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ctx
        .app
        .clone()
        .oneshot(login("APPROVED@college.edu", test_support::TEST_PASSWORD))
        .await
        .expect("approved login");
    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    assert_eq!(body["token_type"], "bearer");
    let token = body["access_token"].as_str().expect("token").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/auth/me", Some(&token), None))
        .await
        .expect("me");
    assert_eq!(response.status(), StatusCode::OK);
    let me = test_support::read_json(response).await;
    assert_eq!(me["email"], "approved@college.edu");
    assert!(me.get("hashed_password").is_none());
}

#[tokio::test]
async fn login_is_rate_limited_per_email() {
    let ctx = test_support::setup_test_context().await;

    let mut last = StatusCode::OK;
    for _ in 0..11 {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({"email": "nobody@college.edu", "password": "whatever1"})),
            ))
            .await
            .expect("login");
        last = response.status();
    }

    assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn me_requires_bearer_token() {
    let ctx = test_support::setup_test_context().await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/auth/me", None, None))
        .await
        .expect("me");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
