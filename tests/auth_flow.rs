mod common;

use axum::http::{Method, StatusCode};
use baby_kingdom_api::{
    entity::{
        Users,
        users::{AuthProvider, UserRole},
    },
    services::auth_service::{self, GoogleProfile},
};
use common::{PASSWORD, bearer, create_user};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::json;

fn google_profile(sub: &str, email: &str) -> GoogleProfile {
    GoogleProfile {
        sub: sub.into(),
        email: email.into(),
        email_verified: Some(json!("true")),
        name: Some("Jamie Parent".into()),
        picture: Some("https://lh3.googleusercontent.com/a/photo".into()),
        aud: "client-id".into(),
    }
}

#[tokio::test]
async fn register_login_and_me() {
    let state = common::test_state().await;

    let (status, body) = common::send(
        &state,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "name": "Jamie Parent",
            "email": "Jamie@Example.com",
            "password": "secret123",
            "username": "jamie"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["email"], "jamie@example.com");
    assert_eq!(body["data"]["user"]["role"], "customer");
    assert_eq!(body["data"]["user"]["email_verified"], false);
    assert!(body["data"]["token"].as_str().is_some());

    let (status, _) = common::send(
        &state,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "name": "Someone Else",
            "email": "jamie@example.com",
            "password": "secret123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = common::send(
        &state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "jamie", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().expect("token").to_string();

    let (status, body) =
        common::send(&state, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "jamie");
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let state = common::test_state().await;
    create_user(&state, UserRole::Customer, "parent@example.com").await;

    let (status, body) = common::send(
        &state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "parent@example.com", "password": "not-it" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, _) = common::send(
        &state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "parent@example.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_payload_lists_field_errors() {
    let state = common::test_state().await;

    let (status, body) = common::send(
        &state,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "name": "", "email": "not-an-email", "password": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["data"]["errors"].as_array().expect("errors");
    assert!(errors.iter().any(|e| e["field"] == "email"));
    assert!(errors.iter().any(|e| e["field"] == "password"));
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let state = common::test_state().await;

    let (status, _) = common::send(&state, Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = common::send(
        &state,
        Method::GET,
        "/api/auth/me",
        Some("not.a.jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_reject_customers() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let admin = create_user(&state, UserRole::Admin, "admin@example.com").await;

    let (status, _) = common::send(
        &state,
        Method::GET,
        "/api/admin/dashboard",
        Some(&bearer(&state, &customer)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = common::send(
        &state,
        Method::GET,
        "/api/admin/dashboard",
        Some(&bearer(&state, &admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_customers"], 1);
    assert_eq!(body["data"]["revenue"], 0);
}

#[tokio::test]
async fn deactivated_account_loses_access_immediately() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let token = bearer(&state, &customer);

    let (status, _) = common::send(&state, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let mut active: baby_kingdom_api::entity::users::ActiveModel = customer.into();
    active.is_active = Set(false);
    active.update(&state.orm).await.expect("deactivate");

    let (status, body) =
        common::send(&state, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Account is deactivated");
}

#[tokio::test]
async fn google_sign_in_links_existing_email() {
    let state = common::test_state().await;
    let existing = create_user(&state, UserRole::Customer, "parent@example.com").await;

    let first = auth_service::sign_in_with_google(&state, google_profile("g-123", "Parent@Example.com"))
        .await
        .expect("google sign-in")
        .data
        .expect("auth");
    assert_eq!(first.user.id, existing.id);

    let linked = Users::find_by_id(existing.id)
        .one(&state.orm)
        .await
        .expect("query")
        .expect("user");
    assert_eq!(linked.google_id.as_deref(), Some("g-123"));
    assert!(linked.password_hash.is_some());
    assert_eq!(linked.auth_provider, AuthProvider::Local);

    let again = auth_service::sign_in_with_google(&state, google_profile("g-123", "changed@example.com"))
        .await
        .expect("google sign-in")
        .data
        .expect("auth");
    assert_eq!(again.user.id, existing.id);
}

#[tokio::test]
async fn google_sign_in_creates_passwordless_account() {
    let state = common::test_state().await;

    let auth = auth_service::sign_in_with_google(&state, google_profile("g-456", "new@example.com"))
        .await
        .expect("google sign-in")
        .data
        .expect("auth");
    assert_eq!(auth.user.auth_provider, AuthProvider::Google);
    assert!(auth.user.email_verified);

    let (status, body) = common::send(
        &state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "new@example.com", "password": "anything" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap_or_default().contains("Google"));
}

#[tokio::test]
async fn google_login_disabled_without_client_id() {
    let state = common::test_state().await;

    let (status, body) = common::send(
        &state,
        Method::POST,
        "/api/auth/google",
        None,
        Some(json!({ "credential": "header.payload.sig" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Google sign-in is not configured");
}
