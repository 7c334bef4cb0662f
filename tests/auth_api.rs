use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderValue, StatusCode};
use coding_academy_server::model::user::{AuthResponse, Role, UserProfile};
use coding_academy_server::payloads::auth::{LoginPayload, RegisterPayload};
use coding_academy_server::response::ApiResponse;
use serde_json::{Value, json};

mod helpers;
use helpers::{
    create_test_user, create_test_user_with_password, fetch_user, setup_test_environment,
    token_for,
};

fn set_cookies(response: &axum_test::TestResponse) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok().map(str::to_string))
        .collect()
}

// register

#[tokio::test]
async fn test_register_success() {
    let (server, pool) = setup_test_environment().await;

    let payload = RegisterPayload {
        email: "  Ada@Example.com ".to_string(),
        password: "correct-horse".to_string(),
        display_name: "Ada".to_string(),
    };
    let response = server.post("/api/auth/register").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let cookies = set_cookies(&response);
    assert!(
        cookies.iter().any(|c| c.starts_with("token=") && c.contains("HttpOnly")),
        "session cookie should be set, got {:?}",
        cookies
    );

    let body: ApiResponse<AuthResponse> = response.json();
    assert_eq!(body.status_code, 201);
    let auth = body.data.expect("auth payload");
    assert!(!auth.token.is_empty());
    assert_eq!(auth.user.email, "ada@example.com");
    assert_eq!(auth.user.role, Role::Student);
    assert_eq!(auth.user.points, 0);

    let stored = fetch_user(&pool, auth.user.id).await;
    let hash = stored.password_hash.expect("password hash stored");
    assert_ne!(hash, "correct-horse");
}

#[tokio::test]
async fn test_register_duplicate_email_conflict() {
    let (server, pool) = setup_test_environment().await;
    create_test_user(&pool, "taken@test.com", Role::Student).await;

    let payload = RegisterPayload {
        email: "TAKEN@test.com".to_string(),
        password: "password123".to_string(),
        display_name: "Copycat".to_string(),
    };
    let response = server.post("/api/auth/register").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.status_code, 409);
    assert!(body.data.is_none());
}

#[tokio::test]
async fn test_register_validation_errors() {
    let (server, _pool) = setup_test_environment().await;

    let response = server
        .post("/api/auth/register")
        .json(&json!({"email": "not-an-email", "password": "short", "displayName": ""}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: ApiResponse<Value> = response.json();
    let errors = body.errors.expect("validation errors listed");
    assert_eq!(errors.len(), 3, "errors: {:?}", errors);
}

// login

#[tokio::test]
async fn test_login_success_and_wrong_password() {
    let (server, pool) = setup_test_environment().await;
    let user_id = create_test_user_with_password(&pool, "grace@test.com", "hopper-1906").await;

    let ok = server
        .post("/api/auth/login")
        .json(&LoginPayload {
            email: "grace@test.com".to_string(),
            password: "hopper-1906".to_string(),
        })
        .await;
    assert_eq!(ok.status_code(), StatusCode::OK);
    let body: ApiResponse<AuthResponse> = ok.json();
    assert_eq!(body.data.expect("auth payload").user.id, user_id);

    let wrong = server
        .post("/api/auth/login")
        .json(&LoginPayload {
            email: "grace@test.com".to_string(),
            password: "hopper-1907".to_string(),
        })
        .await;
    assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);

    let unknown = server
        .post("/api/auth/login")
        .json(&LoginPayload {
            email: "nobody@test.com".to_string(),
            password: "hopper-1906".to_string(),
        })
        .await;
    assert_eq!(unknown.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_google_only_account() {
    let (server, pool) = setup_test_environment().await;
    create_test_user(&pool, "oauth@test.com", Role::Student).await;

    let response = server
        .post("/api/auth/login")
        .json(&LoginPayload {
            email: "oauth@test.com".to_string(),
            password: "whatever123".to_string(),
        })
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

// current user

#[tokio::test]
async fn test_current_user_via_bearer_and_cookie() {
    let (server, pool) = setup_test_environment().await;
    let user_id = create_test_user(&pool, "me@test.com", Role::Student).await;
    let token = token_for(user_id, Role::Student);

    let via_bearer = server
        .get("/api/auth/user")
        .authorization_bearer(&token)
        .await;
    assert_eq!(via_bearer.status_code(), StatusCode::OK);
    let profile: ApiResponse<UserProfile> = via_bearer.json();
    assert_eq!(profile.data.expect("profile").email, "me@test.com");

    let via_cookie = server
        .get("/api/auth/user")
        .add_header(
            COOKIE,
            HeaderValue::from_str(&format!("token={}", token)).unwrap(),
        )
        .await;
    assert_eq!(via_cookie.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_current_user_requires_valid_token() {
    let (server, pool) = setup_test_environment().await;

    let missing = server.get("/api/auth/user").await;
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

    let garbage = server
        .get("/api/auth/user")
        .authorization_bearer("not-a-jwt")
        .await;
    assert_eq!(garbage.status_code(), StatusCode::UNAUTHORIZED);

    // signed correctly, but for a user that does not exist
    let user_id = create_test_user(&pool, "ghost@test.com", Role::Student).await;
    let token = token_for(user_id + 1000, Role::Student);
    let orphan = server
        .get("/api/auth/user")
        .authorization_bearer(&token)
        .await;
    assert_eq!(orphan.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_profile() {
    let (server, pool) = setup_test_environment().await;
    let user_id = create_test_user(&pool, "edit@test.com", Role::Student).await;

    let response = server
        .put("/api/auth/user")
        .authorization_bearer(token_for(user_id, Role::Student))
        .json(&json!({"displayName": "Renamed", "bio": "Rustacean"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<UserProfile> = response.json();
    let profile = body.data.expect("profile");
    assert_eq!(profile.display_name, "Renamed");
    assert_eq!(profile.bio, "Rustacean");
    assert_eq!(fetch_user(&pool, user_id).await.display_name, "Renamed");
}

// logout and google

#[tokio::test]
async fn test_logout_clears_cookies() {
    let (server, _pool) = setup_test_environment().await;

    let response = server.post("/api/auth/logout").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
}

#[tokio::test]
async fn test_google_routes_without_configuration() {
    let (server, _pool) = setup_test_environment().await;

    let redirect = server.get("/api/auth/google").await;
    assert_eq!(redirect.status_code(), StatusCode::NOT_FOUND);

    let credential = server
        .post("/api/auth/google")
        .json(&json!({"credential": "id-token"}))
        .await;
    assert_eq!(credential.status_code(), StatusCode::NOT_FOUND);
}
