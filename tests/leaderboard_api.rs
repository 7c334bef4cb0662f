use axum::http::StatusCode;
use coding_academy_server::model::user::{LeaderboardEntry, Role};
use coding_academy_server::response::ApiResponse;
use serde_json::json;

mod helpers;
use helpers::{create_test_problem, create_test_user, setup_test_environment, test_case, token_for};

#[tokio::test]
async fn test_leaderboard_ranks_by_points_then_solved() {
    let (server, pool) = setup_test_environment().await;
    let first = create_test_user(&pool, "first@test.com", Role::Student).await;
    let second = create_test_user(&pool, "second@test.com", Role::Student).await;
    let idle = create_test_user(&pool, "idle@test.com", Role::Student).await;

    let big = create_test_problem(&pool, "Big", vec![test_case("", "big", false)], 50).await;
    let small_a = create_test_problem(&pool, "Small A", vec![test_case("", "sa", false)], 20).await;
    let small_b = create_test_problem(&pool, "Small B", vec![test_case("", "sb", false)], 20).await;

    // first: 50 points from one problem; second: 40 points from two
    for (user_id, problem_id, code) in [
        (first, big, "big"),
        (second, small_a, "sa"),
        (second, small_b, "sb"),
    ] {
        let response = server
            .post("/api/submissions")
            .authorization_bearer(token_for(user_id, Role::Student))
            .json(&json!({"problemId": problem_id, "code": code, "language": "go"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    let response = server
        .get("/api/leaderboard")
        .authorization_bearer(token_for(idle, Role::Student))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<Vec<LeaderboardEntry>> = response.json();
    let entries = body.data.expect("leaderboard");

    let ranking: Vec<(i64, i64, i32, i32)> = entries
        .iter()
        .map(|e| (e.rank, e.user_id, e.points, e.problems_solved))
        .collect();
    assert_eq!(
        ranking,
        vec![(1, first, 50, 1), (2, second, 40, 2), (3, idle, 0, 0)]
    );

    let limited = server
        .get("/api/leaderboard")
        .add_query_param("limit", 1)
        .authorization_bearer(token_for(idle, Role::Student))
        .await;
    let body: ApiResponse<Vec<LeaderboardEntry>> = limited.json();
    assert_eq!(body.data.expect("leaderboard").len(), 1);
}

#[tokio::test]
async fn test_leaderboard_requires_authentication() {
    let (server, _pool) = setup_test_environment().await;

    let response = server.get("/api/leaderboard").await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}
