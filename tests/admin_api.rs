use axum::http::StatusCode;
use coding_academy_server::model::admin::{
    AnalyticsResponse, Announcement, GroupResponse, RoleResponse,
};
use coding_academy_server::model::user::{Role, UserProfile};
use coding_academy_server::response::ApiResponse;
use float_cmp::approx_eq;
use serde_json::{Value, json};

mod helpers;
use helpers::{
    create_student_and_admin, create_test_course, create_test_group, create_test_problem,
    create_test_user, setup_test_environment, test_case, token_for,
};

// access control

#[tokio::test]
async fn test_admin_routes_forbidden_for_students() {
    let (server, pool) = setup_test_environment().await;
    let ((_, student_token), _) = create_student_and_admin(&pool).await;

    for path in [
        "/api/admin/users",
        "/api/admin/groups",
        "/api/admin/announcements",
        "/api/admin/analytics",
    ] {
        let response = server.get(path).authorization_bearer(&student_token).await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN, "{}", path);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.status_code, 403);
    }

    let anonymous = server.get("/api/admin/users").await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);
}

// users and roles

#[tokio::test]
async fn test_list_users_with_filters() {
    let (server, pool) = setup_test_environment().await;
    let (_, (_, admin_token)) = create_student_and_admin(&pool).await;
    let linus = create_test_user(&pool, "linus@kernel.org", Role::Student).await;

    let all = server
        .get("/api/admin/users")
        .authorization_bearer(&admin_token)
        .await;
    let body: ApiResponse<Vec<UserProfile>> = all.json();
    assert_eq!(body.data.expect("users").len(), 3);

    let admins = server
        .get("/api/admin/users")
        .add_query_param("role", "admin")
        .authorization_bearer(&admin_token)
        .await;
    let body: ApiResponse<Vec<UserProfile>> = admins.json();
    let admins = body.data.expect("users");
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].role, Role::Admin);

    let searched = server
        .get("/api/admin/users")
        .add_query_param("search", "KERNEL")
        .authorization_bearer(&admin_token)
        .await;
    let body: ApiResponse<Vec<UserProfile>> = searched.json();
    let ids: Vec<i64> = body.data.expect("users").iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![linus]);
}

#[tokio::test]
async fn test_role_changes_apply_to_existing_tokens() {
    let (server, pool) = setup_test_environment().await;
    let ((student_id, student_token), (_, admin_token)) = create_student_and_admin(&pool).await;
    let role_path = format!("/api/admin/users/{}/role", student_id);

    let before = server
        .get(&role_path)
        .authorization_bearer(&admin_token)
        .await;
    let body: ApiResponse<RoleResponse> = before.json();
    assert_eq!(body.data.expect("role").role, Role::Student);

    let promoted = server
        .patch(&role_path)
        .authorization_bearer(&admin_token)
        .json(&json!({"role": "admin"}))
        .await;
    assert_eq!(promoted.status_code(), StatusCode::OK);
    let body: ApiResponse<RoleResponse> = promoted.json();
    assert_eq!(
        body.data.expect("role"),
        RoleResponse {
            user_id: student_id,
            role: Role::Admin,
        }
    );

    // the token still says student; the stored role wins
    let now_admin = server
        .get("/api/admin/users")
        .authorization_bearer(&student_token)
        .await;
    assert_eq!(now_admin.status_code(), StatusCode::OK);

    let missing = server
        .patch("/api/admin/users/999999/role")
        .authorization_bearer(&admin_token)
        .json(&json!({"role": "student"}))
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_cannot_demote_self() {
    let (server, pool) = setup_test_environment().await;
    let (_, (admin_id, admin_token)) = create_student_and_admin(&pool).await;

    let response = server
        .patch(&format!("/api/admin/users/{}/role", admin_id))
        .authorization_bearer(&admin_token)
        .json(&json!({"role": "student"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let still_admin = server
        .get("/api/admin/analytics")
        .authorization_bearer(&admin_token)
        .await;
    assert_eq!(still_admin.status_code(), StatusCode::OK);
}

// groups

#[tokio::test]
async fn test_group_membership() {
    let (server, pool) = setup_test_environment().await;
    let ((student_id, _), (_, admin_token)) = create_student_and_admin(&pool).await;
    let second = create_test_user(&pool, "second@test.com", Role::Student).await;

    let created = server
        .post("/api/admin/groups")
        .authorization_bearer(&admin_token)
        .json(&json!({"name": "Evening Cohort", "memberIds": [student_id]}))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let body: ApiResponse<GroupResponse> = created.json();
    let group = body.data.expect("group");
    assert_eq!(group.member_ids, vec![student_id]);
    let members_path = format!("/api/admin/groups/{}/members", group.id);

    // adding an existing member again is harmless
    let added = server
        .post(&members_path)
        .authorization_bearer(&admin_token)
        .json(&json!({"userIds": [student_id, second]}))
        .await;
    assert_eq!(added.status_code(), StatusCode::OK);
    let body: ApiResponse<GroupResponse> = added.json();
    let mut members = body.data.expect("group").member_ids;
    members.sort();
    assert_eq!(members, vec![student_id, second]);

    let unknown_user = server
        .post(&members_path)
        .authorization_bearer(&admin_token)
        .json(&json!({"userIds": [second + 1000]}))
        .await;
    assert_eq!(unknown_user.status_code(), StatusCode::NOT_FOUND);

    let unknown_group = server
        .post("/api/admin/groups/424242/members")
        .authorization_bearer(&admin_token)
        .json(&json!({"userIds": [second]}))
        .await;
    assert_eq!(unknown_group.status_code(), StatusCode::NOT_FOUND);

    let removed = server
        .delete(&format!("{}/{}", members_path, student_id))
        .authorization_bearer(&admin_token)
        .await;
    assert_eq!(removed.status_code(), StatusCode::OK);
    let removed_again = server
        .delete(&format!("{}/{}", members_path, student_id))
        .authorization_bearer(&admin_token)
        .await;
    assert_eq!(removed_again.status_code(), StatusCode::NOT_FOUND);

    let listed = server
        .get("/api/admin/groups")
        .authorization_bearer(&admin_token)
        .await;
    let body: ApiResponse<Vec<GroupResponse>> = listed.json();
    let groups = body.data.expect("groups");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].member_ids, vec![second]);
}

// announcements

#[tokio::test]
async fn test_announcements_reach_their_audience() {
    let (server, pool) = setup_test_environment().await;
    let ((student_id, student_token), (_, admin_token)) = create_student_and_admin(&pool).await;
    let outsider = create_test_user(&pool, "outsider@test.com", Role::Student).await;
    let group_id = create_test_group(&pool, "Study Group", vec![student_id]).await;

    for body in [
        json!({"title": "Welcome", "body": "Hello everyone"}),
        json!({"title": "Study session", "body": "Room 4", "groupId": group_id}),
    ] {
        let response = server
            .post("/api/admin/announcements")
            .authorization_bearer(&admin_token)
            .json(&body)
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    let bad_group = server
        .post("/api/admin/announcements")
        .authorization_bearer(&admin_token)
        .json(&json!({"title": "Lost", "body": "Nobody", "groupId": group_id + 99}))
        .await;
    assert_eq!(bad_group.status_code(), StatusCode::NOT_FOUND);

    let member_view = server
        .get("/api/announcements")
        .authorization_bearer(&student_token)
        .await;
    let body: ApiResponse<Vec<Announcement>> = member_view.json();
    assert_eq!(body.data.expect("announcements").len(), 2);

    let outsider_view = server
        .get("/api/announcements")
        .authorization_bearer(token_for(outsider, Role::Student))
        .await;
    let body: ApiResponse<Vec<Announcement>> = outsider_view.json();
    let titles: Vec<String> = body
        .data
        .expect("announcements")
        .into_iter()
        .map(|a| a.title)
        .collect();
    assert_eq!(titles, vec!["Welcome".to_string()]);

    let all = server
        .get("/api/admin/announcements")
        .authorization_bearer(&admin_token)
        .await;
    let body: ApiResponse<Vec<Announcement>> = all.json();
    assert_eq!(body.data.expect("announcements").len(), 2);
}

// analytics

#[tokio::test]
async fn test_analytics_counts() {
    let (server, pool) = setup_test_environment().await;
    let ((_, student_token), (_, admin_token)) = create_student_and_admin(&pool).await;
    let problem_id =
        create_test_problem(&pool, "Counted", vec![test_case("", "yes", false)], 10).await;
    create_test_course(&pool, "Counted Course", true).await;

    for code in ["print('yes')", "print('no')", "print('no')"] {
        server
            .post("/api/submissions")
            .authorization_bearer(&student_token)
            .json(&json!({"problemId": problem_id, "code": code, "language": "python"}))
            .await;
    }

    let response = server
        .get("/api/admin/analytics")
        .authorization_bearer(&admin_token)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<AnalyticsResponse> = response.json();
    let analytics = body.data.expect("analytics");
    assert_eq!(analytics.total_users, 2);
    assert_eq!(analytics.students, 1);
    assert_eq!(analytics.admins, 1);
    assert_eq!(analytics.problems, 1);
    assert_eq!(analytics.submissions, 3);
    assert_eq!(analytics.accepted_submissions, 1);
    assert!(approx_eq!(
        f64,
        analytics.acceptance_rate,
        33.33,
        epsilon = 0.001
    ));
    assert_eq!(analytics.courses, 1);
    assert_eq!(analytics.enrollments, 0);
}
