use axum::http::StatusCode;
use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use coding_academy_server::evaluation::Evaluation;
use coding_academy_server::execution::{
    CodeExecutor, ExecutionRequest, ExecutionResult, ExecutionStatus,
};
use coding_academy_server::model::submission::{Language, SubmissionResponse, SubmissionStatus};
use coding_academy_server::model::user::Role;
use coding_academy_server::payloads::submission::{RunCodePayload, SubmitSolutionPayload};
use coding_academy_server::response::ApiResponse;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

mod helpers;
use helpers::{
    count_submissions, create_student_and_admin, create_test_contest, create_test_problem,
    create_test_user, fetch_user, setup_test_environment, setup_with_executor, test_case,
    token_for,
};

struct CrashingExecutor;

impl CodeExecutor for CrashingExecutor {
    fn execute(&self, _request: &ExecutionRequest<'_>) -> ExecutionResult {
        ExecutionResult {
            status: ExecutionStatus::RuntimeError,
            actual_output: String::new(),
            error: Some("Segmentation fault".to_string()),
            runtime_ms: 3,
            memory_kb: 1024,
        }
    }
}

fn submission(problem_id: i64, code: &str) -> SubmitSolutionPayload {
    SubmitSolutionPayload {
        problem_id,
        code: code.to_string(),
        language: Language::Python,
        contest_id: None,
    }
}

// submit_solution

#[tokio::test]
async fn test_submit_partial_solution() {
    let (server, pool) = setup_test_environment().await;
    let ((student_id, token), _) = create_student_and_admin(&pool).await;
    let problem_id = create_test_problem(
        &pool,
        "Four Cases",
        vec![
            test_case("1", "one", false),
            test_case("2", "two", false),
            test_case("3", "three", true),
            test_case("4", "four", true),
        ],
        30,
    )
    .await;

    // mentions three of the four expected outputs
    let response = server
        .post("/api/submissions")
        .authorization_bearer(&token)
        .json(&submission(problem_id, "print('one two three')"))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: ApiResponse<SubmissionResponse> = response.json();
    let result = body.data.expect("submission");
    assert_eq!(result.status, SubmissionStatus::Partial.as_str());
    assert_eq!(result.passed_count, 3);
    assert_eq!(result.total_count, 4);
    assert_eq!(result.score, BigDecimal::from_str("75.00").unwrap());
    assert_eq!(result.test_results.len(), 4);

    let hidden = &result.test_results[3];
    assert!(hidden.hidden);
    assert!(hidden.input.is_none());
    assert!(hidden.expected_output.is_none());

    let user = fetch_user(&pool, student_id).await;
    assert_eq!(user.points, 0, "partial solutions earn no points");
    assert_eq!(user.problems_solved, 0);
}

#[tokio::test]
async fn test_first_acceptance_awards_points_once() {
    let (server, pool) = setup_test_environment().await;
    let ((student_id, token), _) = create_student_and_admin(&pool).await;
    let problem_id =
        create_test_problem(&pool, "Single Case", vec![test_case("", "42", false)], 25).await;

    for _ in 0..2 {
        let response = server
            .post("/api/submissions")
            .authorization_bearer(&token)
            .json(&submission(problem_id, "print(42)"))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let body: ApiResponse<SubmissionResponse> = response.json();
        let result = body.data.expect("submission");
        assert_eq!(result.status, SubmissionStatus::Accepted.as_str());
        assert_eq!(result.score, BigDecimal::from(100));
    }

    let user = fetch_user(&pool, student_id).await;
    assert_eq!(user.points, 25);
    assert_eq!(user.problems_solved, 1);
    assert_eq!(user.streak, 1);
    assert!(user.last_solved_at.is_some());
    assert_eq!(count_submissions(&pool).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_acceptances_award_points_once() {
    let (server, pool) = setup_test_environment().await;
    let ((student_id, token), _) = create_student_and_admin(&pool).await;
    let problem_id =
        create_test_problem(&pool, "Raced", vec![test_case("", "42", false)], 25).await;
    let accepted = submission(problem_id, "print(42)");

    let send = || {
        server
            .post("/api/submissions")
            .authorization_bearer(&token)
            .json(&accepted)
            .into_future()
    };
    let (a, b, c, d) = tokio::join!(send(), send(), send(), send());
    for response in [a, b, c, d] {
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    let user = fetch_user(&pool, student_id).await;
    assert_eq!(user.points, 25);
    assert_eq!(user.problems_solved, 1);
    assert_eq!(count_submissions(&pool).await, 4);
}

#[tokio::test]
async fn test_wrong_answer_scores_zero() {
    let (server, pool) = setup_test_environment().await;
    let ((_, token), _) = create_student_and_admin(&pool).await;
    let problem_id =
        create_test_problem(&pool, "Strict", vec![test_case("", "expected", false)], 10).await;

    let response = server
        .post("/api/submissions")
        .authorization_bearer(&token)
        .json(&submission(problem_id, "print('something else')"))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: ApiResponse<SubmissionResponse> = response.json();
    let result = body.data.expect("submission");
    assert_eq!(result.status, SubmissionStatus::WrongAnswer.as_str());
    assert_eq!(result.score, BigDecimal::from(0));
}

#[tokio::test]
async fn test_runtime_errors_reported_in_feedback() {
    let (server, pool) = setup_with_executor(Arc::new(CrashingExecutor)).await;
    let ((student_id, token), _) = create_student_and_admin(&pool).await;
    let problem_id = create_test_problem(
        &pool,
        "Crashy",
        vec![test_case("1", "1", false), test_case("2", "2", true)],
        10,
    )
    .await;

    let response = server
        .post("/api/submissions")
        .authorization_bearer(&token)
        .json(&submission(problem_id, "int main() { return *(int*)0; }"))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: ApiResponse<SubmissionResponse> = response.json();
    let result = body.data.expect("submission");
    assert_eq!(result.status, SubmissionStatus::WrongAnswer.as_str());
    assert_eq!(result.passed_count, 0);
    assert!(
        result
            .feedback
            .contains("First failure on test case 1: Segmentation fault."),
        "feedback: {}",
        result.feedback
    );
    assert!(
        result
            .test_results
            .iter()
            .all(|r| r.status == ExecutionStatus::RuntimeError)
    );
    assert_eq!(fetch_user(&pool, student_id).await.points, 0);
}

#[tokio::test]
async fn test_submit_to_problem_without_test_cases() {
    let (server, pool) = setup_test_environment().await;
    let ((_, token), _) = create_student_and_admin(&pool).await;
    let problem_id = create_test_problem(&pool, "Empty", vec![], 10).await;

    let response = server
        .post("/api/submissions")
        .authorization_bearer(&token)
        .json(&submission(problem_id, "print(1)"))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(count_submissions(&pool).await, 0, "nothing is stored");
}

#[tokio::test]
async fn test_submit_unknown_problem() {
    let (server, pool) = setup_test_environment().await;
    let ((_, token), _) = create_student_and_admin(&pool).await;

    let response = server
        .post("/api/submissions")
        .authorization_bearer(&token)
        .json(&submission(424242, "print(1)"))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_rejects_empty_code() {
    let (server, pool) = setup_test_environment().await;
    let ((_, token), _) = create_student_and_admin(&pool).await;
    let problem_id = create_test_problem(&pool, "Any", vec![test_case("", "x", false)], 10).await;

    let response = server
        .post("/api/submissions")
        .authorization_bearer(&token)
        .json(&submission(problem_id, "   "))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

// contest submissions

#[tokio::test]
async fn test_contest_submission_requires_registration() {
    let (server, pool) = setup_test_environment().await;
    let ((student_id, token), _) = create_student_and_admin(&pool).await;
    let problem_id =
        create_test_problem(&pool, "Contest Task", vec![test_case("", "ok", false)], 10).await;
    let now = Utc::now();
    let open_contest = create_test_contest(
        &pool,
        now - Duration::hours(1),
        now + Duration::hours(1),
        vec![problem_id],
        vec![],
    )
    .await;
    let joined_contest = create_test_contest(
        &pool,
        now - Duration::hours(1),
        now + Duration::hours(1),
        vec![problem_id],
        vec![student_id],
    )
    .await;

    let mut payload = submission(problem_id, "print('ok')");
    payload.contest_id = Some(open_contest);
    let unregistered = server
        .post("/api/submissions")
        .authorization_bearer(&token)
        .json(&payload)
        .await;
    assert_eq!(unregistered.status_code(), StatusCode::FORBIDDEN);

    payload.contest_id = Some(joined_contest);
    let registered = server
        .post("/api/submissions")
        .authorization_bearer(&token)
        .json(&payload)
        .await;
    assert_eq!(registered.status_code(), StatusCode::CREATED);
    let body: ApiResponse<SubmissionResponse> = registered.json();
    assert_eq!(body.data.expect("submission").contest_id, Some(joined_contest));
}

#[tokio::test]
async fn test_contest_submission_outside_window() {
    let (server, pool) = setup_test_environment().await;
    let ((student_id, token), _) = create_student_and_admin(&pool).await;
    let problem_id =
        create_test_problem(&pool, "Late Task", vec![test_case("", "ok", false)], 10).await;
    let now = Utc::now();
    let finished = create_test_contest(
        &pool,
        now - Duration::hours(3),
        now - Duration::hours(1),
        vec![problem_id],
        vec![student_id],
    )
    .await;

    let upcoming = create_test_contest(
        &pool,
        now + Duration::hours(1),
        now + Duration::hours(3),
        vec![problem_id],
        vec![student_id],
    )
    .await;

    for contest_id in [finished, upcoming] {
        let mut payload = submission(problem_id, "print('ok')");
        payload.contest_id = Some(contest_id);
        let response = server
            .post("/api/submissions")
            .authorization_bearer(&token)
            .json(&payload)
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: ApiResponse<Value> = response.json();
        assert!(body.message.contains("not active"), "{}", body.message);
    }
    assert_eq!(count_submissions(&pool).await, 0);
}

#[tokio::test]
async fn test_contest_submission_for_problem_outside_contest() {
    let (server, pool) = setup_test_environment().await;
    let ((student_id, token), _) = create_student_and_admin(&pool).await;
    let listed =
        create_test_problem(&pool, "Listed", vec![test_case("", "ok", false)], 10).await;
    let unlisted =
        create_test_problem(&pool, "Unlisted", vec![test_case("", "ok", false)], 40).await;
    let now = Utc::now();
    let contest_id = create_test_contest(
        &pool,
        now - Duration::hours(1),
        now + Duration::hours(1),
        vec![listed],
        vec![student_id],
    )
    .await;

    let mut payload = submission(unlisted, "print('ok')");
    payload.contest_id = Some(contest_id);
    let response = server
        .post("/api/submissions")
        .authorization_bearer(&token)
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: ApiResponse<Value> = response.json();
    assert!(body.message.contains("not part of contest"), "{}", body.message);
    assert_eq!(count_submissions(&pool).await, 0, "rejected before anything is stored");
    let user = fetch_user(&pool, student_id).await;
    assert_eq!(user.points, 0);
    assert_eq!(user.problems_solved, 0);
}

// run_code

#[tokio::test]
async fn test_run_code_uses_visible_cases_only() {
    let (server, pool) = setup_test_environment().await;
    let ((_, token), _) = create_student_and_admin(&pool).await;
    let problem_id = create_test_problem(
        &pool,
        "Sample Run",
        vec![
            test_case("1", "alpha", false),
            test_case("2", "beta", true),
        ],
        10,
    )
    .await;

    let response = server
        .post("/api/run-code")
        .authorization_bearer(&token)
        .json(&RunCodePayload {
            problem_id,
            code: "print('alpha')".to_string(),
            language: Language::Python,
        })
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<Evaluation> = response.json();
    let evaluation = body.data.expect("evaluation");
    assert_eq!(evaluation.total_count, 1);
    assert_eq!(evaluation.status, SubmissionStatus::Accepted);
    assert_eq!(count_submissions(&pool).await, 0, "runs are not stored");
}

// list / get

#[tokio::test]
async fn test_submission_visibility() {
    let (server, pool) = setup_test_environment().await;
    let ((owner_id, owner_token), (_, admin_token)) = create_student_and_admin(&pool).await;
    let other_id = create_test_user(&pool, "other@test.com", Role::Student).await;
    let other_token = token_for(other_id, Role::Student);
    let problem_id =
        create_test_problem(&pool, "Private", vec![test_case("", "ok", false)], 10).await;

    let created = server
        .post("/api/submissions")
        .authorization_bearer(&owner_token)
        .json(&submission(problem_id, "ok"))
        .await;
    let body: ApiResponse<SubmissionResponse> = created.json();
    let submission_id = body.data.expect("submission").id;
    let path = format!("/api/submissions/{}", submission_id);

    let as_owner = server.get(&path).authorization_bearer(&owner_token).await;
    assert_eq!(as_owner.status_code(), StatusCode::OK);
    let as_admin = server.get(&path).authorization_bearer(&admin_token).await;
    assert_eq!(as_admin.status_code(), StatusCode::OK);
    let as_other = server.get(&path).authorization_bearer(&other_token).await;
    assert_eq!(as_other.status_code(), StatusCode::FORBIDDEN);

    let own_list = server
        .get("/api/submissions")
        .authorization_bearer(&other_token)
        .await;
    let body: ApiResponse<Vec<SubmissionResponse>> = own_list.json();
    assert!(body.data.expect("list").is_empty());

    let snooping = server
        .get("/api/submissions")
        .add_query_param("userId", owner_id)
        .authorization_bearer(&other_token)
        .await;
    assert_eq!(snooping.status_code(), StatusCode::FORBIDDEN);

    let admin_view = server
        .get("/api/submissions")
        .add_query_param("userId", owner_id)
        .authorization_bearer(&admin_token)
        .await;
    assert_eq!(admin_view.status_code(), StatusCode::OK);
    let body: ApiResponse<Vec<SubmissionResponse>> = admin_view.json();
    assert_eq!(body.data.expect("list").len(), 1);

    let missing = server
        .get("/api/submissions/987654")
        .authorization_bearer(&owner_token)
        .await;
    let body: ApiResponse<Value> = missing.json();
    assert_eq!(body.status_code, 404);
}
