use super::helper;
use crate::auth::AuthUser;
use crate::contest::ContestStatus;
use crate::errors::AppError;
use crate::evaluation::{self, Evaluation};
use crate::model::contest::Contest;
use crate::model::problem::Problem;
use crate::model::submission::{
    NewSubmission, Submission, SubmissionResponse, SubmissionResultChangeset, SubmissionStatus,
};
use crate::model::user::next_streak;
use crate::payloads::submission::{ListSubmissionsParams, RunCodePayload, SubmitSolutionPayload};
use crate::response::ApiResponse;
use crate::schema::{contests, problems, submissions, users};
use crate::state::AppState;
use crate::validation::ValidatedJson;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use tracing::{debug, error, info, instrument, warn};

async fn load_problem(pool: &Pool, problem_id: i64) -> Result<Problem, AppError> {
    helper::run_query(pool, move |conn| {
        problems::table
            .find(problem_id)
            .select(Problem::as_select())
            .first(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Problem with ID {} not found", problem_id)))
}

/// Contest submissions must target an active contest the caller joined, and
/// one of that contest's problems.
async fn check_contest_entry(
    pool: &Pool,
    contest_id: i64,
    user_id: i64,
    problem_id: i64,
) -> Result<(), AppError> {
    let contest = helper::run_query(pool, move |conn| {
        contests::table
            .find(contest_id)
            .select(Contest::as_select())
            .first(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Contest with ID {} not found", contest_id)))?;

    if contest.status_at(Utc::now()) != ContestStatus::Active {
        warn!("Submission to inactive contest {}", contest_id);
        return Err(AppError::BadRequest(format!(
            "Contest {} is not active",
            contest_id
        )));
    }
    if !contest.participant_ids.contains(&user_id) {
        warn!(
            "User {} submitted to contest {} without registering",
            user_id, contest_id
        );
        return Err(AppError::Forbidden(
            "Register for the contest before submitting".to_string(),
        ));
    }
    if !contest.problem_ids.contains(&problem_id) {
        warn!(
            "Problem {} is not part of contest {}",
            problem_id, contest_id
        );
        return Err(AppError::BadRequest(format!(
            "Problem {} is not part of contest {}",
            problem_id, contest_id
        )));
    }
    Ok(())
}

/// Runs code against a problem's visible test cases without storing anything.
///
/// Request Body: `RunCodePayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `Evaluation`: verdict, score and per-case results (200 OK).
/// * `400 Bad Request`: If the payload fails validation or the problem has no visible test cases.
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the problem does not exist.
#[instrument(skip(state, payload))]
pub async fn run_code(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<RunCodePayload>,
) -> Result<ApiResponse<Evaluation>, AppError> {
    info!(
        "User {} running {} code against problem {}",
        user.id, payload.language, payload.problem_id
    );

    let problem = load_problem(&state.pool, payload.problem_id).await?;
    let visible: Vec<_> = problem
        .test_cases()?
        .into_iter()
        .filter(|case| !case.is_hidden)
        .collect();

    let result = evaluation::evaluate(
        state.executor.as_ref(),
        &payload.code,
        payload.language,
        &visible,
    )?;

    debug!(
        "Run finished with {} of {} visible cases passing",
        result.passed_count, result.total_count
    );
    Ok(ApiResponse::ok(result))
}

/// Submits a solution, evaluates it against every test case and stores the verdict.
///
/// A first acceptance of a problem adds its points to the caller, bumps
/// `problemsSolved` and advances the daily streak.
///
/// Request Body: `SubmitSolutionPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `SubmissionResponse`: the evaluated submission (201 Created).
/// * `400 Bad Request`: If the payload fails validation, the problem has no test
///   cases, or the contest is not active or does not include the problem.
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `403 Forbidden`: If the caller is not registered for the contest.
/// * `404 Not Found`: If the problem or contest does not exist.
/// * `500 Internal Server Error`: If a database error occurs; the submission stays `pending`.
#[instrument(skip(state, payload))]
pub async fn submit_solution(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<SubmitSolutionPayload>,
) -> Result<ApiResponse<SubmissionResponse>, AppError> {
    info!(
        "User {} submitting {} solution for problem {}",
        user.id, payload.language, payload.problem_id
    );

    let problem = load_problem(&state.pool, payload.problem_id).await?;
    let cases = problem.test_cases()?;
    if cases.is_empty() {
        warn!("Problem {} has no test cases, rejecting submission", problem.id);
        return Err(AppError::BadRequest(
            "Problem has no test cases to evaluate against".to_string(),
        ));
    }

    if let Some(contest_id) = payload.contest_id {
        check_contest_entry(&state.pool, contest_id, user.id, problem.id).await?;
    }

    let new_submission = NewSubmission {
        problem_id: problem.id,
        user_id: user.id,
        contest_id: payload.contest_id,
        code: payload.code.clone(),
        language: payload.language.as_str().to_string(),
        status: SubmissionStatus::Pending.as_str().to_string(),
    };
    let submission_id = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(submissions::table)
            .values(&new_submission)
            .returning(submissions::id)
            .get_result::<i64>(conn)
    })
    .await?;
    debug!("Stored pending submission {}", submission_id);

    let result = evaluation::evaluate(
        state.executor.as_ref(),
        &payload.code,
        payload.language,
        &cases,
    )
    .inspect_err(|err| error!("Evaluation of submission {} failed: {:?}", submission_id, err))?;

    let changes = SubmissionResultChangeset {
        status: result.status.as_str().to_string(),
        runtime_ms: result.runtime_ms,
        memory_kb: result.memory_kb,
        score: result.score.clone(),
        passed_count: result.passed_count,
        total_count: result.total_count,
        feedback: result.feedback.clone(),
        test_results: serde_json::to_value(&result.test_results)?,
    };
    let accepted = result.status == SubmissionStatus::Accepted;
    let user_id = user.id;
    let problem_id = problem.id;
    let problem_points = problem.points;

    let submission = helper::run_transaction(&state.pool, move |conn| {
        let submission = diesel::update(submissions::table.find(submission_id))
            .set(&changes)
            .returning(Submission::as_returning())
            .get_result(conn)?;

        if accepted {
            // Held until commit; the acceptance check below must run after it.
            let solve_state = lock_solve_state(conn, user_id)?;
            let solved_before = diesel::dsl::select(diesel::dsl::exists(
                submissions::table
                    .filter(submissions::user_id.eq(user_id))
                    .filter(submissions::problem_id.eq(problem_id))
                    .filter(submissions::status.eq(SubmissionStatus::Accepted.as_str()))
                    .filter(submissions::id.ne(submission_id)),
            ))
            .get_result::<bool>(conn)?;

            if !solved_before {
                record_first_solve(conn, user_id, problem_points, solve_state, Utc::now())?;
                info!("User {} solved problem {} for the first time", user_id, problem_id);
            }
        }
        Ok(submission)
    })
    .await?;

    info!(
        "Submission {} evaluated as {} ({} of {})",
        submission.id, submission.status, submission.passed_count, submission.total_count
    );
    Ok(ApiResponse::created(SubmissionResponse::try_from(submission)?))
}

/// Locks the user's row and returns `(streak, last_solved_at)`.
fn lock_solve_state(
    conn: &mut PgConnection,
    user_id: i64,
) -> QueryResult<(i32, Option<DateTime<Utc>>)> {
    users::table
        .find(user_id)
        .select((users::streak, users::last_solved_at))
        .for_update()
        .first(conn)
}

fn record_first_solve(
    conn: &mut PgConnection,
    user_id: i64,
    points: i32,
    (streak, last_solved_at): (i32, Option<DateTime<Utc>>),
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    diesel::update(users::table.find(user_id))
        .set((
            users::points.eq(users::points + points),
            users::problems_solved.eq(users::problems_solved + 1),
            users::streak.eq(next_streak(last_solved_at, streak, now)),
            users::last_solved_at.eq(Some(now)),
            users::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}

/// Lists the caller's submissions, newest first. Admins may pass `userId`.
///
/// Query Parameters: `ListSubmissionsParams` (`problemId`, `userId`, `limit`)
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<SubmissionResponse>` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `403 Forbidden`: If a non-admin asks for another user's submissions.
#[instrument(skip(pool))]
pub async fn list_submissions(
    State(pool): State<Pool>,
    user: AuthUser,
    Query(params): Query<ListSubmissionsParams>,
) -> Result<ApiResponse<Vec<SubmissionResponse>>, AppError> {
    let target_user = params.user_id.unwrap_or(user.id);
    if target_user != user.id && !user.is_admin() {
        warn!(
            "User {} tried to list submissions of user {}",
            user.id, target_user
        );
        return Err(AppError::Forbidden(
            "Only admins can view other users' submissions".to_string(),
        ));
    }
    info!("Listing submissions of user {}", target_user);

    let limit = helper::page_size(params.limit);
    let problem_filter = params.problem_id;
    let rows = helper::run_query(&pool, move |conn| {
        let mut query = submissions::table
            .filter(submissions::user_id.eq(target_user))
            .into_boxed();
        if let Some(problem_id) = problem_filter {
            query = query.filter(submissions::problem_id.eq(problem_id));
        }
        query
            .order((submissions::submitted_at.desc(), submissions::id.desc()))
            .limit(limit)
            .select(Submission::as_select())
            .load(conn)
    })
    .await?;

    let responses = rows
        .into_iter()
        .map(SubmissionResponse::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ApiResponse::ok(responses))
}

/// Fetches one submission. Only its owner or an admin may read it.
///
/// Returns (wrapped in `ApiResponse`)
/// * `SubmissionResponse` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `403 Forbidden`: If the caller neither owns the submission nor is an admin.
/// * `404 Not Found`: If the submission does not exist.
#[instrument(skip(pool))]
pub async fn get_submission(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(submission_id): Path<i64>,
) -> Result<ApiResponse<SubmissionResponse>, AppError> {
    let submission = helper::run_query(&pool, move |conn| {
        submissions::table
            .find(submission_id)
            .select(Submission::as_select())
            .first(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!("Submission with ID {} not found", submission_id))
    })?;

    if submission.user_id != user.id && !user.is_admin() {
        warn!(
            "User {} denied access to submission {}",
            user.id, submission_id
        );
        return Err(AppError::Forbidden(
            "You can only view your own submissions".to_string(),
        ));
    }

    Ok(ApiResponse::ok(SubmissionResponse::try_from(submission)?))
}
