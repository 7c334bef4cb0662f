use super::helper;
use crate::auth::{AdminUser, AuthUser};
use crate::errors::AppError;
use crate::model::problem::{NewProblem, Problem, ProblemChangeset, ProblemDetail, ProblemSummary};
use crate::model::submission::SubmissionStatus;
use crate::payloads::problem::{ListProblemsParams, ProblemPayload};
use crate::response::ApiResponse;
use crate::schema::{problems, submissions};
use crate::validation::ValidatedJson;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

struct ProblemDocuments {
    examples: JsonValue,
    test_cases: JsonValue,
    starter_code: JsonValue,
}

fn documents(payload: &ProblemPayload) -> Result<ProblemDocuments, AppError> {
    Ok(ProblemDocuments {
        examples: serde_json::to_value(&payload.examples)?,
        test_cases: serde_json::to_value(&payload.test_cases)?,
        starter_code: serde_json::to_value(&payload.starter_code)?,
    })
}

fn not_found(problem_id: i64) -> AppError {
    AppError::NotFound(format!("Problem with ID {} not found", problem_id))
}

/// Lists problems, newest last, with the caller's solved flag.
///
/// Query Parameters: `ListProblemsParams` (`difficulty`, `tag`, `search`, `limit`)
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<ProblemSummary>` (200 OK). Test cases are never part of the list view.
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool))]
pub async fn list_problems(
    State(pool): State<Pool>,
    user: AuthUser,
    Query(params): Query<ListProblemsParams>,
) -> Result<ApiResponse<Vec<ProblemSummary>>, AppError> {
    info!("Listing problems for user {}", user.id);
    let limit = helper::page_size(params.limit);
    let user_id = user.id;

    let (rows, solved) = helper::run_query(&pool, move |conn| {
        let mut query = problems::table.into_boxed();
        if let Some(difficulty) = params.difficulty {
            query = query.filter(problems::difficulty.eq(difficulty.as_str()));
        }
        if let Some(tag) = params.tag.filter(|t| !t.trim().is_empty()) {
            query = query.filter(problems::tags.contains(vec![tag]));
        }
        if let Some(search) = params.search.filter(|s| !s.trim().is_empty()) {
            let pattern = helper::like_pattern(search.trim());
            query = query.filter(
                problems::title
                    .ilike(pattern.clone())
                    .or(problems::description.ilike(pattern)),
            );
        }

        let rows = query
            .order(problems::id.asc())
            .limit(limit)
            .select((
                problems::id,
                problems::title,
                problems::difficulty,
                problems::tags,
                problems::points,
            ))
            .load::<(i64, String, String, Vec<String>, i32)>(conn)?;

        let solved = submissions::table
            .filter(submissions::user_id.eq(user_id))
            .filter(submissions::status.eq(SubmissionStatus::Accepted.as_str()))
            .select(submissions::problem_id)
            .distinct()
            .load::<i64>(conn)?;

        Ok((rows, solved))
    })
    .await?;

    let solved: HashSet<i64> = solved.into_iter().collect();
    let summaries: Vec<ProblemSummary> = rows
        .into_iter()
        .map(|(id, title, difficulty, tags, points)| ProblemSummary {
            solved: solved.contains(&id),
            id,
            title,
            difficulty,
            tags,
            points,
        })
        .collect();

    info!("Returning {} problems", summaries.len());
    Ok(ApiResponse::ok(summaries))
}

/// Creates a problem.
///
/// Request Body: `ProblemPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `ProblemDetail`: the stored problem including hidden test cases (201 Created).
/// * `400 Bad Request`: If the payload fails validation.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn create_problem(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    ValidatedJson(payload): ValidatedJson<ProblemPayload>,
) -> Result<ApiResponse<ProblemDetail>, AppError> {
    info!("Admin {} creating problem '{}'", admin.id, payload.title);
    debug!("Create problem payload: {:?}", payload);

    let docs = documents(&payload)?;
    let new_problem = NewProblem {
        title: payload.title.trim().to_string(),
        description: payload.description,
        difficulty: payload.difficulty.as_str().to_string(),
        tags: payload.tags,
        input_format: payload.input_format,
        output_format: payload.output_format,
        constraints: payload.constraints,
        examples: docs.examples,
        test_cases: docs.test_cases,
        starter_code: docs.starter_code,
        points: payload.points,
        time_limit_ms: payload.time_limit_ms,
        memory_limit_kb: payload.memory_limit_kb,
        created_by: Some(admin.id),
    };

    let problem = helper::run_query(&pool, move |conn| {
        diesel::insert_into(problems::table)
            .values(&new_problem)
            .returning(Problem::as_returning())
            .get_result(conn)
    })
    .await?;

    info!("Created problem {}", problem.id);
    Ok(ApiResponse::created(ProblemDetail::from_problem(
        problem, true,
    )?))
}

/// Fetches one problem. Hidden test cases are only included for admins.
///
/// Returns (wrapped in `ApiResponse`)
/// * `ProblemDetail` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the problem does not exist.
#[instrument(skip(pool))]
pub async fn get_problem(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(problem_id): Path<i64>,
) -> Result<ApiResponse<ProblemDetail>, AppError> {
    debug!("User {} fetching problem {}", user.id, problem_id);

    let problem = helper::run_query(&pool, move |conn| {
        problems::table
            .find(problem_id)
            .select(Problem::as_select())
            .first(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| not_found(problem_id))?;

    Ok(ApiResponse::ok(ProblemDetail::from_problem(
        problem,
        user.is_admin(),
    )?))
}

/// Replaces a problem's content.
///
/// Request Body: `ProblemPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `ProblemDetail`: the updated problem (200 OK).
/// * `400 Bad Request`: If the payload fails validation.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the problem does not exist.
#[instrument(skip(pool, payload))]
pub async fn update_problem(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path(problem_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<ProblemPayload>,
) -> Result<ApiResponse<ProblemDetail>, AppError> {
    info!("Admin {} updating problem {}", admin.id, problem_id);
    debug!("Update problem payload: {:?}", payload);

    let docs = documents(&payload)?;
    let changes = ProblemChangeset {
        title: payload.title.trim().to_string(),
        description: payload.description,
        difficulty: payload.difficulty.as_str().to_string(),
        tags: payload.tags,
        input_format: payload.input_format,
        output_format: payload.output_format,
        constraints: payload.constraints,
        examples: docs.examples,
        test_cases: docs.test_cases,
        starter_code: docs.starter_code,
        points: payload.points,
        time_limit_ms: payload.time_limit_ms,
        memory_limit_kb: payload.memory_limit_kb,
        updated_at: Utc::now(),
    };

    let problem = helper::run_query(&pool, move |conn| {
        diesel::update(problems::table.find(problem_id))
            .set(&changes)
            .returning(Problem::as_returning())
            .get_result(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| {
        warn!("Update targeted missing problem {}", problem_id);
        not_found(problem_id)
    })?;

    Ok(ApiResponse::ok(ProblemDetail::from_problem(problem, true)?))
}

/// Deletes a problem together with its submissions.
///
/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true (200 OK).
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the problem does not exist.
#[instrument(skip(pool))]
pub async fn delete_problem(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path(problem_id): Path<i64>,
) -> Result<ApiResponse<bool>, AppError> {
    info!("Admin {} deleting problem {}", admin.id, problem_id);

    let deleted = helper::run_query(&pool, move |conn| {
        diesel::delete(problems::table.find(problem_id)).execute(conn)
    })
    .await?;

    if deleted == 0 {
        warn!("Delete targeted missing problem {}", problem_id);
        return Err(not_found(problem_id));
    }
    Ok(ApiResponse::ok(true))
}
