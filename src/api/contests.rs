use super::helper;
use crate::auth::{AdminUser, AuthUser};
use crate::contest::{self, ContestStatus, ScoredAttempt, Standing};
use crate::errors::AppError;
use crate::model::contest::{Contest, ContestResponse, NewContest};
use crate::model::submission::SubmissionStatus;
use crate::payloads::contest::{CreateContestPayload, ListContestsParams};
use crate::response::ApiResponse;
use crate::schema::{contests, problems, submissions, users};
use crate::validation::ValidatedJson;
use axum::extract::{Path, Query, State};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use tracing::{debug, info, instrument, warn};

fn not_found(contest_id: i64) -> AppError {
    AppError::NotFound(format!("Contest with ID {} not found", contest_id))
}

async fn load_contest(pool: &Pool, contest_id: i64) -> Result<Contest, AppError> {
    helper::run_query(pool, move |conn| {
        contests::table
            .find(contest_id)
            .select(Contest::as_select())
            .first(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| not_found(contest_id))
}

/// Lists contests, latest start first, optionally filtered by derived status.
///
/// Query Parameters: `ListContestsParams` (`status`: upcoming, active or past)
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<ContestResponse>` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
#[instrument(skip(pool))]
pub async fn list_contests(
    State(pool): State<Pool>,
    user: AuthUser,
    Query(params): Query<ListContestsParams>,
) -> Result<ApiResponse<Vec<ContestResponse>>, AppError> {
    info!("Listing contests with status filter {:?}", params.status);

    let rows = helper::run_query(&pool, |conn| {
        contests::table
            .order((contests::start_time.desc(), contests::id.desc()))
            .select(Contest::as_select())
            .load(conn)
    })
    .await?;

    let now = Utc::now();
    let contests: Vec<ContestResponse> = rows
        .into_iter()
        .map(|contest| ContestResponse::build(contest, user.id, now))
        .filter(|contest| params.status.is_none_or(|status| contest.status == status))
        .collect();

    Ok(ApiResponse::ok(contests))
}

/// Creates a contest over existing problems.
///
/// Request Body: `CreateContestPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `ContestResponse` (201 Created).
/// * `400 Bad Request`: If the payload fails validation or names unknown problems.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
#[instrument(skip(pool, payload))]
pub async fn create_contest(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    ValidatedJson(payload): ValidatedJson<CreateContestPayload>,
) -> Result<ApiResponse<ContestResponse>, AppError> {
    info!("Admin {} creating contest '{}'", admin.id, payload.title);
    debug!("Create contest payload: {:?}", payload);

    let requested = payload.problem_ids.clone();
    let existing = helper::run_query(&pool, move |conn| {
        problems::table
            .filter(problems::id.eq_any(requested))
            .select(problems::id)
            .load::<i64>(conn)
    })
    .await?;

    let missing: Vec<String> = payload
        .problem_ids
        .iter()
        .filter(|id| !existing.contains(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        warn!("Contest references unknown problems {:?}", missing);
        return Err(AppError::BadRequest(format!(
            "Unknown problem IDs: {}",
            missing.join(", ")
        )));
    }

    let new_contest = NewContest {
        title: payload.title.trim().to_string(),
        description: payload.description,
        start_time: payload.start_time,
        end_time: payload.end_time,
        problem_ids: payload.problem_ids,
        prize_pool: payload.prize_pool,
        created_by: Some(admin.id),
    };
    let contest = helper::run_query(&pool, move |conn| {
        diesel::insert_into(contests::table)
            .values(&new_contest)
            .returning(Contest::as_returning())
            .get_result(conn)
    })
    .await?;

    info!("Created contest {}", contest.id);
    Ok(ApiResponse::created(ContestResponse::build(
        contest,
        admin.id,
        Utc::now(),
    )))
}

/// Fetches one contest with its derived status.
///
/// Returns (wrapped in `ApiResponse`)
/// * `ContestResponse` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the contest does not exist.
#[instrument(skip(pool))]
pub async fn get_contest(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(contest_id): Path<i64>,
) -> Result<ApiResponse<ContestResponse>, AppError> {
    let contest = load_contest(&pool, contest_id).await?;
    Ok(ApiResponse::ok(ContestResponse::build(
        contest,
        user.id,
        Utc::now(),
    )))
}

/// Registers the caller for a contest. Registering twice is a no-op.
///
/// Returns (wrapped in `ApiResponse`)
/// * `ContestResponse` with `isRegistered = true` (200 OK).
/// * `400 Bad Request`: If the contest has already ended.
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the contest does not exist.
#[instrument(skip(pool))]
pub async fn register_for_contest(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(contest_id): Path<i64>,
) -> Result<ApiResponse<ContestResponse>, AppError> {
    info!("User {} registering for contest {}", user.id, contest_id);
    let user_id = user.id;

    let contest = helper::run_transaction(&pool, move |conn| {
        let contest = contests::table
            .find(contest_id)
            .select(Contest::as_select())
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(|| not_found(contest_id))?;

        if contest.status_at(Utc::now()) == ContestStatus::Past {
            warn!("Registration for finished contest {}", contest_id);
            return Err(AppError::BadRequest(
                "Contest has already ended".to_string(),
            ));
        }
        if contest.participant_ids.contains(&user_id) {
            debug!("User {} already registered for {}", user_id, contest_id);
            return Ok(contest);
        }

        let mut participants = contest.participant_ids.clone();
        participants.push(user_id);
        let updated = diesel::update(contests::table.find(contest_id))
            .set(contests::participant_ids.eq(participants))
            .returning(Contest::as_returning())
            .get_result(conn)?;
        Ok(updated)
    })
    .await?;

    Ok(ApiResponse::ok(ContestResponse::build(
        contest,
        user_id,
        Utc::now(),
    )))
}

/// Contest standings: best score per problem summed per participant.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<Standing>` ordered by rank (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the contest does not exist.
#[instrument(skip(pool))]
pub async fn contest_leaderboard(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(contest_id): Path<i64>,
) -> Result<ApiResponse<Vec<Standing>>, AppError> {
    let contest = load_contest(&pool, contest_id).await?;
    let participant_ids = contest.participant_ids.clone();

    let (participants, attempts) = helper::run_query(&pool, move |conn| {
        let participants = users::table
            .filter(users::id.eq_any(participant_ids))
            .select((users::id, users::display_name))
            .load::<(i64, String)>(conn)?;

        let attempts = submissions::table
            .filter(submissions::contest_id.eq(contest_id))
            .filter(submissions::status.ne(SubmissionStatus::Pending.as_str()))
            .select((
                submissions::user_id,
                submissions::problem_id,
                submissions::score,
                submissions::submitted_at,
            ))
            .load::<(i64, i64, BigDecimal, DateTime<Utc>)>(conn)?;

        Ok((participants, attempts))
    })
    .await?;

    let attempts: Vec<ScoredAttempt> = attempts
        .into_iter()
        .map(|(user_id, problem_id, score, submitted_at)| ScoredAttempt {
            user_id,
            problem_id,
            score,
            submitted_at,
        })
        .collect();

    let standings = contest::rank(&participants, &attempts);
    debug!(
        "Contest {} leaderboard for user {} has {} entries",
        contest_id,
        user.id,
        standings.len()
    );
    Ok(ApiResponse::ok(standings))
}
