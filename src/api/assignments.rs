use super::helper;
use crate::auth::{AdminUser, AuthUser};
use crate::errors::AppError;
use crate::grading;
use crate::model::assignment::{
    Assignment, AssignmentChangeset, AssignmentQuestion, AssignmentResponse,
    AssignmentSubmission, AssignmentSubmissionResponse, AssignmentSubmissionStatus,
    GradedSubmissionChangeset, NewAssignment, NewAssignmentSubmission, QuestionAnswer,
};
use crate::payloads::assignment::{AssignmentPayload, SaveAnswersPayload, SubmitAssignmentPayload};
use crate::response::ApiResponse;
use crate::schema::{assignment_submissions, assignments, group_members};
use crate::validation::ValidatedJson;
use axum::extract::{Path, State};
use chrono::Utc;
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

fn not_found(assignment_id: i64) -> AppError {
    AppError::NotFound(format!("Assignment with ID {} not found", assignment_id))
}

fn user_group_ids(conn: &mut PgConnection, user_id: i64) -> QueryResult<Vec<i64>> {
    group_members::table
        .filter(group_members::user_id.eq(user_id))
        .select(group_members::group_id)
        .load(conn)
}

fn load_assignment(conn: &mut PgConnection, assignment_id: i64) -> Result<Assignment, AppError> {
    assignments::table
        .find(assignment_id)
        .select(Assignment::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| not_found(assignment_id))
}

/// Students only reach published assignments aimed at them; anything else
/// looks like it does not exist.
fn visible_assignment(
    conn: &mut PgConnection,
    assignment_id: i64,
    user_id: i64,
    is_admin: bool,
) -> Result<Assignment, AppError> {
    let assignment = load_assignment(conn, assignment_id)?;
    if is_admin {
        return Ok(assignment);
    }
    let groups = user_group_ids(conn, user_id)?;
    if assignment.is_published && assignment.targets(user_id, &groups) {
        Ok(assignment)
    } else {
        warn!(
            "User {} is not a target of assignment {}",
            user_id, assignment_id
        );
        Err(not_found(assignment_id))
    }
}

fn prepare_questions(mut questions: Vec<AssignmentQuestion>) -> Vec<AssignmentQuestion> {
    for question in questions.iter_mut() {
        question.ensure_id();
    }
    questions
}

/// Questions sent without an id keep the id of the stored question at the
/// same position, so saved drafts still line up after an edit. An id the
/// author reuses explicitly elsewhere is never handed out twice.
fn carry_over_ids(
    mut questions: Vec<AssignmentQuestion>,
    stored: &[AssignmentQuestion],
) -> Vec<AssignmentQuestion> {
    let explicit: Vec<String> = questions
        .iter()
        .filter(|q| q.has_id())
        .map(|q| q.id().to_string())
        .collect();

    for (question, previous) in questions.iter_mut().zip(stored) {
        if !explicit.iter().any(|id| id == previous.id()) {
            question.inherit_id(previous.id());
        }
    }
    prepare_questions(questions)
}

/// Rejects answers that point at questions the assignment does not have.
fn check_answers(
    questions: &[AssignmentQuestion],
    answers: &[QuestionAnswer],
) -> Result<(), AppError> {
    let unknown: Vec<&str> = answers
        .iter()
        .map(|a| a.question_id.as_str())
        .filter(|id| !questions.iter().any(|q| q.id() == *id))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Unknown question IDs: {}",
            unknown.join(", ")
        )))
    }
}

fn ensure_open(assignment: &Assignment) -> Result<(), AppError> {
    if Utc::now() > assignment.due_date {
        warn!("Assignment {} is past its due date", assignment.id);
        return Err(AppError::BadRequest(
            "The due date for this assignment has passed".to_string(),
        ));
    }
    Ok(())
}

fn finished_attempts(
    conn: &mut PgConnection,
    assignment_id: i64,
    user_id: i64,
) -> QueryResult<i64> {
    assignment_submissions::table
        .filter(assignment_submissions::assignment_id.eq(assignment_id))
        .filter(assignment_submissions::user_id.eq(user_id))
        .filter(
            assignment_submissions::status.ne(AssignmentSubmissionStatus::InProgress.as_str()),
        )
        .count()
        .get_result(conn)
}

fn open_attempt(
    conn: &mut PgConnection,
    assignment_id: i64,
    user_id: i64,
) -> QueryResult<Option<AssignmentSubmission>> {
    assignment_submissions::table
        .filter(assignment_submissions::assignment_id.eq(assignment_id))
        .filter(assignment_submissions::user_id.eq(user_id))
        .filter(
            assignment_submissions::status.eq(AssignmentSubmissionStatus::InProgress.as_str()),
        )
        .order(assignment_submissions::attempt.desc())
        .select(AssignmentSubmission::as_select())
        .for_update()
        .first(conn)
        .optional()
}

/// Starts the next attempt, or fails with `400` once `max_attempts` are used up.
fn start_attempt(
    conn: &mut PgConnection,
    assignment: &Assignment,
    user_id: i64,
    answers: &[QuestionAnswer],
    max_score: i32,
) -> Result<AssignmentSubmission, AppError> {
    let finished = finished_attempts(conn, assignment.id, user_id)?;
    if finished >= i64::from(assignment.max_attempts) {
        warn!(
            "User {} has no attempts left on assignment {}",
            user_id, assignment.id
        );
        return Err(AppError::BadRequest(format!(
            "All {} attempts have been used",
            assignment.max_attempts
        )));
    }

    let attempt = assignment_submissions::table
        .filter(assignment_submissions::assignment_id.eq(assignment.id))
        .filter(assignment_submissions::user_id.eq(user_id))
        .select(diesel::dsl::max(assignment_submissions::attempt))
        .first::<Option<i32>>(conn)?
        .unwrap_or(0)
        + 1;

    let new_attempt = NewAssignmentSubmission {
        assignment_id: assignment.id,
        user_id,
        attempt,
        answers: serde_json::to_value(answers)?,
        max_score,
        status: AssignmentSubmissionStatus::InProgress.as_str().to_string(),
    };
    let created = diesel::insert_into(assignment_submissions::table)
        .values(&new_attempt)
        .returning(AssignmentSubmission::as_returning())
        .get_result(conn)
        .map_err(|err| {
            helper::conflict_on_unique(err, "Another attempt was started at the same time")
        })?;
    debug!(
        "Started attempt {} of assignment {} for user {}",
        attempt, assignment.id, user_id
    );
    Ok(created)
}

fn attempts_remaining(max_attempts: i32, finished: i64) -> i32 {
    (i64::from(max_attempts) - finished).max(0) as i32
}

/// Lists assignments. Admins see all of them; students see the published
/// ones aimed at them, with correctness flags removed.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<AssignmentResponse>` ordered by due date (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
#[instrument(skip(pool))]
pub async fn list_assignments(
    State(pool): State<Pool>,
    user: AuthUser,
) -> Result<ApiResponse<Vec<AssignmentResponse>>, AppError> {
    info!("Listing assignments for user {}", user.id);
    let (user_id, is_admin) = (user.id, user.is_admin());

    let (rows, groups) = helper::run_query(&pool, move |conn| {
        let mut query = assignments::table.into_boxed();
        if !is_admin {
            query = query.filter(assignments::is_published.eq(true));
        }
        let rows = query
            .order((assignments::due_date.asc(), assignments::id.asc()))
            .select(Assignment::as_select())
            .load(conn)?;
        let groups = user_group_ids(conn, user_id)?;
        Ok((rows, groups))
    })
    .await?;

    let responses = rows
        .into_iter()
        .filter(|assignment| is_admin || assignment.targets(user_id, &groups))
        .map(|assignment| AssignmentResponse::from_assignment(assignment, !is_admin))
        .collect::<Result<Vec<_>, _>>()?;

    debug!("User {} sees {} assignments", user_id, responses.len());
    Ok(ApiResponse::ok(responses))
}

/// Creates an assignment. Questions without an id get a generated one.
///
/// Request Body: `AssignmentPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `AssignmentResponse` (201 Created).
/// * `400 Bad Request`: If the payload fails validation.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
#[instrument(skip(pool, payload))]
pub async fn create_assignment(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    ValidatedJson(payload): ValidatedJson<AssignmentPayload>,
) -> Result<ApiResponse<AssignmentResponse>, AppError> {
    info!("Admin {} creating assignment '{}'", admin.id, payload.title);
    debug!("Create assignment payload: {:?}", payload);

    let questions = prepare_questions(payload.questions);
    let new_assignment = NewAssignment {
        title: payload.title.trim().to_string(),
        description: payload.description,
        questions: serde_json::to_value(&questions)?,
        due_date: payload.due_date,
        assigned_user_ids: payload.assigned_user_ids,
        assigned_group_ids: payload.assigned_group_ids,
        max_attempts: payload.max_attempts,
        is_published: payload.is_published,
        created_by: Some(admin.id),
    };

    let assignment = helper::run_query(&pool, move |conn| {
        diesel::insert_into(assignments::table)
            .values(&new_assignment)
            .returning(Assignment::as_returning())
            .get_result(conn)
    })
    .await?;

    info!("Created assignment {}", assignment.id);
    Ok(ApiResponse::created(AssignmentResponse::from_assignment(
        assignment, false,
    )?))
}

/// Fetches one assignment; students get the redacted view.
///
/// Returns (wrapped in `ApiResponse`)
/// * `AssignmentResponse` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the assignment does not exist or is not meant for the caller.
#[instrument(skip(pool))]
pub async fn get_assignment(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(assignment_id): Path<i64>,
) -> Result<ApiResponse<AssignmentResponse>, AppError> {
    let (user_id, is_admin) = (user.id, user.is_admin());
    let assignment = helper::run_transaction(&pool, move |conn| {
        visible_assignment(conn, assignment_id, user_id, is_admin)
    })
    .await?;

    Ok(ApiResponse::ok(AssignmentResponse::from_assignment(
        assignment, !is_admin,
    )?))
}

/// Replaces an assignment's content. Existing attempts keep their grades.
/// Questions sent without an id keep the stored id at the same position.
///
/// Request Body: `AssignmentPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `AssignmentResponse` (200 OK).
/// * `400 Bad Request`: If the payload fails validation.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the assignment does not exist.
#[instrument(skip(pool, payload))]
pub async fn update_assignment(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path(assignment_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<AssignmentPayload>,
) -> Result<ApiResponse<AssignmentResponse>, AppError> {
    info!("Admin {} updating assignment {}", admin.id, assignment_id);
    debug!("Update assignment payload: {:?}", payload);

    let assignment = helper::run_transaction(&pool, move |conn| {
        let stored = assignments::table
            .find(assignment_id)
            .select(Assignment::as_select())
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(|| not_found(assignment_id))?;

        let questions = carry_over_ids(payload.questions, &stored.questions()?);
        let changes = AssignmentChangeset {
            title: payload.title.trim().to_string(),
            description: payload.description,
            questions: serde_json::to_value(&questions)?,
            due_date: payload.due_date,
            assigned_user_ids: payload.assigned_user_ids,
            assigned_group_ids: payload.assigned_group_ids,
            max_attempts: payload.max_attempts,
            is_published: payload.is_published,
            updated_at: Utc::now(),
        };

        let updated = diesel::update(assignments::table.find(assignment_id))
            .set(&changes)
            .returning(Assignment::as_returning())
            .get_result(conn)?;
        Ok(updated)
    })
    .await?;

    Ok(ApiResponse::ok(AssignmentResponse::from_assignment(
        assignment, false,
    )?))
}

/// Deletes an assignment together with every attempt.
///
/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true (200 OK).
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the assignment does not exist.
#[instrument(skip(pool))]
pub async fn delete_assignment(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path(assignment_id): Path<i64>,
) -> Result<ApiResponse<bool>, AppError> {
    info!("Admin {} deleting assignment {}", admin.id, assignment_id);

    let deleted = helper::run_query(&pool, move |conn| {
        diesel::delete(assignments::table.find(assignment_id)).execute(conn)
    })
    .await?;

    if deleted == 0 {
        warn!("Delete targeted missing assignment {}", assignment_id);
        return Err(not_found(assignment_id));
    }
    Ok(ApiResponse::ok(true))
}

/// Returns the caller's latest attempt, or `null` when there is none yet.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Option<AssignmentSubmissionResponse>` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the assignment does not exist or is not meant for the caller.
#[instrument(skip(pool))]
pub async fn get_my_submission(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(assignment_id): Path<i64>,
) -> Result<ApiResponse<Option<AssignmentSubmissionResponse>>, AppError> {
    let (user_id, is_admin) = (user.id, user.is_admin());

    let (assignment, latest, finished) = helper::run_transaction(&pool, move |conn| {
        let assignment = visible_assignment(conn, assignment_id, user_id, is_admin)?;
        let latest = assignment_submissions::table
            .filter(assignment_submissions::assignment_id.eq(assignment_id))
            .filter(assignment_submissions::user_id.eq(user_id))
            .order(assignment_submissions::attempt.desc())
            .select(AssignmentSubmission::as_select())
            .first(conn)
            .optional()?;
        let finished = finished_attempts(conn, assignment_id, user_id)?;
        Ok((assignment, latest, finished))
    })
    .await?;

    let remaining = attempts_remaining(assignment.max_attempts, finished);
    let response = latest
        .map(|submission| AssignmentSubmissionResponse::build(submission, remaining))
        .transpose()?;
    Ok(ApiResponse::ok(response))
}

/// Saves draft answers into the open attempt, starting one if attempts remain.
///
/// Request Body: `SaveAnswersPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `AssignmentSubmissionResponse`: the `in_progress` attempt (200 OK).
/// * `400 Bad Request`: If the payload is invalid, the due date has passed, or
///   no attempts remain.
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the assignment does not exist or is not meant for the caller.
#[instrument(skip(pool, payload))]
pub async fn save_answers(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(assignment_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<SaveAnswersPayload>,
) -> Result<ApiResponse<AssignmentSubmissionResponse>, AppError> {
    info!(
        "User {} saving {} answers for assignment {}",
        user.id,
        payload.answers.len(),
        assignment_id
    );
    let (user_id, is_admin) = (user.id, user.is_admin());

    let (draft, remaining) = helper::run_transaction(&pool, move |conn| {
        let assignment = visible_assignment(conn, assignment_id, user_id, is_admin)?;
        ensure_open(&assignment)?;
        let questions = assignment.questions()?;
        check_answers(&questions, &payload.answers)?;

        let draft = match open_attempt(conn, assignment_id, user_id)? {
            Some(open) => diesel::update(assignment_submissions::table.find(open.id))
                .set(assignment_submissions::answers.eq(serde_json::to_value(&payload.answers)?))
                .returning(AssignmentSubmission::as_returning())
                .get_result(conn)?,
            None => start_attempt(
                conn,
                &assignment,
                user_id,
                &payload.answers,
                grading::max_score(&questions),
            )?,
        };
        let finished = finished_attempts(conn, assignment_id, user_id)?;
        Ok((draft, attempts_remaining(assignment.max_attempts, finished)))
    })
    .await?;

    Ok(ApiResponse::ok(AssignmentSubmissionResponse::build(
        draft, remaining,
    )?))
}

/// Submits the open attempt (or a fresh one) and grades it.
///
/// Answers in the body replace the saved draft; without them the draft is graded.
///
/// Request Body: `SubmitAssignmentPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `AssignmentSubmissionResponse`: the graded attempt (200 OK).
/// * `400 Bad Request`: If the payload is invalid, the due date has passed, or
///   no attempts remain.
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the assignment does not exist or is not meant for the caller.
#[instrument(skip(pool, payload))]
pub async fn submit_assignment(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(assignment_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<SubmitAssignmentPayload>,
) -> Result<ApiResponse<AssignmentSubmissionResponse>, AppError> {
    info!("User {} submitting assignment {}", user.id, assignment_id);
    let (user_id, is_admin) = (user.id, user.is_admin());

    let (graded, remaining) = helper::run_transaction(&pool, move |conn| {
        let assignment = visible_assignment(conn, assignment_id, user_id, is_admin)?;
        ensure_open(&assignment)?;
        let questions = assignment.questions()?;

        let attempt = match open_attempt(conn, assignment_id, user_id)? {
            Some(open) => open,
            None => start_attempt(
                conn,
                &assignment,
                user_id,
                &[],
                grading::max_score(&questions),
            )?,
        };

        let answers: Vec<QuestionAnswer> = match payload.answers {
            Some(answers) => answers,
            None => serde_json::from_value(attempt.answers.clone())?,
        };
        check_answers(&questions, &answers)?;

        let report = grading::grade(&questions, &answers);
        let changes = GradedSubmissionChangeset {
            answers: serde_json::to_value(&answers)?,
            results: serde_json::to_value(&report.results)?,
            score: report.score,
            max_score: report.max_score,
            status: report.status.as_str().to_string(),
            submitted_at: Some(Utc::now()),
        };
        let graded = diesel::update(assignment_submissions::table.find(attempt.id))
            .set(&changes)
            .returning(AssignmentSubmission::as_returning())
            .get_result(conn)?;

        let finished = finished_attempts(conn, assignment_id, user_id)?;
        Ok((graded, attempts_remaining(assignment.max_attempts, finished)))
    })
    .await?;

    info!(
        "Assignment {} attempt {} by user {} scored {}/{} ({})",
        assignment_id, graded.attempt, user_id, graded.score, graded.max_score, graded.status
    );
    Ok(ApiResponse::ok(AssignmentSubmissionResponse::build(
        graded, remaining,
    )?))
}

/// Lists every attempt on an assignment, grouped by learner.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<AssignmentSubmissionResponse>` (200 OK).
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the assignment does not exist.
#[instrument(skip(pool))]
pub async fn list_assignment_submissions(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path(assignment_id): Path<i64>,
) -> Result<ApiResponse<Vec<AssignmentSubmissionResponse>>, AppError> {
    info!(
        "Admin {} listing submissions of assignment {}",
        admin.id, assignment_id
    );

    let (assignment, rows) = helper::run_transaction(&pool, move |conn| {
        let assignment = load_assignment(conn, assignment_id)?;
        let rows = assignment_submissions::table
            .filter(assignment_submissions::assignment_id.eq(assignment_id))
            .order((
                assignment_submissions::user_id.asc(),
                assignment_submissions::attempt.asc(),
            ))
            .select(AssignmentSubmission::as_select())
            .load(conn)?;
        Ok((assignment, rows))
    })
    .await?;

    let mut finished: HashMap<i64, i64> = HashMap::new();
    let in_progress = AssignmentSubmissionStatus::InProgress.as_str();
    for row in rows.iter().filter(|row| row.status != in_progress) {
        *finished.entry(row.user_id).or_default() += 1;
    }

    let responses = rows
        .into_iter()
        .map(|row| {
            let done = finished.get(&row.user_id).copied().unwrap_or(0);
            AssignmentSubmissionResponse::build(
                row,
                attempts_remaining(assignment.max_attempts, done),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ApiResponse::ok(responses))
}
