use super::helper;
use crate::auth::{AdminUser, AuthUser};
use crate::errors::AppError;
use crate::model::course::{
    Course, CourseChangeset, CourseEnrollment, CourseModule, CourseModuleChangeset,
    CourseResponse, EnrollResponse, NewCourse, NewCourseEnrollment, NewCourseModule,
    compute_progress,
};
use crate::payloads::course::{
    CreateCoursePayload, CreateModulePayload, UpdateCoursePayload, UpdateModulePayload,
};
use crate::response::ApiResponse;
use crate::schema::{course_enrollments, course_modules, courses};
use crate::validation::ValidatedJson;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

fn course_not_found(course_id: i64) -> AppError {
    AppError::NotFound(format!("Course with ID {} not found", course_id))
}

fn module_not_found(course_id: i64, module_id: i64) -> AppError {
    AppError::NotFound(format!(
        "Module with ID {} not found in course {}",
        module_id, course_id
    ))
}

fn module_ids_by_course(
    conn: &mut PgConnection,
    course_ids: Vec<i64>,
) -> QueryResult<HashMap<i64, Vec<i64>>> {
    let rows = course_modules::table
        .filter(course_modules::course_id.eq_any(course_ids))
        .order((course_modules::position.asc(), course_modules::id.asc()))
        .select((course_modules::course_id, course_modules::id))
        .load::<(i64, i64)>(conn)?;

    let mut grouped: HashMap<i64, Vec<i64>> = HashMap::new();
    for (course_id, module_id) in rows {
        grouped.entry(course_id).or_default().push(module_id);
    }
    Ok(grouped)
}

fn course_module_ids(conn: &mut PgConnection, course_id: i64) -> QueryResult<Vec<i64>> {
    course_modules::table
        .filter(course_modules::course_id.eq(course_id))
        .order((course_modules::position.asc(), course_modules::id.asc()))
        .select(course_modules::id)
        .load(conn)
}

/// Loads a course the caller may see: admins see everything, others see
/// public courses and the ones they are enrolled in. Anything else is a 404.
fn visible_course(
    conn: &mut PgConnection,
    course_id: i64,
    user_id: i64,
    is_admin: bool,
) -> Result<Course, AppError> {
    let course = courses::table
        .find(course_id)
        .select(Course::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| course_not_found(course_id))?;

    if course.is_public || is_admin {
        return Ok(course);
    }

    let enrolled = diesel::dsl::select(diesel::dsl::exists(
        course_enrollments::table
            .filter(course_enrollments::course_id.eq(course_id))
            .filter(course_enrollments::user_id.eq(user_id)),
    ))
    .get_result::<bool>(conn)?;

    if enrolled {
        Ok(course)
    } else {
        warn!("User {} cannot see private course {}", user_id, course_id);
        Err(course_not_found(course_id))
    }
}

/// Re-derives every enrollment's progress from the course's current modules,
/// dropping completions of modules that no longer exist.
fn recompute_progress(conn: &mut PgConnection, course_id: i64) -> Result<usize, AppError> {
    let module_ids = course_module_ids(conn, course_id)?;
    let enrollments = course_enrollments::table
        .filter(course_enrollments::course_id.eq(course_id))
        .select(CourseEnrollment::as_select())
        .load(conn)?;

    let count = enrollments.len();
    for enrollment in enrollments {
        let completed: Vec<i64> = enrollment
            .completed_module_ids
            .into_iter()
            .filter(|id| module_ids.contains(id))
            .collect();
        let progress = compute_progress(&completed, &module_ids);
        diesel::update(course_enrollments::table.find(enrollment.id))
            .set((
                course_enrollments::completed_module_ids.eq(completed),
                course_enrollments::progress.eq(progress),
            ))
            .execute(conn)?;
    }
    debug!("Recomputed progress of {} enrollments in course {}", count, course_id);
    Ok(count)
}

/// Lists courses. Non-admins only see public courses.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<CourseResponse>` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
#[instrument(skip(pool))]
pub async fn list_courses(
    State(pool): State<Pool>,
    user: AuthUser,
) -> Result<ApiResponse<Vec<CourseResponse>>, AppError> {
    info!("Listing courses for user {}", user.id);
    let is_admin = user.is_admin();

    let (rows, mut modules) = helper::run_query(&pool, move |conn| {
        let mut query = courses::table.into_boxed();
        if !is_admin {
            query = query.filter(courses::is_public.eq(true));
        }
        let rows = query
            .order(courses::id.asc())
            .select(Course::as_select())
            .load(conn)?;
        let modules = module_ids_by_course(conn, rows.iter().map(|c| c.id).collect())?;
        Ok((rows, modules))
    })
    .await?;

    let responses = rows
        .into_iter()
        .map(|course| {
            let module_ids = modules.remove(&course.id).unwrap_or_default();
            CourseResponse::build(course, module_ids)
        })
        .collect();
    Ok(ApiResponse::ok(responses))
}

/// Creates a course.
///
/// Request Body: `CreateCoursePayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `CourseResponse` (201 Created).
/// * `400 Bad Request`: If the payload fails validation.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
#[instrument(skip(pool, payload))]
pub async fn create_course(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    ValidatedJson(payload): ValidatedJson<CreateCoursePayload>,
) -> Result<ApiResponse<CourseResponse>, AppError> {
    info!("Admin {} creating course '{}'", admin.id, payload.title);
    debug!("Create course payload: {:?}", payload);

    let new_course = NewCourse {
        title: payload.title.trim().to_string(),
        description: payload.description,
        is_public: payload.is_public,
        category: payload.category,
        difficulty: payload.difficulty,
        thumbnail_url: payload.thumbnail_url,
        created_by: Some(admin.id),
    };
    let course = helper::run_query(&pool, move |conn| {
        diesel::insert_into(courses::table)
            .values(&new_course)
            .returning(Course::as_returning())
            .get_result(conn)
    })
    .await?;

    info!("Created course {}", course.id);
    Ok(ApiResponse::created(CourseResponse::build(course, vec![])))
}

/// Fetches one course with its ordered module ids.
///
/// Returns (wrapped in `ApiResponse`)
/// * `CourseResponse` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the course does not exist or is hidden from the caller.
#[instrument(skip(pool))]
pub async fn get_course(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(course_id): Path<i64>,
) -> Result<ApiResponse<CourseResponse>, AppError> {
    let (user_id, is_admin) = (user.id, user.is_admin());
    let (course, module_ids) = helper::run_transaction(&pool, move |conn| {
        let course = visible_course(conn, course_id, user_id, is_admin)?;
        let module_ids = course_module_ids(conn, course_id)?;
        Ok((course, module_ids))
    })
    .await?;

    Ok(ApiResponse::ok(CourseResponse::build(course, module_ids)))
}

/// Updates the given course fields.
///
/// Request Body: `UpdateCoursePayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `CourseResponse` (200 OK).
/// * `400 Bad Request`: If the payload fails validation.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the course does not exist.
#[instrument(skip(pool, payload))]
pub async fn update_course(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path(course_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateCoursePayload>,
) -> Result<ApiResponse<CourseResponse>, AppError> {
    info!("Admin {} updating course {}", admin.id, course_id);
    debug!("Update course payload: {:?}", payload);

    let changes = CourseChangeset {
        title: payload.title.map(|t| t.trim().to_string()),
        description: payload.description,
        is_public: payload.is_public,
        category: payload.category,
        difficulty: payload.difficulty,
        thumbnail_url: payload.thumbnail_url,
        updated_at: Utc::now(),
    };

    let (course, module_ids) = helper::run_transaction(&pool, move |conn| {
        let course = diesel::update(courses::table.find(course_id))
            .set(&changes)
            .returning(Course::as_returning())
            .get_result(conn)
            .optional()?
            .ok_or_else(|| course_not_found(course_id))?;
        let module_ids = course_module_ids(conn, course_id)?;
        Ok((course, module_ids))
    })
    .await?;

    Ok(ApiResponse::ok(CourseResponse::build(course, module_ids)))
}

/// Deletes a course with its modules and enrollments.
///
/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true (200 OK).
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the course does not exist.
#[instrument(skip(pool))]
pub async fn delete_course(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path(course_id): Path<i64>,
) -> Result<ApiResponse<bool>, AppError> {
    info!("Admin {} deleting course {}", admin.id, course_id);

    let deleted = helper::run_query(&pool, move |conn| {
        diesel::delete(courses::table.find(course_id)).execute(conn)
    })
    .await?;

    if deleted == 0 {
        warn!("Delete targeted missing course {}", course_id);
        return Err(course_not_found(course_id));
    }
    Ok(ApiResponse::ok(true))
}

/// Lists a course's modules in order.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<CourseModule>` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the course does not exist or is hidden from the caller.
#[instrument(skip(pool))]
pub async fn list_modules(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(course_id): Path<i64>,
) -> Result<ApiResponse<Vec<CourseModule>>, AppError> {
    let (user_id, is_admin) = (user.id, user.is_admin());
    let modules = helper::run_transaction(&pool, move |conn| {
        visible_course(conn, course_id, user_id, is_admin)?;
        let modules = course_modules::table
            .filter(course_modules::course_id.eq(course_id))
            .order((course_modules::position.asc(), course_modules::id.asc()))
            .select(CourseModule::as_select())
            .load(conn)?;
        Ok(modules)
    })
    .await?;

    debug!("Course {} has {} modules", course_id, modules.len());
    Ok(ApiResponse::ok(modules))
}

/// Adds a module to a course, appended last unless a position is given.
///
/// Request Body: `CreateModulePayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `CourseModule` (201 Created).
/// * `400 Bad Request`: If the payload fails validation.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the course does not exist.
#[instrument(skip(pool, payload))]
pub async fn create_module(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path(course_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<CreateModulePayload>,
) -> Result<ApiResponse<CourseModule>, AppError> {
    info!("Admin {} adding module to course {}", admin.id, course_id);
    debug!("Create module payload: {:?}", payload);

    let module = helper::run_transaction(&pool, move |conn| {
        let exists = diesel::dsl::select(diesel::dsl::exists(courses::table.find(course_id)))
            .get_result::<bool>(conn)?;
        if !exists {
            return Err(course_not_found(course_id));
        }

        let position = match payload.position {
            Some(position) => position,
            None => course_modules::table
                .filter(course_modules::course_id.eq(course_id))
                .select(diesel::dsl::max(course_modules::position))
                .first::<Option<i32>>(conn)?
                .map_or(0, |last| last + 1),
        };

        let new_module = NewCourseModule {
            course_id,
            position,
            title: payload.title.trim().to_string(),
            content: payload.content,
            video_url: payload.video_url,
            code_example: payload.code_example,
            code_language: payload.code_language.map(|l| l.as_str().to_string()),
        };
        let module = diesel::insert_into(course_modules::table)
            .values(&new_module)
            .returning(CourseModule::as_returning())
            .get_result(conn)?;

        recompute_progress(conn, course_id)?;
        Ok(module)
    })
    .await?;

    info!("Created module {} in course {}", module.id, course_id);
    Ok(ApiResponse::created(module))
}

/// Updates a module's fields.
///
/// Request Body: `UpdateModulePayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `CourseModule` (200 OK).
/// * `400 Bad Request`: If the payload fails validation.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the module does not exist in that course.
#[instrument(skip(pool, payload))]
pub async fn update_module(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path((course_id, module_id)): Path<(i64, i64)>,
    ValidatedJson(payload): ValidatedJson<UpdateModulePayload>,
) -> Result<ApiResponse<CourseModule>, AppError> {
    info!(
        "Admin {} updating module {} of course {}",
        admin.id, module_id, course_id
    );
    debug!("Update module payload: {:?}", payload);

    let changes = CourseModuleChangeset {
        position: payload.position,
        title: payload.title.map(|t| t.trim().to_string()),
        content: payload.content,
        video_url: payload.video_url,
        code_example: payload.code_example,
        code_language: payload.code_language.map(|l| l.as_str().to_string()),
        updated_at: Utc::now(),
    };

    let module = helper::run_query(&pool, move |conn| {
        diesel::update(
            course_modules::table
                .filter(course_modules::id.eq(module_id))
                .filter(course_modules::course_id.eq(course_id)),
        )
        .set(&changes)
        .returning(CourseModule::as_returning())
        .get_result(conn)
        .optional()
    })
    .await?
    .ok_or_else(|| module_not_found(course_id, module_id))?;

    Ok(ApiResponse::ok(module))
}

/// Deletes a module and re-derives the progress of every enrollment in the course.
///
/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true (200 OK).
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the module does not exist in that course.
#[instrument(skip(pool))]
pub async fn delete_module(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path((course_id, module_id)): Path<(i64, i64)>,
) -> Result<ApiResponse<bool>, AppError> {
    info!(
        "Admin {} deleting module {} of course {}",
        admin.id, module_id, course_id
    );

    helper::run_transaction(&pool, move |conn| {
        let deleted = diesel::delete(
            course_modules::table
                .filter(course_modules::id.eq(module_id))
                .filter(course_modules::course_id.eq(course_id)),
        )
        .execute(conn)?;
        if deleted == 0 {
            return Err(module_not_found(course_id, module_id));
        }
        recompute_progress(conn, course_id)?;
        Ok(())
    })
    .await?;

    Ok(ApiResponse::ok(true))
}

/// Enrolls the caller. Enrolling again returns the existing enrollment with
/// `alreadyEnrolled = true` and leaves the enrollment count untouched.
///
/// Returns (wrapped in `ApiResponse`)
/// * `EnrollResponse` (201 Created for a new enrollment, 200 OK otherwise).
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the course does not exist or is hidden from the caller.
#[instrument(skip(pool))]
pub async fn enroll(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(course_id): Path<i64>,
) -> Result<ApiResponse<EnrollResponse>, AppError> {
    info!("User {} enrolling in course {}", user.id, course_id);
    let (user_id, is_admin) = (user.id, user.is_admin());

    let response = helper::run_transaction(&pool, move |conn| {
        visible_course(conn, course_id, user_id, is_admin)?;

        let inserted = diesel::insert_into(course_enrollments::table)
            .values(&NewCourseEnrollment { course_id, user_id })
            .on_conflict((course_enrollments::course_id, course_enrollments::user_id))
            .do_nothing()
            .returning(CourseEnrollment::as_returning())
            .get_result(conn)
            .optional()?;

        match inserted {
            Some(enrollment) => {
                diesel::update(courses::table.find(course_id))
                    .set(courses::enrollment_count.eq(courses::enrollment_count + 1))
                    .execute(conn)?;
                Ok(EnrollResponse {
                    enrollment,
                    already_enrolled: false,
                })
            }
            None => {
                let enrollment = course_enrollments::table
                    .filter(course_enrollments::course_id.eq(course_id))
                    .filter(course_enrollments::user_id.eq(user_id))
                    .select(CourseEnrollment::as_select())
                    .first(conn)?;
                Ok(EnrollResponse {
                    enrollment,
                    already_enrolled: true,
                })
            }
        }
    })
    .await?;

    if response.already_enrolled {
        debug!("User {} was already enrolled in {}", user_id, course_id);
        Ok(ApiResponse::ok(response))
    } else {
        info!("User {} enrolled in course {}", user_id, course_id);
        Ok(ApiResponse::success(StatusCode::CREATED, response))
    }
}

/// Returns the caller's enrollment in a course and marks it as accessed.
///
/// Returns (wrapped in `ApiResponse`)
/// * `CourseEnrollment` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `404 Not Found`: If the caller is not enrolled in the course.
#[instrument(skip(pool))]
pub async fn get_progress(
    State(pool): State<Pool>,
    user: AuthUser,
    Path(course_id): Path<i64>,
) -> Result<ApiResponse<CourseEnrollment>, AppError> {
    let user_id = user.id;
    let enrollment = helper::run_query(&pool, move |conn| {
        diesel::update(
            course_enrollments::table
                .filter(course_enrollments::course_id.eq(course_id))
                .filter(course_enrollments::user_id.eq(user_id)),
        )
        .set(course_enrollments::last_accessed_at.eq(Utc::now()))
        .returning(CourseEnrollment::as_returning())
        .get_result(conn)
        .optional()
    })
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!("You are not enrolled in course {}", course_id))
    })?;

    Ok(ApiResponse::ok(enrollment))
}

/// Marks a module as completed for the caller and recomputes their progress.
///
/// Returns (wrapped in `ApiResponse`)
/// * `CourseEnrollment`: the updated enrollment (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
/// * `403 Forbidden`: If the caller is not enrolled in the course.
/// * `404 Not Found`: If the module does not exist in that course.
#[instrument(skip(pool))]
pub async fn complete_module(
    State(pool): State<Pool>,
    user: AuthUser,
    Path((course_id, module_id)): Path<(i64, i64)>,
) -> Result<ApiResponse<CourseEnrollment>, AppError> {
    info!(
        "User {} completing module {} of course {}",
        user.id, module_id, course_id
    );
    let user_id = user.id;

    let enrollment = helper::run_transaction(&pool, move |conn| {
        let module_ids = course_module_ids(conn, course_id)?;
        if !module_ids.contains(&module_id) {
            return Err(module_not_found(course_id, module_id));
        }

        let enrollment = course_enrollments::table
            .filter(course_enrollments::course_id.eq(course_id))
            .filter(course_enrollments::user_id.eq(user_id))
            .select(CourseEnrollment::as_select())
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(|| {
                warn!("User {} is not enrolled in course {}", user_id, course_id);
                AppError::Forbidden("Enroll in the course first".to_string())
            })?;

        let mut completed = enrollment.completed_module_ids;
        if !completed.contains(&module_id) {
            completed.push(module_id);
        }
        let progress = compute_progress(&completed, &module_ids);

        let updated = diesel::update(course_enrollments::table.find(enrollment.id))
            .set((
                course_enrollments::completed_module_ids.eq(completed),
                course_enrollments::progress.eq(progress),
                course_enrollments::last_accessed_at.eq(Utc::now()),
            ))
            .returning(CourseEnrollment::as_returning())
            .get_result(conn)?;
        Ok(updated)
    })
    .await?;

    debug!(
        "User {} progress in course {} is now {}%",
        user_id, course_id, enrollment.progress
    );
    Ok(ApiResponse::ok(enrollment))
}

/// Lists the caller's enrollments, most recent first.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<CourseEnrollment>` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
#[instrument(skip(pool))]
pub async fn list_enrollments(
    State(pool): State<Pool>,
    user: AuthUser,
) -> Result<ApiResponse<Vec<CourseEnrollment>>, AppError> {
    let user_id = user.id;
    let enrollments = helper::run_query(&pool, move |conn| {
        course_enrollments::table
            .filter(course_enrollments::user_id.eq(user_id))
            .order((
                course_enrollments::enrolled_at.desc(),
                course_enrollments::id.desc(),
            ))
            .select(CourseEnrollment::as_select())
            .load(conn)
    })
    .await?;

    Ok(ApiResponse::ok(enrollments))
}
