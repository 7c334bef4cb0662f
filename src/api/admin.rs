use super::helper;
use crate::auth::{AdminUser, AuthUser};
use crate::errors::AppError;
use crate::model::admin::{
    AnalyticsResponse, Announcement, Group, GroupResponse, NewAnnouncement, NewGroup,
    NewGroupMember, RoleResponse,
};
use crate::model::submission::SubmissionStatus;
use crate::model::user::{Role, User, UserProfile};
use crate::payloads::admin::{
    AddGroupMembersPayload, CreateAnnouncementPayload, CreateGroupPayload, ListUsersParams,
    UpdateRolePayload,
};
use crate::response::ApiResponse;
use crate::schema::{
    announcements, assignments, contests, course_enrollments, courses, group_members, groups,
    problems, submissions, users,
};
use crate::validation::ValidatedJson;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

fn user_not_found(user_id: i64) -> AppError {
    AppError::NotFound(format!("User with ID {} not found", user_id))
}

fn group_not_found(group_id: i64) -> AppError {
    AppError::NotFound(format!("Group with ID {} not found", group_id))
}

fn member_ids_by_group(
    conn: &mut PgConnection,
    group_ids: Vec<i64>,
) -> QueryResult<HashMap<i64, Vec<i64>>> {
    let rows = group_members::table
        .filter(group_members::group_id.eq_any(group_ids))
        .order((group_members::group_id.asc(), group_members::user_id.asc()))
        .select((group_members::group_id, group_members::user_id))
        .load::<(i64, i64)>(conn)?;

    let mut grouped: HashMap<i64, Vec<i64>> = HashMap::new();
    for (group_id, user_id) in rows {
        grouped.entry(group_id).or_default().push(user_id);
    }
    Ok(grouped)
}

fn group_response(group: Group, member_ids: Vec<i64>) -> GroupResponse {
    GroupResponse {
        id: group.id,
        name: group.name,
        description: group.description,
        member_ids,
        created_at: group.created_at,
    }
}

/// Adds members to a group, skipping the ones already in it.
fn insert_members(
    conn: &mut PgConnection,
    group_id: i64,
    user_ids: &[i64],
) -> Result<usize, AppError> {
    let members: Vec<NewGroupMember> = user_ids
        .iter()
        .map(|&user_id| NewGroupMember { group_id, user_id })
        .collect();

    let added = diesel::insert_into(group_members::table)
        .values(&members)
        .on_conflict_do_nothing()
        .execute(conn)
        .map_err(|err| helper::not_found_on_fk(err, "One or more users do not exist"))?;
    Ok(added)
}

fn load_group(conn: &mut PgConnection, group_id: i64) -> Result<GroupResponse, AppError> {
    let group = groups::table
        .find(group_id)
        .select(Group::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| group_not_found(group_id))?;
    let member_ids = member_ids_by_group(conn, vec![group_id])?
        .remove(&group_id)
        .unwrap_or_default();
    Ok(group_response(group, member_ids))
}

/// Lists users, optionally filtered by role or by a name/email search.
///
/// Query Parameters: `ListUsersParams` (`role`, `search`, `limit`)
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<UserProfile>` (200 OK).
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
#[instrument(skip(pool))]
pub async fn list_users(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Query(params): Query<ListUsersParams>,
) -> Result<ApiResponse<Vec<UserProfile>>, AppError> {
    info!("Admin {} listing users", admin.id);
    let limit = helper::page_size(params.limit);

    let rows = helper::run_query(&pool, move |conn| {
        let mut query = users::table.into_boxed();
        if let Some(role) = params.role {
            query = query.filter(users::role.eq(role.as_str()));
        }
        if let Some(search) = params.search.filter(|s| !s.trim().is_empty()) {
            let pattern = helper::like_pattern(search.trim());
            query = query.filter(
                users::email
                    .ilike(pattern.clone())
                    .or(users::display_name.ilike(pattern)),
            );
        }
        query
            .order(users::id.asc())
            .limit(limit)
            .select(User::as_select())
            .load(conn)
    })
    .await?;

    Ok(ApiResponse::ok(
        rows.into_iter().map(UserProfile::from).collect(),
    ))
}

/// Returns (wrapped in `ApiResponse`)
/// * `RoleResponse` (200 OK).
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the user does not exist.
#[instrument(skip(pool))]
pub async fn get_user_role(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
) -> Result<ApiResponse<RoleResponse>, AppError> {
    debug!("Admin {} reading role of user {}", admin.id, user_id);

    let user = helper::run_query(&pool, move |conn| {
        users::table
            .find(user_id)
            .select(User::as_select())
            .first(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| user_not_found(user_id))?;

    Ok(ApiResponse::ok(RoleResponse {
        user_id: user.id,
        role: user.role(),
    }))
}

/// Changes a user's role. Takes effect on the user's next request.
///
/// Request Body: `UpdateRolePayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `RoleResponse` (200 OK).
/// * `400 Bad Request`: If an admin tries to demote themselves.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the user does not exist.
#[instrument(skip(pool, payload))]
pub async fn update_user_role(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateRolePayload>,
) -> Result<ApiResponse<RoleResponse>, AppError> {
    info!(
        "Admin {} setting role of user {} to {}",
        admin.id, user_id, payload.role
    );

    if user_id == admin.id && payload.role != Role::Admin {
        warn!("Admin {} tried to demote themselves", admin.id);
        return Err(AppError::BadRequest(
            "Admins cannot remove their own admin role".to_string(),
        ));
    }

    let role = payload.role;
    let user = helper::run_query(&pool, move |conn| {
        diesel::update(users::table.find(user_id))
            .set((
                users::role.eq(role.as_str()),
                users::updated_at.eq(Utc::now()),
            ))
            .returning(User::as_returning())
            .get_result(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| user_not_found(user_id))?;

    Ok(ApiResponse::ok(RoleResponse {
        user_id: user.id,
        role: user.role(),
    }))
}

/// Returns (wrapped in `ApiResponse`)
/// * `Vec<GroupResponse>` ordered by name (200 OK).
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
#[instrument(skip(pool))]
pub async fn list_groups(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
) -> Result<ApiResponse<Vec<GroupResponse>>, AppError> {
    debug!("Admin {} listing groups", admin.id);

    let (rows, mut members) = helper::run_query(&pool, |conn| {
        let rows = groups::table
            .order((groups::name.asc(), groups::id.asc()))
            .select(Group::as_select())
            .load(conn)?;
        let members = member_ids_by_group(conn, rows.iter().map(|g| g.id).collect())?;
        Ok((rows, members))
    })
    .await?;

    let responses = rows
        .into_iter()
        .map(|group| {
            let member_ids = members.remove(&group.id).unwrap_or_default();
            group_response(group, member_ids)
        })
        .collect();
    Ok(ApiResponse::ok(responses))
}

/// Creates a group with optional initial members.
///
/// Request Body: `CreateGroupPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `GroupResponse` (201 Created).
/// * `400 Bad Request`: If the payload fails validation.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If an initial member does not exist.
#[instrument(skip(pool, payload))]
pub async fn create_group(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    ValidatedJson(payload): ValidatedJson<CreateGroupPayload>,
) -> Result<ApiResponse<GroupResponse>, AppError> {
    info!("Admin {} creating group '{}'", admin.id, payload.name);
    debug!("Create group payload: {:?}", payload);

    let new_group = NewGroup {
        name: payload.name.trim().to_string(),
        description: payload.description,
        created_by: Some(admin.id),
    };
    let member_ids = payload.member_ids;

    let group = helper::run_transaction(&pool, move |conn| {
        let group_id = diesel::insert_into(groups::table)
            .values(&new_group)
            .returning(groups::id)
            .get_result::<i64>(conn)?;
        if !member_ids.is_empty() {
            insert_members(conn, group_id, &member_ids)?;
        }
        load_group(conn, group_id)
    })
    .await?;

    info!("Created group {} with {} members", group.id, group.member_ids.len());
    Ok(ApiResponse::created(group))
}

/// Adds users to a group. Existing members are left as they are.
///
/// Request Body: `AddGroupMembersPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `GroupResponse` (200 OK).
/// * `400 Bad Request`: If the payload fails validation.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the group or one of the users does not exist.
#[instrument(skip(pool, payload))]
pub async fn add_group_members(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path(group_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<AddGroupMembersPayload>,
) -> Result<ApiResponse<GroupResponse>, AppError> {
    info!(
        "Admin {} adding {} users to group {}",
        admin.id,
        payload.user_ids.len(),
        group_id
    );

    let group = helper::run_transaction(&pool, move |conn| {
        let exists = diesel::dsl::select(diesel::dsl::exists(groups::table.find(group_id)))
            .get_result::<bool>(conn)?;
        if !exists {
            return Err(group_not_found(group_id));
        }
        let added = insert_members(conn, group_id, &payload.user_ids)?;
        debug!("Added {} new members to group {}", added, group_id);
        load_group(conn, group_id)
    })
    .await?;

    Ok(ApiResponse::ok(group))
}

/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true (200 OK).
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the user is not a member of the group.
#[instrument(skip(pool))]
pub async fn remove_group_member(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> Result<ApiResponse<bool>, AppError> {
    info!(
        "Admin {} removing user {} from group {}",
        admin.id, user_id, group_id
    );

    let removed = helper::run_query(&pool, move |conn| {
        diesel::delete(group_members::table.find((group_id, user_id))).execute(conn)
    })
    .await?;

    if removed == 0 {
        return Err(AppError::NotFound(format!(
            "User {} is not a member of group {}",
            user_id, group_id
        )));
    }
    Ok(ApiResponse::ok(true))
}

/// Every announcement, newest first.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<Announcement>` (200 OK).
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
#[instrument(skip(pool))]
pub async fn list_all_announcements(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
) -> Result<ApiResponse<Vec<Announcement>>, AppError> {
    debug!("Admin {} listing announcements", admin.id);

    let rows = helper::run_query(&pool, |conn| {
        announcements::table
            .order((announcements::created_at.desc(), announcements::id.desc()))
            .select(Announcement::as_select())
            .load(conn)
    })
    .await?;

    Ok(ApiResponse::ok(rows))
}

/// Publishes an announcement to everyone, or to one group when `groupId` is set.
///
/// Request Body: `CreateAnnouncementPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `Announcement` (201 Created).
/// * `400 Bad Request`: If the payload fails validation.
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
/// * `404 Not Found`: If the target group does not exist.
#[instrument(skip(pool, payload))]
pub async fn create_announcement(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
    ValidatedJson(payload): ValidatedJson<CreateAnnouncementPayload>,
) -> Result<ApiResponse<Announcement>, AppError> {
    info!(
        "Admin {} announcing '{}' to {:?}",
        admin.id, payload.title, payload.group_id
    );

    let group_id = payload.group_id;
    let new_announcement = NewAnnouncement {
        title: payload.title.trim().to_string(),
        body: payload.body,
        group_id,
        created_by: Some(admin.id),
    };

    let announcement = helper::run_transaction(&pool, move |conn| {
        diesel::insert_into(announcements::table)
            .values(&new_announcement)
            .returning(Announcement::as_returning())
            .get_result(conn)
            .map_err(|err| {
                helper::not_found_on_fk(
                    err,
                    format!("Group with ID {} not found", group_id.unwrap_or_default()),
                )
            })
    })
    .await?;

    Ok(ApiResponse::created(announcement))
}

/// Announcements addressed to everyone or to one of the caller's groups.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<Announcement>` newest first (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
#[instrument(skip(pool))]
pub async fn list_my_announcements(
    State(pool): State<Pool>,
    user: AuthUser,
) -> Result<ApiResponse<Vec<Announcement>>, AppError> {
    let user_id = user.id;

    let rows = helper::run_query(&pool, move |conn| {
        let my_groups = group_members::table
            .filter(group_members::user_id.eq(user_id))
            .select(group_members::group_id)
            .load::<i64>(conn)?;

        announcements::table
            .filter(
                announcements::group_id
                    .is_null()
                    .or(announcements::group_id.eq_any(my_groups)),
            )
            .order((announcements::created_at.desc(), announcements::id.desc()))
            .select(Announcement::as_select())
            .load(conn)
    })
    .await?;

    debug!("User {} has {} announcements", user_id, rows.len());
    Ok(ApiResponse::ok(rows))
}

/// Platform-wide totals. `acceptanceRate` is the accepted share of all
/// submissions as a percentage, 0 when nothing was submitted.
///
/// Returns (wrapped in `ApiResponse`)
/// * `AnalyticsResponse` (200 OK).
/// * `401 Unauthorized` / `403 Forbidden`: If the caller is not an admin.
#[instrument(skip(pool))]
pub async fn get_analytics(
    State(pool): State<Pool>,
    AdminUser(admin): AdminUser,
) -> Result<ApiResponse<AnalyticsResponse>, AppError> {
    info!("Admin {} requesting analytics", admin.id);

    let analytics = helper::run_query(&pool, |conn| {
        let total_users = users::table.count().get_result::<i64>(conn)?;
        let admins = users::table
            .filter(users::role.eq(Role::Admin.as_str()))
            .count()
            .get_result::<i64>(conn)?;
        let students = users::table
            .filter(users::role.eq(Role::Student.as_str()))
            .count()
            .get_result::<i64>(conn)?;
        let submissions_total = submissions::table.count().get_result::<i64>(conn)?;
        let accepted_submissions = submissions::table
            .filter(submissions::status.eq(SubmissionStatus::Accepted.as_str()))
            .count()
            .get_result::<i64>(conn)?;

        Ok(AnalyticsResponse {
            total_users,
            students,
            admins,
            problems: problems::table.count().get_result(conn)?,
            submissions: submissions_total,
            accepted_submissions,
            acceptance_rate: acceptance_rate(accepted_submissions, submissions_total),
            courses: courses::table.count().get_result(conn)?,
            enrollments: course_enrollments::table.count().get_result(conn)?,
            contests: contests::table.count().get_result(conn)?,
            assignments: assignments::table.count().get_result(conn)?,
        })
    })
    .await?;

    Ok(ApiResponse::ok(analytics))
}

/// Percentage rounded to two decimals.
fn acceptance_rate(accepted: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (accepted as f64 / total as f64 * 10_000.0).round() / 100.0
}
