use super::helper;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::model::user::LeaderboardEntry;
use crate::payloads::leaderboard::LeaderboardParams;
use crate::response::ApiResponse;
use crate::schema::users;
use axum::extract::{Query, State};
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use tracing::{debug, instrument};

/// Global ranking by points, then problems solved, then earliest account.
///
/// Query Parameters: `LeaderboardParams` (`limit`, default 50, at most 100)
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<LeaderboardEntry>` with 1-based ranks (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
#[instrument(skip(pool))]
pub async fn get_leaderboard(
    State(pool): State<Pool>,
    user: AuthUser,
    Query(params): Query<LeaderboardParams>,
) -> Result<ApiResponse<Vec<LeaderboardEntry>>, AppError> {
    let limit = helper::page_size(params.limit);
    debug!("User {} reading top {} of the leaderboard", user.id, limit);

    let rows = helper::run_query(&pool, move |conn| {
        users::table
            .order((
                users::points.desc(),
                users::problems_solved.desc(),
                users::id.asc(),
            ))
            .limit(limit)
            .select((
                users::id,
                users::display_name,
                users::avatar_url,
                users::points,
                users::problems_solved,
                users::streak,
            ))
            .load::<(i64, String, Option<String>, i32, i32, i32)>(conn)
    })
    .await?;

    let entries = rows
        .into_iter()
        .zip(1..)
        .map(
            |((user_id, display_name, avatar_url, points, problems_solved, streak), rank)| {
                LeaderboardEntry {
                    rank,
                    user_id,
                    display_name,
                    avatar_url,
                    points,
                    problems_solved,
                    streak,
                }
            },
        )
        .collect();

    Ok(ApiResponse::ok(entries))
}
