use crate::errors::AppError;
use deadpool_diesel::postgres::Pool;
use diesel::{Connection, PgConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::{debug, error, warn};

pub(crate) const DEFAULT_PAGE_SIZE: i64 = 50;
pub(crate) const MAX_PAGE_SIZE: i64 = 100;

pub(crate) async fn run_query<T, F>(pool: &Pool, query: F) -> Result<T, AppError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, DieselError> + Send + 'static,
    T: Send + 'static,
{
    let conn = pool.get().await.map_err(|pool_err| {
        error!(
            "Failed to get DB connection object from pool: {:?}",
            pool_err
        );
        AppError::from(pool_err)
    })?;
    debug!("DB connection object obtained from pool for interaction");

    match conn.interact(query).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(diesel_err)) => {
            error!("Diesel query failed within interaction: {:?}", diesel_err);
            Err(AppError::from(diesel_err))
        }
        Err(interact_err) => {
            error!("Deadpool interact error: {:?}", interact_err);
            Err(AppError::from(interact_err))
        }
    }
}

/// Runs `body` inside a single database transaction; any `Err` rolls it back.
pub(crate) async fn run_transaction<T, F>(pool: &Pool, body: F) -> Result<T, AppError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let conn = pool.get().await?;
    conn.interact(move |conn_sync| conn_sync.transaction(body))
        .await?
}

/// Maps a foreign key violation to `404` with `message`; other errors pass through.
pub(crate) fn not_found_on_fk(err: DieselError, message: impl Into<String>) -> AppError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            warn!("Foreign key violation: {}", info.message());
            AppError::NotFound(message.into())
        }
        other => AppError::from(other),
    }
}

/// Maps a unique violation to `409` with `message`; other errors pass through.
pub(crate) fn conflict_on_unique(err: DieselError, message: impl Into<String>) -> AppError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            warn!("Unique constraint violation: {}", info.message());
            AppError::Conflict(message.into())
        }
        other => AppError::from(other),
    }
}

/// Clamps a `limit` query parameter into `1..=MAX_PAGE_SIZE`.
pub(crate) fn page_size(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Escapes `%`, `_` and `\` so user input matches literally inside `ILIKE`.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
