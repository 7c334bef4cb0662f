use crate::auth::AuthSettings;
use crate::auth::google::GoogleOAuth;
use crate::cli::Args;
use crate::execution::{CodeExecutor, MockExecutor};
use crate::state::AppState;
use anyhow::Context;
use axum::Router;
use axum::routing::{delete, get, post, put};
use deadpool_diesel::Runtime;
use deadpool_diesel::postgres::{Manager, Pool};
use std::sync::Arc;
use tracing::info;
use url::Url;

pub mod auth;
pub mod cli;
pub mod contest;
pub mod errors;
pub mod evaluation;
pub mod execution;
pub mod grading;
pub mod model;
pub mod payloads;
pub mod response;
pub mod schema;
pub mod state;
pub mod validation;

mod api;

/// Signing secret used by [`init_test_router`].
pub const TEST_JWT_SECRET: &str = "test-signing-secret";
const TEST_BCRYPT_COST: u32 = 4;

pub fn init_router(args: &Args) -> anyhow::Result<Router> {
    info!("Initializing database pool...");
    let pool = init_pool(&args.connection_str, args.db_pool_max_size)
        .context("Failed to initialize database pool")?;

    let auth = AuthSettings {
        jwt_secret: args.jwt_secret.clone(),
        token_ttl: chrono::Duration::hours(args.jwt_expiry_hours),
        bcrypt_cost: args.bcrypt_cost,
        cookie_secure: args.cookie_secure,
        frontend_url: args.frontend_url.clone(),
    };

    let google = match args.google_oauth() {
        Some(config) => {
            info!("Google sign-in enabled for client {}", config.client_id);
            Some(Arc::new(GoogleOAuth::new(config)))
        }
        None => {
            info!("Google sign-in disabled (client id, secret or redirect URL missing)");
            None
        }
    };

    info!(
        "Initializing mock executor with pass rate {}...",
        args.mock_pass_rate
    );
    let executor = MockExecutor::new(args.mock_pass_rate);

    info!("Initializing router...");
    Ok(init_router_internal(AppState {
        pool,
        auth: Arc::new(auth),
        executor: Arc::new(executor),
        google,
    }))
}

/// Same routes as production with a fixed secret, cheap hashing and the given executor.
pub fn init_test_router(pool: Pool, executor: Arc<dyn CodeExecutor>) -> anyhow::Result<Router> {
    let auth = AuthSettings {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        token_ttl: chrono::Duration::hours(1),
        bcrypt_cost: TEST_BCRYPT_COST,
        cookie_secure: false,
        frontend_url: Url::parse("http://localhost:5173")?,
    };

    Ok(init_router_internal(AppState {
        pool,
        auth: Arc::new(auth),
        executor,
        google: None,
    }))
}

pub fn init_pool(conn_str: &str, max_size: u32) -> anyhow::Result<Pool> {
    let manager = Manager::new(conn_str, Runtime::Tokio1);
    let pool = Pool::builder(manager).max_size(max_size as usize).build()?;
    Ok(pool)
}

fn init_router_internal(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth_routes())
        .merge(problem_routes())
        .merge(submission_routes())
        .merge(contest_routes())
        .merge(course_routes())
        .merge(assignment_routes())
        .merge(leaderboard_routes())
        .merge(admin_routes());

    Router::new().nest("/api", api).with_state(state)
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        // public routes go here
        .route("/auth/register", post(api::auth::register))
        .route("/auth/login", post(api::auth::login))
        .route(
            "/auth/google",
            get(api::auth::google_redirect).post(api::auth::google_credential),
        )
        .route("/auth/google/callback", get(api::auth::google_callback))
        .route("/auth/logout", post(api::auth::logout))
        // protected routes go here
        .route(
            "/auth/user",
            get(api::auth::current_user).put(api::auth::update_profile),
        )
}

fn problem_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/problems",
            get(api::problems::list_problems).post(api::problems::create_problem),
        )
        .route(
            "/problems/{id}",
            get(api::problems::get_problem)
                .put(api::problems::update_problem)
                .delete(api::problems::delete_problem),
        )
}

fn submission_routes() -> Router<AppState> {
    Router::new()
        .route("/run-code", post(api::submissions::run_code))
        .route(
            "/submissions",
            get(api::submissions::list_submissions).post(api::submissions::submit_solution),
        )
        .route("/submissions/{id}", get(api::submissions::get_submission))
}

fn contest_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/contests",
            get(api::contests::list_contests).post(api::contests::create_contest),
        )
        .route("/contests/{id}", get(api::contests::get_contest))
        .route(
            "/contests/{id}/register",
            post(api::contests::register_for_contest),
        )
        .route(
            "/contests/{id}/leaderboard",
            get(api::contests::contest_leaderboard),
        )
}

fn course_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/courses",
            get(api::courses::list_courses).post(api::courses::create_course),
        )
        .route(
            "/courses/{id}",
            get(api::courses::get_course)
                .put(api::courses::update_course)
                .delete(api::courses::delete_course),
        )
        .route(
            "/courses/{id}/modules",
            get(api::courses::list_modules).post(api::courses::create_module),
        )
        .route(
            "/courses/{id}/modules/{module_id}",
            put(api::courses::update_module).delete(api::courses::delete_module),
        )
        .route(
            "/courses/{id}/modules/{module_id}/complete",
            post(api::courses::complete_module),
        )
        .route("/courses/{id}/enroll", post(api::courses::enroll))
        .route("/courses/{id}/progress", get(api::courses::get_progress))
        .route("/enrollments", get(api::courses::list_enrollments))
}

fn assignment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/assignments",
            get(api::assignments::list_assignments).post(api::assignments::create_assignment),
        )
        .route(
            "/assignments/{id}",
            get(api::assignments::get_assignment)
                .put(api::assignments::update_assignment)
                .delete(api::assignments::delete_assignment),
        )
        .route(
            "/assignments/{id}/submission",
            get(api::assignments::get_my_submission).post(api::assignments::save_answers),
        )
        .route(
            "/assignments/{id}/submit",
            post(api::assignments::submit_assignment),
        )
        .route(
            "/assignments/{id}/submissions",
            get(api::assignments::list_assignment_submissions),
        )
}

fn leaderboard_routes() -> Router<AppState> {
    Router::new().route("/leaderboard", get(api::leaderboard::get_leaderboard))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(api::admin::list_users))
        .route(
            "/admin/users/{id}/role",
            get(api::admin::get_user_role).patch(api::admin::update_user_role),
        )
        .route(
            "/admin/groups",
            get(api::admin::list_groups).post(api::admin::create_group),
        )
        .route(
            "/admin/groups/{id}/members",
            post(api::admin::add_group_members),
        )
        .route(
            "/admin/groups/{id}/members/{user_id}",
            delete(api::admin::remove_group_member),
        )
        .route(
            "/admin/announcements",
            get(api::admin::list_all_announcements).post(api::admin::create_announcement),
        )
        .route("/admin/analytics", get(api::admin::get_analytics))
        .route("/announcements", get(api::admin::list_my_announcements))
}
