use crate::auth::AuthSettings;
use crate::auth::google::GoogleOAuth;
use crate::execution::CodeExecutor;
use axum::extract::FromRef;
use deadpool_diesel::postgres::Pool;
use std::sync::Arc;

/// Shared router state. Cloned per request, so everything heavy sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub auth: Arc<AuthSettings>,
    pub executor: Arc<dyn CodeExecutor>,
    /// `None` when Google sign-in is not configured.
    pub google: Option<Arc<GoogleOAuth>>,
}

impl FromRef<AppState> for Pool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
