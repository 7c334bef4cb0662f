//! Authentication: token issuing, password hashing, Google sign-in and the
//! request extractors that guard protected routes.

pub mod google;
pub mod jwt;
pub mod password;

use crate::api::helper;
use crate::errors::AppError;
use crate::model::user::{Role, User};
use crate::schema::users;
use crate::state::AppState;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Duration;
use diesel::prelude::*;
use tracing::{debug, warn};
use url::Url;

/// Cookie set by the login and OAuth endpoints.
pub const SESSION_COOKIE: &str = "token";
/// Older clients still send this name.
pub const LEGACY_SESSION_COOKIE: &str = "auth_token";
/// Carries the OAuth `state` value between the redirect and the callback.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_TTL_SECS: i64 = 600;

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
    pub frontend_url: Url,
}

impl AuthSettings {
    pub fn issue_token(&self, user_id: i64, role: Role) -> Result<String, AppError> {
        jwt::issue_token(user_id, role.as_str(), &self.jwt_secret, self.token_ttl)
    }

    pub fn session_cookie(&self, token: &str) -> Result<HeaderValue, AppError> {
        let cookie = self.cookie(SESSION_COOKIE, token, self.token_ttl.num_seconds());
        header_value(&cookie)
    }

    pub fn oauth_state_cookie(&self, state: &str) -> Result<HeaderValue, AppError> {
        let cookie = self.cookie(OAUTH_STATE_COOKIE, state, OAUTH_STATE_TTL_SECS);
        header_value(&cookie)
    }

    /// Expires the named cookie immediately.
    pub fn clear_cookie(&self, name: &str) -> Result<HeaderValue, AppError> {
        let mut cookie = self.cookie(name, "", 0);
        cookie.make_removal();
        header_value(&cookie)
    }

    fn cookie<'c>(&self, name: &'c str, value: &'c str, max_age_secs: i64) -> Cookie<'c> {
        Cookie::build((name, value))
            .http_only(true)
            .path("/")
            .same_site(SameSite::Lax)
            .secure(self.cookie_secure)
            .max_age(time::Duration::seconds(max_age_secs.max(0)))
            .build()
    }
}

fn header_value(cookie: &Cookie<'_>) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&cookie.to_string())
        .map_err(|err| AppError::InternalServerError(anyhow::anyhow!("Invalid cookie: {}", err)))
}

/// Reads a cookie value from the request's `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Bearer header first, then the session cookie, then the legacy cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer
        .or_else(|| cookie_value(headers, SESSION_COOKIE))
        .or_else(|| cookie_value(headers, LEGACY_SESSION_COOKIE))
}

/// The caller behind a verified token. Loaded fresh from the database so that
/// role changes and deletions take effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let token = extract_token(&parts.headers).ok_or_else(|| {
            debug!("Request to {} carried no credentials", parts.uri.path());
            AppError::Unauthorized("Authentication required".to_string())
        })?;
        let claims = jwt::verify_token(&token, &state.auth.jwt_secret)?;
        let user_id = claims.user_id()?;

        let user = helper::run_query(&state.pool, move |conn| {
            users::table
                .find(user_id)
                .select(User::as_select())
                .first(conn)
                .optional()
        })
        .await?
        .ok_or_else(|| {
            warn!("Token subject {} no longer exists", user_id);
            AppError::Unauthorized("User no longer exists".to_string())
        })?;

        Ok(AuthUser {
            role: user.role(),
            id: user.id,
            email: user.email,
            display_name: user.display_name,
        })
    }
}

/// An authenticated caller holding the admin role; anyone else gets `403`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            warn!(
                "User {} denied admin access to {}",
                user.id,
                parts.uri.path()
            );
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let map = headers(&[("authorization", "Bearer abc"), ("cookie", "token=def")]);
        assert_eq!(extract_token(&map).as_deref(), Some("abc"));
    }

    #[test]
    fn session_cookie_then_legacy_cookie() {
        let map = headers(&[("cookie", "theme=dark; token=def")]);
        assert_eq!(extract_token(&map).as_deref(), Some("def"));

        let map = headers(&[("cookie", "auth_token=ghi")]);
        assert_eq!(extract_token(&map).as_deref(), Some("ghi"));
    }

    #[test]
    fn missing_or_empty_credentials() {
        assert!(extract_token(&HeaderMap::new()).is_none());
        let map = headers(&[("authorization", "Basic xyz"), ("cookie", "token=")]);
        assert!(extract_token(&map).is_none());
    }

    #[test]
    fn session_cookie_attributes() {
        let settings = AuthSettings {
            jwt_secret: "s".to_string(),
            token_ttl: Duration::hours(1),
            bcrypt_cost: 4,
            cookie_secure: true,
            frontend_url: Url::parse("http://localhost:5173").unwrap(),
        };
        let cookie = settings.session_cookie("abc").unwrap();
        let cookie = Cookie::parse(cookie.to_str().unwrap().to_string()).unwrap();
        assert_eq!(cookie.name_value(), ("token", "abc"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(1)));

        let cleared = settings.clear_cookie(SESSION_COOKIE).unwrap();
        let cleared = Cookie::parse(cleared.to_str().unwrap().to_string()).unwrap();
        assert_eq!(cleared.name_value(), ("token", ""));
        assert_eq!(cleared.max_age(), Some(time::Duration::ZERO));
        assert!(cleared.expires_datetime().is_some());
    }

    #[test]
    fn cookies_read_across_headers() {
        let map = headers(&[("cookie", "theme=dark"), ("cookie", "oauth_state=xyz; lang=en")]);
        assert_eq!(cookie_value(&map, OAUTH_STATE_COOKIE).as_deref(), Some("xyz"));
        assert_eq!(cookie_value(&map, "lang").as_deref(), Some("en"));
        assert!(cookie_value(&map, SESSION_COOKIE).is_none());
    }
}
