use super::helper;
use crate::auth::google::{GoogleOAuth, GoogleProfile};
use crate::auth::{
    AuthUser, LEGACY_SESSION_COOKIE, OAUTH_STATE_COOKIE, SESSION_COOKIE, cookie_value, password,
};
use crate::errors::AppError;
use crate::model::user::{
    AuthResponse, NewUser, Role, User, UserProfile, UserProfileChangeset,
};
use crate::payloads::auth::{
    GoogleCallbackParams, GoogleCredentialPayload, LoginPayload, RegisterPayload,
    UpdateProfilePayload,
};
use crate::response::ApiResponse;
use crate::schema::users;
use crate::state::AppState;
use crate::validation::ValidatedJson;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum::response::Redirect;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn google_client(state: &AppState) -> Result<Arc<GoogleOAuth>, AppError> {
    state.google.clone().ok_or_else(|| {
        warn!("Google sign-in requested but not configured");
        AppError::NotFound("Google sign-in is not configured".to_string())
    })
}

/// Signs a token for `user` and builds the matching `Set-Cookie` header.
fn session_for(state: &AppState, user: User) -> Result<(HeaderMap, AuthResponse), AppError> {
    let token = state.auth.issue_token(user.id, user.role())?;
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, state.auth.session_cookie(&token)?);
    Ok((
        headers,
        AuthResponse {
            token,
            user: UserProfile::from(user),
        },
    ))
}

/// Registers a new student account with email and password.
///
/// Request Body: `RegisterPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `AuthResponse`: signed token and profile (201 Created); also sets the session cookie.
/// * `400 Bad Request`: If the payload fails validation.
/// * `409 Conflict`: If the email is already registered.
/// * `500 Internal Server Error`: If hashing or a database error occurs.
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterPayload>,
) -> Result<(HeaderMap, ApiResponse<AuthResponse>), AppError> {
    let email = normalize_email(&payload.email);
    info!("Attempting to register account for {}", email);

    let password_hash = password::hash_password(payload.password, state.auth.bcrypt_cost).await?;
    let new_user = NewUser {
        email: email.clone(),
        display_name: payload.display_name.trim().to_string(),
        password_hash: Some(password_hash),
        google_id: None,
        avatar_url: None,
        role: Role::Student.as_str().to_string(),
    };

    let user = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(conn)
    })
    .await
    .map_err(|err| {
        if err.is_unique_violation() {
            warn!("Registration rejected, email {} already in use", email);
            AppError::Conflict("An account with this email already exists".to_string())
        } else {
            err
        }
    })?;

    info!("Registered user {} ({})", user.id, user.email);
    let (headers, body) = session_for(&state, user)?;
    Ok((headers, ApiResponse::created(body)))
}

/// Signs in with email and password.
///
/// Request Body: `LoginPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `AuthResponse`: signed token and profile (200 OK); also sets the session cookie.
/// * `401 Unauthorized`: If the email is unknown, the password is wrong, or the
///   account only signs in through Google.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginPayload>,
) -> Result<(HeaderMap, ApiResponse<AuthResponse>), AppError> {
    let email = normalize_email(&payload.email);
    info!("Login attempt for {}", email);

    let lookup_email = email.clone();
    let user = helper::run_query(&state.pool, move |conn| {
        users::table
            .filter(users::email.eq(lookup_email))
            .select(User::as_select())
            .first(conn)
            .optional()
    })
    .await?;

    let Some(user) = user else {
        warn!("Login failed, no account for {}", email);
        return Err(AppError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    };

    let Some(hash) = user.password_hash.clone() else {
        warn!("Login failed, account {} has no password set", user.id);
        return Err(AppError::Unauthorized(
            "This account signs in with Google".to_string(),
        ));
    };

    if !password::verify_password(payload.password, hash).await? {
        warn!("Login failed, wrong password for user {}", user.id);
        return Err(AppError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    info!("User {} signed in", user.id);
    let (headers, body) = session_for(&state, user)?;
    Ok((headers, ApiResponse::ok(body)))
}

/// Starts the Google OAuth flow by redirecting to the consent screen.
///
/// Returns
/// * `303 See Other` to Google, with a short-lived `oauth_state` cookie.
/// * `404 Not Found` (wrapped in `ApiResponse`): If Google sign-in is not configured.
#[instrument(skip(state))]
pub async fn google_redirect(
    State(state): State<AppState>,
) -> Result<(HeaderMap, Redirect), AppError> {
    let google = google_client(&state)?;
    let oauth_state = uuid::Uuid::new_v4().to_string();
    let url = google.authorization_url(&oauth_state)?;

    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, state.auth.oauth_state_cookie(&oauth_state)?);

    debug!("Redirecting to Google consent screen");
    Ok((headers, Redirect::to(url.as_str())))
}

/// Completes the Google OAuth flow.
///
/// Query Parameters: `GoogleCallbackParams`
///
/// Returns
/// * `303 See Other` to the frontend with the session cookie set on success.
/// * `303 See Other` to the frontend login page with an `error` parameter when
///   Google reports an error, the state does not match, or the exchange fails.
/// * `404 Not Found` (wrapped in `ApiResponse`): If Google sign-in is not configured.
#[instrument(skip(state, headers, params))]
pub async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<GoogleCallbackParams>,
) -> Result<(HeaderMap, Redirect), AppError> {
    let google = google_client(&state)?;

    let mut response_headers = HeaderMap::new();
    response_headers.append(SET_COOKIE, state.auth.clear_cookie(OAUTH_STATE_COOKIE)?);

    if let Some(reason) = params.error {
        warn!("Google returned an error to the callback: {}", reason);
        return Ok((response_headers, login_error_redirect(&state, "google_denied")));
    }

    let expected_state = cookie_value(&headers, OAUTH_STATE_COOKIE);
    if expected_state.is_none() || expected_state != params.state {
        warn!("Google callback state mismatch");
        return Ok((response_headers, login_error_redirect(&state, "invalid_state")));
    }

    let Some(code) = params.code else {
        warn!("Google callback carried no authorization code");
        return Ok((response_headers, login_error_redirect(&state, "missing_code")));
    };

    let profile = match google.exchange_code(&code).await {
        Ok(profile) => profile,
        Err(err) => {
            error!("Google code exchange failed: {:?}", err);
            return Ok((response_headers, login_error_redirect(&state, "google_failed")));
        }
    };

    let user = upsert_google_user(&state, profile).await?;
    info!("User {} signed in through Google", user.id);

    let token = state.auth.issue_token(user.id, user.role())?;
    response_headers.append(SET_COOKIE, state.auth.session_cookie(&token)?);
    Ok((
        response_headers,
        Redirect::to(state.auth.frontend_url.as_str()),
    ))
}

fn login_error_redirect(state: &AppState, reason: &str) -> Redirect {
    let mut url = state.auth.frontend_url.clone();
    url.set_path("/login");
    url.query_pairs_mut().clear().append_pair("error", reason);
    Redirect::to(url.as_str())
}

/// Signs in with a Google ID token obtained by the frontend.
///
/// Request Body: `GoogleCredentialPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `AuthResponse`: signed token and profile (200 OK); also sets the session cookie.
/// * `401 Unauthorized`: If Google rejects the credential or it was issued for another client.
/// * `404 Not Found`: If Google sign-in is not configured.
/// * `500 Internal Server Error`: If Google is unreachable or a database error occurs.
#[instrument(skip(state, payload))]
pub async fn google_credential(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<GoogleCredentialPayload>,
) -> Result<(HeaderMap, ApiResponse<AuthResponse>), AppError> {
    let google = google_client(&state)?;
    let profile = google.verify_id_token(&payload.credential).await?;
    let user = upsert_google_user(&state, profile).await?;

    info!("User {} signed in with a Google credential", user.id);
    let (headers, body) = session_for(&state, user)?;
    Ok((headers, ApiResponse::ok(body)))
}

/// Finds the account by Google id, then by email (linking it), or creates a student.
async fn upsert_google_user(state: &AppState, profile: GoogleProfile) -> Result<User, AppError> {
    let email = normalize_email(&profile.email);
    debug!("Resolving Google account {} ({})", profile.sub, email);

    helper::run_transaction(&state.pool, move |conn| {
        let by_google_id = users::table
            .filter(users::google_id.eq(&profile.sub))
            .select(User::as_select())
            .first(conn)
            .optional()?;
        if let Some(user) = by_google_id {
            return Ok(user);
        }

        let by_email = users::table
            .filter(users::email.eq(&email))
            .select(User::as_select())
            .first(conn)
            .optional()?;
        if let Some(user) = by_email {
            info!("Linking Google account to existing user {}", user.id);
            let avatar_url = user.avatar_url.clone().or(profile.picture.clone());
            let linked = diesel::update(users::table.find(user.id))
                .set((
                    users::google_id.eq(Some(profile.sub.clone())),
                    users::avatar_url.eq(avatar_url),
                    users::updated_at.eq(Utc::now()),
                ))
                .returning(User::as_returning())
                .get_result(conn)?;
            return Ok(linked);
        }

        let display_name = profile
            .name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        let new_user = NewUser {
            email: email.clone(),
            display_name,
            password_hash: None,
            google_id: Some(profile.sub.clone()),
            avatar_url: profile.picture.clone(),
            role: Role::Student.as_str().to_string(),
        };
        let created = diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(conn)?;
        info!("Created user {} from Google account", created.id);
        Ok(created)
    })
    .await
}

/// Clears the session cookies. Callers holding a bearer token simply discard it.
///
/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true (200 OK).
#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
) -> Result<(HeaderMap, ApiResponse<bool>), AppError> {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, state.auth.clear_cookie(SESSION_COOKIE)?);
    headers.append(SET_COOKIE, state.auth.clear_cookie(LEGACY_SESSION_COOKIE)?);
    info!("Session cookies cleared");
    Ok((headers, ApiResponse::ok(true)))
}

/// Returns the caller's profile.
///
/// Returns (wrapped in `ApiResponse`)
/// * `UserProfile` (200 OK).
/// * `401 Unauthorized`: If the request is not authenticated.
#[instrument(skip(state))]
pub async fn current_user(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let user_id = user.id;
    let record = helper::run_query(&state.pool, move |conn| {
        users::table
            .find(user_id)
            .select(User::as_select())
            .first(conn)
    })
    .await?;

    Ok(ApiResponse::ok(UserProfile::from(record)))
}

/// Updates the caller's display name, bio and avatar.
///
/// Request Body: `UpdateProfilePayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `UserProfile`: the updated profile (200 OK).
/// * `400 Bad Request`: If the payload fails validation.
/// * `401 Unauthorized`: If the request is not authenticated.
#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<UpdateProfilePayload>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    info!("Updating profile of user {}", user.id);
    debug!("Update profile payload: {:?}", payload);

    let changes = UserProfileChangeset {
        display_name: payload.display_name.map(|name| name.trim().to_string()),
        bio: payload.bio,
        avatar_url: payload.avatar_url,
        updated_at: Some(Utc::now()),
    };

    let user_id = user.id;
    let updated = helper::run_query(&state.pool, move |conn| {
        diesel::update(users::table.find(user_id))
            .set(&changes)
            .returning(User::as_returning())
            .get_result(conn)
    })
    .await?;

    Ok(ApiResponse::ok(UserProfile::from(updated)))
}
