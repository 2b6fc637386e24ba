//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Each error kind maps to one fixed outward status: Validation -> 400,
//! Authentication -> 401, NotFound -> 404. Storage and internal
//! failures map to a generic 500 body; their diagnostics go to the log,
//! never to the caller.

use super::{
    AppState,
    auth::{AuthedUser, SESSION_COOKIE},
    types::{CreateProfileRequest, CreateProfileResponse, ErrorBody, HealthResponse, LoginRequest,
        SignupRequest},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use matric_core::{MatricError, ProfileId, SessionId, TimestampMs};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Map a core error to its fixed outward signal.
fn error_response(err: &MatricError) -> Response {
    let (status, body) = match err {
        MatricError::Validation(msg) => (StatusCode::BAD_REQUEST, ErrorBody::new(msg.clone())),
        MatricError::Authentication(msg) => {
            (StatusCode::UNAUTHORIZED, ErrorBody::new(msg.clone()))
        }
        MatricError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorBody::new(msg.clone())),
        MatricError::Storage(_) | MatricError::Internal(_) => {
            tracing::error!(error = %err, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("internal error"),
            )
        }
    };
    (status, Json(body)).into_response()
}

/// Build the session cookie set on signup and login.
fn session_cookie(session_id: &SessionId) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id.as_str().to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// ACCOUNT HANDLERS
// =============================================================================

/// Create a new account and set its session cookie.
pub async fn signup_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<SignupRequest>,
) -> Response {
    let now = TimestampMs::now();
    let mut market = state.market.write().await;
    match market.signup(&request.username, &request.password, &request.email, now) {
        Ok(session_id) => {
            tracing::info!(username = %request.username, "account created");
            (jar.add(session_cookie(&session_id)), StatusCode::OK).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Log in an existing account and set its session cookie.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Response {
    let now = TimestampMs::now();
    let mut market = state.market.write().await;
    match market.login(&request.username, &request.password, now) {
        Ok(session_id) => {
            (jar.add(session_cookie(&session_id)), StatusCode::OK).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Revoke the current session and clear its cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Extension(auth): Extension<AuthedUser>,
) -> Response {
    let mut market = state.market.write().await;
    match market.logout(&auth.user.user_id, &auth.session_id) {
        Ok(()) => {
            let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
            (jar.remove(removal), StatusCode::OK).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Unlock a profile for the current user.
pub async fn unlock_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
    Path(profile_id): Path<String>,
) -> Response {
    let mut market = state.market.write().await;
    match market.unlock(&auth.user.user_id, &ProfileId::new(profile_id)) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_response(&e),
    }
}

/// Bookmark a profile for the current user.
pub async fn save_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
    Path(profile_id): Path<String>,
) -> Response {
    let mut market = state.market.write().await;
    match market.save(&auth.user.user_id, &ProfileId::new(profile_id)) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_response(&e),
    }
}

/// Previews of the current user's unlocked profiles.
pub async fn unlocked_previews_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
) -> Response {
    let market = state.market.read().await;
    match market.unlocked_previews(&auth.user) {
        Ok(previews) => (StatusCode::OK, Json(previews)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Previews of the current user's saved profiles.
pub async fn saved_previews_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
) -> Response {
    let market = state.market.read().await;
    match market.saved_previews(&auth.user) {
        Ok(previews) => (StatusCode::OK, Json(previews)).into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// PROFILE HANDLERS
// =============================================================================

/// Create a profile owned by the current user.
pub async fn create_profile_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
    Json(request): Json<CreateProfileRequest>,
) -> Response {
    let now = TimestampMs::now();
    let mut market = state.market.write().await;
    match market.create_profile(&auth.user, request.into_draft(), now) {
        Ok(profile_id) => {
            tracing::info!(owner = %auth.user.username, "profile created");
            (StatusCode::OK, Json(CreateProfileResponse::new(&profile_id))).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Catalog previews of all published profiles. Anonymous allowed.
pub async fn catalog_handler(State(state): State<AppState>) -> Response {
    let market = state.market.read().await;
    match market.catalog() {
        Ok(previews) => (StatusCode::OK, Json(previews)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// The current user's tiered view of a profile.
pub async fn profile_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
    Path(profile_id): Path<String>,
) -> Response {
    let market = state.market.read().await;
    match market.profile(&ProfileId::new(profile_id), Some(&auth.user)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => error_response(&e),
    }
}
