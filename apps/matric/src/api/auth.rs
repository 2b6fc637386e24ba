//! # Session Authentication Module
//!
//! Cookie-based session authentication for the Matric HTTP API.
//!
//! The authenticated identity is carried by an opaque bearer token in a
//! secure, http-only cookie. The middleware validates the session,
//! resolves its user, refreshes the expiry, and hands the resolved
//! identity to handlers through a request extension. A missing or
//! invalid session produces 401, distinct from the 404 a handler
//! returns for a missing resource.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use matric_core::{SessionId, TimestampMs, User};

use super::AppState;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "sessionId";

/// The identity resolved by the session middleware, carried as a
/// request extension into protected handlers.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    /// Snapshot of the user owning the session, as of this request.
    pub user: User,
    /// The bearer session the request arrived with.
    pub session_id: SessionId,
}

/// Session authentication middleware.
///
/// Refreshes the session on every authenticated request, so activity
/// keeps a session alive; idle sessions lapse after the TTL.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_session_cookie",
            "Authentication failed: no session cookie"
        );
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
    };

    let session_id = SessionId::new(cookie.value());
    let now = TimestampMs::now();

    let authenticated = {
        let mut market = state.market.write().await;
        market.authenticate(&session_id, now)
    };

    match authenticated {
        Ok(user) => {
            request.extensions_mut().insert(AuthedUser { user, session_id });
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!(
                event = "auth_failure",
                reason = %e,
                "Authentication failed: session did not resolve"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}
