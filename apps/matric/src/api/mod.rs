//! # Matric HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `POST /api/user` - Create a new account (sets the session cookie)
//! - `POST /api/user/login` - Log in (sets the session cookie)
//! - `DELETE /api/user/logout` - Revoke the current session
//! - `PUT /api/user/unlock/{profile_id}` - Unlock a profile
//! - `PUT /api/user/save/{profile_id}` - Bookmark a profile
//! - `GET /api/user/unlocked` - Previews of unlocked profiles
//! - `GET /api/user/saved` - Previews of saved profiles
//! - `POST /api/profile` - Create a profile
//! - `GET /api/profile` - Catalog previews (anonymous allowed)
//! - `GET /api/profile/{profile_id}` - Tiered profile view
//! - `GET /health` - Health check
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `MATRIC_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `MATRIC_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//!
//! Authentication is carried by the secure, http-only `sessionId`
//! cookie; all `/api` routes except the catalog listing, signup and
//! login require it.

mod auth;
mod handlers;
mod middleware;
mod types;

// Re-exports for external use
pub use auth::{AuthedUser, SESSION_COOKIE};
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
// Re-export handlers and types for integration tests (via `matric::api::*`)
#[allow(unused_imports)]
pub use handlers::{
    catalog_handler, create_profile_handler, health_handler, login_handler, logout_handler,
    profile_handler, save_handler, saved_previews_handler, signup_handler, unlock_handler,
    unlocked_previews_handler,
};
#[allow(unused_imports)]
pub use types::{
    CreateProfileRequest, CreateProfileResponse, ErrorBody, HealthResponse, LoginRequest,
    SignupRequest,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use matric_core::{Marketplace, MatricError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the marketplace.
#[derive(Clone)]
pub struct AppState {
    /// The marketplace service (storage backend + session manager).
    pub market: Arc<RwLock<Marketplace>>,
}

impl AppState {
    /// Create new app state with a marketplace.
    #[must_use]
    pub fn new(market: Marketplace) -> Self {
        Self {
            market: Arc::new(RwLock::new(market)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `MATRIC_CORS_ORIGINS` environment variable:
/// - If "*": allows all origins (development mode - use with caution!)
/// - If not set: defaults to localhost only (restrictive default)
/// - Otherwise: parses comma-separated list of allowed origins
///
/// Explicit origins are configured with credentials enabled, which the
/// cookie-based session flow requires. The wildcard mode cannot carry
/// credentials and only suits cookie-less development clients.
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("MATRIC_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            // Explicit wildcard - warn about security implications
            tracing::warn!(
                "CORS: Allowing ALL origins (MATRIC_CORS_ORIGINS=*). This is insecure for production and breaks cookie credentials!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            // Parse comma-separated origins
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in MATRIC_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                cors_with_origins(allowed_origins)
            }
        }
        None => {
            // No configuration - default to localhost only (restrictive)
            tracing::info!("CORS: No MATRIC_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let localhost_origins = vec![
        "http://localhost:3000".parse::<HeaderValue>().ok(),
        "http://localhost:8080".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:3000".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:8080".parse::<HeaderValue>().ok(),
    ];
    let origins: Vec<HeaderValue> = localhost_origins.into_iter().flatten().collect();
    cors_with_origins(origins)
}

fn cors_with_origins(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - caps request payloads
/// 4. Rate Limiting - protects against DoS (if enabled)
/// 5. Session authentication - on the protected route group only
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    // Check if rate limiting is enabled
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    // Anonymous surface: health, catalog previews, and the two
    // credential endpoints that create a session.
    let public = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/profile", get(handlers::catalog_handler))
        .route("/api/user", post(handlers::signup_handler))
        .route("/api/user/login", post(handlers::login_handler));

    // Everything else resolves and refreshes the session cookie first.
    let protected = Router::new()
        .route("/api/user/logout", delete(handlers::logout_handler))
        .route("/api/user/unlock/{profile_id}", put(handlers::unlock_handler))
        .route("/api/user/save/{profile_id}", put(handlers::save_handler))
        .route("/api/user/unlocked", get(handlers::unlocked_previews_handler))
        .route("/api/user/saved", get(handlers::saved_previews_handler))
        .route("/api/profile", post(handlers::create_profile_handler))
        .route("/api/profile/{profile_id}", get(handlers::profile_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::session_auth_middleware,
        ));

    let mut router = public.merge(protected);

    // Apply rate limiting middleware
    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    // Apply CORS, body limit, and tracing (outermost layers)
    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, market: Marketplace) -> Result<(), MatricError> {
    let state = AppState::new(market);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MatricError::Internal(format!("Bind failed: {}", e)))?;

    tracing::info!("Matric HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| MatricError::Internal(format!("Server error: {}", e)))
}
