//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API. Profile
//! views and previews serialize straight from the core's derived view
//! types; only the request envelopes and small responses live here.

use matric_core::{ProfileDraft, ProfileId, SchoolAdmission, TestScore};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ACCOUNT REQUESTS
// =============================================================================

/// Signup request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// Login request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// =============================================================================
// PROFILE REQUESTS/RESPONSES
// =============================================================================

/// Profile creation request body.
///
/// The admissions and test-score shapes deserialize directly into the
/// core types; bounds are checked by the core before anything reaches
/// the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    pub price: u64,
    pub current_school: String,
    pub current_major: String,
    #[serde(default)]
    pub current_description: String,
    pub school_admissions: Vec<SchoolAdmission>,
    pub test_scores: Vec<TestScore>,
}

impl CreateProfileRequest {
    /// Convert into the core draft shape.
    pub fn into_draft(self) -> ProfileDraft {
        ProfileDraft {
            price: self.price,
            current_school: self.current_school,
            current_major: self.current_major,
            current_description: self.current_description,
            school_admissions: self.school_admissions,
            test_scores: self.test_scores,
        }
    }
}

/// Profile creation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileResponse {
    pub profile_id: String,
}

impl CreateProfileResponse {
    pub fn new(profile_id: &ProfileId) -> Self {
        Self {
            profile_id: profile_id.as_str().to_string(),
        }
    }
}

// =============================================================================
// ERROR BODY
// =============================================================================

/// Error payload for non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}
