//! # Core Type Definitions
//!
//! This module contains all core types for the Matric marketplace substrate:
//! - Opaque identifiers (`UserId`, `ProfileId`, `SessionId`)
//! - Millisecond timestamps (`TimestampMs`)
//! - Account documents (`User`, `Session`)
//! - Profile documents (`Profile`, `SchoolAdmission`, `Essay`, `TestScore`)
//! - Error types (`MatricError`)
//!
//! ## Conventions
//!
//! - Identifiers are opaque strings: unguessable lookup keys with no
//!   decodable internal structure.
//! - Membership sets use `BTreeSet` for O(log n) lookup and deterministic
//!   iteration order.
//! - Timestamps use integer milliseconds with saturating arithmetic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// OPAQUE IDENTIFIERS
// =============================================================================

/// Unique identifier for a user account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a profile.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub String);

impl ProfileId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for an authentication session.
///
/// Session ids are bearer tokens: globally unique, generated from a
/// cryptographically random UUID, and never reused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// TIMESTAMPS
// =============================================================================

/// Absolute instant in milliseconds since the Unix epoch.
///
/// Uses u64 with saturating arithmetic; expiry computations can never wrap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TimestampMs(pub u64);

impl TimestampMs {
    /// Create a timestamp from raw milliseconds.
    #[must_use]
    pub const fn new(ms: u64) -> Self {
        Self(ms)
    }

    /// The current wall-clock instant.
    #[must_use]
    pub fn now() -> Self {
        let ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(ms)
    }

    /// Add a duration in milliseconds, saturating at the maximum.
    #[must_use]
    pub const fn saturating_add(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// Get the raw millisecond value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

// =============================================================================
// SESSIONS & USERS
// =============================================================================

/// An authentication session attached to a user.
///
/// Lifecycle: Active until `expiry` passes (detected lazily at query
/// time), then Expired until the next prune removes it. Revocation
/// removes an Active session directly. Removal is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// The opaque bearer token identifying this session.
    pub session_id: SessionId,
    /// Absolute instant after which the session is no longer valid.
    pub expiry: TimestampMs,
}

impl Session {
    /// Check whether the session is live at the given instant.
    ///
    /// A session is live strictly before its expiry; at the expiry
    /// instant itself it is already invalid.
    #[must_use]
    pub fn is_live(&self, now: TimestampMs) -> bool {
        self.expiry > now
    }
}

/// A user account document.
///
/// Sessions are unbounded until pruned; the membership sets drive tier
/// classification in the visibility engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique account identifier.
    pub user_id: UserId,
    /// Unique login handle.
    pub username: String,
    /// PHC-formatted password hash. Never exposed at the API boundary.
    pub password_hash: String,
    /// Contact address supplied at signup.
    pub email: String,
    /// Avatar URL, copied onto profiles the user creates.
    pub thumbnail_url: String,
    /// Ordered list of authentication sessions (multi-device).
    pub sessions: Vec<Session>,
    /// Profiles this user created (owner tier).
    pub created_profile_ids: BTreeSet<ProfileId>,
    /// Profiles this user bookmarked.
    pub saved_profile_ids: BTreeSet<ProfileId>,
    /// Profiles this user unlocked (unlocked tier).
    pub unlocked_profile_ids: BTreeSet<ProfileId>,
}

impl User {
    /// True iff this user created the given profile.
    #[must_use]
    pub fn owns(&self, profile_id: &ProfileId) -> bool {
        self.created_profile_ids.contains(profile_id)
    }

    /// True iff this user unlocked the given profile.
    #[must_use]
    pub fn has_unlocked(&self, profile_id: &ProfileId) -> bool {
        self.unlocked_profile_ids.contains(profile_id)
    }

    /// True iff this user bookmarked the given profile.
    #[must_use]
    pub fn has_saved(&self, profile_id: &ProfileId) -> bool {
        self.saved_profile_ids.contains(profile_id)
    }
}

// =============================================================================
// PROFILES
// =============================================================================

/// Outcome of one school application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionStatus {
    /// The application was accepted.
    Accepted,
    /// The application was rejected.
    Rejected,
}

/// An application essay attached to a school admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Essay {
    /// Prompt or heading; always visible.
    pub title: String,
    /// Essay body; redacted for locked viewers.
    pub content: String,
}

/// A standardized test result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestScore {
    /// Test name; always visible.
    pub test: String,
    /// Score value; blanked for locked viewers.
    pub score: String,
}

/// One school application with its essays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolAdmission {
    /// School name.
    pub school: String,
    /// Degree applied for.
    pub degree: String,
    /// Major applied for.
    pub major: String,
    /// Application outcome.
    pub status: AdmissionStatus,
    /// Essays submitted with this application.
    pub essays: Vec<Essay>,
}

/// An admission-record profile offered on the marketplace.
///
/// `owner_user_id` is immutable after creation and is always mirrored by
/// membership in the owner's `created_profile_ids` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Unique profile identifier.
    pub profile_id: ProfileId,
    /// The creating user. Immutable.
    pub owner_user_id: UserId,
    /// Display name shown in listings (the owner's username).
    pub display_name: String,
    /// Thumbnail URL shown in listings.
    pub thumbnail_url: String,
    /// Creation instant.
    pub date_created: TimestampMs,
    /// Price to unlock, in minor currency units.
    pub price: u64,
    /// Number of times the profile has been purchased.
    pub purchase_count: u64,
    /// Whether the profile appears in the public catalog.
    pub published: bool,
    /// School the owner currently attends.
    pub current_school: String,
    /// The owner's current major.
    pub current_major: String,
    /// Free-text self description.
    pub current_description: String,
    /// Applications, one entry per school.
    pub school_admissions: Vec<SchoolAdmission>,
    /// Standardized test results.
    pub test_scores: Vec<TestScore>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors reported by the Matric core.
///
/// Exactly five kinds; callers pattern-match instead of inspecting
/// messages. Storage-collaborator failures are wrapped into `Storage`
/// preserving the original diagnostic; already-classified errors pass
/// through unchanged.
#[derive(Debug, Error)]
pub enum MatricError {
    /// Malformed or missing caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing, unknown, or expired session.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// A referenced user or profile is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The persistence collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Unexpected, uncategorized failure.
    #[error("internal error: {0}")]
    Internal(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_saturating_add() {
        let t = TimestampMs::new(u64::MAX);
        assert_eq!(t.saturating_add(1000).value(), u64::MAX);

        let t = TimestampMs::new(10);
        assert_eq!(t.saturating_add(5).value(), 15);
    }

    #[test]
    fn session_liveness_boundary() {
        let session = Session {
            session_id: SessionId::generate(),
            expiry: TimestampMs::new(1000),
        };
        assert!(session.is_live(TimestampMs::new(999)));
        assert!(!session.is_live(TimestampMs::new(1000)));
        assert!(!session.is_live(TimestampMs::new(1001)));
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(SessionId::generate(), SessionId::generate());
        assert_ne!(UserId::generate(), UserId::generate());
        assert_ne!(ProfileId::generate(), ProfileId::generate());
    }

    #[test]
    fn membership_helpers() {
        let profile_id = ProfileId::new("p1");
        let mut user = User {
            user_id: UserId::new("u1"),
            username: "alice".to_string(),
            password_hash: String::new(),
            email: "alice@example.com".to_string(),
            thumbnail_url: String::new(),
            sessions: vec![],
            created_profile_ids: BTreeSet::new(),
            saved_profile_ids: BTreeSet::new(),
            unlocked_profile_ids: BTreeSet::new(),
        };
        assert!(!user.owns(&profile_id));

        user.created_profile_ids.insert(profile_id.clone());
        assert!(user.owns(&profile_id));
        assert!(!user.has_unlocked(&profile_id));
        assert!(!user.has_saved(&profile_id));
    }
}
