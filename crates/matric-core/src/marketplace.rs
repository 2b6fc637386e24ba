//! # Marketplace Facade
//!
//! Combines a storage backend with the session manager into the single
//! persistence context the app layer holds: constructed once at startup,
//! injected where needed, dropped once at shutdown.
//!
//! ## Storage Backends
//!
//! - `InMemory`: volatile `MemoryStore` (tests, ephemeral runs)
//! - `Persistent`: `RedbStore` for disk-backed ACID storage

use crate::account;
use crate::catalog::{self, ProfileDraft};
use crate::session::SessionManager;
use crate::storage::{MemoryStore, RedbStore};
use crate::store::{ProfileStore, UserStore};
use crate::types::{
    MatricError, Profile, ProfileId, Session, SessionId, TimestampMs, User, UserId,
};
use crate::visibility::{ProfilePreview, ProfileView};
use std::collections::BTreeSet;
use std::path::Path;

/// Storage backend for a Marketplace.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbStore (database handle) cannot be safely cloned.

impl UserStore for StorageBackend {
    fn insert_user(&mut self, user: User) -> Result<(), MatricError> {
        match self {
            Self::InMemory(store) => store.insert_user(user),
            Self::Persistent(store) => store.insert_user(user),
        }
    }

    fn find_user_by_id(&self, user_id: &UserId) -> Result<Option<User>, MatricError> {
        match self {
            Self::InMemory(store) => store.find_user_by_id(user_id),
            Self::Persistent(store) => store.find_user_by_id(user_id),
        }
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>, MatricError> {
        match self {
            Self::InMemory(store) => store.find_user_by_username(username),
            Self::Persistent(store) => store.find_user_by_username(username),
        }
    }

    fn find_user_by_live_session(
        &self,
        session_id: &SessionId,
        now: TimestampMs,
    ) -> Result<Option<User>, MatricError> {
        match self {
            Self::InMemory(store) => store.find_user_by_live_session(session_id, now),
            Self::Persistent(store) => store.find_user_by_live_session(session_id, now),
        }
    }

    fn append_session(&mut self, user_id: &UserId, session: Session) -> Result<(), MatricError> {
        match self {
            Self::InMemory(store) => store.append_session(user_id, session),
            Self::Persistent(store) => store.append_session(user_id, session),
        }
    }

    fn extend_session(
        &mut self,
        session_id: &SessionId,
        expiry: TimestampMs,
    ) -> Result<(), MatricError> {
        match self {
            Self::InMemory(store) => store.extend_session(session_id, expiry),
            Self::Persistent(store) => store.extend_session(session_id, expiry),
        }
    }

    fn remove_session(
        &mut self,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Result<(), MatricError> {
        match self {
            Self::InMemory(store) => store.remove_session(user_id, session_id),
            Self::Persistent(store) => store.remove_session(user_id, session_id),
        }
    }

    fn remove_expired_sessions(
        &mut self,
        user_id: &UserId,
        now: TimestampMs,
    ) -> Result<(), MatricError> {
        match self {
            Self::InMemory(store) => store.remove_expired_sessions(user_id, now),
            Self::Persistent(store) => store.remove_expired_sessions(user_id, now),
        }
    }

    fn add_created_profile(
        &mut self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<(), MatricError> {
        match self {
            Self::InMemory(store) => store.add_created_profile(user_id, profile_id),
            Self::Persistent(store) => store.add_created_profile(user_id, profile_id),
        }
    }

    fn add_unlocked_profile(
        &mut self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<(), MatricError> {
        match self {
            Self::InMemory(store) => store.add_unlocked_profile(user_id, profile_id),
            Self::Persistent(store) => store.add_unlocked_profile(user_id, profile_id),
        }
    }

    fn add_saved_profile(
        &mut self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<(), MatricError> {
        match self {
            Self::InMemory(store) => store.add_saved_profile(user_id, profile_id),
            Self::Persistent(store) => store.add_saved_profile(user_id, profile_id),
        }
    }

    fn user_count(&self) -> Result<usize, MatricError> {
        match self {
            Self::InMemory(store) => store.user_count(),
            Self::Persistent(store) => store.user_count(),
        }
    }
}

impl ProfileStore for StorageBackend {
    fn insert_profile(&mut self, profile: Profile) -> Result<(), MatricError> {
        match self {
            Self::InMemory(store) => store.insert_profile(profile),
            Self::Persistent(store) => store.insert_profile(profile),
        }
    }

    fn find_profile_by_id(&self, profile_id: &ProfileId) -> Result<Option<Profile>, MatricError> {
        match self {
            Self::InMemory(store) => store.find_profile_by_id(profile_id),
            Self::Persistent(store) => store.find_profile_by_id(profile_id),
        }
    }

    fn published_profiles(&self) -> Result<Vec<Profile>, MatricError> {
        match self {
            Self::InMemory(store) => store.published_profiles(),
            Self::Persistent(store) => store.published_profiles(),
        }
    }

    fn profiles_by_ids(&self, ids: &BTreeSet<ProfileId>) -> Result<Vec<Profile>, MatricError> {
        match self {
            Self::InMemory(store) => store.profiles_by_ids(ids),
            Self::Persistent(store) => store.profiles_by_ids(ids),
        }
    }

    fn profile_count(&self) -> Result<usize, MatricError> {
        match self {
            Self::InMemory(store) => store.profile_count(),
            Self::Persistent(store) => store.profile_count(),
        }
    }
}

/// The marketplace service: storage backend plus session manager.
///
/// High-level operations the process boundary calls. All reads go
/// through the visibility engine; all session mutations go through the
/// session manager.
#[derive(Debug, Default)]
pub struct Marketplace {
    backend: StorageBackend,
    sessions: SessionManager,
}

impl Marketplace {
    /// Create a marketplace with volatile in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a marketplace with an existing backend.
    #[must_use]
    pub fn with_backend(backend: StorageBackend) -> Self {
        Self {
            backend,
            sessions: SessionManager::new(),
        }
    }

    /// Create a marketplace with persistent redb storage at the given
    /// path, opening or creating the database.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, MatricError> {
        let store = RedbStore::open(path)?;
        Ok(Self::with_backend(StorageBackend::Persistent(store)))
    }

    /// Override the session TTL. Used by tests exercising expiry.
    #[must_use]
    pub fn with_session_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.sessions = SessionManager::with_ttl_ms(ttl_ms);
        self
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    // =========================================================================
    // ACCOUNTS & SESSIONS
    // =========================================================================

    /// Create a new account and issue its first session.
    pub fn signup(
        &mut self,
        username: &str,
        password: &str,
        email: &str,
        now: TimestampMs,
    ) -> Result<SessionId, MatricError> {
        account::signup(&mut self.backend, &self.sessions, username, password, email, now)
    }

    /// Log in an existing account; prunes expired sessions, issues a
    /// fresh one.
    pub fn login(
        &mut self,
        username: &str,
        password: &str,
        now: TimestampMs,
    ) -> Result<SessionId, MatricError> {
        account::login(&mut self.backend, &self.sessions, username, password, now)
    }

    /// Resolve a bearer session to its user, refreshing it.
    pub fn authenticate(
        &mut self,
        session_id: &SessionId,
        now: TimestampMs,
    ) -> Result<User, MatricError> {
        account::authenticate(&mut self.backend, &self.sessions, session_id, now)
    }

    /// Revoke one of the user's sessions.
    pub fn logout(&mut self, user_id: &UserId, session_id: &SessionId) -> Result<(), MatricError> {
        account::logout(&mut self.backend, &self.sessions, user_id, session_id)
    }

    // =========================================================================
    // PROFILES
    // =========================================================================

    /// Create a profile owned by `owner`.
    pub fn create_profile(
        &mut self,
        owner: &User,
        draft: ProfileDraft,
        now: TimestampMs,
    ) -> Result<ProfileId, MatricError> {
        catalog::create_profile(&mut self.backend, owner, draft, now)
    }

    /// The viewer's tiered view of a profile.
    pub fn profile(
        &self,
        profile_id: &ProfileId,
        viewer: Option<&User>,
    ) -> Result<ProfileView, MatricError> {
        catalog::profile_view(&self.backend, profile_id, viewer)
    }

    /// Previews of every published profile.
    pub fn catalog(&self) -> Result<Vec<ProfilePreview>, MatricError> {
        catalog::published_previews(&self.backend)
    }

    /// Previews of the viewer's unlocked profiles.
    pub fn unlocked_previews(&self, viewer: &User) -> Result<Vec<ProfilePreview>, MatricError> {
        catalog::unlocked_previews(&self.backend, viewer)
    }

    /// Previews of the viewer's saved profiles.
    pub fn saved_previews(&self, viewer: &User) -> Result<Vec<ProfilePreview>, MatricError> {
        catalog::saved_previews(&self.backend, viewer)
    }

    /// Unlock a profile for the user.
    pub fn unlock(&mut self, user_id: &UserId, profile_id: &ProfileId) -> Result<(), MatricError> {
        catalog::unlock_profile(&mut self.backend, user_id, profile_id)
    }

    /// Bookmark a profile for the user.
    pub fn save(&mut self, user_id: &UserId, profile_id: &ProfileId) -> Result<(), MatricError> {
        catalog::save_profile(&mut self.backend, user_id, profile_id)
    }

    // =========================================================================
    // METRICS
    // =========================================================================

    /// Number of user accounts.
    pub fn user_count(&self) -> Result<usize, MatricError> {
        self.backend.user_count()
    }

    /// Number of profiles.
    pub fn profile_count(&self) -> Result<usize, MatricError> {
        self.backend.profile_count()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AdmissionStatus, Essay, SchoolAdmission, TestScore};

    fn make_draft() -> ProfileDraft {
        ProfileDraft {
            price: 900,
            current_school: "State U".to_string(),
            current_major: "CS".to_string(),
            current_description: String::from("senior"),
            school_admissions: vec![SchoolAdmission {
                school: "State U".to_string(),
                degree: "BSc".to_string(),
                major: "CS".to_string(),
                status: AdmissionStatus::Accepted,
                essays: vec![Essay {
                    title: "Personal statement".to_string(),
                    content: "Why I chose this school because...".to_string(),
                }],
            }],
            test_scores: vec![TestScore {
                test: "SAT".to_string(),
                score: "1540".to_string(),
            }],
        }
    }

    #[test]
    fn full_flow_over_in_memory_backend() {
        let mut market = Marketplace::new();
        let now = TimestampMs::new(0);

        let alice_session = market
            .signup("alice", "hunter22", "alice@example.com", now)
            .expect("signup alice");
        let alice = market.authenticate(&alice_session, now).expect("auth");
        let profile_id = market
            .create_profile(&alice, make_draft(), now)
            .expect("create");

        let bob_session = market
            .signup("bobby", "hunter23", "bob@example.com", now)
            .expect("signup bob");
        let bob = market.authenticate(&bob_session, now).expect("auth");

        // Stranger view is redacted.
        let view = market.profile(&profile_id, Some(&bob)).expect("view");
        assert!(!view.is_owned);
        assert_eq!(
            view.profile.school_admissions[0].essays[0].content,
            "Why I chos"
        );

        // Unlock grants the full view.
        market.unlock(&bob.user_id, &profile_id).expect("unlock");
        let bob = market.authenticate(&bob_session, now).expect("re-auth");
        let view = market.profile(&profile_id, Some(&bob)).expect("view");
        assert!(view.is_unlocked);
        assert_eq!(view.profile.test_scores[0].score, "1540");

        // Catalog lists the profile for everyone.
        let catalog = market.catalog().expect("catalog");
        assert_eq!(catalog.len(), 1);

        // Logout revokes the session.
        market
            .logout(&bob.user_id, &bob_session)
            .expect("logout");
        assert!(market.authenticate(&bob_session, now).is_err());
    }

    #[test]
    fn backend_default_is_volatile() {
        let market = Marketplace::new();
        assert!(!market.is_persistent());
        assert_eq!(market.user_count().expect("count"), 0);
    }
}
