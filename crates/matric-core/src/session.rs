//! # Session Management
//!
//! Issues, validates, refreshes, revokes and prunes authentication
//! sessions against a [`UserStore`].
//!
//! Per session the lifecycle is: Active until the expiry instant passes
//! (detected lazily on the next validate/resolve), then Expired until
//! the next prune removes it; an explicit revoke removes an Active
//! session directly. Removal is terminal. A user may hold any number of
//! concurrent Active sessions (multi-device); growth is bounded by
//! pruning expired entries before each fresh issue at login.
//!
//! Operations take an explicit `now` instant so expiry behavior is
//! deterministic and boundary-testable; only id generation draws on
//! the environment.

use crate::primitives::SESSION_TTL_MS;
use crate::store::UserStore;
use crate::types::{MatricError, Session, SessionId, TimestampMs, User, UserId};

/// Issues and maintains per-user authentication sessions.
#[derive(Debug, Clone, Copy)]
pub struct SessionManager {
    ttl_ms: u64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self {
            ttl_ms: SESSION_TTL_MS,
        }
    }
}

impl SessionManager {
    /// Create a manager with the default one-hour TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager with a custom TTL, in milliseconds.
    #[must_use]
    pub const fn with_ttl_ms(ttl_ms: u64) -> Self {
        Self { ttl_ms }
    }

    /// The configured TTL in milliseconds.
    #[must_use]
    pub const fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Issue a fresh session for the user: a cryptographically unique
    /// opaque id with expiry `now + TTL`, appended to the user's session
    /// list in one atomic store call.
    pub fn issue<S: UserStore>(
        &self,
        store: &mut S,
        user_id: &UserId,
        now: TimestampMs,
    ) -> Result<Session, MatricError> {
        let session = Session {
            session_id: SessionId::generate(),
            expiry: now.saturating_add(self.ttl_ms),
        };
        store.append_session(user_id, session.clone())?;
        Ok(session)
    }

    /// True iff some user holds a session with this id whose expiry is
    /// strictly greater than `now`. Expired entries are not swept here;
    /// expiry is evaluated lazily at query time.
    pub fn validate<S: UserStore>(
        &self,
        store: &S,
        session_id: &SessionId,
        now: TimestampMs,
    ) -> Result<bool, MatricError> {
        Ok(store.find_user_by_live_session(session_id, now)?.is_some())
    }

    /// The user owning a currently valid session with this id. Fails
    /// with NotFound whether the id never existed or has expired.
    pub fn resolve<S: UserStore>(
        &self,
        store: &S,
        session_id: &SessionId,
        now: TimestampMs,
    ) -> Result<User, MatricError> {
        store
            .find_user_by_live_session(session_id, now)?
            .ok_or_else(|| MatricError::NotFound("no user holds a live session with that id".into()))
    }

    /// Move the matching session's expiry to `now + TTL`. Idempotent
    /// under repeated calls; a stored expiry never decreases. No-op if
    /// the session no longer exists.
    pub fn refresh<S: UserStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        now: TimestampMs,
    ) -> Result<(), MatricError> {
        store.extend_session(session_id, now.saturating_add(self.ttl_ms))
    }

    /// Remove the matching session from the user. No-op if absent.
    pub fn revoke<S: UserStore>(
        &self,
        store: &mut S,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Result<(), MatricError> {
        store.remove_session(user_id, session_id)
    }

    /// Remove every session of the user with expiry <= `now`.
    pub fn prune_expired<S: UserStore>(
        &self,
        store: &mut S,
        user_id: &UserId,
        now: TimestampMs,
    ) -> Result<(), MatricError> {
        store.remove_expired_sessions(user_id, now)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::User;
    use std::collections::BTreeSet;

    fn store_with_user(id: &str) -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .insert_user(User {
                user_id: UserId::new(id),
                username: format!("user-{id}"),
                password_hash: String::new(),
                email: String::new(),
                thumbnail_url: String::new(),
                sessions: vec![],
                created_profile_ids: BTreeSet::new(),
                saved_profile_ids: BTreeSet::new(),
                unlocked_profile_ids: BTreeSet::new(),
            })
            .expect("insert");
        store
    }

    #[test]
    fn issued_session_validates_immediately() {
        let mut store = store_with_user("u1");
        let manager = SessionManager::new();
        let now = TimestampMs::new(1_000);

        let session = manager
            .issue(&mut store, &UserId::new("u1"), now)
            .expect("issue");

        assert!(
            manager
                .validate(&store, &session.session_id, now)
                .expect("validate")
        );
    }

    #[test]
    fn validation_boundary_around_expiry() {
        let mut store = store_with_user("u1");
        let manager = SessionManager::new();
        let issued_at = TimestampMs::new(0);

        let session = manager
            .issue(&mut store, &UserId::new("u1"), issued_at)
            .expect("issue");

        // TTL is 3,600,000 ms: live one millisecond before expiry, dead
        // one millisecond after.
        assert!(
            manager
                .validate(&store, &session.session_id, TimestampMs::new(3_599_999))
                .expect("validate")
        );
        assert!(
            !manager
                .validate(&store, &session.session_id, TimestampMs::new(3_600_001))
                .expect("validate")
        );
    }

    #[test]
    fn unknown_session_fails_validation_and_resolution() {
        let store = store_with_user("u1");
        let manager = SessionManager::new();
        let ghost = SessionId::new("ghost");

        assert!(
            !manager
                .validate(&store, &ghost, TimestampMs::new(0))
                .expect("validate")
        );
        let err = manager
            .resolve(&store, &ghost, TimestampMs::new(0))
            .expect_err("resolve must fail");
        assert!(matches!(err, MatricError::NotFound(_)));
    }

    #[test]
    fn resolve_returns_owning_user() {
        let mut store = store_with_user("u1");
        let manager = SessionManager::new();
        let now = TimestampMs::new(5);

        let session = manager
            .issue(&mut store, &UserId::new("u1"), now)
            .expect("issue");
        let user = manager
            .resolve(&store, &session.session_id, now)
            .expect("resolve");
        assert_eq!(user.user_id, UserId::new("u1"));
    }

    #[test]
    fn refresh_extends_and_never_decreases() {
        let mut store = store_with_user("u1");
        let manager = SessionManager::with_ttl_ms(1_000);
        let user_id = UserId::new("u1");

        let session = manager
            .issue(&mut store, &user_id, TimestampMs::new(0))
            .expect("issue");

        manager
            .refresh(&mut store, &session.session_id, TimestampMs::new(500))
            .expect("refresh");
        // Session now expires at 1500; still valid past the original 1000.
        assert!(
            manager
                .validate(&store, &session.session_id, TimestampMs::new(1_200))
                .expect("validate")
        );

        // A repeated refresh with an earlier now must not pull the
        // expiry back.
        manager
            .refresh(&mut store, &session.session_id, TimestampMs::new(100))
            .expect("refresh");
        assert!(
            manager
                .validate(&store, &session.session_id, TimestampMs::new(1_200))
                .expect("validate")
        );
    }

    #[test]
    fn refresh_is_a_no_op_for_missing_session() {
        let mut store = store_with_user("u1");
        let manager = SessionManager::new();

        manager
            .refresh(&mut store, &SessionId::new("gone"), TimestampMs::new(0))
            .expect("refresh no-op");
    }

    #[test]
    fn revoked_session_is_terminal() {
        let mut store = store_with_user("u1");
        let manager = SessionManager::new();
        let user_id = UserId::new("u1");
        let now = TimestampMs::new(0);

        let session = manager.issue(&mut store, &user_id, now).expect("issue");
        manager
            .revoke(&mut store, &user_id, &session.session_id)
            .expect("revoke");

        assert!(
            !manager
                .validate(&store, &session.session_id, now)
                .expect("validate")
        );
        // Refreshing a removed session does not resurrect it.
        manager
            .refresh(&mut store, &session.session_id, now)
            .expect("refresh no-op");
        assert!(
            !manager
                .validate(&store, &session.session_id, now)
                .expect("validate")
        );
    }

    #[test]
    fn prune_removes_exactly_the_expired() {
        let mut store = store_with_user("u1");
        let manager = SessionManager::with_ttl_ms(1_000);
        let user_id = UserId::new("u1");

        let stale = manager
            .issue(&mut store, &user_id, TimestampMs::new(0))
            .expect("issue");
        let live = manager
            .issue(&mut store, &user_id, TimestampMs::new(5_000))
            .expect("issue");

        manager
            .prune_expired(&mut store, &user_id, TimestampMs::new(5_000))
            .expect("prune");

        let user = store
            .find_user_by_id(&user_id)
            .expect("lookup")
            .expect("user");
        assert_eq!(user.sessions.len(), 1);
        assert_eq!(user.sessions[0].session_id, live.session_id);
        // The surviving session is byte-for-byte the one issued.
        assert_eq!(user.sessions[0], live);
        assert_ne!(user.sessions[0].session_id, stale.session_id);
    }
}
