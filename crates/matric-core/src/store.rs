//! # Storage Traits
//!
//! The persistence collaborator seams for the marketplace core.
//!
//! Every mutating call must be applied as a single atomic update against
//! the persisted document: it either fully applies or does not apply at
//! all. Given that guarantee, concurrent requests for the same user need
//! no additional in-process locking; a concurrent refresh and prune are
//! commutative because refresh only touches sessions not yet past expiry
//! and prune only removes sessions already past it.
//!
//! Lookups that are keyed by session id evaluate expiry lazily with an
//! expiry-strictly-greater-than-now predicate; expired entries linger
//! until the owning user's next prune.

use crate::types::{MatricError, Profile, ProfileId, Session, SessionId, TimestampMs, User, UserId};
use std::collections::BTreeSet;

/// Store of user account documents, keyed by opaque string identifiers.
pub trait UserStore {
    /// Insert a new user document.
    fn insert_user(&mut self, user: User) -> Result<(), MatricError>;

    /// Fetch a user by id.
    fn find_user_by_id(&self, user_id: &UserId) -> Result<Option<User>, MatricError>;

    /// Fetch a user by login handle.
    fn find_user_by_username(&self, username: &str) -> Result<Option<User>, MatricError>;

    /// Fetch the user holding a session with this id whose expiry is
    /// strictly greater than `now`. Returns `None` both for ids that
    /// never existed and for expired entries.
    fn find_user_by_live_session(
        &self,
        session_id: &SessionId,
        now: TimestampMs,
    ) -> Result<Option<User>, MatricError>;

    /// Append a session to the user's session list. No-op if the user
    /// is absent.
    fn append_session(&mut self, user_id: &UserId, session: Session) -> Result<(), MatricError>;

    /// Move the matching session's expiry forward to `expiry`. A stored
    /// expiry never decreases; later instants win. No-op if no session
    /// matches.
    fn extend_session(
        &mut self,
        session_id: &SessionId,
        expiry: TimestampMs,
    ) -> Result<(), MatricError>;

    /// Remove the matching session from the user. No-op if absent.
    fn remove_session(
        &mut self,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Result<(), MatricError>;

    /// Remove every session of the user with expiry <= `now`.
    fn remove_expired_sessions(
        &mut self,
        user_id: &UserId,
        now: TimestampMs,
    ) -> Result<(), MatricError>;

    /// Add a profile id to the user's created set.
    fn add_created_profile(
        &mut self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<(), MatricError>;

    /// Add a profile id to the user's unlocked set.
    fn add_unlocked_profile(
        &mut self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<(), MatricError>;

    /// Add a profile id to the user's saved set.
    fn add_saved_profile(
        &mut self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<(), MatricError>;

    /// Number of user documents in the store.
    fn user_count(&self) -> Result<usize, MatricError>;
}

/// Store of profile documents, keyed by opaque string identifiers.
pub trait ProfileStore {
    /// Insert a new profile document.
    fn insert_profile(&mut self, profile: Profile) -> Result<(), MatricError>;

    /// Fetch a profile by id.
    fn find_profile_by_id(&self, profile_id: &ProfileId) -> Result<Option<Profile>, MatricError>;

    /// All published profiles, in deterministic id order.
    fn published_profiles(&self) -> Result<Vec<Profile>, MatricError>;

    /// The profiles matching an id set, in the set's order. Missing ids
    /// are skipped.
    fn profiles_by_ids(&self, ids: &BTreeSet<ProfileId>) -> Result<Vec<Profile>, MatricError>;

    /// Number of profile documents in the store.
    fn profile_count(&self) -> Result<usize, MatricError>;
}
