//! # In-Memory Store
//!
//! A volatile, BTreeMap-backed implementation of the store traits.
//!
//! Used by tests and by the `--backend memory` CLI mode. Maintains the
//! same secondary indexes as the persistent backend (username and
//! session id) so lookups stay O(log n) in both.

use crate::store::{ProfileStore, UserStore};
use crate::types::{MatricError, Profile, ProfileId, Session, SessionId, TimestampMs, User, UserId};
use std::collections::{BTreeMap, BTreeSet};

/// Volatile store. Everything is lost on drop unless the caller keeps
/// the instance alive.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: BTreeMap<UserId, User>,
    username_index: BTreeMap<String, UserId>,
    session_index: BTreeMap<SessionId, UserId>,
    profiles: BTreeMap<ProfileId, Profile>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryStore {
    fn insert_user(&mut self, user: User) -> Result<(), MatricError> {
        if self.username_index.contains_key(&user.username) {
            return Err(MatricError::Storage(format!(
                "username '{}' already indexed",
                user.username
            )));
        }
        self.username_index
            .insert(user.username.clone(), user.user_id.clone());
        for session in &user.sessions {
            self.session_index
                .insert(session.session_id.clone(), user.user_id.clone());
        }
        self.users.insert(user.user_id.clone(), user);
        Ok(())
    }

    fn find_user_by_id(&self, user_id: &UserId) -> Result<Option<User>, MatricError> {
        Ok(self.users.get(user_id).cloned())
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>, MatricError> {
        Ok(self
            .username_index
            .get(username)
            .and_then(|id| self.users.get(id))
            .cloned())
    }

    fn find_user_by_live_session(
        &self,
        session_id: &SessionId,
        now: TimestampMs,
    ) -> Result<Option<User>, MatricError> {
        let Some(user) = self
            .session_index
            .get(session_id)
            .and_then(|id| self.users.get(id))
        else {
            return Ok(None);
        };
        let live = user
            .sessions
            .iter()
            .any(|s| s.session_id == *session_id && s.is_live(now));
        Ok(live.then(|| user.clone()))
    }

    fn append_session(&mut self, user_id: &UserId, session: Session) -> Result<(), MatricError> {
        if let Some(user) = self.users.get_mut(user_id) {
            self.session_index
                .insert(session.session_id.clone(), user_id.clone());
            user.sessions.push(session);
        }
        Ok(())
    }

    fn extend_session(
        &mut self,
        session_id: &SessionId,
        expiry: TimestampMs,
    ) -> Result<(), MatricError> {
        let Some(user) = self
            .session_index
            .get(session_id)
            .and_then(|id| self.users.get_mut(id))
        else {
            return Ok(());
        };
        if let Some(session) = user
            .sessions
            .iter_mut()
            .find(|s| s.session_id == *session_id)
        {
            if expiry > session.expiry {
                session.expiry = expiry;
            }
        }
        Ok(())
    }

    fn remove_session(
        &mut self,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Result<(), MatricError> {
        if let Some(user) = self.users.get_mut(user_id) {
            let before = user.sessions.len();
            user.sessions.retain(|s| s.session_id != *session_id);
            // Only drop the index entry when this user actually held the
            // session; the id may belong to someone else.
            if user.sessions.len() != before {
                self.session_index.remove(session_id);
            }
        }
        Ok(())
    }

    fn remove_expired_sessions(
        &mut self,
        user_id: &UserId,
        now: TimestampMs,
    ) -> Result<(), MatricError> {
        if let Some(user) = self.users.get_mut(user_id) {
            let expired: Vec<SessionId> = user
                .sessions
                .iter()
                .filter(|s| !s.is_live(now))
                .map(|s| s.session_id.clone())
                .collect();
            user.sessions.retain(|s| s.is_live(now));
            for session_id in expired {
                self.session_index.remove(&session_id);
            }
        }
        Ok(())
    }

    fn add_created_profile(
        &mut self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<(), MatricError> {
        if let Some(user) = self.users.get_mut(user_id) {
            user.created_profile_ids.insert(profile_id.clone());
        }
        Ok(())
    }

    fn add_unlocked_profile(
        &mut self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<(), MatricError> {
        if let Some(user) = self.users.get_mut(user_id) {
            user.unlocked_profile_ids.insert(profile_id.clone());
        }
        Ok(())
    }

    fn add_saved_profile(
        &mut self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<(), MatricError> {
        if let Some(user) = self.users.get_mut(user_id) {
            user.saved_profile_ids.insert(profile_id.clone());
        }
        Ok(())
    }

    fn user_count(&self) -> Result<usize, MatricError> {
        Ok(self.users.len())
    }
}

impl ProfileStore for MemoryStore {
    fn insert_profile(&mut self, profile: Profile) -> Result<(), MatricError> {
        self.profiles.insert(profile.profile_id.clone(), profile);
        Ok(())
    }

    fn find_profile_by_id(&self, profile_id: &ProfileId) -> Result<Option<Profile>, MatricError> {
        Ok(self.profiles.get(profile_id).cloned())
    }

    fn published_profiles(&self) -> Result<Vec<Profile>, MatricError> {
        Ok(self
            .profiles
            .values()
            .filter(|p| p.published)
            .cloned()
            .collect())
    }

    fn profiles_by_ids(&self, ids: &BTreeSet<ProfileId>) -> Result<Vec<Profile>, MatricError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.profiles.get(id))
            .cloned()
            .collect())
    }

    fn profile_count(&self) -> Result<usize, MatricError> {
        Ok(self.profiles.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user(id: &str, username: &str) -> User {
        User {
            user_id: UserId::new(id),
            username: username.to_string(),
            password_hash: "phc".to_string(),
            email: format!("{username}@example.com"),
            thumbnail_url: String::new(),
            sessions: vec![],
            created_profile_ids: BTreeSet::new(),
            saved_profile_ids: BTreeSet::new(),
            unlocked_profile_ids: BTreeSet::new(),
        }
    }

    #[test]
    fn username_index_round_trip() {
        let mut store = MemoryStore::new();
        store.insert_user(make_user("u1", "alice")).expect("insert");

        let found = store.find_user_by_username("alice").expect("lookup");
        assert_eq!(found.expect("user").user_id, UserId::new("u1"));
        assert!(store.find_user_by_username("bob").expect("lookup").is_none());
    }

    #[test]
    fn duplicate_username_rejected() {
        let mut store = MemoryStore::new();
        store.insert_user(make_user("u1", "alice")).expect("insert");
        assert!(store.insert_user(make_user("u2", "alice")).is_err());
    }

    #[test]
    fn live_session_lookup_is_lazy() {
        let mut store = MemoryStore::new();
        store.insert_user(make_user("u1", "alice")).expect("insert");

        let session_id = SessionId::new("s1");
        store
            .append_session(
                &UserId::new("u1"),
                Session {
                    session_id: session_id.clone(),
                    expiry: TimestampMs::new(1000),
                },
            )
            .expect("append");

        // Live strictly before expiry, dead at and after it.
        assert!(
            store
                .find_user_by_live_session(&session_id, TimestampMs::new(999))
                .expect("lookup")
                .is_some()
        );
        assert!(
            store
                .find_user_by_live_session(&session_id, TimestampMs::new(1000))
                .expect("lookup")
                .is_none()
        );

        // The expired entry is still stored until pruned.
        let user = store
            .find_user_by_id(&UserId::new("u1"))
            .expect("lookup")
            .expect("user");
        assert_eq!(user.sessions.len(), 1);
    }

    #[test]
    fn extend_session_never_decreases_expiry() {
        let mut store = MemoryStore::new();
        store.insert_user(make_user("u1", "alice")).expect("insert");
        let session_id = SessionId::new("s1");
        store
            .append_session(
                &UserId::new("u1"),
                Session {
                    session_id: session_id.clone(),
                    expiry: TimestampMs::new(5000),
                },
            )
            .expect("append");

        store
            .extend_session(&session_id, TimestampMs::new(4000))
            .expect("extend");
        let user = store
            .find_user_by_id(&UserId::new("u1"))
            .expect("lookup")
            .expect("user");
        assert_eq!(user.sessions[0].expiry, TimestampMs::new(5000));

        store
            .extend_session(&session_id, TimestampMs::new(9000))
            .expect("extend");
        let user = store
            .find_user_by_id(&UserId::new("u1"))
            .expect("lookup")
            .expect("user");
        assert_eq!(user.sessions[0].expiry, TimestampMs::new(9000));
    }

    #[test]
    fn remove_expired_keeps_live_sessions() {
        let mut store = MemoryStore::new();
        store.insert_user(make_user("u1", "alice")).expect("insert");
        let user_id = UserId::new("u1");
        for (id, expiry) in [("s1", 100), ("s2", 2000), ("s3", 1000)] {
            store
                .append_session(
                    &user_id,
                    Session {
                        session_id: SessionId::new(id),
                        expiry: TimestampMs::new(expiry),
                    },
                )
                .expect("append");
        }

        store
            .remove_expired_sessions(&user_id, TimestampMs::new(1000))
            .expect("prune");

        let user = store
            .find_user_by_id(&user_id)
            .expect("lookup")
            .expect("user");
        let remaining: Vec<&str> = user.sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(remaining, vec!["s2"]);
        // Pruned ids fall out of the session index too.
        assert!(
            store
                .find_user_by_live_session(&SessionId::new("s1"), TimestampMs::new(0))
                .expect("lookup")
                .is_none()
        );
    }

    #[test]
    fn membership_updates_no_op_for_missing_user() {
        let mut store = MemoryStore::new();
        store
            .add_unlocked_profile(&UserId::new("ghost"), &ProfileId::new("p1"))
            .expect("no-op");
        assert_eq!(store.user_count().expect("count"), 0);
    }
}
