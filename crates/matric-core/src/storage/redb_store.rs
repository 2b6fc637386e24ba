//! # redb-backed Store
//!
//! A disk-backed implementation of the store traits using the redb
//! embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! Every mutating trait call opens exactly one write transaction, so
//! each update is a single atomic step: a request timeout or cancelled
//! caller abandons the call without leaving partial state. Documents are
//! postcard-encoded; the username and session indexes are maintained in
//! the same transaction as the documents they point at.

use crate::store::{ProfileStore, UserStore};
use crate::types::{MatricError, Profile, ProfileId, Session, SessionId, TimestampMs, User, UserId};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::Path;

/// Table for user documents: user_id -> postcard bytes.
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Table for the login-handle index: username -> user_id.
const USERNAME_INDEX: TableDefinition<&str, &str> = TableDefinition::new("username_index");

/// Table for the session index: session_id -> user_id.
///
/// Entries for expired sessions linger until the owning user's next
/// prune; expiry is evaluated against the user document at query time.
const SESSION_INDEX: TableDefinition<&str, &str> = TableDefinition::new("session_index");

/// Table for profile documents: profile_id -> postcard bytes.
const PROFILES: TableDefinition<&str, &[u8]> = TableDefinition::new("profiles");

fn encode<T: Serialize>(doc: &T) -> Result<Vec<u8>, MatricError> {
    postcard::to_allocvec(doc).map_err(|e| MatricError::Storage(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, MatricError> {
    postcard::from_bytes(bytes).map_err(|e| MatricError::Storage(e.to_string()))
}

/// A disk-backed marketplace store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MatricError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| MatricError::Storage(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(USERS)
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(USERNAME_INDEX)
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(SESSION_INDEX)
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(PROFILES)
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| MatricError::Storage(e.to_string()))?;
        }

        Ok(Self { db })
    }

    /// Load, mutate and write back a single user document in one
    /// transaction. No-op (still committed) if the user is absent.
    fn update_user<F>(&mut self, user_id: &UserId, mutate: F) -> Result<(), MatricError>
    where
        F: FnOnce(&mut User),
    {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        {
            let mut users = write_txn
                .open_table(USERS)
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            let loaded = {
                let guard = users
                    .get(user_id.as_str())
                    .map_err(|e| MatricError::Storage(e.to_string()))?;
                match guard {
                    Some(bytes) => Some(decode::<User>(bytes.value())?),
                    None => None,
                }
            };
            if let Some(mut user) = loaded {
                mutate(&mut user);
                let bytes = encode(&user)?;
                users
                    .insert(user_id.as_str(), bytes.as_slice())
                    .map_err(|e| MatricError::Storage(e.to_string()))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Resolve a session id to its owning user id, if indexed.
    fn session_owner(&self, session_id: &SessionId) -> Result<Option<String>, MatricError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let index = read_txn
            .open_table(SESSION_INDEX)
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let owner = index
            .get(session_id.as_str())
            .map_err(|e| MatricError::Storage(e.to_string()))?
            .map(|v| v.value().to_string());
        Ok(owner)
    }
}

impl UserStore for RedbStore {
    fn insert_user(&mut self, user: User) -> Result<(), MatricError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        {
            let mut username_index = write_txn
                .open_table(USERNAME_INDEX)
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            let taken = username_index
                .get(user.username.as_str())
                .map_err(|e| MatricError::Storage(e.to_string()))?
                .is_some();
            if taken {
                return Err(MatricError::Storage(format!(
                    "username '{}' already indexed",
                    user.username
                )));
            }
            username_index
                .insert(user.username.as_str(), user.user_id.as_str())
                .map_err(|e| MatricError::Storage(e.to_string()))?;

            let mut session_index = write_txn
                .open_table(SESSION_INDEX)
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            for session in &user.sessions {
                session_index
                    .insert(session.session_id.as_str(), user.user_id.as_str())
                    .map_err(|e| MatricError::Storage(e.to_string()))?;
            }

            let mut users = write_txn
                .open_table(USERS)
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            let bytes = encode(&user)?;
            users
                .insert(user.user_id.as_str(), bytes.as_slice())
                .map_err(|e| MatricError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        Ok(())
    }

    fn find_user_by_id(&self, user_id: &UserId) -> Result<Option<User>, MatricError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let users = read_txn
            .open_table(USERS)
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let Some(bytes) = users
            .get(user_id.as_str())
            .map_err(|e| MatricError::Storage(e.to_string()))?
        else {
            return Ok(None);
        };
        decode(bytes.value()).map(Some)
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>, MatricError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let index = read_txn
            .open_table(USERNAME_INDEX)
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let Some(user_key) = index
            .get(username)
            .map_err(|e| MatricError::Storage(e.to_string()))?
            .map(|v| v.value().to_string())
        else {
            return Ok(None);
        };
        let users = read_txn
            .open_table(USERS)
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let Some(bytes) = users
            .get(user_key.as_str())
            .map_err(|e| MatricError::Storage(e.to_string()))?
        else {
            return Ok(None);
        };
        decode(bytes.value()).map(Some)
    }

    fn find_user_by_live_session(
        &self,
        session_id: &SessionId,
        now: TimestampMs,
    ) -> Result<Option<User>, MatricError> {
        let Some(user_key) = self.session_owner(session_id)? else {
            return Ok(None);
        };
        let Some(user) = self.find_user_by_id(&UserId::new(user_key))? else {
            return Ok(None);
        };
        let live = user
            .sessions
            .iter()
            .any(|s| s.session_id == *session_id && s.is_live(now));
        Ok(live.then_some(user))
    }

    fn append_session(&mut self, user_id: &UserId, session: Session) -> Result<(), MatricError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        {
            let mut users = write_txn
                .open_table(USERS)
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            let loaded = {
                let guard = users
                    .get(user_id.as_str())
                    .map_err(|e| MatricError::Storage(e.to_string()))?;
                match guard {
                    Some(bytes) => Some(decode::<User>(bytes.value())?),
                    None => None,
                }
            };
            if let Some(mut user) = loaded {
                let mut session_index = write_txn
                    .open_table(SESSION_INDEX)
                    .map_err(|e| MatricError::Storage(e.to_string()))?;
                session_index
                    .insert(session.session_id.as_str(), user_id.as_str())
                    .map_err(|e| MatricError::Storage(e.to_string()))?;
                user.sessions.push(session);
                let bytes = encode(&user)?;
                users
                    .insert(user_id.as_str(), bytes.as_slice())
                    .map_err(|e| MatricError::Storage(e.to_string()))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        Ok(())
    }

    fn extend_session(
        &mut self,
        session_id: &SessionId,
        expiry: TimestampMs,
    ) -> Result<(), MatricError> {
        let Some(user_key) = self.session_owner(session_id)? else {
            return Ok(());
        };
        self.update_user(&UserId::new(user_key), |user| {
            if let Some(session) = user
                .sessions
                .iter_mut()
                .find(|s| s.session_id == *session_id)
            {
                if expiry > session.expiry {
                    session.expiry = expiry;
                }
            }
        })
    }

    fn remove_session(
        &mut self,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Result<(), MatricError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        {
            let mut users = write_txn
                .open_table(USERS)
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            let loaded = {
                let guard = users
                    .get(user_id.as_str())
                    .map_err(|e| MatricError::Storage(e.to_string()))?;
                match guard {
                    Some(bytes) => Some(decode::<User>(bytes.value())?),
                    None => None,
                }
            };
            if let Some(mut user) = loaded {
                let before = user.sessions.len();
                user.sessions.retain(|s| s.session_id != *session_id);
                let held = user.sessions.len() != before;
                let bytes = encode(&user)?;
                users
                    .insert(user_id.as_str(), bytes.as_slice())
                    .map_err(|e| MatricError::Storage(e.to_string()))?;
                // Only drop the index entry when this user actually held
                // the session; the id may belong to someone else.
                if held {
                    let mut session_index = write_txn
                        .open_table(SESSION_INDEX)
                        .map_err(|e| MatricError::Storage(e.to_string()))?;
                    session_index
                        .remove(session_id.as_str())
                        .map_err(|e| MatricError::Storage(e.to_string()))?;
                }
            }
        }
        write_txn
            .commit()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        Ok(())
    }

    fn remove_expired_sessions(
        &mut self,
        user_id: &UserId,
        now: TimestampMs,
    ) -> Result<(), MatricError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        {
            let mut users = write_txn
                .open_table(USERS)
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            let loaded = {
                let guard = users
                    .get(user_id.as_str())
                    .map_err(|e| MatricError::Storage(e.to_string()))?;
                match guard {
                    Some(bytes) => Some(decode::<User>(bytes.value())?),
                    None => None,
                }
            };
            if let Some(mut user) = loaded {
                let expired: Vec<SessionId> = user
                    .sessions
                    .iter()
                    .filter(|s| !s.is_live(now))
                    .map(|s| s.session_id.clone())
                    .collect();
                user.sessions.retain(|s| s.is_live(now));
                let bytes = encode(&user)?;
                users
                    .insert(user_id.as_str(), bytes.as_slice())
                    .map_err(|e| MatricError::Storage(e.to_string()))?;
                let mut session_index = write_txn
                    .open_table(SESSION_INDEX)
                    .map_err(|e| MatricError::Storage(e.to_string()))?;
                for session_id in &expired {
                    session_index
                        .remove(session_id.as_str())
                        .map_err(|e| MatricError::Storage(e.to_string()))?;
                }
            }
        }
        write_txn
            .commit()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        Ok(())
    }

    fn add_created_profile(
        &mut self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<(), MatricError> {
        self.update_user(user_id, |user| {
            user.created_profile_ids.insert(profile_id.clone());
        })
    }

    fn add_unlocked_profile(
        &mut self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<(), MatricError> {
        self.update_user(user_id, |user| {
            user.unlocked_profile_ids.insert(profile_id.clone());
        })
    }

    fn add_saved_profile(
        &mut self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<(), MatricError> {
        self.update_user(user_id, |user| {
            user.saved_profile_ids.insert(profile_id.clone());
        })
    }

    fn user_count(&self) -> Result<usize, MatricError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let users = read_txn
            .open_table(USERS)
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let count = users
            .len()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        Ok(count as usize)
    }
}

impl ProfileStore for RedbStore {
    fn insert_profile(&mut self, profile: Profile) -> Result<(), MatricError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        {
            let mut profiles = write_txn
                .open_table(PROFILES)
                .map_err(|e| MatricError::Storage(e.to_string()))?;
            let bytes = encode(&profile)?;
            profiles
                .insert(profile.profile_id.as_str(), bytes.as_slice())
                .map_err(|e| MatricError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        Ok(())
    }

    fn find_profile_by_id(&self, profile_id: &ProfileId) -> Result<Option<Profile>, MatricError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let profiles = read_txn
            .open_table(PROFILES)
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let Some(bytes) = profiles
            .get(profile_id.as_str())
            .map_err(|e| MatricError::Storage(e.to_string()))?
        else {
            return Ok(None);
        };
        decode(bytes.value()).map(Some)
    }

    fn published_profiles(&self) -> Result<Vec<Profile>, MatricError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let profiles = read_txn
            .open_table(PROFILES)
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let mut out = Vec::new();
        for entry in profiles
            .iter()
            .map_err(|e| MatricError::Storage(e.to_string()))?
        {
            let (_key, value) = entry.map_err(|e| MatricError::Storage(e.to_string()))?;
            let profile: Profile = decode(value.value())?;
            if profile.published {
                out.push(profile);
            }
        }
        Ok(out)
    }

    fn profiles_by_ids(&self, ids: &BTreeSet<ProfileId>) -> Result<Vec<Profile>, MatricError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let profiles = read_txn
            .open_table(PROFILES)
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let mut out = Vec::new();
        for profile_id in ids {
            let Some(bytes) = profiles
                .get(profile_id.as_str())
                .map_err(|e| MatricError::Storage(e.to_string()))?
            else {
                continue;
            };
            out.push(decode(bytes.value())?);
        }
        Ok(out)
    }

    fn profile_count(&self) -> Result<usize, MatricError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let profiles = read_txn
            .open_table(PROFILES)
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        let count = profiles
            .len()
            .map_err(|e| MatricError::Storage(e.to_string()))?;
        Ok(count as usize)
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

    fn make_profile(id: &str, owner: &str) -> Profile {
        Profile {
            profile_id: ProfileId::new(id),
            owner_user_id: UserId::new(owner),
            display_name: "alice".to_string(),
            thumbnail_url: String::new(),
            date_created: TimestampMs::new(0),
            price: 500,
            purchase_count: 0,
            published: true,
            current_school: "State U".to_string(),
            current_major: "CS".to_string(),
            current_description: String::new(),
            school_admissions: vec![],
            test_scores: vec![],
        }
    }

    #[test]
    fn documents_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("matric.db");

        {
            let mut store = RedbStore::open(&path).expect("open");
            store.insert_user(make_user("u1", "alice")).expect("user");
            store
                .append_session(
                    &UserId::new("u1"),
                    Session {
                        session_id: SessionId::new("s1"),
                        expiry: TimestampMs::new(10_000),
                    },
                )
                .expect("session");
            store
                .insert_profile(make_profile("p1", "u1"))
                .expect("profile");
        }

        let store = RedbStore::open(&path).expect("reopen");
        let user = store
            .find_user_by_username("alice")
            .expect("lookup")
            .expect("user");
        assert_eq!(user.user_id, UserId::new("u1"));
        assert_eq!(user.sessions.len(), 1);
        assert!(
            store
                .find_user_by_live_session(&SessionId::new("s1"), TimestampMs::new(9_999))
                .expect("lookup")
                .is_some()
        );
        assert!(
            store
                .find_profile_by_id(&ProfileId::new("p1"))
                .expect("lookup")
                .is_some()
        );
        assert_eq!(store.profile_count().expect("count"), 1);
    }

    #[test]
    fn session_removal_updates_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = RedbStore::open(dir.path().join("matric.db")).expect("open");
        store.insert_user(make_user("u1", "alice")).expect("user");
        let user_id = UserId::new("u1");
        store
            .append_session(
                &user_id,
                Session {
                    session_id: SessionId::new("s1"),
                    expiry: TimestampMs::new(10_000),
                },
            )
            .expect("session");

        store
            .remove_session(&user_id, &SessionId::new("s1"))
            .expect("remove");

        assert!(
            store
                .find_user_by_live_session(&SessionId::new("s1"), TimestampMs::new(0))
                .expect("lookup")
                .is_none()
        );
        let user = store
            .find_user_by_id(&user_id)
            .expect("lookup")
            .expect("user");
        assert!(user.sessions.is_empty());
    }

    #[test]
    fn prune_is_exact_at_the_boundary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = RedbStore::open(dir.path().join("matric.db")).expect("open");
        store.insert_user(make_user("u1", "alice")).expect("user");
        let user_id = UserId::new("u1");
        for (id, expiry) in [("s1", 999), ("s2", 1000), ("s3", 1001)] {
            store
                .append_session(
                    &user_id,
                    Session {
                        session_id: SessionId::new(id),
                        expiry: TimestampMs::new(expiry),
                    },
                )
                .expect("session");
        }

        store
            .remove_expired_sessions(&user_id, TimestampMs::new(1000))
            .expect("prune");

        let user = store
            .find_user_by_id(&user_id)
            .expect("lookup")
            .expect("user");
        let remaining: Vec<&str> = user.sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(remaining, vec!["s3"]);
    }

    #[test]
    fn duplicate_username_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = RedbStore::open(dir.path().join("matric.db")).expect("open");
        store.insert_user(make_user("u1", "alice")).expect("user");
        assert!(store.insert_user(make_user("u2", "alice")).is_err());
    }

    #[test]
    fn unpublished_profiles_hidden_from_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = RedbStore::open(dir.path().join("matric.db")).expect("open");
        let mut hidden = make_profile("p1", "u1");
        hidden.published = false;
        store.insert_profile(hidden).expect("profile");
        store
            .insert_profile(make_profile("p2", "u1"))
            .expect("profile");

        let listed = store.published_profiles().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].profile_id, ProfileId::new("p2"));
    }
}
