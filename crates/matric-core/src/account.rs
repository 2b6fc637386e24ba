//! # Account Operations
//!
//! Signup, login, request authentication and logout flows over a
//! [`UserStore`], with argon2 PHC-string credential hashing.
//!
//! A failed password check reports NotFound with the same message as an
//! unknown username, so login responses do not reveal which usernames
//! exist. Missing or expired sessions report Authentication instead;
//! the process boundary keeps the two rejections distinct.

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use crate::primitives::{
    AVATAR_VARIANTS, MAX_FIELD_LENGTH, MAX_PASSWORD_CHARS, MAX_USERNAME_CHARS, MIN_PASSWORD_CHARS,
    MIN_USERNAME_CHARS,
};
use crate::session::SessionManager;
use crate::store::UserStore;
use crate::types::{MatricError, SessionId, TimestampMs, User, UserId};

/// Placeholder avatar service; the variant index is derived from the
/// user id so the assignment is stable.
const AVATAR_URL_PREFIX: &str = "https://i.pravatar.cc/150?img=";

/// Create a new user and issue their first session.
///
/// Validates the signup bounds, rejects duplicate usernames, hashes the
/// password and inserts the account before issuing.
pub fn signup<S: UserStore>(
    store: &mut S,
    sessions: &SessionManager,
    username: &str,
    password: &str,
    email: &str,
    now: TimestampMs,
) -> Result<SessionId, MatricError> {
    let username_chars = username.chars().count();
    if !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&username_chars) {
        return Err(MatricError::Validation(format!(
            "username must be between {MIN_USERNAME_CHARS} - {MAX_USERNAME_CHARS} characters long"
        )));
    }
    let password_chars = password.chars().count();
    if !(MIN_PASSWORD_CHARS..=MAX_PASSWORD_CHARS).contains(&password_chars) {
        return Err(MatricError::Validation(format!(
            "password must be between {MIN_PASSWORD_CHARS} - {MAX_PASSWORD_CHARS} characters long"
        )));
    }
    if email.is_empty() || email.len() > MAX_FIELD_LENGTH {
        return Err(MatricError::Validation(
            "email must be non-empty and at most 256 bytes".to_string(),
        ));
    }
    if store.find_user_by_username(username)?.is_some() {
        return Err(MatricError::Validation("user already exists".to_string()));
    }

    let user_id = UserId::generate();
    let user = User {
        thumbnail_url: placeholder_avatar(&user_id),
        user_id: user_id.clone(),
        username: username.to_string(),
        password_hash: hash_password(password)?,
        email: email.to_string(),
        sessions: vec![],
        created_profile_ids: BTreeSet::new(),
        saved_profile_ids: BTreeSet::new(),
        unlocked_profile_ids: BTreeSet::new(),
    };
    store.insert_user(user)?;

    let session = sessions.issue(store, &user_id, now)?;
    Ok(session.session_id)
}

/// Log in an existing user, prune their expired sessions and issue a
/// fresh one.
pub fn login<S: UserStore>(
    store: &mut S,
    sessions: &SessionManager,
    username: &str,
    password: &str,
    now: TimestampMs,
) -> Result<SessionId, MatricError> {
    let Some(user) = store.find_user_by_username(username)? else {
        return Err(MatricError::NotFound("user not found".to_string()));
    };
    if !verify_password(password, &user.password_hash) {
        return Err(MatricError::NotFound("user not found".to_string()));
    }

    // Pruning here bounds session-list growth over an account's lifetime.
    sessions.prune_expired(store, &user.user_id, now)?;
    let session = sessions.issue(store, &user.user_id, now)?;
    Ok(session.session_id)
}

/// Resolve a request's bearer session to its user, refreshing the
/// session as a side effect. Any miss maps to Authentication.
pub fn authenticate<S: UserStore>(
    store: &mut S,
    sessions: &SessionManager,
    session_id: &SessionId,
    now: TimestampMs,
) -> Result<User, MatricError> {
    if !sessions.validate(store, session_id, now)? {
        return Err(MatricError::Authentication(
            "invalid session id".to_string(),
        ));
    }
    let user = sessions.resolve(store, session_id, now)?;
    sessions.refresh(store, session_id, now)?;
    Ok(user)
}

/// Revoke the given session for the user. No-op if already gone.
pub fn logout<S: UserStore>(
    store: &mut S,
    sessions: &SessionManager,
    user_id: &UserId,
    session_id: &SessionId,
) -> Result<(), MatricError> {
    sessions.revoke(store, user_id, session_id)
}

// =============================================================================
// CREDENTIAL HASHING
// =============================================================================

fn hash_password(password: &str) -> Result<String, MatricError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| MatricError::Internal(format!("salt generation failed: {e}")))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| MatricError::Internal(format!("salt encoding failed: {e}")))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| MatricError::Internal(format!("password hashing failed: {e}")))?
        .to_string();
    Ok(phc)
}

fn verify_password(password: &str, stored: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(stored) {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    } else {
        false
    }
}

/// Stable placeholder avatar variant in 1..=AVATAR_VARIANTS.
fn placeholder_avatar(user_id: &UserId) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    user_id.as_str().hash(&mut hasher);
    let variant = hasher.finish() % AVATAR_VARIANTS + 1;
    format!("{AVATAR_URL_PREFIX}{variant}")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn signup_creates_user_with_live_session() {
        let mut store = MemoryStore::new();
        let sessions = SessionManager::new();
        let now = TimestampMs::new(1_000);

        let session_id = signup(
            &mut store,
            &sessions,
            "alice",
            "hunter22",
            "alice@example.com",
            now,
        )
        .expect("signup");

        let user = authenticate(&mut store, &sessions, &session_id, now).expect("authenticate");
        assert_eq!(user.username, "alice");
        assert!(user.thumbnail_url.starts_with(AVATAR_URL_PREFIX));
        assert!(user.created_profile_ids.is_empty());
    }

    #[test]
    fn signup_rejects_out_of_bounds_credentials() {
        let mut store = MemoryStore::new();
        let sessions = SessionManager::new();
        let now = TimestampMs::new(0);

        let err = signup(&mut store, &sessions, "abc", "hunter22", "a@b.c", now)
            .expect_err("short username");
        assert!(matches!(err, MatricError::Validation(_)));

        let err = signup(&mut store, &sessions, "alice", "short", "a@b.c", now)
            .expect_err("short password");
        assert!(matches!(err, MatricError::Validation(_)));

        let err =
            signup(&mut store, &sessions, "alice", "hunter22", "", now).expect_err("empty email");
        assert!(matches!(err, MatricError::Validation(_)));
    }

    #[test]
    fn signup_rejects_duplicate_usernames() {
        let mut store = MemoryStore::new();
        let sessions = SessionManager::new();
        let now = TimestampMs::new(0);

        signup(&mut store, &sessions, "alice", "hunter22", "a@b.c", now).expect("first signup");
        let err = signup(&mut store, &sessions, "alice", "other-pass", "c@d.e", now)
            .expect_err("duplicate");
        assert!(matches!(err, MatricError::Validation(_)));
    }

    #[test]
    fn login_round_trip_and_wrong_password() {
        let mut store = MemoryStore::new();
        let sessions = SessionManager::new();
        let now = TimestampMs::new(0);

        signup(&mut store, &sessions, "alice", "hunter22", "a@b.c", now).expect("signup");

        let session_id =
            login(&mut store, &sessions, "alice", "hunter22", now).expect("login");
        assert!(
            sessions
                .validate(&store, &session_id, now)
                .expect("validate")
        );

        // Wrong password and unknown username are indistinguishable.
        let wrong = login(&mut store, &sessions, "alice", "wrong-pass", now)
            .expect_err("wrong password");
        let unknown =
            login(&mut store, &sessions, "nobody", "hunter22", now).expect_err("unknown user");
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, MatricError::NotFound(_)));
    }

    #[test]
    fn login_prunes_expired_sessions() {
        let mut store = MemoryStore::new();
        let sessions = SessionManager::with_ttl_ms(1_000);

        signup(
            &mut store,
            &sessions,
            "alice",
            "hunter22",
            "a@b.c",
            TimestampMs::new(0),
        )
        .expect("signup");

        // The signup session expires at 1000; logging in later replaces it.
        let later = TimestampMs::new(10_000);
        let session_id = login(&mut store, &sessions, "alice", "hunter22", later).expect("login");

        let user = store
            .find_user_by_username("alice")
            .expect("lookup")
            .expect("user");
        assert_eq!(user.sessions.len(), 1);
        assert_eq!(user.sessions[0].session_id, session_id);
    }

    #[test]
    fn authenticate_refreshes_the_session() {
        let mut store = MemoryStore::new();
        let sessions = SessionManager::with_ttl_ms(1_000);

        let session_id = signup(
            &mut store,
            &sessions,
            "alice",
            "hunter22",
            "a@b.c",
            TimestampMs::new(0),
        )
        .expect("signup");

        // Authenticate at t=900: expiry moves to 1900.
        authenticate(&mut store, &sessions, &session_id, TimestampMs::new(900))
            .expect("authenticate");
        assert!(
            sessions
                .validate(&store, &session_id, TimestampMs::new(1_500))
                .expect("validate")
        );
    }

    #[test]
    fn authenticate_rejects_expired_session() {
        let mut store = MemoryStore::new();
        let sessions = SessionManager::with_ttl_ms(1_000);

        let session_id = signup(
            &mut store,
            &sessions,
            "alice",
            "hunter22",
            "a@b.c",
            TimestampMs::new(0),
        )
        .expect("signup");

        let err = authenticate(&mut store, &sessions, &session_id, TimestampMs::new(2_000))
            .expect_err("expired");
        assert!(matches!(err, MatricError::Authentication(_)));
    }

    #[test]
    fn logout_revokes_the_session() {
        let mut store = MemoryStore::new();
        let sessions = SessionManager::new();
        let now = TimestampMs::new(0);

        let session_id =
            signup(&mut store, &sessions, "alice", "hunter22", "a@b.c", now).expect("signup");
        let user = authenticate(&mut store, &sessions, &session_id, now).expect("authenticate");

        logout(&mut store, &sessions, &user.user_id, &session_id).expect("logout");
        let err =
            authenticate(&mut store, &sessions, &session_id, now).expect_err("revoked session");
        assert!(matches!(err, MatricError::Authentication(_)));
    }

    #[test]
    fn password_hashing_round_trip() {
        let phc = hash_password("hunter22").expect("hash");
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password("hunter22", &phc));
        assert!(!verify_password("hunter23", &phc));
        assert!(!verify_password("hunter22", "not-a-phc-string"));
    }

    #[test]
    fn avatar_assignment_is_stable() {
        let user_id = UserId::new("u1");
        assert_eq!(placeholder_avatar(&user_id), placeholder_avatar(&user_id));
    }
}
