//! # Catalog Operations
//!
//! Profile creation, tiered retrieval, preview listings and the
//! unlock/save membership updates.
//!
//! Creation keeps the reciprocal-ownership invariant: the profile's
//! `owner_user_id` and the owner's `created_profile_ids` membership are
//! written by the same operation, and the owner never changes afterward.

use crate::primitives::{MAX_ESSAY_CONTENT_LENGTH, MAX_FIELD_LENGTH, MAX_LIST_ENTRIES};
use crate::store::{ProfileStore, UserStore};
use crate::types::{
    MatricError, Profile, ProfileId, SchoolAdmission, TestScore, TimestampMs, User, UserId,
};
use crate::visibility::{ProfilePreview, ProfileView, VisibilityEngine};

/// Caller-supplied content for a new profile. Identity, display and
/// bookkeeping fields are filled in by [`create_profile`].
#[derive(Debug, Clone)]
pub struct ProfileDraft {
    /// Price to unlock, in minor currency units.
    pub price: u64,
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

impl ProfileDraft {
    /// Check field and list bounds before the draft reaches the store.
    fn validate(&self) -> Result<(), MatricError> {
        check_field("currentSchool", &self.current_school)?;
        check_field("currentMajor", &self.current_major)?;
        if self.current_description.len() > MAX_ESSAY_CONTENT_LENGTH {
            return Err(MatricError::Validation(
                "currentDescription is too long".to_string(),
            ));
        }
        if self.school_admissions.len() > MAX_LIST_ENTRIES
            || self.test_scores.len() > MAX_LIST_ENTRIES
        {
            return Err(MatricError::Validation(format!(
                "at most {MAX_LIST_ENTRIES} admissions and test scores are allowed"
            )));
        }
        for admission in &self.school_admissions {
            check_field("school", &admission.school)?;
            check_field("degree", &admission.degree)?;
            check_field("major", &admission.major)?;
            if admission.essays.len() > MAX_LIST_ENTRIES {
                return Err(MatricError::Validation(format!(
                    "at most {MAX_LIST_ENTRIES} essays are allowed per admission"
                )));
            }
            for essay in &admission.essays {
                check_field("essay title", &essay.title)?;
                if essay.content.len() > MAX_ESSAY_CONTENT_LENGTH {
                    return Err(MatricError::Validation(format!(
                        "essay content exceeds {MAX_ESSAY_CONTENT_LENGTH} bytes"
                    )));
                }
            }
        }
        for test_score in &self.test_scores {
            check_field("test", &test_score.test)?;
            check_field("score", &test_score.score)?;
        }
        Ok(())
    }
}

fn check_field(name: &str, value: &str) -> Result<(), MatricError> {
    if value.is_empty() {
        return Err(MatricError::Validation(format!("{name} must be non-empty")));
    }
    if value.len() > MAX_FIELD_LENGTH {
        return Err(MatricError::Validation(format!(
            "{name} exceeds {MAX_FIELD_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Create a profile owned by `owner` and record it in the owner's
/// created set. The profile is published immediately.
pub fn create_profile<S: ProfileStore + UserStore>(
    store: &mut S,
    owner: &User,
    draft: ProfileDraft,
    now: TimestampMs,
) -> Result<ProfileId, MatricError> {
    draft.validate()?;

    let profile_id = ProfileId::generate();
    let profile = Profile {
        profile_id: profile_id.clone(),
        owner_user_id: owner.user_id.clone(),
        display_name: owner.username.clone(),
        thumbnail_url: owner.thumbnail_url.clone(),
        date_created: now,
        price: draft.price,
        purchase_count: 0,
        published: true,
        current_school: draft.current_school,
        current_major: draft.current_major,
        current_description: draft.current_description,
        school_admissions: draft.school_admissions,
        test_scores: draft.test_scores,
    };
    store.insert_profile(profile)?;
    store.add_created_profile(&owner.user_id, &profile_id)?;
    Ok(profile_id)
}

/// Fetch a profile and produce the viewer's tiered view of it.
pub fn profile_view<S: ProfileStore>(
    store: &S,
    profile_id: &ProfileId,
    viewer: Option<&User>,
) -> Result<ProfileView, MatricError> {
    let Some(profile) = store.find_profile_by_id(profile_id)? else {
        return Err(MatricError::NotFound("profile not found".to_string()));
    };
    Ok(VisibilityEngine::view(&profile, viewer))
}

/// Previews of every published profile, for the anonymous catalog.
pub fn published_previews<S: ProfileStore>(
    store: &S,
) -> Result<Vec<ProfilePreview>, MatricError> {
    let profiles = store.published_profiles()?;
    Ok(profiles.iter().map(VisibilityEngine::preview).collect())
}

/// Previews of the viewer's unlocked profiles.
pub fn unlocked_previews<S: ProfileStore>(
    store: &S,
    viewer: &User,
) -> Result<Vec<ProfilePreview>, MatricError> {
    let profiles = store.profiles_by_ids(&viewer.unlocked_profile_ids)?;
    Ok(profiles.iter().map(VisibilityEngine::preview).collect())
}

/// Previews of the viewer's saved profiles.
pub fn saved_previews<S: ProfileStore>(
    store: &S,
    viewer: &User,
) -> Result<Vec<ProfilePreview>, MatricError> {
    let profiles = store.profiles_by_ids(&viewer.saved_profile_ids)?;
    Ok(profiles.iter().map(VisibilityEngine::preview).collect())
}

/// Add a profile to the user's unlocked set. Fails with NotFound when
/// the profile does not exist; idempotent when already unlocked.
pub fn unlock_profile<S: ProfileStore + UserStore>(
    store: &mut S,
    user_id: &UserId,
    profile_id: &ProfileId,
) -> Result<(), MatricError> {
    if store.find_profile_by_id(profile_id)?.is_none() {
        return Err(MatricError::NotFound("profile not found".to_string()));
    }
    store.add_unlocked_profile(user_id, profile_id)
}

/// Add a profile to the user's saved set. Fails with NotFound when the
/// profile does not exist; idempotent when already saved.
pub fn save_profile<S: ProfileStore + UserStore>(
    store: &mut S,
    user_id: &UserId,
    profile_id: &ProfileId,
) -> Result<(), MatricError> {
    if store.find_profile_by_id(profile_id)?.is_none() {
        return Err(MatricError::NotFound("profile not found".to_string()));
    }
    store.add_saved_profile(user_id, profile_id)
}

// =============================================================================
// TESTS
// =============================================================================
