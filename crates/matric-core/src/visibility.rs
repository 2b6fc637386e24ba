//! # Visibility Engine
//!
//! Classifies a viewer into an access tier for a profile and produces
//! the appropriately redacted view.
//!
//! The engine is stateless and side-effect-free: both the tiered view
//! transform and the preview projection are pure functions of their
//! input snapshots. They never write back to stored data, so arbitrarily
//! many invocations may run concurrently without coordination.

use crate::primitives::ESSAY_PREVIEW_CHARS;
use crate::types::{Profile, ProfileId, User};
use serde::{Deserialize, Serialize};

// =============================================================================
// ACCESS TIERS
// =============================================================================

/// A viewer's classified access level to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTier {
    /// The viewer created the profile.
    Owner,
    /// The viewer purchased access to the profile.
    Unlocked,
    /// Neither condition holds; also the tier for anonymous viewers.
    Locked,
}

// =============================================================================
// DERIVED VIEWS
// =============================================================================

/// A profile as returned to a specific viewer, with access flags.
///
/// For Owner and Unlocked viewers the embedded profile is unchanged; for
/// Locked viewers essay bodies are truncated and scores blanked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    /// The (possibly redacted) profile content.
    #[serde(flatten)]
    pub profile: Profile,
    /// True iff the viewer created this profile.
    pub is_owned: bool,
    /// True for Owner and Unlocked tiers alike.
    pub is_unlocked: bool,
    /// True iff the viewer bookmarked this profile.
    pub is_saved: bool,
}

/// Coarse, tier-independent projection for catalog and bulk listings.
///
/// Carries identity and display fields only; essay content and scores
/// are stripped entirely, regardless of viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePreview {
    /// Unique profile identifier.
    pub profile_id: ProfileId,
    /// Display name shown in listings.
    pub display_name: String,
    /// Thumbnail URL shown in listings.
    pub thumbnail_url: String,
    /// Price to unlock.
    pub price: u64,
    /// Number of times the profile has been purchased.
    pub purchase_count: u64,
    /// School names only, without essays.
    pub schools: Vec<String>,
}

// =============================================================================
// ENGINE
// =============================================================================

/// Pure classification and redaction over profile/viewer snapshots.
pub struct VisibilityEngine;

impl VisibilityEngine {
    /// Classify the viewer's tier for a profile, in priority order:
    /// Owner, then Unlocked, then Locked. No viewer means Locked.
    #[must_use]
    pub fn classify(profile_id: &ProfileId, viewer: Option<&User>) -> AccessTier {
        match viewer {
            Some(user) if user.owns(profile_id) => AccessTier::Owner,
            Some(user) if user.has_unlocked(profile_id) => AccessTier::Unlocked,
            _ => AccessTier::Locked,
        }
    }

    /// Produce the viewer's tiered view of a profile.
    #[must_use]
    pub fn view(profile: &Profile, viewer: Option<&User>) -> ProfileView {
        let tier = Self::classify(&profile.profile_id, viewer);
        let is_saved = viewer.is_some_and(|user| user.has_saved(&profile.profile_id));

        match tier {
            AccessTier::Owner => ProfileView {
                profile: profile.clone(),
                is_owned: true,
                is_unlocked: true,
                is_saved,
            },
            AccessTier::Unlocked => ProfileView {
                profile: profile.clone(),
                is_owned: false,
                is_unlocked: true,
                is_saved,
            },
            AccessTier::Locked => ProfileView {
                profile: Self::redact(profile),
                is_owned: false,
                is_unlocked: false,
                is_saved,
            },
        }
    }

    /// Produce the coarse listing projection of a profile.
    #[must_use]
    pub fn preview(profile: &Profile) -> ProfilePreview {
        ProfilePreview {
            profile_id: profile.profile_id.clone(),
            display_name: profile.display_name.clone(),
            thumbnail_url: profile.thumbnail_url.clone(),
            price: profile.price,
            purchase_count: profile.purchase_count,
            schools: profile
                .school_admissions
                .iter()
                .map(|admission| admission.school.clone())
                .collect(),
        }
    }

    /// Reduce field fidelity for locked viewers: essay bodies keep only
    /// their leading characters, scores are blanked. Titles, test names,
    /// admission outcomes and display metadata pass through unchanged.
    fn redact(profile: &Profile) -> Profile {
        let mut redacted = profile.clone();
        for admission in &mut redacted.school_admissions {
            for essay in &mut admission.essays {
                essay.content = truncate_chars(&essay.content, ESSAY_PREVIEW_CHARS);
            }
        }
        for test_score in &mut redacted.test_scores {
            test_score.score = String::new();
        }
        redacted
    }
}

/// First `max` characters of `s`, or all of it when shorter.
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// =============================================================================
// TESTS
// =============================================================================
