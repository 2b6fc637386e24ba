//! # matric-core
//!
//! The marketplace core for Matric - THE LOGIC.
//!
//! Users create admission-record profiles (per-school applications with
//! essays and test scores) that other users may unlock. Two components
//! carry the design weight:
//!
//! - [`SessionManager`] issues, validates, refreshes, revokes and prunes
//!   authentication sessions for a user.
//! - [`VisibilityEngine`] classifies a (viewer, profile) pair into an
//!   access tier and produces the appropriately redacted view.
//!
//! The session manager depends only on the [`UserStore`] seam; the
//! visibility engine depends only on resolved user/profile snapshots and
//! never on session mechanics.
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust); the app layer owns
//!   the runtime
//! - Every mutating storage call is a single atomic step, so concurrent
//!   requests need no in-process locking beyond the store's guarantee
//! - Reads are pure: redaction derives views, it never mutates documents

// =============================================================================
// MODULES
// =============================================================================

pub mod account;
pub mod catalog;
pub mod marketplace;
pub mod primitives;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;
pub mod visibility;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AdmissionStatus, Essay, MatricError, Profile, ProfileId, SchoolAdmission, Session, SessionId,
    TestScore, TimestampMs, User, UserId,
};

// =============================================================================
// RE-EXPORTS: Components
// =============================================================================

pub use catalog::ProfileDraft;
pub use marketplace::{Marketplace, StorageBackend};
pub use session::SessionManager;
pub use storage::{MemoryStore, RedbStore};
pub use store::{ProfileStore, UserStore};
pub use visibility::{AccessTier, ProfilePreview, ProfileView, VisibilityEngine};
