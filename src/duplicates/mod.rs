//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Path matching across volumes ([`PathMatcher`])
//! - Fingerprint grouping of candidate sets ([`group_candidates`])
//! - Survivor selection by free space ([`RetentionSelector`])

pub mod groups;
pub mod matcher;
pub mod retention;

pub use groups::{group_candidates, CandidateSet, DuplicateGroup, GroupingOutcome};
pub use matcher::PathMatcher;
pub use retention::{RetentionDecision, RetentionSelector, SpaceReading};
