//! Issue↔PR/Commit Linking Feature
//!
//! Multi-pass correlation producing the links the 100%-confidence
//! timeline path misses.
//!
//! ## Passes
//! 1. **Explicit references**: `fixes #N` patterns in PR bodies and
//!    commit messages
//! 2. **Temporal correlation**: merges/commits within 24 h of issue close
//! 3. **Bidirectional merge**: independent methods agreeing on one tuple
//! 4. **Ground-truth classification**: FIXED_BY vs ASSOCIATED_WITH

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::*;
pub use domain::*;
