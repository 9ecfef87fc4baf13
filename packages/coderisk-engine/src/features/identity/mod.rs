//! File Identity Feature
//!
//! Tracks canonical paths of files across renames and moves.
//!
//! ## Features
//! - **Exact resolution**: identity-map lookup by canonical or historical path
//! - **Rename-chain walk**: git rename detection for cold-start cases
//! - **Batch resolution**: bounded parallel resolution with an
//!   invocation-scoped cache
//!
//! ## Note
//! The rename walk requires the git command-line tool.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::*;
pub use domain::*;
