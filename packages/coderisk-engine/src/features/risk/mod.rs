//! Risk Engine Feature
//!
//! Two-phase per-file evaluation.
//!
//! ## Phase 1 — quantitative
//! Structural coupling, temporal co-change, and incident history computed
//! from the graph in sub-second time, leveled by an adaptive threshold
//! profile, escalating on HIGH/CRITICAL.
//!
//! ## Phase 2 — bounded investigation
//! An LLM loop (≤ 5 hops, 60 s deadline) over four deterministic graph
//! tools, returning a final risk level plus the full evidence trace.
//! Rate limits and failures degrade to Phase-1 output; the command still
//! succeeds.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::*;
pub use domain::*;
pub use infrastructure::RiskToolbox;
