//! Risk assessment engine over a repository property graph.
//!
//! The engine turns staged Git and issue-tracker rows into a property
//! graph (Files, Developers, Commits, PRs, Issues) and evaluates the risk
//! of proposed changes against it in two phases: sub-second quantitative
//! metrics, then — when those escalate — a bounded LLM investigation over
//! a fixed tool set.
//!
//! ## Feature map
//!
//! - `features::identity` — canonical file paths across renames
//! - `features::graph` — graph store port + Cypher/in-memory backends
//! - `features::graph_builder` — staging rows → idempotent node/edge batches
//! - `features::linking` — multi-pass issue↔PR/commit correlation
//! - `features::atomizer` — optional per-commit LLM enrichment
//! - `features::llm` — provider port + OpenAI-compatible adapter
//! - `features::risk` — Tier-1 metrics, escalation, Phase-2 investigation
//! - `pipeline` — phase ordering, worker pools, resumability

pub mod config;
pub mod features;
pub mod pipeline;
pub mod shared;

pub use shared::models::{CoreError, ErrorKind, Result};
