//! Property Graph Feature
//!
//! Store port plus two backends sharing one interface.
//!
//! ## Features
//! - **Idempotent mutation**: MERGE semantics on composite node IDs
//! - **Fixed read set**: parameter-bound queries evaluated natively per
//!   backend, keeping everything above the port store-agnostic
//! - **Backends**: Cypher HTTP transactional endpoint (Neo4j/Memgraph
//!   flavors) and an in-memory store for tests

pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::{CypherHttpStore, MemoryGraphStore};
