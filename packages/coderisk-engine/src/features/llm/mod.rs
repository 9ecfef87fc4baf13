//! LLM Provider Feature
//!
//! Provider port used by the Atomizer and the Phase-2 investigator.
//! Rate-limit failures are a distinct category so the risk engine can
//! degrade to Phase-1 output instead of failing the command.

pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::OpenAiCompatProvider;
