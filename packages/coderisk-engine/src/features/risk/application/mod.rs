pub mod engine;
pub mod investigator;
pub mod metrics;

pub use engine::{CheckOptions, RiskEngine};
pub use investigator::{InvestigationContext, Investigator, MAX_HOPS};
pub use metrics::MetricsEngine;
