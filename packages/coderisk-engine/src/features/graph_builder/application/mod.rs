pub mod builder;

pub use builder::{BuilderConfig, GraphBuilder};
