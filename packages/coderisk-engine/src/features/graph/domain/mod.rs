pub mod models;
pub mod ports;
pub mod query;

pub use models::*;
pub use ports::*;
pub use query::*;
