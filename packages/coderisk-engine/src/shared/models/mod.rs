pub mod error;
pub mod ids;

pub use error::{CoreError, ErrorKind, Result};
pub use ids::composite_id;
