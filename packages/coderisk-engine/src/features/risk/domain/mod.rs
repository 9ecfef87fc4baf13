pub mod models;
pub mod profiles;

pub use models::*;
pub use profiles::*;
