pub mod atomizer;

pub use atomizer::Atomizer;
