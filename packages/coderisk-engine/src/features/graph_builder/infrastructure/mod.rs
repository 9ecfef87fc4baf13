pub mod converters;

pub use converters::*;
