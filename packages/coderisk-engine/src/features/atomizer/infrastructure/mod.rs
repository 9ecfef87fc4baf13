pub mod prompt;

pub use prompt::{build_atomize_request, parse_atomized};
