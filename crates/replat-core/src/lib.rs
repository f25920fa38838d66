pub mod appspec;
pub mod config;
pub mod detect;
pub mod error;
pub mod io;
pub mod mapping;
pub mod model;
pub mod normalize;
pub mod parse;
pub mod paths;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod source;
pub mod spec;
pub mod types;
pub mod validate;

pub use error::{ReplatError, Result};
