pub mod analyze;
pub mod detect;
pub mod migrate;
pub mod rules;
