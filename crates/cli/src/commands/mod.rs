//! CLI command implementations

pub mod forecast;
pub mod history;
pub mod training;
