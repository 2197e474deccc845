//! CLI command implementations.

pub mod assign;
pub mod backends;
pub mod common;
pub mod run;
pub mod version;
