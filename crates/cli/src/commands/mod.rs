//! CLI command implementations

pub mod state;
pub mod status;
