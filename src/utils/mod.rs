//! Utility functions
//!
//! - input validation for start/lock commands
//! - crash-safe file writes

pub mod file_system;
pub mod validation;

pub use file_system::*;
pub use validation::*;
