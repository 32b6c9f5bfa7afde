//! Tauri commands
//!
//! Grouped by concern:
//! - control: start/stop, task lock, reflections, exit
//! - config: configuration and log folder
//! - stats: statistics summary

pub mod config;
pub mod control;
pub mod stats;

pub use config::*;
pub use control::*;
pub use stats::*;
