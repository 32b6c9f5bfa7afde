// Actors - state owned by a single task, driven by messages

pub mod stats;

pub use stats::{StatsActor, StatsCommand, StatsHandle};
