//! Default paths for the monitor
//!
//! - Data: `$DISTRACTION_MONITOR_DATA_DIR`, else the platform data dir
//!   (`~/.local/share/distraction-monitor` on Linux)
//! - Logs: `<data dir>/logs`

use std::path::{Path, PathBuf};

/// Environment variable for overriding the data directory
pub const DATA_DIR_ENV: &str = "DISTRACTION_MONITOR_DATA_DIR";

/// Application subdirectory name
const APP_DIR: &str = "distraction-monitor";

/// Configuration document
pub const CONFIG_FILE: &str = "config.json";

/// Statistics document
pub const STATS_FILE: &str = "stats.json";

/// Get the default data directory.
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(format!(".{APP_DIR}")))
}

/// Log directory inside a data directory
pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// Debug capture directory inside a data directory
pub fn debug_images_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("debug_images")
}
