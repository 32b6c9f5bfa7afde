//! Input validation for start/lock commands
//!
//! Messages are shown verbatim as inline status text.

use crate::error::{MonitorError, MonitorResult};
use crate::models::{MAX_CAPTURE_INTERVAL, MIN_CAPTURE_INTERVAL};

/// Status text when start is attempted without a task
pub const MISSING_TASK_MESSAGE: &str = "Status: Please enter a task before starting.";

/// Status text when locking an empty task
pub const MISSING_LOCK_TASK_MESSAGE: &str = "Task Status: Please enter a task before locking.";

/// Status text when no activity labels are configured
pub const MISSING_ACTIVITIES_MESSAGE: &str =
    "Status: Please enter at least one possible activity before starting.";

/// Validate a capture interval
pub fn validate_interval(interval: u64) -> MonitorResult<u64> {
    if !(MIN_CAPTURE_INTERVAL..=MAX_CAPTURE_INTERVAL).contains(&interval) {
        return Err(MonitorError::validation(format!(
            "Status: Capture interval must be between {} and {} seconds.",
            MIN_CAPTURE_INTERVAL, MAX_CAPTURE_INTERVAL
        )));
    }
    Ok(interval)
}

/// Trim a task text, `None` when blank
pub fn normalize_task(task: Option<&str>) -> Option<String> {
    task.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Trim list entries and drop blanks, keeping order and removing duplicates
pub fn normalize_terms(terms: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        let term = term.trim();
        if term.is_empty() || out.iter().any(|t| t == term) {
            continue;
        }
        out.push(term.to_string());
    }
    out
}

/// Check the text fields required to start a session
pub fn validate_start_fields(
    task: Option<&str>,
    require_task: bool,
    activities: &[String],
) -> MonitorResult<()> {
    if require_task && task.is_none() {
        return Err(MonitorError::validation(MISSING_TASK_MESSAGE));
    }
    if activities.is_empty() {
        return Err(MonitorError::validation(MISSING_ACTIVITIES_MESSAGE));
    }
    Ok(())
}
