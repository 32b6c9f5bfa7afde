// Controller state machine and the per-run session snapshot

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::policy::PraisePolicy;
use crate::llm::ClassificationContext;

/// Controller state
///
/// `Idle -> Capturing -> Classifying -> Reacting -> Capturing ...`, and any
/// running state `-> Stopping -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Capturing,
    Classifying,
    Reacting,
    Stopping,
}

impl MonitorState {
    /// A session exists and has not been asked to stop
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            MonitorState::Capturing | MonitorState::Classifying | MonitorState::Reacting
        )
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, MonitorState::Idle)
    }
}

/// One monitoring run
///
/// Built from the configuration at start and never changed afterwards.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    /// Seconds between captures, within [5, 3600]
    pub interval: u64,
    pub task_description: Option<String>,
    pub possible_activities: Vec<String>,
    pub blacklisted_terms: Vec<String>,
    pub started_at: DateTime<Local>,
    pub praise: PraisePolicy,
    pub classify_timeout: Duration,
    pub stop_timeout: Duration,
    pub reflection_gates_capture: bool,
}

impl Session {
    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn context(&self) -> ClassificationContext {
        ClassificationContext {
            possible_activities: self.possible_activities.clone(),
            task: self.task_description.clone(),
        }
    }
}
