// Event bus - decoupled communication between the controller and front-ends
//
// Publish/subscribe over tokio::sync::broadcast. The desktop shell forwards
// every event to the webview, tests subscribe to observe the controller.

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::llm::Verdict;
use crate::models::MonitorState;

/// Application events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    // --- lifecycle ---

    MonitorStarted {
        session_id: Uuid,
        interval: u64,
        task: Option<String>,
    },

    MonitorStopped {
        session_id: Uuid,
        /// Workers had to be abandoned after the stop timeout
        forced: bool,
    },

    /// State machine transition with the inline status text
    StatusChanged {
        state: MonitorState,
        message: String,
    },

    // --- cycle ---

    SnapshotCaptured {
        session_id: Uuid,
        snapshot_id: Uuid,
        captured_at: DateTime<Local>,
    },

    VerdictApplied {
        session_id: Uuid,
        verdict: Verdict,
    },

    /// A verdict arrived for a session that is no longer active
    VerdictDiscarded {
        session_id: Uuid,
        label: String,
    },

    // --- reactions ---

    DistractionAlert {
        title: String,
        message: String,
    },

    PositiveReinforcement {
        message: String,
    },

    ReflectionRecorded {
        text: String,
    },

    // --- system ---

    StatsUpdated {
        summary: String,
    },

    ConfigUpdated,
}

impl AppEvent {
    /// Event name used when forwarding to the webview
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::MonitorStarted { .. } => "monitor-started",
            AppEvent::MonitorStopped { .. } => "monitor-stopped",
            AppEvent::StatusChanged { .. } => "status-changed",
            AppEvent::SnapshotCaptured { .. } => "snapshot-captured",
            AppEvent::VerdictApplied { .. } => "verdict-applied",
            AppEvent::VerdictDiscarded { .. } => "verdict-discarded",
            AppEvent::DistractionAlert { .. } => "distraction-alert",
            AppEvent::PositiveReinforcement { .. } => "positive-reinforcement",
            AppEvent::ReflectionRecorded { .. } => "reflection-recorded",
            AppEvent::StatsUpdated { .. } => "stats-updated",
            AppEvent::ConfigUpdated => "config-updated",
        }
    }
}

/// Event bus
///
/// Events published while nobody is subscribed are dropped.
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: AppEvent) {
        match self.sender.send(event) {
            Ok(receiver_count) => {
                tracing::trace!("event published to {} subscribers", receiver_count);
            }
            Err(_) => {
                tracing::trace!("event published without subscribers");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
