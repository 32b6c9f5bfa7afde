// Monitor module - the capture, classify, react cycle
//
// `MonitorController` owns the lifecycle. Per session it runs two workers:
// the capture loop and the reactor, linked by a depth-1 channel and stopped
// through one cancellation token.

pub mod policy;
mod reactor;
pub mod state;

pub use policy::{DebounceState, PraisePolicy, Reaction};
pub use reactor::{
    ALERT_MESSAGE, ALERT_TITLE, POPUP_MESSAGE, PRAISE_TITLE, REFLECTION_QUESTION, REFOCUS_MESSAGE,
    REFOCUS_TITLE,
};
pub use state::{MonitorState, Session};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::actors::StatsHandle;
use crate::capture::scheduler::{capture_loop, CaptureLoop};
use crate::capture::{Capturer, CommandCapture};
use crate::error::{MonitorError, MonitorResult};
use crate::event_bus::{AppEvent, EventBus};
use crate::llm::{Classifier, Verdict};
use crate::models::{AppConfig, ClassifierSettings, MonitorStatus, PersistedAppConfig, StartRequest};
use crate::notifier::Notifier;
use crate::settings::SettingsManager;
use crate::utils::{
    normalize_task, normalize_terms, validate_interval, validate_start_fields,
    MISSING_LOCK_TASK_MESSAGE,
};
use reactor::{reactor_loop, SessionRun};

pub const STATUS_IDLE: &str = "Status: Not monitoring";
pub const STATUS_STOPPING: &str = "Status: Stopping monitoring...";
pub const TASK_STATUS_UNLOCKED: &str = "Task Status: Unlocked";

/// Builds the capturer for a session from the configuration
pub type CapturerFactory =
    Arc<dyn Fn(&PersistedAppConfig) -> Result<Arc<dyn Capturer>> + Send + Sync>;

/// Builds the classifier for a session from the configuration
pub type ClassifierFactory =
    Arc<dyn Fn(&ClassifierSettings) -> Result<Arc<dyn Classifier>> + Send + Sync>;

/// How a stop request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// Nothing was running
    AlreadyIdle,
    /// Workers reached a safe point within the stop timeout
    Graceful,
    /// Workers were abandoned after the stop timeout
    Forced,
}

/// Collaborators of the controller
pub struct MonitorDeps {
    pub settings: Arc<SettingsManager>,
    pub stats: StatsHandle,
    pub notifier: Arc<dyn Notifier>,
    pub events: Arc<EventBus>,
    pub capturer_factory: CapturerFactory,
    pub classifier_factory: ClassifierFactory,
    /// Application data directory, receives `debug_images/`
    pub data_dir: PathBuf,
}

/// Capturer used outside tests
pub fn default_capturer_factory() -> CapturerFactory {
    Arc::new(|config: &PersistedAppConfig| {
        if config.capture_command.is_none() {
            if let Some(native) = native_capturer(config) {
                return Ok(native);
            }
        }
        let capture = CommandCapture::new(config.capture_command.clone(), config.max_image_width);
        Ok(Arc::new(capture) as Arc<dyn Capturer>)
    })
}

// macOS keeps `screencapture`, which leaves our own window out of the shot
#[cfg(all(feature = "desktop", not(target_os = "macos")))]
fn native_capturer(config: &PersistedAppConfig) -> Option<Arc<dyn Capturer>> {
    match crate::capture::ScreenCapture::new(config.max_image_width) {
        Ok(capture) => Some(Arc::new(capture)),
        Err(e) => {
            warn!("native capture unavailable, using screenshot tools: {:#}", e);
            None
        }
    }
}

#[cfg(not(all(feature = "desktop", not(target_os = "macos"))))]
fn native_capturer(_config: &PersistedAppConfig) -> Option<Arc<dyn Capturer>> {
    None
}

/// Classifier used outside tests
pub fn default_classifier_factory(client: reqwest::Client) -> ClassifierFactory {
    Arc::new(move |settings: &ClassifierSettings| crate::llm::create_classifier(client.clone(), settings))
}

struct Shared {
    state: MonitorState,
    session: Option<Session>,
    debounce: DebounceState,
    locked_task: Option<String>,
    last_verdict: Option<Verdict>,
    /// Validation text shown until the next transition
    message_override: Option<String>,
    task_message: String,
}

struct Workers {
    session_id: Uuid,
    cancel: CancellationToken,
    stop_timeout: Duration,
    capture: JoinHandle<()>,
    reactor: JoinHandle<()>,
}

struct Inner {
    shared: Mutex<Shared>,
    /// Lifecycle lock, start and stop never interleave
    workers: Mutex<Option<Workers>>,
    reflection_open: AtomicBool,
    /// Set by `shutdown`, cleared by the next `start`
    shut_down: AtomicBool,
    settings: Arc<SettingsManager>,
    stats: StatsHandle,
    notifier: Arc<dyn Notifier>,
    events: Arc<EventBus>,
    capturer_factory: CapturerFactory,
    classifier_factory: ClassifierFactory,
    data_dir: PathBuf,
}

/// Cycle controller
#[derive(Clone)]
pub struct MonitorController {
    inner: Arc<Inner>,
}

impl MonitorController {
    pub fn new(deps: MonitorDeps) -> Self {
        let shared = Shared {
            state: MonitorState::Idle,
            session: None,
            debounce: DebounceState::new(Local::now().naive_local()),
            locked_task: None,
            last_verdict: None,
            message_override: None,
            task_message: TASK_STATUS_UNLOCKED.to_string(),
        };

        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(shared),
                workers: Mutex::new(None),
                reflection_open: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
                settings: deps.settings,
                stats: deps.stats,
                notifier: deps.notifier,
                events: deps.events,
                capturer_factory: deps.capturer_factory,
                classifier_factory: deps.classifier_factory,
                data_dir: deps.data_dir,
            }),
        }
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.inner.events.clone()
    }

    pub fn settings(&self) -> Arc<SettingsManager> {
        self.inner.settings.clone()
    }

    /// Start a session
    ///
    /// Validation failures leave the controller `Idle` and set the inline
    /// status text.
    pub async fn start(&self, request: StartRequest) -> MonitorResult<MonitorStatus> {
        let mut workers = self.inner.workers.lock().await;

        let locked_task = {
            let shared = self.inner.shared.lock().await;
            if !shared.state.is_idle() || workers.is_some() {
                return Err(MonitorError::AlreadyRunning);
            }
            shared.locked_task.clone()
        };

        let config = self.inner.settings.get().await;
        let session = match self.build_session(&config, request, locked_task) {
            Ok(session) => session,
            Err(e) => {
                let mut shared = self.inner.shared.lock().await;
                shared.message_override = Some(e.to_string());
                self.publish_status(&shared);
                return Err(e);
            }
        };

        let collaborators = (self.inner.capturer_factory)(&config)
            .map_err(|e| MonitorError::Capture(format!("{:#}", e)))
            .and_then(|capturer| {
                (self.inner.classifier_factory)(&config.classifier)
                    .map(|classifier| (capturer, classifier))
                    .map_err(|e| MonitorError::Classification(format!("{:#}", e)))
            });
        let (capturer, classifier) = match collaborators {
            Ok(collaborators) => collaborators,
            Err(e) => {
                warn!("cannot start monitoring: {}", e);
                let mut shared = self.inner.shared.lock().await;
                shared.message_override = Some(format!("Status: {}", e));
                self.publish_status(&shared);
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let (sender, receiver) = mpsc::channel(1);
        let (pause_tx, pause_rx) = watch::channel(false);
        let run = SessionRun {
            session: session.clone(),
            cancel: cancel.clone(),
            pause: Arc::new(pause_tx),
        };

        {
            let mut shared = self.inner.shared.lock().await;
            shared.session = Some(session.clone());
            shared.state = MonitorState::Capturing;
            shared.message_override = None;
            self.publish_status(&shared);
        }
        self.inner.shut_down.store(false, Ordering::SeqCst);

        let capture = tokio::spawn(capture_loop(CaptureLoop {
            session_id: session.id,
            capturer,
            interval: session.interval_duration(),
            sender,
            cancel: cancel.clone(),
            paused: pause_rx,
            keep_latest: config
                .keep_latest_capture
                .then(|| crate::paths::debug_images_dir(&self.inner.data_dir)),
            events: self.inner.events.clone(),
        }));
        let reactor = tokio::spawn(reactor_loop(self.clone(), run, classifier, receiver));

        *workers = Some(Workers {
            session_id: session.id,
            cancel,
            stop_timeout: session.stop_timeout,
            capture,
            reactor,
        });
        drop(workers);

        info!(
            "monitoring started: session {}, interval {}s, task {:?}",
            session.id, session.interval, session.task_description
        );
        self.inner.events.publish(AppEvent::MonitorStarted {
            session_id: session.id,
            interval: session.interval,
            task: session.task_description.clone(),
        });

        Ok(self.status().await)
    }

    fn build_session(
        &self,
        config: &PersistedAppConfig,
        request: StartRequest,
        locked_task: Option<String>,
    ) -> MonitorResult<Session> {
        let interval = validate_interval(request.interval.unwrap_or(config.capture_interval))?;
        let task = locked_task.or_else(|| normalize_task(request.task_description.as_deref()));
        let possible_activities = normalize_terms(
            request
                .possible_activities
                .as_deref()
                .unwrap_or(&config.possible_activities),
        );
        let blacklisted_terms = normalize_terms(
            request
                .blacklisted_terms
                .as_deref()
                .unwrap_or(&config.blacklisted_words),
        );

        validate_start_fields(task.as_deref(), config.require_task, &possible_activities)?;

        Ok(Session {
            id: Uuid::new_v4(),
            interval,
            task_description: task,
            possible_activities,
            blacklisted_terms,
            started_at: Local::now(),
            praise: PraisePolicy {
                interval: Duration::from_secs(config.positive_reinforcement_interval),
                chance: config.positive_reinforcement_chance,
                after_hour: config.positive_reinforcement_after_hour,
            },
            classify_timeout: Duration::from_secs(config.classifier.timeout_secs),
            stop_timeout: Duration::from_millis(config.stop_timeout_ms),
            reflection_gates_capture: config.reflection_gates_capture,
        })
    }

    /// Stop the active session
    ///
    /// Waits up to the stop timeout for the workers, then abandons them.
    /// Calling it while `Idle` changes nothing.
    pub async fn stop(&self) -> MonitorResult<StopOutcome> {
        let mut guard = self.inner.workers.lock().await;
        let Some(workers) = guard.take() else {
            return Ok(StopOutcome::AlreadyIdle);
        };

        {
            let mut shared = self.inner.shared.lock().await;
            shared.state = MonitorState::Stopping;
            self.publish_status(&shared);
        }

        let Workers {
            session_id,
            cancel,
            stop_timeout,
            mut capture,
            mut reactor,
        } = workers;
        cancel.cancel();

        let joined = tokio::time::timeout(stop_timeout, async {
            let _ = (&mut capture).await;
            let _ = (&mut reactor).await;
        })
        .await;

        let forced = joined.is_err();
        if forced {
            warn!(
                "{}, abandoning workers of session {}",
                MonitorError::ShutdownTimeout(stop_timeout),
                session_id
            );
            capture.abort();
            reactor.abort();
        }

        {
            let mut shared = self.inner.shared.lock().await;
            shared.state = MonitorState::Idle;
            shared.session = None;
            shared.message_override = None;
            self.publish_status(&shared);
        }
        drop(guard);

        info!("monitoring stopped: session {} (forced: {})", session_id, forced);
        self.inner.events.publish(AppEvent::MonitorStopped {
            session_id,
            forced,
        });

        Ok(if forced {
            StopOutcome::Forced
        } else {
            StopOutcome::Graceful
        })
    }

    pub async fn status(&self) -> MonitorStatus {
        let shared = self.inner.shared.lock().await;
        Self::status_of(&shared)
    }

    fn status_of(shared: &Shared) -> MonitorStatus {
        MonitorStatus {
            state: shared.state,
            session_id: shared.session.as_ref().map(|s| s.id.to_string()),
            interval: shared.session.as_ref().map(|s| s.interval),
            message: Self::message_of(shared),
            locked_task: shared.locked_task.clone(),
            task_message: shared.task_message.clone(),
            started_at: shared.session.as_ref().map(|s| s.started_at),
            last_verdict: shared.last_verdict.clone(),
        }
    }

    fn message_of(shared: &Shared) -> String {
        if let Some(message) = &shared.message_override {
            return message.clone();
        }
        match (shared.state, &shared.session) {
            (MonitorState::Idle, _) | (_, None) => STATUS_IDLE.to_string(),
            (MonitorState::Stopping, _) => STATUS_STOPPING.to_string(),
            (_, Some(session)) => format!("Status: Monitoring (Interval: {}s)", session.interval),
        }
    }

    fn publish_status(&self, shared: &Shared) {
        self.inner.events.publish(AppEvent::StatusChanged {
            state: shared.state,
            message: Self::message_of(shared),
        });
    }

    /// Move between running phases, ignored once stopping or for an old session
    async fn set_phase(&self, session_id: Uuid, state: MonitorState) {
        let mut shared = self.inner.shared.lock().await;
        let current = shared.session.as_ref().map(|s| s.id) == Some(session_id);
        if current && shared.state.is_running() && shared.state != state {
            shared.state = state;
            self.publish_status(&shared);
        }
    }

    /// Lock the task text used by the next sessions
    pub async fn lock_task(&self, text: &str) -> MonitorResult<MonitorStatus> {
        let mut shared = self.inner.shared.lock().await;
        let Some(task) = normalize_task(Some(text)) else {
            shared.task_message = MISSING_LOCK_TASK_MESSAGE.to_string();
            return Err(MonitorError::validation(MISSING_LOCK_TASK_MESSAGE));
        };

        info!("task locked: {}", task);
        shared.task_message = format!("Task Status: Locked with task '{}'", task);
        shared.locked_task = Some(task);
        Ok(Self::status_of(&shared))
    }

    pub async fn unlock_task(&self) -> MonitorStatus {
        let mut shared = self.inner.shared.lock().await;
        shared.locked_task = None;
        shared.task_message = "Task Status: Unlocked. You can edit the task now.".to_string();
        Self::status_of(&shared)
    }

    pub async fn stats_summary(&self) -> String {
        self.inner.stats.summary().await
    }

    pub async fn config(&self) -> PersistedAppConfig {
        self.inner.settings.get().await
    }

    /// Persist a configuration change, effective from the next session
    pub async fn update_config(&self, update: AppConfig) -> Result<PersistedAppConfig> {
        let config = self.inner.settings.update(update).await?;
        info!("configuration updated");
        self.inner.events.publish(AppEvent::ConfigUpdated);
        Ok(config)
    }

    /// Stop the workers and flush statistics before exit
    ///
    /// Runs once; a repeated call (e.g. the exit command followed by the
    /// runtime exit event) returns `AlreadyIdle` without flushing again.
    pub async fn shutdown(&self) -> MonitorResult<StopOutcome> {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            debug!("already shut down");
            return Ok(StopOutcome::AlreadyIdle);
        }
        let outcome = self.stop().await?;
        self.inner.stats.flush().await?;
        info!("monitor shut down ({:?})", outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests;
