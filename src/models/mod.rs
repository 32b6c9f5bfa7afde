// Data models - configuration documents and the DTOs shared with the front-ends

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub use crate::monitor::state::MonitorState;

/// Lower bound of the capture interval (seconds)
pub const MIN_CAPTURE_INTERVAL: u64 = 5;
/// Upper bound of the capture interval (seconds)
pub const MAX_CAPTURE_INTERVAL: u64 = 3600;

/// Partial configuration update, every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Capture interval (seconds)
    pub capture_interval: Option<u64>,
    /// Labels offered to the classifier
    pub possible_activities: Option<Vec<String>>,
    /// Substrings that mark a label as distracting
    pub blacklisted_words: Option<Vec<String>>,
    /// Sound played by the front-end with a distraction alert
    pub notification_sound: Option<String>,
    /// Minimum quiet period before praise (seconds)
    pub positive_reinforcement_interval: Option<u64>,
    /// Probability that an eligible check produces praise
    pub positive_reinforcement_chance: Option<f64>,
    /// Local hour from which praise may fire
    pub positive_reinforcement_after_hour: Option<u32>,
    /// Reject start when the task text is empty
    pub require_task: Option<bool>,
    /// Hold the next capture while a reflection prompt is open
    pub reflection_gates_capture: Option<bool>,
    /// Bounded wait for workers on stop (milliseconds)
    pub stop_timeout_ms: Option<u64>,
    /// Keep the latest snapshot on disk for debugging
    pub keep_latest_capture: Option<bool>,
    /// Downscale snapshots wider than this
    pub max_image_width: Option<u32>,
    /// Screenshot command override
    pub capture_command: Option<Vec<String>>,
    /// Classifier backend
    pub classifier: Option<ClassifierSettings>,
    /// Logging options
    pub logger_settings: Option<LoggerSettings>,
}

/// Persisted application configuration (`config.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedAppConfig {
    /// Capture interval (seconds)
    pub capture_interval: u64,
    /// Labels offered to the classifier, in prompt order
    pub possible_activities: Vec<String>,
    /// Substrings that mark a label as distracting
    pub blacklisted_words: Vec<String>,
    /// Sound played by the front-end with a distraction alert
    pub notification_sound: String,
    /// Minimum quiet period before praise (seconds)
    pub positive_reinforcement_interval: u64,
    /// Probability that an eligible check produces praise
    pub positive_reinforcement_chance: f64,
    /// Local hour from which praise may fire
    pub positive_reinforcement_after_hour: u32,
    /// Reject start when the task text is empty
    pub require_task: bool,
    /// Hold the next capture while a reflection prompt is open
    pub reflection_gates_capture: bool,
    /// Bounded wait for workers on stop (milliseconds)
    pub stop_timeout_ms: u64,
    /// Keep the latest snapshot under `debug_images/`
    pub keep_latest_capture: bool,
    /// Downscale snapshots wider than this
    pub max_image_width: u32,
    /// Screenshot command override, `{output}` is replaced by the target path
    pub capture_command: Option<Vec<String>>,
    /// Classifier backend
    pub classifier: ClassifierSettings,
    /// Logging options
    pub logger_settings: LoggerSettings,
}

impl Default for PersistedAppConfig {
    fn default() -> Self {
        Self {
            capture_interval: 30,
            possible_activities: [
                "reading a book",
                "learning",
                "coding",
                "watching educational youtube video",
                "watching uneducational youtube video",
                "browsing twitter/social media",
                "reading comics",
                "gaming",
                "playing chess",
                "watching twitch stream",
                "writing",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            blacklisted_words: [
                "twitter",
                "comics",
                "gaming",
                "live stream",
                "watching shortform video",
                "uneducational",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            notification_sound: "Radar.mp3".to_string(),
            positive_reinforcement_interval: 1800,
            positive_reinforcement_chance: 0.125,
            positive_reinforcement_after_hour: 20,
            require_task: true,
            reflection_gates_capture: false,
            stop_timeout_ms: 5000,
            keep_latest_capture: false,
            max_image_width: 1280,
            capture_command: None,
            classifier: ClassifierSettings::default(),
            logger_settings: LoggerSettings::default(),
        }
    }
}

impl PersistedAppConfig {
    /// Clamp numeric fields into their valid ranges
    pub fn normalized(mut self) -> Self {
        self.capture_interval = clamp_interval(self.capture_interval);
        self.positive_reinforcement_chance = if self.positive_reinforcement_chance.is_finite() {
            self.positive_reinforcement_chance.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.positive_reinforcement_after_hour = self.positive_reinforcement_after_hour.min(23);
        self.stop_timeout_ms = self.stop_timeout_ms.clamp(100, 30_000);
        self.max_image_width = self.max_image_width.max(64);
        self.classifier.timeout_secs = self.classifier.timeout_secs.max(1);
        self
    }

    /// Merge a partial update into this configuration
    pub fn apply(&mut self, update: AppConfig) {
        if let Some(interval) = update.capture_interval {
            self.capture_interval = interval;
        }
        if let Some(activities) = update.possible_activities {
            self.possible_activities = activities;
        }
        if let Some(words) = update.blacklisted_words {
            self.blacklisted_words = words;
        }
        if let Some(sound) = update.notification_sound {
            self.notification_sound = sound;
        }
        if let Some(value) = update.positive_reinforcement_interval {
            self.positive_reinforcement_interval = value;
        }
        if let Some(value) = update.positive_reinforcement_chance {
            self.positive_reinforcement_chance = value;
        }
        if let Some(value) = update.positive_reinforcement_after_hour {
            self.positive_reinforcement_after_hour = value;
        }
        if let Some(value) = update.require_task {
            self.require_task = value;
        }
        if let Some(value) = update.reflection_gates_capture {
            self.reflection_gates_capture = value;
        }
        if let Some(value) = update.stop_timeout_ms {
            self.stop_timeout_ms = value;
        }
        if let Some(value) = update.keep_latest_capture {
            self.keep_latest_capture = value;
        }
        if let Some(value) = update.max_image_width {
            self.max_image_width = value;
        }
        if let Some(command) = update.capture_command {
            self.capture_command = if command.is_empty() { None } else { Some(command) };
        }
        if let Some(classifier) = update.classifier {
            self.classifier = classifier;
        }
        if let Some(logger) = update.logger_settings {
            self.logger_settings = logger;
        }
    }
}

/// Clamp a capture interval into [5, 3600]
pub fn clamp_interval(interval: u64) -> u64 {
    interval.clamp(MIN_CAPTURE_INTERVAL, MAX_CAPTURE_INTERVAL)
}

/// Classifier backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierProvider {
    /// Local model server speaking the Ollama generate API
    Ollama,
    /// Hosted OpenAI-compatible chat completion API
    OpenAi,
}

/// Classifier backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Which backend to use
    pub provider: ClassifierProvider,
    /// Model name
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// API key, falls back to `OPENAI_API_KEY`
    pub api_key: Option<String>,
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            provider: ClassifierProvider::Ollama,
            model: "llava".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

/// Logging options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    /// Forward log events to the webview
    pub enable_frontend_logging: bool,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            enable_frontend_logging: true,
        }
    }
}

/// Start command payload coming from a front-end
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartRequest {
    /// Capture interval override (seconds)
    pub interval: Option<u64>,
    /// Free-text description of the task
    pub task_description: Option<String>,
    /// Activity labels override
    pub possible_activities: Option<Vec<String>>,
    /// Blacklist override
    pub blacklisted_terms: Option<Vec<String>>,
}

/// Controller status shown by the front-ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStatus {
    /// Current state machine state
    pub state: MonitorState,
    /// Active session id
    pub session_id: Option<String>,
    /// Active session interval (seconds)
    pub interval: Option<u64>,
    /// Inline status text
    pub message: String,
    /// Locked task text
    pub locked_task: Option<String>,
    /// Inline task lock status text
    pub task_message: String,
    /// When the active session started
    pub started_at: Option<DateTime<Local>>,
    /// Last applied verdict
    pub last_verdict: Option<crate::llm::Verdict>,
}
