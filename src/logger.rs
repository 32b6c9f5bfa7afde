// Logging - stdout plus a daily rolling file, optionally mirrored to the webview

use std::path::Path;

use anyhow::{Context as _, Result};
use time::macros::format_description;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[cfg(feature = "desktop")]
pub use self::webview::{LogBroadcaster, LogMessage, TauriLogLayer};

/// Log file prefix inside the log directory
pub const LOG_FILE_PREFIX: &str = "monitor.log";

type Timer = LocalTime<&'static [time::format_description::FormatItem<'static>]>;

fn local_timer() -> Timer {
    LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ))
}

fn file_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(file_appender))
}

/// Initialise logging for the console front-end
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init(log_dir: &Path) -> Result<WorkerGuard> {
    let (non_blocking, guard) = file_writer(log_dir)?;

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stdout.and(non_blocking))
        .with_timer(local_timer())
        .with_ansi(cfg!(debug_assertions))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("a global tracing subscriber is already installed")?;
    Ok(guard)
}

/// Initialise logging with events mirrored to the webview
#[cfg(feature = "desktop")]
pub fn init_with_broadcaster(
    log_dir: &Path,
    broadcaster: std::sync::Arc<LogBroadcaster>,
) -> Result<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;

    let (non_blocking, guard) = file_writer(log_dir)?;

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stdout.and(non_blocking))
        .with_timer(local_timer())
        .with_ansi(cfg!(debug_assertions))
        .finish()
        .with(TauriLogLayer::new(broadcaster));

    tracing::subscriber::set_global_default(subscriber)
        .context("a global tracing subscriber is already installed")?;
    Ok(guard)
}

#[cfg(feature = "desktop")]
mod webview {
    use std::sync::{Arc, RwLock};

    use tauri::{AppHandle, Emitter};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::Context;
    use tracing_subscriber::Layer;

    #[derive(Clone, Debug, serde::Serialize)]
    pub struct LogMessage {
        pub timestamp: String,
        pub level: String,
        pub target: String,
        pub message: String,
    }

    /// Sends log events to the webview once the app handle is known
    pub struct LogBroadcaster {
        app_handle: RwLock<Option<AppHandle>>,
        enabled: RwLock<bool>,
    }

    impl LogBroadcaster {
        pub fn new() -> Self {
            Self {
                app_handle: RwLock::new(None),
                enabled: RwLock::new(true),
            }
        }

        pub fn set_app_handle(&self, handle: AppHandle) {
            if let Ok(mut app) = self.app_handle.write() {
                *app = Some(handle);
            }
        }

        pub fn set_enabled(&self, enabled: bool) {
            if let Ok(mut e) = self.enabled.write() {
                *e = enabled;
            }
        }

        pub fn is_enabled(&self) -> bool {
            self.enabled.read().map(|e| *e).unwrap_or(false)
        }

        fn emit_log(&self, log: LogMessage) {
            if !self.is_enabled() {
                return;
            }
            if let Ok(app_guard) = self.app_handle.read() {
                if let Some(app) = app_guard.as_ref() {
                    let _ = app.emit("log-message", &log);
                }
            }
        }
    }

    impl Default for LogBroadcaster {
        fn default() -> Self {
            Self::new()
        }
    }

    pub struct TauriLogLayer {
        broadcaster: Arc<LogBroadcaster>,
    }

    impl TauriLogLayer {
        pub fn new(broadcaster: Arc<LogBroadcaster>) -> Self {
            Self { broadcaster }
        }
    }

    impl<S: Subscriber> Layer<S> for TauriLogLayer {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            struct MessageVisitor {
                message: String,
            }

            impl tracing::field::Visit for MessageVisitor {
                fn record_debug(
                    &mut self,
                    field: &tracing::field::Field,
                    value: &dyn std::fmt::Debug,
                ) {
                    if field.name() == "message" {
                        self.message = format!("{:?}", value);
                    }
                }

                fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                    if field.name() == "message" {
                        self.message = value.to_string();
                    }
                }
            }

            let metadata = event.metadata();
            let mut visitor = MessageVisitor {
                message: String::new(),
            };
            event.record(&mut visitor);

            self.broadcaster.emit_log(LogMessage {
                timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
                level: metadata.level().to_string(),
                target: metadata.target().to_string(),
                message: visitor.message,
            });
        }
    }
}
