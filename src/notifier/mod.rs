// Notifier - renders alerts, popups and reflection prompts
//
// The controller only talks to this trait. The desktop shell forwards to the
// webview, the console front-end writes to the log.

use async_trait::async_trait;
use tracing::info;

#[cfg(feature = "desktop")]
pub mod tauri;

#[cfg(feature = "desktop")]
pub use self::tauri::TauriNotifier;

/// Alert surface
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Fire-and-forget notification
    async fn notify(&self, title: &str, message: &str);

    /// Show the distraction popup
    async fn popup(&self, message: &str);

    async fn dismiss_popup(&self);

    /// Ask the user what caused the distraction
    ///
    /// Resolves when the user answers, `None` when the prompt was dismissed
    /// or the surface cannot ask.
    async fn prompt_reflection(&self, question: &str) -> Option<String>;
}

/// Console notifier
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str) {
        info!("[{}] {}", title, message);
    }

    async fn popup(&self, message: &str) {
        info!("[popup] {}", message);
    }

    async fn dismiss_popup(&self) {}

    async fn prompt_reflection(&self, _question: &str) -> Option<String> {
        None
    }
}
