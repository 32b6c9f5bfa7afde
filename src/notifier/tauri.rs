// Webview notifier - forwards alerts to the window and the tray icon

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tauri::{AppHandle, Emitter};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::Notifier;

/// Tray icon id shared with the app setup
pub const TRAY_ID: &str = "main";

#[derive(Debug, Clone, Serialize)]
struct NotificationPayload<'a> {
    title: &'a str,
    message: &'a str,
}

pub struct TauriNotifier {
    app: AppHandle,
    /// Resolves the open reflection prompt
    pending_reflection: Mutex<Option<oneshot::Sender<Option<String>>>>,
}

impl TauriNotifier {
    pub fn new(app: AppHandle) -> Self {
        Self {
            app,
            pending_reflection: Mutex::new(None),
        }
    }

    /// Answer the open reflection prompt, `false` when none is open
    pub fn submit_reflection(&self, text: Option<String>) -> bool {
        let pending = match self.pending_reflection.lock() {
            Ok(mut pending) => pending.take(),
            Err(_) => None,
        };
        match pending {
            Some(sender) => sender.send(text).is_ok(),
            None => false,
        }
    }

    fn emit<S: Serialize + Clone>(&self, event: &str, payload: S) {
        if let Err(e) = self.app.emit(event, payload) {
            warn!("failed to emit {}: {}", event, e);
        }
    }
}

#[async_trait]
impl Notifier for TauriNotifier {
    async fn notify(&self, title: &str, message: &str) {
        self.emit(
            "monitor-notification",
            NotificationPayload { title, message },
        );

        if let Some(tray) = self.app.tray_by_id(TRAY_ID) {
            let tooltip = format!("{}: {}", title, message);
            if let Err(e) = tray.set_tooltip(Some(tooltip.as_str())) {
                debug!("failed to update tray tooltip: {}", e);
            }
        }
    }

    async fn popup(&self, message: &str) {
        self.emit("distraction-popup", message);
    }

    async fn dismiss_popup(&self) {
        self.emit("distraction-popup-dismissed", ());
    }

    async fn prompt_reflection(&self, question: &str) -> Option<String> {
        let (sender, receiver) = oneshot::channel();
        match self.pending_reflection.lock() {
            // a newer prompt replaces an unanswered one
            Ok(mut pending) => *pending = Some(sender),
            Err(_) => return None,
        }

        self.emit("reflection-requested", question);
        receiver.await.ok().flatten()
    }
}
