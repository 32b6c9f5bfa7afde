// Reactor - classify each snapshot and apply the verdict
//
// Each snapshot is classified by a short-lived task that also applies its
// own verdict. The reactor waits for that task before taking the next
// snapshot, so at most one classification is in flight. A task abandoned
// by a forced stop still finishes and its verdict is discarded by the
// session guard in `apply_verdict`.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Local;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::policy::{pick_praise, Reaction};
use super::state::{MonitorState, Session};
use super::MonitorController;
use crate::capture::Snapshot;
use crate::event_bus::AppEvent;
use crate::llm::{classify_snapshot, Classifier, Verdict};

pub const ALERT_TITLE: &str = "Distraction Alert";
pub const ALERT_MESSAGE: &str = "You seem to be distracted. Focus on your work!";
pub const POPUP_MESSAGE: &str = "You seem distracted! Get back to work!";
pub const REFLECTION_QUESTION: &str = "What caused the distraction?";
pub const REFOCUS_TITLE: &str = "Great!";
pub const REFOCUS_MESSAGE: &str = "Let's get back to work!";
pub const PRAISE_TITLE: &str = "Well Done!";

/// Handles shared by the workers of one session
#[derive(Clone)]
pub(crate) struct SessionRun {
    pub session: Session,
    pub cancel: CancellationToken,
    /// Holds the capture worker while `true`
    pub pause: Arc<watch::Sender<bool>>,
}

/// Receive snapshots until cancelled or the capture worker is gone
pub(crate) async fn reactor_loop(
    controller: MonitorController,
    run: SessionRun,
    classifier: Arc<dyn Classifier>,
    mut snapshots: mpsc::Receiver<Snapshot>,
) {
    debug!("reactor started for session {}", run.session.id);

    loop {
        let snapshot = tokio::select! {
            biased;
            _ = run.cancel.cancelled() => break,
            snapshot = snapshots.recv() => match snapshot {
                Some(snapshot) => snapshot,
                None => break,
            },
        };

        controller
            .set_phase(run.session.id, MonitorState::Classifying)
            .await;

        let worker = {
            let controller = controller.clone();
            let run = run.clone();
            let classifier = classifier.clone();
            tokio::spawn(async move {
                let verdict = classify_snapshot(
                    classifier.as_ref(),
                    &snapshot,
                    &run.session.context(),
                    &run.session.blacklisted_terms,
                    run.session.classify_timeout,
                )
                .await;
                drop(snapshot);
                controller.apply_verdict(&run, verdict).await;
            })
        };

        if let Err(e) = worker.await {
            warn!("classification worker failed: {}", e);
        }
    }

    debug!("reactor stopped for session {}", run.session.id);
}

impl MonitorController {
    /// Apply a verdict if its session is still the active one
    ///
    /// Only the session check and the debounce decision happen under the
    /// state lock. Stats and notifier calls run after it is released, so a
    /// slow disk or notifier never holds up `stop`. Returns `false` when the
    /// verdict was discarded.
    pub(crate) async fn apply_verdict(&self, run: &SessionRun, verdict: Verdict) -> bool {
        let session = &run.session;
        let now = Local::now().naive_local();

        let (reaction, praise) = {
            let mut shared = self.inner.shared.lock().await;

            let active = !shared.state.is_idle()
                && shared.session.as_ref().map(|s| s.id) == Some(session.id);
            if !active {
                info!(
                    "discarding verdict '{}' from inactive session {}",
                    verdict.label, session.id
                );
                self.inner.events.publish(AppEvent::VerdictDiscarded {
                    session_id: session.id,
                    label: verdict.label,
                });
                return false;
            }

            if shared.state.is_running() {
                shared.state = MonitorState::Reacting;
                self.publish_status(&shared);
            }

            info!(
                "verdict for session {}: '{}' (distracted: {})",
                session.id, verdict.label, verdict.is_distracted
            );

            let mut rng = rand::thread_rng();
            let reaction =
                shared
                    .debounce
                    .on_verdict(verdict.is_distracted, now, &session.praise, &mut rng);
            shared.last_verdict = Some(verdict.clone());
            (reaction, pick_praise(&mut rng))
        };

        self.inner
            .stats
            .record(verdict.is_distracted, session.interval, now)
            .await;
        self.inner.events.publish(AppEvent::VerdictApplied {
            session_id: session.id,
            verdict,
        });

        match reaction {
            Reaction::Alert => {
                let notifier = &self.inner.notifier;
                notifier.notify(ALERT_TITLE, ALERT_MESSAGE).await;
                notifier.popup(POPUP_MESSAGE).await;
                self.inner.events.publish(AppEvent::DistractionAlert {
                    title: ALERT_TITLE.to_string(),
                    message: ALERT_MESSAGE.to_string(),
                });
                self.spawn_reflection(run);
            }
            Reaction::Praise => {
                info!("positive reinforcement: {}", praise);
                self.inner.notifier.notify(PRAISE_TITLE, praise).await;
                self.inner.events.publish(AppEvent::PositiveReinforcement {
                    message: praise.to_string(),
                });
            }
            Reaction::Nothing => {}
        }

        {
            let mut shared = self.inner.shared.lock().await;
            let current = shared.session.as_ref().map(|s| s.id) == Some(session.id);
            if current && shared.state == MonitorState::Reacting {
                shared.state = MonitorState::Capturing;
                self.publish_status(&shared);
            }
        }

        let summary = self.inner.stats.summary().await;
        self.inner.events.publish(AppEvent::StatsUpdated { summary });
        true
    }

    /// Ask for a reflection without blocking the reactor
    ///
    /// Only one prompt is open at a time.
    fn spawn_reflection(&self, run: &SessionRun) {
        if self.inner.reflection_open.swap(true, Ordering::SeqCst) {
            debug!("reflection prompt already open");
            return;
        }

        let controller = self.clone();
        let run = run.clone();
        tokio::spawn(async move {
            let gates = run.session.reflection_gates_capture;
            if gates {
                run.pause.send_replace(true);
            }

            let notifier = controller.inner.notifier.clone();
            let answer = tokio::select! {
                _ = run.cancel.cancelled() => None,
                answer = notifier.prompt_reflection(REFLECTION_QUESTION) => answer,
            };
            notifier.dismiss_popup().await;

            if let Some(text) = answer.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
                info!("user reflection: {}", text);
                controller
                    .inner
                    .events
                    .publish(AppEvent::ReflectionRecorded { text });
                notifier.notify(REFOCUS_TITLE, REFOCUS_MESSAGE).await;
            }

            if gates {
                run.pause.send_replace(false);
            }
            controller.inner.reflection_open.store(false, Ordering::SeqCst);
        });
    }
}
