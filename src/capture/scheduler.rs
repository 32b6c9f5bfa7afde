// Capture worker - capture, hand off, wait, repeat until cancelled
//
// The hand-off channel has depth 1, so a capture waits for the reactor to
// take the previous snapshot. Classifications never overlap and verdicts
// follow capture order.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Capturer, Snapshot};
use crate::event_bus::{AppEvent, EventBus};

/// Everything the capture worker needs for one session
pub struct CaptureLoop {
    pub session_id: Uuid,
    pub capturer: Arc<dyn Capturer>,
    pub interval: Duration,
    pub sender: mpsc::Sender<Snapshot>,
    pub cancel: CancellationToken,
    /// `true` while capture is held, e.g. during a reflection prompt
    pub paused: watch::Receiver<bool>,
    /// Directory receiving `capture_latest.png`
    pub keep_latest: Option<PathBuf>,
    pub events: Arc<EventBus>,
}

/// Run the capture worker until cancelled or the reactor goes away
pub async fn capture_loop(mut ctx: CaptureLoop) {
    info!(
        "capture worker started for session {} (interval {:?})",
        ctx.session_id, ctx.interval
    );

    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        if !wait_until_resumed(&mut ctx.paused, &ctx.cancel).await {
            break;
        }

        let captured = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            captured = ctx.capturer.capture() => captured,
        };

        match captured {
            Ok(snapshot) => {
                ctx.events.publish(AppEvent::SnapshotCaptured {
                    session_id: ctx.session_id,
                    snapshot_id: snapshot.id,
                    captured_at: snapshot.captured_at,
                });

                if let Some(dir) = &ctx.keep_latest {
                    let dir = dir.clone();
                    let latest = snapshot.clone();
                    let saved =
                        tokio::task::spawn_blocking(move || latest.save_latest(&dir)).await;
                    match saved {
                        Ok(Err(e)) => warn!("failed to keep latest capture: {:#}", e),
                        Err(e) => warn!("failed to keep latest capture: {}", e),
                        Ok(Ok(())) => {}
                    }
                }

                tokio::select! {
                    _ = ctx.cancel.cancelled() => break,
                    sent = ctx.sender.send(snapshot) => {
                        if sent.is_err() {
                            debug!("reactor closed, capture worker exiting");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("capture failed, retrying next interval: {:#}", e);
            }
        }

        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = tokio::time::sleep(ctx.interval) => {}
        }
    }

    info!("capture worker stopped for session {}", ctx.session_id);
}

/// Block while paused; `false` when cancelled
async fn wait_until_resumed(paused: &mut watch::Receiver<bool>, cancel: &CancellationToken) -> bool {
    while *paused.borrow_and_update() {
        tokio::select! {
            _ = cancel.cancelled() => return false,
            changed = paused.changed() => {
                if changed.is_err() {
                    // sender gone, nothing can hold capture anymore
                    return true;
                }
            }
        }
    }
    !cancel.is_cancelled()
}
