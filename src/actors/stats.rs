// Stats actor - single owner of the statistics store
//
// Every mutation and every write goes through one task, so at most one
// write of stats.json is ever in flight.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::{mpsc, oneshot};

use crate::error::{MonitorError, MonitorResult};
use crate::stats::{BucketStats, StatsStore};

/// Stats commands
pub enum StatsCommand {
    /// Count one verdict and persist
    Record {
        is_distracted: bool,
        interval_seconds: u64,
        at: NaiveDateTime,
        reply: oneshot::Sender<BucketStats>,
    },

    Summary {
        reply: oneshot::Sender<String>,
    },

    Snapshot {
        reply: oneshot::Sender<StatsStore>,
    },

    /// Write the current store, reporting the outcome
    Flush {
        reply: oneshot::Sender<MonitorResult<()>>,
    },

    HealthCheck {
        reply: oneshot::Sender<bool>,
    },
}

/// Stats actor
pub struct StatsActor {
    receiver: mpsc::Receiver<StatsCommand>,
    store: StatsStore,
    path: PathBuf,
}

impl StatsActor {
    /// Create the actor around an already loaded store
    pub fn new(store: StatsStore, path: PathBuf) -> (Self, StatsHandle) {
        let (sender, receiver) = mpsc::channel(32);
        let actor = Self {
            receiver,
            store,
            path,
        };
        let handle = StatsHandle { sender };
        (actor, handle)
    }

    /// Load `path` and spawn the actor
    ///
    /// Fails when the file exists but cannot be decoded.
    pub fn spawn(path: PathBuf) -> MonitorResult<StatsHandle> {
        let store = StatsStore::load(&path)?;
        tracing::info!(
            "loaded {} stats buckets from {}",
            store.len(),
            path.display()
        );
        let (actor, handle) = Self::new(store, path);
        tokio::spawn(actor.run());
        Ok(handle)
    }

    pub async fn run(mut self) {
        tracing::debug!("stats actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                StatsCommand::Record {
                    is_distracted,
                    interval_seconds,
                    at,
                    reply,
                } => {
                    self.store.record(is_distracted, interval_seconds, at);
                    if let Err(e) = self.persist().await {
                        // the in-memory store stays authoritative
                        tracing::error!("failed to persist stats: {}", e);
                    }
                    let day = self
                        .store
                        .get(&StatsStore::day_key(&at))
                        .copied()
                        .unwrap_or_default();
                    let _ = reply.send(day);
                }

                StatsCommand::Summary { reply } => {
                    let _ = reply.send(self.store.summarize());
                }

                StatsCommand::Snapshot { reply } => {
                    let _ = reply.send(self.store.clone());
                }

                StatsCommand::Flush { reply } => {
                    let result = self.persist().await;
                    if let Err(e) = &result {
                        tracing::error!("failed to flush stats: {}", e);
                    }
                    let _ = reply.send(result);
                }

                StatsCommand::HealthCheck { reply } => {
                    let _ = reply.send(true);
                }
            }
        }

        tracing::debug!("stats actor stopped");
    }

    async fn persist(&self) -> MonitorResult<()> {
        let store = self.store.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || store.save(&path))
            .await
            .map_err(|e| MonitorError::persistence(e.to_string()))?
    }
}

/// Stats handle
#[derive(Clone)]
pub struct StatsHandle {
    sender: mpsc::Sender<StatsCommand>,
}

impl StatsHandle {
    /// Record a verdict, returns the updated day bucket
    pub async fn record(
        &self,
        is_distracted: bool,
        interval_seconds: u64,
        at: NaiveDateTime,
    ) -> BucketStats {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(StatsCommand::Record {
                is_distracted,
                interval_seconds,
                at,
                reply,
            })
            .await
            .is_err()
        {
            tracing::error!("stats actor is gone, verdict not recorded");
            return BucketStats::default();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn summary(&self) -> String {
        let (reply, rx) = oneshot::channel();
        self.sender.send(StatsCommand::Summary { reply }).await.ok();
        rx.await
            .unwrap_or_else(|_| "No statistics recorded yet.".to_string())
    }

    pub async fn snapshot(&self) -> StatsStore {
        let (reply, rx) = oneshot::channel();
        self.sender.send(StatsCommand::Snapshot { reply }).await.ok();
        rx.await.unwrap_or_default()
    }

    pub async fn flush(&self) -> MonitorResult<()> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(StatsCommand::Flush { reply })
            .await
            .map_err(|_| MonitorError::persistence("stats actor is not running"))?;
        rx.await
            .map_err(|_| MonitorError::persistence("stats actor dropped the flush request"))?
    }

    /// Whether the actor answers within one second
    pub async fn health_check(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(StatsCommand::HealthCheck { reply })
            .await
            .is_err()
        {
            return false;
        }
        matches!(
            tokio::time::timeout(Duration::from_secs(1), rx).await,
            Ok(Ok(true))
        )
    }
}
