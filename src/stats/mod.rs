//! Statistics aggregator
//!
//! Every verdict is counted twice: once in its day bucket (`YYYY-MM-DD`) and
//! once in its hour bucket (`YYYY-MM-DD HH:00`). Buckets keep insertion order
//! and are never removed.

use std::fmt::Write as _;
use std::path::Path;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};
use crate::utils::atomic_write;

/// Counters for one bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStats {
    pub distractions: u64,
    pub checks: u64,
    /// Elapsed monitoring time (seconds)
    #[serde(rename = "total_time")]
    pub total_time_seconds: u64,
}

impl BucketStats {
    /// Share of checks that were distracted, 0 when nothing was checked
    pub fn distraction_percentage(&self) -> f64 {
        if self.checks == 0 {
            0.0
        } else {
            self.distractions as f64 / self.checks as f64 * 100.0
        }
    }
}

/// Bucket key to counters, serialized as a flat JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsStore {
    buckets: IndexMap<String, BucketStats>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Day bucket key for a local timestamp
    pub fn day_key(at: &NaiveDateTime) -> String {
        at.format("%Y-%m-%d").to_string()
    }

    /// Hour bucket key for a local timestamp
    pub fn hour_key(at: &NaiveDateTime) -> String {
        at.format("%Y-%m-%d %H:00").to_string()
    }

    /// Count one verdict into its day and hour buckets
    pub fn record(&mut self, is_distracted: bool, interval_seconds: u64, at: NaiveDateTime) {
        for key in [Self::day_key(&at), Self::hour_key(&at)] {
            let bucket = self.buckets.entry(key).or_default();
            bucket.checks += 1;
            bucket.total_time_seconds += interval_seconds;
            if is_distracted {
                bucket.distractions += 1;
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&BucketStats> {
        self.buckets.get(key)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&String, &BucketStats)> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// One line per bucket in insertion order
    pub fn summarize(&self) -> String {
        if self.buckets.is_empty() {
            return "No statistics recorded yet.".to_string();
        }

        let mut out = String::new();
        for (key, bucket) in &self.buckets {
            let total = bucket.total_time_seconds;
            let _ = writeln!(
                out,
                "{}: {} distractions / {} checks ({:.1}%), total time {}h {}m {}s",
                key,
                bucket.distractions,
                bucket.checks,
                bucket.distraction_percentage(),
                total / 3600,
                (total % 3600) / 60,
                total % 60
            );
        }
        out.truncate(out.trim_end().len());
        out
    }

    /// Load a persisted store
    ///
    /// A missing file yields an empty store. A file that exists but does not
    /// decode is a hard error so accumulated stats are never dropped silently.
    pub fn load(path: &Path) -> MonitorResult<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => {
                return Err(MonitorError::CorruptStats {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| MonitorError::CorruptStats {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Rewrite the whole document atomically
    pub fn save(&self, path: &Path) -> MonitorResult<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| MonitorError::persistence(e.to_string()))?;
        atomic_write(path, &json)
            .map_err(|e| MonitorError::persistence(format!("{}: {}", path.display(), e)))
    }
}
