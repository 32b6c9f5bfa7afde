// LLM module - vision classifiers that label a snapshot with an activity
//
// A backend only returns a label. Turning the label into a distraction
// verdict, enforcing the timeout and failing open all happen here so every
// backend behaves the same way.

pub mod ollama;
pub mod openai;

pub use ollama::OllamaClassifier;
pub use openai::OpenAiClassifier;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::capture::Snapshot;
use crate::models::{ClassifierProvider, ClassifierSettings};

/// What the classifier is told about the session
#[derive(Debug, Clone, Default)]
pub struct ClassificationContext {
    /// Allowed labels, in prompt order
    pub possible_activities: Vec<String>,
    /// Task the user said they are working on
    pub task: Option<String>,
}

impl ClassificationContext {
    pub fn prompt(&self) -> String {
        build_prompt(&self.possible_activities, self.task.as_deref())
    }
}

/// Build the labelling prompt
pub fn build_prompt(possible_activities: &[String], task: Option<&str>) -> String {
    let mut prompt = format!(
        "Describe what this person in this image is doing briefly (5 words max) from these options: {}.",
        possible_activities.join(", ")
    );
    if let Some(task) = task.map(str::trim).filter(|t| !t.is_empty()) {
        prompt.push_str(&format!(" They said they are working on: {}.", task));
    }
    prompt
}

/// Vision classifier backend
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Label one snapshot
    ///
    /// Transport failures, non-2xx responses and malformed bodies are errors,
    /// never a label.
    async fn classify(&self, snapshot: &Snapshot, context: &ClassificationContext)
        -> Result<String>;
}

/// Classification outcome for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: String,
    pub is_distracted: bool,
    pub timestamp: DateTime<Local>,
    /// Classification failed and the verdict defaulted to not distracted
    #[serde(default)]
    pub fail_open: bool,
}

impl Verdict {
    pub fn fail_open(timestamp: DateTime<Local>) -> Self {
        Self {
            label: String::new(),
            is_distracted: false,
            timestamp,
            fail_open: true,
        }
    }
}

/// Case-insensitive substring match against the blacklist
pub fn is_distracted(label: &str, blacklist: &[String]) -> bool {
    let label = label.to_lowercase();
    blacklist
        .iter()
        .any(|term| label.contains(&term.to_lowercase()))
}

/// Classify a snapshot, failing open on any error or timeout
pub async fn classify_snapshot(
    classifier: &dyn Classifier,
    snapshot: &Snapshot,
    context: &ClassificationContext,
    blacklist: &[String],
    timeout: Duration,
) -> Verdict {
    match tokio::time::timeout(timeout, classifier.classify(snapshot, context)).await {
        Ok(Ok(label)) => {
            let label = label.trim().to_string();
            let distracted = is_distracted(&label, blacklist);
            info!(
                "{} labelled snapshot {} as '{}' (distracted: {})",
                classifier.name(),
                snapshot.id,
                label,
                distracted
            );
            Verdict {
                label,
                is_distracted: distracted,
                timestamp: Local::now(),
                fail_open: false,
            }
        }
        Ok(Err(e)) => {
            warn!(
                "{} classification failed, treating as not distracted: {:#}",
                classifier.name(),
                e
            );
            Verdict::fail_open(Local::now())
        }
        Err(_) => {
            warn!(
                "{} classification timed out after {:?}, treating as not distracted",
                classifier.name(),
                timeout
            );
            Verdict::fail_open(Local::now())
        }
    }
}

/// Build the configured backend
pub fn create_classifier(
    client: reqwest::Client,
    settings: &ClassifierSettings,
) -> Result<Arc<dyn Classifier>> {
    let classifier: Arc<dyn Classifier> = match settings.provider {
        ClassifierProvider::Ollama => Arc::new(OllamaClassifier::new(
            client,
            &settings.base_url,
            &settings.model,
        )),
        ClassifierProvider::OpenAi => {
            let api_key = settings
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    anyhow::anyhow!("OpenAI classifier needs an API key (config or OPENAI_API_KEY)")
                })?;
            Arc::new(OpenAiClassifier::new(
                client,
                &settings.base_url,
                &settings.model,
                api_key,
            ))
        }
    };
    Ok(classifier)
}

/// Shared HTTP client for classifier backends
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .pool_max_idle_per_host(4)
        .build()?)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted classifier outcome
    pub enum Scripted {
        Label(&'static str),
        Fail(&'static str),
        /// Sleep before answering with the label
        Slow(Duration, &'static str),
    }

    /// Classifier that replays scripted outcomes, then repeats the fallback
    pub struct FakeClassifier {
        script: Mutex<VecDeque<Scripted>>,
        fallback: &'static str,
        pub calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    struct InFlight<'a>(&'a AtomicUsize);

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl FakeClassifier {
        pub fn new(script: Vec<Scripted>, fallback: &'static str) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        /// Highest number of `classify` calls seen running at once
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        pub fn always(label: &'static str) -> Self {
            Self::new(Vec::new(), label)
        }
    }

    #[async_trait]
    impl Classifier for FakeClassifier {
        fn name(&self) -> &str {
            "fake"
        }

        async fn classify(
            &self,
            _snapshot: &Snapshot,
            context: &ClassificationContext,
        ) -> Result<String> {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            let _in_flight = InFlight(&self.in_flight);
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);

            self.calls.lock().unwrap().push(context.prompt());
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Scripted::Label(label)) => Ok(label.to_string()),
                Some(Scripted::Fail(reason)) => Err(anyhow::anyhow!(reason)),
                Some(Scripted::Slow(delay, label)) => {
                    tokio::time::sleep(delay).await;
                    Ok(label.to_string())
                }
                None => Ok(self.fallback.to_string()),
            }
        }
    }
}
