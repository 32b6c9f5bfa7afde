// Ollama backend - local model server speaking the generate API

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use super::{ClassificationContext, Classifier};
use crate::capture::Snapshot;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llava";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

pub struct OllamaClassifier {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClassifier {
    /// Blank base URL or model fall back to the local defaults
    pub fn new(client: Client, base_url: &str, model: &str) -> Self {
        let base_url = match base_url.trim() {
            "" => DEFAULT_BASE_URL,
            url => url,
        };
        let model = match model.trim() {
            "" => DEFAULT_MODEL,
            model => model,
        };
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl Classifier for OllamaClassifier {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn classify(
        &self,
        snapshot: &Snapshot,
        context: &ClassificationContext,
    ) -> Result<String> {
        let request_body = json!({
            "model": self.model,
            "prompt": context.prompt(),
            "images": [general_purpose::STANDARD.encode(&snapshot.png)],
            "stream": false,
            "options": {
                "temperature": 0
            }
        });

        debug!("calling ollama: model={}, endpoint={}", self.model, self.endpoint());

        let response = self
            .client
            .post(self.endpoint())
            .json(&request_body)
            .send()
            .await
            .context("ollama request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("ollama API error {}: {}", status, error_text);
            return Err(anyhow!("ollama returned {}: {}", status, error_text));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("ollama response is not valid JSON")?;

        body.response
            .ok_or_else(|| anyhow!("ollama response has no 'response' field"))
    }
}
