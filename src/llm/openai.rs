// OpenAI backend - hosted chat completion API with image input

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use super::{ClassificationContext, Classifier};
use crate::capture::Snapshot;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChatMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct OpenAiClassifier {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiClassifier {
    /// The local-server defaults are replaced by the hosted API defaults
    pub fn new(client: Client, base_url: &str, model: &str, api_key: String) -> Self {
        let base_url = match base_url.trim() {
            "" | super::ollama::DEFAULT_BASE_URL => DEFAULT_BASE_URL,
            url => url,
        };
        let model = match model.trim() {
            "" | super::ollama::DEFAULT_MODEL => DEFAULT_MODEL,
            model => model,
        };
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    fn name(&self) -> &str {
        "openai"
    }

    async fn classify(
        &self,
        snapshot: &Snapshot,
        context: &ClassificationContext,
    ) -> Result<String> {
        let image_url = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(&snapshot.png)
        );
        let request_body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": context.prompt() },
                    {
                        "type": "image_url",
                        "image_url": { "url": image_url, "detail": "low" }
                    }
                ]
            }],
            "max_tokens": 300
        });

        debug!("calling openai: model={}, endpoint={}", self.model, self.endpoint());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .context("openai request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("openai API error {}: {}", status, error_text);
            return Err(anyhow!("openai returned {}: {}", status, error_text));
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("openai response is not valid JSON")?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("openai response has no choices"))?;

        if choice.finish_reason.as_deref() == Some("length") {
            warn!("openai label was truncated (finish_reason=length)");
        }

        choice
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| anyhow!("openai response has no message content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context() -> ClassificationContext {
        ClassificationContext {
            possible_activities: vec!["coding".into(), "browsing twitter/social media".into()],
            task: None,
        }
    }

    #[tokio::test]
    async fn test_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-4o", "max_tokens": 300 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "browsing twitter" },
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let classifier = OpenAiClassifier::new(
            Client::new(),
            &format!("{}/v1", server.uri()),
            "gpt-4o",
            "sk-test".into(),
        );
        let label = classifier.classify(&Snapshot::blank(), &context()).await.unwrap();
        assert_eq!(label, "browsing twitter");
    }

    #[tokio::test]
    async fn test_unauthorized_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .mount(&server)
            .await;

        let classifier = OpenAiClassifier::new(Client::new(), &server.uri(), "gpt-4o", "bad".into());
        let err = classifier
            .classify(&Snapshot::blank(), &context())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let classifier = OpenAiClassifier::new(Client::new(), &server.uri(), "gpt-4o", "sk".into());
        assert!(classifier.classify(&Snapshot::blank(), &context()).await.is_err());
    }

    #[test]
    fn test_local_defaults_are_replaced() {
        let classifier = OpenAiClassifier::new(
            Client::new(),
            super::super::ollama::DEFAULT_BASE_URL,
            "llava",
            "sk".into(),
        );
        assert_eq!(classifier.endpoint(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(classifier.model, DEFAULT_MODEL);
    }
}
