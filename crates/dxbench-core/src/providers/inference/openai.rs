use super::InferenceProvider;
use crate::errors::InferError;
use crate::model::Case;
use crate::prompt;
use async_trait::async_trait;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat-completion provider. Multimodal cases are sent as
/// image_url parts, so any endpoint speaking the same protocol works via
/// [`OpenAIProvider::with_base_url`].
pub struct OpenAIProvider {
    pub api_key: String,
    pub base_url: String,
    pub temperature: f32,
    pub client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            temperature: 0.0,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl InferenceProvider for OpenAIProvider {
    async fn infer(&self, case: &Case, model: &str) -> Result<String, InferError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let messages = prompt::build_messages(case)
            .map_err(|e| InferError::BadRequest(format!("prompt build failed: {e:#}")))?;
        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| InferError::from_transport(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let detail = snippet(&resp.text().await.unwrap_or_default());
            if detail.contains("content_policy") {
                return Err(InferError::ContentPolicy(detail));
            }
            return Err(InferError::from_status(status.as_u16(), detail, retry_after));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| InferError::Malformed(e.to_string()))?;
        json.pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| InferError::Malformed("response missing message content".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Error bodies can be arbitrarily large; keep what fits in a log line.
fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}
