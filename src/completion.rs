//! Hosted text-completion fallback for free-form messages.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::prompting::{render_system_prompt, SystemPromptContext};
use crate::services::CompletionModel;

/// Fixed reply when the completion service is unavailable or misbehaves.
pub const COMPLETION_FALLBACK: &str = "Lo siento, no he podido procesar tu solicitud.";

pub struct OpenAiCompletion {
    client: reqwest::Client,
    api_key: String,
    model: String,
    system_prompt: String,
}

impl OpenAiCompletion {
    pub fn new(api_key: String, model: String, bot_name: &str) -> Self {
        let system_prompt = render_system_prompt(&SystemPromptContext { bot_name });
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            system_prompt,
        }
    }

    async fn chat_completion_text(&self, user: &str) -> Result<String, String> {
        if self.api_key.trim().is_empty() {
            return Err("OPENAI_API_KEY not configured".to_string());
        }
        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": self.system_prompt },
                    { "role": "user", "content": user }
                ],
                "temperature": 0.3
            }))
            .send()
            .await
            .map_err(|err| format!("openai request failed: {err}"))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("openai returned {status}: {body}"));
        }
        let payload = response
            .json::<Value>()
            .await
            .map_err(|err| format!("openai parse failed: {err}"))?;
        let text = payload
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("")
            .to_string();
        if text.is_empty() {
            return Err("openai response had empty content".to_string());
        }
        Ok(text)
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompletion {
    async fn complete(&self, user_text: &str) -> String {
        match self.chat_completion_text(user_text).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(%err, "completion failed, using fallback reply");
                COMPLETION_FALLBACK.to_string()
            }
        }
    }
}
