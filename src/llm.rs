use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::plan::Plan;
use crate::prompt;
use crate::turns::Turn;

// Hard limits, not configuration.
pub const MAX_RESPONSE_TOKENS: u32 = 200;
pub const MAX_SUMMARY_TOKENS: u32 = 300;
pub const MAX_STARTUP_TOPIC_TOKENS: u32 = 100;
pub const MAX_PLANNER_TOKENS: u32 = 200;

/// Free-text completion over an alternating turn sequence.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system_prompt: &str, turns: &[Turn], max_tokens: u32)
        -> Result<String>;
}

/// Structured planning over an alternating turn sequence. Implementations
/// must repair malformed output to safe defaults rather than propagate it;
/// only transport-level failures surface as errors.
#[async_trait]
pub trait PlanningProvider: Send + Sync {
    async fn plan(&self, turns: &[Turn], context: &str) -> Result<Plan>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// OpenAI-compatible chat-completions client (Ollama, LM Studio, vLLM,
/// OpenAI, etc.). The planner may run on a cheaper model than the responder.
#[derive(Clone)]
pub struct LlmClient {
    api_url: String,
    api_key: Option<String>,
    model: String,
    planner_model: Option<String>,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: String,
        planner_model: Option<String>,
    ) -> Self {
        Self {
            api_url,
            api_key,
            model,
            planner_model,
            client: reqwest::Client::new(),
        }
    }

    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        model: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_url);

        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            temperature: Some(0.7),
            max_tokens: Some(max_tokens),
        };

        let mut req = self.client.post(&url).json(&request);

        // API key header only when provided (not needed for local models).
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await.context("Failed to send LLM request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            anyhow::bail!("LLM API returned error {status}: {body}");
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("No response from LLM"))?;

        Ok(content)
    }
}

fn turns_to_chat(turns: &[Turn]) -> impl Iterator<Item = ChatMessage> + '_ {
    turns.iter().map(|t| ChatMessage {
        role: t.role.as_str().to_string(),
        content: t.content.clone(),
    })
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        max_tokens: u32,
    ) -> Result<String> {
        let mut messages = vec![ChatMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        }];
        messages.extend(turns_to_chat(turns));
        self.generate(messages, &self.model, max_tokens).await
    }
}

#[async_trait]
impl PlanningProvider for LlmClient {
    async fn plan(&self, turns: &[Turn], context: &str) -> Result<Plan> {
        let model = self.planner_model.as_deref().unwrap_or(&self.model);
        let mut messages = vec![ChatMessage {
            role: "system".to_string(),
            content: prompt::planning_system_prompt(context),
        }];
        messages.extend(turns_to_chat(turns));

        let raw = self.generate(messages, model, MAX_PLANNER_TOKENS).await?;
        let value: serde_json::Value = serde_json::from_str(extract_json(&raw))
            .with_context(|| format!("planner returned non-JSON output: {raw}"))?;
        Ok(Plan::repair(&value))
    }
}

/// Pull a JSON object out of a model reply that may wrap it in reasoning
/// text, prose, or markdown fences.
pub fn extract_json(response: &str) -> &str {
    let cleaned = match response.rfind("</think>") {
        Some(idx) => &response[idx + "</think>".len()..],
        None => response,
    };

    if let Some(start) = cleaned.find("```json") {
        let after = &cleaned[start + "```json".len()..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if end > start {
            return &cleaned[start..=end];
        }
    }

    cleaned.trim()
}
