use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client as AsyncOpenAiClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::LlmBackend;

pub type SharedLlmClient = Arc<dyn LlmClient>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Offline backend for smoke runs: returns the prompt it was given.
#[derive(Debug, Default, Clone)]
pub struct EchoLlmClient;

#[async_trait]
impl LlmClient for EchoLlmClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        Ok(format!("[echo completion]\n{prompt}"))
    }
}

impl EchoLlmClient {
    pub fn shared() -> SharedLlmClient {
        Arc::new(Self)
    }
}

/// OpenAI-compatible client that can point at OpenAI, Ollama, vLLM, or any compatible backend.
pub struct OpenAiLlmClient {
    client: AsyncOpenAiClient<OpenAIConfig>,
    model: String,
    system_prompt: String,
}

impl OpenAiLlmClient {
    const DEFAULT_SYSTEM_PROMPT: &'static str =
        "You are a precise assistant that answers questions about source code repositories.";

    pub fn new(api_key: &str, base_url: Option<&str>, model: &str) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = base_url {
            config = config.with_api_base(base_url);
        }

        Self {
            client: AsyncOpenAiClient::with_config(config),
            model: model.to_string(),
            system_prompt: Self::DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn chat(&self, prompt: &str) -> anyhow::Result<String> {
        let system_message = ChatCompletionRequestSystemMessageArgs::default()
            .content(self.system_prompt.as_str())
            .build()?;
        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(0.1)
            .messages(vec![system_message.into(), user_message.into()])
            .build()?;

        let response = self.client.chat().create(request).await?;
        let choice = response
            .choices
            .first()
            .context("LLM response did not contain any choices")?;

        Ok(choice.message.content.clone().unwrap_or_default())
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.chat(prompt).await
    }
}

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API over plain HTTP.
pub struct ClaudeLlmClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ClaudeMessage<'a>; 1],
}

#[derive(Serialize)]
struct ClaudeMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
}

#[derive(Deserialize)]
struct ClaudeContentBlock {
    #[serde(default)]
    text: String,
}

impl ClaudeLlmClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: 2048,
        }
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn send(&self, prompt: &str) -> anyhow::Result<String> {
        let body = ClaudeRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [ClaudeMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Claude request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Claude API returned {status}: {text}");
        }

        let parsed: ClaudeResponse = response
            .json()
            .await
            .context("Claude response was not valid JSON")?;
        Ok(parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl LlmClient for ClaudeLlmClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.send(prompt).await
    }
}

/// Bounds every completion by a deadline; an elapsed deadline is an ordinary error.
pub struct TimeoutLlmClient {
    inner: SharedLlmClient,
    timeout: Duration,
}

impl TimeoutLlmClient {
    pub fn wrap(inner: SharedLlmClient, timeout: Duration) -> SharedLlmClient {
        Arc::new(Self { inner, timeout })
    }
}

#[async_trait]
impl LlmClient for TimeoutLlmClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        tokio::time::timeout(self.timeout, self.inner.complete(prompt))
            .await
            .map_err(|_| anyhow!("Completion timed out after {:?}", self.timeout))?
    }
}

/// Builds the completion client for `backend`, bounded by `timeout`.
pub fn build_llm_client(backend: &LlmBackend, timeout: Duration) -> SharedLlmClient {
    let inner: SharedLlmClient = match backend {
        LlmBackend::Local { base_url, model } => {
            Arc::new(OpenAiLlmClient::new("ollama", Some(base_url.as_str()), model))
        }
        LlmBackend::OpenAi {
            api_key,
            model,
            base_url,
        } => Arc::new(OpenAiLlmClient::new(api_key, base_url.as_deref(), model)),
        LlmBackend::Claude { api_key, model } => Arc::new(ClaudeLlmClient::new(api_key, model)),
        LlmBackend::Echo => EchoLlmClient::shared(),
    };
    TimeoutLlmClient::wrap(inner, timeout)
}
