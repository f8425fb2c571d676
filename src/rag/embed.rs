use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_openai::{
    config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client as OpenAiClient,
};
use async_trait::async_trait;
use tracing::instrument;

use crate::config::EmbeddingConfig;

#[async_trait]
pub trait EmbeddingsProvider: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Embeds texts in order; providers with a batch endpoint override this.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

pub type SharedEmbeddings = Arc<dyn EmbeddingsProvider>;

/// OpenAI-compatible embeddings endpoint (Ollama serves one under `/v1`).
pub struct OpenAiEmbeddingsClient {
    client: OpenAiClient<OpenAIConfig>,
    model: String,
    timeout: Duration,
    cache: Mutex<HashMap<String, Vec<f32>>>,
    cache_capacity: usize,
}

impl OpenAiEmbeddingsClient {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(config.api_key.clone());
        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url.clone());
        }

        Self {
            client: OpenAiClient::with_config(openai_config),
            model: config.model.clone(),
            timeout: config.timeout,
            cache: Mutex::new(HashMap::new()),
            cache_capacity: 512,
        }
    }

    pub fn shared(config: &EmbeddingConfig) -> SharedEmbeddings {
        Arc::new(Self::from_config(config))
    }

    fn cache_key(&self, text: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.model.as_bytes());
        hasher.update(&[0]);
        hasher.update(text.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    fn cached(&self, key: &str) -> Option<Vec<f32>> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    fn remember(&self, key: String, embedding: &[f32]) {
        if let Ok(mut cache) = self.cache.lock() {
            if cache.len() >= self.cache_capacity {
                cache.clear();
            }
            cache.insert(key, embedding.to_vec());
        }
    }

    #[instrument(level = "debug", skip_all, fields(count = texts.len()))]
    async fn request(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts)
            .build()?;

        let response = tokio::time::timeout(self.timeout, self.client.embeddings().create(request))
            .await
            .map_err(|_| anyhow!("Embedding request timed out after {:?}", self.timeout))?
            .context("Embedding request failed")?;

        let mut data = response.data;
        data.sort_by_key(|item| item.index);
        if data.len() != expected {
            bail!(
                "Embedding response returned {} vectors for {} inputs",
                data.len(),
                expected
            );
        }
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingsProvider for OpenAiEmbeddingsClient {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let cache_key = self.cache_key(text);
        if let Some(hit) = self.cached(&cache_key) {
            return Ok(hit);
        }

        let embedding = self
            .request(vec![text.to_string()])
            .await?
            .pop()
            .context("Embedding response missing data")?;

        self.remember(cache_key, &embedding);
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts.to_vec()).await
    }
}
