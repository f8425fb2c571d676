use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::context::ContextAssembler;
use super::router::{select_mode, Intent, QuestionRouter};
use super::sources::{dedupe_sources, Source};
use super::synthesis::AnswerSynthesizer;
use crate::config::AppConfig;
use crate::history::{AnswerHistory, AnswerRecord};
use crate::indexes::{resolve_index_path, validate_index_name, IndexLookupError};
use crate::llm_client::{build_llm_client, SharedLlmClient};
use crate::rag::embed::{OpenAiEmbeddingsClient, SharedEmbeddings};
use crate::rag::local::LocalVectorStore;
use crate::rag::store::SharedVectorStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub mode: Intent,
    pub confidence: f32,
}

/// Route, assemble context, synthesize and merge citations for one index.
pub struct AskPipeline {
    router: QuestionRouter,
    assembler: ContextAssembler,
    synthesizer: AnswerSynthesizer,
    threshold: f32,
}

impl AskPipeline {
    pub fn new(
        router: QuestionRouter,
        assembler: ContextAssembler,
        synthesizer: AnswerSynthesizer,
        threshold: f32,
    ) -> Self {
        Self {
            router,
            assembler,
            synthesizer,
            threshold,
        }
    }

    #[instrument(skip_all)]
    pub async fn ask(&self, question: &str) -> anyhow::Result<AskResponse> {
        let classification = self.router.classify(question).await;
        let mode = select_mode(&classification, self.threshold);
        info!(
            intent = %classification.intent,
            confidence = classification.confidence,
            mode = %mode,
            "Routed question"
        );

        let context = self.assembler.assemble(mode, question).await?;
        let answer = self.synthesizer.synthesize(mode, &context, question).await?;
        let sources = dedupe_sources(context.authoritative_sources, context.retrieved_sources);

        Ok(AskResponse {
            answer,
            sources,
            mode,
            confidence: classification.confidence,
        })
    }
}

#[derive(Debug, Error)]
pub enum AskError {
    #[error(transparent)]
    Lookup(#[from] IndexLookupError),
    #[error("Question is required")]
    EmptyQuestion,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Long-lived query service: shared clients, one store opened per request.
pub struct QaService {
    config: Arc<AppConfig>,
    llm: SharedLlmClient,
    router_llm: SharedLlmClient,
    embedder: SharedEmbeddings,
    history: AnswerHistory,
}

impl QaService {
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        info!(
            backend = config.llm.backend.name(),
            embedding_model = %config.embedding.model,
            "Building query clients"
        );
        let llm = build_llm_client(&config.llm.backend, config.llm.timeout);
        let router_llm = build_llm_client(&config.llm.router_backend, config.llm.router_timeout);
        let embedder = OpenAiEmbeddingsClient::shared(&config.embedding);
        Self::with_clients(config, llm, router_llm, embedder)
    }

    pub fn with_clients(
        config: Arc<AppConfig>,
        llm: SharedLlmClient,
        router_llm: SharedLlmClient,
        embedder: SharedEmbeddings,
    ) -> Self {
        let history = AnswerHistory::new(config.history_dir.clone());
        Self {
            config,
            llm,
            router_llm,
            embedder,
            history,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Answers against a named index under the configured indexes root.
    pub async fn ask(&self, index_name: &str, question: &str) -> Result<AskResponse, AskError> {
        let index_name = validate_index_name(index_name)?;
        if question.trim().is_empty() {
            return Err(AskError::EmptyQuestion);
        }
        let index_dir = resolve_index_path(&self.config.indexes_dir, index_name)?;
        self.ask_at(&index_dir, index_name, question).await
    }

    /// Answers against an index directory given directly, as the CLI does.
    #[instrument(skip_all, fields(index = index_id))]
    pub async fn ask_at(
        &self,
        index_dir: &Path,
        index_id: &str,
        question: &str,
    ) -> Result<AskResponse, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        let store: SharedVectorStore =
            Arc::new(LocalVectorStore::load_existing(index_dir.to_path_buf()).await?);
        let response = self.pipeline(store).ask(question).await?;

        let record = AnswerRecord {
            timestamp: Utc::now(),
            index: index_id.to_string(),
            question: question.to_string(),
            answer: response.answer.clone(),
            sources: response.sources.clone(),
            mode: response.mode,
            confidence: response.confidence,
        };
        if let Err(err) = self.history.record_async(record).await {
            warn!(?err, "Failed to record answer history");
        }

        Ok(response)
    }

    fn pipeline(&self, store: SharedVectorStore) -> AskPipeline {
        let query = &self.config.query;
        AskPipeline::new(
            QuestionRouter::new(self.router_llm.clone()),
            ContextAssembler::new(
                store,
                self.embedder.clone(),
                query.similarity_top_k,
                query.authoritative_retrieval_cap,
            ),
            AnswerSynthesizer::new(self.llm.clone()),
            query.router_confidence_threshold,
        )
    }
}
