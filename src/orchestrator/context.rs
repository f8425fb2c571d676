use tracing::{debug, instrument, warn};

use super::filters::exclude_deployment_files;
use super::router::Intent;
use super::sources::Source;
use crate::rag::embed::SharedEmbeddings;
use crate::rag::store::SharedVectorStore;
use crate::rag::types::{ScoredRecord, StoredRecord};

pub const DOCUMENTATION_MARKER: &str = "DOCUMENTATION.md";
pub const API_SPEC_MARKER: &str = "swagger-json.json";

/// Context and citations gathered for one question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    pub authoritative_context: String,
    pub retrieved_context: String,
    pub authoritative_sources: Vec<Source>,
    pub retrieved_sources: Vec<Source>,
}

pub struct ContextAssembler {
    store: SharedVectorStore,
    embedder: SharedEmbeddings,
    top_k: usize,
    authoritative_cap: usize,
}

impl ContextAssembler {
    pub fn new(
        store: SharedVectorStore,
        embedder: SharedEmbeddings,
        top_k: usize,
        authoritative_cap: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            top_k,
            authoritative_cap,
        }
    }

    #[instrument(skip_all, fields(mode = %mode))]
    pub async fn assemble(&self, mode: Intent, question: &str) -> anyhow::Result<AssembledContext> {
        let mut context = AssembledContext::default();

        match mode {
            Intent::RepoOverview => {
                let docs = self.authoritative_chunks(DOCUMENTATION_MARKER).await;
                if !docs.is_empty() {
                    context.authoritative_context =
                        format!("# Repository Documentation\n\n{}", join_texts(&docs, "\n\n---\n\n"));
                }
                context.authoritative_sources = unique_sources(&docs, Some(1.0));
            }
            Intent::ApiEndpoints => {
                let specs = self.authoritative_chunks(API_SPEC_MARKER).await;
                if !specs.is_empty() {
                    context.authoritative_context =
                        format!("# API Specification\n\n{}", join_texts(&specs, "\n\n"));
                }
                context.authoritative_sources = unique_sources(&specs, None);
            }
            Intent::DeepDive | Intent::Generic => {}
        }

        let limit = match mode {
            Intent::RepoOverview | Intent::ApiEndpoints => self.top_k.min(self.authoritative_cap),
            Intent::DeepDive | Intent::Generic => self.top_k,
        };
        let retrieved = self.retrieve(question, limit).await?;

        context.retrieved_context = retrieved
            .iter()
            .map(|node| format!("[{}] (score: {:.3})\n{}", node.file_path(), node.score, node.record.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        context.retrieved_sources = retrieved
            .iter()
            .map(|node| Source::new(node.file_path(), Some(node.score)))
            .collect();

        debug!(
            authoritative = context.authoritative_sources.len(),
            retrieved = context.retrieved_sources.len(),
            "Assembled context"
        );
        Ok(context)
    }

    /// Every stored chunk whose file path contains `marker`, in file then chunk order.
    /// A store failure yields no chunks.
    pub async fn authoritative_chunks(&self, marker: &str) -> Vec<StoredRecord> {
        let all = match self.store.get_all().await {
            Ok(all) => all,
            Err(err) => {
                warn!(?err, marker, "Authoritative lookup failed");
                return Vec::new();
            }
        };

        let mut matching: Vec<StoredRecord> = all
            .into_iter()
            .filter(|record| record.metadata.file_path.contains(marker))
            .collect();
        matching.sort_by(|a, b| {
            a.metadata
                .file_path
                .cmp(&b.metadata.file_path)
                .then(a.metadata.chunk_index.cmp(&b.metadata.chunk_index))
        });
        matching
    }

    async fn retrieve(&self, question: &str, limit: usize) -> anyhow::Result<Vec<ScoredRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(question).await?;
        let nodes = self.store.query(&vector, limit).await?;
        Ok(exclude_deployment_files(nodes))
    }
}

fn join_texts(records: &[StoredRecord], separator: &str) -> String {
    records
        .iter()
        .map(|record| record.text.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}

fn unique_sources(records: &[StoredRecord], score: Option<f32>) -> Vec<Source> {
    let mut sources: Vec<Source> = Vec::new();
    for record in records {
        if !sources
            .iter()
            .any(|source| source.file_path == record.metadata.file_path)
        {
            sources.push(Source::new(record.metadata.file_path.clone(), score));
        }
    }
    sources
}
