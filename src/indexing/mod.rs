pub mod builder;
pub mod chunker;
pub mod code_splitter;
pub mod language;
pub mod prose_splitter;
pub mod scanner;
pub mod summarizer;
pub mod summary_cache;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{AppConfig, IndexingConfig};
use crate::llm_client::{build_llm_client, SharedLlmClient};
use crate::rag::embed::{OpenAiEmbeddingsClient, SharedEmbeddings};
use crate::rag::local::LocalVectorStore;
use crate::rag::store::SharedVectorStore;

use builder::IndexBuilder;
use chunker::Chunker;
use scanner::{scan_repository, ScanRules};
use summarizer::FileSummarizer;
use summary_cache::SummaryCache;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub files: usize,
    pub chunks: usize,
    pub pruned: usize,
    pub summaries_generated: usize,
    pub summaries_cached: usize,
    pub summaries_failed: usize,
}

/// Scan, summarize, chunk and build, each stage handing a typed batch to the next.
pub struct IndexPipeline {
    rules: ScanRules,
    summarizer: FileSummarizer,
    chunker: Chunker,
    builder: IndexBuilder,
}

impl IndexPipeline {
    pub fn new(
        config: &IndexingConfig,
        batch_size: usize,
        llm: SharedLlmClient,
        embedder: SharedEmbeddings,
        store: SharedVectorStore,
    ) -> Self {
        Self {
            rules: ScanRules::from_config(config),
            summarizer: FileSummarizer::new(llm, config.summary_max_chars),
            chunker: Chunker::new(&config.chunking),
            builder: IndexBuilder::new(embedder, store, batch_size),
        }
    }

    #[instrument(skip_all, fields(repo = %repo.display()))]
    pub async fn run(&self, repo: &Path, cache: &mut SummaryCache) -> anyhow::Result<IndexReport> {
        let files = scan_repository(repo, &self.rules)?;
        let file_count = files.len();

        let (summarized, stats) = self.summarizer.summarize_all(files, cache).await?;
        let indexed_paths: HashSet<String> = summarized
            .iter()
            .map(|file| file.file.path_str())
            .collect();

        let chunks = self.chunker.chunk_all(&summarized);
        let chunk_count = chunks.len();
        let build = self.builder.build(chunks, &indexed_paths).await?;

        Ok(IndexReport {
            files: file_count,
            chunks: chunk_count,
            pruned: build.pruned,
            summaries_generated: stats.generated,
            summaries_cached: stats.cached,
            summaries_failed: stats.failed,
        })
    }
}

/// Indexes `repo` into `index_dir` with the configured backends.
pub async fn index_repository(
    config: &AppConfig,
    repo: &Path,
    index_dir: &Path,
) -> anyhow::Result<IndexReport> {
    let llm = build_llm_client(&config.llm.backend, config.llm.timeout);
    let embedder = OpenAiEmbeddingsClient::shared(&config.embedding);
    let store: SharedVectorStore = Arc::new(LocalVectorStore::open_or_create(index_dir)?);
    let mut cache = SummaryCache::load(&index_dir.join(SummaryCache::FILE_NAME));

    let pipeline = IndexPipeline::new(
        &config.indexing,
        config.embedding.batch_size,
        llm,
        embedder,
        store,
    );
    let report = pipeline.run(repo, &mut cache).await?;
    info!(
        files = report.files,
        chunks = report.chunks,
        pruned = report.pruned,
        index_dir = %index_dir.display(),
        "Indexed repository"
    );
    Ok(report)
}
