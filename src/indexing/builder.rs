use std::collections::HashSet;

use anyhow::{bail, Context};
use tracing::{info, instrument};

use super::chunker::PreparedChunk;
use crate::rag::embed::SharedEmbeddings;
use crate::rag::store::SharedVectorStore;
use crate::rag::types::VectorRecord;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub upserted: usize,
    pub pruned: usize,
}

/// Embeds prepared chunks and writes them to the vector store.
pub struct IndexBuilder {
    embedder: SharedEmbeddings,
    store: SharedVectorStore,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(embedder: SharedEmbeddings, store: SharedVectorStore, batch_size: usize) -> Self {
        Self {
            embedder,
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Upserts `chunks`, then drops ids left over from earlier runs of the files in
    /// `indexed_paths`, then persists the store.
    #[instrument(skip_all, fields(chunks = chunks.len()))]
    pub async fn build(
        &self,
        chunks: Vec<PreparedChunk>,
        indexed_paths: &HashSet<String>,
    ) -> anyhow::Result<BuildReport> {
        let current_ids: HashSet<&str> = chunks.iter().map(|chunk| chunk.id.as_str()).collect();
        let stale: Vec<String> = self
            .store
            .get_all()
            .await
            .context("Failed to list existing chunks")?
            .into_iter()
            .filter(|record| {
                indexed_paths.contains(&record.metadata.file_path)
                    && !current_ids.contains(record.id.as_str())
            })
            .map(|record| record.id)
            .collect();

        let mut report = BuildReport::default();
        for (batch_idx, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .with_context(|| format!("Embedding batch {batch_idx} failed"))?;
            if vectors.len() != batch.len() {
                bail!(
                    "Embedding batch {batch_idx} returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }

            let records = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| VectorRecord {
                    id: chunk.id.clone(),
                    vector,
                    text: chunk.text.clone(),
                    metadata: chunk.metadata.clone(),
                })
                .collect::<Vec<_>>();
            report.upserted += records.len();
            self.store.upsert(records).await?;
        }

        if !stale.is_empty() {
            report.pruned = self.store.delete(&stale).await?;
        }
        self.store.persist().await.context("Failed to persist index")?;

        info!(
            upserted = report.upserted,
            pruned = report.pruned,
            "Index build complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::chunker::chunk_id;
    use crate::indexing::language::Language;
    use crate::rag::mock::{LetterEmbeddings, MockVectorStore};
    use crate::rag::types::ChunkMetadata;
    use std::sync::Arc;

    fn chunk(path: &str, idx: usize, text: &str) -> PreparedChunk {
        PreparedChunk {
            id: chunk_id(path, idx),
            text: text.to_string(),
            metadata: ChunkMetadata {
                file_path: path.to_string(),
                file_name: path.rsplit('/').next().unwrap_or(path).to_string(),
                language: Language::Python,
                file_extension: ".py".to_string(),
                chunk_index: idx,
                file_summary: None,
            },
        }
    }

    fn paths(items: &[&str]) -> HashSet<String> {
        items.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn batches_are_embedded_and_persisted_once() {
        let store = Arc::new(MockVectorStore::default());
        let embedder = Arc::new(LetterEmbeddings::default());
        let builder = IndexBuilder::new(embedder.clone(), store.clone(), 2);

        let chunks = (0..5).map(|i| chunk("/r/a.py", i, "alpha")).collect();
        let report = builder
            .build(chunks, &paths(&["/r/a.py"]))
            .await
            .expect("build");

        assert_eq!(report.upserted, 5);
        assert_eq!(store.ids().len(), 5);
        assert_eq!(embedder.calls(), 5);
        assert_eq!(store.persist_calls(), 1);
    }

    #[tokio::test]
    async fn rebuilding_overwrites_and_prunes_stale_chunks() {
        let store = Arc::new(MockVectorStore::default());
        let builder = IndexBuilder::new(Arc::new(LetterEmbeddings::default()), store.clone(), 32);

        builder
            .build(
                vec![
                    chunk("/r/a.py", 0, "one"),
                    chunk("/r/a.py", 1, "two"),
                    chunk("/r/b.py", 0, "other"),
                ],
                &paths(&["/r/a.py", "/r/b.py"]),
            )
            .await
            .expect("first build");

        let report = builder
            .build(vec![chunk("/r/a.py", 0, "one again")], &paths(&["/r/a.py"]))
            .await
            .expect("second build");

        assert_eq!(report.pruned, 1);
        let mut ids = store.ids();
        ids.sort();
        assert_eq!(ids, vec!["/r/a.py#chunk-0", "/r/b.py#chunk-0"]);
        let texts: Vec<String> = store.records().into_iter().map(|r| r.text).collect();
        assert!(texts.contains(&"one again".to_string()));
    }
}
