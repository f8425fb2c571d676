use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail};
use async_trait::async_trait;

use super::embed::EmbeddingsProvider;
use super::store::{rank_by_similarity, VectorStore};
use super::types::{ScoredRecord, StoredRecord, VectorRecord};

/// In-memory store that keeps insertion order and counts calls.
#[derive(Default)]
pub struct MockVectorStore {
    records: Mutex<Vec<VectorRecord>>,
    persist_calls: AtomicUsize,
    query_calls: AtomicUsize,
    fail_reads: AtomicBool,
}

impl MockVectorStore {
    pub fn with_records(records: Vec<VectorRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Makes `get_all` and `query` fail from now on.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::Relaxed);
    }

    pub fn ids(&self) -> Vec<String> {
        self.records
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|record| record.id.clone())
            .collect()
    }

    pub fn records(&self) -> Vec<VectorRecord> {
        self.records.lock().expect("lock poisoned").clone()
    }

    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::Relaxed)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> anyhow::Result<()> {
        let mut stored = self
            .records
            .lock()
            .map_err(|_| anyhow!("mock vector store lock poisoned"))?;
        for record in records {
            match stored.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record,
                None => stored.push(record),
            }
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> anyhow::Result<Vec<ScoredRecord>> {
        self.query_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_reads.load(Ordering::Relaxed) {
            bail!("mock vector store read failure");
        }
        let stored = self
            .records
            .lock()
            .map_err(|_| anyhow!("mock vector store lock poisoned"))?;
        Ok(rank_by_similarity(stored.iter(), vector, top_k))
    }

    async fn get_all(&self) -> anyhow::Result<Vec<StoredRecord>> {
        if self.fail_reads.load(Ordering::Relaxed) {
            bail!("mock vector store read failure");
        }
        let stored = self
            .records
            .lock()
            .map_err(|_| anyhow!("mock vector store lock poisoned"))?;
        Ok(stored.iter().map(StoredRecord::from).collect())
    }

    async fn delete(&self, ids: &[String]) -> anyhow::Result<usize> {
        let mut stored = self
            .records
            .lock()
            .map_err(|_| anyhow!("mock vector store lock poisoned"))?;
        let before = stored.len();
        stored.retain(|record| !ids.contains(&record.id));
        Ok(before - stored.len())
    }

    async fn persist(&self) -> anyhow::Result<()> {
        self.persist_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Deterministic embedder: a normalized letter histogram of the text.
#[derive(Default)]
pub struct LetterEmbeddings {
    calls: AtomicUsize,
}

impl LetterEmbeddings {
    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; 26];
        for c in text.chars().filter(char::is_ascii_alphabetic) {
            vector[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        vector
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EmbeddingsProvider for LetterEmbeddings {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(Self::vector_for(text))
    }
}
