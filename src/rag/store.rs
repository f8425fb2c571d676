use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

use super::types::{ScoredRecord, StoredRecord, VectorRecord};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or overwrites records by id.
    async fn upsert(&self, records: Vec<VectorRecord>) -> anyhow::Result<()>;
    /// Top `top_k` records by cosine similarity, best first.
    async fn query(&self, vector: &[f32], top_k: usize) -> anyhow::Result<Vec<ScoredRecord>>;
    async fn get_all(&self) -> anyhow::Result<Vec<StoredRecord>>;
    /// Removes the given ids and returns how many existed.
    async fn delete(&self, ids: &[String]) -> anyhow::Result<usize>;
    async fn persist(&self) -> anyhow::Result<()>;
}

pub type SharedVectorStore = Arc<dyn VectorStore>;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Scores every record against `vector` and keeps the best `top_k`; ties break on id.
pub fn rank_by_similarity<'a>(
    records: impl Iterator<Item = &'a VectorRecord>,
    vector: &[f32],
    top_k: usize,
) -> Vec<ScoredRecord> {
    let mut scored: Vec<ScoredRecord> = records
        .map(|record| ScoredRecord {
            score: cosine_similarity(&record.vector, vector),
            record: StoredRecord::from(record),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let score = cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_degenerate_input() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
