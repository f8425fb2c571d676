use serde::{Deserialize, Serialize};

use crate::indexing::language::Language;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub file_name: String,
    pub language: Language,
    pub file_extension: String,
    pub chunk_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_summary: Option<String>,
}

/// A chunk as it is written to the store, vector included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk as it is read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: StoredRecord,
    pub score: f32,
}

impl ScoredRecord {
    pub fn file_path(&self) -> &str {
        &self.record.metadata.file_path
    }
}

impl From<&VectorRecord> for StoredRecord {
    fn from(record: &VectorRecord) -> Self {
        Self {
            id: record.id.clone(),
            text: record.text.clone(),
            metadata: record.metadata.clone(),
        }
    }
}
