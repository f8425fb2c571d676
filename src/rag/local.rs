use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::store::{rank_by_similarity, VectorStore};
use super::types::{ScoredRecord, StoredRecord, VectorRecord};

const STORE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    records: Vec<VectorRecord>,
}

/// Vector store held in memory and persisted as one JSON file per index directory.
pub struct LocalVectorStore {
    path: PathBuf,
    records: RwLock<BTreeMap<String, VectorRecord>>,
}

impl LocalVectorStore {
    pub const FILE_NAME: &'static str = "vectors.json";

    /// Opens the store for writing, creating the index directory when needed.
    pub fn open_or_create(index_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(index_dir)
            .with_context(|| format!("Failed to create index dir {}", index_dir.display()))?;
        let path = index_dir.join(Self::FILE_NAME);
        let records = if path.exists() {
            Self::load(&path)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Opens a previously persisted index; a missing store file is an error.
    pub fn open_existing(index_dir: &Path) -> anyhow::Result<Self> {
        let path = index_dir.join(Self::FILE_NAME);
        if !path.is_file() {
            bail!("No vector store found at {}", path.display());
        }
        let records = Self::load(&path)?;
        debug!(path = %path.display(), records = records.len(), "Loaded vector store");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// `open_existing` on the blocking pool, for async request paths.
    pub async fn load_existing(index_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::task::spawn_blocking(move || Self::open_existing(&index_dir))
            .await
            .context("Vector store load task failed")?
    }

    fn load(path: &Path) -> anyhow::Result<BTreeMap<String, VectorRecord>> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read vector store {}", path.display()))?;
        let file: StoreFile = serde_json::from_str(&raw)
            .with_context(|| format!("Vector store {} is corrupt", path.display()))?;
        if file.version != STORE_FORMAT_VERSION {
            bail!(
                "Vector store {} has unsupported version {}",
                path.display(),
                file.version
            );
        }
        Ok(file
            .records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> anyhow::Result<()> {
        let mut stored = self
            .records
            .write()
            .map_err(|_| anyhow!("local vector store lock poisoned"))?;
        for record in records {
            stored.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> anyhow::Result<Vec<ScoredRecord>> {
        let stored = self
            .records
            .read()
            .map_err(|_| anyhow!("local vector store lock poisoned"))?;
        Ok(rank_by_similarity(stored.values(), vector, top_k))
    }

    async fn get_all(&self) -> anyhow::Result<Vec<StoredRecord>> {
        let stored = self
            .records
            .read()
            .map_err(|_| anyhow!("local vector store lock poisoned"))?;
        Ok(stored.values().map(StoredRecord::from).collect())
    }

    async fn delete(&self, ids: &[String]) -> anyhow::Result<usize> {
        let mut stored = self
            .records
            .write()
            .map_err(|_| anyhow!("local vector store lock poisoned"))?;
        Ok(ids.iter().filter(|id| stored.remove(*id).is_some()).count())
    }

    async fn persist(&self) -> anyhow::Result<()> {
        let data = {
            let stored = self
                .records
                .read()
                .map_err(|_| anyhow!("local vector store lock poisoned"))?;
            let file = StoreFile {
                version: STORE_FORMAT_VERSION,
                records: stored.values().cloned().collect(),
            };
            serde_json::to_string(&file)?
        };

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &data))
            .await
            .context("Vector store write task failed")??;
        info!(path = %self.path.display(), records = self.len(), "Persisted vector store");
        Ok(())
    }
}

fn write_atomically(path: &Path, data: &str) -> anyhow::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
