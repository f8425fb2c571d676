use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryCacheEntry {
    pub summary: String,
    pub mtime: f64,
}

/// File path -> summary, valid only while the file's mtime is unchanged.
#[derive(Debug)]
pub struct SummaryCache {
    path: PathBuf,
    entries: BTreeMap<String, SummaryCacheEntry>,
}

impl SummaryCache {
    pub const FILE_NAME: &'static str = "summary_cache.json";

    /// Loads the cache; a missing, unreadable or corrupt file yields an empty cache.
    pub fn load(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(path = %path.display(), ?err, "Ignoring corrupt summary cache");
                BTreeMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!(path = %path.display(), ?err, "Ignoring unreadable summary cache");
                BTreeMap::new()
            }
        };
        debug!(path = %path.display(), entries = entries.len(), "Loaded summary cache");

        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn get(&self, file_path: &str, current_mtime: f64) -> Option<&str> {
        self.entries
            .get(file_path)
            .filter(|entry| entry.mtime == current_mtime)
            .map(|entry| entry.summary.as_str())
    }

    pub fn put(&mut self, file_path: &str, summary: &str, mtime: f64) {
        self.entries.insert(
            file_path.to_string(),
            SummaryCacheEntry {
                summary: summary.to_string(),
                mtime,
            },
        );
    }

    /// Overwrites the cache file through a sibling temp file and a rename.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
