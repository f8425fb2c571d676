use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::orchestrator::router::Intent;
use crate::orchestrator::sources::Source;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub timestamp: DateTime<Utc>,
    pub index: String,
    pub question: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub mode: Intent,
    pub confidence: f32,
}

/// Write-once audit trail: one JSON file per answered question.
#[derive(Debug, Clone)]
pub struct AnswerHistory {
    dir: PathBuf,
}

impl AnswerHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes `record` to a new file and returns its path; existing files are never replaced.
    pub fn record(&self, record: &AnswerRecord) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create history dir {}", self.dir.display()))?;
        let data = serde_json::to_string_pretty(record)?;
        let stem = record.timestamp.format("%Y%m%d_%H%M%S_%6f").to_string();

        for attempt in 0..100u32 {
            let name = if attempt == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{attempt}.json")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(data.as_bytes())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    debug!(path = %path.display(), "Recorded answer");
                    return Ok(path);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(err).with_context(|| format!("Failed to create {}", path.display()))
                }
            }
        }
        anyhow::bail!("Too many history records share timestamp {stem}")
    }

    /// `record` on the blocking pool.
    pub async fn record_async(&self, record: AnswerRecord) -> anyhow::Result<PathBuf> {
        let history = self.clone();
        tokio::task::spawn_blocking(move || history.record(&record))
            .await
            .context("History write task failed")?
    }
}
