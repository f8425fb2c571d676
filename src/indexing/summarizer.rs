use std::collections::HashMap;

use anyhow::Context;
use tracing::{info, instrument, warn};

use super::scanner::RepositoryFile;
use super::summary_cache::SummaryCache;
use crate::llm_client::SharedLlmClient;

pub const EMPTY_FILE_SUMMARY: &str = "Empty file.";
pub const FAILED_SUMMARY: &str = "Summary failed.";

#[derive(Debug, Clone, PartialEq)]
pub struct SummarizedFile {
    pub file: RepositoryFile,
    pub summary: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SummaryStats {
    pub generated: usize,
    pub cached: usize,
    pub failed: usize,
    pub empty: usize,
}

pub struct FileSummarizer {
    llm: SharedLlmClient,
    max_input_chars: usize,
}

impl FileSummarizer {
    pub fn new(llm: SharedLlmClient, max_input_chars: usize) -> Self {
        Self {
            llm,
            max_input_chars,
        }
    }

    /// Summarizes every file, consulting and then saving `cache` once.
    #[instrument(skip_all, fields(files = files.len()))]
    pub async fn summarize_all(
        &self,
        files: Vec<RepositoryFile>,
        cache: &mut SummaryCache,
    ) -> anyhow::Result<(Vec<SummarizedFile>, SummaryStats)> {
        let mut stats = SummaryStats::default();
        let mut this_run: HashMap<String, String> = HashMap::new();
        let mut summarized = Vec::with_capacity(files.len());

        for file in files {
            let key = file.path_str();
            let summary = match this_run.get(&key) {
                Some(summary) => summary.clone(),
                None => {
                    let summary = self.summarize_one(&file, &key, cache, &mut stats).await;
                    this_run.insert(key, summary.clone());
                    summary
                }
            };
            summarized.push(SummarizedFile { file, summary });
        }

        cache.save().context("Failed to save summary cache")?;
        info!(
            generated = stats.generated,
            cached = stats.cached,
            failed = stats.failed,
            empty = stats.empty,
            cache_entries = cache.len(),
            "Summarized files"
        );
        Ok((summarized, stats))
    }

    async fn summarize_one(
        &self,
        file: &RepositoryFile,
        key: &str,
        cache: &mut SummaryCache,
        stats: &mut SummaryStats,
    ) -> String {
        if file.content.is_empty() {
            stats.empty += 1;
            return EMPTY_FILE_SUMMARY.to_string();
        }

        if let Some(hit) = cache.get(key, file.mtime) {
            stats.cached += 1;
            return hit.to_string();
        }

        let prompt = summary_prompt(
            key,
            file.language.as_str(),
            truncate_chars(&file.content, self.max_input_chars),
        );
        match self.llm.complete(&prompt).await {
            Ok(reply) => {
                let summary = reply.trim().to_string();
                cache.put(key, &summary, file.mtime);
                stats.generated += 1;
                summary
            }
            Err(err) => {
                warn!(path = key, ?err, "File summary failed");
                stats.failed += 1;
                FAILED_SUMMARY.to_string()
            }
        }
    }
}

fn summary_prompt(path: &str, language: &str, content: &str) -> String {
    format!(
        "Summarize this source file so it can be found by semantic search.\n\
         - Write 3 to 5 bullet points, at most 80 words in total.\n\
         - Name the file's main responsibilities and its key functions, classes or types.\n\
         - Reply with the bullets only, no preamble.\n\n\
         File: {path}\n\
         Language: {language}\n\
         ---\n\
         {content}\n\
         ---\n\
         Summary:"
    )
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::language::Language;
    use crate::llm_client::scripted::ScriptedLlmClient;
    use chrono::Utc;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn cache_path(label: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!(
                "repo-qa-{label}-{}",
                Utc::now().timestamp_nanos_opt().unwrap_or(0)
            ))
            .join(SummaryCache::FILE_NAME)
    }

    fn file(path: &str, content: &str, mtime: f64) -> RepositoryFile {
        RepositoryFile {
            path: PathBuf::from(path),
            language: Language::Python,
            extension: ".py".to_string(),
            mtime,
            content: content.to_string(),
        }
    }

    fn cleanup(path: &std::path::Path) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[tokio::test]
    async fn cache_hit_skips_completion() {
        let path = cache_path("summarize-hit");
        let mut cache = SummaryCache::load(&path);
        cache.put("/repo/a.py", "- cached summary", 5.0);

        let llm = Arc::new(ScriptedLlmClient::new());
        let summarizer = FileSummarizer::new(llm.clone(), 4000);
        let (out, stats) = summarizer
            .summarize_all(vec![file("/repo/a.py", "x = 1", 5.0)], &mut cache)
            .await
            .expect("summarize");

        assert_eq!(out[0].summary, "- cached summary");
        assert_eq!(llm.calls(), 0);
        assert_eq!(stats.cached, 1);
        cleanup(&path);
    }

    #[tokio::test]
    async fn stale_entry_is_regenerated_and_recached() {
        let path = cache_path("summarize-stale");
        let mut cache = SummaryCache::load(&path);
        cache.put("/repo/a.py", "- old summary", 5.0);

        let llm = Arc::new(ScriptedLlmClient::new().reply_when("/repo/a.py", "  - new summary \n"));
        let summarizer = FileSummarizer::new(llm.clone(), 4000);
        let (out, _) = summarizer
            .summarize_all(vec![file("/repo/a.py", "x = 2", 6.0)], &mut cache)
            .await
            .expect("summarize");

        assert_eq!(out[0].summary, "- new summary");
        assert_eq!(llm.calls(), 1);
        assert_eq!(cache.get("/repo/a.py", 6.0), Some("- new summary"));

        let reloaded = SummaryCache::load(&path);
        assert_eq!(reloaded.get("/repo/a.py", 6.0), Some("- new summary"));
        cleanup(&path);
    }

    #[tokio::test]
    async fn failures_and_empty_files_use_placeholders_without_caching() {
        let path = cache_path("summarize-fail");
        let mut cache = SummaryCache::load(&path);

        let llm = Arc::new(
            ScriptedLlmClient::new()
                .fail_when("/repo/broken.py")
                .reply_when("/repo/ok.py", "- fine"),
        );
        let summarizer = FileSummarizer::new(llm.clone(), 4000);
        let (out, stats) = summarizer
            .summarize_all(
                vec![
                    file("/repo/broken.py", "def broken(): ...", 1.0),
                    file("/repo/empty.py", "", 1.0),
                    file("/repo/ok.py", "def ok(): ...", 1.0),
                ],
                &mut cache,
            )
            .await
            .expect("batch continues after a failure");

        let summaries: Vec<&str> = out.iter().map(|s| s.summary.as_str()).collect();
        assert_eq!(summaries, vec![FAILED_SUMMARY, EMPTY_FILE_SUMMARY, "- fine"]);
        assert_eq!(llm.calls(), 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.empty, 1);
        assert_eq!(cache.get("/repo/broken.py", 1.0), None);
        assert_eq!(cache.get("/repo/empty.py", 1.0), None);
        assert_eq!(cache.len(), 1);
        cleanup(&path);
    }

    #[tokio::test]
    async fn whitespace_only_file_is_still_summarized() {
        let path = cache_path("summarize-whitespace");
        let mut cache = SummaryCache::load(&path);
        let llm = Arc::new(ScriptedLlmClient::new().reply_when("/repo/blank.py", "- blank module"));
        let summarizer = FileSummarizer::new(llm.clone(), 4000);

        let (out, stats) = summarizer
            .summarize_all(vec![file("/repo/blank.py", "  \n", 1.0)], &mut cache)
            .await
            .expect("summarize");

        assert_eq!(out[0].summary, "- blank module");
        assert_eq!(llm.calls(), 1);
        assert_eq!(stats.empty, 0);
        cleanup(&path);
    }

    #[tokio::test]
    async fn duplicate_paths_are_summarized_once() {
        let path = cache_path("summarize-dup");
        let mut cache = SummaryCache::load(&path);
        let llm = Arc::new(ScriptedLlmClient::new().reply_when("/repo/a.py", "- a"));
        let summarizer = FileSummarizer::new(llm.clone(), 4000);

        let (out, _) = summarizer
            .summarize_all(
                vec![file("/repo/a.py", "a = 1", 1.0), file("/repo/a.py", "a = 1", 1.0)],
                &mut cache,
            )
            .await
            .expect("summarize");

        assert_eq!(out.len(), 2);
        assert_eq!(llm.calls(), 1);
        cleanup(&path);
    }

    #[tokio::test]
    async fn prompt_content_is_truncated() {
        let path = cache_path("summarize-truncate");
        let mut cache = SummaryCache::load(&path);
        let llm = Arc::new(ScriptedLlmClient::new());
        let summarizer = FileSummarizer::new(llm.clone(), 10);

        let content = format!("{}{}", "a".repeat(10), "TAILMARKER");
        summarizer
            .summarize_all(vec![file("/repo/long.py", &content, 1.0)], &mut cache)
            .await
            .expect("summarize");

        let prompts = llm.prompts();
        assert!(prompts[0].contains(&"a".repeat(10)));
        assert!(!prompts[0].contains("TAILMARKER"));
        cleanup(&path);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
