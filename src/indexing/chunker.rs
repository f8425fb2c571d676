use tracing::debug;

use super::code_splitter::CodeSplitter;
use super::prose_splitter::ProseSplitter;
use super::summarizer::SummarizedFile;
use crate::config::ChunkingConfig;
use crate::indexing::language::Language;
use crate::rag::types::ChunkMetadata;

/// Chunk ready for embedding: enriched text plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

pub fn chunk_id(file_path: &str, chunk_index: usize) -> String {
    format!("{file_path}#chunk-{chunk_index}")
}

pub struct Chunker {
    code: CodeSplitter,
    prose: ProseSplitter,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            code: CodeSplitter::new(
                config.chunk_lines,
                config.chunk_lines_overlap,
                config.max_chars,
            ),
            prose: ProseSplitter::new(config.chunk_size, config.chunk_overlap),
        }
    }

    pub fn split(&self, content: &str, language: Language, extension: &str) -> Vec<String> {
        if language.is_code() {
            self.code.split(content, language, extension)
        } else {
            self.prose.split(content)
        }
    }

    pub fn chunk_file(&self, summarized: &SummarizedFile) -> Vec<PreparedChunk> {
        let file = &summarized.file;
        let file_path = file.path_str();
        let summary = summarized.summary.trim();
        let file_summary = (!summary.is_empty()).then(|| summary.to_string());

        let pieces = self.split(&file.content, file.language, &file.extension);
        debug!(path = %file_path, chunks = pieces.len(), "Chunked file");

        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, piece)| {
                let text = match &file_summary {
                    Some(summary) => with_file_header(
                        &file_path,
                        file.language,
                        &file.extension,
                        summary,
                        &piece,
                    ),
                    None => piece,
                };
                PreparedChunk {
                    id: chunk_id(&file_path, chunk_index),
                    text,
                    metadata: ChunkMetadata {
                        file_path: file_path.clone(),
                        file_name: file.file_name(),
                        language: file.language,
                        file_extension: file.extension.clone(),
                        chunk_index,
                        file_summary: file_summary.clone(),
                    },
                }
            })
            .collect()
    }

    pub fn chunk_all(&self, files: &[SummarizedFile]) -> Vec<PreparedChunk> {
        files.iter().flat_map(|file| self.chunk_file(file)).collect()
    }
}

fn with_file_header(
    file_path: &str,
    language: Language,
    extension: &str,
    summary: &str,
    chunk: &str,
) -> String {
    let extension = if extension.is_empty() { "none" } else { extension };
    format!(
        "File: {file_path}\nLanguage: {language}\nExtension: {extension}\n\nSummary:\n{summary}\n\n---\n\n{chunk}"
    )
}
