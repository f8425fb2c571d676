use anyhow::Context;
use tree_sitter::{Language as TsLanguage, Parser as TsParser};

use super::language::{declaration_node_kinds, tree_sitter_language, Language};

/// Line-window splitter for source code that prefers to cut at declaration starts.
#[derive(Debug, Clone)]
pub struct CodeSplitter {
    chunk_lines: usize,
    chunk_lines_overlap: usize,
    max_chars: usize,
}

impl CodeSplitter {
    pub fn new(chunk_lines: usize, chunk_lines_overlap: usize, max_chars: usize) -> Self {
        let chunk_lines = chunk_lines.max(1);
        Self {
            chunk_lines,
            chunk_lines_overlap: chunk_lines_overlap.min(chunk_lines - 1),
            max_chars: max_chars.max(1),
        }
    }

    pub fn split(&self, content: &str, language: Language, extension: &str) -> Vec<String> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let boundaries = tree_sitter_language(language, extension)
            .and_then(|grammar| {
                declaration_lines(content, &grammar, declaration_node_kinds(language)).ok()
            })
            .unwrap_or_default();

        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < lines.len() {
            let mut end = (start + self.chunk_lines).min(lines.len());

            if end < lines.len() {
                let earliest = start + self.chunk_lines / 2;
                if let Some(&boundary) = boundaries
                    .iter()
                    .rev()
                    .find(|&&line| line > earliest && line < end)
                {
                    end = boundary;
                }
            }

            while end > start + 1 && char_count(&lines[start..end]) > self.max_chars {
                end -= 1;
            }

            let text = lines[start..end].concat();
            let text = text.trim_end();
            if text.chars().count() > self.max_chars {
                chunks.extend(hard_split(text, self.max_chars));
            } else if !text.trim().is_empty() {
                chunks.push(text.to_string());
            }

            if end >= lines.len() {
                break;
            }
            let next = end.saturating_sub(self.chunk_lines_overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }
}

fn char_count(lines: &[&str]) -> usize {
    lines.iter().map(|line| line.chars().count()).sum()
}

fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect::<String>())
        .filter(|piece| !piece.trim().is_empty())
        .collect()
}

/// Zero-based start lines of declaration nodes, sorted and deduplicated.
pub(crate) fn declaration_lines(
    content: &str,
    grammar: &TsLanguage,
    kinds: &[&str],
) -> anyhow::Result<Vec<usize>> {
    let mut parser = TsParser::new();
    parser
        .set_language(grammar)
        .context("failed to set tree-sitter language")?;

    let tree = match parser.parse(content, None) {
        Some(t) => t,
        None => return Ok(Vec::new()),
    };

    let mut lines = Vec::new();
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if kinds.contains(&node.kind()) {
            lines.push(node.start_position().row);
        }

        for idx in 0..node.named_child_count() {
            if let Some(child) = node.named_child(idx) {
                stack.push(child);
            }
        }
    }

    lines.sort_unstable();
    lines.dedup();
    Ok(lines)
}
