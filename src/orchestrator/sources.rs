use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A cited file. `score` is absent for authoritative API documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub file_path: String,
    pub score: Option<f32>,
}

impl Source {
    pub fn new(file_path: impl Into<String>, score: Option<f32>) -> Self {
        Self {
            file_path: file_path.into(),
            score,
        }
    }
}

/// Authoritative sources first, then retrieved ones; the first entry per file path wins.
pub fn dedupe_sources(authoritative: Vec<Source>, retrieved: Vec<Source>) -> Vec<Source> {
    let mut seen = HashSet::new();
    authoritative
        .into_iter()
        .chain(retrieved)
        .filter(|source| seen.insert(source.file_path.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authoritative_entry_wins_over_retrieved_duplicate() {
        let merged = dedupe_sources(
            vec![Source::new("DOCUMENTATION.md", Some(1.0))],
            vec![
                Source::new("DOCUMENTATION.md", Some(0.8)),
                Source::new("src/a.py", Some(0.7)),
            ],
        );
        assert_eq!(
            merged,
            vec![
                Source::new("DOCUMENTATION.md", Some(1.0)),
                Source::new("src/a.py", Some(0.7)),
            ]
        );
    }

    #[test]
    fn retrieved_duplicates_collapse_to_first_seen() {
        let merged = dedupe_sources(
            Vec::new(),
            vec![
                Source::new("src/a.py", Some(0.9)),
                Source::new("src/b.py", Some(0.8)),
                Source::new("src/a.py", Some(0.5)),
            ],
        );
        let paths: Vec<&str> = merged.iter().map(|s| s.file_path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.py", "src/b.py"]);
        assert_eq!(merged[0].score, Some(0.9));
    }

    #[test]
    fn null_scores_serialize_as_null() {
        let json = serde_json::to_value(Source::new("swagger-json.json", None)).expect("json");
        assert!(json["score"].is_null());
    }
}
