use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use thiserror::Error;

use crate::rag::local::LocalVectorStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexLookupError {
    #[error("Index name is required")]
    EmptyName,
    #[error("Invalid index name")]
    InvalidName,
    #[error("Invalid index path")]
    OutsideRoot,
    #[error("Index '{0}' not found")]
    NotFound(String),
}

/// Accepts a single plain path component; rejects absolute paths and traversal.
pub fn validate_index_name(name: &str) -> Result<&str, IndexLookupError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(IndexLookupError::EmptyName);
    }

    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(component)), None) if component == name => Ok(name),
        _ => Err(IndexLookupError::InvalidName),
    }
}

pub fn is_complete_index(dir: &Path) -> bool {
    dir.join(LocalVectorStore::FILE_NAME).is_file()
}

/// Resolves `name` to an existing, complete index directory under `root`.
pub fn resolve_index_path(root: &Path, name: &str) -> Result<PathBuf, IndexLookupError> {
    let name = validate_index_name(name)?;
    let not_found = || IndexLookupError::NotFound(name.to_string());

    let root = root.canonicalize().map_err(|_| not_found())?;
    let candidate = root.join(name).canonicalize().map_err(|_| not_found())?;
    if !candidate.starts_with(&root) {
        return Err(IndexLookupError::OutsideRoot);
    }
    if !candidate.is_dir() || !is_complete_index(&candidate) {
        return Err(not_found());
    }
    Ok(candidate)
}

/// Names of complete, non-hidden index directories under `root`, sorted.
pub fn list_indexes(root: &Path) -> anyhow::Result<Vec<String>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("Failed to list {}", root.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() && is_complete_index(&path) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn temp_root(label: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "repo-qa-{label}-{}",
            Utc::now().timestamp_nanos_opt().unwrap_or(0)
        ));
        fs::create_dir_all(&root).expect("create root");
        root
    }

    fn make_index(root: &Path, name: &str, complete: bool) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).expect("create index dir");
        if complete {
            fs::write(dir.join(LocalVectorStore::FILE_NAME), "{}").expect("write marker");
        }
    }

    #[test]
    fn names_with_traversal_or_separators_are_rejected() {
        assert_eq!(validate_index_name("  "), Err(IndexLookupError::EmptyName));
        assert_eq!(validate_index_name("../etc"), Err(IndexLookupError::InvalidName));
        assert_eq!(validate_index_name(".."), Err(IndexLookupError::InvalidName));
        assert_eq!(validate_index_name("."), Err(IndexLookupError::InvalidName));
        assert_eq!(validate_index_name("/abs"), Err(IndexLookupError::InvalidName));
        assert_eq!(validate_index_name("a/b"), Err(IndexLookupError::InvalidName));
        assert_eq!(validate_index_name("a/"), Err(IndexLookupError::InvalidName));
        assert_eq!(validate_index_name(" payments "), Ok("payments"));
    }

    #[test]
    fn resolution_requires_a_complete_index() {
        let root = temp_root("indexes-resolve");
        make_index(&root, "payments", true);
        make_index(&root, "half-built", false);

        let resolved = resolve_index_path(&root, "payments").expect("resolve");
        assert!(resolved.ends_with("payments"));
        assert_eq!(
            resolve_index_path(&root, "half-built"),
            Err(IndexLookupError::NotFound("half-built".to_string()))
        );
        assert_eq!(
            resolve_index_path(&root, "missing"),
            Err(IndexLookupError::NotFound("missing".to_string()))
        );
        assert_eq!(
            resolve_index_path(&root, "../payments"),
            Err(IndexLookupError::InvalidName)
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_escaping_the_root_are_rejected() {
        let root = temp_root("indexes-symlink-root");
        let outside = temp_root("indexes-symlink-outside");
        make_index(&outside, "secret", true);
        std::os::unix::fs::symlink(outside.join("secret"), root.join("escape")).expect("symlink");

        assert_eq!(
            resolve_index_path(&root, "escape"),
            Err(IndexLookupError::OutsideRoot)
        );

        let _ = fs::remove_dir_all(&root);
        let _ = fs::remove_dir_all(&outside);
    }

    #[test]
    fn listing_reports_only_complete_visible_indexes() {
        let root = temp_root("indexes-list");
        make_index(&root, "zeta", true);
        make_index(&root, "alpha", true);
        make_index(&root, "partial", false);
        make_index(&root, ".hidden", true);
        fs::write(root.join("stray.txt"), "x").expect("write stray file");

        assert_eq!(list_indexes(&root).expect("list"), vec!["alpha", "zeta"]);
        assert!(list_indexes(&root.join("nope")).expect("missing root").is_empty());

        let _ = fs::remove_dir_all(&root);
    }
}
