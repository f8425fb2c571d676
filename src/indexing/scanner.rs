use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::language::{extension_of, Language};
use crate::config::IndexingConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryFile {
    pub path: PathBuf,
    pub language: Language,
    pub extension: String,
    /// Seconds since the Unix epoch.
    pub mtime: f64,
    pub content: String,
}

impl RepositoryFile {
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ScanRules {
    extensions: Vec<String>,
    exclude_dirs: Vec<String>,
    exclude_suffixes: Vec<String>,
}

impl ScanRules {
    pub fn from_config(config: &IndexingConfig) -> Self {
        Self {
            extensions: config
                .extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
            exclude_dirs: config.exclude_dirs.clone(),
            exclude_suffixes: config
                .exclude_suffixes
                .iter()
                .map(|suffix| suffix.to_ascii_lowercase())
                .collect(),
        }
    }

    fn skip_entry(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            return true;
        }
        entry.file_type().is_dir() && self.exclude_dirs.iter().any(|dir| *dir == name)
    }

    fn accepts_file(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if self
            .exclude_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()))
        {
            return false;
        }
        let extension = extension_of(path);
        !extension.is_empty() && self.extensions.contains(&extension)
    }
}

/// Walks `root` and loads every indexable file, sorted by path.
pub fn scan_repository(root: &Path, rules: &ScanRules) -> anyhow::Result<Vec<RepositoryFile>> {
    if !root.is_dir() {
        bail!("Repository root {} is not a directory", root.display());
    }
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", root.display()))?;

    let mut files = Vec::new();
    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !rules.skip_entry(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(?err, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !rules.accepts_file(entry.path()) {
            continue;
        }

        match load_file(entry.path()) {
            Ok(file) => files.push(file),
            Err(err) => warn!(path = %entry.path().display(), ?err, "Skipping file"),
        }
    }

    if files.is_empty() {
        bail!("No indexable files found under {}", root.display());
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    info!(root = %root.display(), files = files.len(), "Scanned repository");
    Ok(files)
}

fn load_file(path: &Path) -> anyhow::Result<RepositoryFile> {
    let metadata = fs::metadata(path).context("Failed to stat file")?;
    let content = fs::read_to_string(path).context("File is not valid UTF-8 text")?;
    let extension = extension_of(path);
    debug!(path = %path.display(), bytes = content.len(), "Loaded file");

    Ok(RepositoryFile {
        path: path.to_path_buf(),
        language: Language::from_extension(&extension),
        extension,
        mtime: file_mtime(&metadata).unwrap_or(0.0),
        content,
    })
}

pub fn file_mtime(meta: &fs::Metadata) -> Option<f64> {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
}
