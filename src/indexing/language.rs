use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tree_sitter::Language as TsLanguage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    TypeScript,
    JavaScript,
    Go,
    Java,
    Markdown,
    Json,
    Yaml,
    Unknown,
}

impl Language {
    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "py" => Self::Python,
            "ts" | "tsx" => Self::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "go" => Self::Go,
            "java" => Self::Java,
            "md" | "markdown" => Self::Markdown,
            "json" => Self::Json,
            "yml" | "yaml" => Self::Yaml,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Go => "go",
            Self::Java => "java",
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Unknown => "unknown",
        }
    }

    /// Code languages go through the line-window splitter; everything else is prose.
    pub fn is_code(self) -> bool {
        matches!(
            self,
            Self::Python | Self::TypeScript | Self::JavaScript | Self::Go | Self::Java
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase extension with its leading dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

pub(crate) fn tree_sitter_language(language: Language, extension: &str) -> Option<TsLanguage> {
    match language {
        Language::TypeScript if extension == ".tsx" => {
            Some(tree_sitter_typescript::LANGUAGE_TSX.into())
        }
        Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
        _ => None,
    }
}

pub(crate) fn declaration_node_kinds(language: Language) -> &'static [&'static str] {
    match language {
        Language::TypeScript | Language::JavaScript => &[
            "function_declaration",
            "method_definition",
            "class_declaration",
            "interface_declaration",
            "export_statement",
        ],
        Language::Python => &[
            "function_definition",
            "class_definition",
            "decorated_definition",
        ],
        Language::Go => &[
            "function_declaration",
            "method_declaration",
            "type_declaration",
        ],
        _ => &[],
    }
}
