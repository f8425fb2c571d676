use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Completion backend selected by `MODE`, carrying what that backend needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    /// OpenAI-compatible local server (Ollama exposes one under `/v1`).
    Local { base_url: String, model: String },
    OpenAi {
        api_key: String,
        model: String,
        base_url: Option<String>,
    },
    Claude { api_key: String, model: String },
    Echo,
}

impl LlmBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::OpenAi { .. } => "openai",
            Self::Claude { .. } => "claude",
            Self::Echo => "echo",
        }
    }

    /// Same backend and credentials, different model; echo has no model to swap.
    pub fn with_model(&self, model: &str) -> Self {
        let mut backend = self.clone();
        match &mut backend {
            Self::Local { model: current, .. }
            | Self::OpenAi { model: current, .. }
            | Self::Claude { model: current, .. } => *current = model.to_string(),
            Self::Echo => {}
        }
        backend
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    /// Backend used for question classification; `ROUTER_MODEL` swaps only the model.
    pub router_backend: LlmBackend,
    pub timeout: Duration,
    pub router_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub batch_size: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_lines: usize,
    pub chunk_lines_overlap: usize,
    pub max_chars: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_lines: 40,
            chunk_lines_overlap: 15,
            max_chars: 1500,
            chunk_size: 1024,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexingConfig {
    pub extensions: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub exclude_suffixes: Vec<String>,
    pub summary_max_chars: usize,
    pub chunking: ChunkingConfig,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            extensions: to_owned(&[
                ".py", ".ts", ".tsx", ".js", ".jsx", ".go", ".java", ".md", ".json", ".yml",
                ".yaml",
            ]),
            exclude_dirs: to_owned(&[
                ".git",
                "node_modules",
                "dist",
                "build",
                ".next",
                ".venv",
                "__pycache__",
            ]),
            exclude_suffixes: to_owned(&[
                ".module.ts",
                ".enum.ts",
                ".enum.js",
                ".dto.ts",
                ".dto.js",
            ]),
            summary_max_chars: 4000,
            chunking: ChunkingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    pub similarity_top_k: usize,
    /// Retrieval limit when authoritative documents carry the answer.
    pub authoritative_retrieval_cap: usize,
    pub router_confidence_threshold: f32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            similarity_top_k: 12,
            authoritative_retrieval_cap: 2,
            router_confidence_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub indexing: IndexingConfig,
    pub query: QueryConfig,
    pub indexes_dir: PathBuf,
    pub history_dir: PathBuf,
    pub bind_addr: String,
    pub expose_errors: bool,
}

impl AppConfig {
    const MODE_VARS: [&'static str; 2] = ["MODE", "REPO_QA_MODE"];
    const OLLAMA_BASE_URL_VARS: [&'static str; 1] = ["OLLAMA_BASE_URL"];
    const LLM_MODEL_VARS: [&'static str; 1] = ["LLM_MODEL"];
    const ROUTER_MODEL_VARS: [&'static str; 1] = ["ROUTER_MODEL"];
    const LLM_TIMEOUT_VARS: [&'static str; 1] = ["LLM_TIMEOUT"];
    const ROUTER_TIMEOUT_VARS: [&'static str; 1] = ["ROUTER_TIMEOUT"];
    const OPENAI_KEY_VARS: [&'static str; 1] = ["OPENAI_API_KEY"];
    const OPENAI_MODEL_VARS: [&'static str; 1] = ["OPENAI_MODEL"];
    const OPENAI_BASE_URL_VARS: [&'static str; 1] = ["OPENAI_BASE_URL"];
    const CLAUDE_KEY_VARS: [&'static str; 2] = ["CLAUDE_API_KEY", "ANTHROPIC_API_KEY"];
    const CLAUDE_MODEL_VARS: [&'static str; 1] = ["CLAUDE_MODEL"];
    const EMBEDDING_MODEL_VARS: [&'static str; 1] = ["EMBEDDING_MODEL"];
    const EMBEDDING_BASE_URL_VARS: [&'static str; 1] = ["EMBEDDING_BASE_URL"];
    const EMBEDDING_KEY_VARS: [&'static str; 1] = ["EMBEDDING_API_KEY"];
    const TOP_K_VARS: [&'static str; 1] = ["SIMILARITY_TOP_K"];
    const THRESHOLD_VARS: [&'static str; 1] = ["ROUTER_CONFIDENCE_THRESHOLD"];
    const INDEXES_DIR_VARS: [&'static str; 2] = ["INDEXES_DIR", "REPO_QA_INDEXES_DIR"];
    const HISTORY_DIR_VARS: [&'static str; 2] = ["HISTORY_DIR", "REPO_QA_HISTORY_DIR"];
    const BIND_VARS: [&'static str; 1] = ["REPO_QA_BIND"];
    const EXPOSE_ERRORS_VARS: [&'static str; 1] = ["REPO_QA_EXPOSE_ERRORS"];

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |candidates: &[&'static str]| read_env(&lookup, candidates);

        let ollama_base_url = read(&Self::OLLAMA_BASE_URL_VARS)
            .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string());
        let ollama_base_url = ollama_base_url.trim_end_matches('/').to_string();

        let backend = match read(&Self::MODE_VARS)
            .unwrap_or_else(|| "ollama".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "ollama" | "local" => LlmBackend::Local {
                base_url: format!("{ollama_base_url}/v1"),
                model: read(&Self::LLM_MODEL_VARS)
                    .unwrap_or_else(|| "qwen2.5:14b-instruct".to_string()),
            },
            "openai" => LlmBackend::OpenAi {
                api_key: read(&Self::OPENAI_KEY_VARS)
                    .context("MODE=openai but OPENAI_API_KEY is not set")?,
                model: read(&Self::OPENAI_MODEL_VARS).unwrap_or_else(|| "gpt-4o-mini".to_string()),
                base_url: read(&Self::OPENAI_BASE_URL_VARS),
            },
            "claude" => LlmBackend::Claude {
                api_key: read(&Self::CLAUDE_KEY_VARS)
                    .context("MODE=claude but CLAUDE_API_KEY is not set")?,
                model: read(&Self::CLAUDE_MODEL_VARS)
                    .unwrap_or_else(|| "claude-3-5-sonnet-20240620".to_string()),
            },
            "echo" => LlmBackend::Echo,
            other => bail!("Unknown MODE '{other}'. Use ollama, openai, claude or echo."),
        };

        let router_backend = match read(&Self::ROUTER_MODEL_VARS) {
            Some(model) => backend.with_model(model.trim()),
            None => backend.clone(),
        };

        let timeout = parse_seconds(read(&Self::LLM_TIMEOUT_VARS), 120.0, "LLM_TIMEOUT")?;
        let router_timeout =
            parse_seconds(read(&Self::ROUTER_TIMEOUT_VARS), 30.0, "ROUTER_TIMEOUT")?;

        let embedding = EmbeddingConfig {
            api_key: read(&Self::EMBEDDING_KEY_VARS).unwrap_or_else(|| "ollama".to_string()),
            base_url: read(&Self::EMBEDDING_BASE_URL_VARS)
                .or_else(|| Some(format!("{ollama_base_url}/v1"))),
            model: read(&Self::EMBEDDING_MODEL_VARS)
                .unwrap_or_else(|| "nomic-embed-text".to_string()),
            batch_size: 32,
            timeout,
        };

        let mut query = QueryConfig::default();
        if let Some(raw) = read(&Self::TOP_K_VARS) {
            query.similarity_top_k = raw
                .trim()
                .parse()
                .with_context(|| format!("SIMILARITY_TOP_K must be an integer, got '{raw}'"))?;
        }
        if let Some(raw) = read(&Self::THRESHOLD_VARS) {
            let threshold: f32 = raw.trim().parse().with_context(|| {
                format!("ROUTER_CONFIDENCE_THRESHOLD must be a number, got '{raw}'")
            })?;
            if !(0.0..=1.0).contains(&threshold) {
                bail!("ROUTER_CONFIDENCE_THRESHOLD must be within [0, 1], got {threshold}");
            }
            query.router_confidence_threshold = threshold;
        }

        Ok(Self {
            llm: LlmConfig {
                backend,
                router_backend,
                timeout,
                router_timeout,
            },
            embedding,
            indexing: IndexingConfig::default(),
            query,
            indexes_dir: read(&Self::INDEXES_DIR_VARS)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("indexes")),
            history_dir: read(&Self::HISTORY_DIR_VARS)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("history")),
            bind_addr: read(&Self::BIND_VARS).unwrap_or_else(|| "127.0.0.1:8000".to_string()),
            expose_errors: read(&Self::EXPOSE_ERRORS_VARS)
                .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

fn read_env<F>(lookup: &F, candidates: &[&'static str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    candidates
        .iter()
        .find_map(|key| lookup(key))
        .filter(|value| !value.trim().is_empty())
}

fn parse_seconds(raw: Option<String>, default: f64, name: &str) -> anyhow::Result<Duration> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs_f64(default));
    };
    let secs: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{name} must be a number of seconds, got '{raw}'"))?;
    if !secs.is_finite() || secs <= 0.0 {
        bail!("{name} must be positive, got {secs}");
    }
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("{name} is out of range, got {secs}"))
}

fn to_owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
