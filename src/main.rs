mod config;
mod history;
mod indexes;
mod indexing;
mod llm_client;
mod orchestrator;
mod rag;
mod server;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::AppConfig;
use orchestrator::{AskResponse, QaService};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "repo-qa",
    about = "Index source repositories and answer questions about them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan, summarize, chunk and embed a repository into an index directory.
    Index {
        /// Repository root to index.
        repo: PathBuf,
        /// Directory that receives the vector store and summary cache.
        index_dir: PathBuf,
    },
    /// Ask a question against an index (a name under INDEXES_DIR or a directory path).
    Ask {
        index: String,
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// List complete indexes under INDEXES_DIR.
    Indexes,
    /// Serve the JSON HTTP API.
    Serve {
        /// Address to bind, overriding REPO_QA_BIND.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    let config = Arc::new(AppConfig::from_env().context("Invalid configuration")?);

    match cli.command {
        Commands::Index { repo, index_dir } => {
            let report = indexing::index_repository(&config, &repo, &index_dir).await?;
            println!(
                "Indexed {} files into {} chunks at {} ({} stale chunks pruned, {} summaries generated, {} reused, {} failed)",
                report.files,
                report.chunks,
                index_dir.display(),
                report.pruned,
                report.summaries_generated,
                report.summaries_cached,
                report.summaries_failed,
            );
        }
        Commands::Ask { index, question } => {
            let service = QaService::from_config(config.clone());
            let question = question.join(" ");
            let response = run_ask(&service, &index, &question).await.map_err(|err| {
                error!(?err, "Question failed");
                err
            })?;
            print_response(&response);
        }
        Commands::Indexes => {
            for name in indexes::list_indexes(&config.indexes_dir)? {
                println!("{name}");
            }
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.bind_addr.clone());
            let service = Arc::new(QaService::from_config(config.clone()));
            server::run_server(service, &bind).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

async fn run_ask(service: &QaService, index: &str, question: &str) -> anyhow::Result<AskResponse> {
    let path = Path::new(index);
    let result = if indexes::is_complete_index(path) {
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| index.to_string());
        service.ask_at(path, &label, question).await
    } else {
        service.ask(index, question).await
    };
    result.map_err(anyhow::Error::from)
}

fn print_response(response: &AskResponse) {
    println!(
        "\nMode: {} (confidence {:.2})\n",
        response.mode, response.confidence
    );
    println!("{}\n", response.answer);
    if response.sources.is_empty() {
        return;
    }
    println!("Sources:");
    for source in &response.sources {
        match source.score {
            Some(score) => println!("  - {} (score {:.3})", source.file_path, score),
            None => println!("  - {}", source.file_path),
        }
    }
}
