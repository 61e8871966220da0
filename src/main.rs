use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use kbsearch::{
    api, config, logging,
    processing::{KnowledgeBase, KnowledgeBaseApi},
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::net::TcpListener;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "kbsearch",
    version,
    about = "Retrieval-augmented question answering over your documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Index local files into a fresh knowledge base and answer one question.
    Ask {
        /// Files or directories to index; directories are walked recursively.
        #[arg(long = "docs", required = true, num_args = 1..)]
        docs: Vec<PathBuf>,
        /// Number of chunks to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
        /// Question to answer.
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing();

    let knowledge_base = Arc::new(KnowledgeBase::from_config(config).await?);
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(knowledge_base, config.server_port).await,
        Command::Ask {
            docs,
            top_k,
            question,
        } => ask(&knowledge_base, &docs, top_k, &question).await,
    }
}

async fn serve(knowledge_base: Arc<KnowledgeBase>, port: Option<u16>) -> Result<()> {
    let app = api::create_router(knowledge_base);
    let (listener, port) = bind_listener(port)
        .await
        .context("failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn ask(
    knowledge_base: &KnowledgeBase,
    docs: &[PathBuf],
    top_k: Option<usize>,
    question: &str,
) -> Result<()> {
    let files = collect_files(docs)?;
    if files.is_empty() {
        bail!("no files found under the supplied --docs paths");
    }

    let indexed = index_files(knowledge_base, &files).await;
    tracing::info!(indexed, found = files.len(), "Finished indexing");

    let answer = knowledge_base.ask(question, top_k).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&answer).context("failed to render answer")?
    );
    Ok(())
}

/// Index each file, skipping (with a warning) any that cannot be read or extracted.
///
/// Returns the number of files indexed.
async fn index_files(knowledge_base: &dyn KnowledgeBaseApi, files: &[PathBuf]) -> usize {
    let mut indexed = 0;
    for path in files {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(file = %path.display(), %error, "Skipping unreadable file");
                continue;
            }
        };
        let filename = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        match knowledge_base.ingest_file(&filename, &bytes).await {
            Ok(outcome) => {
                indexed += 1;
                tracing::info!(file = %path.display(), chunks = outcome.num_chunks, "Indexed")
            }
            Err(error) => tracing::warn!(file = %path.display(), %error, "Skipping file"),
        }
    }
    indexed
}

fn collect_files(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for root in roots {
        if !root.exists() {
            bail!("{} does not exist", root.display());
        }
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && !is_hidden(entry.path()))
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

async fn bind_listener(configured: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = configured {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8000..=8099;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8000-8099",
    ))
}
