use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use lampchat::console::StdConsole;
use lampchat::core::config::AppPaths;
use lampchat::core::logging;
use lampchat::knowledge::ChunkMetadata;
use lampchat::state::AppState;

/// Question answering about lamp products, backed by a local language model.
#[derive(Parser)]
#[command(name = "lampchat", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat on stdin/stdout (default)
    Chat {
        /// Write the session's records to this JSON file on exit
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Chunk, embed and store text documents
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Value for the chunks' `keywords` metadata
        #[arg(long)]
        keywords: Option<String>,
        /// Value for the chunks' `author` metadata
        #[arg(long)]
        author: Option<String>,
    },
    /// Add an expert's reply mail to the knowledge base
    IngestReply { reply: PathBuf },
    /// Show store statistics and the effective configuration
    Info,
    /// Generate questions from stored documents and grade the answers
    Evaluate {
        #[arg(long, default_value_t = 10)]
        samples: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let state = AppState::initialize(paths)
        .await
        .context("Failed to initialize lampchat")?;

    match cli.command.unwrap_or(Command::Chat { history: None }) {
        Command::Chat { history } => chat(&state, history).await,
        Command::Ingest {
            files,
            keywords,
            author,
        } => ingest(&state, &files, keywords, author).await,
        Command::IngestReply { reply } => {
            let doc = state
                .communication
                .resolve_expert_reply(&reply)
                .await
                .with_context(|| format!("Failed to ingest reply {}", reply.display()))?;
            println!("Added expert answer {} ({})", doc.id, doc.page_content);
            Ok(())
        }
        Command::Info => info(&state).await,
        Command::Evaluate { samples } => evaluate(&state, samples).await,
    }
}

async fn chat(state: &AppState, history_path: Option<PathBuf>) -> anyhow::Result<()> {
    if !state.llm.health_check().await.unwrap_or(false) {
        tracing::warn!("{} is not reachable at {}", state.llm.name(), state.settings.llm.base_url);
    }

    let mut console = StdConsole::new();
    let mut bot = state.chat_bot();
    let history = bot.run(&mut console).await.context("Chat aborted")?;

    if let Some(path) = history_path {
        let json = serde_json::to_string_pretty(&history)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write history to {}", path.display()))?;
    }
    Ok(())
}

async fn ingest(
    state: &AppState,
    files: &[PathBuf],
    keywords: Option<String>,
    author: Option<String>,
) -> anyhow::Result<()> {
    let chunker = state.chunker();
    let creation_date = chrono::Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S").to_string();

    for file in files {
        let text = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let metadata = ChunkMetadata {
            source: file.display().to_string(),
            author: author.clone(),
            keywords: keywords.clone(),
            creation_date: Some(creation_date.clone()),
            ..Default::default()
        };

        let chunks = chunker.chunk_document(&text, &metadata);
        let count = state
            .knowledge
            .add_documents(chunks)
            .await
            .with_context(|| format!("Failed to store chunks of {}", file.display()))?;
        tracing::info!("Ingested {} chunks from {}", count, file.display());
        println!("{}: {} chunks", file.display(), count);
    }
    Ok(())
}

async fn info(state: &AppState) -> anyhow::Result<()> {
    let summary = state.knowledge.describe().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let config = state.config.load_config()?;
    println!(
        "{}",
        serde_json::to_string_pretty(&state.config.redact_sensitive_values(&config))?
    );
    Ok(())
}

async fn evaluate(state: &AppState, samples: usize) -> anyhow::Result<()> {
    let report = state.evaluator().run(samples).await?;
    let path = report
        .write_to(&state.paths.user_data_dir.join("evaluations"))
        .await?;

    println!(
        "{} questions, mean correctness {}, {} escalations",
        report.items.len(),
        report
            .mean_correctness
            .map(|mean| format!("{:.2}", mean))
            .unwrap_or_else(|| "-".to_string()),
        report.escalation_count
    );
    println!("Report written to {}", path.display());
    Ok(())
}
