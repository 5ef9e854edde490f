//! # docchat CLI
//!
//! The `docchat` binary drives the two stages of the pipeline: ingestion
//! (`init`, `ingest`, `status`) and chat (`chat`).
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the SQLite database and run schema migrations |
//! | `docchat ingest` | Scan the documents folder, embed new and changed files |
//! | `docchat status` | Show per-status document counts |
//! | `docchat chat` | Interactive question answering over the corpus |
//! | `docchat chat -m "..."` | Answer a single message and exit |

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use docchat::chat::ChatOrchestrator;
use docchat::config::{self, Config};
use docchat::ingest::IngestionPipeline;
use docchat::intent::IntentClassifier;
use docchat::models::DocStatus;
use docchat::parse::ParserProvider;
use docchat::retrieval::RetrievalManager;
use docchat::store::MetadataStore;
use docchat::vector::VectorStore;
use docchat::{db, discover, embedding, llm, migrate};

/// docchat CLI — local-first document question answering.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat — local-first document ingestion and question answering",
    version,
    long_about = "docchat ingests a folder of documents (text, PDF, DOCX), chunks and embeds \
    them into SQLite, and answers questions about them through an intent-classified chat loop."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (documents,
    /// chunks, embeddings). Idempotent — running it multiple times is safe.
    Init,

    /// Scan the documents folder and ingest new or changed files.
    ///
    /// Unchanged documents (same fingerprint, already embedded) are skipped;
    /// failed documents are retried. Prints a summary report.
    Ingest,

    /// Show per-status document counts.
    Status,

    /// Chat with the ingested documents.
    ///
    /// Without `--message`, starts an interactive loop (exit with `exit`
    /// or `quit`). With `--message`, answers once and exits.
    Chat {
        /// Answer a single message instead of starting the interactive loop.
        #[arg(short, long)]
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("docchat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest => {
            run_ingest(&cfg).await?;
        }
        Commands::Status => {
            run_status(&cfg).await?;
        }
        Commands::Chat { message } => {
            run_chat(&cfg, message).await?;
        }
    }

    Ok(())
}

async fn run_ingest(cfg: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&cfg.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let parsers = ParserProvider::from_enabled(&cfg.documents.enabled_parsers);
    let extensions = parsers.supported_extensions();
    let discovered = discover::scan_documents(&cfg.documents, &extensions)?;
    println!("Discovered {} document(s).", discovered.len());

    let embedder: Arc<dyn embedding::Embedder> =
        Arc::from(embedding::create_embedder(&cfg.embedding)?);
    let metadata = MetadataStore::new(pool.clone());
    let vectors = VectorStore::new(pool, embedder);

    let pipeline = IngestionPipeline::new(
        metadata,
        vectors,
        parsers,
        cfg.chunking.clone(),
        &cfg.ingestion,
    );
    let report = pipeline.run(discovered).await?;

    println!(
        "Ingestion complete: {} unchanged, {} processed, {} embedded, {} failed ({} chunks in {} batches).",
        report.unchanged,
        report.processed,
        report.embedded,
        report.failed,
        report.chunks_written,
        report.batches_issued,
    );

    Ok(())
}

async fn run_status(cfg: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&cfg.db.path).await?;
    migrate::run_migrations(&pool).await?;
    let metadata = MetadataStore::new(pool);

    let counts = metadata.status_counts().await?;
    let total: i64 = counts.values().sum();
    println!("Documents: {}", total);
    for status in DocStatus::all() {
        let n = counts.get(&status).copied().unwrap_or(0);
        println!("  {:<11} {}", status.as_str(), n);
    }

    for doc in metadata.list_by_status(DocStatus::Failed).await? {
        println!(
            "  failed: {} ({})",
            doc.locator,
            doc.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

async fn run_chat(cfg: &Config, message: Option<String>) -> anyhow::Result<()> {
    let pool = db::connect(&cfg.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let embedder: Arc<dyn embedding::Embedder> =
        Arc::from(embedding::create_embedder(&cfg.embedding)?);
    let chat_model: Arc<dyn llm::LanguageModel> = Arc::from(llm::create_chat_model(&cfg.llm)?);
    let classification_model: Arc<dyn llm::LanguageModel> =
        Arc::from(llm::create_classification_model(&cfg.llm)?);

    let metadata = MetadataStore::new(pool.clone());
    let vectors = VectorStore::new(pool, embedder);

    let classifier = IntentClassifier::new(
        classification_model,
        cfg.chat.confidence_threshold,
        cfg.chat.classify_history_window,
        cfg.llm.classification_temperature,
    );
    let retrieval = RetrievalManager::new(
        vectors,
        metadata,
        chat_model,
        &cfg.chat,
        cfg.llm.chat_temperature,
    );
    let mut orchestrator = ChatOrchestrator::new(classifier, retrieval, cfg.chat.history_window);

    if let Some(message) = message {
        let response = orchestrator.handle_message(&message).await;
        println!("{}", response.answer);
        return Ok(());
    }

    println!("docchat — ask about your documents (exit/quit to leave).");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        let response = orchestrator.handle_message(line).await;
        println!("{}", response.answer);
    }

    Ok(())
}
