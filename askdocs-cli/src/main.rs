use anyhow::{Context, Result};
use askdocs_core::chat::{ChatEngine, ChatMessage, ChatSettings, StreamEvent};
use askdocs_core::config::Config;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "askdocs")]
#[command(about = "Ask questions over your own documents", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Ingest a text file into the document index")]
    Ingest {
        #[arg(help = "Path to a UTF-8 text file")]
        file: PathBuf,

        #[arg(short, long, help = "Source name (defaults to the file name)")]
        source: Option<String>,
    },

    #[command(about = "Ask a single question")]
    Ask {
        question: String,

        #[arg(long, help = "Restrict retrieval to these sources")]
        doc: Vec<String>,
    },

    #[command(about = "Interactive chat session")]
    Chat,

    #[command(about = "List ingested sources")]
    Sources,

    #[command(about = "Remove a source from the index")]
    Forget { source: String },

    #[command(about = "Show current configuration")]
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        Config::load(&cli.config).context("Failed to load config")?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Ingest { file, source } => ingest(&config, &file, source).await,
        Commands::Ask { question, doc } => ask(&config, &question, doc).await,
        Commands::Chat => chat(&config).await,
        Commands::Sources => sources(&config).await,
        Commands::Forget { source } => forget(&config, &source).await,
        Commands::Config => show_config(&config),
    }
}

async fn ingest(config: &Config, file: &PathBuf, source: Option<String>) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let source = source.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string())
    });

    let engine = ChatEngine::from_config(config).await?;
    let report = engine.rag().ingest(&text, &source).await?;

    println!(
        "{} Ingested {} ({} chunks)",
        "✓".green().bold(),
        report.source.cyan(),
        report.chunk_count
    );
    Ok(())
}

async fn ask(config: &Config, question: &str, doc: Vec<String>) -> Result<()> {
    let engine = Arc::new(ChatEngine::from_config(config).await?);
    let settings = ChatSettings {
        active_documents: doc,
        ..ChatSettings::default()
    };

    run_question(&engine, question, &[], &settings).await?;
    Ok(())
}

async fn chat(config: &Config) -> Result<()> {
    let engine = Arc::new(ChatEngine::from_config(config).await?);
    let doc_count = engine.rag().count().await?;
    println!("Chatting over {} indexed chunks. Type 'exit' to quit.\n", doc_count);

    let mut history: Vec<ChatMessage> = Vec::new();
    let settings = ChatSettings::default();

    loop {
        print!("{} ", ">".bold().blue());
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        let answer = run_question(&engine, input, &history, &settings).await?;

        history.push(ChatMessage::user(input));
        history.push(answer);
    }

    Ok(())
}

/// Streams one answer to stdout and returns the finished assistant message.
async fn run_question(
    engine: &Arc<ChatEngine>,
    question: &str,
    history: &[ChatMessage],
    settings: &ChatSettings,
) -> Result<ChatMessage> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let task_engine = engine.clone();
    let task_question = question.to_string();
    let task_history = history.to_vec();
    let task_settings = settings.clone();
    let task = tokio::spawn(async move {
        task_engine
            .answer_stream(
                &task_question,
                &task_history,
                &task_settings,
                cancel,
                &tx,
            )
            .await;
    });

    let mut message = ChatMessage::assistant("");
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Chunk { text } => {
                print!("{text}");
                std::io::stdout().flush()?;
            }
            StreamEvent::Metadata {
                answer,
                sources,
                followups,
            } => {
                println!();
                if !sources.is_empty() {
                    println!("\n{} {}", "Sources:".bold(), sources.join(", ").cyan());
                }
                if !followups.is_empty() {
                    println!("{}", "Follow-ups:".bold());
                    for followup in &followups {
                        println!("  {} {}", "•".cyan(), followup);
                    }
                }
                message = ChatMessage::assistant(answer);
                message.sources = sources;
                message.followups = followups;
            }
            StreamEvent::Error { error } => {
                println!();
                anyhow::bail!("Generation failed: {error}");
            }
        }
    }
    task.await?;

    Ok(message)
}

async fn sources(config: &Config) -> Result<()> {
    let engine = ChatEngine::from_config(config).await?;
    let sources = engine.rag().sources().await?;

    if sources.is_empty() {
        println!("No documents ingested yet.");
        return Ok(());
    }

    println!("{}", "Ingested sources:".bold().green());
    for source in sources {
        println!("  {} {}", "•".cyan(), source);
    }
    Ok(())
}

async fn forget(config: &Config, source: &str) -> Result<()> {
    let engine = ChatEngine::from_config(config).await?;
    let removed = engine.rag().delete_source(source).await?;

    if removed > 0 {
        println!("{} Removed {} chunks of {}", "✓".green().bold(), removed, source.cyan());
    } else {
        println!("No documents found for: {source}");
    }
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:       {}", config.llm.model.cyan());
    println!("  Base URL:    {}", config.llm.base_url);
    println!("  Temperature: {}", config.llm.temperature);
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Model:       {}", config.embedding.model.cyan());
    println!("  Base URL:    {}", config.embedding.base_url);
    println!();
    println!("{}", "RAG:".bold());
    println!("  Chunk Size:    {}", config.rag.chunk_size);
    println!("  Chunk Overlap: {}", config.rag.chunk_overlap);
    println!("  Top K:         {}", config.rag.top_k);
    println!();
    println!("{}", "Storage:".bold());
    println!("  Snapshot: {}", config.storage.snapshot_path);

    Ok(())
}
