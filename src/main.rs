use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use medrag::agent::Session;
use medrag::app::App;
use medrag::config::Config;
use medrag::db::{Db, KnowledgeStore};
use medrag::embedder::ollama::OllamaEmbedder;
use medrag::indexer::cleaner::{DEFAULT_REMOVE_KEYWORDS, MarkdownCleaner};
use medrag::indexer::{IngestOutcome, Ingestor};
use medrag::mcp::server::{McpContext, McpServer};

#[derive(Parser)]
#[command(name = "medrag", version, about = "Evidence-based medical QA over local textbooks")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, global = true, default_value = "config.json")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP server on stdio
    Serve,
    /// Ingest markdown files into the knowledge base
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List ingested source files
    List,
    /// Delete every chunk of a source file
    Delete { filename: String },
    /// Show knowledge base statistics
    Stats,
    /// Search the knowledge base
    Search {
        query: String,
        /// Show expanded queries and rerank scores
        #[arg(long)]
        debug: bool,
    },
    /// Ask a question; starts an interactive session when none is given
    Ask {
        question: Option<String>,
        /// Show search logs for every retrieval step
        #[arg(long)]
        debug: bool,
    },
    /// Clean a PDF-converted markdown file before ingestion
    Clean {
        input: PathBuf,
        output: PathBuf,
        /// Drop lines matching this pattern (repeatable)
        #[arg(short = 'k', long = "keyword")]
        keywords: Vec<String>,
        /// Also drop the built-in running header/footer patterns
        #[arg(long)]
        default_keywords: bool,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries MCP traffic and command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Clean {
            input,
            output,
            keywords,
            default_keywords,
        } => clean(&input, &output, &keywords, default_keywords),
        Command::Serve => serve(load_config(&cli.config)?),
        Command::Ingest { files } => ingest(&load_config(&cli.config)?, &files),
        Command::List => list(&load_config(&cli.config)?),
        Command::Delete { filename } => delete(&load_config(&cli.config)?, &filename),
        Command::Stats => stats(&load_config(&cli.config)?),
        Command::Search { query, debug } => search(load_config(&cli.config)?, &query, debug),
        Command::Ask { question, debug } => ask(load_config(&cli.config)?, question, debug),
    }
}

fn load_config(path: &str) -> Result<Config> {
    let config = Config::load(path)?;
    config.validate()?;
    Ok(config)
}

fn open_store(config: &Config) -> Result<Db> {
    Db::open(&config.db_path, config.embedding.dimensions)
        .with_context(|| format!("Failed to open knowledge store at {}", config.db_path))
}

fn serve(config: Config) -> Result<()> {
    info!("Starting medrag MCP server...");
    let app = App::build(config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    // The last App handle must be dropped outside the runtime: the blocking
    // HTTP clients inside it cannot shut down from async context.
    let server = McpServer::new(McpContext::new(app.clone()));
    runtime.block_on(async move {
        tokio::select! {
            result = server.start() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                Ok(())
            }
        }
    })?;
    runtime.shutdown_background();
    drop(app);
    Ok(())
}

fn ingest(config: &Config, files: &[PathBuf]) -> Result<()> {
    let store = open_store(config)?;
    let embedder = OllamaEmbedder::new(config).context("Failed to create embedding client")?;
    medrag::app::ensure_compatible(&store, &embedder)?;
    let store: Arc<dyn KnowledgeStore> = Arc::new(store);
    let embedder = Arc::new(embedder);
    let ingestor = Ingestor::new(store, embedder, config.chunking.clone());

    let mut failures = 0usize;
    for path in files {
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            warn!("Skipping {}: only markdown files are supported", path.display());
            continue;
        }
        let Some(filename) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            warn!("Skipping {}: not a file", path.display());
            continue;
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:40.cyan/blue} {percent}% {msg}")
                .expect("valid template")
                .progress_chars("█▓░"),
        );

        let outcome = ingestor.ingest_with_progress(&content, &filename, |fraction, message| {
            pb.set_position((fraction * 100.0) as u64);
            pb.set_message(message.to_string());
        });
        pb.finish_and_clear();

        match outcome {
            Ok(IngestOutcome::Stored(n)) => println!("{filename}: stored {n} chunks"),
            Ok(IngestOutcome::AlreadyExists) => println!("{filename}: already ingested, skipped"),
            Ok(IngestOutcome::EmptyDocument) => println!("{filename}: empty, nothing to ingest"),
            Err(e) => {
                failures += 1;
                eprintln!("{filename}: failed: {e}");
            }
        }
    }

    anyhow::ensure!(failures == 0, "{failures} file(s) failed to ingest");
    Ok(())
}

fn list(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let mut files: Vec<String> = store.list_source_files().into_iter().collect();
    files.sort();
    let partial = store.partial_sources();

    if files.is_empty() {
        println!("Knowledge base is empty.");
    }
    for file in files {
        if partial.contains(&file) {
            println!("{file} (incomplete)");
        } else {
            println!("{file}");
        }
    }
    Ok(())
}

fn delete(config: &Config, filename: &str) -> Result<()> {
    let store = open_store(config)?;
    let removed = store.delete_by_source(filename)?;
    if removed == 0 {
        println!("No chunks found for {filename}");
    } else {
        println!("Deleted {removed} chunks of {filename}");
    }
    Ok(())
}

fn stats(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn search(config: Config, query: &str, debug: bool) -> Result<()> {
    let app = App::build(config)?;
    let result = app.search_engine().search(query, debug);
    for line in &result.logs {
        eprintln!("{line}");
    }
    println!("{}", result.text);
    Ok(())
}

fn ask(config: Config, question: Option<String>, debug: bool) -> Result<()> {
    let app = App::build(config)?;
    let reasoning = app.reasoning_loop();
    let mut session = Session::new();

    let print_answer = |answer: &medrag::agent::Answer| {
        if debug {
            for event in &answer.trace {
                if let medrag::agent::StepEvent::Search { keyword, result, .. } = event {
                    eprintln!("-- search: {keyword}");
                    for line in &result.logs {
                        eprintln!("   {line}");
                    }
                }
            }
        }
        println!("{}\n[{}]", answer.text, answer.status.as_str());
    };

    if let Some(question) = question {
        let answer = reasoning.run(&mut session, &question, debug);
        print_answer(&answer);
        return Ok(());
    }

    println!("Medical assistant ready. Type a question, /reset to start over, /quit to exit.");
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                session = Session::new();
                println!("Session cleared.");
            }
            question => {
                let answer = reasoning.run(&mut session, question, debug);
                print_answer(&answer);
            }
        }
    }
    Ok(())
}

fn clean(input: &Path, output: &Path, keywords: &[String], default_keywords: bool) -> Result<()> {
    let mut patterns: Vec<String> = keywords.to_vec();
    if default_keywords {
        patterns.extend(DEFAULT_REMOVE_KEYWORDS.iter().map(|k| k.to_string()));
    }

    let cleaner = MarkdownCleaner::new(patterns.as_slice()).context("Invalid keyword pattern")?;
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let cleaned = cleaner.clean(&text);
    std::fs::write(output, &cleaned)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Cleaned {} -> {} ({} -> {} chars)",
        input.display(),
        output.display(),
        text.chars().count(),
        cleaned.chars().count()
    );
    Ok(())
}
