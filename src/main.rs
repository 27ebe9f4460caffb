use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use docs_rag::config::{Config, run_interactive_config, show_config};
use docs_rag::embeddings::{Embedder, OpenAiEmbeddings};
use docs_rag::llm::OpenAiChat;
use docs_rag::shell::{Services, Shell, ShellSettings};
use docs_rag::vector_store::PineconeClient;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "Ask questions about your documents with retrieval-augmented generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure models, index and chunking settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Config { show }) => run_config(show).map(|()| ExitCode::SUCCESS),
        None => run_shell(),
    };

    result.unwrap_or_else(|e| {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    })
}

fn run_config(show: bool) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if show {
        show_config()
    } else {
        run_interactive_config()
    }
}

fn run_shell() -> anyhow::Result<ExitCode> {
    let config = Config::load_default().context("Failed to load configuration")?;
    init_file_logging(&config.log_file)?;

    let settings = ShellSettings::from_config(&config);
    let stdin = io::stdin();
    let mut shell = Shell::new(stdin.lock(), io::stdout(), settings);

    let exit = shell.run(|| connect_services(&config));
    Ok(ExitCode::from(exit.code()))
}

fn init_file_logging(path: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

fn connect_services(config: &Config) -> docs_rag::Result<Services> {
    let embedder = OpenAiEmbeddings::new(config)?;
    let model = OpenAiChat::new(config)?;

    let index = PineconeClient::new(config)?
        .initialize(&config.pinecone.index_name, embedder.dimension())
        .inspect_err(|e| error!("Error initializing Pinecone: {}", e))?;

    Ok(Services {
        index: Arc::new(index),
        embedder: Arc::new(embedder),
        model: Arc::new(model),
    })
}
