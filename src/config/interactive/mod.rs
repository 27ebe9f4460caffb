
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;
use std::time::Duration;

use super::settings::{OPENAI_API_KEY_VAR, PINECONE_API_KEY_VAR};
use super::{Config, ConfigError, OpenAiConfig, PineconeConfig};
use crate::chunking::{ChunkingConfig, SplitStrategy};

const CLOUDS: [&str; 3] = ["aws", "gcp", "azure"];
const CONNECTION_TEST_TIMEOUT_SECONDS: u64 = 5;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Docs RAG Configuration Setup").bold().cyan());
    eprintln!();

    let config_dir = Config::config_dir().context("Failed to locate configuration directory")?;
    let mut config = load_existing_config(&config_dir)?;

    eprintln!("{}", style("OpenAI Configuration").bold().yellow());
    eprintln!("Models used for embeddings and answers.");
    eprintln!();
    configure_openai(&mut config.openai)?;

    eprintln!();
    eprintln!("{}", style("Pinecone Configuration").bold().yellow());
    eprintln!("The serverless index that stores document chunks.");
    eprintln!();
    configure_pinecone(&mut config.pinecone)?;

    eprintln!();
    eprintln!("{}", style("Chunking Configuration").bold().yellow());
    eprintln!();
    configure_chunking(&mut config.chunking)?;

    eprintln!();
    report_missing_keys(&config);

    let mut probe = config.clone();
    probe.apply_env_overrides();
    eprintln!("{}", style("Testing configuration...").yellow());
    if test_openai_connection(&probe.openai) {
        eprintln!("{}", style("✓ OpenAI endpoint reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the OpenAI endpoint").yellow()
        );
        eprintln!("You can continue, but queries will fail until the endpoint is reachable.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("OpenAI Settings:").bold().yellow());
    eprintln!(
        "  API Key: {}",
        style(mask_secret(config.openai.api_key.as_deref())).cyan()
    );
    eprintln!("  Base URL: {}", style(&config.openai.base_url).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.openai.embedding_model).cyan()
    );
    eprintln!(
        "  Embedding Dimension: {}",
        style(config.openai.embedding_dimension).cyan()
    );
    eprintln!("  Chat Model: {}", style(&config.openai.chat_model).cyan());
    eprintln!("  Temperature: {}", style(config.openai.temperature).cyan());
    eprintln!("  Batch Size: {}", style(config.openai.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Pinecone Settings:").bold().yellow());
    eprintln!(
        "  API Key: {}",
        style(mask_secret(config.pinecone.api_key.as_deref())).cyan()
    );
    eprintln!("  Index: {}", style(&config.pinecone.index_name).cyan());
    eprintln!(
        "  Location: {}/{}",
        style(&config.pinecone.cloud).cyan(),
        style(&config.pinecone.environment).cyan()
    );
    eprintln!("  Metric: {}", style(config.pinecone.metric.as_str()).cyan());
    eprintln!(
        "  Upsert Batch Size: {}",
        style(config.pinecone.upsert_batch_size).cyan()
    );
    eprintln!(
        "  Timeout: {}s",
        style(config.pinecone.timeout_seconds).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Chunking Settings:").bold().yellow());
    eprintln!("  Max Length: {}", style(config.chunking.max_length).cyan());
    eprintln!("  Overlap: {}", style(config.chunking.chunk_overlap).cyan());
    eprintln!(
        "  Strategy: {}",
        style(strategy_name(config.chunking.strategy)).cyan()
    );
    eprintln!("  Recursive: {}", style(config.chunking.recursive).cyan());

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Return Sources: {}",
        style(config.retrieval.return_sources).cyan()
    );
    eprintln!(
        "  Memory: {}",
        style(format!("{:?}", config.retrieval.memory).to_lowercase()).cyan()
    );

    eprintln!();
    eprintln!("Log file: {}", style(config.log_file.display()).dim());
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());

    Ok(())
}

/// Hide all but the edges of an API key
#[inline]
pub fn mask_secret(secret: Option<&str>) -> String {
    let Some(secret) = secret else {
        return "not set".to_string();
    };

    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }

    let head: String = chars.iter().take(3).collect();
    let tail: String = chars.iter().skip(chars.len() - 4).collect();
    format!("{}****{}", head, tail)
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load_file(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_openai(openai: &mut OpenAiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("OpenAI API base URL")
        .default(openai.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = OpenAiConfig {
                base_url: input.clone(),
                ..OpenAiConfig::default()
            };
            candidate.validate()
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(openai.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let embedding_dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(openai.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(openai.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding requests")
        .default(openai.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 2048 {
                Err("Batch size must be 2048 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    openai.base_url = base_url;
    openai.set_embedding_model(embedding_model)?;
    openai.set_embedding_dimension(embedding_dimension)?;
    openai.set_chat_model(chat_model)?;
    openai.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_pinecone(pinecone: &mut PineconeConfig) -> Result<()> {
    let index_name: String = Input::new()
        .with_prompt("Index name")
        .default(pinecone.index_name.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            PineconeConfig::default().set_index_name(input.clone())
        })
        .interact_text()?;

    let default_cloud = CLOUDS
        .iter()
        .position(|&c| c == pinecone.cloud)
        .unwrap_or(0);
    let cloud_index = Select::new()
        .with_prompt("Cloud provider")
        .default(default_cloud)
        .items(&CLOUDS)
        .interact()?;

    let environment: String = Input::new()
        .with_prompt("Region")
        .default(pinecone.environment.clone())
        .validate_with(non_empty)
        .interact_text()?;

    pinecone.set_index_name(index_name)?;
    pinecone.set_cloud(CLOUDS[cloud_index].to_string())?;
    pinecone.set_environment(environment)?;

    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    let max_length: usize = Input::new()
        .with_prompt("Maximum chunk length (characters)")
        .default(chunking.max_length)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100_000).contains(input) {
                Ok(())
            } else {
                Err("Length must be between 1 and 100000")
            }
        })
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(chunking.chunk_overlap.min(max_length.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input < max_length {
                Ok(())
            } else {
                Err("Overlap must be smaller than the maximum length")
            }
        })
        .interact_text()?;

    let strategies = [SplitStrategy::Separator, SplitStrategy::Sentence];
    let default_strategy = strategies
        .iter()
        .position(|&s| s == chunking.strategy)
        .unwrap_or(0);
    let strategy_index = Select::new()
        .with_prompt("Split strategy")
        .default(default_strategy)
        .items(&strategies.map(strategy_name))
        .interact()?;

    let recursive = Confirm::new()
        .with_prompt("Scan subdirectories when adding documents?")
        .default(chunking.recursive)
        .interact()?;

    chunking.max_length = max_length;
    chunking.chunk_overlap = chunk_overlap;
    chunking.strategy = strategies[strategy_index];
    chunking.recursive = recursive;

    Ok(())
}

#[allow(clippy::ptr_arg, reason = "dialoguer validators receive &String")]
fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Value cannot be empty")
    } else {
        Ok(())
    }
}

fn strategy_name(strategy: SplitStrategy) -> &'static str {
    match strategy {
        SplitStrategy::Separator => "separator",
        SplitStrategy::Sentence => "sentence",
    }
}

fn report_missing_keys(config: &Config) {
    let missing = [
        (config.openai.api_key.is_none(), OPENAI_API_KEY_VAR),
        (config.pinecone.api_key.is_none(), PINECONE_API_KEY_VAR),
    ];

    for (is_missing, var) in missing {
        if is_missing && !std::env::var(var).is_ok_and(|v| !v.trim().is_empty()) {
            eprintln!(
                "{}",
                style(format!("⚠ {} is not set; export it before running queries.", var))
                    .yellow()
            );
        }
    }
}

fn test_openai_connection(openai: &OpenAiConfig) -> bool {
    let url = format!("{}/models", openai.base_url.trim_end_matches('/'));

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(CONNECTION_TEST_TIMEOUT_SECONDS)))
        .build()
        .into();

    let response = match &openai.api_key {
        Some(key) => agent
            .get(&url)
            .header("Authorization", format!("Bearer {}", key))
            .call(),
        None => agent.get(&url).call(),
    };

    match response {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
