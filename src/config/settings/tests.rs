use super::*;
use crate::agent::MemoryKind;
use crate::chunking::SplitStrategy;
use std::collections::HashMap;
use tempfile::TempDir;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect::<HashMap<_, _>>();
    move |name: &str| vars.get(name).cloned()
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
    assert_eq!(config.openai.embedding_dimension, 1536);
    assert_eq!(config.openai.chat_model, "gpt-4");
    assert_eq!(config.pinecone.index_name, "rag-documents");
    assert_eq!(config.pinecone.metric, Metric::Cosine);
    assert_eq!(config.pinecone.environment, "us-east-1");
    assert_eq!(config.pinecone.timeout_seconds, 30);
    assert_eq!(config.chunking.max_length, 1000);
    assert_eq!(config.chunking.chunk_overlap, 100);
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.log_file, PathBuf::from("app.log"));
    assert!(config.openai.api_key.is_none());
    assert!(config.pinecone.api_key.is_none());
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.openai.base_url = "ftp://example.com".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.openai.embedding_model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.openai.embedding_dimension = 32;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.openai.temperature = 3.5;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.pinecone.index_name = "Has_Upper".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.pinecone.cloud = "on-prem".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.pinecone.upsert_batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.pinecone.timeout_seconds = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTimeout(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.chunking.max_length = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.retrieval.top_k = 0;
    assert!(invalid_config.validate().is_err());
}

#[test]
fn overlap_larger_than_max_length_is_accepted() {
    let mut config = Config::default();
    config.chunking.chunk_overlap = 5000;
    assert!(config.validate().is_ok());
}

#[test]
fn index_name_rules() {
    assert!(validate_index_name("rag-documents").is_ok());
    assert!(validate_index_name("docs2").is_ok());
    assert!(validate_index_name("").is_err());
    assert!(validate_index_name("-leading").is_err());
    assert!(validate_index_name("trailing-").is_err());
    assert!(validate_index_name("with space").is_err());
    assert!(validate_index_name(&"a".repeat(46)).is_err());
}

#[test]
fn url_generation() {
    let config = Config::default();
    assert_eq!(
        config
            .openai_url()
            .expect("should generate openai_url successfully")
            .as_str(),
        "https://api.openai.com/v1"
    );
    assert_eq!(
        config
            .controller_url()
            .expect("should generate controller_url successfully")
            .as_str(),
        "https://api.pinecone.io/"
    );
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_config_uses_defaults() {
    let partial_toml = r#"
        [pinecone]
        index_name = "handbook"

        [chunking]
        strategy = "sentence"

        [retrieval]
        memory = "summary"
    "#;

    let config: Config = toml::from_str(partial_toml).expect("should parse partial toml");
    assert_eq!(config.pinecone.index_name, "handbook");
    assert_eq!(config.pinecone.environment, "us-east-1");
    assert_eq!(config.pinecone.timeout_seconds, 30);
    assert_eq!(config.chunking.strategy, SplitStrategy::Sentence);
    assert_eq!(config.chunking.max_length, 1000);
    assert_eq!(config.retrieval.memory, MemoryKind::Summary);
    assert_eq!(config.openai.chat_model, "gpt-4");
}

#[test]
fn invalid_toml_handling() {
    let invalid_toml = r#"
        [openai
        batch_size = "lots"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
    assert!(result.is_err());
}

#[test]
fn environment_overrides() {
    let mut config = Config::default();
    config.apply_overrides(lookup_from(&[
        (OPENAI_API_KEY_VAR, "sk-test"),
        (PINECONE_API_KEY_VAR, "pc-test"),
        (PINECONE_ENVIRONMENT_VAR, "eu-west-1"),
        (PINECONE_INDEX_VAR, "team-docs"),
    ]));

    assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.pinecone.api_key.as_deref(), Some("pc-test"));
    assert_eq!(config.pinecone.environment, "eu-west-1");
    assert_eq!(config.pinecone.index_name, "team-docs");
}

#[test]
fn blank_environment_values_are_ignored() {
    let mut config = Config::default();
    config.pinecone.index_name = "from-file".to_string();
    config.apply_overrides(lookup_from(&[(PINECONE_INDEX_VAR, "  "), (OPENAI_API_KEY_VAR, "")]));

    assert_eq!(config.pinecone.index_name, "from-file");
    assert!(config.openai.api_key.is_none());
}

#[test]
fn load_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = Config::load_file(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.pinecone, PineconeConfig::default());
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config_dir = temp_dir.path().join("docs-rag");

    let mut config = Config {
        base_dir: config_dir.clone(),
        ..Config::default()
    };
    config
        .pinecone
        .set_index_name("saved-index".to_string())
        .expect("valid index name");
    config.chunking.max_length = 500;
    config.save().expect("should save config");

    assert!(config_dir.join("config.toml").exists());

    let loaded = Config::load_file(&config_dir).expect("should reload config");
    assert_eq!(loaded, config);
}

#[test]
fn save_rejects_invalid_config() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.retrieval.top_k = 0;

    assert!(config.save().is_err());
    assert!(!temp_dir.path().join("config.toml").exists());
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[openai]\nembedding_dimension = 1\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn setter_validation() {
    let mut openai = OpenAiConfig::default();
    assert!(openai.set_embedding_model("text-embedding-3-large".to_string()).is_ok());
    assert!(openai.set_chat_model("gpt-4o".to_string()).is_ok());
    assert!(openai.set_embedding_dimension(768).is_ok());
    assert!(openai.set_batch_size(16).is_ok());

    assert!(openai.set_embedding_model(String::new()).is_err());
    assert!(openai.set_chat_model("  ".to_string()).is_err());
    assert!(openai.set_embedding_dimension(5000).is_err());
    assert!(openai.set_batch_size(0).is_err());

    let mut pinecone = PineconeConfig::default();
    assert!(pinecone.set_index_name("another-index".to_string()).is_ok());
    assert!(pinecone.set_environment("us-west-2".to_string()).is_ok());
    assert!(pinecone.set_cloud("gcp".to_string()).is_ok());

    assert!(pinecone.set_index_name("Bad_Name".to_string()).is_err());
    assert!(pinecone.set_environment(String::new()).is_err());
    assert!(pinecone.set_cloud("ibm".to_string()).is_err());
}
