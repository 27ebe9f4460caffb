use super::*;
use crate::ErrorKind;

fn config_with_key() -> Config {
    let mut config = Config::default();
    config.openai.api_key = Some("sk-test".to_string());
    config
}

#[test]
fn client_configuration() {
    let mut config = config_with_key();
    config.openai.embedding_model = "text-embedding-3-large".to_string();
    config.openai.embedding_dimension = 3072;
    config.openai.batch_size = 16;

    let client = OpenAiEmbeddings::new(&config).expect("Failed to create client");

    assert_eq!(client.model(), "text-embedding-3-large");
    assert_eq!(client.dimension(), 3072);
    assert_eq!(client.batch_size, 16);
    assert_eq!(client.base_url.host_str(), Some("api.openai.com"));
}

#[test]
fn missing_api_key_is_config_error() {
    let err = OpenAiEmbeddings::new(&Config::default()).expect_err("key is required");
    assert!(matches!(err, RagError::Config(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn dimensions_only_requested_for_v3_models() {
    let mut config = config_with_key();
    let client = OpenAiEmbeddings::new(&config).expect("Failed to create client");
    assert_eq!(client.requested_dimensions(), Some(1536));

    config.openai.embedding_model = "text-embedding-ada-002".to_string();
    let client = OpenAiEmbeddings::new(&config).expect("Failed to create client");
    assert_eq!(client.requested_dimensions(), None);
}

#[test]
fn request_serialization() {
    let input = vec!["first".to_string(), "second".to_string()];
    let request = EmbeddingRequest {
        model: "text-embedding-ada-002",
        input: &input,
        dimensions: None,
    };

    let json = serde_json::to_value(&request).expect("can serialize request");
    assert_eq!(
        json,
        serde_json::json!({
            "model": "text-embedding-ada-002",
            "input": ["first", "second"]
        })
    );
}

#[test]
fn empty_batch_makes_no_request() {
    let mut config = config_with_key();
    config.openai.base_url = "http://127.0.0.1:9".to_string();
    let client = OpenAiEmbeddings::new(&config).expect("Failed to create client");

    let vectors = client
        .embed_documents(&[])
        .expect("empty input should succeed");
    assert!(vectors.is_empty());
}
