#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// OpenAI clients against a mock HTTP server

use docs_rag::config::Config;
use docs_rag::embeddings::{Embedder, OpenAiEmbeddings};
use docs_rag::http::HttpClient;
use docs_rag::llm::{ChatMessage, ChatModel, OpenAiChat};
use docs_rag::{ErrorKind, RagError};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const DIMENSION: u32 = 4;

fn test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.openai.api_key = Some("sk-test".to_string());
    config.openai.base_url = format!("{}/v1", server.uri());
    config.openai.embedding_dimension = DIMENSION;
    config.openai.batch_size = 2;
    config
}

fn test_http() -> HttpClient {
    HttpClient::new(Duration::from_secs(5))
        .with_retry_attempts(1)
        .with_backoff(Duration::ZERO)
}

/// Answers an embeddings request with one vector per input, listed in reverse index order
struct EchoEmbeddings {
    dimension: usize,
}

impl Respond for EchoEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("request is JSON");
        let inputs = body["input"].as_array().expect("input is an array");

        let data: Vec<Value> = inputs
            .iter()
            .enumerate()
            .rev()
            .map(|(index, text)| {
                let len = text.as_str().map_or(0, str::len) as f32;
                json!({
                    "object": "embedding",
                    "index": index,
                    "embedding": vec![len; self.dimension],
                })
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": data,
            "model": body["model"],
        }))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn embeddings_are_batched_and_reordered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "dimensions": DIMENSION,
        })))
        .respond_with(EchoEmbeddings {
            dimension: DIMENSION as usize,
        })
        .expect(2)
        .mount(&server)
        .await;

    let embeddings = OpenAiEmbeddings::new(&test_config(&server))
        .expect("Failed to create client")
        .with_http_client(test_http());

    let vectors = tokio::task::spawn_blocking(move || {
        let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        embeddings.embed_documents(&texts)
    })
    .await
    .expect("task completes")
    .expect("should embed documents");

    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[0], vec![1.0; 4]);
    assert_eq!(vectors[1], vec![2.0; 4]);
    assert_eq!(vectors[2], vec![3.0; 4]);
}

#[tokio::test(flavor = "multi_thread")]
async fn query_embedding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(EchoEmbeddings {
            dimension: DIMENSION as usize,
        })
        .expect(1)
        .mount(&server)
        .await;

    let embeddings = OpenAiEmbeddings::new(&test_config(&server))
        .expect("Failed to create client")
        .with_http_client(test_http());

    let vector = tokio::task::spawn_blocking(move || embeddings.embed_query("hello"))
        .await
        .expect("task completes")
        .expect("should embed query");

    assert_eq!(vector, vec![5.0; 4]);
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_dimension_is_a_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(EchoEmbeddings { dimension: 3 })
        .mount(&server)
        .await;

    let embeddings = OpenAiEmbeddings::new(&test_config(&server))
        .expect("Failed to create client")
        .with_http_client(test_http());

    let err = tokio::task::spawn_blocking(move || embeddings.embed_query("hello"))
        .await
        .expect("task completes")
        .expect_err("dimension mismatch should fail");

    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_embedding_indexes_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 0, "embedding": [1.0, 1.0, 1.0, 1.0]},
                {"object": "embedding", "index": 0, "embedding": [2.0, 2.0, 2.0, 2.0]}
            ],
            "model": "text-embedding-3-small"
        })))
        .mount(&server)
        .await;

    let embeddings = OpenAiEmbeddings::new(&test_config(&server))
        .expect("Failed to create client")
        .with_http_client(test_http());

    let texts = vec!["first".to_string(), "second".to_string()];
    let err = tokio::task::spawn_blocking(move || embeddings.embed_documents(&texts))
        .await
        .expect("task completes")
        .expect_err("duplicate indexes should fail");

    assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    assert!(err.to_string().contains("expected indexes 0..2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "What is the capital of France?"}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Paris is the capital of France."},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let chat = OpenAiChat::new(&test_config(&server))
        .expect("Failed to create client")
        .with_http_client(test_http());

    let reply = tokio::task::spawn_blocking(move || {
        chat.complete(&[ChatMessage::user("What is the capital of France?")])
    })
    .await
    .expect("task completes")
    .expect("should complete");

    assert_eq!(reply, "Paris is the capital of France.");
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_error_statuses_are_classified() {
    let cases = [
        (400, ErrorKind::Validation),
        (401, ErrorKind::RemoteUnavailable),
        (404, ErrorKind::NotFound),
        (429, ErrorKind::RemoteUnavailable),
        (503, ErrorKind::RemoteUnavailable),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(&test_config(&server))
            .expect("Failed to create client")
            .with_http_client(test_http());

        let err = tokio::task::spawn_blocking(move || chat.complete(&[ChatMessage::user("hi")]))
            .await
            .expect("task completes")
            .expect_err("error status should fail");

        assert_eq!(err.kind(), expected, "status {}", status);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "recovered"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let chat = OpenAiChat::new(&test_config(&server))
        .expect("Failed to create client")
        .with_http_client(test_http().with_retry_attempts(2));

    let reply = tokio::task::spawn_blocking(move || chat.complete(&[ChatMessage::user("hi")]))
        .await
        .expect("task completes")
        .expect("second attempt should succeed");

    assert_eq!(reply, "recovered");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_choices_are_remote_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let chat = OpenAiChat::new(&test_config(&server))
        .expect("Failed to create client")
        .with_http_client(test_http());

    let err = tokio::task::spawn_blocking(move || chat.complete(&[ChatMessage::user("hi")]))
        .await
        .expect("task completes")
        .expect_err("no choices should fail");

    assert!(matches!(err, RagError::RemoteUnavailable(_)));
}
