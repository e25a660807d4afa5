//! Tests for the OpenAI-compatible embedding client.

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::embeddings::api::{ApiConfig, EmbeddingApiClient};
use crate::embeddings::Embedder;
use crate::error::KbError;

fn test_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        api_key: Some("test-api-key".to_string()),
        model: "text-embedding-3-small".to_string(),
        timeout_secs: 10,
        max_retries: 3,
    }
}

fn embedding_response(embeddings: Vec<Vec<f32>>) -> serde_json::Value {
    json!({
        "data": embeddings
            .into_iter()
            .enumerate()
            .map(|(i, e)| json!({ "index": i, "embedding": e }))
            .collect::<Vec<_>>()
    })
}

#[tokio::test]
async fn test_request_format_and_auth_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(body_json(json!({
            "model": "text-embedding-3-small",
            "input": ["hello world"]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_response(vec![vec![0.1, 0.2, 0.3]])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri()), 3, 8).unwrap();
    let embeddings = client.embed(&["hello world"]).await.unwrap();
    assert_eq!(embeddings, vec![vec![0.1, 0.2, 0.3]]);
}

#[tokio::test]
async fn test_out_of_order_data_is_sorted_by_index() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri()), 2, 8).unwrap();
    let embeddings = client.embed(&["a", "b"]).await.unwrap();
    assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn test_inputs_are_split_into_batches() {
    let mock_server = MockServer::start().await;
    let requests = Arc::new(AtomicUsize::new(0));

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with({
            let requests = Arc::clone(&requests);
            move |req: &wiremock::Request| {
                requests.fetch_add(1, Ordering::SeqCst);
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                let n = body["input"].as_array().map(|a| a.len()).unwrap_or(0);
                ResponseTemplate::new(200).set_body_json(embedding_response(vec![vec![0.5, 0.5]; n]))
            }
        })
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri()), 2, 2).unwrap();
    let embeddings = client.embed(&["a", "b", "c", "d", "e"]).await.unwrap();

    assert_eq!(embeddings.len(), 5);
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_wrong_dimension_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_response(vec![vec![0.1, 0.2, 0.3]])),
        )
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri()), 4, 8).unwrap();
    let result = client.embed(&["test"]).await;
    assert!(matches!(result, Err(KbError::Embedding(_))));
}

#[tokio::test]
async fn test_rate_limit_retry() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));

    // First two requests return 429, third succeeds
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with({
            let count = Arc::clone(&attempt_count);
            move |_: &wiremock::Request| {
                let attempt = count.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    ResponseTemplate::new(429)
                        .set_body_json(json!({ "error": "rate limited" }))
                        .insert_header("retry-after", "1")
                } else {
                    ResponseTemplate::new(200)
                        .set_body_json(embedding_response(vec![vec![0.1, 0.2, 0.3]]))
                }
            }
        })
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri()), 3, 8).unwrap();
    assert!(client.embed(&["test"]).await.is_ok());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_rate_limit_exhausts_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.max_retries = 2;
    let client = EmbeddingApiClient::new(config, 3, 8).unwrap();

    let err = client.embed(&["test"]).await.unwrap_err();
    assert!(matches!(err, KbError::ApiRateLimit { .. }));
}

#[tokio::test]
async fn test_server_error_retry() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with({
            let count = Arc::clone(&attempt_count);
            move |_: &wiremock::Request| {
                if count.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200)
                        .set_body_json(embedding_response(vec![vec![0.1, 0.2, 0.3]]))
                }
            }
        })
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri()), 3, 8).unwrap();
    assert!(client.embed(&["test"]).await.is_ok());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_auth_error_no_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri()), 3, 8).unwrap();
    let err = client.embed(&["test"]).await.unwrap_err();
    assert!(matches!(err, KbError::ApiAuth(_)));
}

#[tokio::test]
async fn test_detect_dimensions() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_response(vec![vec![0.0; 1536]])),
        )
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri()), 1536, 8).unwrap();
    assert_eq!(client.detect_dimensions().await.unwrap(), 1536);
}

#[tokio::test]
async fn test_embed_one() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_response(vec![vec![0.3, 0.4]])),
        )
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri()), 2, 8).unwrap();
    assert_eq!(client.embed_one("q").await.unwrap(), vec![0.3, 0.4]);
}
