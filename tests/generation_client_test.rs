//! Generation Client (C1) integration tests against a mock Ollama-compatible
//! server, covering the wire protocol in §6: version/tags probes, streaming
//! generate, and non-streaming chat.

use clood::{Error, GenerationClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn version_and_list_models_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"version": "0.4.2"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [
                {"name": "llama3:8b", "size": 1234, "details": {"parameter_size": "8B", "quantization_level": "Q4_0"}}
            ]
        })))
        .mount(&server)
        .await;

    let client = GenerationClient::new(server.uri()).unwrap();

    assert_eq!(client.version().await.unwrap(), "0.4.2");

    let models = client.list_models().await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].name, "llama3:8b");
    assert_eq!(models[0].parameter_size, "8B");
}

#[tokio::test]
async fn generate_stream_concatenates_chunks_in_order() {
    let server = MockServer::start().await;

    let body = concat!(
        "{\"response\":\"Hello\",\"done\":false}\n",
        "{\"response\":\", world\",\"done\":false}\n",
        "{\"response\":\"\",\"done\":true,\"eval_count\":3,\"eval_duration\":1000000,\"prompt_eval_count\":1}\n",
    );

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let client = GenerationClient::new(server.uri()).unwrap();
    let mut seen = Vec::new();
    let text = client
        .generate_stream("llama3:8b", "hi", None, None, |chunk| seen.push(chunk.to_string()))
        .await
        .unwrap();

    assert_eq!(text, "Hello, world");
    assert_eq!(seen, vec!["Hello".to_string(), ", world".to_string()]);
}

#[tokio::test]
async fn generate_with_stats_reports_eval_tallies() {
    let server = MockServer::start().await;

    let body = concat!(
        "{\"response\":\"answer\",\"done\":false}\n",
        "{\"response\":\"\",\"done\":true,\"eval_count\":7,\"eval_duration\":500000000,\"prompt_eval_count\":2}\n",
    );

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let client = GenerationClient::new(server.uri()).unwrap();
    let outcome = client.generate_with_stats("llama3:8b", "hi").await.unwrap();

    assert_eq!(outcome.text, "answer");
    assert_eq!(outcome.eval_count, 7);
    assert_eq!(outcome.eval_duration, std::time::Duration::from_millis(500));
}

#[tokio::test]
async fn generate_stream_without_done_frame_is_truncated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("{\"response\":\"partial\",\"done\":false}\n", "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let client = GenerationClient::new(server.uri()).unwrap();
    let err = client.generate("llama3:8b", "hi").await.unwrap_err();
    assert_eq!(err.kind(), "truncated");
    assert!(matches!(err, Error::Truncated(_)));
}

#[tokio::test]
async fn chat_returns_assistant_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": {"role": "assistant", "content": "4"},
            "done": true,
            "eval_count": 2
        })))
        .mount(&server)
        .await;

    let client = GenerationClient::new(server.uri()).unwrap();
    let reply = client.chat("llama3:8b", &[clood::Message::user("2+2?")], None, None).await.unwrap();
    assert_eq!(reply.text_content(), "4");
}

#[tokio::test]
async fn unreachable_host_yields_unreachable_error() {
    // No server listening on this port.
    let client = GenerationClient::new("http://127.0.0.1:1")
        .unwrap()
        .with_probe_timeout(std::time::Duration::from_millis(200));
    let err = client.version().await.unwrap_err();
    assert_eq!(err.kind(), "unreachable");
}
