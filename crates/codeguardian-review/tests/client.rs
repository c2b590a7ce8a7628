use std::time::Duration;

use codeguardian_core::{GuardianConfig, GuardianError, Provider};
use codeguardian_review::client::{HttpClient, RequestError, RetryPolicy};
use codeguardian_review::extract::extract_text;
use codeguardian_review::provider::AiClient;
use codeguardian_review::request::{build_request, PromptInputs};
use reqwest::header::HeaderMap;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REVIEW: &str = r#"{"issues":[{"id":"CQ-4.05","path":"src/App.jsx","line":4,"message":"m","suggestion":"s"}]}"#;

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
        retryable_statuses: vec![429, 500, 503],
    }
}

fn config(kind: Provider, server: &MockServer) -> GuardianConfig {
    let mut config = GuardianConfig::default();
    config.provider.kind = kind;
    config.provider.api_key = Some("test-key".into());
    config.provider.api_url = Some(format!("{}/models", server.uri()));
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config
}

fn inputs() -> PromptInputs<'static> {
    PromptInputs {
        instruction: "Review this.",
        rules: "CQ-4.05",
        diff: "+<li>{t}</li>",
    }
}

fn gemini_body(text: &str) -> serde_json::Value {
    json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
}

#[tokio::test]
async fn retryable_status_is_tried_exactly_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(4)
        .mount(&server)
        .await;

    let client = HttpClient::new(fast_policy(4), Duration::from_secs(5)).unwrap();
    let err = client
        .post_json(&format!("{}/flaky", server.uri()), &HeaderMap::new(), &json!({}), 4)
        .await
        .unwrap_err();

    match err {
        RequestError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 4);
            assert_eq!(last.status(), Some(503));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/secure"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(fast_policy(5), Duration::from_secs(5)).unwrap();
    let err = client
        .post_json(&format!("{}/secure", server.uri()), &HeaderMap::new(), &json!({}), 5)
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Status { status: 401, ref body } if body == "bad key"));
}

#[tokio::test]
async fn status_outside_allow_list_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(fast_policy(5), Duration::from_secs(5)).unwrap();
    let err = client
        .post_json(&server.uri(), &HeaderMap::new(), &json!({}), 5)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(fast_policy(5), Duration::from_secs(5)).unwrap();
    let response = client
        .post_json(&server.uri(), &HeaderMap::new(), &json!({}), 5)
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn timeouts_count_as_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
        .expect(2)
        .mount(&server)
        .await;

    let client = HttpClient::new(fast_policy(2), Duration::from_millis(100)).unwrap();
    let err = client
        .post_json(&server.uri(), &HeaderMap::new(), &json!({}), 2)
        .await
        .unwrap_err();

    match err {
        RequestError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, RequestError::Timeout(_)));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn gemini_falls_back_to_next_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/model-a:generateContent"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/model-b:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(REVIEW)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(Provider::Gemini, &server);
    config.provider.model = Some("model-a".into());
    config.provider.fallback_models = vec!["model-a".into(), "model-b".into()];
    let client = AiClient::new(&config).unwrap();
    assert_eq!(client.candidate_models(), vec!["model-a", "model-b"]);

    let payload = build_request(Provider::Gemini, "model-a", &inputs());
    let response = client.generate(&payload).await.unwrap();

    assert_eq!(response.model, "model-b");
    assert_eq!(response.failures.len(), 1);
    assert_eq!(response.failures[0].model, "model-a");
    assert!(response.failures[0].reason.contains("500"));
    assert_eq!(extract_text(&response.body), REVIEW);
}

#[tokio::test]
async fn gemini_reports_every_model_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/model-a:generateContent"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such model"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/model-b:generateContent"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = config(Provider::Gemini, &server);
    config.provider.model = Some("model-a".into());
    config.provider.fallback_models = vec!["model-b".into()];
    let client = AiClient::new(&config).unwrap();

    let payload = build_request(Provider::Gemini, "model-a", &inputs());
    let err = client.generate(&payload).await.unwrap_err();

    let GuardianError::Provider(message) = err else {
        panic!("expected a provider error");
    };
    assert!(message.contains("all Gemini models failed"));
    assert!(message.contains("model-a: HTTP 404: no such model"));
    assert!(message.contains("; model-b: failed after 2 attempts"));
}

#[tokio::test]
async fn openai_uses_bearer_auth_and_full_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(4)
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": REVIEW}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(Provider::OpenAi, &server);
    let client = AiClient::new(&config).unwrap();
    let payload = build_request(Provider::OpenAi, "gpt-4o-mini", &inputs());
    let response = client.generate(&payload).await.unwrap();

    assert_eq!(response.model, "gpt-4o-mini");
    assert!(response.failures.is_empty());
    assert_eq!(extract_text(&response.body), REVIEW);
}
