use std::path::Path;

use codeguardian_core::{GuardianConfig, Provider, ReviewResult};
use codeguardian_review::pipeline::ReviewPipeline;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_in(dir: &Path, server: &MockServer) -> GuardianConfig {
    let mut config = GuardianConfig::default();
    config.provider.kind = Provider::Gemini;
    config.provider.api_key = Some("test-key".into());
    config.provider.api_url = Some(format!("{}/v1beta/models", server.uri()));
    config.provider.fallback_models = vec!["gemini-2.5-flash".into()];
    config.github.api_url = server.uri();
    config.github.token = Some("ghs_test".into());
    config.github.event_path = Some(dir.join("event.json"));
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 2;
    config.docs.rules_url = "https://docs.example.com/rules".into();

    let p = &mut config.paths;
    p.instruction = dir.join(".ai/ai-reviewer-instruction.md");
    p.rules = dir.join(".ai/review-rules.md");
    p.diff_trimmed = dir.join("out/diff.trimmed");
    p.request = dir.join("out/request.json");
    p.response = dir.join("out/response.json");
    p.raw_text = dir.join("out/ai_raw_text.txt");
    p.result = dir.join("out/ai_result.json");
    p.comment = dir.join("out/comment.md");
    config
}

fn write_inputs(config: &GuardianConfig) {
    let p = &config.paths;
    std::fs::create_dir_all(p.instruction.parent().unwrap()).unwrap();
    std::fs::write(&p.instruction, "You review React code.").unwrap();
    std::fs::write(&p.rules, "CQ-4.05 Proper keys in lists").unwrap();
    std::fs::write(
        config.github.event_path.as_ref().unwrap(),
        json!({
            "pull_request": {
                "number": 12,
                "head": {"sha": "feedface"},
                "base": {"repo": {"name": "todo-app", "owner": {"login": "octo"}}}
            }
        })
        .to_string(),
    )
    .unwrap();
}

const DIFF: &str = "diff --git a/src/App.jsx b/src/App.jsx\n@@ -10,0 +11 @@\n+  {todos.map((t, i) => <li key={i}>{t.text}</li>)}\n";

#[tokio::test]
async fn full_review_writes_artifacts_and_posts_comments() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let config = config_in(dir.path(), &server);
    write_inputs(&config);

    let review = json!({"issues": [
        {"id": "CQ-4.05", "path": "src/App.jsx", "line": 11, "message": "Index used as key", "suggestion": "Use t.id"},
        {"id": "CQ-4.05", "path": "", "line": 11, "message": "no path", "suggestion": ""}
    ]});
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": format!("```json\n{review}\n```")}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/todo-app/pulls/12/comments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = ReviewPipeline::new(&config);
    pipeline.preflight(true).unwrap();
    let diff = pipeline.prepare_diff(DIFF).unwrap();
    assert!(!diff.is_empty());

    let payload = pipeline.build_request().unwrap();
    let outcome = pipeline.call(&payload, diff.raw_len).await.unwrap();
    assert_eq!(outcome.model, "gemini-2.5-flash");
    assert_eq!(outcome.result.issues.len(), 2);

    let stats = pipeline.post(&outcome.result).await.unwrap();
    assert_eq!(stats.posted, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.total, 2);

    let p = &config.paths;
    let request = std::fs::read_to_string(&p.request).unwrap();
    assert!(!request.contains('\n'));
    assert!(request.contains("DIFF:\\ndiff --git"));
    assert!(std::fs::read_to_string(&p.response).unwrap().starts_with("{\n"));
    assert!(std::fs::read_to_string(&p.raw_text).unwrap().starts_with("```json"));
    let saved: ReviewResult =
        serde_json::from_str(&std::fs::read_to_string(&p.result).unwrap()).unwrap();
    assert_eq!(saved, outcome.result);
    let summary = std::fs::read_to_string(&p.comment).unwrap();
    assert!(summary.contains("### Found 2 issues"));
    assert!(summary.contains(&format!("Analyzed {} characters", DIFF.chars().count())));
}

#[tokio::test]
async fn unparseable_answer_degrades_to_no_issues() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let mut config = config_in(dir.path(), &server);
    config.provider.kind = Provider::OpenAi;
    config.provider.api_url = Some(server.uri());
    write_inputs(&config);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Sorry, I cannot help with that."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = ReviewPipeline::new(&config);
    pipeline.prepare_diff(DIFF).unwrap();
    let payload = pipeline.build_request().unwrap();
    let outcome = pipeline.call(&payload, 0).await.unwrap();

    assert!(outcome.result.issues.is_empty());
    assert_eq!(
        std::fs::read_to_string(&config.paths.result).unwrap(),
        "{\n  \"issues\": []\n}"
    );
    assert!(std::fs::read_to_string(&config.paths.comment)
        .unwrap()
        .contains("No issues found"));
}

#[tokio::test]
async fn post_from_artifact_reads_saved_result() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let config = config_in(dir.path(), &server);
    write_inputs(&config);

    Mock::given(method("POST"))
        .and(path("/repos/octo/todo-app/pulls/12/comments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;

    std::fs::create_dir_all(config.paths.result.parent().unwrap()).unwrap();
    std::fs::write(
        &config.paths.result,
        json!({"issues": [
            {"id": "CQ-5.05", "path": "src/hooks/useTodos.js", "line": 4, "message": "mutates state", "suggestion": ""},
            {"id": "CQ-3.04", "path": "src/utils.js", "line": 9, "message": "naming", "suggestion": ""}
        ]})
        .to_string(),
    )
    .unwrap();

    let stats = ReviewPipeline::new(&config).post_from_artifact().await.unwrap();
    assert_eq!(stats.posted, 2);
}
