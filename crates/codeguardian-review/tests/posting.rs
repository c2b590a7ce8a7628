use codeguardian_core::{GitHubConfig, Issue, PrContext, RetryConfig};
use codeguardian_review::format::CommentFormatter;
use codeguardian_review::github::GitHubClient;
use codeguardian_review::poster::post_issues;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMMENTS_PATH: &str = "/repos/octo/todo-app/pulls/7/comments";

fn client(server: &MockServer) -> GitHubClient {
    let config = GitHubConfig {
        api_url: server.uri(),
        token: Some("ghs_test".into()),
        ..GitHubConfig::default()
    };
    let retry = RetryConfig {
        initial_delay_ms: 1,
        max_delay_ms: 2,
        ..RetryConfig::default()
    };
    GitHubClient::new(&config, &retry).unwrap()
}

fn ctx() -> PrContext {
    PrContext {
        owner: "octo".into(),
        repo: "todo-app".into(),
        pull_number: 7,
        head_sha: "abc123".into(),
    }
}

fn formatter() -> CommentFormatter {
    CommentFormatter::new("https://docs.example.com/rules")
}

#[tokio::test]
async fn posts_at_most_the_cap_in_original_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMMENTS_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(30)
        .mount(&server)
        .await;

    let issues: Vec<Issue> = (1..=35)
        .map(|line| Issue::new("CQ-4.05", "src/App.jsx", line, format!("issue {line}"), ""))
        .collect();
    let stats = post_issues(&client(&server), &formatter(), &ctx(), &issues, 30).await;

    assert_eq!(stats.posted, 30);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.total, 35);
    assert_eq!(stats.capped(), 5);

    let requests = server.received_requests().await.unwrap();
    let lines: Vec<u64> = requests
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["line"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(lines, (1..=30).collect::<Vec<u64>>());
}

#[tokio::test]
async fn comment_payload_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMMENTS_PATH))
        .and(header("authorization", "Bearer ghs_test"))
        .and(header("accept", "application/vnd.github+json"))
        .and(header("x-github-api-version", "2022-11-28"))
        .and(header("user-agent", "codeguardian"))
        .and(body_partial_json(json!({
            "commit_id": "abc123",
            "path": "src/App.jsx",
            "line": 12,
            "side": "RIGHT"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let issues = vec![Issue::new("CQ-4.05", "src/App.jsx", 12, "Index as key", "Use todo.id")];
    let stats = post_issues(&client(&server), &formatter(), &ctx(), &issues, 30).await;
    assert_eq!(stats.posted, 1);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = body["body"].as_str().unwrap();
    assert!(text.starts_with("**[CQ-4.05](https://docs.example.com/rules#CQ-4.05-"));
    assert!(text.contains("**Suggestion:** Use todo.id"));
}

#[tokio::test]
async fn invalid_issues_are_skipped_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let issues = vec![
        Issue::new("CQ-1.01", "", 3, "no path", ""),
        Issue::new("CQ-1.01", "a.js", 0, "line zero", ""),
        Issue {
            id: "CQ-1.01".into(),
            path: "a.js".into(),
            line: json!("3"),
            ..Issue::default()
        },
        Issue::new("CQ-1.01", "a.js", 3, "valid", ""),
    ];
    let stats = post_issues(&client(&server), &formatter(), &ctx(), &issues, 30).await;

    assert_eq!(stats.posted, 1);
    assert_eq!(stats.skipped, 3);
    assert_eq!(stats.total, 4);
}

#[tokio::test]
async fn rejected_comment_is_counted_and_posting_continues() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMMENTS_PATH))
        .and(body_partial_json(json!({"line": 2})))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "line must be part of the diff"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(COMMENTS_PATH))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;

    let issues: Vec<Issue> = (1..=3)
        .map(|line| Issue::new("CQ-3.04", "src/utils.js", line, "naming", ""))
        .collect();
    let stats = post_issues(&client(&server), &formatter(), &ctx(), &issues, 30).await;

    assert_eq!(stats.posted, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.total, 3);
}

#[tokio::test]
async fn rate_limited_comment_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let issues = vec![Issue::new("CQ-1.01", "a.js", 1, "m", "")];
    let stats = post_issues(&client(&server), &formatter(), &ctx(), &issues, 30).await;
    assert_eq!(stats.posted, 1);
    assert_eq!(stats.failed, 0);
}
