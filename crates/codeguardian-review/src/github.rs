use std::path::Path;
use std::time::Duration;

use codeguardian_core::{GitHubConfig, GuardianError, PrContext, RetryConfig};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::client::{HttpClient, RequestError, RetryPolicy};

const GITHUB_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of a single inline review comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineComment<'a> {
    /// Markdown comment text.
    pub body: &'a str,
    /// Head commit the comment is anchored to.
    pub commit_id: &'a str,
    /// File path relative to the repository root.
    pub path: &'a str,
    /// Line in the new version of the file.
    pub line: u64,
    /// Always `RIGHT`: the new side of the diff.
    pub side: &'static str,
}

/// GitHub pull request client for posting inline review comments.
///
/// # Examples
///
/// ```
/// use codeguardian_core::{GitHubConfig, RetryConfig};
/// use codeguardian_review::github::GitHubClient;
///
/// let mut config = GitHubConfig::default();
/// config.token = Some("ghp_xxxx".into());
/// let client = GitHubClient::new(&config, &RetryConfig::default()).unwrap();
/// assert_eq!(client.api_url(), "https://api.github.com");
/// ```
#[derive(Debug)]
pub struct GitHubClient {
    http: HttpClient,
    headers: HeaderMap,
    api_url: String,
}

impl GitHubClient {
    /// Create a client from the `[github]` and `[retry]` sections.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::MissingEnv`] if no token is configured, or
    /// [`GuardianError::Config`] if the client cannot be built.
    pub fn new(config: &GitHubConfig, retry: &RetryConfig) -> Result<Self, GuardianError> {
        let token = config
            .token
            .as_deref()
            .ok_or_else(|| GuardianError::MissingEnv(vec!["GITHUB_TOKEN".into()]))?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| GuardianError::Config("GITHUB_TOKEN contains invalid characters".into()))?;
        auth.set_sensitive(true);
        let version = HeaderValue::from_str(&config.api_version)
            .map_err(|_| {
                GuardianError::Config(format!("invalid API version '{}'", config.api_version))
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", version);
        headers.insert(USER_AGENT, HeaderValue::from_static("codeguardian"));

        let http = HttpClient::new(RetryPolicy::from_config(retry), GITHUB_TIMEOUT)?;
        Ok(Self {
            http,
            headers,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// REST API base URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Post one inline comment on the new side of `path` at `line`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::GitHub`] if GitHub rejects the comment (for
    /// example 422 when the line is not part of the diff) or the request
    /// fails after retries.
    pub async fn post_review_comment(
        &self,
        ctx: &PrContext,
        path: &str,
        line: u64,
        body: &str,
    ) -> Result<(), GuardianError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/comments",
            self.api_url, ctx.owner, ctx.repo, ctx.pull_number
        );
        let comment = InlineComment {
            body,
            commit_id: &ctx.head_sha,
            path,
            line,
            side: "RIGHT",
        };
        self.http
            .post_json(&url, &self.headers, &comment, self.http.policy().max_attempts)
            .await
            .map_err(|e: RequestError| {
                GuardianError::GitHub(format!("failed to post comment: {e}"))
            })?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PullRequestEvent {
    pull_request: Option<EventPullRequest>,
}

#[derive(Debug, Deserialize)]
struct EventPullRequest {
    number: Option<u64>,
    head: Option<EventRef>,
    base: Option<EventRef>,
}

#[derive(Debug, Deserialize)]
struct EventRef {
    sha: Option<String>,
    repo: Option<EventRepo>,
}

#[derive(Debug, Deserialize)]
struct EventRepo {
    name: Option<String>,
    owner: Option<EventOwner>,
}

#[derive(Debug, Deserialize)]
struct EventOwner {
    login: Option<String>,
}

/// Resolve the pull request from a `pull_request` event payload.
///
/// Owner and repository come from `pull_request.base.repo`, falling back to
/// `repository` (`owner/repo`).
///
/// # Errors
///
/// Returns [`GuardianError::GitHub`] if the payload cannot be read or any
/// of owner, repository, number or head SHA is missing.
///
/// # Examples
///
/// ```
/// use codeguardian_review::github::parse_event;
///
/// let event = r#"{"pull_request": {"number": 7, "head": {"sha": "abc"}}}"#;
/// let ctx = parse_event(event, Some("octo/todo-app")).unwrap();
/// assert_eq!(ctx.owner, "octo");
/// assert_eq!(ctx.pull_number, 7);
/// ```
pub fn parse_event(payload: &str, repository: Option<&str>) -> Result<PrContext, GuardianError> {
    let event: PullRequestEvent = serde_json::from_str(payload)
        .map_err(|e| GuardianError::GitHub(format!("invalid event payload: {e}")))?;
    let pr = event.pull_request;

    let base_repo = pr
        .as_ref()
        .and_then(|p| p.base.as_ref())
        .and_then(|b| b.repo.as_ref());
    let from_event = base_repo.and_then(|r| {
        let owner = r.owner.as_ref()?.login.clone()?;
        let name = r.name.clone()?;
        Some((owner, name))
    });
    let (owner, repo) = match from_event {
        Some(pair) => pair,
        None => repository
            .and_then(|full| full.split_once('/'))
            .map(|(o, r)| (o.to_string(), r.to_string()))
            .unwrap_or_default(),
    };

    let pull_number = pr.as_ref().and_then(|p| p.number).unwrap_or(0);
    let head_sha = pr
        .as_ref()
        .and_then(|p| p.head.as_ref())
        .and_then(|h| h.sha.clone())
        .unwrap_or_default();

    if owner.is_empty() || repo.is_empty() || pull_number == 0 || head_sha.is_empty() {
        return Err(GuardianError::GitHub(
            "cannot resolve pull request context (owner/repo/pull_number/head_sha); \
             run this in a pull_request event"
                .into(),
        ));
    }

    Ok(PrContext {
        owner,
        repo,
        pull_number,
        head_sha,
    })
}

/// Read the event file at `path` and resolve the pull request.
///
/// # Errors
///
/// Returns [`GuardianError::MissingFiles`] if the file does not exist, and
/// the errors of [`parse_event`] otherwise.
pub fn load_pr_context(path: &Path, repository: Option<&str>) -> Result<PrContext, GuardianError> {
    if !path.exists() {
        return Err(GuardianError::MissingFiles(vec![path.to_path_buf()]));
    }
    let payload = std::fs::read_to_string(path)?;
    parse_event(&payload, repository)
}
